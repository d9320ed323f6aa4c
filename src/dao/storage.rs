use thiserror::Error;

use crate::dao::models::{GameId, ThemeId};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by quiz stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("game `{0}` not found")]
    UnknownGame(GameId),
    #[error("theme `{0}` not found")]
    UnknownTheme(ThemeId),
}
