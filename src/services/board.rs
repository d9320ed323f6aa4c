//! Showing screens on the chat's board message.
//!
//! The session remembers one message per chat and edits it in place. Callers
//! record the screen in [`Board::current`](crate::state::game::Board) while they
//! hold the phase lock and hand the captured message id to [`present`] after
//! releasing it.

use tracing::{debug, warn};

use crate::{
    error::ServiceError,
    platform::{MessageId, OutgoingMessage},
    state::{SessionCore, SharedState, game::Screen, session::ChatSession},
};

/// Put `screen` on the board: edit `target` when known, otherwise post a new
/// message and remember it as the board.
pub async fn present(
    state: &SharedState,
    session: &ChatSession,
    target: Option<MessageId>,
    screen: Screen,
) -> Result<(), ServiceError> {
    let chat_id = session.chat_id();

    if let Some(message_id) = target {
        match state
            .platform()
            .edit_message(chat_id, message_id, Some(screen.text.clone()), screen.keyboard.clone())
            .await
        {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(chat_id, message_id, error = %err, "board edit failed; posting a new board");
            }
        }
    }

    post(state, session, screen).await.map(|_| ())
}

/// Post `screen` as a fresh message and make it the board.
pub async fn post(
    state: &SharedState,
    session: &ChatSession,
    screen: Screen,
) -> Result<MessageId, ServiceError> {
    let chat_id = session.chat_id();
    let message_id = state
        .platform()
        .send_message(OutgoingMessage::text(chat_id, screen.text).with_keyboard(screen.keyboard))
        .await?;

    session.phase().lock().await.board.message_id = Some(message_id);
    debug!(chat_id, message_id, "board message posted");
    Ok(message_id)
}

/// Record `screen` as current and return the message to edit. Call with the
/// phase lock held.
pub fn stage(core: &mut SessionCore, screen: &Screen) -> Option<MessageId> {
    core.board.current = Some(screen.clone());
    core.board.message_id
}
