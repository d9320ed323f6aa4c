/// Content, game and score entities.
pub mod models;
/// Quiz content and game record storage.
pub mod quiz_store;
/// Storage error types.
pub mod storage;
