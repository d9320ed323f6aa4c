//! Messaging platform boundary: the long-poll feed plus the handful of chat
//! operations the game needs (send, edit, delete, callback acknowledgement and
//! user lookups).

pub mod keyboard;
pub mod memory;
#[cfg(feature = "vk-platform")]
pub mod vk;

use std::error::Error;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use self::keyboard::{Button, ButtonColor, Keyboard};

/// Identifier of a chat (peer) on the platform.
pub type ChatId = i64;
/// Identifier of a platform user.
pub type UserId = i64;
/// Identifier of a message inside a chat.
pub type MessageId = i64;

/// Result alias for platform calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Failure raised by a platform client regardless of the underlying API.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The request never produced a usable response (network, TLS, timeout).
    #[error("transport failure during `{method}`")]
    Transport {
        method: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The platform answered with an explicit error object.
    #[error("platform rejected `{method}` (code {code}): {message}")]
    Api {
        method: String,
        code: i64,
        message: String,
    },
    /// The response arrived but did not have the expected shape.
    #[error("malformed response for `{method}`: {message}")]
    Decode { method: String, message: String },
}

impl PlatformError {
    /// Wrap any transport-level failure.
    pub fn transport(method: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        PlatformError::Transport {
            method: method.into(),
            source: Box::new(source),
        }
    }

    /// Build a decoding failure for `method`.
    pub fn decode(method: impl Into<String>, message: impl Into<String>) -> Self {
        PlatformError::Decode {
            method: method.into(),
            message: message.into(),
        }
    }
}

/// Cached snapshot of a chat member's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
}

impl UserSummary {
    /// Name used when addressing the user in chat.
    pub fn display_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// One long-poll response: raw updates plus the cursor to resume from.
#[derive(Debug, Clone, Default)]
pub struct PollBatch {
    pub updates: Vec<Value>,
    pub cursor: String,
}

/// Message to post into a chat. Every part is optional so stickers and
/// attachments can be sent without text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: ChatId,
    pub text: Option<String>,
    pub keyboard: Option<Keyboard>,
    pub attachment: Option<String>,
    pub sticker_id: Option<i64>,
}

impl OutgoingMessage {
    /// Plain text message.
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Sticker-only message.
    pub fn sticker(chat_id: ChatId, sticker_id: i64) -> Self {
        Self {
            chat_id,
            sticker_id: Some(sticker_id),
            ..Self::default()
        }
    }

    /// Attach an inline keyboard.
    pub fn with_keyboard(mut self, keyboard: Option<Keyboard>) -> Self {
        self.keyboard = keyboard;
        self
    }
}

/// Everything needed to acknowledge a button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRef {
    pub event_id: String,
    pub user_id: UserId,
    pub chat_id: ChatId,
}

/// Abstraction over the messaging platform consumed by the game engine.
pub trait PlatformClient: Send + Sync {
    /// Block server-side until updates arrive (or the wait elapses) and return them.
    ///
    /// `cursor` is `None` on the very first call; afterwards it is the cursor
    /// returned by the previous successful batch.
    fn long_poll_fetch(&self, cursor: Option<String>) -> BoxFuture<'static, PlatformResult<PollBatch>>;
    fn send_message(&self, message: OutgoingMessage) -> BoxFuture<'static, PlatformResult<MessageId>>;
    fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: Option<String>,
        keyboard: Option<Keyboard>,
    ) -> BoxFuture<'static, PlatformResult<()>>;
    fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> BoxFuture<'static, PlatformResult<()>>;
    /// Acknowledge a button press, optionally flashing a short snackbar.
    fn answer_callback(
        &self,
        callback: CallbackRef,
        snackbar: Option<String>,
    ) -> BoxFuture<'static, PlatformResult<()>>;
    fn fetch_user_info(&self, user_id: UserId)
    -> BoxFuture<'static, PlatformResult<Option<UserSummary>>>;
}
