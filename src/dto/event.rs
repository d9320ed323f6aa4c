//! Classification of decoded updates into the closed set of game events.

use serde_json::Value;

use super::{
    payload::Payload,
    update::{Update, UpdateKind},
};
use crate::platform::{CallbackRef, ChatId, UserId};

/// Someone added a member (possibly the bot itself) to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatInvite {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub member_id: Option<i64>,
}

impl ChatInvite {
    /// Communities carry negative ids, so a negative member is the bot joining.
    pub fn invites_bot(&self) -> bool {
        self.member_id.is_none_or(|id| id < 0)
    }
}

/// Plain text message posted in a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageText {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub text: String,
}

impl MessageText {
    /// Text with bot mentions stripped, lower-cased and trimmed.
    pub fn command(&self) -> String {
        let text = self.text.trim();
        // "[club123|@bot] stop" -> "stop"
        let text = match (text.starts_with('['), text.find(']')) {
            (true, Some(end)) => text[end + 1..].trim(),
            _ => text,
        };
        text.to_lowercase()
    }
}

/// Button press carrying a typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCallback {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub event_id: String,
    pub payload: Payload,
}

impl MessageCallback {
    pub fn callback_ref(&self) -> CallbackRef {
        CallbackRef {
            event_id: self.event_id.clone(),
            user_id: self.user_id,
            chat_id: self.chat_id,
        }
    }
}

/// Closed set of events the dispatcher routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ChatInvite(ChatInvite),
    MessageText(MessageText),
    MessageCallback(MessageCallback),
}

impl Event {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Event::ChatInvite(event) => event.chat_id,
            Event::MessageText(event) => event.chat_id,
            Event::MessageCallback(event) => event.chat_id,
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Event::ChatInvite(event) => event.user_id,
            Event::MessageText(event) => event.user_id,
            Event::MessageCallback(event) => event.user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::ChatInvite(_) => "chat_invite",
            Event::MessageText(_) => "message_text",
            Event::MessageCallback(_) => "message_callback",
        }
    }
}

/// Outcome of classifying one update. Classification is total.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Event(Event),
    /// Edits are recognised and intentionally ignored.
    Edit,
    /// Update type the engine does not handle.
    Unknown(String),
    /// Update of a known kind whose content could not be interpreted. Broken
    /// button presses still carry enough to be acknowledged.
    Malformed {
        callback: Option<CallbackRef>,
        reason: String,
    },
}

/// Turn a decoded update into an event.
pub fn classify(update: &Update) -> Classified {
    match &update.kind {
        UpdateKind::MessageNew => classify_message(update),
        UpdateKind::MessageEvent => classify_callback(update),
        UpdateKind::MessageEdit => Classified::Edit,
        UpdateKind::Other(kind) => Classified::Unknown(kind.clone()),
    }
}

fn classify_message(update: &Update) -> Classified {
    let (Some(chat_id), Some(user_id)) = (update.chat_id, update.user_id) else {
        return malformed(None, "message without peer or sender");
    };
    let message = &update.raw["message"];

    if let Some(action) = message.get("action")
        && action.get("type").and_then(Value::as_str) == Some("chat_invite_user")
    {
        return Classified::Event(Event::ChatInvite(ChatInvite {
            chat_id,
            user_id,
            member_id: action.get("member_id").and_then(Value::as_i64),
        }));
    }

    let text = message
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Classified::Event(Event::MessageText(MessageText {
        chat_id,
        user_id,
        text,
    }))
}

fn classify_callback(update: &Update) -> Classified {
    let (Some(chat_id), Some(user_id)) = (update.chat_id, update.user_id) else {
        return malformed(None, "callback without peer or user");
    };
    let Some(event_id) = update.raw.get("event_id").and_then(Value::as_str) else {
        return malformed(None, "callback without event id");
    };
    let callback = CallbackRef {
        event_id: event_id.to_string(),
        user_id,
        chat_id,
    };

    // Payloads arrive as objects, older API versions send them as JSON strings.
    let payload = match update.raw.get("payload") {
        Some(Value::String(text)) => serde_json::from_str::<Payload>(text),
        Some(value) => serde_json::from_value::<Payload>(value.clone()),
        None => return malformed(Some(callback), "callback without payload"),
    };

    match payload {
        Ok(payload) => Classified::Event(Event::MessageCallback(MessageCallback {
            chat_id,
            user_id,
            event_id: callback.event_id,
            payload,
        })),
        Err(err) => malformed(Some(callback), &err.to_string()),
    }
}

fn malformed(callback: Option<CallbackRef>, reason: &str) -> Classified {
    Classified::Malformed {
        callback,
        reason: reason.to_string(),
    }
}
