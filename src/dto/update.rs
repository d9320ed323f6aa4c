//! Raw long-poll updates decoded into a minimal typed envelope.

use serde_json::Value;
use thiserror::Error;

use crate::platform::{ChatId, UserId};

/// Kind of a long-poll update as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    MessageNew,
    MessageEvent,
    MessageEdit,
    Other(String),
}

impl UpdateKind {
    fn from_type(kind: &str) -> Self {
        match kind {
            "message_new" => UpdateKind::MessageNew,
            "message_event" => UpdateKind::MessageEvent,
            "message_edit" => UpdateKind::MessageEdit,
            other => UpdateKind::Other(other.to_string()),
        }
    }
}

/// One decoded update. `raw` keeps the original `object` for classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub kind: UpdateKind,
    pub chat_id: Option<ChatId>,
    pub user_id: Option<UserId>,
    pub raw: Value,
}

/// Reasons a raw update cannot be turned into an [`Update`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("update is not a JSON object")]
    NotAnObject,
    #[error("update is missing `{field}`")]
    MissingField { field: &'static str },
}

/// Decode a single raw update.
pub fn decode_update(raw: Value) -> Result<Update, DecodeError> {
    let Value::Object(mut map) = raw else {
        return Err(DecodeError::NotAnObject);
    };

    let kind = map
        .get("type")
        .and_then(Value::as_str)
        .map(UpdateKind::from_type)
        .ok_or(DecodeError::MissingField { field: "type" })?;
    let object = map.remove("object").unwrap_or(Value::Null);

    let (chat_id, user_id) = match kind {
        UpdateKind::MessageNew => {
            let message = object
                .get("message")
                .ok_or(DecodeError::MissingField { field: "message" })?;
            (
                Some(required_i64(message, "peer_id")?),
                Some(required_i64(message, "from_id")?),
            )
        }
        UpdateKind::MessageEvent => (
            Some(required_i64(&object, "peer_id")?),
            Some(required_i64(&object, "user_id")?),
        ),
        UpdateKind::MessageEdit => (
            Some(required_i64(&object, "peer_id")?),
            object.get("from_id").and_then(Value::as_i64),
        ),
        UpdateKind::Other(_) => (
            object.get("peer_id").and_then(Value::as_i64),
            object.get("user_id").and_then(Value::as_i64),
        ),
    };

    Ok(Update {
        kind,
        chat_id,
        user_id,
        raw: object,
    })
}

/// Decode a whole batch; a single bad entry fails the batch.
pub fn decode_batch(raw: Vec<Value>) -> Result<Vec<Update>, DecodeError> {
    raw.into_iter().map(decode_update).collect()
}

fn required_i64(value: &Value, field: &'static str) -> Result<i64, DecodeError> {
    value
        .get(field)
        .and_then(Value::as_i64)
        .ok_or(DecodeError::MissingField { field })
}
