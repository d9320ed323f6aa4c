use serde::Deserialize;
use serde_json::{Value, json};

use crate::platform::{Keyboard, UserSummary};

/// Maximum label length accepted by VK buttons.
const MAX_LABEL_CHARS: usize = 40;

/// Either the `response` or the `error` half of a method call answer.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiEnvelope {
    Ok { response: Value },
    Err { error: ApiErrorBody },
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error_code: i64,
    pub error_msg: String,
}

/// VK serialises `ts` as a string in some answers and a number in others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PollTs {
    Text(String),
    Number(i64),
}

impl PollTs {
    pub fn into_cursor(self) -> String {
        match self {
            PollTs::Text(text) => text,
            PollTs::Number(number) => number.to_string(),
        }
    }
}

/// Answer of `groups.getLongPollServer`.
#[derive(Debug, Clone, Deserialize)]
pub struct LongPollServer {
    pub key: String,
    pub server: String,
    pub ts: PollTs,
}

/// Answer of an `a_check` request against the long-poll server.
#[derive(Debug, Deserialize)]
pub struct LongPollResponse {
    #[serde(default)]
    pub ts: Option<PollTs>,
    #[serde(default)]
    pub updates: Vec<Value>,
    #[serde(default)]
    pub failed: Option<i64>,
}

/// One entry of `messages.send` when addressed through `peer_ids`.
#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub conversation_message_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UserRow {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl From<UserRow> for UserSummary {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

/// Render an inline keyboard as the JSON document VK expects.
pub fn keyboard_json(keyboard: &Keyboard) -> Result<String, serde_json::Error> {
    let mut rows = Vec::with_capacity(keyboard.rows.len());
    for row in &keyboard.rows {
        let mut buttons = Vec::with_capacity(row.len());
        for button in row {
            let label: String = button.label.chars().take(MAX_LABEL_CHARS).collect();
            buttons.push(json!({
                "action": {
                    "type": "callback",
                    "label": label,
                    "payload": serde_json::to_string(&button.payload)?,
                },
                "color": button.color.as_str(),
            }));
        }
        rows.push(Value::Array(buttons));
    }

    serde_json::to_string(&json!({ "inline": true, "buttons": rows }))
}
