//! Button payloads. Every callback button carries one of these, serialised as a
//! JSON object tagged by `action`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{AnswerId, ThemeId};

/// Action requested by a button press together with the identifiers needed to
/// validate it against the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Payload {
    NewGame,
    Join,
    StartGame,
    ShowThemes {
        game_id: Uuid,
    },
    ChooseTheme {
        game_id: Uuid,
        theme_id: ThemeId,
    },
    ChooseQuestion {
        game_id: Uuid,
        theme_id: ThemeId,
        price: i64,
    },
    Answer {
        game_id: Uuid,
        round_id: Uuid,
        answer_id: AnswerId,
    },
    ShowScoreboard {
        game_id: Uuid,
    },
    StopGame {
        game_id: Uuid,
    },
    ConfirmStopGame {
        game_id: Uuid,
    },
    CancelStopGame {
        game_id: Uuid,
    },
}

impl Payload {
    /// Stable snake_case name used in logs.
    pub fn action(&self) -> &'static str {
        match self {
            Payload::NewGame => "new_game",
            Payload::Join => "join",
            Payload::StartGame => "start_game",
            Payload::ShowThemes { .. } => "show_themes",
            Payload::ChooseTheme { .. } => "choose_theme",
            Payload::ChooseQuestion { .. } => "choose_question",
            Payload::Answer { .. } => "answer",
            Payload::ShowScoreboard { .. } => "show_scoreboard",
            Payload::StopGame { .. } => "stop_game",
            Payload::ConfirmStopGame { .. } => "confirm_stop_game",
            Payload::CancelStopGame { .. } => "cancel_stop_game",
        }
    }
}
