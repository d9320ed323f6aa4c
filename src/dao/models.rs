use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::platform::{ChatId, UserId, UserSummary};

/// Identifier of a quiz theme.
pub type ThemeId = u32;
/// Identifier of a quiz question.
pub type QuestionId = u32;
/// Identifier of an answer option, unique across the whole content set.
pub type AnswerId = u32;
/// Identifier of a played game.
pub type GameId = Uuid;

/// Topic grouping a set of questions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThemeEntity {
    pub id: ThemeId,
    pub title: String,
}

/// Question with its answer options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    pub id: QuestionId,
    pub theme_id: ThemeId,
    pub title: String,
    /// Answer options in authoring order. Exactly one is correct.
    pub answers: Vec<AnswerEntity>,
}

impl QuestionEntity {
    /// The single correct option, if the content is well formed.
    pub fn correct_answer(&self) -> Option<&AnswerEntity> {
        self.answers.iter().find(|answer| answer.is_correct)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    pub id: AnswerId,
    pub title: String,
    pub is_correct: bool,
}

/// Persisted record of one game played in a chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    pub id: GameId,
    pub chat_id: ChatId,
    /// Players in join order.
    pub players: Vec<UserSummary>,
    /// Set when players (or a command) stopped the game before the board ran out.
    pub is_stopped: bool,
    pub started_at: SystemTime,
    pub finished_at: Option<SystemTime>,
}

/// Running score of one player inside one game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntity {
    pub user: UserSummary,
    pub score: i64,
    pub correct_answers: u32,
    pub wrong_answers: u32,
}

impl ScoreEntity {
    pub fn new(user: UserSummary) -> Self {
        Self {
            user,
            score: 0,
            correct_answers: 0,
            wrong_answers: 0,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}

/// Question already played in a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskedQuestionEntity {
    pub game_id: GameId,
    pub question_id: QuestionId,
    /// Whether someone answered it correctly.
    pub is_answered: bool,
    pub asked_at: SystemTime,
}
