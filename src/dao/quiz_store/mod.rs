pub mod content;
pub mod memory;

use futures::future::BoxFuture;

use crate::{
    dao::{
        models::{GameEntity, GameId, QuestionEntity, QuestionId, ScoreEntity, ThemeEntity, ThemeId},
        storage::StorageResult,
    },
    platform::{ChatId, UserId, UserSummary},
};

pub use content::{ContentError, QuizContent, load_content};
pub use memory::InMemoryQuizStore;

/// Abstraction over quiz content, game records and scores.
pub trait QuizStore: Send + Sync {
    fn list_themes(&self) -> BoxFuture<'static, StorageResult<Vec<ThemeEntity>>>;
    /// Questions of one theme, or of every theme when `theme_id` is `None`.
    fn list_questions(
        &self,
        theme_id: Option<ThemeId>,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Questions of `theme_id` not yet asked in `game_id`.
    fn remaining_questions(
        &self,
        game_id: GameId,
        theme_id: ThemeId,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    fn create_game(
        &self,
        game_id: GameId,
        chat_id: ChatId,
        players: Vec<UserSummary>,
    ) -> BoxFuture<'static, StorageResult<GameEntity>>;
    /// Credit `delta` to the winner and debit it from every loser.
    fn update_scores(
        &self,
        game_id: GameId,
        winner: Option<UserId>,
        losers: Vec<UserId>,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn mark_question_asked(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        is_answered: bool,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Scores of every player, highest first.
    fn get_scores(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;
    fn finish_game(&self, game_id: GameId, stopped: bool) -> BoxFuture<'static, StorageResult<()>>;
}
