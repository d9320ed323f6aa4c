use std::{collections::HashSet, sync::Arc, time::SystemTime};

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;

use super::{QuizStore, content::QuizContent};
use crate::{
    dao::{
        models::{
            AskedQuestionEntity, GameEntity, GameId, QuestionEntity, QuestionId, ScoreEntity,
            ThemeEntity, ThemeId,
        },
        storage::{StorageError, StorageResult},
    },
    platform::{ChatId, UserId, UserSummary},
};

struct GameRecord {
    game: GameEntity,
    /// Keyed by user id, in join order.
    scores: IndexMap<UserId, ScoreEntity>,
    asked: Vec<AskedQuestionEntity>,
}

/// Process-local store: content is fixed at construction, games live in memory.
#[derive(Clone)]
pub struct InMemoryQuizStore {
    content: Arc<QuizContent>,
    games: Arc<DashMap<GameId, GameRecord>>,
}

impl InMemoryQuizStore {
    pub fn new(content: QuizContent) -> Self {
        Self {
            content: Arc::new(content),
            games: Arc::new(DashMap::new()),
        }
    }

    /// Snapshot of a stored game record.
    pub fn game(&self, game_id: GameId) -> Option<GameEntity> {
        self.games.get(&game_id).map(|record| record.game.clone())
    }

    /// Questions recorded as asked in `game_id`, in play order.
    pub fn asked_questions(&self, game_id: GameId) -> Vec<AskedQuestionEntity> {
        self.games
            .get(&game_id)
            .map(|record| record.asked.clone())
            .unwrap_or_default()
    }

    fn questions_of(&self, theme_id: Option<ThemeId>) -> StorageResult<Vec<QuestionEntity>> {
        if let Some(theme_id) = theme_id
            && !self.content.themes.iter().any(|theme| theme.id == theme_id)
        {
            return Err(StorageError::UnknownTheme(theme_id));
        }
        Ok(self
            .content
            .questions
            .iter()
            .filter(|question| theme_id.is_none_or(|id| question.theme_id == id))
            .cloned()
            .collect())
    }

    fn remaining(&self, game_id: GameId, theme_id: ThemeId) -> StorageResult<Vec<QuestionEntity>> {
        let asked: HashSet<QuestionId> = self
            .games
            .get(&game_id)
            .ok_or(StorageError::UnknownGame(game_id))?
            .asked
            .iter()
            .map(|entry| entry.question_id)
            .collect();

        Ok(self
            .questions_of(Some(theme_id))?
            .into_iter()
            .filter(|question| !asked.contains(&question.id))
            .collect())
    }

    fn insert_game(
        &self,
        game_id: GameId,
        chat_id: ChatId,
        players: Vec<UserSummary>,
    ) -> GameEntity {
        let scores = players
            .iter()
            .map(|user| (user.id, ScoreEntity::new(user.clone())))
            .collect();
        let game = GameEntity {
            id: game_id,
            chat_id,
            players,
            is_stopped: false,
            started_at: SystemTime::now(),
            finished_at: None,
        };
        self.games.insert(
            game_id,
            GameRecord {
                game: game.clone(),
                scores,
                asked: Vec::new(),
            },
        );
        game
    }

    fn apply_scores(
        &self,
        game_id: GameId,
        winner: Option<UserId>,
        losers: &[UserId],
        delta: i64,
    ) -> StorageResult<()> {
        let mut record = self
            .games
            .get_mut(&game_id)
            .ok_or(StorageError::UnknownGame(game_id))?;

        if let Some(score) = winner.and_then(|id| record.scores.get_mut(&id)) {
            score.score += delta;
            score.correct_answers += 1;
        }
        for loser in losers {
            if let Some(score) = record.scores.get_mut(loser) {
                score.score -= delta;
                score.wrong_answers += 1;
            }
        }
        Ok(())
    }

    fn record_asked(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        is_answered: bool,
    ) -> StorageResult<()> {
        let mut record = self
            .games
            .get_mut(&game_id)
            .ok_or(StorageError::UnknownGame(game_id))?;
        record.asked.push(AskedQuestionEntity {
            game_id,
            question_id,
            is_answered,
            asked_at: SystemTime::now(),
        });
        Ok(())
    }

    fn sorted_scores(&self, game_id: GameId) -> StorageResult<Vec<ScoreEntity>> {
        let record = self
            .games
            .get(&game_id)
            .ok_or(StorageError::UnknownGame(game_id))?;
        let mut scores: Vec<ScoreEntity> = record.scores.values().cloned().collect();
        // Stable sort keeps join order between equal scores.
        scores.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(scores)
    }

    fn mark_finished(&self, game_id: GameId, stopped: bool) -> StorageResult<()> {
        let mut record = self
            .games
            .get_mut(&game_id)
            .ok_or(StorageError::UnknownGame(game_id))?;
        record.game.is_stopped = stopped;
        record.game.finished_at = Some(SystemTime::now());
        Ok(())
    }
}

impl QuizStore for InMemoryQuizStore {
    fn list_themes(&self) -> BoxFuture<'static, StorageResult<Vec<ThemeEntity>>> {
        let themes = self.content.themes.clone();
        Box::pin(async move { Ok(themes) })
    }

    fn list_questions(
        &self,
        theme_id: Option<ThemeId>,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let result = self.questions_of(theme_id);
        Box::pin(async move { result })
    }

    fn remaining_questions(
        &self,
        game_id: GameId,
        theme_id: ThemeId,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let result = self.remaining(game_id, theme_id);
        Box::pin(async move { result })
    }

    fn create_game(
        &self,
        game_id: GameId,
        chat_id: ChatId,
        players: Vec<UserSummary>,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let game = self.insert_game(game_id, chat_id, players);
        Box::pin(async move { Ok(game) })
    }

    fn update_scores(
        &self,
        game_id: GameId,
        winner: Option<UserId>,
        losers: Vec<UserId>,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.apply_scores(game_id, winner, &losers, delta);
        Box::pin(async move { result })
    }

    fn mark_question_asked(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        is_answered: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.record_asked(game_id, question_id, is_answered);
        Box::pin(async move { result })
    }

    fn get_scores(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let result = self.sorted_scores(game_id);
        Box::pin(async move { result })
    }

    fn finish_game(&self, game_id: GameId, stopped: bool) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.mark_finished(game_id, stopped);
        Box::pin(async move { result })
    }
}
