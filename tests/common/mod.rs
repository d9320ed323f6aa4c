#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use serde_json::{Value, json};
use trivia_bot::{
    config::AppConfig,
    dao::{
        models::{
            GameEntity, GameId, QuestionEntity, QuestionId, ScoreEntity, ThemeEntity, ThemeId,
        },
        quiz_store::{InMemoryQuizStore, QuizContent, QuizStore},
        storage::StorageResult,
    },
    dto::{
        payload::Payload,
        quiz::{AnswerInput, QuestionInput, QuizContentInput, ThemeInput},
        update::{Update, decode_update},
    },
    platform::{ChatId, UserId, UserSummary, memory::MemoryPlatform},
    services::{dispatcher::Dispatcher, flood_guard::SlidingWindowGuard, handlers::build_dispatcher},
    state::{SessionCore, SharedState, AppState, game::Round, state_machine::GamePhase},
};

pub const CHAT: ChatId = 2_000_000_001;
pub const ANN: UserId = 11;
pub const BOB: UserId = 22;
pub const CARL: UserId = 33;
pub const STRANGER: UserId = 99;

pub const GEOGRAPHY: ThemeId = 1;
pub const SCIENCE: ThemeId = 2;

pub struct Harness {
    pub platform: MemoryPlatform,
    pub store: InMemoryQuizStore,
    pub state: SharedState,
    pub dispatcher: Arc<Dispatcher>,
    next_event: AtomicU64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Countdown off and a flood limit no scenario reaches, unless `tweak` says otherwise.
    pub fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        Self::build(content(), tweak, |store| Arc::new(store))
    }

    pub fn with_content(content: QuizContent) -> Self {
        Self::build(content, |_| {}, |store| Arc::new(store))
    }

    /// Put `wrap` between the handlers and the in-memory store. `self.store`
    /// still reads the underlying data.
    pub fn with_store(wrap: impl FnOnce(InMemoryQuizStore) -> Arc<dyn QuizStore>) -> Self {
        Self::build(content(), |_| {}, wrap)
    }

    fn build(
        content: QuizContent,
        tweak: impl FnOnce(&mut AppConfig),
        wrap: impl FnOnce(InMemoryQuizStore) -> Arc<dyn QuizStore>,
    ) -> Self {
        let mut config = AppConfig::default();
        config.game.countdown = false;
        config.flood.max_events = 10_000;
        tweak(&mut config);

        let platform = MemoryPlatform::new();
        platform.register_user(ANN, "Ann", "Lee");
        platform.register_user(BOB, "Bob", "");
        platform.register_user(CARL, "Carl", "Orr");

        let store = InMemoryQuizStore::new(content);
        let guard = Arc::new(SlidingWindowGuard::from_config(&config.flood));
        let state = AppState::new(config, Arc::new(platform.clone()), wrap(store.clone()));
        let dispatcher = Arc::new(build_dispatcher(state.clone(), guard));

        Self {
            platform,
            store,
            state,
            dispatcher,
            next_event: AtomicU64::new(1),
        }
    }

    pub fn callback_update(&self, user_id: UserId, payload: Payload) -> Update {
        let event_id = format!("evt-{}", self.next_event.fetch_add(1, Ordering::SeqCst));
        decode(json!({
            "type": "message_event",
            "object": {
                "peer_id": CHAT,
                "user_id": user_id,
                "event_id": event_id,
                "payload": serde_json::to_value(payload).unwrap(),
            }
        }))
    }

    pub fn text_update(&self, user_id: UserId, text: &str) -> Update {
        decode(json!({
            "type": "message_new",
            "object": {
                "message": { "peer_id": CHAT, "from_id": user_id, "text": text }
            }
        }))
    }

    pub async fn press(&self, user_id: UserId, payload: Payload) {
        self.dispatcher
            .dispatch(self.callback_update(user_id, payload))
            .await;
    }

    pub async fn say(&self, user_id: UserId, text: &str) {
        self.dispatcher.dispatch(self.text_update(user_id, text)).await;
    }

    pub async fn invite_bot(&self) {
        self.dispatcher
            .dispatch(decode(json!({
                "type": "message_new",
                "object": {
                    "message": {
                        "peer_id": CHAT,
                        "from_id": ANN,
                        "action": { "type": "chat_invite_user", "member_id": -1 }
                    }
                }
            })))
            .await;
    }

    pub async fn core<T>(&self, read: impl FnOnce(&SessionCore) -> T) -> T {
        let session = self.state.sessions().get(CHAT).unwrap();
        let core = session.phase().lock().await;
        read(&core)
    }

    pub async fn phase(&self) -> GamePhase {
        self.core(|core| core.phase()).await
    }

    pub async fn round(&self) -> Round {
        self.core(|core| core.round.clone()).await.unwrap()
    }

    pub async fn game_id(&self) -> GameId {
        self.core(|core| core.game_id).await.unwrap()
    }

    /// Invite the bot, open a lobby, join `players` in order and start as the first one.
    pub async fn start_game(&self, players: &[UserId]) -> GameId {
        self.invite_bot().await;
        self.press(players[0], Payload::NewGame).await;
        for player in players {
            self.press(*player, Payload::Join).await;
        }
        self.press(players[0], Payload::StartGame).await;
        assert_eq!(self.phase().await, GamePhase::ChooseTheme);
        self.game_id().await
    }

    /// Pick `theme_id` and then `price` as `user_id`.
    pub async fn pick(&self, user_id: UserId, game_id: GameId, theme_id: ThemeId, price: i64) {
        self.press(user_id, Payload::ChooseTheme { game_id, theme_id })
            .await;
        self.press(
            user_id,
            Payload::ChooseQuestion {
                game_id,
                theme_id,
                price,
            },
        )
        .await;
    }

    pub async fn answer(&self, user_id: UserId, round: &Round, correct: bool) {
        let answer_id = if correct {
            round.correct_answer_id
        } else {
            wrong_answer(round)
        };
        self.press(
            user_id,
            Payload::Answer {
                game_id: self.game_id().await,
                round_id: round.round_id,
                answer_id,
            },
        )
        .await;
    }

    pub async fn score_of(&self, game_id: GameId, user_id: UserId) -> i64 {
        self.store
            .get_scores(game_id)
            .await
            .unwrap()
            .into_iter()
            .find(|score| score.user_id() == user_id)
            .map(|score| score.score)
            .unwrap_or_default()
    }
}

/// Store whose score updates or question lookups take `delay` longer.
pub struct SlowStore {
    inner: InMemoryQuizStore,
    delay: Duration,
    slow_scores: bool,
    slow_questions: bool,
}

impl SlowStore {
    pub fn scores(inner: InMemoryQuizStore, delay: Duration) -> Arc<dyn QuizStore> {
        Arc::new(Self {
            inner,
            delay,
            slow_scores: true,
            slow_questions: false,
        })
    }

    pub fn questions(inner: InMemoryQuizStore, delay: Duration) -> Arc<dyn QuizStore> {
        Arc::new(Self {
            inner,
            delay,
            slow_scores: false,
            slow_questions: true,
        })
    }
}

impl QuizStore for SlowStore {
    fn list_themes(&self) -> BoxFuture<'static, StorageResult<Vec<ThemeEntity>>> {
        self.inner.list_themes()
    }

    fn list_questions(
        &self,
        theme_id: Option<ThemeId>,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        self.inner.list_questions(theme_id)
    }

    fn remaining_questions(
        &self,
        game_id: GameId,
        theme_id: ThemeId,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let inner = self.inner.clone();
        let delay = self.slow_questions.then_some(self.delay);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            inner.remaining_questions(game_id, theme_id).await
        })
    }

    fn create_game(
        &self,
        game_id: GameId,
        chat_id: ChatId,
        players: Vec<UserSummary>,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        self.inner.create_game(game_id, chat_id, players)
    }

    fn update_scores(
        &self,
        game_id: GameId,
        winner: Option<UserId>,
        losers: Vec<UserId>,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        let delay = self.slow_scores.then_some(self.delay);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            inner
                .update_scores(game_id, winner, losers, delta)
                .await
        })
    }

    fn mark_question_asked(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        is_answered: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.mark_question_asked(game_id, question_id, is_answered)
    }

    fn get_scores(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        self.inner.get_scores(game_id)
    }

    fn finish_game(&self, game_id: GameId, stopped: bool) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.finish_game(game_id, stopped)
    }
}

pub fn wrong_answer(round: &Round) -> u32 {
    round
        .question
        .answers
        .iter()
        .find(|answer| !answer.is_correct)
        .unwrap()
        .id
}

pub fn decode(raw: Value) -> Update {
    decode_update(raw).unwrap()
}

fn question(title: &str, correct: &str, wrong: &[&str]) -> QuestionInput {
    let mut answers = vec![AnswerInput {
        title: correct.into(),
        is_correct: true,
    }];
    answers.extend(wrong.iter().map(|title| AnswerInput {
        title: (*title).into(),
        is_correct: false,
    }));
    QuestionInput {
        title: title.into(),
        answers,
    }
}

/// One theme called "History" with `count` questions.
pub fn single_theme(count: usize) -> QuizContent {
    QuizContent::try_from(QuizContentInput {
        themes: vec![ThemeInput {
            title: "History".into(),
            questions: (1..=count)
                .map(|n| question(&format!("Event #{n}?"), "Yes", &["No"]))
                .collect(),
        }],
    })
    .unwrap()
}

/// Geography has two questions, Science has one.
pub fn content() -> QuizContent {
    QuizContent::try_from(QuizContentInput {
        themes: vec![
            ThemeInput {
                title: "Geography".into(),
                questions: vec![
                    question("Longest river?", "Nile", &["Volga", "Rhine"]),
                    question("Capital of Australia?", "Canberra", &["Sydney", "Perth"]),
                ],
            },
            ThemeInput {
                title: "Science".into(),
                questions: vec![question("Symbol for gold?", "Au", &["Ag", "Gd"])],
            },
        ],
    })
    .unwrap()
}
