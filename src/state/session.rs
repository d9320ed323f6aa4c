//! Per-chat session state and the store that hands sessions out.
//!
//! Each [`ChatSession`] owns two locks. `phase` guards [`SessionCore`], the
//! state machine plus everything a running game needs. `roster` guards the
//! lobby member list. When both are needed, `phase` is taken first.

use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::Mutex;

use crate::{
    dao::models::{GameId, ThemeEntity, ThemeId},
    error::StaleReason,
    platform::{ChatId, UserId, UserSummary},
    state::{
        game::{Board, PriceSlots, Round},
        state_machine::{GameEvent, GamePhase, GameStateMachine, InvalidTransition, Transition},
    },
};

/// Lobby members in join order.
pub type Roster = IndexMap<UserId, UserSummary>;

/// Everything guarded by the `phase` lock.
#[derive(Debug, Default)]
pub struct SessionCore {
    machine: GameStateMachine,
    pub game_id: Option<GameId>,
    /// Roster snapshot taken when the game started.
    pub players: Roster,
    pub turn_user_id: Option<UserId>,
    pub theme_prices: HashMap<ThemeId, PriceSlots>,
    pub current_theme: Option<ThemeId>,
    pub round: Option<Round>,
    pub board: Board,
}

impl SessionCore {
    pub fn phase(&self) -> GamePhase {
        self.machine.phase()
    }

    pub fn version(&self) -> usize {
        self.machine.version()
    }

    pub fn can_apply(&self, event: GameEvent) -> bool {
        self.machine.can_apply(event)
    }

    pub fn apply(&mut self, event: GameEvent) -> Result<Transition, InvalidTransition> {
        self.machine.apply(event)
    }

    /// Require the session to be in `phase`.
    pub fn expect_phase(&self, phase: GamePhase) -> Result<(), StaleReason> {
        if self.phase() == phase {
            Ok(())
        } else {
            Err(StaleReason::TooLate)
        }
    }

    /// Require a running game whose id is `game_id`.
    pub fn expect_game(&self, game_id: GameId) -> Result<(), StaleReason> {
        match self.game_id {
            Some(current) if current == game_id && self.phase().in_game() => Ok(()),
            Some(current) if current == game_id => Err(StaleReason::TooLate),
            _ => Err(StaleReason::OldGame),
        }
    }

    pub fn is_player(&self, user_id: UserId) -> bool {
        self.players.contains_key(&user_id)
    }

    pub fn expect_player(&self, user_id: UserId) -> Result<(), StaleReason> {
        if self.is_player(user_id) {
            Ok(())
        } else {
            Err(StaleReason::NotYourGame)
        }
    }

    pub fn expect_turn(&self, user_id: UserId) -> Result<(), StaleReason> {
        if self.turn_user_id == Some(user_id) {
            Ok(())
        } else {
            Err(StaleReason::NotYourTurn)
        }
    }

    /// Price slots of `theme_id`, created empty on first use.
    pub fn slots_mut(&mut self, theme_id: ThemeId) -> &mut PriceSlots {
        self.theme_prices.entry(theme_id).or_default()
    }

    pub fn slots(&self, theme_id: ThemeId) -> PriceSlots {
        self.theme_prices.get(&theme_id).copied().unwrap_or_default()
    }

    /// Themes that still have at least one unplayed price.
    pub fn open_themes<'a>(&self, themes: &'a [ThemeEntity]) -> Vec<&'a ThemeEntity> {
        themes
            .iter()
            .filter(|theme| !self.slots(theme.id).is_exhausted())
            .collect()
    }

    /// Display name of the turn holder.
    pub fn turn_holder_name(&self) -> Option<String> {
        self.turn_user_id
            .and_then(|id| self.players.get(&id))
            .map(UserSummary::display_name)
    }

    /// Drop everything tied to the finished game. The phase stays where it is.
    pub fn reset_game(&mut self) {
        self.game_id = None;
        self.players.clear();
        self.turn_user_id = None;
        self.theme_prices.clear();
        self.current_theme = None;
        self.round = None;
        self.board = Board::default();
    }
}

/// State of one chat.
#[derive(Debug)]
pub struct ChatSession {
    chat_id: ChatId,
    phase: Mutex<SessionCore>,
    roster: Mutex<Roster>,
}

impl ChatSession {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            phase: Mutex::new(SessionCore::default()),
            roster: Mutex::new(Roster::new()),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// The `phase` lock. Never hold it across platform or storage calls.
    pub fn phase(&self) -> &Mutex<SessionCore> {
        &self.phase
    }

    /// The `roster` lock. Take it after `phase` when both are needed.
    pub fn roster(&self) -> &Mutex<Roster> {
        &self.roster
    }
}

/// Registry of chat sessions, created lazily on first interaction.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<ChatId, Arc<ChatSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, chat_id: ChatId) -> Arc<ChatSession> {
        self.sessions
            .entry(chat_id)
            .or_insert_with(|| Arc::new(ChatSession::new(chat_id)))
            .clone()
    }

    pub fn get(&self, chat_id: ChatId) -> Option<Arc<ChatSession>> {
        self.sessions.get(&chat_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
