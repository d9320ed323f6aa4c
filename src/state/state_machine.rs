use thiserror::Error;

/// Phases a chat session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamePhase {
    /// Nothing has happened in the chat yet.
    Idle,
    /// Main menu with the "new game" button is displayed.
    MainMenu,
    /// Lobby is open; members may join.
    JoinUsers,
    /// Theme board is displayed; the turn holder picks a theme.
    ChooseTheme,
    /// Price board of one theme is displayed.
    ChooseQuestion,
    /// A question was picked and is being prepared and sent.
    SendQuestion,
    /// Answer window is open.
    GetAnswer,
    /// Round is resolved; the correct answer is being revealed.
    ShowAnswer,
    /// Scoreboard between rounds.
    ShowScoreboard,
    /// Game is over; a new one may be started from the menu.
    GameFinished,
}

impl GamePhase {
    /// Phases that belong to a running game.
    pub fn in_game(self) -> bool {
        matches!(
            self,
            GamePhase::ChooseTheme
                | GamePhase::ChooseQuestion
                | GamePhase::SendQuestion
                | GamePhase::GetAnswer
                | GamePhase::ShowAnswer
                | GamePhase::ShowScoreboard
        )
    }
}

/// Indicates why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Every price slot of every theme has been played.
    ThemesExhausted,
    /// A player confirmed the stop screen.
    Confirmed,
    /// The `stop` text command interrupted question selection.
    Forced,
}

impl FinishReason {
    /// Whether the game was stopped before the board ran out.
    pub fn is_stop(self) -> bool {
        !matches!(self, FinishReason::ThemesExhausted)
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    OpenMenu,
    OpenLobby,
    StartGame,
    /// Return to the theme board from any in-game screen but the answer window.
    ShowThemes,
    PickTheme,
    PickQuestion,
    QuestionSent,
    ResolveRound,
    ShowScoreboard,
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

/// Record of an applied transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: GamePhase,
    pub to: GamePhase,
    pub event: GameEvent,
    /// Version reached after the transition.
    pub version: usize,
}

/// Per-chat state machine implementing the game flow.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    phase: GamePhase,
    version: usize,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self {
            phase: GamePhase::Idle,
            version: 0,
        }
    }
}

impl GameStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Whether `event` would be accepted from the current phase.
    pub fn can_apply(&self, event: GameEvent) -> bool {
        Self::compute_transition(self.phase, event).is_ok()
    }

    /// Apply `event`, moving to the next phase or leaving the machine untouched.
    pub fn apply(&mut self, event: GameEvent) -> Result<Transition, InvalidTransition> {
        let from = self.phase;
        let to = Self::compute_transition(from, event)?;

        self.phase = to;
        self.version += 1;

        Ok(Transition {
            from,
            to,
            event,
            version: self.version,
        })
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(
        phase: GamePhase,
        event: GameEvent,
    ) -> Result<GamePhase, InvalidTransition> {
        use GamePhase as P;

        let next = match (phase, event) {
            (P::Idle | P::GameFinished, GameEvent::OpenMenu) => P::MainMenu,
            (P::MainMenu, GameEvent::OpenLobby) => P::JoinUsers,
            (P::JoinUsers, GameEvent::StartGame) => P::ChooseTheme,
            (
                P::ChooseTheme
                | P::ChooseQuestion
                | P::SendQuestion
                | P::ShowAnswer
                | P::ShowScoreboard,
                GameEvent::ShowThemes,
            ) => P::ChooseTheme,
            (P::ChooseTheme, GameEvent::PickTheme) => P::ChooseQuestion,
            (P::ChooseQuestion, GameEvent::PickQuestion) => P::SendQuestion,
            (P::SendQuestion, GameEvent::QuestionSent) => P::GetAnswer,
            (P::GetAnswer, GameEvent::ResolveRound) => P::ShowAnswer,
            (P::ShowAnswer, GameEvent::ShowScoreboard) => P::ShowScoreboard,
            (
                P::ChooseTheme
                | P::ChooseQuestion
                | P::SendQuestion
                | P::ShowAnswer
                | P::ShowScoreboard,
                GameEvent::Finish(FinishReason::ThemesExhausted),
            ) => P::GameFinished,
            (
                P::ChooseTheme | P::ChooseQuestion | P::ShowAnswer | P::ShowScoreboard,
                GameEvent::Finish(FinishReason::Confirmed),
            ) => P::GameFinished,
            (
                P::ChooseQuestion | P::SendQuestion,
                GameEvent::Finish(FinishReason::Forced),
            ) => P::GameFinished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
