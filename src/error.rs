use thiserror::Error;

use crate::{
    dao::storage::StorageError, platform::PlatformError, platform::UserId,
    state::state_machine::InvalidTransition,
};

/// Why a button press no longer applies to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The phase the press was meant for is over.
    TooLate,
    /// The answer belongs to an earlier question.
    OldRound,
    /// The button belongs to an earlier game in this chat.
    OldGame,
    NotYourTurn,
    /// The presser is not a player of the running game.
    NotYourGame,
    AlreadyJoined,
    AlreadyAnswered,
    /// Start was pressed with an empty lobby.
    NoPlayers,
    /// The price was already played in this theme.
    SlotTaken,
}

impl StaleReason {
    /// Short text shown to the presser.
    pub fn notice(self) -> &'static str {
        match self {
            StaleReason::TooLate => "Too late!",
            StaleReason::OldRound => "That question is already over",
            StaleReason::OldGame => "That button belongs to an old game",
            StaleReason::NotYourTurn => "It's not your turn",
            StaleReason::NotYourGame => "You are not playing in this game",
            StaleReason::AlreadyJoined => "You have already joined",
            StaleReason::AlreadyAnswered => "You have already answered",
            StaleReason::NoPlayers => "Nobody has joined yet",
            StaleReason::SlotTaken => "That question has already been played",
        }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The event does not apply to the current session state.
    #[error("stale event: {0:?}")]
    Stale(StaleReason),
    /// The platform could not tell us who the user is.
    #[error("no profile available for user {0}")]
    MissingUserInfo(UserId),
    /// A platform call failed.
    #[error("platform call failed")]
    Platform(#[from] PlatformError),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Payload that is well formed but carries values the game never offers.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl ServiceError {
    /// Text to show the user who triggered the failure, if any.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            ServiceError::Stale(reason) => Some(reason.notice()),
            ServiceError::MissingUserInfo(_) => {
                Some("Couldn't load your profile, please try again")
            }
            ServiceError::InvalidPayload(_) => Some(StaleReason::TooLate.notice()),
            ServiceError::Platform(_) | ServiceError::Unavailable(_) => None,
        }
    }
}

impl From<StaleReason> for ServiceError {
    fn from(reason: StaleReason) -> Self {
        ServiceError::Stale(reason)
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(_: InvalidTransition) -> Self {
        ServiceError::Stale(StaleReason::TooLate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::{GameEvent, GamePhase};

    #[test]
    fn invalid_transitions_read_as_too_late() {
        let err: ServiceError = InvalidTransition {
            from: GamePhase::ShowAnswer,
            event: GameEvent::ResolveRound,
        }
        .into();
        assert_eq!(err.notice(), Some("Too late!"));
    }

    #[test]
    fn infrastructure_failures_are_not_shown_to_users() {
        let err = ServiceError::Unavailable(StorageError::UnknownGame(uuid::Uuid::nil()));
        assert_eq!(err.notice(), None);
    }
}
