use tracing::debug;

use crate::{
    error::{ServiceError, StaleReason},
    state::{
        session::{ChatSession, SessionCore},
        state_machine::{GameEvent, Transition},
    },
};

/// Validate and apply `event` under the phase lock, then let `then` read or
/// update the session before the lock is released.
///
/// Nothing passed in here may await: the closures run with the lock held.
pub async fn run_transition<T, C, F>(
    session: &ChatSession,
    event: GameEvent,
    check: C,
    then: F,
) -> Result<T, ServiceError>
where
    C: FnOnce(&SessionCore) -> Result<(), StaleReason>,
    F: FnOnce(&mut SessionCore, &Transition) -> T,
{
    let mut core = session.phase().lock().await;
    check(&core)?;
    let transition = core.apply(event)?;
    debug!(
        chat_id = session.chat_id(),
        from = ?transition.from,
        to = ?transition.to,
        version = transition.version,
        "phase transition"
    );
    Ok(then(&mut core, &transition))
}
