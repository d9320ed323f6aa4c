//! Stopping and finishing games.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    dao::models::GameId,
    dto::{
        event::{MessageCallback, MessageText},
        payload::Payload,
    },
    error::{ServiceError, StaleReason},
    platform::{OutgoingMessage, UserId},
    services::{board, screens},
    state::{
        ChatSession, SharedState,
        state_machine::{FinishReason, GameEvent, GamePhase},
    },
};

/// "Stop" button: ask the players to confirm.
pub async fn stop_game(state: SharedState, callback: MessageCallback) -> Result<(), ServiceError> {
    let Payload::StopGame { game_id } = callback.payload else {
        return Err(unexpected(&callback));
    };
    let session = state.sessions().get_or_create(callback.chat_id);

    let (screen, target) = {
        let mut core = session.phase().lock().await;
        core.expect_game(game_id)?;
        core.expect_player(callback.user_id)?;
        if !core.can_apply(GameEvent::Finish(FinishReason::Confirmed)) {
            return Err(StaleReason::TooLate.into());
        }

        let screen = screens::stop_confirm(game_id);
        if core.board.current.as_ref() != Some(&screen) {
            core.board.previous = core.board.current.clone();
        }
        let target = board::stage(&mut core, &screen);
        (screen, target)
    };

    board::present(&state, &session, target, screen).await
}

/// "Keep playing": put back whatever the stop prompt replaced.
pub async fn cancel_stop_game(
    state: SharedState,
    callback: MessageCallback,
) -> Result<(), ServiceError> {
    let Payload::CancelStopGame { game_id } = callback.payload else {
        return Err(unexpected(&callback));
    };
    let session = state.sessions().get_or_create(callback.chat_id);

    let (screen, target) = {
        let mut core = session.phase().lock().await;
        core.expect_game(game_id)?;
        core.expect_player(callback.user_id)?;
        let screen = core.board.previous.take().ok_or(StaleReason::TooLate)?;
        let target = board::stage(&mut core, &screen);
        (screen, target)
    };

    board::present(&state, &session, target, screen).await
}

/// "Yes, stop".
pub async fn confirm_stop_game(
    state: SharedState,
    callback: MessageCallback,
) -> Result<(), ServiceError> {
    let Payload::ConfirmStopGame { game_id } = callback.payload else {
        return Err(unexpected(&callback));
    };
    let session = state.sessions().get_or_create(callback.chat_id);
    finish(
        &state,
        &session,
        game_id,
        FinishReason::Confirmed,
        Some(callback.user_id),
    )
    .await
}

/// "stop" typed into the chat while a player is choosing a price or a
/// question is being prepared.
pub async fn force_stop(state: SharedState, message: MessageText) -> Result<(), ServiceError> {
    let Some(session) = state.sessions().get(message.chat_id) else {
        return Ok(());
    };

    let game_id = {
        let core = session.phase().lock().await;
        if !matches!(
            core.phase(),
            GamePhase::ChooseQuestion | GamePhase::SendQuestion
        ) {
            debug!(chat_id = message.chat_id, phase = ?core.phase(), "stop command ignored");
            return Ok(());
        }
        core.expect_player(message.user_id)?;
        match core.game_id {
            Some(game_id) => game_id,
            None => return Ok(()),
        }
    };

    finish(
        &state,
        &session,
        game_id,
        FinishReason::Forced,
        Some(message.user_id),
    )
    .await
}

/// Move the session to the finished phase, close the game record and post
/// the final scoreboard. A `requester` must be one of the players.
pub(crate) async fn finish(
    state: &SharedState,
    session: &Arc<ChatSession>,
    game_id: GameId,
    reason: FinishReason,
    requester: Option<UserId>,
) -> Result<(), ServiceError> {
    let chat_id = session.chat_id();

    let (board_message, round_id) = {
        let mut core = session.phase().lock().await;
        core.expect_game(game_id)?;
        if let Some(user_id) = requester {
            core.expect_player(user_id)?;
        }
        core.apply(GameEvent::Finish(reason))?;

        let board_message = core.board.message_id;
        let round_id = core.round.as_ref().map(|round| round.round_id);
        core.reset_game();
        (board_message, round_id)
    };

    if let Some(round_id) = round_id {
        state.timers().cancel(round_id);
    }

    if let Err(err) = state.store().finish_game(game_id, reason.is_stop()).await {
        warn!(chat_id, %game_id, error = %err, "failed to close game record");
    }
    let scores = state.store().get_scores(game_id).await.unwrap_or_else(|err| {
        warn!(chat_id, %game_id, error = %err, "failed to load final scores");
        Vec::new()
    });

    if let Some(message_id) = board_message
        && let Err(err) = state.platform().delete_message(chat_id, message_id).await
    {
        debug!(chat_id, message_id, error = %err, "could not delete board message");
    }

    info!(chat_id, %game_id, ?reason, players = scores.len(), "game finished");
    board::post(state, session, screens::final_scoreboard(reason, &scores)).await?;

    if let Some(sticker_id) = state.config().game.final_sticker_id {
        state
            .platform()
            .send_message(OutgoingMessage::sticker(chat_id, sticker_id))
            .await?;
    }
    Ok(())
}

fn unexpected(callback: &MessageCallback) -> ServiceError {
    ServiceError::InvalidPayload(format!("unexpected `{}` payload", callback.payload.action()))
}
