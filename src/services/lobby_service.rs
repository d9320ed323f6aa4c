//! Menu, lobby and game start.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::event::{ChatInvite, MessageCallback, MessageText},
    error::{ServiceError, StaleReason},
    platform::ChatId,
    services::{board, screens},
    state::{
        SharedState,
        game::Screen,
        state_machine::{FinishReason, GameEvent, GamePhase},
        transitions::run_transition,
    },
};

/// Greet the chat when the bot is added and show the main menu.
pub async fn greet(state: SharedState, invite: ChatInvite) -> Result<(), ServiceError> {
    let session = state.sessions().get_or_create(invite.chat_id);
    let screen = screens::greeting();
    let target = run_transition(&session, GameEvent::OpenMenu, |_| Ok(()), |core, _| {
        board::stage(core, &screen)
    })
    .await?;

    info!(chat_id = invite.chat_id, "bot invited; main menu shown");
    board::present(&state, &session, target, screen).await
}

/// Text command that brings up the main menu.
pub async fn open_menu(state: SharedState, message: MessageText) -> Result<(), ServiceError> {
    let session = state.sessions().get_or_create(message.chat_id);
    let screen = screens::main_menu();
    let target = run_transition(&session, GameEvent::OpenMenu, |_| Ok(()), |core, _| {
        board::stage(core, &screen)
    })
    .await?;

    board::present(&state, &session, target, screen).await
}

/// "New game" button: open an empty lobby.
pub async fn new_game(state: SharedState, callback: MessageCallback) -> Result<(), ServiceError> {
    let session = state.sessions().get_or_create(callback.chat_id);

    let (screen, target) = {
        let mut core = session.phase().lock().await;
        // The final scoreboard carries the same button as the menu.
        if matches!(core.phase(), GamePhase::Idle | GamePhase::GameFinished) {
            core.apply(GameEvent::OpenMenu)?;
        }
        core.apply(GameEvent::OpenLobby)?;

        let mut roster = session.roster().lock().await;
        roster.clear();
        let screen = screens::lobby(&roster);
        drop(roster);

        let target = board::stage(&mut core, &screen);
        (screen, target)
    };

    debug!(chat_id = callback.chat_id, "lobby opened");
    board::present(&state, &session, target, screen).await
}

/// "Join" button: add the presser to the lobby roster.
pub async fn join(state: SharedState, callback: MessageCallback) -> Result<(), ServiceError> {
    let session = state.sessions().get_or_create(callback.chat_id);
    let user_id = callback.user_id;

    if session.roster().lock().await.contains_key(&user_id) {
        return Err(StaleReason::AlreadyJoined.into());
    }

    let user = state.user_summary(user_id).await?;

    let (screen, target) = {
        let mut core = session.phase().lock().await;
        core.expect_phase(GamePhase::JoinUsers)?;

        let mut roster = session.roster().lock().await;
        // Another press from the same user may have won while we were fetching.
        if roster.contains_key(&user_id) {
            return Err(StaleReason::AlreadyJoined.into());
        }
        roster.insert(user_id, user);
        let screen = screens::lobby(&roster);
        drop(roster);

        let target = board::stage(&mut core, &screen);
        (screen, target)
    };

    debug!(chat_id = callback.chat_id, user_id, "user joined lobby");
    board::present(&state, &session, target, screen).await
}

/// "Start" button: freeze the roster into a game and show the theme board.
pub async fn start_game(state: SharedState, callback: MessageCallback) -> Result<(), ServiceError> {
    let session = state.sessions().get_or_create(callback.chat_id);
    let themes = state.store().list_themes().await?;

    let (game_id, players, screen, target) = {
        let mut core = session.phase().lock().await;
        core.expect_phase(GamePhase::JoinUsers)?;

        let mut roster = session.roster().lock().await;
        if roster.is_empty() {
            return Err(StaleReason::NoPlayers.into());
        }
        if !roster.contains_key(&callback.user_id) {
            return Err(StaleReason::NotYourGame.into());
        }

        core.apply(GameEvent::StartGame)?;
        let game_id = Uuid::new_v4();
        core.game_id = Some(game_id);
        core.players = std::mem::take(&mut *roster);
        drop(roster);

        core.turn_user_id = Some(callback.user_id);
        core.theme_prices.clear();
        core.current_theme = None;
        core.round = None;

        let open = core.open_themes(&themes);
        let screen = screens::themes(game_id, &open, core.turn_holder_name().as_deref());
        let target = board::stage(&mut core, &screen);
        let players = core.players.values().cloned().collect::<Vec<_>>();
        (game_id, players, screen, target)
    };

    let player_count = players.len();
    if let Err(err) = state
        .store()
        .create_game(game_id, callback.chat_id, players)
        .await
    {
        warn!(chat_id = callback.chat_id, %game_id, error = %err, "failed to record new game");
        abandon(&state, callback.chat_id, game_id).await;
        return Err(err.into());
    }

    info!(chat_id = callback.chat_id, %game_id, players = player_count, "game started");
    board::present(&state, &session, target, screen).await
}

/// Close a game that could not be recorded.
async fn abandon(state: &SharedState, chat_id: ChatId, game_id: Uuid) {
    let Some(session) = state.sessions().get(chat_id) else {
        return;
    };

    let screen = Screen::new(
        "The game could not be started, please try again later.",
        screens::main_menu().keyboard,
    );
    let target = {
        let mut core = session.phase().lock().await;
        if core.game_id != Some(game_id)
            || core.apply(GameEvent::Finish(FinishReason::Confirmed)).is_err()
        {
            return;
        }
        core.reset_game();
        board::stage(&mut core, &screen)
    };

    if let Err(err) = board::present(state, &session, target, screen).await {
        warn!(chat_id, error = %err, "failed to show start failure");
    }
}
