//! Theme board, question selection, answers and round resolution.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use rand::seq::{IndexedRandom, SliceRandom};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{GameId, QuestionEntity, ThemeId},
        storage::StorageError,
    },
    dto::{event::MessageCallback, payload::Payload},
    error::{ServiceError, StaleReason},
    platform::{ChatId, MessageId, UserId},
    services::{
        board, game_service, screens,
        timer::{Countdown, TimerId},
    },
    state::{
        ChatSession, SessionCore, SharedState,
        game::{PriceSlots, Round, Screen},
        state_machine::{FinishReason, GameEvent, GamePhase},
    },
};

fn invalid_payload(callback: &MessageCallback) -> ServiceError {
    ServiceError::InvalidPayload(format!("unexpected `{}` payload", callback.payload.action()))
}

/// "Themes" button: any player may bring the theme board back.
pub async fn show_themes(state: SharedState, callback: MessageCallback) -> Result<(), ServiceError> {
    let Payload::ShowThemes { game_id } = callback.payload else {
        return Err(invalid_payload(&callback));
    };
    let session = state.sessions().get_or_create(callback.chat_id);

    {
        let core = session.phase().lock().await;
        core.expect_game(game_id)?;
        core.expect_player(callback.user_id)?;
        // The picked price is already spent; only the pick itself may leave this phase.
        if core.phase() == GamePhase::SendQuestion {
            return Err(StaleReason::TooLate.into());
        }
    }

    open_theme_board(&state, &session, game_id).await
}

/// Show the themes that still have prices left, or end the game when none do.
pub(crate) async fn open_theme_board(
    state: &SharedState,
    session: &Arc<ChatSession>,
    game_id: GameId,
) -> Result<(), ServiceError> {
    let themes = state.store().list_themes().await?;

    let staged = {
        let mut core = session.phase().lock().await;
        core.expect_game(game_id)?;

        let open = core.open_themes(&themes);
        if open.is_empty() {
            None
        } else {
            let screen = screens::themes(game_id, &open, core.turn_holder_name().as_deref());
            core.apply(GameEvent::ShowThemes)?;
            core.current_theme = None;
            let target = board::stage(&mut core, &screen);
            Some((screen, target))
        }
    };

    match staged {
        Some((screen, target)) => board::present(state, session, target, screen).await,
        None => {
            info!(chat_id = session.chat_id(), %game_id, "every theme is played out");
            game_service::finish(state, session, game_id, FinishReason::ThemesExhausted, None).await
        }
    }
}

/// Theme button: only the turn holder may pick.
pub async fn choose_theme(state: SharedState, callback: MessageCallback) -> Result<(), ServiceError> {
    let Payload::ChooseTheme { game_id, theme_id } = callback.payload else {
        return Err(invalid_payload(&callback));
    };
    let session = state.sessions().get_or_create(callback.chat_id);
    let themes = state.store().list_themes().await?;
    let theme = themes
        .iter()
        .find(|theme| theme.id == theme_id)
        .ok_or_else(|| ServiceError::InvalidPayload(format!("unknown theme {theme_id}")))?;

    let (screen, target) = {
        let mut core = session.phase().lock().await;
        core.expect_game(game_id)?;
        core.expect_player(callback.user_id)?;
        core.expect_turn(callback.user_id)?;
        if core.slots(theme_id).is_exhausted() {
            return Err(StaleReason::TooLate.into());
        }

        core.apply(GameEvent::PickTheme)?;
        core.current_theme = Some(theme_id);
        let screen = screens::prices(
            game_id,
            theme,
            core.slots(theme_id),
            core.turn_holder_name().as_deref(),
        );
        let target = board::stage(&mut core, &screen);
        (screen, target)
    };

    debug!(chat_id = callback.chat_id, theme_id, "theme picked");
    board::present(&state, &session, target, screen).await
}

/// Price button: consume the slot, draw a question and open the answer window.
pub async fn choose_question(
    state: SharedState,
    callback: MessageCallback,
) -> Result<(), ServiceError> {
    let Payload::ChooseQuestion {
        game_id,
        theme_id,
        price,
    } = callback.payload
    else {
        return Err(invalid_payload(&callback));
    };
    if PriceSlots::slot_for(price).is_none() {
        return Err(ServiceError::InvalidPayload(format!("price {price} is not offered")));
    }
    let session = state.sessions().get_or_create(callback.chat_id);

    let version = {
        let mut core = session.phase().lock().await;
        core.expect_game(game_id)?;
        core.expect_player(callback.user_id)?;
        core.expect_turn(callback.user_id)?;
        core.expect_phase(GamePhase::ChooseQuestion)?;
        if core.current_theme != Some(theme_id) {
            return Err(StaleReason::TooLate.into());
        }
        if !core.slots_mut(theme_id).consume(price) {
            return Err(StaleReason::SlotTaken.into());
        }
        core.apply(GameEvent::PickQuestion)?.version
    };

    let remaining = match state.store().remaining_questions(game_id, theme_id).await {
        Ok(remaining) => remaining,
        Err(err) => {
            warn!(chat_id = callback.chat_id, theme_id, error = %err, "failed to load questions");
            return_to_themes(&state, &session, game_id, version).await;
            return Err(err.into());
        }
    };

    let round = {
        let mut core = session.phase().lock().await;
        if core.version() != version {
            // A forced stop won the race while questions were loading.
            debug!(chat_id = callback.chat_id, "question selection overtaken");
            return Ok(());
        }

        match draw_round(theme_id, price, &remaining) {
            Some(round) => {
                core.apply(GameEvent::QuestionSent)?;
                core.round = Some(round.clone());
                round
            }
            None => {
                core.slots_mut(theme_id).exhaust();
                drop(core);
                info!(chat_id = callback.chat_id, theme_id, "theme has no questions left");
                return open_theme_board(&state, &session, game_id).await;
            }
        }
    };

    ask(&state, &session, game_id, round).await
}

/// Pick a not-yet-asked question at random and shuffle its answers.
fn draw_round(theme_id: ThemeId, price: i64, remaining: &[QuestionEntity]) -> Option<Round> {
    let mut rng = rand::rng();
    let mut question = remaining.choose(&mut rng)?.clone();
    question.answers.shuffle(&mut rng);
    let correct_answer_id = question.correct_answer()?.id;

    Some(Round {
        round_id: Uuid::new_v4(),
        theme_id,
        question,
        correct_answer_id,
        price,
        answered: IndexMap::new(),
    })
}

/// Undo a question pick that could not be completed.
async fn return_to_themes(
    state: &SharedState,
    session: &Arc<ChatSession>,
    game_id: GameId,
    version: usize,
) {
    {
        let core = session.phase().lock().await;
        if core.version() != version {
            return;
        }
    }
    if let Err(err) = open_theme_board(state, session, game_id).await {
        warn!(chat_id = session.chat_id(), error = %err, "failed to reopen theme board");
    }
}

/// Post the question and arm the answer timer.
async fn ask(
    state: &SharedState,
    session: &Arc<ChatSession>,
    game_id: GameId,
    round: Round,
) -> Result<(), ServiceError> {
    let chat_id = session.chat_id();
    let game_config = &state.config().game;
    let window = game_config.answer_window;
    let initial = screens::question(game_id, &round, game_config.countdown.then_some(window));

    {
        let mut core = session.phase().lock().await;
        core.board.current = Some(initial.clone());
    }
    let posted = board::post(state, session, initial).await;

    let countdown = match (&posted, game_config.countdown) {
        (Ok(message_id), true) => Some(countdown_for(state, session, game_id, &round, *message_id)),
        _ => None,
    };

    let timer_state = state.clone();
    let round_id = round.round_id;
    state.timers().schedule(round_id, window, countdown, async move {
        resolve_on_timeout(timer_state, chat_id, game_id, round_id).await;
    });

    info!(
        chat_id,
        %game_id,
        %round_id,
        question_id = round.question.id,
        price = round.price,
        "question asked"
    );
    posted.map(|_| ())
}

fn countdown_for(
    state: &SharedState,
    session: &Arc<ChatSession>,
    game_id: GameId,
    round: &Round,
    message_id: MessageId,
) -> Countdown {
    let tick = state.config().game.countdown_tick;
    let state = state.clone();
    let session = session.clone();
    let round = round.clone();

    Countdown::new(tick, move |remaining: Duration| -> BoxFuture<'static, ()> {
        let state = state.clone();
        let session = session.clone();
        let round = round.clone();
        Box::pin(async move {
            {
                let core = session.phase().lock().await;
                let live = core.phase() == GamePhase::GetAnswer
                    && core.round.as_ref().map(|r| r.round_id) == Some(round.round_id);
                if !live {
                    return;
                }
            }
            let screen = screens::question(game_id, &round, Some(remaining));
            if let Err(err) = state
                .platform()
                .edit_message(session.chat_id(), message_id, Some(screen.text), screen.keyboard)
                .await
            {
                debug!(chat_id = session.chat_id(), error = %err, "countdown edit failed");
            }
        })
    })
}

/// Answer button.
pub async fn answer(state: SharedState, callback: MessageCallback) -> Result<(), ServiceError> {
    let Payload::Answer {
        game_id,
        round_id,
        answer_id,
    } = callback.payload
    else {
        return Err(invalid_payload(&callback));
    };
    let session = state.sessions().get_or_create(callback.chat_id);
    let user_id = callback.user_id;

    let resolved = {
        let mut core = session.phase().lock().await;
        core.expect_game(game_id)?;
        core.expect_phase(GamePhase::GetAnswer)?;
        let player_count = core.players.len();
        let is_player = core.is_player(user_id);

        let round = core.round.as_mut().ok_or(StaleReason::TooLate)?;
        if round.round_id != round_id {
            return Err(StaleReason::OldRound.into());
        }
        if !is_player {
            return Err(StaleReason::NotYourGame.into());
        }
        if round.answered.contains_key(&user_id) {
            return Err(StaleReason::AlreadyAnswered.into());
        }
        if round.answer_title(answer_id).is_none() {
            return Err(ServiceError::InvalidPayload(format!("unknown answer {answer_id}")));
        }

        round.answered.insert(user_id, answer_id);
        let everyone_answered = round.answered.len() >= player_count;
        let winner = match resolution(round.is_correct(answer_id), everyone_answered) {
            Resolution::Pending => {
                debug!(chat_id = callback.chat_id, user_id, "answer recorded");
                return Ok(());
            }
            Resolution::Winner => Some(user_id),
            Resolution::NoWinner => None,
        };

        let settled = settle(&mut core, game_id, winner)?;
        state.timers().cancel(settled.round.round_id);
        settled
    };

    reveal(&state, &session, game_id, resolved).await
}

#[derive(Debug, PartialEq, Eq)]
enum Resolution {
    Pending,
    Winner,
    NoWinner,
}

/// A correct answer wins at once. A wrong one only closes the round when it
/// was the last one outstanding.
fn resolution(correct: bool, everyone_answered: bool) -> Resolution {
    match (correct, everyone_answered) {
        (true, _) => Resolution::Winner,
        (false, true) => Resolution::NoWinner,
        (false, false) => Resolution::Pending,
    }
}

/// Timer action: close the round without a winner if it is still open.
async fn resolve_on_timeout(state: SharedState, chat_id: ChatId, game_id: GameId, round_id: TimerId) {
    let Some(session) = state.sessions().get(chat_id) else {
        return;
    };

    let settled = {
        let mut core = session.phase().lock().await;
        let live = core.phase() == GamePhase::GetAnswer
            && core.game_id == Some(game_id)
            && core.round.as_ref().map(|round| round.round_id) == Some(round_id);
        if !live {
            debug!(chat_id, %round_id, "timer fired for a settled round");
            return;
        }
        match settle(&mut core, game_id, None) {
            Ok(settled) => settled,
            Err(_) => return,
        }
    };

    info!(chat_id, %round_id, answers = settled.round.answered.len(), "answer window closed");
    if let Err(err) = reveal(&state, &session, game_id, settled).await {
        warn!(chat_id, %round_id, error = %err, "failed to reveal timed out round");
    }
}

/// A closed round with its outcome and the reveal screen staged for it.
struct Settled {
    round: Round,
    winner: Option<UserId>,
    wrong: Vec<UserId>,
    screen: Screen,
}

/// Close the open round: pass the turn and stage the reveal. Call with the
/// phase lock held, so nothing can move the session between resolving the
/// round and deciding who plays next.
fn settle(
    core: &mut SessionCore,
    game_id: GameId,
    winner: Option<UserId>,
) -> Result<Settled, ServiceError> {
    if core.round.is_none() {
        return Err(StaleReason::TooLate.into());
    }
    core.apply(GameEvent::ResolveRound)?;
    let round = core.round.take().ok_or(StaleReason::TooLate)?;

    let wrong: Vec<UserId> = round
        .answered
        .keys()
        .copied()
        .filter(|user_id| Some(*user_id) != winner)
        .collect();

    core.turn_user_id = winner.or_else(|| {
        let ids: Vec<UserId> = core.players.keys().copied().collect();
        ids.choose(&mut rand::rng()).copied()
    });

    let screen = screens::reveal(
        game_id,
        &screens::RevealView {
            round: &round,
            winner: winner.and_then(|id| core.players.get(&id)),
            wrong: wrong.iter().filter_map(|id| core.players.get(id)).collect(),
        },
    );
    board::stage(core, &screen);

    Ok(Settled {
        round,
        winner,
        wrong,
        screen,
    })
}

/// Record the round and show the staged reveal, unless a newer screen took
/// its place in the meantime.
async fn reveal(
    state: &SharedState,
    session: &Arc<ChatSession>,
    game_id: GameId,
    settled: Settled,
) -> Result<(), ServiceError> {
    let recorded = record_round(state, game_id, &settled.round, settled.winner, &settled.wrong).await;

    let target = {
        let core = session.phase().lock().await;
        let still_staged =
            core.game_id == Some(game_id) && core.board.current.as_ref() == Some(&settled.screen);
        still_staged.then_some(core.board.message_id)
    };

    debug!(
        chat_id = session.chat_id(),
        round_id = %settled.round.round_id,
        winner = ?settled.winner,
        wrong = settled.wrong.len(),
        shown = target.is_some(),
        "round revealed"
    );

    if let Some(target) = target {
        board::present(state, session, target, settled.screen).await?;
    }
    recorded.map_err(Into::into)
}

/// "Scoreboard" button after a round.
pub async fn show_scoreboard(
    state: SharedState,
    callback: MessageCallback,
) -> Result<(), ServiceError> {
    let Payload::ShowScoreboard { game_id } = callback.payload else {
        return Err(invalid_payload(&callback));
    };
    let session = state.sessions().get_or_create(callback.chat_id);

    {
        let core = session.phase().lock().await;
        core.expect_game(game_id)?;
        core.expect_player(callback.user_id)?;
        if !matches!(core.phase(), GamePhase::ShowAnswer | GamePhase::ShowScoreboard) {
            return Err(StaleReason::TooLate.into());
        }
    }

    let scores = state.store().get_scores(game_id).await?;

    let (screen, target) = {
        let mut core = session.phase().lock().await;
        core.expect_game(game_id)?;
        match core.phase() {
            GamePhase::ShowAnswer => {
                core.apply(GameEvent::ShowScoreboard)?;
            }
            GamePhase::ShowScoreboard => {}
            _ => return Err(StaleReason::TooLate.into()),
        }
        let screen = screens::scoreboard(game_id, &scores);
        let target = board::stage(&mut core, &screen);
        (screen, target)
    };

    board::present(&state, &session, target, screen).await
}

async fn record_round(
    state: &SharedState,
    game_id: GameId,
    round: &Round,
    winner: Option<UserId>,
    wrong: &[UserId],
) -> Result<(), StorageError> {
    let store = state.store();
    if winner.is_some() || !wrong.is_empty() {
        store
            .update_scores(game_id, winner, wrong.to_vec(), round.price)
            .await?;
    }
    store
        .mark_question_asked(game_id, round.question.id, winner.is_some())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::AnswerEntity;

    fn question(id: u32) -> QuestionEntity {
        QuestionEntity {
            id,
            theme_id: 1,
            title: format!("Q{id}"),
            answers: (0..4)
                .map(|n| AnswerEntity {
                    id: id * 10 + n,
                    title: format!("A{n}"),
                    is_correct: n == 2,
                })
                .collect(),
        }
    }

    #[test]
    fn early_wrong_answer_waits_early_correct_wins() {
        assert_eq!(resolution(false, false), Resolution::Pending);
        assert_eq!(resolution(true, false), Resolution::Winner);
        assert_eq!(resolution(true, true), Resolution::Winner);
        assert_eq!(resolution(false, true), Resolution::NoWinner);
    }

    #[test]
    fn drawn_round_keeps_the_correct_answer_after_shuffling() {
        let round = draw_round(1, 300, &[question(7)]).unwrap();

        assert_eq!(round.price, 300);
        assert_eq!(round.correct_answer_id, 72);
        assert!(round.is_correct(72));
        assert!(round.answer_title(70).is_some());
        assert!(round.answer_title(99).is_none());
        assert_eq!(round.question.answers.len(), 4);
    }

    #[test]
    fn nothing_to_draw_from_an_empty_pool() {
        assert!(draw_round(1, 100, &[]).is_none());
    }

    #[test]
    fn each_draw_gets_a_fresh_round_id() {
        let pool = [question(1)];
        let first = draw_round(1, 100, &pool).unwrap();
        let second = draw_round(1, 100, &pool).unwrap();
        assert_ne!(first.round_id, second.round_id);
    }
}
