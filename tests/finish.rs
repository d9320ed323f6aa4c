mod common;

use common::*;
use trivia_bot::{
    dto::payload::Payload,
    platform::memory::OutboundCall,
    state::state_machine::GamePhase,
};

async fn play_round(harness: &Harness, game_id: uuid::Uuid, theme_id: u32, price: i64) {
    harness.pick(ANN, game_id, theme_id, price).await;
    assert_eq!(harness.phase().await, GamePhase::GetAnswer);
    let round = harness.round().await;
    harness.answer(ANN, &round, true).await;
    harness.press(ANN, Payload::ShowThemes { game_id }).await;
}

fn offered_themes(keyboard: &trivia_bot::platform::Keyboard) -> Vec<u32> {
    keyboard
        .buttons()
        .filter_map(|button| match button.payload {
            Payload::ChooseTheme { theme_id, .. } => Some(theme_id),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn theme_without_questions_leaves_the_board() {
    let harness = Harness::new();
    let game_id = harness.start_game(&[ANN]).await;

    play_round(&harness, game_id, SCIENCE, 100).await;
    let keyboard = harness.platform.last_keyboard(CHAT).await.unwrap();
    assert_eq!(offered_themes(&keyboard), vec![GEOGRAPHY, SCIENCE]);

    // Science had a single question.
    harness.pick(ANN, game_id, SCIENCE, 200).await;
    assert_eq!(harness.phase().await, GamePhase::ChooseTheme);
    let keyboard = harness.platform.last_keyboard(CHAT).await.unwrap();
    assert_eq!(offered_themes(&keyboard), vec![GEOGRAPHY]);
}

#[tokio::test]
async fn running_out_of_themes_finishes_the_game() {
    let harness = Harness::new();
    let game_id = harness.start_game(&[ANN]).await;

    play_round(&harness, game_id, SCIENCE, 100).await;
    harness.pick(ANN, game_id, SCIENCE, 200).await;
    play_round(&harness, game_id, GEOGRAPHY, 100).await;
    play_round(&harness, game_id, GEOGRAPHY, 200).await;
    assert_eq!(harness.phase().await, GamePhase::ChooseTheme);

    harness.pick(ANN, game_id, GEOGRAPHY, 300).await;

    assert_eq!(harness.phase().await, GamePhase::GameFinished);
    let game = harness.store.game(game_id).unwrap();
    assert!(game.finished_at.is_some());
    assert!(!game.is_stopped);

    let texts = harness.platform.texts_for(CHAT).await;
    let last = texts.last().unwrap();
    assert!(last.starts_with("All questions have been played"));
    assert!(last.contains("1. Ann Lee: 400"));
    assert!(harness.core(|core| core.game_id.is_none()).await);
}

#[tokio::test]
async fn fully_played_theme_is_not_listed_and_ends_the_game() {
    let harness = Harness::with_content(single_theme(5));
    let game_id = harness.start_game(&[ANN]).await;

    for price in [100, 200, 300, 400] {
        play_round(&harness, game_id, 1, price).await;
        assert_eq!(harness.phase().await, GamePhase::ChooseTheme);
    }
    harness.pick(ANN, game_id, 1, 500).await;
    let round = harness.round().await;
    harness.answer(ANN, &round, true).await;

    assert!(harness.core(|core| core.slots(1).is_exhausted()).await);
    harness.press(ANN, Payload::ShowThemes { game_id }).await;

    assert_eq!(harness.phase().await, GamePhase::GameFinished);
    assert!(
        harness
            .platform
            .texts_for(CHAT)
            .await
            .last()
            .unwrap()
            .contains("1. Ann Lee: 1500")
    );
}

#[tokio::test]
async fn stop_prompt_can_be_cancelled() {
    let harness = Harness::new();
    let game_id = harness.start_game(&[ANN, BOB]).await;

    harness.press(ANN, Payload::StopGame { game_id }).await;
    assert_eq!(
        harness.platform.texts_for(CHAT).await.last().unwrap(),
        "Stop the game?"
    );

    harness.press(BOB, Payload::CancelStopGame { game_id }).await;
    assert_eq!(harness.phase().await, GamePhase::ChooseTheme);
    assert!(
        harness
            .platform
            .texts_for(CHAT)
            .await
            .last()
            .unwrap()
            .starts_with("Pick a theme.")
    );

    // The prompt is gone, so a second cancel has nothing to restore.
    harness.press(BOB, Payload::CancelStopGame { game_id }).await;
    assert_eq!(
        harness.platform.snackbars_for(BOB).await,
        vec!["Too late!".to_string()]
    );
}

#[tokio::test]
async fn confirmed_stop_posts_the_final_scoreboard() {
    let harness = Harness::new();
    let game_id = harness.start_game(&[ANN, BOB]).await;
    harness.pick(ANN, game_id, GEOGRAPHY, 100).await;
    let round = harness.round().await;
    harness.answer(BOB, &round, true).await;

    harness.press(CARL, Payload::StopGame { game_id }).await;
    assert_eq!(
        harness.platform.snackbars_for(CARL).await,
        vec!["You are not playing in this game".to_string()]
    );

    harness.press(ANN, Payload::StopGame { game_id }).await;
    let board = harness.core(|core| core.board.message_id).await.unwrap();
    harness.press(BOB, Payload::ConfirmStopGame { game_id }).await;

    assert_eq!(harness.phase().await, GamePhase::GameFinished);
    assert!(harness.store.game(game_id).unwrap().is_stopped);
    let calls = harness.platform.calls().await;
    assert!(calls.contains(&OutboundCall::Deleted {
        chat_id: CHAT,
        message_id: board,
    }));
    let last = harness.platform.texts_for(CHAT).await.pop().unwrap();
    assert!(last.starts_with("The game was stopped."));
    assert!(last.contains("1. Bob: 100\n2. Ann Lee: 0"));
}

#[tokio::test]
async fn stop_is_refused_while_a_question_is_open() {
    let harness = Harness::new();
    let game_id = harness.start_game(&[ANN, BOB]).await;
    harness.pick(ANN, game_id, GEOGRAPHY, 100).await;

    harness.press(ANN, Payload::StopGame { game_id }).await;

    assert_eq!(harness.phase().await, GamePhase::GetAnswer);
    assert_eq!(
        harness.platform.snackbars_for(ANN).await,
        vec!["Too late!".to_string()]
    );
}

#[tokio::test]
async fn typed_stop_ends_the_game_while_a_price_is_pending() {
    let harness = Harness::new();
    let game_id = harness.start_game(&[ANN, BOB]).await;

    harness.say(BOB, "stop").await;
    assert_eq!(harness.phase().await, GamePhase::ChooseTheme);

    harness
        .press(
            ANN,
            Payload::ChooseTheme {
                game_id,
                theme_id: GEOGRAPHY,
            },
        )
        .await;
    harness.say(CARL, "stop").await;
    assert_eq!(harness.phase().await, GamePhase::ChooseQuestion);

    harness.say(BOB, "[club1|@trivia] STOP").await;
    assert_eq!(harness.phase().await, GamePhase::GameFinished);
    assert!(harness.store.game(game_id).unwrap().is_stopped);
}

#[tokio::test]
async fn buttons_from_a_finished_game_are_rejected() {
    let harness = Harness::new();
    let old_game = harness.start_game(&[ANN, BOB]).await;
    harness.press(ANN, Payload::StopGame { game_id: old_game }).await;
    harness
        .press(ANN, Payload::ConfirmStopGame { game_id: old_game })
        .await;

    harness.press(BOB, Payload::NewGame).await;
    assert_eq!(harness.phase().await, GamePhase::JoinUsers);
    harness.press(BOB, Payload::Join).await;
    harness.press(BOB, Payload::StartGame).await;
    let new_game = harness.game_id().await;
    assert_ne!(new_game, old_game);

    harness
        .press(
            ANN,
            Payload::ShowThemes {
                game_id: old_game,
            },
        )
        .await;
    assert_eq!(
        harness.platform.snackbars_for(ANN).await,
        vec!["That button belongs to an old game".to_string()]
    );
    assert_eq!(harness.core(|core| core.turn_user_id).await, Some(BOB));
}
