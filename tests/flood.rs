mod common;

use std::time::Duration;

use common::*;
use trivia_bot::{
    dto::payload::Payload, services::dispatcher::FLOOD_NOTICE, state::state_machine::GamePhase,
};

#[tokio::test]
async fn flooded_chat_only_gets_a_snackbar() {
    let harness = Harness::with_config(|config| {
        config.flood.max_events = 3;
        config.flood.window = Duration::from_secs(60);
    });
    harness.invite_bot().await;
    harness.press(ANN, Payload::NewGame).await;
    harness.press(ANN, Payload::Join).await;
    let before = harness.platform.texts_for(CHAT).await.len();

    harness.press(BOB, Payload::Join).await;

    assert_eq!(
        harness.platform.snackbars_for(BOB).await,
        vec![FLOOD_NOTICE.to_string()]
    );
    assert_eq!(harness.platform.texts_for(CHAT).await.len(), before);
    let session = harness.state.sessions().get(CHAT).unwrap();
    assert_eq!(session.roster().lock().await.len(), 1);
    assert_eq!(harness.phase().await, GamePhase::JoinUsers);
}

#[tokio::test]
async fn flooded_text_commands_are_dropped_silently() {
    let harness = Harness::with_config(|config| {
        config.flood.max_events = 1;
        config.flood.window = Duration::from_secs(60);
    });
    harness.say(ANN, "menu").await;
    harness.say(ANN, "menu").await;

    assert_eq!(harness.platform.texts_for(CHAT).await.len(), 1);
    assert_eq!(harness.platform.acknowledgements().await, 0);
}
