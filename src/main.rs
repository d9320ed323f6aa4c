//! trivia-bot binary entrypoint wiring the platform client, quiz content and the update poller.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trivia_bot::{
    config::AppConfig,
    dao::quiz_store::{InMemoryQuizStore, QuizStore, load_content},
    platform::PlatformClient,
    services::{flood_guard::SlidingWindowGuard, handlers::build_dispatcher, poller::Poller},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();

    let content = load_content(&config.game.content_path).with_context(|| {
        format!(
            "loading quiz content from {}",
            config.game.content_path.display()
        )
    })?;
    info!(
        themes = content.themes.len(),
        questions = content.questions.len(),
        "quiz content loaded"
    );
    let store: Arc<dyn QuizStore> = Arc::new(InMemoryQuizStore::new(content));

    let platform = connect_platform().await?;

    let flood_guard = Arc::new(SlidingWindowGuard::from_config(&config.flood));
    let poller_config = config.poller.clone();
    let state = AppState::new(config, platform.clone(), store);
    let dispatcher = Arc::new(build_dispatcher(state.clone(), flood_guard));

    let mut poller = Poller::new(platform, dispatcher, poller_config);
    poller.start();

    shutdown_signal().await;
    info!("shutdown requested");

    poller.stop().await;
    state.timers().shutdown().await;
    info!("bye");

    Ok(())
}

#[cfg(feature = "vk-platform")]
async fn connect_platform() -> anyhow::Result<Arc<dyn PlatformClient>> {
    use trivia_bot::platform::vk::{VkConfig, VkPlatformClient};

    let config = VkConfig::from_env().context("reading VK settings")?;
    let client = VkPlatformClient::connect(config)
        .await
        .context("connecting to the VK long poll server")?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "vk-platform"))]
async fn connect_platform() -> anyhow::Result<Arc<dyn PlatformClient>> {
    anyhow::bail!("built without a platform client; enable the `vk-platform` feature")
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
