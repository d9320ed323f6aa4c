//! Application-level configuration loading: poller cadence, game timing and
//! flood limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds};
use tracing::{info, warn};

/// Default location on disk where the bot looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_BOT_CONFIG_PATH";
/// Default location of the quiz content document.
const DEFAULT_CONTENT_PATH: &str = "config/quiz.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub poller: PollerConfig,
    pub game: GameConfig,
    pub flood: FloodConfig,
}

/// Long-poll ingestion settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Pause before retrying a failed poll.
    #[serde(with = "serde_with::As::<DurationMilliSeconds<u64>>")]
    pub retry_delay: Duration,
    /// Most queued updates handed to the dispatcher per wake-up.
    pub drain_batch: usize,
    /// How often finished dispatch tasks are pruned.
    #[serde(with = "serde_with::As::<DurationMilliSeconds<u64>>")]
    pub gc_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            drain_batch: 100,
            gc_interval: Duration::from_secs(5),
        }
    }
}

/// Gameplay timing and content.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// How long the answer window stays open.
    #[serde(with = "serde_with::As::<DurationSeconds<u64>>")]
    pub answer_window: Duration,
    /// Edit the question with a visible countdown while the window is open.
    pub countdown: bool,
    #[serde(with = "serde_with::As::<DurationMilliSeconds<u64>>")]
    pub countdown_tick: Duration,
    /// Quiz content document loaded at startup.
    pub content_path: PathBuf,
    /// Sticker sent along with the final scoreboard.
    pub final_sticker_id: Option<i64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            answer_window: Duration::from_secs(15),
            countdown: true,
            countdown_tick: Duration::from_secs(1),
            content_path: PathBuf::from(DEFAULT_CONTENT_PATH),
            final_sticker_id: None,
        }
    }
}

/// Per-chat event rate limit.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Events accepted per chat inside one window.
    pub max_events: usize,
    #[serde(with = "serde_with::As::<DurationMilliSeconds<u64>>")]
    pub window: Duration,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            max_events: 15,
            window: Duration::from_secs(3),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        answer_window_secs = config.game.answer_window.as_secs(),
                        flood_max = config.flood.max_events,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
