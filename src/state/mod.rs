pub mod game;
pub mod session;
pub mod state_machine;
pub mod transitions;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::{
    config::AppConfig,
    dao::quiz_store::QuizStore,
    error::ServiceError,
    platform::{PlatformClient, UserId, UserSummary},
    services::timer::TimerScheduler,
};

pub use self::session::{ChatSession, SessionCore, SessionStore};

pub type SharedState = Arc<AppState>;

/// Central application state: collaborators, chat sessions and shared caches.
pub struct AppState {
    config: AppConfig,
    platform: Arc<dyn PlatformClient>,
    store: Arc<dyn QuizStore>,
    sessions: SessionStore,
    users: DashMap<UserId, UserSummary>,
    timers: TimerScheduler,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn QuizStore>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            platform,
            store,
            sessions: SessionStore::new(),
            users: DashMap::new(),
            timers: TimerScheduler::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn platform(&self) -> &Arc<dyn PlatformClient> {
        &self.platform
    }

    pub fn store(&self) -> &Arc<dyn QuizStore> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn timers(&self) -> &TimerScheduler {
        &self.timers
    }

    /// Profile of `user_id`, fetched from the platform once and cached afterwards.
    pub async fn user_summary(&self, user_id: UserId) -> Result<UserSummary, ServiceError> {
        if let Some(cached) = self.users.get(&user_id) {
            return Ok(cached.value().clone());
        }

        let fetched = self
            .platform
            .fetch_user_info(user_id)
            .await
            .map_err(|err| {
                debug!(user_id, error = %err, "user lookup failed");
                ServiceError::MissingUserInfo(user_id)
            })?
            .ok_or(ServiceError::MissingUserInfo(user_id))?;

        self.users.insert(user_id, fetched.clone());
        Ok(fetched)
    }
}
