use std::{collections::VecDeque, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;

use crate::{config::FloodConfig, platform::ChatId};

/// Per-chat rate check consulted before any handler runs.
pub trait FloodGuard: Send + Sync {
    /// Record an incoming event for `chat_id` and report whether it exceeds the limit.
    fn is_flood_detected(&self, chat_id: ChatId) -> bool;
}

/// Accepts at most `max_events` per chat within any `window`-long interval.
/// Rejected events are not recorded, so a flood does not extend its own ban.
pub struct SlidingWindowGuard {
    max_events: usize,
    window: Duration,
    hits: DashMap<ChatId, VecDeque<Instant>>,
}

impl SlidingWindowGuard {
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            max_events,
            window,
            hits: DashMap::new(),
        }
    }

    pub fn from_config(config: &FloodConfig) -> Self {
        Self::new(config.max_events, config.window)
    }
}

impl FloodGuard for SlidingWindowGuard {
    fn is_flood_detected(&self, chat_id: ChatId) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.entry(chat_id).or_default();

        while hits
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max_events {
            return true;
        }
        hits.push_back(now);
        false
    }
}
