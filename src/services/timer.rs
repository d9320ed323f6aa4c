//! Cancellable delayed actions keyed by id.
//!
//! A timer leaves the registry the moment it starts firing, so [`TimerScheduler::cancel`]
//! on a firing or finished timer is a no-op. Callers that race a timer must still
//! re-check session state before acting on its outcome. Task handles are kept
//! until the task ends, so [`TimerScheduler::shutdown`] also waits for actions
//! that are already running.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

pub type TimerId = Uuid;

/// Renders the remaining time once per tick before the action fires.
#[derive(Clone)]
pub struct Countdown {
    pub tick: Duration,
    pub render: Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>,
}

impl Countdown {
    pub fn new<F>(tick: Duration, render: F) -> Self
    where
        F: Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self {
            tick,
            render: Arc::new(render),
        }
    }
}

struct PendingTimer {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
pub struct TimerScheduler {
    timers: Arc<DashMap<TimerId, PendingTimer>>,
    /// Every timer task still running, keyed by generation.
    tasks: Arc<DashMap<u64, JoinHandle<()>>>,
    generation: AtomicU64,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `window` unless cancelled first. Scheduling an id that
    /// is already pending replaces the previous timer.
    pub fn schedule<F>(&self, id: TimerId, window: Duration, countdown: Option<Countdown>, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        // The entry guard is held until the timer is registered, so a zero-length
        // window cannot fire before it is visible to `cancel`.
        let entry = self.timers.entry(id);
        if let Entry::Occupied(previous) = &entry {
            debug!(timer_id = %id, "replacing pending timer");
            previous.get().cancel.cancel();
        }

        let timers = self.timers.clone();
        let tasks = self.tasks.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let wait = async {
                match countdown {
                    Some(countdown) => run_countdown(window, countdown).await,
                    None => tokio::time::sleep(window).await,
                }
            };

            let elapsed = tokio::select! {
                _ = token.cancelled() => false,
                _ = wait => true,
            };

            // A `false` from `remove_if` means the timer was cancelled between
            // the sleep ending and the removal.
            if elapsed
                && timers
                    .remove_if(&id, |_, pending| pending.generation == generation)
                    .is_some()
            {
                debug!(timer_id = %id, "timer fired");
                action.await;
            }
            tasks.remove(&generation);
        });
        // Registered while the entry guard is still held: the task cannot reach
        // its own removal before this insert.
        self.tasks.insert(generation, handle);

        let pending = PendingTimer { generation, cancel };
        match entry {
            Entry::Occupied(mut occupied) => {
                occupied.insert(pending);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(pending);
            }
        }
    }

    /// Cancel a pending timer. Returns `false` when it already fired or never existed.
    pub fn cancel(&self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some((_, pending)) => {
                pending.cancel.cancel();
                debug!(timer_id = %id, "timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Cancel every pending timer, then wait for all timer tasks, including
    /// actions that had already started firing.
    pub async fn shutdown(&self) {
        let ids: Vec<TimerId> = self.timers.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, pending)) = self.timers.remove(&id) {
                pending.cancel.cancel();
            }
        }

        let generations: Vec<u64> = self.tasks.iter().map(|entry| *entry.key()).collect();
        let handles: Vec<JoinHandle<()>> = generations
            .into_iter()
            .filter_map(|generation| self.tasks.remove(&generation))
            .map(|(_, handle)| handle)
            .collect();
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "timer task failed during shutdown");
            }
        }
    }
}

async fn run_countdown(window: Duration, countdown: Countdown) {
    let tick = countdown.tick.max(Duration::from_millis(1));
    let mut remaining = window;
    while !remaining.is_zero() {
        (countdown.render)(remaining).await;
        let step = remaining.min(tick);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
}
