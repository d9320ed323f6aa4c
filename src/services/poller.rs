//! Long-poll ingestion.
//!
//! Three loops run until [`Poller::stop`]: the long-poll loop pushes decoded
//! updates onto an in-process queue, the drain loop spawns a dispatch task per
//! update, and the gc loop prunes finished tasks. Stopping cancels the loops,
//! dispatches whatever is still queued and waits for every dispatch task.

use std::sync::Arc;

use thiserror::Error;
use tokio::{
    sync::{
        Mutex,
        mpsc::{self, UnboundedReceiver, UnboundedSender},
    },
    task::JoinHandle,
    time::{MissedTickBehavior, interval, sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::PollerConfig,
    dto::update::{DecodeError, Update, decode_batch},
    platform::{PlatformClient, PlatformError},
    services::dispatcher::Dispatcher,
};

type TaskList = Arc<Mutex<Vec<JoinHandle<()>>>>;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("long poll failed")]
    Transport(#[from] PlatformError),
    #[error("poll batch could not be decoded")]
    Decode(#[from] DecodeError),
    #[error("update queue is closed")]
    QueueClosed,
}

/// Fetch one batch, decode it whole and only then advance `cursor` and queue
/// the updates. On failure `cursor` is left untouched.
pub async fn poll_once(
    platform: &dyn PlatformClient,
    cursor: &mut Option<String>,
    queue: &UnboundedSender<Update>,
) -> Result<usize, PollError> {
    let batch = platform.long_poll_fetch(cursor.clone()).await?;
    let updates = decode_batch(batch.updates)?;

    *cursor = Some(batch.cursor);
    let count = updates.len();
    for update in updates {
        queue.send(update).map_err(|_| PollError::QueueClosed)?;
    }
    Ok(count)
}

pub struct Poller {
    platform: Arc<dyn PlatformClient>,
    dispatcher: Arc<Dispatcher>,
    config: PollerConfig,
    cancel: CancellationToken,
    tasks: TaskList,
    loops: Vec<JoinHandle<()>>,
}

impl Poller {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        dispatcher: Arc<Dispatcher>,
        config: PollerConfig,
    ) -> Self {
        Self {
            platform,
            dispatcher,
            config,
            cancel: CancellationToken::new(),
            tasks: Arc::new(Mutex::new(Vec::new())),
            loops: Vec::new(),
        }
    }

    /// Spawn the loops. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if !self.loops.is_empty() {
            return;
        }
        let (sender, receiver) = mpsc::unbounded_channel();

        self.loops.push(tokio::spawn(poll_loop(
            self.platform.clone(),
            sender,
            self.config.clone(),
            self.cancel.clone(),
        )));
        self.loops.push(tokio::spawn(drain_loop(
            receiver,
            self.dispatcher.clone(),
            self.tasks.clone(),
            self.config.drain_batch,
            self.cancel.clone(),
        )));
        self.loops.push(tokio::spawn(gc_loop(
            self.tasks.clone(),
            self.config.clone(),
            self.cancel.clone(),
        )));
        info!("update poller started");
    }

    /// Cancel the loops and wait for every in-flight dispatch.
    pub async fn stop(self) {
        self.cancel.cancel();
        for handle in self.loops {
            if let Err(err) = handle.await {
                warn!(error = %err, "poller loop ended abnormally");
            }
        }

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        let pending = tasks.len();
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "dispatch task failed");
            }
        }
        info!(pending, "update poller stopped");
    }
}

async fn poll_loop(
    platform: Arc<dyn PlatformClient>,
    queue: UnboundedSender<Update>,
    config: PollerConfig,
    cancel: CancellationToken,
) {
    let mut cursor = None;
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = poll_once(platform.as_ref(), &mut cursor, &queue) => outcome,
        };

        match outcome {
            Ok(0) => {}
            Ok(count) => debug!(count, cursor = ?cursor, "updates queued"),
            Err(PollError::QueueClosed) => {
                warn!("update queue closed; long poll stopping");
                break;
            }
            Err(err) => {
                warn!(
                    error = %err,
                    retry_in_ms = config.retry_delay.as_millis() as u64,
                    "long poll failed; retrying with the same cursor"
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(config.retry_delay) => {}
                }
            }
        }
    }
    debug!("long poll loop finished");
}

async fn drain_loop(
    mut queue: UnboundedReceiver<Update>,
    dispatcher: Arc<Dispatcher>,
    tasks: TaskList,
    batch: usize,
    cancel: CancellationToken,
) {
    let batch = batch.max(1);
    let mut buffer = Vec::with_capacity(batch);
    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = queue.recv_many(&mut buffer, batch) => received,
        };
        if received == 0 {
            break;
        }
        spawn_all(&dispatcher, &tasks, buffer.drain(..)).await;
    }

    queue.close();
    while let Some(update) = queue.recv().await {
        buffer.push(update);
    }
    if !buffer.is_empty() {
        debug!(count = buffer.len(), "dispatching updates left in the queue");
        spawn_all(&dispatcher, &tasks, buffer.drain(..)).await;
    }
}

async fn spawn_all(
    dispatcher: &Arc<Dispatcher>,
    tasks: &TaskList,
    updates: impl Iterator<Item = Update>,
) {
    let handles: Vec<JoinHandle<()>> = updates
        .map(|update| dispatcher.spawn_dispatch(update))
        .collect();
    tasks.lock().await.extend(handles);
}

async fn gc_loop(tasks: TaskList, config: PollerConfig, cancel: CancellationToken) {
    let mut ticker = interval(config.gc_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let mut tasks = tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|task| !task.is_finished());
        let pruned = before - tasks.len();
        if pruned > 0 {
            debug!(pruned, remaining = tasks.len(), "finished dispatch tasks pruned");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::quiz_store::{InMemoryQuizStore, QuizContent},
        dto::update::decode_update,
        platform::memory::MemoryPlatform,
        services::{flood_guard::SlidingWindowGuard, handlers::build_dispatcher},
        state::AppState,
    };

    #[tokio::test]
    async fn failed_poll_keeps_the_cursor() {
        let platform = MemoryPlatform::new();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut cursor = None;

        platform
            .push_updates(vec![json!({"type": "message_edit", "object": {"peer_id": 2000000001}})])
            .await;
        platform.push_failure("connection reset").await;

        assert_eq!(poll_once(&platform, &mut cursor, &sender).await.unwrap(), 1);
        assert_eq!(cursor.as_deref(), Some("1"));

        let err = poll_once(&platform, &mut cursor, &sender).await.unwrap_err();
        assert!(matches!(err, PollError::Transport(_)));
        assert_eq!(cursor.as_deref(), Some("1"));

        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn undecodable_batch_is_not_queued() {
        let platform = MemoryPlatform::new();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut cursor = Some("7".to_string());

        platform
            .push_updates(vec![json!({"type": "wall_post_new", "object": {}}), json!(42)])
            .await;

        let err = poll_once(&platform, &mut cursor, &sender).await.unwrap_err();
        assert!(matches!(err, PollError::Decode(_)));
        assert_eq!(cursor.as_deref(), Some("7"));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn updates_queued_at_cancel_are_still_dispatched() {
        let config = AppConfig::default();
        let platform = MemoryPlatform::new();
        let guard = Arc::new(SlidingWindowGuard::from_config(&config.flood));
        let store = Arc::new(InMemoryQuizStore::new(QuizContent::default()));
        let state = AppState::new(config, Arc::new(platform.clone()), store);
        let dispatcher = Arc::new(build_dispatcher(state, guard));

        let (sender, receiver) = mpsc::unbounded_channel();
        let update = decode_update(json!({
            "type": "message_new",
            "object": { "message": { "peer_id": 2000000001, "from_id": 11, "text": "/start" } }
        }))
        .unwrap();
        sender.send(update).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let tasks = TaskList::default();
        drain_loop(receiver, dispatcher, tasks.clone(), 10, cancel).await;

        let handles = std::mem::take(&mut *tasks.lock().await);
        assert_eq!(handles.len(), 1);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(platform.texts_for(2000000001).await.len(), 1);
    }
}
