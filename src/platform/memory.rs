//! In-process platform double. Poll batches are scripted by the caller and every
//! outbound call is recorded so game flows can run without a network.

use std::{
    collections::VecDeque,
    io,
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};

use super::{
    CallbackRef, ChatId, Keyboard, MessageId, OutgoingMessage, PlatformClient, PlatformError,
    PlatformResult, PollBatch, UserId, UserSummary,
};

const DEFAULT_POLL_WAIT: Duration = Duration::from_millis(50);

/// Outbound call observed by [`MemoryPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCall {
    Sent {
        message_id: MessageId,
        message: OutgoingMessage,
    },
    Edited {
        chat_id: ChatId,
        message_id: MessageId,
        text: Option<String>,
        keyboard: Option<Keyboard>,
    },
    Deleted {
        chat_id: ChatId,
        message_id: MessageId,
    },
    Answered {
        callback: CallbackRef,
        snackbar: Option<String>,
    },
}

enum Scripted {
    Batch(Vec<Value>),
    Failure(String),
}

struct Inner {
    scripted: Mutex<VecDeque<Scripted>>,
    arrived: Notify,
    cursor: AtomicU64,
    next_message_id: AtomicI64,
    users: DashMap<UserId, UserSummary>,
    calls: Mutex<Vec<OutboundCall>>,
    polled_cursors: Mutex<Vec<Option<String>>>,
    poll_wait: Duration,
    send_delay_ms: AtomicU64,
}

/// Cloneable handle; clones share the same script and call log.
#[derive(Clone)]
pub struct MemoryPlatform {
    inner: Arc<Inner>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::with_poll_wait(DEFAULT_POLL_WAIT)
    }

    /// Build a platform whose empty polls block for `poll_wait` before returning.
    pub fn with_poll_wait(poll_wait: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                scripted: Mutex::new(VecDeque::new()),
                arrived: Notify::new(),
                cursor: AtomicU64::new(0),
                next_message_id: AtomicI64::new(1),
                users: DashMap::new(),
                calls: Mutex::new(Vec::new()),
                polled_cursors: Mutex::new(Vec::new()),
                poll_wait,
                send_delay_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Make a user resolvable through `fetch_user_info`.
    pub fn register_user(&self, id: UserId, first_name: &str, last_name: &str) {
        self.inner.users.insert(
            id,
            UserSummary {
                id,
                first_name: first_name.into(),
                last_name: last_name.into(),
            },
        );
    }

    /// Make every later `send_message` take `delay` before it is recorded.
    pub fn delay_sends(&self, delay: Duration) {
        self.inner
            .send_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Queue a batch of raw updates for the next poll.
    pub async fn push_updates(&self, updates: Vec<Value>) {
        self.inner
            .scripted
            .lock()
            .await
            .push_back(Scripted::Batch(updates));
        self.inner.arrived.notify_one();
    }

    /// Queue a transport failure for the next poll.
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.inner
            .scripted
            .lock()
            .await
            .push_back(Scripted::Failure(message.into()));
        self.inner.arrived.notify_one();
    }

    /// Every outbound call in the order it was made.
    pub async fn calls(&self) -> Vec<OutboundCall> {
        self.inner.calls.lock().await.clone()
    }

    /// Cursor argument of every poll attempt, in order.
    pub async fn polled_cursors(&self) -> Vec<Option<String>> {
        self.inner.polled_cursors.lock().await.clone()
    }

    /// Snackbar texts shown to `user_id` (acknowledgements without text are skipped).
    pub async fn snackbars_for(&self, user_id: UserId) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                OutboundCall::Answered { callback, snackbar } if callback.user_id == user_id => {
                    snackbar
                }
                _ => None,
            })
            .collect()
    }

    /// Number of callback acknowledgements sent, with or without text.
    pub async fn acknowledgements(&self) -> usize {
        self.calls()
            .await
            .iter()
            .filter(|call| matches!(call, OutboundCall::Answered { .. }))
            .count()
    }

    /// Texts rendered into `chat_id`, whether freshly sent or edited in place.
    pub async fn texts_for(&self, chat_id: ChatId) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                OutboundCall::Sent { message, .. } if message.chat_id == chat_id => message.text,
                OutboundCall::Edited {
                    chat_id: target,
                    text,
                    ..
                } if target == chat_id => text,
                _ => None,
            })
            .collect()
    }

    /// Most recent keyboard rendered into `chat_id`.
    pub async fn last_keyboard(&self, chat_id: ChatId) -> Option<Keyboard> {
        self.calls()
            .await
            .into_iter()
            .rev()
            .find_map(|call| match call {
                OutboundCall::Sent { message, .. } if message.chat_id == chat_id => {
                    message.keyboard
                }
                OutboundCall::Edited {
                    chat_id: target,
                    keyboard,
                    ..
                } if target == chat_id => keyboard,
                _ => None,
            })
    }

    async fn record(&self, call: OutboundCall) {
        self.inner.calls.lock().await.push(call);
    }
}

impl PlatformClient for MemoryPlatform {
    fn long_poll_fetch(&self, cursor: Option<String>) -> BoxFuture<'static, PlatformResult<PollBatch>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.polled_cursors.lock().await.push(cursor.clone());

            let mut next = inner.scripted.lock().await.pop_front();
            if next.is_none() {
                let _ = tokio::time::timeout(inner.poll_wait, inner.arrived.notified()).await;
                next = inner.scripted.lock().await.pop_front();
            }

            match next {
                Some(Scripted::Batch(updates)) => {
                    let cursor = inner.cursor.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(PollBatch {
                        updates,
                        cursor: cursor.to_string(),
                    })
                }
                Some(Scripted::Failure(message)) => Err(PlatformError::transport(
                    "long_poll",
                    io::Error::other(message),
                )),
                None => Ok(PollBatch {
                    updates: Vec::new(),
                    cursor: cursor.unwrap_or_else(|| "0".into()),
                }),
            }
        })
    }

    fn send_message(&self, message: OutgoingMessage) -> BoxFuture<'static, PlatformResult<MessageId>> {
        let platform = self.clone();
        Box::pin(async move {
            let delay = platform.inner.send_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            let message_id = platform
                .inner
                .next_message_id
                .fetch_add(1, Ordering::SeqCst);
            platform
                .record(OutboundCall::Sent {
                    message_id,
                    message,
                })
                .await;
            Ok(message_id)
        })
    }

    fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: Option<String>,
        keyboard: Option<Keyboard>,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move {
            platform
                .record(OutboundCall::Edited {
                    chat_id,
                    message_id,
                    text,
                    keyboard,
                })
                .await;
            Ok(())
        })
    }

    fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move {
            platform
                .record(OutboundCall::Deleted {
                    chat_id,
                    message_id,
                })
                .await;
            Ok(())
        })
    }

    fn answer_callback(
        &self,
        callback: CallbackRef,
        snackbar: Option<String>,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move {
            platform
                .record(OutboundCall::Answered { callback, snackbar })
                .await;
            Ok(())
        })
    }

    fn fetch_user_info(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'static, PlatformResult<Option<UserSummary>>> {
        let user = self.inner.users.get(&user_id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(user) })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn scripted_batches_advance_the_cursor() {
        let platform = MemoryPlatform::new();
        platform.push_updates(vec![json!({"type": "message_new"})]).await;

        let batch = platform.long_poll_fetch(None).await.unwrap();
        assert_eq!(batch.updates.len(), 1);
        assert_eq!(batch.cursor, "1");

        let empty = platform
            .long_poll_fetch(Some(batch.cursor.clone()))
            .await
            .unwrap();
        assert!(empty.updates.is_empty());
        assert_eq!(empty.cursor, "1");
        assert_eq!(platform.polled_cursors().await, vec![None, Some("1".into())]);
    }

    #[tokio::test]
    async fn scripted_failure_is_a_transport_error() {
        let platform = MemoryPlatform::new();
        platform.push_failure("connection reset").await;

        let err = platform.long_poll_fetch(None).await.unwrap_err();
        assert!(matches!(err, PlatformError::Transport { .. }));
    }

    #[tokio::test]
    async fn unknown_users_resolve_to_none() {
        let platform = MemoryPlatform::new();
        platform.register_user(7, "Ada", "Lovelace");

        assert_eq!(
            platform.fetch_user_info(7).await.unwrap().map(|u| u.display_name()),
            Some("Ada Lovelace".to_string())
        );
        assert!(platform.fetch_user_info(8).await.unwrap().is_none());
    }
}
