//! Routes classified updates to the first subscriber whose predicate matches.

use std::{future::Future, sync::Arc};

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::{
    dto::{
        event::{ChatInvite, Classified, Event, MessageCallback, MessageText, classify},
        update::Update,
    },
    error::ServiceError,
    platform::CallbackRef,
    services::flood_guard::FloodGuard,
    state::SharedState,
};

/// Snackbar shown when a chat is over its rate limit.
pub const FLOOD_NOTICE: &str = "Too many clicks, slow down a little";

type Predicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type Handler<E> =
    Box<dyn Fn(SharedState, E) -> BoxFuture<'static, Result<(), ServiceError>> + Send + Sync>;

struct Subscriber<E> {
    name: &'static str,
    predicate: Predicate<E>,
    handler: Handler<E>,
}

impl<E> Subscriber<E> {
    fn new<P, H, Fut>(name: &'static str, predicate: P, handler: H) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
        H: Fn(SharedState, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        Self {
            name,
            predicate: Box::new(predicate),
            handler: Box::new(move |state, event| Box::pin(handler(state, event))),
        }
    }
}

/// Subscriber registry, built once at startup and shared by every dispatch task.
pub struct Dispatcher {
    state: SharedState,
    flood_guard: Arc<dyn FloodGuard>,
    invites: Vec<Subscriber<ChatInvite>>,
    texts: Vec<Subscriber<MessageText>>,
    callbacks: Vec<Subscriber<MessageCallback>>,
}

impl Dispatcher {
    pub fn new(state: SharedState, flood_guard: Arc<dyn FloodGuard>) -> Self {
        Self {
            state,
            flood_guard,
            invites: Vec::new(),
            texts: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    pub fn on_chat_invite<P, H, Fut>(&mut self, name: &'static str, predicate: P, handler: H) -> &mut Self
    where
        P: Fn(&ChatInvite) -> bool + Send + Sync + 'static,
        H: Fn(SharedState, ChatInvite) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        self.invites.push(Subscriber::new(name, predicate, handler));
        self
    }

    pub fn on_message_text<P, H, Fut>(&mut self, name: &'static str, predicate: P, handler: H) -> &mut Self
    where
        P: Fn(&MessageText) -> bool + Send + Sync + 'static,
        H: Fn(SharedState, MessageText) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        self.texts.push(Subscriber::new(name, predicate, handler));
        self
    }

    pub fn on_message_callback<P, H, Fut>(
        &mut self,
        name: &'static str,
        predicate: P,
        handler: H,
    ) -> &mut Self
    where
        P: Fn(&MessageCallback) -> bool + Send + Sync + 'static,
        H: Fn(SharedState, MessageCallback) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        self.callbacks.push(Subscriber::new(name, predicate, handler));
        self
    }

    /// Handle one update on a task of its own.
    pub fn spawn_dispatch(self: &Arc<Self>, update: Update) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(update).await })
    }

    /// Classify `update` and run the matching subscriber. Button presses are
    /// always acknowledged, whatever the outcome.
    pub async fn dispatch(&self, update: Update) {
        let event = match classify(&update) {
            Classified::Event(event) => event,
            Classified::Edit => {
                trace!(chat_id = ?update.chat_id, "message edit ignored");
                return;
            }
            Classified::Unknown(kind) => {
                info!(kind, "unhandled update type");
                return;
            }
            Classified::Malformed { callback, reason } => {
                warn!(chat_id = ?update.chat_id, reason, "malformed update dropped");
                if let Some(callback) = callback {
                    self.acknowledge(callback, None).await;
                }
                return;
            }
        };

        let chat_id = event.chat_id();
        if self.flood_guard.is_flood_detected(chat_id) {
            warn!(
                chat_id,
                user_id = event.user_id(),
                kind = event.kind(),
                "flood detected; event dropped"
            );
            if let Event::MessageCallback(callback) = &event {
                self.acknowledge(callback.callback_ref(), Some(FLOOD_NOTICE))
                    .await;
            }
            return;
        }

        match event {
            Event::ChatInvite(invite) => {
                route(&self.state, &self.invites, invite).await;
            }
            Event::MessageText(message) => {
                route(&self.state, &self.texts, message).await;
            }
            Event::MessageCallback(callback) => {
                let reference = callback.callback_ref();
                let notice = match route(&self.state, &self.callbacks, callback).await {
                    Some(Err(err)) => err.notice(),
                    _ => None,
                };
                self.acknowledge(reference, notice).await;
            }
        }
    }

    async fn acknowledge(&self, callback: CallbackRef, notice: Option<&str>) {
        let chat_id = callback.chat_id;
        if let Err(err) = self
            .state
            .platform()
            .answer_callback(callback, notice.map(str::to_string))
            .await
        {
            warn!(chat_id, error = %err, "failed to acknowledge callback");
        }
    }
}

/// Run the first matching subscriber. `None` when nobody is interested.
async fn route<E>(
    state: &SharedState,
    subscribers: &[Subscriber<E>],
    event: E,
) -> Option<Result<(), ServiceError>> {
    let Some(subscriber) = subscribers
        .iter()
        .find(|subscriber| (subscriber.predicate)(&event))
    else {
        debug!("no subscriber for event");
        return None;
    };

    let outcome = (subscriber.handler)(state.clone(), event).await;
    match &outcome {
        Ok(()) => trace!(subscriber = subscriber.name, "handled"),
        Err(ServiceError::Stale(reason)) => {
            debug!(subscriber = subscriber.name, ?reason, "stale event rejected")
        }
        Err(err) => warn!(subscriber = subscriber.name, error = %err, "handler failed"),
    }
    Some(outcome)
}
