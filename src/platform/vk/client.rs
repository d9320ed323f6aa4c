use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::platform::{
    CallbackRef, ChatId, Keyboard, MessageId, OutgoingMessage, PlatformClient, PlatformResult,
    PollBatch, UserId, UserSummary,
};

use super::{
    config::VkConfig,
    error::{VkApiError, VkResult},
    models::{ApiEnvelope, LongPollResponse, LongPollServer, SentMessage, UserRow, keyboard_json},
};

/// Extra time granted on top of the long-poll wait before the HTTP request times out.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Group-token client for the VK bots API.
#[derive(Clone)]
pub struct VkPlatformClient {
    client: Client,
    config: Arc<VkConfig>,
    long_poll: Arc<RwLock<Option<LongPollServer>>>,
}

impl VkPlatformClient {
    /// Build the HTTP client and register with the group long-poll server.
    pub async fn connect(config: VkConfig) -> VkResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.wait_secs) + POLL_GRACE)
            .build()
            .map_err(|source| VkApiError::ClientBuilder { source })?;

        let platform = Self {
            client,
            config: Arc::new(config),
            long_poll: Arc::new(RwLock::new(None)),
        };

        platform.refresh_long_poll_server().await?;
        Ok(platform)
    }

    async fn call<T>(&self, method: &str, mut params: Vec<(&'static str, String)>) -> VkResult<T>
    where
        T: DeserializeOwned,
    {
        params.push(("access_token", self.config.token.clone()));
        params.push(("v", self.config.api_version.clone()));

        let url = format!("{}/{}", self.config.api_base.trim_end_matches('/'), method);
        let response = self
            .client
            .post(url)
            .form(&params)
            .send()
            .await
            .map_err(|source| VkApiError::RequestSend {
                method: method.to_string(),
                source,
            })?;

        let envelope = response
            .json::<ApiEnvelope>()
            .await
            .map_err(|source| VkApiError::DecodeResponse {
                method: method.to_string(),
                source,
            })?;

        match envelope {
            ApiEnvelope::Ok { response } => {
                serde_json::from_value(response).map_err(|source| VkApiError::UnexpectedShape {
                    method: method.to_string(),
                    source,
                })
            }
            ApiEnvelope::Err { error } => Err(VkApiError::Api {
                method: method.to_string(),
                code: error.error_code,
                message: error.error_msg,
            }),
        }
    }

    /// Fetch a fresh key/server pair and return the server's current cursor.
    async fn refresh_long_poll_server(&self) -> VkResult<String> {
        let server: LongPollServer = self
            .call(
                "groups.getLongPollServer",
                vec![("group_id", self.config.group_id.to_string())],
            )
            .await?;
        let ts = server.ts.clone().into_cursor();
        *self.long_poll.write().await = Some(server);
        Ok(ts)
    }

    async fn current_server(&self) -> VkResult<(LongPollServer, String)> {
        if let Some(server) = self.long_poll.read().await.clone() {
            let ts = server.ts.clone().into_cursor();
            return Ok((server, ts));
        }
        let ts = self.refresh_long_poll_server().await?;
        let server = self
            .long_poll
            .read()
            .await
            .clone()
            .ok_or(VkApiError::LongPollFailed { code: 0 })?;
        Ok((server, ts))
    }

    async fn poll(&self, cursor: Option<String>) -> VkResult<PollBatch> {
        let (server, initial_ts) = self.current_server().await?;
        let ts = cursor.unwrap_or(initial_ts);
        let wait = self.config.wait_secs.to_string();

        let response = self
            .client
            .get(&server.server)
            .query(&[
                ("act", "a_check"),
                ("key", server.key.as_str()),
                ("ts", ts.as_str()),
                ("wait", wait.as_str()),
            ])
            .send()
            .await
            .map_err(|source| VkApiError::RequestSend {
                method: "a_check".into(),
                source,
            })?
            .json::<LongPollResponse>()
            .await
            .map_err(|source| VkApiError::DecodeResponse {
                method: "a_check".into(),
                source,
            })?;

        match response.failed {
            None => Ok(PollBatch {
                updates: response.updates,
                cursor: response.ts.map(|ts| ts.into_cursor()).unwrap_or(ts),
            }),
            // History partially lost: resume from the server-provided cursor.
            Some(1) => {
                debug!("long-poll history outdated, adopting new cursor");
                Ok(PollBatch {
                    updates: Vec::new(),
                    cursor: response.ts.map(|ts| ts.into_cursor()).unwrap_or(ts),
                })
            }
            // Key expired.
            Some(2) => {
                debug!("long-poll key expired, refreshing");
                self.refresh_long_poll_server().await?;
                Ok(PollBatch {
                    updates: Vec::new(),
                    cursor: ts,
                })
            }
            // Key and history lost.
            Some(3) => {
                warn!("long-poll session lost, re-registering");
                let fresh = self.refresh_long_poll_server().await?;
                Ok(PollBatch {
                    updates: Vec::new(),
                    cursor: fresh,
                })
            }
            Some(code) => Err(VkApiError::LongPollFailed { code }),
        }
    }

    async fn send(&self, message: OutgoingMessage) -> VkResult<MessageId> {
        let mut params = vec![
            ("peer_ids", message.chat_id.to_string()),
            ("random_id", rand::random::<i32>().to_string()),
        ];
        if let Some(text) = message.text {
            params.push(("message", text));
        }
        if let Some(keyboard) = message.keyboard.as_ref() {
            params.push(("keyboard", encode_keyboard("messages.send", keyboard)?));
        }
        if let Some(attachment) = message.attachment {
            params.push(("attachment", attachment));
        }
        if let Some(sticker_id) = message.sticker_id {
            params.push(("sticker_id", sticker_id.to_string()));
        }

        let sent: Vec<SentMessage> = self.call("messages.send", params).await?;
        sent.first()
            .map(|entry| entry.conversation_message_id)
            .ok_or_else(|| VkApiError::Api {
                method: "messages.send".into(),
                code: 0,
                message: "empty send response".into(),
            })
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: Option<String>,
        keyboard: Option<Keyboard>,
    ) -> VkResult<()> {
        let mut params = vec![
            ("peer_id", chat_id.to_string()),
            ("conversation_message_id", message_id.to_string()),
        ];
        if let Some(text) = text {
            params.push(("message", text));
        }
        if let Some(keyboard) = keyboard.as_ref() {
            params.push(("keyboard", encode_keyboard("messages.edit", keyboard)?));
        }
        let _: Value = self.call("messages.edit", params).await?;
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> VkResult<()> {
        let _: Value = self
            .call(
                "messages.delete",
                vec![
                    ("peer_id", chat_id.to_string()),
                    ("cmids", message_id.to_string()),
                    ("delete_for_all", "1".into()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn answer(&self, callback: CallbackRef, snackbar: Option<String>) -> VkResult<()> {
        let mut params = vec![
            ("event_id", callback.event_id),
            ("user_id", callback.user_id.to_string()),
            ("peer_id", callback.chat_id.to_string()),
        ];
        if let Some(text) = snackbar {
            params.push((
                "event_data",
                json!({ "type": "show_snackbar", "text": text }).to_string(),
            ));
        }
        let _: Value = self.call("messages.sendMessageEventAnswer", params).await?;
        Ok(())
    }

    async fn user(&self, user_id: UserId) -> VkResult<Option<UserSummary>> {
        let rows: Vec<UserRow> = self
            .call("users.get", vec![("user_ids", user_id.to_string())])
            .await?;
        Ok(rows.into_iter().next().map(UserSummary::from))
    }
}

fn encode_keyboard(method: &str, keyboard: &Keyboard) -> VkResult<String> {
    keyboard_json(keyboard).map_err(|source| VkApiError::EncodeKeyboard {
        method: method.to_string(),
        source,
    })
}

impl PlatformClient for VkPlatformClient {
    fn long_poll_fetch(&self, cursor: Option<String>) -> BoxFuture<'static, PlatformResult<PollBatch>> {
        let platform = self.clone();
        Box::pin(async move { platform.poll(cursor).await.map_err(Into::into) })
    }

    fn send_message(&self, message: OutgoingMessage) -> BoxFuture<'static, PlatformResult<MessageId>> {
        let platform = self.clone();
        Box::pin(async move { platform.send(message).await.map_err(Into::into) })
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
                .edit(chat_id, message_id, text, keyboard)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move { platform.delete(chat_id, message_id).await.map_err(Into::into) })
    }

    fn answer_callback(
        &self,
        callback: CallbackRef,
        snackbar: Option<String>,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move { platform.answer(callback, snackbar).await.map_err(Into::into) })
    }

    fn fetch_user_info(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'static, PlatformResult<Option<UserSummary>>> {
        let platform = self.clone();
        Box::pin(async move { platform.user(user_id).await.map_err(Into::into) })
    }
}
