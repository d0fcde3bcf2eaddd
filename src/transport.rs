// src/transport.rs
// Bot-messaging transport boundary. The trait is what the pipeline depends
// on; `BotApi` is the reqwest implementation of the Telegram-style HTTP API.
// Constructed per run and passed in explicitly, never a process singleton.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DigestError, DigestResult};
use crate::format::RenderMode;

/// Acknowledgment for one sent message. `sent_at_epoch` comes from the
/// transport's own receipt, not local wall-clock, so it lines up with the
/// event timestamps the forward locator compares against.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHandle {
    pub id: i64,
    pub destination: String,
    pub sent_at_epoch: f64,
}

/// One entry of the discussion-surface event feed. Updates that carry no
/// message still appear here (with an empty destination) so the cursor can
/// advance past them.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEvent {
    pub update_id: i64,
    pub destination: String,
    pub message_id: i64,
    pub timestamp_epoch: f64,
    pub is_automatic_forward: bool,
}

#[async_trait::async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn send_message(
        &self,
        destination: &str,
        text: &str,
        reply_to: Option<i64>,
    ) -> DigestResult<MessageHandle>;

    async fn pin_message(&self, destination: &str, message_id: i64) -> DigestResult<()>;

    /// Fetch feed events at `offset`. An empty batch means "caught up".
    async fn poll_events(&self, offset: i64) -> DigestResult<Vec<ChatEvent>>;
}

pub struct BotApi {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    parse_mode: &'static str,
}

impl BotApi {
    pub fn new(token: &str, mode: RenderMode) -> Self {
        Self::with_base_url(format!("https://api.telegram.org/bot{token}"), mode)
    }

    /// Point the client somewhere else (tests run against a local mock).
    pub fn with_base_url(base_url: impl Into<String>, mode: RenderMode) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
            parse_mode: match mode {
                RenderMode::Html => "HTML",
                RenderMode::Markdown => "Markdown",
            },
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        payload: &impl Serialize,
    ) -> DigestResult<T> {
        let url = format!("{}/{method}", self.base_url);
        let reply: ApiReply<T> = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?
            .json()
            .await?;
        if !reply.ok {
            return Err(DigestError::Publish(format!(
                "{method}: {}",
                reply.description.unwrap_or_else(|| "unknown error".into())
            )));
        }
        reply
            .result
            .ok_or_else(|| DigestError::Publish(format!("{method}: ok reply without result")))
    }
}

#[async_trait::async_trait]
impl ChannelTransport for BotApi {
    async fn send_message(
        &self,
        destination: &str,
        text: &str,
        reply_to: Option<i64>,
    ) -> DigestResult<MessageHandle> {
        let msg: ApiMessage = self
            .call(
                "sendMessage",
                &SendMessageBody {
                    chat_id: destination,
                    text,
                    parse_mode: self.parse_mode,
                    disable_web_page_preview: true,
                    reply_to_message_id: reply_to,
                },
            )
            .await?;
        Ok(MessageHandle {
            id: msg.message_id,
            destination: msg.chat.id.to_string(),
            sent_at_epoch: msg.date as f64,
        })
    }

    async fn pin_message(&self, destination: &str, message_id: i64) -> DigestResult<()> {
        let _: bool = self
            .call(
                "pinChatMessage",
                &PinBody {
                    chat_id: destination,
                    message_id,
                },
            )
            .await?;
        Ok(())
    }

    async fn poll_events(&self, offset: i64) -> DigestResult<Vec<ChatEvent>> {
        let updates: Vec<ApiUpdate> = self.call("getUpdates", &GetUpdatesBody { offset }).await?;
        let events = updates
            .into_iter()
            .map(|u| match u.message {
                Some(m) => ChatEvent {
                    update_id: u.update_id,
                    destination: m.chat.id.to_string(),
                    message_id: m.message_id,
                    timestamp_epoch: m.date as f64,
                    is_automatic_forward: m.is_automatic_forward,
                },
                None => ChatEvent {
                    update_id: u.update_id,
                    destination: String::new(),
                    message_id: 0,
                    timestamp_epoch: 0.0,
                    is_automatic_forward: false,
                },
            })
            .collect();
        Ok(events)
    }
}

// --- wire types ---

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

#[derive(Serialize)]
struct PinBody<'a> {
    chat_id: &'a str,
    message_id: i64,
}

#[derive(Serialize)]
struct GetUpdatesBody {
    offset: i64,
}

#[derive(Deserialize)]
struct ApiReply<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Deserialize)]
struct ApiUpdate {
    update_id: i64,
    #[serde(alias = "channel_post")]
    message: Option<ApiMessage>,
}

#[derive(Deserialize)]
struct ApiMessage {
    message_id: i64,
    date: i64,
    chat: ApiChat,
    #[serde(default)]
    is_automatic_forward: bool,
}

#[derive(Deserialize)]
struct ApiChat {
    id: i64,
}
