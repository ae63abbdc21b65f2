use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

/// Chat action shown while a reply is being prepared.
pub const TYPING_ACTION: &str = "typing";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One outbound `sendMessage` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error("telegram transport error")]
    Transport(#[source] reqwest::Error),
    #[error("telegram api error (status {status}): {message}")]
    Remote { status: StatusCode, message: String },
    #[error("telegram response decode error")]
    Decode(#[source] reqwest::Error),
}

#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), BotError>;
    async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<(), BotError>;
}

#[derive(Clone)]
pub struct HttpBotApi {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl HttpBotApi {
    pub fn new(client: Client, api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            bot_token: bot_token.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }

    async fn call<T>(&self, method: &str, payload: &T) -> Result<(), BotError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let response = self
            .client
            .post(self.url(method))
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(BotError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "<unreadable>".into());
            return Err(BotError::Remote {
                status,
                message: truncate_body(message),
            });
        }

        let body: BotApiResponse = response.json().await.map_err(BotError::Decode)?;
        if !body.ok {
            return Err(BotError::Remote {
                status,
                message: body.description.unwrap_or_else(|| "unknown error".into()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), BotError> {
        self.call("sendMessage", message).await
    }

    async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<(), BotError> {
        let payload = json!({ "chat_id": chat_id, "action": action });
        self.call("sendChatAction", &payload).await
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > 512 {
        let mut end = 512;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

/// In-memory [`BotApi`] that records outbound calls.
#[derive(Default)]
pub struct MockBotApi {
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub actions: Mutex<Vec<(i64, String)>>,
    failing_sends: AtomicUsize,
    failing_actions: AtomicUsize,
}

impl MockBotApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` `send_message` calls fail with a remote error.
    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` `send_chat_action` calls fail.
    pub fn fail_next_actions(&self, count: usize) {
        self.failing_actions.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl BotApi for MockBotApi {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), BotError> {
        let failing = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BotError::Remote {
                status: StatusCode::BAD_REQUEST,
                message: "scripted failure".into(),
            });
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<(), BotError> {
        let failing = self
            .failing_actions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BotError::Remote {
                status: StatusCode::BAD_REQUEST,
                message: "scripted failure".into(),
            });
        }
        self.actions.lock().await.push((chat_id, action.to_string()));
        Ok(())
    }
}
