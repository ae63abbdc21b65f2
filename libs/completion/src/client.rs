use std::collections::VecDeque;

use anyhow::anyhow;
use async_trait::async_trait;
use http::StatusCode;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::CompletionConfig;

/// Fixed system instruction sent with every request.
pub const SYSTEM_PROMPT: &str =
    "Ты — полезный ассистент. Отвечай на вопросы пользователя кратко и по делу.";

pub const CONFIG_ERROR_REPLY: &str = "Ошибка: не настроены параметры Yandex GPT";
pub const TIMEOUT_REPLY: &str = "Извините, сервис временно недоступен. Попробуйте позже.";
pub const GENERIC_ERROR_REPLY: &str = "Произошла ошибка при обращении к Yandex GPT.";

const COMPLETION_PATH: &str = "/foundationModels/v1/completion";
const TEMPERATURE: f64 = 0.6;
// The completion endpoint expects this limit as a string.
const MAX_TOKENS: &str = "200";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: String,
    completion_options: CompletionOptions,
    messages: Vec<Turn<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f64,
    max_tokens: &'static str,
}

#[derive(Debug, Serialize)]
struct Turn<'a> {
    role: &'static str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Debug, Deserialize)]
struct CompletionResult {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    message: AlternativeMessage,
}

#[derive(Debug, Deserialize)]
struct AlternativeMessage {
    text: String,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion credentials are not configured")]
    NotConfigured,
    #[error("completion request timed out")]
    Timeout,
    #[error("completion transport error")]
    Transport(#[source] reqwest::Error),
    #[error("completion remote error (status {status}): {message}")]
    Remote { status: StatusCode, message: String },
    #[error("completion response decode error")]
    Decode(#[source] anyhow::Error),
}

/// User-facing reply for a failed completion call. Every variant degrades to
/// a fixed string; nothing propagates past this mapping.
pub fn fallback_reply(err: &CompletionError) -> &'static str {
    match err {
        CompletionError::NotConfigured => CONFIG_ERROR_REPLY,
        CompletionError::Timeout => TIMEOUT_REPLY,
        CompletionError::Transport(_)
        | CompletionError::Remote { .. }
        | CompletionError::Decode(_) => GENERIC_ERROR_REPLY,
    }
}

#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Generates a reply for `user_text`. The text is forwarded as-is, empty
    /// or whitespace input included.
    async fn complete(&self, user_text: &str) -> Result<String, CompletionError>;
}

pub struct HttpCompletionApi {
    client: Client,
    config: CompletionConfig,
}

impl HttpCompletionApi {
    pub fn new(client: Client, config: CompletionConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.config.api_base.trim_end_matches('/'),
            COMPLETION_PATH
        )
    }
}

#[async_trait]
impl CompletionApi for HttpCompletionApi {
    async fn complete(&self, user_text: &str) -> Result<String, CompletionError> {
        // Missing credentials short-circuit before any network I/O.
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(CompletionError::NotConfigured)?;
        let model_uri = self.config.model_uri().ok_or(CompletionError::NotConfigured)?;

        let request = CompletionRequest {
            model_uri,
            completion_options: CompletionOptions {
                stream: false,
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
            },
            messages: vec![
                Turn {
                    role: "system",
                    text: SYSTEM_PROMPT,
                },
                Turn {
                    role: "user",
                    text: user_text,
                },
            ],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Api-Key {api_key}"))
            .timeout(self.config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<unreadable>".into());
            return Err(CompletionError::Remote {
                status,
                message: truncate_body(body),
            });
        }

        let body: CompletionResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                CompletionError::Timeout
            } else {
                CompletionError::Decode(err.into())
            }
        })?;
        body.result
            .alternatives
            .into_iter()
            .next()
            .map(|alternative| alternative.message.text)
            .ok_or_else(|| CompletionError::Decode(anyhow!("completion response has no alternatives")))
    }
}

fn map_transport(err: reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Transport(err)
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

/// Scripted [`CompletionApi`] that records every prompt it receives.
#[derive(Default)]
pub struct MockCompletionApi {
    pub calls: Mutex<Vec<String>>,
    pub replies: Mutex<VecDeque<Result<String, CompletionError>>>,
}

impl MockCompletionApi {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::from([Ok(reply.into())])),
        }
    }

    pub fn failing(err: CompletionError) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::from([Err(err)])),
        }
    }
}

#[async_trait]
impl CompletionApi for MockCompletionApi {
    async fn complete(&self, user_text: &str) -> Result<String, CompletionError> {
        self.calls.lock().await.push(user_text.to_string());
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Decode(anyhow!("no scripted reply"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_matches_wire_format() {
        let request = CompletionRequest {
            model_uri: "gpt://b1gfolder/yandexgpt-lite".into(),
            completion_options: CompletionOptions {
                stream: false,
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
            },
            messages: vec![
                Turn {
                    role: "system",
                    text: SYSTEM_PROMPT,
                },
                Turn {
                    role: "user",
                    text: "вопрос",
                },
            ],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "modelUri": "gpt://b1gfolder/yandexgpt-lite",
                "completionOptions": {
                    "stream": false,
                    "temperature": 0.6,
                    "maxTokens": "200"
                },
                "messages": [
                    { "role": "system", "text": SYSTEM_PROMPT },
                    { "role": "user", "text": "вопрос" }
                ]
            })
        );
    }

    #[test]
    fn response_reads_first_alternative() {
        let body = json!({
            "result": {
                "alternatives": [
                    { "message": { "role": "assistant", "text": "первый" } },
                    { "message": { "role": "assistant", "text": "второй" } }
                ],
                "usage": { "totalTokens": "42" }
            }
        });
        let parsed: CompletionResponse = serde_json::from_value(body).unwrap();
        let first = parsed.result.alternatives.into_iter().next().unwrap();
        assert_eq!(first.message.text, "первый");
    }

    #[test]
    fn response_without_result_is_rejected() {
        let body = json!({ "error": "internal" });
        assert!(serde_json::from_value::<CompletionResponse>(body).is_err());
    }

    #[test]
    fn fallback_reply_is_fixed_per_error_kind() {
        assert_eq!(
            fallback_reply(&CompletionError::NotConfigured),
            CONFIG_ERROR_REPLY
        );
        assert_eq!(fallback_reply(&CompletionError::Timeout), TIMEOUT_REPLY);
        assert_eq!(
            fallback_reply(&CompletionError::Remote {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "boom".into(),
            }),
            GENERIC_ERROR_REPLY
        );
        assert_eq!(
            fallback_reply(&CompletionError::Decode(anyhow!("bad envelope"))),
            GENERIC_ERROR_REPLY
        );
    }

    #[tokio::test]
    async fn mock_records_prompts_in_order() {
        let mock = MockCompletionApi::replying("ответ");
        let reply = mock.complete("вопрос").await.unwrap();
        assert_eq!(reply, "ответ");
        assert_eq!(*mock.calls.lock().await, vec!["вопрос".to_string()]);
        assert!(mock.complete("ещё").await.is_err());
    }
}
