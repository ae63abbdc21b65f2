//! Invocation-envelope adapter: decodes the platform event, feeds the
//! dispatcher, and encodes the HTTP-style response envelope. The contract is
//! binary: full success (200) or full failure (405/500).

use std::collections::HashMap;

use anyhow::Context;
use axum::response::{IntoResponse, Response};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use http::StatusCode;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use ygb_telegram::TelegramUpdate;

use crate::dispatch::Dispatcher;
use crate::update::chat_update_from;

/// The serverless platform's event wrapper. Lives for exactly one
/// invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEnvelope {
    #[serde(default)]
    pub http_method: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    pub body: String,
}

impl IntoResponse for InvocationResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        if let Some(headers) = self.headers {
            for (name, value) in headers {
                let parsed = name
                    .parse::<http::HeaderName>()
                    .ok()
                    .zip(value.parse::<http::HeaderValue>().ok());
                if let Some((name, value)) = parsed {
                    response.headers_mut().insert(name, value);
                }
            }
        }
        response
    }
}

/// Handles one invocation. Only POST is accepted; the body is base64-decoded
/// when the envelope says so, parsed as a webhook update, and dispatched
/// synchronously.
pub async fn handle(dispatcher: &Dispatcher, event: InvocationEnvelope) -> InvocationResponse {
    counter!("webhook_invocations_total").increment(1);

    if event.http_method != "POST" {
        counter!("webhook_rejected_total", "reason" => "method").increment(1);
        return method_not_allowed();
    }

    let update = match decode_update(&event) {
        Ok(update) => update,
        Err(err) => {
            tracing::error!("invocation failed: {err:#}");
            counter!("webhook_failures_total", "stage" => "decode").increment(1);
            return internal_error();
        }
    };

    if let Some(chat_update) = chat_update_from(&update) {
        if let Err(err) = dispatcher.dispatch(&chat_update).await {
            tracing::error!("dispatch failed: {err}");
            counter!("webhook_failures_total", "stage" => "dispatch").increment(1);
            return internal_error();
        }
    }

    ok_ack()
}

fn decode_update(event: &InvocationEnvelope) -> anyhow::Result<TelegramUpdate> {
    let body = if event.is_base64_encoded {
        let bytes = B64
            .decode(event.body.as_bytes())
            .context("base64-decode invocation body")?;
        String::from_utf8(bytes).context("invocation body is not utf-8")?
    } else {
        event.body.clone()
    };
    serde_json::from_str(&body).context("parse telegram update")
}

fn ok_ack() -> InvocationResponse {
    InvocationResponse {
        status_code: StatusCode::OK.as_u16(),
        headers: Some(HashMap::from([(
            "Content-Type".to_string(),
            "application/json".to_string(),
        )])),
        body: json!({ "ok": true }).to_string(),
    }
}

fn method_not_allowed() -> InvocationResponse {
    InvocationResponse {
        status_code: StatusCode::METHOD_NOT_ALLOWED.as_u16(),
        headers: None,
        body: json!({ "error": "Method not allowed" }).to_string(),
    }
}

fn internal_error() -> InvocationResponse {
    InvocationResponse {
        status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        headers: None,
        body: json!({ "error": "Internal server error" }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_test::traced_test;
    use ygb_completion::MockCompletionApi;
    use ygb_telegram::MockBotApi;

    fn envelope(method: &str, body: &str, base64: bool) -> InvocationEnvelope {
        InvocationEnvelope {
            http_method: method.into(),
            body: body.into(),
            is_base64_encoded: base64,
        }
    }

    fn update_json(text: &str) -> String {
        json!({
            "update_id": 1,
            "message": {
                "message_id": 42,
                "text": text,
                "chat": { "id": 123 },
                "from": { "id": 99, "first_name": "Анна" }
            }
        })
        .to_string()
    }

    fn mocks() -> (Arc<MockBotApi>, Arc<MockCompletionApi>, Dispatcher) {
        let bot = Arc::new(MockBotApi::new());
        let completion = Arc::new(MockCompletionApi::replying("ответ"));
        let dispatcher = Dispatcher::new(bot.clone(), completion.clone());
        (bot, completion, dispatcher)
    }

    #[tokio::test]
    async fn post_with_plain_body_is_dispatched_and_acked() {
        let (bot, completion, dispatcher) = mocks();
        let response = handle(&dispatcher, envelope("POST", &update_json("вопрос"), false)).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, r#"{"ok":true}"#);
        assert_eq!(
            response
                .headers
                .as_ref()
                .and_then(|headers| headers.get("Content-Type"))
                .map(String::as_str),
            Some("application/json")
        );
        assert_eq!(completion.calls.lock().await.len(), 1);
        assert_eq!(bot.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn base64_body_is_decoded_first() {
        let (bot, _, dispatcher) = mocks();
        let encoded = B64.encode(update_json("/help"));
        let response = handle(&dispatcher, envelope("POST", &encoded, true)).await;

        assert_eq!(response.status_code, 200);
        let sent = bot.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 123);
    }

    #[tokio::test]
    async fn non_post_is_rejected_without_side_effects() {
        let (bot, completion, dispatcher) = mocks();
        let response = handle(&dispatcher, envelope("GET", &update_json("вопрос"), false)).await;

        assert_eq!(response.status_code, 405);
        assert_eq!(response.body, r#"{"error":"Method not allowed"}"#);
        assert!(response.headers.is_none());
        assert!(completion.calls.lock().await.is_empty());
        assert!(bot.sent.lock().await.is_empty());
        assert!(bot.actions.lock().await.is_empty());
    }

    #[traced_test]
    #[tokio::test]
    async fn malformed_body_is_logged_and_rejected() {
        let (bot, completion, dispatcher) = mocks();
        let response = handle(&dispatcher, envelope("POST", "not json at all", false)).await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, r#"{"error":"Internal server error"}"#);
        assert!(logs_contain("invocation failed"));
        assert!(completion.calls.lock().await.is_empty());
        assert!(bot.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn undecodable_base64_is_rejected() {
        let (_, _, dispatcher) = mocks();
        let response = handle(&dispatcher, envelope("POST", "%%%not-base64%%%", true)).await;
        assert_eq!(response.status_code, 500);
    }

    #[tokio::test]
    async fn update_without_text_is_acknowledged_and_ignored() {
        let (bot, completion, dispatcher) = mocks();
        let body = json!({
            "update_id": 1,
            "message": {
                "message_id": 42,
                "chat": { "id": 123 },
                "from": { "id": 99, "first_name": "Анна" }
            }
        })
        .to_string();
        let response = handle(&dispatcher, envelope("POST", &body, false)).await;

        assert_eq!(response.status_code, 200);
        assert!(completion.calls.lock().await.is_empty());
        assert!(bot.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn command_send_failure_maps_to_internal_error() {
        let (bot, _, dispatcher) = mocks();
        bot.fail_next_sends(1);
        let response = handle(&dispatcher, envelope("POST", &update_json("/start"), false)).await;
        assert_eq!(response.status_code, 500);
    }

    #[test]
    fn response_envelope_serializes_to_platform_shape() {
        let value = serde_json::to_value(ok_ack()).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["headers"]["Content-Type"], "application/json");
        assert_eq!(value["body"], r#"{"ok":true}"#);

        let rejected = serde_json::to_value(method_not_allowed()).unwrap();
        assert_eq!(rejected["statusCode"], 405);
        assert!(rejected.get("headers").is_none());
    }

    #[test]
    fn envelope_deserializes_with_platform_field_names() {
        let event: InvocationEnvelope = serde_json::from_value(json!({
            "httpMethod": "POST",
            "body": "{}",
            "isBase64Encoded": true
        }))
        .unwrap();
        assert_eq!(event.http_method, "POST");
        assert!(event.is_base64_encoded);
    }
}
