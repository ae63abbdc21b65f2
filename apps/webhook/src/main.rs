//! Serverless webhook bridge between Telegram and YandexGPT.
//!
//! ```text
//! The functions host POSTs one invocation envelope per webhook delivery to
//! `/invoke`; the envelope body is parsed into a Telegram update, dispatched,
//! and the HTTP-style response envelope is mapped back onto the response.
//! ```

mod config;
mod dispatch;
mod handler;
mod update;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Json, Router, extract::State, routing::post};
use tracing_subscriber::EnvFilter;
use ygb_completion::HttpCompletionApi;
use ygb_telegram::HttpBotApi;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::handler::{InvocationEnvelope, InvocationResponse};

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
    tracing::info!("ygb-webhook booting");

    let cfg = Config::from_env();
    if !cfg.is_complete() {
        // Startup continues; affected features degrade per request.
        tracing::error!("missing required environment variables");
    }

    let client = reqwest::Client::new();
    let bot = HttpBotApi::new(
        client.clone(),
        cfg.telegram_api_base.clone(),
        cfg.bot_token.clone().unwrap_or_default(),
    );
    let completion = HttpCompletionApi::new(client, cfg.completion.clone());
    let dispatcher = Dispatcher::new(Arc::new(bot), Arc::new(completion));
    let state = AppState {
        dispatcher: Arc::new(dispatcher),
    };

    let addr: std::net::SocketAddr = cfg.bind.parse().context("parse bind address")?;
    tracing::info!("ygb-webhook listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/invoke", post(invoke))
        .with_state(state)
}

async fn invoke(
    State(state): State<AppState>,
    Json(event): Json<InvocationEnvelope>,
) -> InvocationResponse {
    handler::handle(&state.dispatcher, event).await
}
