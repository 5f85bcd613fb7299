//! HTTP surface: webhook ingress plus health and debug endpoints.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::bot::Relay;
use crate::platform::update::{is_empty_payload, WebhookUpdate};
use crate::platform::ChatApi;

const INDEX_HTML: &str = "<h3>✅ Telegram Gemini Bot is running on webhook!</h3>";

/// Handles shared by every request, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub chat: Arc<dyn ChatApi>,
    pub webhook_url: Option<String>,
}

fn status_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}

/// Status endpoints only, for polling mode where no webhook may be registered.
pub fn health_router() -> Router {
    status_routes()
}

/// Webhook ingress plus status endpoints, and the debug routes when enabled.
pub fn router(state: AppState, debug_endpoints: bool) -> Router {
    let mut router = status_routes().route("/webhook", post(webhook));

    if debug_endpoints {
        router = router
            .route("/set_webhook", get(set_webhook))
            .route("/webhook_info", get(webhook_info));
    }

    router.with_state(state)
}

/// Point Telegram at our webhook and log what it reports back.
pub async fn register_webhook(chat: &dyn ChatApi, url: &str) -> Result<()> {
    info!("Setting webhook to {}", url);
    chat.register_webhook(url)
        .await
        .context("Failed to set webhook")?;
    info!("Webhook set successfully");

    let info = chat
        .describe_webhook()
        .await
        .context("Failed to fetch webhook info")?;
    info!("Webhook info: {}", info["url"]);
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Bot active!" }))
}

async fn webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Rejecting webhook body ({} bytes): {}", body.len(), e);
            return (StatusCode::BAD_REQUEST, "No JSON data received");
        }
    };
    if is_empty_payload(&payload) {
        warn!("Rejecting empty webhook payload");
        return (StatusCode::BAD_REQUEST, "No JSON data received");
    }

    let update: WebhookUpdate = match serde_json::from_value(payload) {
        Ok(u) => u,
        Err(e) => {
            error!("Webhook error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error");
        }
    };

    debug!("Received update {}", update.update_id);
    if let Some(incoming) = update.into_incoming() {
        let outcome = state.relay.handle(&incoming).await;
        debug!("Update handled: {:?}", outcome);
    }

    (StatusCode::OK, "OK")
}

async fn set_webhook(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let Some(url) = state.webhook_url.as_deref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": "RENDER_EXTERNAL_URL is not configured" })),
        );
    };

    match state.chat.register_webhook(url).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true, "url": url }))),
        Err(e) => {
            error!("Failed to set webhook: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": format!("{:#}", e) })),
            )
        }
    }
}

async fn webhook_info(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.chat.describe_webhook().await {
        Ok(info) => (StatusCode::OK, Json(json!({ "ok": true, "result": info }))),
        Err(e) => {
            error!("Failed to get webhook info: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": format!("{:#}", e) })),
            )
        }
    }
}
