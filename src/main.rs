mod bot;
mod config;
mod llm;
mod platform;
mod server;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Relay;
use crate::config::{BotMode, Config};
use crate::llm::{GeminiClient, Generator};
use crate::platform::ChatApi;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,geminibot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config (file: {})", config_path.display()))?;

    info!("Launching Gemini Telegram Bot");
    info!("  Mode: {}", config.telegram.mode);
    info!("  Model: {}", config.gemini.model);
    info!("  Port: {}", config.server.port);

    let bot = platform::telegram::build_bot(&config.telegram)?;
    let username = platform::telegram::fetch_username(&bot).await;
    let chat: Arc<dyn ChatApi> = Arc::new(bot.clone());
    let generator: Arc<dyn Generator> = Arc::new(GeminiClient::new(config.gemini.clone())?);
    let relay = Arc::new(Relay::new(generator, chat.clone()).with_username(username));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Starting HTTP server on port {}", config.server.port);

    match config.telegram.mode {
        BotMode::Webhook => {
            // validate() guarantees the URL in webhook mode
            let url = config
                .server
                .webhook_url()
                .context("RENDER_EXTERNAL_URL is not configured")?;

            let state = AppState {
                relay,
                chat: chat.clone(),
                webhook_url: Some(url.clone()),
            };
            let app = server::router(state, config.server.debug_endpoints);
            let serve_task = tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown_signal())
                    .await
            });

            server::register_webhook(chat.as_ref(), &url).await?;
            info!("Bot setup complete! Webhook is active.");

            serve_task
                .await
                .context("HTTP server task failed")?
                .context("HTTP server error")?;
        }
        BotMode::Polling => {
            // Only status routes: a webhook registered mid-run would stop getUpdates
            let app = server::health_router();
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    error!("Health server error: {}", e);
                }
            });

            platform::telegram::run(bot, relay).await?;
        }
    }

    info!("Bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
