use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, MessageEntityKind};
use tracing::{info, warn};

use crate::bot::Relay;
use crate::config::TelegramConfig;
use crate::platform::{ChatApi, IncomingMessage};

/// Construct the bot client, honouring an API URL override.
pub fn build_bot(config: &TelegramConfig) -> Result<Bot> {
    let bot = Bot::new(&config.bot_token);
    match config.api_url.as_deref() {
        Some(api_url) => {
            let url = reqwest::Url::parse(api_url)
                .with_context(|| format!("Invalid TELEGRAM_API_URL: {}", api_url))?;
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

/// Our own @username, so `/start@other_bot` in groups can be told apart.
/// `None` when getMe fails; every addressed command is then accepted.
pub async fn fetch_username(bot: &Bot) -> Option<String> {
    match bot.get_me().await {
        Ok(me) => {
            let username = me.user.username.clone();
            info!("Running as @{}", username.as_deref().unwrap_or("<none>"));
            username
        }
        Err(e) => {
            warn!("getMe failed, bot username unknown: {}", e);
            None
        }
    }
}

#[async_trait]
impl ChatApi for Bot {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_message(ChatId(chat_id), text.to_string())
            .await
            .context("sendMessage failed")?;
        Ok(())
    }

    async fn show_typing(&self, chat_id: i64) -> Result<()> {
        self.send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .context("sendChatAction failed")?;
        Ok(())
    }

    async fn register_webhook(&self, url: &str) -> Result<()> {
        let url = reqwest::Url::parse(url).with_context(|| format!("Invalid webhook URL: {}", url))?;
        self.set_webhook(url).await.context("setWebhook failed")?;
        Ok(())
    }

    async fn describe_webhook(&self) -> Result<serde_json::Value> {
        let info = self
            .get_webhook_info()
            .await
            .context("getWebhookInfo failed")?;
        serde_json::to_value(&info).context("Failed to encode webhook info")
    }
}

/// Convert a teloxide message into the relay's view of it
pub fn incoming_from_message(msg: &Message) -> IncomingMessage {
    let has_command_entity = msg
        .entities()
        .map(|entities| {
            entities
                .iter()
                .any(|e| e.offset == 0 && matches!(e.kind, MessageEntityKind::BotCommand))
        })
        .unwrap_or(false);

    IncomingMessage::new(
        msg.chat.id.0,
        msg.from.as_ref().map(|u| u.id.0),
        msg.text().map(str::to_string),
        has_command_entity,
    )
}

/// Run the long-polling dispatcher until the process is stopped
pub async fn run(bot: Bot, relay: Arc<Relay>) -> Result<()> {
    info!("Starting Telegram long polling...");

    // getUpdates is refused while a webhook is registered
    if let Err(e) = bot.delete_webhook().await {
        warn!("Failed to delete webhook before polling: {}", e);
    }

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Polling stopped");
    Ok(())
}

async fn handle_message(msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    let incoming = incoming_from_message(&msg);
    relay.handle(&incoming).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telegram(api_url: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_url: api_url.map(str::to_string),
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn test_build_bot_with_api_override() {
        let bot = build_bot(&telegram(Some("http://127.0.0.1:8081/"))).unwrap();
        assert_eq!(bot.api_url().as_str(), "http://127.0.0.1:8081/");
        assert_eq!(bot.token(), "123:abc");
    }

    #[tokio::test]
    async fn test_fetch_username_unreachable_api() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let bot = build_bot(&telegram(Some(&url))).unwrap();
        assert_eq!(fetch_username(&bot).await, None);
    }

    #[test]
    fn test_build_bot_rejects_bad_api_url() {
        assert!(build_bot(&telegram(Some("not a url"))).is_err());
        assert!(build_bot(&telegram(None)).is_ok());
    }
}
