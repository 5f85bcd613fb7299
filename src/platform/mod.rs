pub mod telegram;
pub mod update;

use anyhow::Result;
use async_trait::async_trait;

/// A chat message received from Telegram, by polling or by webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Chat the reply is routed to
    pub chat_id: i64,
    /// Sender, absent for channel posts
    pub user_id: Option<u64>,
    /// The message text, absent for stickers, photos, etc.
    pub text: Option<String>,
    pub is_command: bool,
}

impl IncomingMessage {
    /// `has_command_entity` is whether Telegram marked a bot_command at
    /// offset 0. A leading slash alone ("/ what is 2+2") is still a prompt.
    pub fn new(
        chat_id: i64,
        user_id: Option<u64>,
        text: Option<String>,
        has_command_entity: bool,
    ) -> Self {
        Self {
            chat_id,
            user_id,
            text,
            is_command: has_command_entity,
        }
    }

    fn command_token(&self) -> Option<&str> {
        if !self.is_command {
            return None;
        }
        let first = self.text.as_deref()?.split_whitespace().next()?;
        first.strip_prefix('/')
    }

    /// Command name without the slash or `@botname` suffix: "/start@my_bot go" -> "start"
    pub fn command(&self) -> Option<&str> {
        self.command_token()?
            .split('@')
            .next()
            .filter(|n| !n.is_empty())
    }

    /// Bot username a command is addressed to: "/start@my_bot" -> "my_bot"
    pub fn command_target(&self) -> Option<&str> {
        self.command_token()?
            .split_once('@')
            .map(|(_, target)| target)
            .filter(|t| !t.is_empty())
    }
}

/// Outbound side of the Telegram Bot API
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Show the "typing…" indicator. Callers treat failure as non-fatal.
    async fn show_typing(&self, chat_id: i64) -> Result<()>;

    async fn register_webhook(&self, url: &str) -> Result<()>;

    async fn describe_webhook(&self) -> Result<serde_json::Value>;
}
