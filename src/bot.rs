use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::llm::Generator;
use crate::platform::{ChatApi, IncomingMessage};

pub const GREETING: &str = "Hi! I'm your Gemini AI bot. Ask me anything ✨";
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Telegram rejects messages over 4096 chars; stay under it.
const MAX_CHUNK_LEN: usize = 4000;

/// What the relay did with one incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Greeted,
    Answered,
    Apologized,
    Ignored,
}

/// Forwards chat text to the generator and the completion back to the chat.
pub struct Relay {
    generator: Arc<dyn Generator>,
    chat: Arc<dyn ChatApi>,
    /// Our own @username; commands addressed to other bots are skipped
    username: Option<String>,
}

impl Relay {
    pub fn new(generator: Arc<dyn Generator>, chat: Arc<dyn ChatApi>) -> Self {
        Self {
            generator,
            chat,
            username: None,
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    /// Unknown own username means every `/cmd@target` is accepted.
    fn is_addressed_to_us(&self, target: &str) -> bool {
        match self.username.as_deref() {
            Some(me) => me.eq_ignore_ascii_case(target),
            None => true,
        }
    }

    /// Handle one message end to end. Never fails: generation errors turn
    /// into an apology, delivery errors are logged and dropped.
    pub async fn handle(&self, incoming: &IncomingMessage) -> Outcome {
        let chat_id = incoming.chat_id;
        let text = match incoming.text.as_deref() {
            Some(t) => t,
            None => {
                debug!("Ignoring non-text message in chat {}", chat_id);
                return Outcome::Ignored;
            }
        };

        if incoming.is_command {
            if let Some(target) = incoming.command_target() {
                if !self.is_addressed_to_us(target) {
                    debug!("Ignoring command for @{} in chat {}", target, chat_id);
                    return Outcome::Ignored;
                }
            }
            return match incoming.command() {
                Some("start") => {
                    self.deliver(chat_id, GREETING).await;
                    Outcome::Greeted
                }
                other => {
                    debug!("Ignoring command {:?} in chat {}", other, chat_id);
                    Outcome::Ignored
                }
            };
        }

        info!(
            "Message from user {:?} in chat {}: {}",
            incoming.user_id, chat_id, text
        );

        if let Err(e) = self.chat.show_typing(chat_id).await {
            debug!("Typing indicator failed: {:#}", e);
        }

        match self.generator.generate(text).await {
            Ok(response) => {
                for chunk in split_message(&response, MAX_CHUNK_LEN) {
                    self.deliver(chat_id, &chunk).await;
                }
                Outcome::Answered
            }
            Err(e) => {
                error!("Error handling message in chat {}: {:#}", chat_id, e);
                self.deliver(chat_id, APOLOGY).await;
                Outcome::Apologized
            }
        }
    }

    async fn deliver(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.chat.send_text(chat_id, text).await {
            warn!("Failed to deliver message to chat {}: {:#}", chat_id, e);
        }
    }
}

/// Split long text into chunks of at most `max_len` bytes, preferring
/// newline or space boundaries.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // max_len is narrower than this char; emit it whole
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}
