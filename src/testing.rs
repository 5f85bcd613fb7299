//! In-memory doubles for the generator and the Telegram API.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::llm::Generator;
use crate::platform::ChatApi;

pub struct MockGenerator {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            reply: Err(error.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}

#[derive(Default)]
pub struct MockChat {
    fail: bool,
    sent: Mutex<Vec<(i64, String)>>,
    typing: Mutex<Vec<i64>>,
    webhooks: Mutex<Vec<String>>,
}

impl MockChat {
    /// Every call is recorded, then fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn typing(&self) -> Vec<i64> {
        self.typing.lock().unwrap().clone()
    }

    pub fn webhooks(&self) -> Vec<String> {
        self.webhooks.lock().unwrap().clone()
    }

    /// Total outbound calls of any kind.
    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
            + self.typing.lock().unwrap().len()
            + self.webhooks.lock().unwrap().len()
    }

    fn outcome(&self) -> Result<()> {
        if self.fail {
            Err(anyhow!("telegram unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatApi for MockChat {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        self.outcome()
    }

    async fn show_typing(&self, chat_id: i64) -> Result<()> {
        self.typing.lock().unwrap().push(chat_id);
        self.outcome()
    }

    async fn register_webhook(&self, url: &str) -> Result<()> {
        self.webhooks.lock().unwrap().push(url.to_string());
        self.outcome()
    }

    async fn describe_webhook(&self) -> Result<serde_json::Value> {
        self.outcome()?;
        let url = self.webhooks.lock().unwrap().last().cloned().unwrap_or_default();
        Ok(serde_json::json!({ "url": url, "pending_update_count": 0 }))
    }
}
