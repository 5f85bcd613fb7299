//! Wire model of the Telegram Update JSON posted to the webhook.
//!
//! Only the fields the relay reads are modelled; everything else is ignored.

use serde::Deserialize;

use crate::platform::IncomingMessage;

#[derive(Debug, Deserialize)]
pub struct WebhookUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub chat: WireChat,
    #[serde(default)]
    pub from: Option<WireUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<WireEntity>,
}

#[derive(Debug, Deserialize)]
pub struct WireChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct WireUser {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct WireEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
}

impl WebhookUpdate {
    /// `None` for updates that carry no message (edits, callbacks, joins...).
    pub fn into_incoming(self) -> Option<IncomingMessage> {
        let message = self.message?;
        let has_command_entity = message
            .entities
            .iter()
            .any(|e| e.kind == "bot_command" && e.offset == 0);

        Some(IncomingMessage::new(
            message.chat.id,
            message.from.map(|u| u.id),
            message.text,
            has_command_entity,
        ))
    }
}

/// Whether a decoded payload carries nothing at all (`null`, `{}`, `[]`, `""`).
pub fn is_empty_payload(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}
