use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// How updates reach the bot.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Webhook,
    Polling,
}

impl std::fmt::Display for BotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotMode::Webhook => write!(f, "webhook"),
            BotMode::Polling => write!(f, "polling"),
        }
    }
}

impl FromStr for BotMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(BotMode::Webhook),
            "polling" => Ok(BotMode::Polling),
            other => bail!("unsupported bot mode '{}', expected webhook|polling", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Override for the Bot API endpoint (local bot API server, test doubles)
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub mode: BotMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL, e.g. https://my-bot.onrender.com
    #[serde(default)]
    pub external_url: String,
    #[serde(default)]
    pub debug_endpoints: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            external_url: String::new(),
            debug_endpoints: false,
        }
    }
}

impl ServerConfig {
    /// Full webhook URL Telegram should call, if an external URL is known.
    pub fn webhook_url(&self) -> Option<String> {
        let base = self.external_url.trim().trim_end_matches('/');
        if base.is_empty() {
            None
        } else {
            Some(format!("{}/webhook", base))
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

/// The webhook answers only after generation, and Telegram redelivers an
/// update whose webhook call has not answered in time; keep well under that.
fn default_timeout_secs() -> u64 {
    25
}

fn default_port() -> u16 {
    10000
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("{} must be a boolean, got '{}'", key, other),
    }
}

impl Config {
    /// Load configuration: optional TOML file, then environment overrides,
    /// then validation of required credentials.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?,
            )
        } else {
            None
        };

        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build a config from file content and an environment lookup.
    pub fn from_sources<F>(content: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match content {
            Some(c) => toml::from_str(c).context("Failed to parse config file")?,
            None => Config::default(),
        };

        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = lookup("TELEGRAM_API_URL") {
            self.telegram.api_url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Some(v) = lookup("BOT_MODE") {
            self.telegram.mode = v.parse().context("Invalid BOT_MODE")?;
        }
        if let Some(v) = lookup("GEMINI_API_KEY") {
            self.gemini.api_key = v;
        }
        if let Some(v) = lookup("GEMINI_MODEL") {
            self.gemini.model = v;
        }
        if let Some(v) = lookup("GEMINI_BASE_URL") {
            self.gemini.base_url = v;
        }
        if let Some(v) = lookup("GEMINI_TIMEOUT_SECS") {
            self.gemini.timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("GEMINI_TIMEOUT_SECS must be a number, got '{}'", v))?;
        }
        if let Some(v) = lookup("RENDER_EXTERNAL_URL") {
            self.server.external_url = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", v))?;
        }
        if let Some(v) = lookup("DEBUG_ENDPOINTS") {
            self.server.debug_endpoints = parse_bool("DEBUG_ENDPOINTS", &v)?;
        }
        Ok(())
    }

    /// Fail with every missing required variable named at once.
    fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.telegram.bot_token.trim().is_empty() {
            missing.push("BOT_TOKEN");
        }
        if self.gemini.api_key.trim().is_empty() {
            missing.push("GEMINI_API_KEY");
        }
        if self.telegram.mode == BotMode::Webhook && self.server.webhook_url().is_none() {
            missing.push("RENDER_EXTERNAL_URL");
        }

        if !missing.is_empty() {
            bail!("Missing required configuration: {}", missing.join(", "));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_only_webhook_config() {
        let config = Config::from_sources(
            None,
            env(&[
                ("BOT_TOKEN", "123:abc"),
                ("GEMINI_API_KEY", "gk"),
                ("RENDER_EXTERNAL_URL", "https://bot.example.com/"),
            ]),
        )
        .unwrap();

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.gemini.api_key, "gk");
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.gemini.timeout_secs, 25);
        assert_eq!(config.server.port, 10000);
        assert_eq!(config.telegram.mode, BotMode::Webhook);
        assert!(!config.server.debug_endpoints);
        assert_eq!(
            config.server.webhook_url().as_deref(),
            Some("https://bot.example.com/webhook")
        );
    }

    #[test]
    fn test_missing_credentials_are_all_named() {
        let err = Config::from_sources(None, env(&[])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("BOT_TOKEN"));
        assert!(msg.contains("GEMINI_API_KEY"));
        assert!(msg.contains("RENDER_EXTERNAL_URL"));
    }

    #[test]
    fn test_missing_single_credential() {
        let err = Config::from_sources(
            None,
            env(&[("BOT_TOKEN", "t"), ("BOT_MODE", "polling")]),
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("GEMINI_API_KEY"));
        assert!(!msg.contains("BOT_TOKEN"));
    }

    #[test]
    fn test_polling_does_not_need_external_url() {
        let config = Config::from_sources(
            None,
            env(&[
                ("BOT_TOKEN", "t"),
                ("GEMINI_API_KEY", "k"),
                ("BOT_MODE", "Polling"),
            ]),
        )
        .unwrap();
        assert_eq!(config.telegram.mode, BotMode::Polling);
        assert!(config.server.webhook_url().is_none());
    }

    #[test]
    fn test_file_values_overridden_by_env() {
        let toml = r#"
[telegram]
bot_token = "from-file"
mode = "polling"

[gemini]
api_key = "file-key"
model = "gemini-2.0-flash"
timeout_secs = 5

[server]
port = 8080
debug_endpoints = true
"#;
        let config =
            Config::from_sources(Some(toml), env(&[("BOT_TOKEN", "from-env"), ("PORT", "9000")]))
                .unwrap();

        assert_eq!(config.telegram.bot_token, "from-env");
        assert_eq!(config.gemini.api_key, "file-key");
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.gemini.timeout_secs, 5);
        assert_eq!(config.server.port, 9000);
        assert!(config.server.debug_endpoints);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = Config::from_sources(
            None,
            env(&[
                ("BOT_TOKEN", "t"),
                ("GEMINI_API_KEY", "k"),
                ("BOT_MODE", "polling"),
                ("PORT", "not-a-port"),
            ]),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("PORT"));
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!("push".parse::<BotMode>().is_err());
        assert_eq!("webhook".parse::<BotMode>().unwrap(), BotMode::Webhook);
    }

    #[test]
    fn test_debug_endpoints_flag() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
