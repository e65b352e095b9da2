use std::env;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8443;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid port in env var {0}")]
    ParsePort(String),
}

/// Process settings for the chat front-end that drives this binary. The
/// bot itself treats them as opaque; they are validated here and logged at
/// startup.
#[derive(Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub bot_token: Option<String>,
    pub port: u16,
    pub webhook_url: Option<String>,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .field("webhook_url", &self.webhook_url)
            .finish()
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let port = match non_empty("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::ParsePort("PORT".to_string()))?,
            None => DEFAULT_PORT,
        };
        Ok(Self {
            bot_token: non_empty("BOT_TOKEN"),
            port,
            webhook_url: non_empty("WEBHOOK_URL"),
        })
    }
}
