use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("bot token is not configured")]
    MissingBotToken,

    #[error("destination chat id is not configured")]
    MissingChatId,

    #[error("request timeout cannot be 0")]
    InvalidRequestTimeout,
}

fn default_api_url() -> Url {
    Url::parse("https://api.telegram.org").expect("static URL is valid")
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_poll_timeout_secs() -> u64 {
    30
}

/// Bot API configuration
#[derive(Clone, Deserialize, PartialEq)]
pub struct Config {
    /// Bot authentication token issued by BotFather
    #[serde(default)]
    pub bot_token: String,
    /// Destination chat for all notifications. Numeric id or `@channel` username.
    #[serde(default)]
    pub chat_id: String,
    /// User ids allowed to talk to the bot. An empty list disables the access gate.
    #[serde(default)]
    pub authorized_users: Vec<i64>,
    /// Base URL of the Bot API
    #[serde(default = "default_api_url")]
    pub api_url: Url,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Extra attempts for `429` and `5xx` answers. 0 disables retries.
    #[serde(default)]
    pub max_retries: u32,
    /// Long polling timeout passed to `getUpdates`
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot_token: String::new(),
            chat_id: String::new(),
            authorized_users: Vec::new(),
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: 0,
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bot_token.trim().is_empty() {
            return Err(ValidationError::MissingBotToken);
        }
        if self.chat_id.trim().is_empty() {
            return Err(ValidationError::MissingChatId);
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidRequestTimeout);
        }
        Ok(())
    }

    pub fn gate_enabled(&self) -> bool {
        !self.authorized_users.is_empty()
    }
}

// The token grants full control over the bot and must never reach the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("authorized_users", &self.authorized_users)
            .field("api_url", &self.api_url.as_str())
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}
