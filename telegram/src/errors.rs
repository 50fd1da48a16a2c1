use thiserror::Error;

/// Result type alias for Bot API operations
pub type Result<T, E = TelegramError> = std::result::Result<T, E>;

/// Errors that can occur while talking to the Bot API
#[derive(Error, Debug)]
pub enum TelegramError {
    /// The API answered with `ok: false` or a non-JSON error page.
    #[error("{method} failed with code {code}: {description}")]
    Api {
        method: &'static str,
        code: u16,
        description: String,
        retry_after: Option<u64>,
    },

    #[error("HTTP client error: {0}")]
    Http(reqwest::Error),

    #[error("invalid API response for {method}: {reason}")]
    InvalidResponse {
        method: &'static str,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// reqwest includes the request URL in its error messages, and the URL carries the bot token.
impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        TelegramError::Http(e.without_url())
    }
}

impl TelegramError {
    /// Whether repeating the same call may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            TelegramError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> TelegramError {
        TelegramError::Api {
            method: "sendMessage",
            code,
            description: "failed".into(),
            retry_after: None,
        }
    }

    #[test]
    fn test_is_retriable() {
        assert!(api_error(429).is_retriable());
        assert!(api_error(500).is_retriable());
        assert!(api_error(502).is_retriable());
        assert!(!api_error(400).is_retriable());
        assert!(!api_error(403).is_retriable());

        let invalid = TelegramError::InvalidResponse {
            method: "getUpdates",
            reason: "missing result".into(),
        };
        assert!(!invalid.is_retriable());
        assert!(!TelegramError::from(std::io::Error::other("gone")).is_retriable());
    }
}
