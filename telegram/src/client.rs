const BASE_DELAY: u64 = 500;

use crate::config::Config;
use crate::errors::{Result, TelegramError};
use crate::metrics_defs::{API_REQUESTS, API_RETRIES};
use crate::types::{ApiResponse, GetUpdates, Message, ParseMode, SendMessage, Update};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::counter;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::io::ReaderStream;

/// Thin Bot API client. Cloning is cheap and shares the connection pool.
#[derive(Clone)]
pub struct BotClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    request_timeout: Duration,
}

impl BotClient {
    pub fn new(config: &Config) -> Result<Self> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        let base_url = format!(
            "{}/bot{}",
            config.api_url.as_str().trim_end_matches('/'),
            config.bot_token
        );

        Ok(BotClient {
            client,
            base_url,
            max_retries: config.max_retries,
            request_timeout,
        })
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<Message> {
        self.reply(chat_id, text, parse_mode, None).await
    }

    /// Sends `text`, optionally as a reply to `reply_to_message_id`.
    pub async fn reply(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<ParseMode>,
        reply_to_message_id: Option<i64>,
    ) -> Result<Message> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode,
            reply_to_message_id,
        };
        let body = &body;

        self.with_retries("sendMessage", move || {
            self.post_json("sendMessage", body, None)
        })
        .await
    }

    /// Uploads the file at `path` as a document named `file_name`.
    ///
    /// The file is streamed from disk, so only one chunk of it is held in memory at a time.
    pub async fn send_document(
        &self,
        chat_id: &str,
        path: &Path,
        file_name: &str,
    ) -> Result<Message> {
        self.with_retries("sendDocument", move || {
            self.post_document(chat_id, path, file_name)
        })
        .await
    }

    /// Long-polls for new updates starting at `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };
        // The server holds the request open for up to `timeout_secs`.
        let timeout = Duration::from_secs(timeout_secs) + self.request_timeout;

        self.post_json("getUpdates", &body, Some(timeout)).await
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn with_retries<T, F, Fut>(&self, method: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;

        loop {
            match attempt().await {
                Err(e) if e.is_retriable() && retries < self.max_retries => {
                    let delay = match &e {
                        TelegramError::Api {
                            retry_after: Some(secs),
                            ..
                        } => Duration::from_secs(*secs),
                        _ => backoff_delay(retries),
                    };
                    tracing::warn!(
                        method,
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying Bot API call"
                    );
                    counter!(API_RETRIES, "method" => method).increment(1);
                    sleep(delay).await;
                    retries += 1;
                }
                result => return result,
            }
        }
    }

    async fn post_json<T, B>(
        &self,
        method: &'static str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.client.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        parse_response(method, response).await
    }

    async fn post_document(&self, chat_id: &str, path: &Path, file_name: &str) -> Result<Message> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, length)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        parse_response("sendDocument", response).await
    }
}

/// Exponential backoff for the `retries`-th retry. Saturates instead of overflowing.
fn backoff_delay(retries: u32) -> Duration {
    Duration::from_millis(BASE_DELAY.saturating_mul(2_u64.saturating_pow(retries)))
}

async fn parse_response<T: DeserializeOwned>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await?;

    let result = match serde_json::from_slice::<ApiResponse<T>>(&bytes) {
        Ok(ApiResponse {
            ok: true,
            result: Some(result),
            ..
        }) => Ok(result),
        Ok(ApiResponse { ok: true, .. }) => Err(TelegramError::InvalidResponse {
            method,
            reason: "missing result".to_string(),
        }),
        Ok(parsed) => Err(TelegramError::Api {
            method,
            code: parsed.error_code.unwrap_or(status.as_u16()),
            description: parsed.description.unwrap_or_default(),
            retry_after: parsed.parameters.and_then(|p| p.retry_after),
        }),
        // Proxies in front of the API answer with HTML error pages.
        Err(_) if !status.is_success() => Err(TelegramError::Api {
            method,
            code: status.as_u16(),
            description: String::from_utf8_lossy(&bytes).chars().take(200).collect(),
            retry_after: None,
        }),
        Err(e) => Err(TelegramError::InvalidResponse {
            method,
            reason: e.to_string(),
        }),
    };

    let outcome = if result.is_ok() { "ok" } else { "error" };
    counter!(API_REQUESTS, "method" => method, "outcome" => outcome).increment(1);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{MockBotApi, MockFailure};
    use std::io::Write;

    fn client_for(api: &MockBotApi, max_retries: u32) -> BotClient {
        let config = Config {
            bot_token: "123:abc".into(),
            chat_id: "-100".into(),
            api_url: api.url(),
            max_retries,
            ..Default::default()
        };
        BotClient::new(&config).unwrap()
    }

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(56), Duration::from_millis(u64::MAX));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_millis(u64::MAX));
    }

    #[tokio::test]
    async fn test_send_message() {
        let api = MockBotApi::start().await;
        let client = client_for(&api, 0);

        let message = client
            .send_message("-100", "*hello*", Some(ParseMode::Markdown))
            .await
            .unwrap();
        assert_eq!(message.chat.id, -100);

        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].token, "123:abc");
        assert_eq!(calls[0].method, "sendMessage");
        assert_eq!(calls[0].field("chat_id"), Some("-100"));
        assert_eq!(calls[0].field("text"), Some("*hello*"));
        assert_eq!(calls[0].field("parse_mode"), Some("Markdown"));
    }

    #[tokio::test]
    async fn test_send_document_streams_file() {
        let api = MockBotApi::start().await;
        let client = client_for(&api, 0);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4 layout").unwrap();

        client
            .send_document("-100", file.path(), "макет.pdf")
            .await
            .unwrap();

        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "sendDocument");
        assert_eq!(calls[0].field("chat_id"), Some("-100"));
        let (name, content) = calls[0].document.as_ref().unwrap();
        assert_eq!(name, "макет.pdf");
        assert_eq!(content.as_slice(), b"%PDF-1.4 layout");
    }

    #[tokio::test]
    async fn test_api_error_is_not_retried_by_default() {
        let api = MockBotApi::start().await;
        api.fail_next("sendMessage", MockFailure::too_many_requests(0));
        let client = client_for(&api, 0);

        let err = client.send_message("-100", "hi", None).await.unwrap_err();
        assert!(matches!(err, TelegramError::Api { code: 429, .. }));
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_on_too_many_requests() {
        let api = MockBotApi::start().await;
        api.fail_next("sendMessage", MockFailure::too_many_requests(0));
        api.fail_next("sendMessage", MockFailure::server_error());
        let client = client_for(&api, 2);

        client.send_message("-100", "hi", None).await.unwrap();
        assert_eq!(api.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_final() {
        let api = MockBotApi::start().await;
        api.fail_next("sendMessage", MockFailure::bad_request("Bad Request: chat not found"));
        let client = client_for(&api, 3);

        let err = client.send_message("-100", "hi", None).await.unwrap_err();
        match err {
            TelegramError::Api {
                code, description, ..
            } => {
                assert_eq!(code, 400);
                assert_eq!(description, "Bad Request: chat not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let api = MockBotApi::start().await;
        let client = client_for(&api, 0);

        let err = client
            .send_document("-100", Path::new("/nonexistent/file.bin"), "file.bin")
            .await
            .unwrap_err();
        assert!(matches!(err, TelegramError::Io(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_updates() {
        let api = MockBotApi::start().await;
        api.push_update(serde_json::json!({
            "update_id": 7,
            "message": {
                "message_id": 1,
                "from": {"id": 1, "is_bot": false, "first_name": "A"},
                "chat": {"id": 1, "type": "private"},
                "date": 0,
                "text": "/start"
            }
        }));
        let client = client_for(&api, 0);

        let updates = client.get_updates(None, 0).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 7);

        let calls = api.calls();
        assert_eq!(calls[0].method, "getUpdates");
        assert_eq!(calls[0].field("timeout"), Some("0"));
    }
}
