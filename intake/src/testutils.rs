use crate::attachments::Attachment;
use crate::notifier::Notifier;
use async_trait::async_trait;
use std::sync::Mutex;
use telegram::TelegramError;

#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    Text(String),
    Document(Attachment),
}

/// Notifier that keeps everything it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    sent: Vec<Notification>,
    fail_text: bool,
    fail_document_at: Option<usize>,
    documents: usize,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn fail_text(&self) {
        self.state.lock().unwrap().fail_text = true;
    }

    /// Fails the document with the given zero-based position.
    pub fn fail_document_at(&self, index: usize) {
        self.state.lock().unwrap().fail_document_at = Some(index);
    }
}

fn upstream_failure(method: &'static str) -> TelegramError {
    TelegramError::Api {
        method,
        code: 502,
        description: "Bad Gateway".into(),
        retry_after: None,
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, text: &str) -> Result<(), TelegramError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_text {
            return Err(upstream_failure("sendMessage"));
        }
        state.sent.push(Notification::Text(text.to_string()));
        Ok(())
    }

    async fn send_document(&self, attachment: &Attachment) -> Result<(), TelegramError> {
        let mut state = self.state.lock().unwrap();
        let index = state.documents;
        state.documents += 1;
        if state.fail_document_at == Some(index) {
            return Err(upstream_failure("sendDocument"));
        }
        state.sent.push(Notification::Document(attachment.clone()));
        Ok(())
    }
}

pub const BOUNDARY: &str = "formrelay-test-boundary";

/// Builds a `multipart/form-data` body the way a browser posts the order form.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}
