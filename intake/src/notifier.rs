use crate::attachments::Attachment;
use async_trait::async_trait;
use telegram::types::ParseMode;
use telegram::{BotClient, TelegramError};

/// Destination for relayed submissions.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<(), TelegramError>;

    async fn send_document(&self, attachment: &Attachment) -> Result<(), TelegramError>;
}

/// Posts into one Telegram chat.
pub struct TelegramNotifier {
    client: BotClient,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: BotClient, chat_id: impl Into<String>) -> Self {
        TelegramNotifier {
            client,
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, text: &str) -> Result<(), TelegramError> {
        self.client
            .send_message(&self.chat_id, text, Some(ParseMode::Markdown))
            .await?;
        Ok(())
    }

    async fn send_document(&self, attachment: &Attachment) -> Result<(), TelegramError> {
        self.client
            .send_document(&self.chat_id, &attachment.path, &attachment.original_name)
            .await?;
        Ok(())
    }
}
