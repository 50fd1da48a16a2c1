use crate::attachments::{Attachment, AttachmentStore};
use crate::errors::Result;
use crate::formatter::format_message;
use crate::metrics_defs::{CLEANUP_FAILURES, DISPATCH_DURATION, DOCUMENTS_SENT};
use crate::notifier::Notifier;
use crate::submission::Submission;
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

/// Validates a submission and relays it, text first, then every file in upload order.
#[derive(Clone)]
pub struct SubmissionHandler {
    notifier: Arc<dyn Notifier>,
    store: AttachmentStore,
}

impl SubmissionHandler {
    pub fn new(notifier: Arc<dyn Notifier>, store: AttachmentStore) -> Self {
        SubmissionHandler { notifier, store }
    }

    pub fn store(&self) -> &AttachmentStore {
        &self.store
    }

    pub async fn process(
        &self,
        submission: Submission,
        attachments: Vec<Attachment>,
    ) -> Result<()> {
        if let Err(e) = submission.validate() {
            self.store.discard(&attachments).await;
            return Err(e.into());
        }

        let text = format_message(&submission, &attachments);

        let start = Instant::now();
        self.notifier.send_text(&text).await?;

        // Files not reached after a failed send stay on disk; the message already links them.
        for attachment in &attachments {
            self.notifier.send_document(attachment).await?;
            tracing::debug!(file = %attachment.storage_name, "Document sent");
            counter!(DOCUMENTS_SENT).increment(1);
            self.cleanup(attachment).await;
        }
        histogram!(DISPATCH_DURATION).record(start.elapsed().as_secs_f64());

        tracing::info!(
            fields = submission.len(),
            files = attachments.len(),
            "Submission relayed"
        );
        Ok(())
    }

    async fn cleanup(&self, attachment: &Attachment) {
        if let Err(e) = self.store.remove(attachment).await {
            tracing::error!(
                path = %attachment.path.display(),
                error = %e,
                "Failed to delete relayed upload"
            );
            counter!(CLEANUP_FAILURES, "stage" => "relayed").increment(1);
        }
    }
}
