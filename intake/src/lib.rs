pub mod api;
pub mod attachments;
pub mod config;
pub mod errors;
pub mod form;
pub mod formatter;
pub mod handler;
pub mod janitor;
pub mod metrics_defs;
pub mod notifier;
pub mod origin;
pub mod submission;
#[cfg(test)]
mod testutils;

use crate::api::AppState;
use crate::attachments::AttachmentStore;
use crate::handler::SubmissionHandler;
use crate::notifier::Notifier;
use shared::admin_service::Readiness;
use std::io;
use std::sync::Arc;

/// Serves the submission endpoint until the listener fails.
pub async fn run(
    config: config::Config,
    notifier: Arc<dyn Notifier>,
    readiness: Readiness,
) -> io::Result<()> {
    let uploads = &config.uploads;
    let store = AttachmentStore::new(&uploads.dir, uploads.max_file_size);
    store.ensure_dir().await?;

    match uploads.janitor_schedule() {
        Some(schedule) => {
            tokio::spawn(janitor::run_janitor(
                uploads.dir.clone(),
                schedule.retention,
                schedule.interval,
            ));
        }
        None => tracing::info!("Upload janitor disabled"),
    }

    let state = AppState {
        handler: SubmissionHandler::new(notifier, store),
        max_files: uploads.max_files,
        public_base_url: uploads.public_base_url.clone().map(Arc::new),
    };
    let app = api::router(state, uploads.body_limit());

    api::serve(&config.listener, app, readiness).await
}
