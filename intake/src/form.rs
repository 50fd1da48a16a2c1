//! Reads the multipart order form, streaming files straight to the upload directory.

use crate::attachments::{Attachment, AttachmentStore};
use crate::errors::{IntakeError, Result};
use crate::metrics_defs::FILES_RECEIVED;
use crate::submission::Submission;
use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use shared::counter;

/// Field names file inputs are posted under.
pub const FILE_FIELDS: &[&str] = &["files[]", "files"];

/// Splits the form into its fields and stored files.
///
/// On error every file already written for this request is deleted.
pub async fn read_form(
    multipart: &mut Multipart,
    store: &AttachmentStore,
    origin: &str,
    max_files: usize,
) -> Result<(Submission, Vec<Attachment>)> {
    let mut submission = Submission::new();
    let mut attachments = Vec::new();

    let read = read_parts(
        multipart,
        store,
        origin,
        max_files,
        &mut submission,
        &mut attachments,
    );
    match read.await {
        Ok(()) => Ok((submission, attachments)),
        Err(e) => {
            store.discard(&attachments).await;
            Err(e)
        }
    }
}

async fn read_parts(
    multipart: &mut Multipart,
    store: &AttachmentStore,
    origin: &str,
    max_files: usize,
    submission: &mut Submission,
    attachments: &mut Vec<Attachment>,
) -> Result<()> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| form_error(e, store))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(file_name) if FILE_FIELDS.contains(&name.as_str()) => {
                // An empty file input still posts a part, with no file name.
                if file_name.is_empty() {
                    continue;
                }
                if attachments.len() >= max_files {
                    return Err(IntakeError::TooManyFiles { limit: max_files });
                }
                let attachment = store_file(field, &file_name, store, origin).await?;
                counter!(FILES_RECEIVED).increment(1);
                attachments.push(attachment);
            }
            Some(file_name) => {
                tracing::debug!(
                    field = %name,
                    file_name = %file_name,
                    "Ignoring unexpected file part"
                );
            }
            None => {
                let value = field.text().await.map_err(|e| form_error(e, store))?;
                submission.insert(name, value);
            }
        }
    }

    Ok(())
}

async fn store_file(
    mut field: Field<'_>,
    file_name: &str,
    store: &AttachmentStore,
    origin: &str,
) -> Result<Attachment> {
    let mut writer = store.create(file_name, origin).await?;

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                writer.abort().await;
                return Err(form_error(e, store));
            }
        };

        if let Err(e) = writer.write(&chunk).await {
            writer.abort().await;
            return Err(e);
        }
    }

    writer.finish().await
}

fn form_error(e: MultipartError, store: &AttachmentStore) -> IntakeError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IntakeError::FileTooLarge {
            limit: store.max_file_size(),
        }
    } else {
        IntakeError::MalformedForm(e.body_text())
    }
}
