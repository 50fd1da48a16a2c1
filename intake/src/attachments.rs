//! Transient on-disk storage for uploaded files.

use crate::errors::{IntakeError, Result};
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// URL path prefix under which stored files are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

const CREATE_ATTEMPTS: usize = 3;

/// One uploaded file kept on disk until it has been relayed.
#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    /// File name as sent by the client. Untrusted, only used for display.
    pub original_name: String,
    pub storage_name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Absolute link under which the file is reachable until it is removed
    pub url: String,
}

/// Keeps only ASCII alphanumerics, `.`, `-` and `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

/// `<unix millis>-<random suffix>-<sanitized original name>`
pub fn storage_name(original_name: &str, unix_millis: u128, suffix: u32) -> String {
    format!(
        "{unix_millis}-{suffix}-{}",
        sanitize_file_name(original_name)
    )
}

fn generate_storage_name(original_name: &str) -> String {
    let unix_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix = rand::rng().random_range(0..1_000_000_000);
    storage_name(original_name, unix_millis, suffix)
}

#[derive(Clone, Debug)]
pub struct AttachmentStore {
    dir: PathBuf,
    max_file_size: u64,
}

impl AttachmentStore {
    pub fn new(dir: impl Into<PathBuf>, max_file_size: u64) -> Self {
        AttachmentStore {
            dir: dir.into(),
            max_file_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Maps a storage name from a URL to its path. Names that could escape the directory map
    /// to `None`.
    pub fn resolve(&self, storage_name: &str) -> Option<PathBuf> {
        let is_plain = !storage_name.is_empty()
            && !storage_name.starts_with('.')
            && !storage_name.contains(['/', '\\'])
            && !storage_name.contains("..");

        is_plain.then(|| self.dir.join(storage_name))
    }

    /// Opens a new file for an upload named `original_name`.
    ///
    /// `origin` is the scheme and authority the file link is built from.
    pub async fn create(&self, original_name: &str, origin: &str) -> Result<AttachmentWriter> {
        let mut attempt = 0;

        loop {
            let storage_name = generate_storage_name(original_name);
            let path = self.dir.join(&storage_name);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    let url = format!("{origin}{UPLOADS_ROUTE}/{storage_name}");
                    return Ok(AttachmentWriter {
                        file,
                        max_file_size: self.max_file_size,
                        attachment: Attachment {
                            original_name: original_name.to_string(),
                            storage_name,
                            path,
                            size: 0,
                            url,
                        },
                    });
                }
                Err(e)
                    if e.kind() == io::ErrorKind::AlreadyExists
                        && attempt + 1 < CREATE_ATTEMPTS =>
                {
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn remove(&self, attachment: &Attachment) -> io::Result<()> {
        fs::remove_file(&attachment.path).await
    }

    /// Removes every attachment, logging the ones that could not be deleted.
    pub async fn discard(&self, attachments: &[Attachment]) {
        for attachment in attachments {
            if let Err(e) = self.remove(attachment).await {
                tracing::error!(
                    path = %attachment.path.display(),
                    error = %e,
                    "Failed to delete discarded upload"
                );
            }
        }
    }
}

/// An upload being written to disk.
pub struct AttachmentWriter {
    file: File,
    max_file_size: u64,
    attachment: Attachment,
}

impl AttachmentWriter {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let size = self.attachment.size + chunk.len() as u64;
        if size > self.max_file_size {
            return Err(IntakeError::FileTooLarge {
                limit: self.max_file_size,
            });
        }

        self.file.write_all(chunk).await?;
        self.attachment.size = size;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<Attachment> {
        self.file.flush().await?;
        Ok(self.attachment)
    }

    /// Drops the partial file.
    pub async fn abort(self) {
        let AttachmentWriter {
            file, attachment, ..
        } = self;
        drop(file);

        if let Err(e) = fs::remove_file(&attachment.path).await {
            tracing::error!(
                path = %attachment.path.display(),
                error = %e,
                "Failed to delete partial upload"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("макет баннера (v2).pdf"), "v2.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_file_name("my_file-1.PNG"), "my_file-1.PNG");
        assert_eq!(sanitize_file_name(""), "");
    }

    #[test]
    fn test_storage_name() {
        assert_eq!(
            storage_name("logo final.svg", 1700000000123, 42),
            "1700000000123-42-logofinal.svg"
        );
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let store = AttachmentStore::new("/srv/uploads", 10);
        assert_eq!(
            store.resolve("1-2-a.pdf"),
            Some(PathBuf::from("/srv/uploads/1-2-a.pdf"))
        );
        assert_eq!(store.resolve(""), None);
        assert_eq!(store.resolve(".."), None);
        assert_eq!(store.resolve("..secret"), None);
        assert_eq!(store.resolve(".hidden"), None);
        assert_eq!(store.resolve("a/b"), None);
        assert_eq!(store.resolve("a\\b"), None);
    }

    #[tokio::test]
    async fn test_write_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path(), 1024);

        let mut writer = store.create("эскиз.png", "http://example.com").await.unwrap();
        writer.write(b"abc").await.unwrap();
        writer.write(b"def").await.unwrap();
        let attachment = writer.finish().await.unwrap();

        assert_eq!(attachment.original_name, "эскиз.png");
        assert!(attachment.storage_name.ends_with("-.png"));
        assert_eq!(attachment.size, 6);
        assert_eq!(
            attachment.url,
            format!("http://example.com/uploads/{}", attachment.storage_name)
        );
        assert_eq!(std::fs::read(&attachment.path).unwrap(), b"abcdef");

        store.remove(&attachment).await.unwrap();
        assert!(!attachment.path.exists());
        assert!(store.remove(&attachment).await.is_err());
    }

    #[tokio::test]
    async fn test_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path(), 4);

        let mut writer = store.create("big.bin", "http://h").await.unwrap();
        writer.write(b"1234").await.unwrap();
        let err = writer.write(b"5").await.unwrap_err();
        assert!(matches!(err, IntakeError::FileTooLarge { limit: 4 }));

        writer.abort().await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path(), 16);

        let mut paths = std::collections::HashSet::new();
        for _ in 0..20 {
            let attachment = store
                .create("same.txt", "http://h")
                .await
                .unwrap()
                .finish()
                .await
                .unwrap();
            assert!(paths.insert(attachment.path));
        }
    }
}
