use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("max_files must be at least 1")]
    InvalidMaxFiles,

    #[error("max_file_size must be at least 1 byte")]
    InvalidMaxFileSize,

    #[error("Empty upload directory")]
    EmptyUploadDir,

    #[error("public_base_url must be an http(s) URL: {0}")]
    InvalidPublicBaseUrl(String),
}

/// Submission intake configuration
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the public form endpoint
    #[serde(default)]
    pub listener: Listener,
    /// Where uploaded files are kept until they are relayed
    #[serde(default)]
    pub uploads: UploadConfig,
}

impl Config {
    /// Validates the intake configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.uploads.validate()?;
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_files() -> usize {
    10
}

fn default_max_file_size() -> u64 {
    20 * 1024 * 1024
}

fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_janitor_interval_secs() -> u64 {
    60 * 60
}

/// Transient upload storage configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UploadConfig {
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
    /// Maximum number of files accepted per submission
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Maximum size of a single file in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Files older than this are removed by the janitor. 0 disables the janitor.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_janitor_interval_secs")]
    pub janitor_interval_secs: u64,
    /// Origin used in file links instead of the one derived from the request
    #[serde(default)]
    pub public_base_url: Option<Url>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            dir: default_upload_dir(),
            max_files: default_max_files(),
            max_file_size: default_max_file_size(),
            retention_secs: default_retention_secs(),
            janitor_interval_secs: default_janitor_interval_secs(),
            public_base_url: None,
        }
    }
}

/// How often the janitor runs and how old a file must be before it is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JanitorSchedule {
    pub retention: Duration,
    pub interval: Duration,
}

impl UploadConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dir.as_os_str().is_empty() {
            return Err(ValidationError::EmptyUploadDir);
        }
        if self.max_files == 0 {
            return Err(ValidationError::InvalidMaxFiles);
        }
        if self.max_file_size == 0 {
            return Err(ValidationError::InvalidMaxFileSize);
        }
        if let Some(url) = &self.public_base_url
            && !matches!(url.scheme(), "http" | "https")
        {
            return Err(ValidationError::InvalidPublicBaseUrl(url.to_string()));
        }
        Ok(())
    }

    /// Upper bound for a whole multipart body: every file at full size plus room for the fields.
    pub fn body_limit(&self) -> usize {
        let files = (self.max_files as u64).saturating_mul(self.max_file_size);
        usize::try_from(files.saturating_add(1024 * 1024)).unwrap_or(usize::MAX)
    }

    /// `None` when `retention_secs` is 0. The interval is at least one second.
    pub fn janitor_schedule(&self) -> Option<JanitorSchedule> {
        (self.retention_secs > 0).then(|| JanitorSchedule {
            retention: Duration::from_secs(self.retention_secs),
            interval: Duration::from_secs(self.janitor_interval_secs.max(1)),
        })
    }
}
