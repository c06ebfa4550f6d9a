//! Upload staging.
//!
//! Validates uploads against the [`UploadPolicy`] and streams them to disk.
//! A declared size over the limit is rejected before any file is created;
//! otherwise bytes go to a `.part` file that is renamed into place only when
//! complete, and removed on every failure path.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::Utc;
use futures::{Stream, StreamExt};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::UploadPolicy;
use crate::error::{Error, Result};
use crate::extractor::{extension, is_accepted_extension, is_accepted_media_type};

/// What the client told us about a file before sending it
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub filename: String,
    pub media_type: String,
    pub declared_size: Option<u64>,
}

impl UploadMeta {
    pub fn new(filename: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            declared_size: None,
        }
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }
}

/// A fully written upload
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUpload {
    pub original_name: String,
    pub stored_path: PathBuf,
    pub media_type: String,
    pub size: u64,
}

/// `<unix-millis>_<8 random alphanumerics>_<sanitized stem>.<ext>`
pub fn safe_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut clean: String = stem
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_alphanumeric() || matches!(c, '-' | '_' | '(' | ')') {
                Some(c)
            } else {
                None
            }
        })
        .take(50)
        .collect();
    if clean.is_empty() {
        clean = "file".to_string();
    }

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();

    let ext = extension(original)
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    format!("{}_{}_{}{}", Utc::now().timestamp_millis(), suffix, clean, ext)
}

/// Stages uploads under one directory
pub struct FileIntake {
    dir: PathBuf,
    policy: UploadPolicy,
}

impl FileIntake {
    /// Create the intake, creating `dir` if needed
    pub fn new(dir: impl Into<PathBuf>, policy: UploadPolicy) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, policy })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Reject a batch with too many files
    pub fn check_batch(&self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(Error::UploadRejected("no files provided".into()));
        }
        if count > self.policy.max_files {
            return Err(Error::UploadRejected(format!(
                "too many files: {} (max {})",
                count, self.policy.max_files
            )));
        }
        Ok(())
    }

    /// Checks that need no bytes: type, extension and declared size
    pub fn check(&self, meta: &UploadMeta) -> Result<()> {
        if !is_accepted_media_type(&meta.media_type) {
            return Err(Error::UploadRejected(format!(
                "unsupported media type '{}' for {}",
                meta.media_type, meta.filename
            )));
        }
        if !is_accepted_extension(&meta.filename) {
            return Err(Error::UploadRejected(format!(
                "unsupported file extension: {}",
                meta.filename
            )));
        }
        if let Some(size) = meta.declared_size {
            if size > self.policy.max_file_size {
                return Err(Error::UploadTooLarge {
                    size,
                    limit: self.policy.max_file_size,
                });
            }
        }
        Ok(())
    }

    /// Validate and write one upload from a stream of chunks
    pub async fn accept<S, B, E>(&self, meta: &UploadMeta, chunks: S) -> Result<StoredUpload>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        self.check(meta)?;

        let final_path = self.dir.join(safe_filename(&meta.filename));
        let part_path = final_path.with_extension(format!(
            "{}.part",
            final_path.extension().and_then(|e| e.to_str()).unwrap_or("bin")
        ));

        let written = match self.write_part(&part_path, chunks).await {
            Ok(size) => size,
            Err(e) => {
                remove_quietly(&part_path).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&part_path, &final_path).await {
            remove_quietly(&part_path).await;
            return Err(e.into());
        }

        debug!(file = %meta.filename, path = %final_path.display(), bytes = written, "Stored upload");
        Ok(StoredUpload {
            original_name: meta.filename.clone(),
            stored_path: final_path,
            media_type: meta.media_type.clone(),
            size: written,
        })
    }

    /// Validate and write one upload already held in memory
    pub async fn accept_bytes(&self, meta: &UploadMeta, bytes: &[u8]) -> Result<StoredUpload> {
        let meta = meta.clone().with_declared_size(bytes.len() as u64);
        let chunks = futures::stream::iter([Ok::<_, std::convert::Infallible>(bytes)]);
        self.accept(&meta, chunks).await
    }

    async fn write_part<S, B, E>(&self, part_path: &Path, chunks: S) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut chunks = std::pin::pin!(chunks);
        let mut file = tokio::fs::File::create(part_path).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| Error::UploadRejected(format!("upload interrupted: {}", e)))?;
            let bytes = chunk.as_ref();
            written += bytes.len() as u64;
            if written > self.policy.max_file_size {
                return Err(Error::UploadTooLarge {
                    size: written,
                    limit: self.policy.max_file_size,
                });
            }
            file.write_all(bytes).await?;
        }

        if written == 0 {
            return Err(Error::UploadRejected("empty file".into()));
        }
        file.flush().await?;
        Ok(written)
    }

    /// Remove stored uploads, e.g. the rest of a batch that failed partway
    pub async fn discard(&self, uploads: &[StoredUpload]) {
        for upload in uploads {
            remove_quietly(&upload.stored_path).await;
        }
    }
}

/// Remove a file, ignoring "not found" and logging anything else
pub async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}
