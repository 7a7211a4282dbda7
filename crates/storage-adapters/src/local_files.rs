//! # Local attachment storage
//!
//! Stores notice attachments on the local filesystem under a generated
//! name, sharded into two directory levels so no single directory grows
//! unbounded: `root/ab/cd/abcd…ef.pdf`.
//!
//! Only the generated filename is handed back to the services. The
//! client's filename and content type are kept in a JSON sidecar next to
//! the file (`abcd…ef.pdf.meta.json`) and returned on load.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use domains::{AttachmentStorage, DomainError, Result, StoredFile, Upload};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 10;
const META_SUFFIX: &str = ".meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct AttachmentMeta {
    original_name: String,
    content_type: String,
}

pub struct LocalAttachmentStorage {
    root_path: PathBuf,
}

impl LocalAttachmentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root_path: root.into() }
    }

    /// `ab/cd/<filename>` for a generated name starting with `abcd`.
    fn sharded_path(&self, filename: &str) -> Result<PathBuf> {
        if !is_generated_name(filename) {
            return Err(DomainError::not_found("attachment"));
        }
        let mut path = self.root_path.clone();
        path.push(&filename[0..2]);
        path.push(&filename[2..4]);
        path.push(filename);
        Ok(path)
    }
}

fn meta_path(file_path: &Path) -> PathBuf {
    let mut name = file_path.as_os_str().to_owned();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

/// Last path component of the client's filename, without quotes or
/// control characters.
fn display_name(original_name: &str) -> String {
    let name = Path::new(original_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    match cleaned.trim() {
        "" => "attachment".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Keeps a short alphanumeric extension from the client's filename.
fn extension_of(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > MAX_EXTENSION_LEN || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Accepts only names this adapter could have produced. Anything else,
/// including path traversal attempts, is treated as absent.
fn is_generated_name(filename: &str) -> bool {
    let (stem, ext) = match filename.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (filename, None),
    };
    let stem_ok = stem.len() == 32 && stem.chars().all(|c| c.is_ascii_hexdigit());
    let ext_ok = ext.map_or(true, |ext| {
        !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric())
    });
    stem_ok && ext_ok
}

fn io_error(err: std::io::Error, context: &str) -> DomainError {
    tracing::error!(error = %err, context, "attachment storage error");
    DomainError::internal(format!("{context}: {err}"))
}

#[async_trait]
impl AttachmentStorage for LocalAttachmentStorage {
    async fn save(&self, upload: Upload) -> Result<String> {
        let stem = Uuid::new_v4().simple().to_string();
        let filename = match extension_of(&upload.original_name) {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        };

        let target_path = self.sharded_path(&filename)?;
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error(err, "create attachment directory"))?;
        }
        fs::write(&target_path, &upload.bytes)
            .await
            .map_err(|err| io_error(err, "write attachment"))?;

        let meta = AttachmentMeta {
            original_name: display_name(&upload.original_name),
            content_type: upload.content_type.to_string(),
        };
        let encoded = serde_json::to_vec(&meta).map_err(DomainError::internal)?;
        if let Err(err) = fs::write(meta_path(&target_path), encoded).await {
            let _ = fs::remove_file(&target_path).await;
            return Err(io_error(err, "write attachment metadata"));
        }

        tracing::debug!(
            filename,
            original = %upload.original_name,
            size = upload.bytes.len(),
            "attachment stored"
        );
        Ok(filename)
    }

    async fn load(&self, filename: &str) -> Result<StoredFile> {
        let path = self.sharded_path(filename)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(DomainError::not_found("attachment"))
            }
            Err(err) => return Err(io_error(err, "read attachment")),
        };

        // Files without a readable sidecar fall back to the extension.
        let meta = match fs::read(meta_path(&path)).await {
            Ok(raw) => serde_json::from_slice::<AttachmentMeta>(&raw).ok(),
            Err(_) => None,
        };
        let (original_name, content_type) = match meta {
            Some(meta) => (
                meta.original_name,
                meta.content_type
                    .parse()
                    .unwrap_or(mime::APPLICATION_OCTET_STREAM),
            ),
            None => (
                filename.to_string(),
                mime_guess::from_path(&path).first_or_octet_stream(),
            ),
        };
        Ok(StoredFile {
            filename: filename.to_string(),
            original_name,
            content_type,
            bytes: Bytes::from(data),
        })
    }

    /// Removing a file that is already gone succeeds.
    async fn delete(&self, filename: &str) -> Result<()> {
        let path = self.sharded_path(filename)?;
        remove_if_present(&meta_path(&path)).await?;
        remove_if_present(&path).await
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(err, "remove attachment")),
    }
}
