use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, Result};

/// File store for uploaded photos, rooted at the configured upload
/// directory. Records reference blobs by the stored name returned
/// from [`BlobStore::put`].
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Create the upload directory if it doesn't exist
        std::fs::create_dir_all(&root)
            .map_err(|e| AppError::Storage(format!("Failed to create upload directory: {}", e)))?;

        Ok(Self { root })
    }

    /// Writes the bytes under a freshly generated name and returns that name.
    pub async fn put(&self, original_name: &str, data: &[u8]) -> Result<String> {
        let stored_name = storage_name(original_name);
        let path = self.resolve(&stored_name)?;

        fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {}", e)))?;

        debug!(name = %stored_name, bytes = data.len(), "stored blob");
        Ok(stored_name)
    }

    /// Removes a blob. A missing file is not an error, so record deletion
    /// stays idempotent even when the blob is already gone.
    pub async fn remove(&self, stored_name: &str) -> Result<()> {
        let path = self.resolve(stored_name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(name = %stored_name, "removed blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {}", e))),
        }
    }

    /// Maps a stored name to its path under the root, rejecting names that
    /// could escape the upload directory.
    pub fn resolve(&self, stored_name: &str) -> Result<PathBuf> {
        if stored_name.is_empty()
            || stored_name.contains('/')
            || stored_name.contains('\\')
            || stored_name.contains("..")
        {
            return Err(AppError::Validation(format!(
                "invalid stored file name: {}",
                stored_name
            )));
        }

        Ok(self.root.join(stored_name))
    }
}

/// Storage name for an upload: sanitized stem, microsecond timestamp,
/// random suffix, lowercased extension. Two uploads of the same filename
/// never collide.
fn storage_name(original: &str) -> String {
    let path = Path::new(original);
    let stem = sanitize_stem(path.file_stem().and_then(|s| s.to_str()).unwrap_or(""));
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .and_then(sanitize_extension);

    let timestamp = Utc::now().timestamp_micros();
    let suffix: u32 = rand::random();

    match ext {
        Some(ext) => format!("{}-{}-{:08x}.{}", stem, timestamp, suffix, ext),
        None => format!("{}-{}-{:08x}", stem, timestamp, suffix),
    }
}

/// Keeps ASCII alphanumerics, `-` and `_`; everything else (separators,
/// dots, spaces) becomes `_` so the result can never traverse.
fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn sanitize_extension(ext: &str) -> Option<String> {
    let cleaned: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
