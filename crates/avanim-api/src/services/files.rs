//! Uploaded and generated files under the static root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::security::is_safe_relative_path;

/// Subdirectory for avatar images.
pub const AVATARS_DIR: &str = "avatars";
/// Subdirectory for generated animations.
pub const ANIMATIONS_DIR: &str = "animations";
/// Subdirectory for custom driving uploads.
pub const DRIVING_DIR: &str = "driving";

/// Files addressed by paths relative to one root directory.
#[derive(Debug, Clone)]
pub struct MediaFiles {
    root: PathBuf,
}

impl MediaFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload and output directories.
    pub async fn ensure_dirs(&self) -> ApiResult<()> {
        for dir in [AVATARS_DIR, ANIMATIONS_DIR, DRIVING_DIR] {
            let path = self.root.join(dir);
            tokio::fs::create_dir_all(&path).await.map_err(|e| {
                ApiError::internal(format!("Failed to create {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }

    /// Absolute location of a stored relative path.
    pub fn absolute(&self, relative: &str) -> ApiResult<PathBuf> {
        if !is_safe_relative_path(relative) {
            return Err(ApiError::bad_request("Invalid file path"));
        }
        Ok(self.root.join(relative))
    }

    /// Write `data` to `<dir>/<name>` and return the relative path.
    pub async fn save(&self, dir: &str, name: &str, data: &[u8]) -> ApiResult<String> {
        let relative = format!("{}/{}", dir, name);
        let path = self.absolute(&relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to create upload dir: {}", e)))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to save upload: {}", e)))?;
        debug!(path = %path.display(), bytes = data.len(), "Saved file");
        Ok(relative)
    }

    /// Remove a stored file. Missing files and unsafe paths are logged and skipped.
    pub async fn remove(&self, relative: &str) {
        let path = match self.absolute(relative) {
            Ok(path) => path,
            Err(_) => {
                warn!(path = relative, "Refusing to remove file outside the static root");
                return;
            }
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove file: {}", e),
        }
    }
}
