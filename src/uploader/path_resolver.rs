use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::time::Duration;

use crate::config::UploaderConfig;
use crate::errors::{AppError, AppResult};
use crate::image_processor;
use crate::security::FileSystemGuard;

use super::ports::PathResolver;

/// Downloads the stored image and serves it from a local file.
///
/// Resolution only succeeds once the bytes decode as an image, so the
/// returned URL is always safe to show at full size. Local copies are
/// deleted again when the controller releases them.
pub struct HttpPathResolver {
    client: Client,
    stored: Mutex<HashSet<PathBuf>>,
}

impl HttpPathResolver {
    pub fn new(config: &UploaderConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.upload_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            stored: Mutex::new(HashSet::new()),
        })
    }

    /// Number of local copies currently kept on disk
    pub fn stored_count(&self) -> usize {
        self.stored.lock().map(|stored| stored.len()).unwrap_or(0)
    }

    async fn store_locally(&self, bytes: &[u8]) -> AppResult<PathBuf> {
        let info = image_processor::verify_image_bytes(bytes)?;
        let local_path = FileSystemGuard::create_secure_temp_file(info.extension())?;
        tokio::fs::write(&local_path, bytes).await?;

        match self.stored.lock() {
            Ok(mut stored) => {
                stored.insert(local_path.clone());
            }
            Err(e) => log::warn!("Failed to track preview file (non-critical): {}", e),
        }

        log::debug!(
            "Stored {}x{} preview at {}",
            info.width,
            info.height,
            local_path.display()
        );
        Ok(local_path)
    }
}

#[async_trait]
impl PathResolver for HttpPathResolver {
    async fn resolve(&self, remote_path: &str) -> AppResult<String> {
        if remote_path.starts_with("file://") || remote_path.starts_with("data:") {
            return Ok(remote_path.to_string());
        }

        if !(remote_path.starts_with("http://") || remote_path.starts_with("https://")) {
            return Err(AppError::validation(
                "remote_path",
                "Preview path must be an absolute URL",
            ));
        }

        let response = self.client.get(remote_path).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::transport(Some(format!(
                "Preview download failed with status {}",
                status
            ))));
        }

        let bytes = response.bytes().await?;
        let local_path = self.store_locally(&bytes).await?;

        Ok(format!("file://{}", local_path.display()))
    }

    fn release(&self, preview_url: &str) {
        let Some(path) = preview_url.strip_prefix("file://").map(PathBuf::from) else {
            return;
        };

        let owned = match self.stored.lock() {
            Ok(mut stored) => stored.remove(&path),
            Err(e) => {
                log::warn!("Failed to read tracked preview files (non-critical): {}", e);
                false
            }
        };
        if !owned {
            return;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => log::debug!("Removed preview file {}", path.display()),
            Err(e) => log::warn!("Failed to remove preview file {}: {}", path.display(), e),
        }
    }
}
