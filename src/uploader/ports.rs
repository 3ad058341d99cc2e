// Collaborators the upload controller and copy dialog call into

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::models::{CopyRequest, SelectedFile, UploadedFile};

use super::upload_client::UploadPayload;

/// Client-side policy deciding whether a file may be submitted.
pub trait Validator: Send + Sync {
    fn check(&self, file: &SelectedFile) -> AppResult<()>;
}

/// Performs the multipart upload and returns the stored file descriptor.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn upload(
        &self,
        tenant_id: &str,
        owner_id: &str,
        payload: UploadPayload,
    ) -> AppResult<UploadedFile>;
}

/// Turns a server file path into a URL an image element can display.
#[async_trait]
pub trait PathResolver: Send + Sync {
    async fn resolve(&self, remote_path: &str) -> AppResult<String>;

    /// Called once a resolved URL is no longer displayed.
    fn release(&self, _preview_url: &str) {}
}

/// Receives the confirmed copy dialog form.
#[async_trait]
pub trait CopySubmitter: Send + Sync {
    async fn submit(&self, request: CopyRequest) -> AppResult<()>;
}
