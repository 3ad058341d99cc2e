use async_trait::async_trait;
use reqwest::{multipart, Client};
use tokio::time::Duration;

use crate::config::UploaderConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{SelectedFile, ServerUploadResponse, UploadedFile};
use crate::security::InputValidator;

use super::ports::Transport;

pub const ATTACHMENT_FILENAME_HEADER: &str = "attachment-filename";
/// reqwest appends the boundary when it writes this content type.
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";
pub const FILE_FIELD_NAME: &str = "file";

/// HTTP client for the application file upload endpoint
pub struct AippClient {
    client: Client,
    base_url: String,
}

impl AippClient {
    pub fn new(config: &UploaderConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.upload_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn upload_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/file/upload", self.base_url, tenant_id)
    }
}

#[async_trait]
impl Transport for AippClient {
    async fn upload(
        &self,
        tenant_id: &str,
        owner_id: &str,
        payload: UploadPayload,
    ) -> AppResult<UploadedFile> {
        let url = self.upload_url(tenant_id);
        let form = payload.build_form()?;

        log::debug!(
            "Uploading {} ({} bytes) to {} for owner {}",
            payload.file_name(),
            payload.size(),
            url,
            owner_id
        );

        let response = self
            .client
            .post(&url)
            .query(&[("aippId", owner_id)])
            .header(ATTACHMENT_FILENAME_HEADER, payload.attachment_filename())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;
        log::debug!(
            "Upload response {} (first 300 chars): {}",
            status,
            &response_text[..floor_char_boundary(&response_text, 300)]
        );

        if !status.is_success() {
            return Err(AppError::UploadFailed {
                code: i64::from(status.as_u16()),
                message: extract_error_message(&response_text),
            });
        }

        parse_upload_response(&response_text)
    }
}

/// Multipart body for a single image.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    file_name: String,
    mime_type: String,
    data: Vec<u8>,
}

impl UploadPayload {
    pub fn from_file(file: &SelectedFile) -> Self {
        Self {
            file_name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            data: file.bytes.clone(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// URI-encoded original file name sent in the `attachment-filename` header.
    pub fn attachment_filename(&self) -> String {
        InputValidator::encode_attachment_filename(&self.file_name)
    }

    pub fn build_form(&self) -> AppResult<multipart::Form> {
        let part = multipart::Part::bytes(self.data.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime_type)?;

        Ok(multipart::Form::new().part(FILE_FIELD_NAME, part))
    }
}

/// Parse the upload endpoint body, rejecting anything without a usable file descriptor.
pub fn parse_upload_response(body: &str) -> AppResult<UploadedFile> {
    let response: ServerUploadResponse = serde_json::from_str(body)
        .map_err(|e| AppError::MalformedResponse(format!("invalid JSON body: {}", e)))?;

    if response.code != 0 {
        return Err(AppError::UploadFailed {
            code: response.code,
            message: response.msg.filter(|m| !m.trim().is_empty()),
        });
    }

    match response.data {
        Some(file) if !file.file_path.is_empty() && !file.file_name.is_empty() => Ok(file),
        Some(_) => Err(AppError::MalformedResponse(
            "empty file_path or file_name".to_string(),
        )),
        None => Err(AppError::MalformedResponse("missing data".to_string())),
    }
}

/// Address the stored file is served from.
pub fn build_file_url(base_url: &str, tenant_id: &str, file: &UploadedFile) -> String {
    format!(
        "{}/{}/file?filePath={}&fileName={}",
        base_url.trim_end_matches('/'),
        tenant_id,
        file.file_path,
        file.file_name
    )
}

fn extract_error_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    ["msg", "message"]
        .iter()
        .filter_map(|key| json.get(*key).and_then(|v| v.as_str()))
        .find(|m| !m.trim().is_empty())
        .map(str::to_string)
}

fn floor_char_boundary(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    (0..=max).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0)
}
