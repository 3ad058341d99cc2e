use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::AppResult;
use crate::image_processor;
use crate::uploader::session::UploadStatus;

/// A file picked by the user, held in memory until it is submitted.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = image_processor::mime_type_for(&name).to_string();
        Self {
            size: bytes.len() as u64,
            name,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(file_path: &str) -> AppResult<Self> {
        let bytes = tokio::fs::read(file_path).await?;
        let name = Path::new(file_path)
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Ok(Self::new(name, bytes))
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            name: self.name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Name, size and type of the selected file, without its content.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

/// Body returned by the upload endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerUploadResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<UploadedFile>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_path: String,
    pub file_name: String,
}

/// Path of an icon already stored for an entity.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct EntityIcon(pub String);

impl EntityIcon {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct AppAttributes {
    #[serde(default)]
    pub icon: Option<EntityIcon>,
}

/// The application a copy dialog is opened for.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AppEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: AppAttributes,
}

impl AppEntity {
    /// Existing icon path, ignoring blank values.
    pub fn icon(&self) -> Option<&EntityIcon> {
        self.attributes
            .icon
            .as_ref()
            .filter(|icon| !icon.as_str().trim().is_empty())
    }
}

/// Request handed to the copy submitter once the dialog is confirmed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub source_app_id: String,
    pub name: String,
    pub icon: Option<String>,
}

/// What the rendering layer needs to draw the upload button.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub generation: u64,
    pub status: UploadStatus,
    pub file_name: Option<String>,
    pub remote_path: String,
    pub preview_url: String,
    pub preview_ready: bool,
    pub error_message: Option<String>,
}

impl SessionView {
    pub fn shows_placeholder(&self) -> bool {
        self.preview_url.is_empty()
    }

    /// Hover-to-replace mask over an already displayed image.
    pub fn shows_replace_overlay(&self) -> bool {
        self.preview_ready
    }

    pub fn is_uploaded(&self) -> bool {
        !self.remote_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_file_detects_mime_type() {
        let file = SelectedFile::new("Photo.JPG", vec![0u8; 16]);
        assert_eq!(file.size, 16);
        assert_eq!(file.mime_type, "image/jpeg");

        let summary = file.summary();
        assert_eq!(summary.name, "Photo.JPG");
        assert_eq!(summary.size, 16);
    }

    #[test]
    fn test_server_response_parses_without_data() {
        let response: ServerUploadResponse =
            serde_json::from_str(r#"{"code": 90002, "msg": "denied"}"#).unwrap();
        assert_eq!(response.code, 90002);
        assert_eq!(response.msg.as_deref(), Some("denied"));
        assert!(response.data.is_none());
    }

    #[test]
    fn test_entity_icon_ignores_blank_values() {
        let entity: AppEntity = serde_json::from_str(
            r#"{"id": "app-1", "name": "Demo", "attributes": {"icon": "  "}}"#,
        )
        .unwrap();
        assert!(entity.icon().is_none());

        let entity: AppEntity =
            serde_json::from_str(r#"{"id": "app-2", "name": "Demo"}"#).unwrap();
        assert!(entity.icon().is_none());

        let entity: AppEntity = serde_json::from_str(
            r#"{"id": "app-3", "name": "Demo", "attributes": {"icon": "http://host/icon.png"}}"#,
        )
        .unwrap();
        assert_eq!(entity.icon().map(EntityIcon::as_str), Some("http://host/icon.png"));
    }
}
