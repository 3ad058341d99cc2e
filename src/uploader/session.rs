use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FileSummary, SessionView};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Validating,
    Uploading,
    Succeeded,
    Failed,
}

/// How far the preview of the uploaded image has progressed.
///
/// A ready preview always carries both the remote path and the preview URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PreviewState {
    #[default]
    Empty,
    PathKnown {
        remote_path: String,
    },
    UrlKnown {
        remote_path: String,
        preview_url: String,
    },
    Ready {
        remote_path: String,
        preview_url: String,
    },
}

impl PreviewState {
    pub fn remote_path(&self) -> &str {
        match self {
            PreviewState::Empty => "",
            PreviewState::PathKnown { remote_path }
            | PreviewState::UrlKnown { remote_path, .. }
            | PreviewState::Ready { remote_path, .. } => remote_path,
        }
    }

    pub fn preview_url(&self) -> &str {
        match self {
            PreviewState::UrlKnown { preview_url, .. } | PreviewState::Ready { preview_url, .. } => {
                preview_url
            }
            _ => "",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PreviewState::Ready { .. })
    }
}

/// Upload lifecycle of the single image owned by a controller.
#[derive(Debug, Clone)]
pub struct UploadSession {
    generation: u64,
    status: UploadStatus,
    selected_file: Option<FileSummary>,
    preview: PreviewState,
    error_message: Option<String>,
    released_previews: Vec<String>,
    updated_at: DateTime<Utc>,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            generation: 0,
            status: UploadStatus::Idle,
            selected_file: None,
            preview: PreviewState::Empty,
            error_message: None,
            released_previews: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn selected_file(&self) -> Option<&FileSummary> {
        self.selected_file.as_ref()
    }

    pub fn preview(&self) -> &PreviewState {
        &self.preview
    }

    pub fn remote_path(&self) -> &str {
        self.preview.remote_path()
    }

    pub fn preview_url(&self) -> &str {
        self.preview.preview_url()
    }

    pub fn preview_ready(&self) -> bool {
        self.preview.is_ready()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            generation: self.generation,
            status: self.status,
            file_name: self.selected_file.as_ref().map(|f| f.name.clone()),
            remote_path: self.remote_path().to_string(),
            preview_url: self.preview_url().to_string(),
            preview_ready: self.preview_ready(),
            error_message: self.error_message.clone(),
        }
    }

    /// Return to `Idle` ahead of checking a new pick, returning the status to
    /// restore if the pick is rejected. The current preview stays visible.
    pub(crate) fn begin_selection(&mut self) -> UploadStatus {
        let previous = self.status;
        self.status = UploadStatus::Idle;
        self.touch();
        previous
    }

    pub(crate) fn begin_validation(&mut self) {
        self.status = UploadStatus::Validating;
        self.touch();
    }

    pub(crate) fn reject_validation(&mut self, previous: UploadStatus) {
        self.status = previous;
        self.touch();
    }

    /// Accept a new file and start uploading it under a fresh generation.
    ///
    /// The previous preview stays visible until the new upload succeeds.
    pub(crate) fn begin_upload(&mut self, file: FileSummary) -> u64 {
        self.generation += 1;
        self.selected_file = Some(file);
        self.error_message = None;
        self.status = UploadStatus::Uploading;
        self.touch();
        self.generation
    }

    pub(crate) fn complete_upload(&mut self, generation: u64, remote_path: String) -> bool {
        if !self.is_current(generation) || self.status != UploadStatus::Uploading {
            return false;
        }
        self.status = UploadStatus::Succeeded;
        self.replace_preview(PreviewState::PathKnown { remote_path });
        self.touch();
        true
    }

    pub(crate) fn fail_upload(&mut self, generation: u64, message: String) -> bool {
        if !self.is_current(generation) || self.status != UploadStatus::Uploading {
            return false;
        }
        self.status = UploadStatus::Failed;
        self.error_message = Some(message);
        self.touch();
        true
    }

    /// Record the resolved URL for `remote_path` while that path is still the
    /// one shown, whichever generation resolved it.
    pub(crate) fn attach_preview_url(&mut self, remote_path: &str, preview_url: String) -> bool {
        if preview_url.is_empty() {
            return false;
        }
        match &self.preview {
            PreviewState::PathKnown { remote_path: current } if current == remote_path => {
                self.preview = PreviewState::UrlKnown {
                    remote_path: current.clone(),
                    preview_url,
                };
                self.touch();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn mark_preview_ready(&mut self, remote_path: &str) -> bool {
        match std::mem::take(&mut self.preview) {
            PreviewState::UrlKnown {
                remote_path: current,
                preview_url,
            } if current == remote_path => {
                self.preview = PreviewState::Ready {
                    remote_path: current,
                    preview_url,
                };
                self.touch();
                true
            }
            other => {
                self.preview = other;
                false
            }
        }
    }

    /// Show an already stored image without uploading anything.
    pub(crate) fn seed(&mut self, remote_path: String) -> u64 {
        self.generation += 1;
        self.status = UploadStatus::Idle;
        self.selected_file = None;
        self.error_message = None;
        self.replace_preview(PreviewState::PathKnown { remote_path });
        self.touch();
        self.generation
    }

    pub(crate) fn reset(&mut self) -> u64 {
        self.generation += 1;
        self.status = UploadStatus::Idle;
        self.selected_file = None;
        self.replace_preview(PreviewState::Empty);
        self.error_message = None;
        self.touch();
        self.generation
    }

    /// Preview URLs no longer shown, whose local copies can be released.
    pub(crate) fn take_released_previews(&mut self) -> Vec<String> {
        std::mem::take(&mut self.released_previews)
    }

    fn replace_preview(&mut self, preview: PreviewState) {
        let displaced = std::mem::replace(&mut self.preview, preview);
        let url = displaced.preview_url();
        if !url.is_empty() && url != self.preview.preview_url() {
            self.released_previews.push(url.to_string());
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
