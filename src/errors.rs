use crate::models::SessionView;
use crate::uploader::session::UploadSession;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file type: {name}. Only .jpg, .jpeg, .png and .gif images are supported.")]
    InvalidFileType { name: String },

    #[error("File too large: {name}. Maximum size is {max_mb}MB.")]
    FileTooLarge { name: String, max_mb: u64 },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Upload failed with code {code}: {}", .message.as_deref().unwrap_or("no message"))]
    UploadFailed { code: i64, message: Option<String> },

    #[error("Malformed upload response: {0}")]
    MalformedResponse(String),

    #[error("Transport error: {}", .message.as_deref().unwrap_or("no message"))]
    Transport { message: Option<String> },

    #[error("Upload timed out after {after_secs}s")]
    Timeout { after_secs: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

/// Coarse classification used when reporting a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Timeout,
    Unknown,
}

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_file_type(name: &str) -> Self {
        Self::InvalidFileType {
            name: name.to_string(),
        }
    }

    pub fn file_too_large(name: &str, max_mb: u64) -> Self {
        Self::FileTooLarge {
            name: name.to_string(),
            max_mb,
        }
    }

    pub fn transport(message: Option<String>) -> Self {
        Self::Transport { message }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidFileType { .. }
            | AppError::FileTooLarge { .. }
            | AppError::Validation { .. } => ErrorKind::Validation,
            AppError::Network(_)
            | AppError::UploadFailed { .. }
            | AppError::MalformedResponse(_)
            | AppError::Transport { .. } => ErrorKind::Transport,
            AppError::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::Unknown,
        }
    }

    /// Message shown to the user, or `fallback` when the failure carries none.
    pub fn user_message(&self, fallback: &str) -> String {
        let own = match self {
            AppError::UploadFailed { message, .. } | AppError::Transport { message } => {
                message.clone()
            }
            other => Some(other.to_string()),
        };

        match own {
            Some(message) if !message.trim().is_empty() => message,
            _ => fallback.to_string(),
        }
    }
}

/// Shared session state type
pub type SessionState = Arc<Mutex<UploadSession>>;

/// Safe session state update. Returns `None` when the lock is poisoned.
pub fn safe_session_update<F, R>(session_state: &SessionState, operation: &str, f: F) -> Option<R>
where
    F: FnOnce(&mut UploadSession) -> R,
{
    match session_state.lock() {
        Ok(mut session) => Some(f(&mut session)),
        Err(e) => {
            log::error!(
                "Failed to acquire session lock for {} (non-critical): {}",
                operation,
                e
            );
            None
        }
    }
}

pub fn safe_session_read<F, R>(session_state: &SessionState, operation: &str, f: F) -> Option<R>
where
    F: FnOnce(&UploadSession) -> R,
{
    match session_state.lock() {
        Ok(session) => Some(f(&session)),
        Err(e) => {
            log::error!(
                "Failed to acquire session lock for {} (non-critical): {}",
                operation,
                e
            );
            None
        }
    }
}

/// Publish a session snapshot to the rendering surface
pub fn safe_emit_event(
    events: &broadcast::Sender<SessionView>,
    event_name: &str,
    view: SessionView,
) -> bool {
    let generation = view.generation;
    match events.send(view) {
        Ok(receivers) => {
            log::debug!(
                "Emitted '{}' for generation {} to {} receiver(s)",
                event_name,
                generation,
                receivers
            );
            true
        }
        Err(_) => {
            log::debug!("No receivers for '{}' (non-critical)", event_name);
            false
        }
    }
}
