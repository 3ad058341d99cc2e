pub mod config;
pub mod copy_app;
pub mod errors;
pub mod image_processor;
pub mod models;
pub mod security;
pub mod uploader;

pub use config::UploaderConfig;
pub use copy_app::{CopyAppDialog, CopyAppForm};
pub use errors::{AppError, AppResult, ErrorKind};
pub use uploader::{UploadController, UploadOutcome, UploadStatus};
