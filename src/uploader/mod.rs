// Upload lifecycle of a single image
//
// The controller validates a picked file, submits it in the background and
// tracks the remote path and preview of the latest accepted selection.

pub mod controller;
pub mod path_resolver;
pub mod ports;
pub mod progress_tracker;
pub mod session;
pub mod upload_client;

pub use controller::{OutcomeListener, SubmissionHandle, UploadController, UploadOutcome};
pub use session::{PreviewState, UploadSession, UploadStatus};
