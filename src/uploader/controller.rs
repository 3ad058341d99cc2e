use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use crate::config::UploaderConfig;
use crate::errors::{safe_session_read, AppError, AppResult, SessionState};
use crate::models::{EntityIcon, SelectedFile, SessionView};
use crate::security::ImageValidator;

use super::path_resolver::HttpPathResolver;
use super::ports::{PathResolver, Transport, Validator};
use super::progress_tracker::*;
use super::session::UploadSession;
use super::upload_client::{build_file_url, AippClient, UploadPayload};

const EVENT_CAPACITY: usize = 64;

/// Final result of the current submission, reported to the host once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Succeeded { remote_path: String },
    /// `remote_path` is the path still shown after the failure, possibly empty.
    Failed { message: String, remote_path: String },
}

pub type OutcomeListener = Arc<dyn Fn(&UploadOutcome) + Send + Sync>;

/// Background task applying one submission's result to the session.
pub type SubmissionHandle = JoinHandle<()>;

struct ControllerInner {
    base_url: String,
    tenant_id: String,
    upload_timeout: Duration,
    fallback_message: String,
    validator: Arc<dyn Validator>,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn PathResolver>,
    session: SessionState,
    events: SessionEvents,
    listener: Mutex<Option<OutcomeListener>>,
}

/// Owns the upload lifecycle of a single image.
#[derive(Clone)]
pub struct UploadController {
    inner: Arc<ControllerInner>,
}

impl UploadController {
    pub fn new(
        config: &UploaderConfig,
        validator: Arc<dyn Validator>,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn PathResolver>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(ControllerInner {
                base_url: config.base_url.clone(),
                tenant_id: config.tenant_id.clone(),
                upload_timeout: Duration::from_secs(config.upload_timeout_secs),
                fallback_message: config.upload_failed_message().to_string(),
                validator,
                transport,
                resolver,
                session: Arc::new(Mutex::new(UploadSession::new())),
                events,
                listener: Mutex::new(None),
            }),
        }
    }

    /// Controller wired to the HTTP upload endpoint and preview resolver.
    pub fn from_config(config: &UploaderConfig) -> AppResult<Self> {
        Ok(Self::new(
            config,
            Arc::new(ImageValidator::from_config(config)),
            Arc::new(AippClient::new(config)?),
            Arc::new(HttpPathResolver::new(config)?),
        ))
    }

    /// Register the callback told about the latest submission's outcome.
    ///
    /// The listener runs while the session is locked and must not call back
    /// into the controller.
    pub fn set_outcome_listener(&self, listener: OutcomeListener) {
        match self.inner.listener.lock() {
            Ok(mut slot) => *slot = Some(listener),
            Err(e) => log::error!("Failed to register outcome listener: {}", e),
        }
    }

    /// Validate `file` and, if accepted, upload it in the background.
    ///
    /// A rejected file leaves the session as it was and returns the validation error.
    pub fn select_file(&self, file: SelectedFile, owner_id: &str) -> AppResult<SubmissionHandle> {
        let inner = &self.inner;
        let previous = update_session_validating(&inner.session, &inner.events);

        if let Err(e) = inner.validator.check(&file) {
            log::warn!("Rejected {}: {}", file.name, e);
            update_session_rejected(&inner.session, &inner.events, previous);
            return Err(e);
        }

        let generation = update_session_uploading(&inner.session, &inner.events, file.summary())
            .ok_or_else(|| AppError::Internal("Upload session is unavailable".to_string()))?;

        let payload = UploadPayload::from_file(&file);
        Ok(tokio::spawn(submit(
            Arc::clone(inner),
            generation,
            payload,
            owner_id.to_string(),
        )))
    }

    /// Show an already stored icon without uploading anything.
    pub fn seed_preview(&self, icon: &EntityIcon) -> AppResult<SubmissionHandle> {
        let inner = &self.inner;
        let remote_path = icon.as_str().to_string();
        let generation = update_session_seeded(&inner.session, &inner.events, remote_path.clone())
            .ok_or_else(|| AppError::Internal("Upload session is unavailable".to_string()))?;

        inner.release_previews();

        log::info!("Seeded preview {} as generation {}", remote_path, generation);
        Ok(tokio::spawn(resolve_preview(Arc::clone(inner), remote_path)))
    }

    pub fn reset(&self) {
        update_session_reset(&self.inner.session, &self.inner.events);
        self.inner.release_previews();
    }

    pub fn view(&self) -> SessionView {
        safe_session_read(&self.inner.session, "view", |session| session.view())
            .unwrap_or_else(|| UploadSession::new().view())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionView> {
        self.inner.events.subscribe()
    }

    pub fn tenant_id(&self) -> &str {
        &self.inner.tenant_id
    }
}

impl ControllerInner {
    fn notify(&self, outcome: UploadOutcome) {
        let listener = match self.listener.lock() {
            Ok(slot) => slot.clone(),
            Err(e) => {
                log::warn!("Failed to read outcome listener (non-critical): {}", e);
                None
            }
        };

        if let Some(listener) = listener {
            listener(&outcome);
        }
    }

    fn release_previews(&self) {
        for preview_url in take_released_previews(&self.session) {
            self.resolver.release(&preview_url);
        }
    }
}

async fn submit(inner: Arc<ControllerInner>, generation: u64, payload: UploadPayload, owner_id: String) {
    let file_name = payload.file_name().to_string();
    let upload = inner
        .transport
        .upload(&inner.tenant_id, &owner_id, payload);

    let result = match timeout(inner.upload_timeout, upload).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            after_secs: inner.upload_timeout.as_secs(),
        }),
    };

    match result {
        Ok(uploaded) => {
            let remote_path = build_file_url(&inner.base_url, &inner.tenant_id, &uploaded);
            let applied = update_session_success(
                &inner.session,
                &inner.events,
                generation,
                remote_path.clone(),
                |session| {
                    inner.notify(UploadOutcome::Succeeded {
                        remote_path: session.remote_path().to_string(),
                    })
                },
            );
            if !applied {
                return;
            }

            inner.release_previews();
            resolve_preview(inner, remote_path).await;
        }
        Err(e) => {
            log::error!("Upload of {} failed ({:?}): {}", file_name, e.kind(), e);
            let message = e.user_message(&inner.fallback_message);
            update_session_failure(
                &inner.session,
                &inner.events,
                generation,
                message.clone(),
                |session| {
                    inner.notify(UploadOutcome::Failed {
                        message,
                        remote_path: session.remote_path().to_string(),
                    })
                },
            );
        }
    }
}

async fn resolve_preview(inner: Arc<ControllerInner>, remote_path: String) {
    let resolved = match timeout(inner.upload_timeout, inner.resolver.resolve(&remote_path)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            after_secs: inner.upload_timeout.as_secs(),
        }),
    };

    match resolved {
        Ok(preview_url) => {
            if update_session_preview_url(
                &inner.session,
                &inner.events,
                &remote_path,
                preview_url.clone(),
            ) {
                update_session_preview_ready(&inner.session, &inner.events, &remote_path);
            } else {
                inner.resolver.release(&preview_url);
            }
        }
        Err(e) => {
            log::warn!("Could not resolve preview for {} (non-critical): {}", remote_path, e);
        }
    }
}
