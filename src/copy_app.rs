use std::sync::{Arc, Mutex};

use crate::errors::{AppError, AppResult};
use crate::models::{AppEntity, CopyRequest, SelectedFile, SessionView};
use crate::security::InputValidator;
use crate::uploader::ports::CopySubmitter;
use crate::uploader::{SubmissionHandle, UploadController, UploadOutcome};

/// Form fields of the copy dialog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyAppForm {
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Default)]
struct DialogState {
    open: bool,
    entity: Option<AppEntity>,
    form: CopyAppForm,
    loading: bool,
}

/// Dialog copying an application under a new name and icon.
pub struct CopyAppDialog {
    controller: UploadController,
    submitter: Arc<dyn CopySubmitter>,
    state: Arc<Mutex<DialogState>>,
}

impl CopyAppDialog {
    pub fn new(controller: UploadController, submitter: Arc<dyn CopySubmitter>) -> Self {
        let state = Arc::new(Mutex::new(DialogState::default()));

        let listener_state = Arc::clone(&state);
        controller.set_outcome_listener(Arc::new(move |outcome: &UploadOutcome| {
            let Ok(mut state) = listener_state.lock() else {
                log::error!("Copy dialog state lock poisoned, icon field not updated");
                return;
            };
            // The icon field follows whatever path the upload button still shows.
            match outcome {
                UploadOutcome::Succeeded { remote_path }
                | UploadOutcome::Failed { remote_path, .. } => {
                    state.form.icon = remote_path.clone();
                }
            }
        }));

        Self {
            controller,
            submitter,
            state,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut DialogState) -> R) -> AppResult<R> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| AppError::Internal(format!("Copy dialog state lock poisoned: {}", e)))?;
        Ok(f(&mut state))
    }

    /// Open the dialog for `entity`, showing its existing icon if it has one.
    pub fn open(&self, entity: AppEntity) -> AppResult<Option<SubmissionHandle>> {
        self.controller.reset();

        let icon = entity.icon().cloned();
        log::info!("Opening copy dialog for app {}", entity.id);
        self.with_state(|state| {
            state.form = CopyAppForm {
                name: entity.name.clone(),
                icon: icon
                    .as_ref()
                    .map(|icon| icon.as_str().to_string())
                    .unwrap_or_default(),
            };
            state.entity = Some(entity);
            state.loading = false;
            state.open = true;
        })?;

        match icon {
            Some(icon) => self.controller.seed_preview(&icon).map(Some),
            None => Ok(None),
        }
    }

    /// Upload a new icon. The icon field always holds the path the upload
    /// button shows, so a failed or rejected pick leaves the last good one.
    pub fn select_icon(&self, file: SelectedFile) -> AppResult<SubmissionHandle> {
        let owner_id = self
            .with_state(|state| state.entity.as_ref().map(|entity| entity.id.clone()))?
            .ok_or_else(|| AppError::validation("entity", "Copy dialog is not open"))?;

        self.controller.select_file(file, &owner_id).map_err(|e| {
            let shown = self.controller.view().remote_path;
            if let Err(restore_err) = self.with_state(|state| state.form.icon = shown) {
                log::error!("Failed to restore icon field after rejection: {}", restore_err);
            }
            e
        })
    }

    pub fn set_name(&self, name: &str) -> AppResult<()> {
        self.with_state(|state| state.form.name = name.to_string())
    }

    /// Validate the form and hand it to the submitter.
    pub async fn confirm(&self) -> AppResult<CopyRequest> {
        let request = self.with_state(|state| -> AppResult<CopyRequest> {
            let entity = state
                .entity
                .as_ref()
                .ok_or_else(|| AppError::validation("entity", "Copy dialog is not open"))?;
            InputValidator::validate_app_name(&state.form.name)?;

            let icon = state.form.icon.trim();
            Ok(CopyRequest {
                source_app_id: entity.id.clone(),
                name: state.form.name.trim().to_string(),
                icon: (!icon.is_empty()).then(|| icon.to_string()),
            })
        })??;

        self.with_state(|state| state.loading = true)?;
        let result = self.submitter.submit(request.clone()).await;
        self.with_state(|state| state.loading = false)?;

        match result {
            Ok(()) => {
                log::info!("Copied app {} as '{}'", request.source_app_id, request.name);
                Ok(request)
            }
            Err(e) => {
                log::error!("Failed to copy app {}: {}", request.source_app_id, e);
                Err(e)
            }
        }
    }

    /// Close the dialog and discard its state.
    pub fn close(&self) -> AppResult<()> {
        self.with_state(|state| *state = DialogState::default())?;
        self.controller.reset();
        Ok(())
    }

    pub fn form(&self) -> CopyAppForm {
        self.with_state(|state| state.form.clone()).unwrap_or_default()
    }

    pub fn is_open(&self) -> bool {
        self.with_state(|state| state.open).unwrap_or(false)
    }

    pub fn is_loading(&self) -> bool {
        self.with_state(|state| state.loading).unwrap_or(false)
    }

    pub fn view(&self) -> SessionView {
        self.controller.view()
    }
}
