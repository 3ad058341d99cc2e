use tokio::sync::broadcast;

use crate::errors::{safe_emit_event, safe_session_read, safe_session_update, SessionState};
use crate::models::{FileSummary, SessionView};

use super::session::{UploadSession, UploadStatus};

pub type SessionEvents = broadcast::Sender<SessionView>;

/// Apply `f` and publish the resulting view while still holding the lock,
/// so receivers observe views in the order they were applied.
fn apply_and_publish<F, R>(
    session_state: &SessionState,
    events: &SessionEvents,
    event_name: &str,
    publish_if: impl FnOnce(&R) -> bool,
    f: F,
) -> Option<R>
where
    F: FnOnce(&mut UploadSession) -> R,
{
    safe_session_update(session_state, event_name, |session| {
        let result = f(session);
        if publish_if(&result) {
            safe_emit_event(events, event_name, session.view());
        }
        result
    })
}

fn log_stale(operation: &str, session_state: &SessionState, generation: u64) {
    let current = safe_session_read(session_state, operation, |session| session.generation());
    log::warn!(
        "Discarding stale {} for generation {} (current {:?})",
        operation,
        generation,
        current
    );
}

/// Return to `Idle` and enter `Validating`, returning the status to restore on rejection
pub fn update_session_validating(
    session_state: &SessionState,
    events: &SessionEvents,
) -> UploadStatus {
    safe_session_update(session_state, "upload-selected", |session| {
        let previous = session.begin_selection();
        safe_emit_event(events, "upload-selected", session.view());
        session.begin_validation();
        safe_emit_event(events, "upload-validating", session.view());
        previous
    })
    .unwrap_or(UploadStatus::Idle)
}

pub fn update_session_rejected(
    session_state: &SessionState,
    events: &SessionEvents,
    previous: UploadStatus,
) {
    apply_and_publish(
        session_state,
        events,
        "upload-rejected",
        |_| true,
        |session| session.reject_validation(previous),
    );
}

/// Start uploading `file`; returns the generation the submission is tagged with
pub fn update_session_uploading(
    session_state: &SessionState,
    events: &SessionEvents,
    file: FileSummary,
) -> Option<u64> {
    let file_name = file.name.clone();
    let generation = apply_and_publish(
        session_state,
        events,
        "upload-started",
        |_| true,
        |session| session.begin_upload(file),
    )?;
    log::info!("Uploading {} as generation {}", file_name, generation);
    Some(generation)
}

/// Record a successful upload. `on_applied` runs under the session lock, so
/// it cannot observe a newer selection than the one it reports.
pub fn update_session_success(
    session_state: &SessionState,
    events: &SessionEvents,
    generation: u64,
    remote_path: String,
    on_applied: impl FnOnce(&UploadSession),
) -> bool {
    let applied = apply_and_publish(
        session_state,
        events,
        "upload-succeeded",
        |applied: &bool| *applied,
        |session| {
            let applied = session.complete_upload(generation, remote_path);
            if applied {
                on_applied(session);
            }
            applied
        },
    )
    .unwrap_or(false);

    if applied {
        log::info!("Upload generation {} succeeded", generation);
    } else {
        log_stale("upload success", session_state, generation);
    }
    applied
}

pub fn update_session_failure(
    session_state: &SessionState,
    events: &SessionEvents,
    generation: u64,
    message: String,
    on_applied: impl FnOnce(&UploadSession),
) -> bool {
    let applied = apply_and_publish(
        session_state,
        events,
        "upload-failed",
        |applied: &bool| *applied,
        |session| {
            let applied = session.fail_upload(generation, message);
            if applied {
                on_applied(session);
            }
            applied
        },
    )
    .unwrap_or(false);

    if !applied {
        log_stale("upload failure", session_state, generation);
    }
    applied
}

pub fn update_session_preview_url(
    session_state: &SessionState,
    events: &SessionEvents,
    remote_path: &str,
    preview_url: String,
) -> bool {
    let applied = apply_and_publish(
        session_state,
        events,
        "preview-resolved",
        |applied: &bool| *applied,
        |session| session.attach_preview_url(remote_path, preview_url),
    )
    .unwrap_or(false);

    if !applied {
        log::warn!("Discarding preview for {}, no longer displayed", remote_path);
    }
    applied
}

pub fn update_session_preview_ready(
    session_state: &SessionState,
    events: &SessionEvents,
    remote_path: &str,
) -> bool {
    let applied = apply_and_publish(
        session_state,
        events,
        "preview-ready",
        |applied: &bool| *applied,
        |session| session.mark_preview_ready(remote_path),
    )
    .unwrap_or(false);

    if applied {
        log::debug!("Preview ready for {}", remote_path);
    }
    applied
}

/// Drain preview URLs the session no longer shows
pub fn take_released_previews(session_state: &SessionState) -> Vec<String> {
    safe_session_update(session_state, "release-previews", |session| {
        session.take_released_previews()
    })
    .unwrap_or_default()
}

pub fn update_session_seeded(
    session_state: &SessionState,
    events: &SessionEvents,
    remote_path: String,
) -> Option<u64> {
    apply_and_publish(
        session_state,
        events,
        "preview-seeded",
        |_| true,
        |session| session.seed(remote_path),
    )
}

pub fn update_session_reset(session_state: &SessionState, events: &SessionEvents) {
    if let Some(generation) = apply_and_publish(
        session_state,
        events,
        "upload-reset",
        |_| true,
        |session| session.reset(),
    ) {
        log::debug!("Session reset to generation {}", generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn state() -> (SessionState, SessionEvents, broadcast::Receiver<SessionView>) {
        let (events, receiver) = broadcast::channel(16);
        (Arc::new(Mutex::new(UploadSession::new())), events, receiver)
    }

    fn summary() -> FileSummary {
        FileSummary {
            name: "photo.png".to_string(),
            size: 10,
            mime_type: "image/png".to_string(),
        }
    }

    fn drain(receiver: &mut broadcast::Receiver<SessionView>) -> Vec<UploadStatus> {
        std::iter::from_fn(|| receiver.try_recv().ok())
            .map(|view| view.status)
            .collect()
    }

    #[test]
    fn test_applied_updates_are_published_in_order() {
        let (session_state, events, mut receiver) = state();

        update_session_validating(&session_state, &events);
        let generation = update_session_uploading(&session_state, &events, summary()).unwrap();
        assert!(update_session_success(
            &session_state,
            &events,
            generation,
            "p".to_string(),
            |_| {}
        ));

        assert_eq!(
            drain(&mut receiver),
            vec![
                UploadStatus::Idle,
                UploadStatus::Validating,
                UploadStatus::Uploading,
                UploadStatus::Succeeded
            ]
        );

        update_session_validating(&session_state, &events);
        assert_eq!(
            drain(&mut receiver),
            vec![UploadStatus::Idle, UploadStatus::Validating]
        );
    }

    #[test]
    fn test_stale_updates_are_not_published_or_reported() {
        let (session_state, events, mut receiver) = state();

        let stale = update_session_uploading(&session_state, &events, summary()).unwrap();
        update_session_reset(&session_state, &events);
        while receiver.try_recv().is_ok() {}

        let mut reported = false;
        assert!(!update_session_success(
            &session_state,
            &events,
            stale,
            "p".to_string(),
            |_| reported = true
        ));
        assert!(!update_session_failure(
            &session_state,
            &events,
            stale,
            "x".to_string(),
            |_| reported = true
        ));
        assert!(!reported);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_applied_result_is_reported_with_the_new_state() {
        let (session_state, events, _receiver) = state();
        let generation = update_session_uploading(&session_state, &events, summary()).unwrap();

        let mut seen = None;
        update_session_success(&session_state, &events, generation, "p".to_string(), |session| {
            seen = Some((session.status(), session.remote_path().to_string()))
        });
        assert_eq!(seen, Some((UploadStatus::Succeeded, "p".to_string())));
    }

    #[test]
    fn test_updates_without_receivers_still_apply() {
        let (session_state, events, receiver) = state();
        drop(receiver);

        update_session_seeded(&session_state, &events, "icon".to_string()).unwrap();
        assert!(update_session_preview_url(
            &session_state,
            &events,
            "icon",
            "file:///icon.png".to_string()
        ));
        assert!(update_session_preview_ready(&session_state, &events, "icon"));

        let ready = safe_session_read(&session_state, "test", |s| s.preview_ready()).unwrap();
        assert!(ready);

        update_session_reset(&session_state, &events);
        assert_eq!(
            take_released_previews(&session_state),
            vec!["file:///icon.png".to_string()]
        );
    }
}
