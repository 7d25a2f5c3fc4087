//! Runtime control: camera switching and photo result handling.

use crate::controller::assembly::AssembledSession;
use crate::controller::pending::PendingCapture;
use crate::errors::ControllerError;
use crate::hardware::CameraBackend;
use crate::types::{CameraPosition, CapturedPhoto, DeviceInput, PhotoResult, SwitchFailurePolicy};
use chrono::Utc;

/// Swap the active input for the camera facing the other way.
///
/// On success exactly one input is attached and it faces the returned
/// position. On failure the session is left as `policy` prescribes.
pub(crate) fn switch_cameras(
    assembled: &mut AssembledSession,
    backend: &dyn CameraBackend,
    policy: SwitchFailurePolicy,
) -> Result<CameraPosition, ControllerError> {
    if !assembled.session.is_running() {
        return Err(ControllerError::session_missing());
    }

    let current = assembled
        .position
        .ok_or_else(|| ControllerError::invalid_operation("session has no active camera input"))?;
    let active = assembled
        .active
        .clone()
        .filter(|input| input.position() == Some(current))
        .ok_or_else(|| ControllerError::invalid_operation(format!("no {current} input is active")))?;
    if !assembled.session.inputs().contains(&active) {
        return Err(ControllerError::invalid_operation(format!(
            "{current} input is not attached to the session"
        )));
    }

    let target = current.opposite();
    let replacement = assembled
        .input_for(backend, target)
        .map_err(|e| ControllerError::invalid_operation(e.message))?;

    assembled.session.begin_configuration();
    assembled.session.remove_input(&active);

    let added = if assembled.session.can_add_input(&replacement) {
        assembled
            .session
            .add_input(&replacement)
            .map_err(|e| e.to_string())
    } else {
        Err(format!("session rejected the {target} camera input"))
    };

    let outcome = match added {
        Ok(()) => {
            assembled.active = Some(replacement);
            assembled.position = Some(target);
            Ok(target)
        }
        Err(reason) => {
            let error =
                ControllerError::invalid_operation(format!("cannot switch to {target} camera: {reason}"));
            match policy {
                SwitchFailurePolicy::Rollback => rollback(assembled, active, current),
                SwitchFailurePolicy::FailOpen => {
                    log::warn!("Switch failed, session left without an input");
                    assembled.active = None;
                    assembled.position = None;
                }
            }
            Err(error)
        }
    };

    assembled.session.commit_configuration();
    outcome
}

fn rollback(
    assembled: &mut AssembledSession,
    previous: DeviceInput,
    position: CameraPosition,
) {
    let restored = assembled.session.can_add_input(&previous)
        && assembled.session.add_input(&previous).is_ok();
    if restored {
        log::debug!("Switch rolled back to {} camera", position);
        assembled.active = Some(previous);
        assembled.position = Some(position);
    } else {
        log::error!("Rollback failed, {} input could not be re-attached", position);
        assembled.active = None;
        assembled.position = None;
    }
}

/// Turn a raw photo-output report into the completion's result.
pub(crate) fn photo_outcome(
    result: PhotoResult,
    pending: &PendingCapture,
) -> Result<CapturedPhoto, ControllerError> {
    if let Some(error) = result.error {
        return Err(ControllerError::backend(error));
    }
    let encoded = result.data.filter(|data| !data.is_empty()).ok_or_else(|| {
        ControllerError::unknown("photo output delivered neither image data nor an error")
    })?;
    let image = image::load_from_memory(&encoded)
        .map_err(|e| ControllerError::unknown(format!("photo data could not be decoded: {e}")))?;

    Ok(CapturedPhoto {
        request_id: pending.request_id(),
        position: pending.position,
        flash_mode: pending.settings.flash_mode,
        captured_at: Utc::now(),
        encoded,
        image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::controller::assembly::assemble;
    use crate::errors::{CameraError, ControllerErrorKind};
    use crate::platform::SimulatedBackend;
    use crate::testing::synthetic_jpeg;
    use crate::types::{FlashMode, PhotoCodec, PhotoSettings};

    fn assembled(backend: &SimulatedBackend) -> AssembledSession {
        assemble(backend, &ControllerConfig::default()).ok().unwrap()
    }

    fn pending() -> PendingCapture {
        PendingCapture::new(
            PhotoSettings::new(FlashMode::On, PhotoCodec::Jpeg),
            CameraPosition::Rear,
            Box::new(|_| {}),
        )
    }

    #[test]
    fn test_switch_round_trip() {
        let backend = SimulatedBackend::front_and_rear();
        let mut session = assembled(&backend);
        let original = session.active.clone();

        let to = switch_cameras(&mut session, &backend, SwitchFailurePolicy::Rollback).unwrap();
        assert_eq!(to, CameraPosition::Front);
        assert_eq!(backend.attached_inputs().len(), 1);

        let back = switch_cameras(&mut session, &backend, SwitchFailurePolicy::Rollback).unwrap();
        assert_eq!(back, CameraPosition::Rear);
        assert_eq!(session.active, original);
        assert_eq!(backend.attached_inputs(), original.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_switch_without_target_device() {
        let backend = SimulatedBackend::rear_only();
        let mut session = assembled(&backend);
        let err = switch_cameras(&mut session, &backend, SwitchFailurePolicy::Rollback).unwrap_err();
        assert_eq!(err.kind, ControllerErrorKind::InvalidOperation);
        assert_eq!(session.position, Some(CameraPosition::Rear));
        assert_eq!(backend.attached_inputs().len(), 1);
        // Precondition failures never open a transaction.
        assert_eq!(backend.committed_transactions(), 0);
    }

    #[test]
    fn test_switch_rollback_restores_previous_input() {
        let backend = SimulatedBackend::front_and_rear();
        let mut session = assembled(&backend);
        let before = backend.attached_inputs();
        backend.reject_inputs_for(CameraPosition::Front);

        let err = switch_cameras(&mut session, &backend, SwitchFailurePolicy::Rollback).unwrap_err();
        assert_eq!(err.kind, ControllerErrorKind::InvalidOperation);
        assert_eq!(session.position, Some(CameraPosition::Rear));
        assert_eq!(backend.attached_inputs(), before);
        assert_eq!(backend.committed_transactions(), 1);
        assert!(!backend.transaction_open());
    }

    #[test]
    fn test_switch_fail_open_leaves_no_input() {
        let backend = SimulatedBackend::front_and_rear();
        let mut session = assembled(&backend);
        backend.reject_inputs_for(CameraPosition::Front);

        let err = switch_cameras(&mut session, &backend, SwitchFailurePolicy::FailOpen).unwrap_err();
        assert_eq!(err.kind, ControllerErrorKind::InvalidOperation);
        assert_eq!(session.position, None);
        assert!(backend.attached_inputs().is_empty());
        assert!(backend.is_running());

        let again = switch_cameras(&mut session, &backend, SwitchFailurePolicy::FailOpen).unwrap_err();
        assert_eq!(again.kind, ControllerErrorKind::InvalidOperation);
    }

    #[test]
    fn test_outcome_success() {
        let capture = pending();
        let data = synthetic_jpeg(32, 24, 1, 90);
        let photo = photo_outcome(PhotoResult::success(capture.request_id(), data.clone()), &capture)
            .unwrap();
        assert_eq!(photo.width(), 32);
        assert_eq!(photo.height(), 24);
        assert_eq!(photo.encoded, data);
        assert_eq!(photo.flash_mode, FlashMode::On);
    }

    #[test]
    fn test_outcome_error_wins_over_data() {
        let capture = pending();
        let mut result = PhotoResult::success(capture.request_id(), synthetic_jpeg(8, 8, 0, 90));
        result.error = Some(CameraError::CaptureError("sensor fault".to_string()));
        let err = photo_outcome(result, &capture).unwrap_err();
        assert_eq!(err.kind, ControllerErrorKind::Backend);
        assert!(err.message.contains("sensor fault"));
    }

    #[test]
    fn test_outcome_neither_is_unknown() {
        let capture = pending();
        let err = photo_outcome(PhotoResult::empty(capture.request_id()), &capture).unwrap_err();
        assert_eq!(err.kind, ControllerErrorKind::Unknown);
    }

    #[test]
    fn test_outcome_undecodable_is_unknown() {
        let capture = pending();
        let result = PhotoResult::success(capture.request_id(), vec![0u8, 1, 2, 3]);
        let err = photo_outcome(result, &capture).unwrap_err();
        assert_eq!(err.kind, ControllerErrorKind::Unknown);
    }
}
