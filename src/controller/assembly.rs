//! Session assembly: session, discovery, one input, one photo output, start.

use crate::config::ControllerConfig;
use crate::controller::discovery::{discover_devices, Discovery};
use crate::errors::ControllerError;
use crate::hardware::{CameraBackend, SessionBackend};
use crate::types::{CameraPosition, DeviceInput};

/// A running session together with what the controller knows about it.
/// Lives on the worker thread only.
pub(crate) struct AssembledSession {
    pub session: Box<dyn SessionBackend>,
    pub discovery: Discovery,
    pub active: Option<DeviceInput>,
    pub position: Option<CameraPosition>,
    front_input: Option<DeviceInput>,
    rear_input: Option<DeviceInput>,
}

impl AssembledSession {
    /// The cached input for `position`, built on first use.
    pub fn input_for(
        &mut self,
        backend: &dyn CameraBackend,
        position: CameraPosition,
    ) -> Result<DeviceInput, ControllerError> {
        let cached = match position {
            CameraPosition::Front => &mut self.front_input,
            CameraPosition::Rear => &mut self.rear_input,
        };
        if let Some(input) = cached {
            return Ok(input.clone());
        }

        let device = self.discovery.device(position).ok_or_else(|| {
            ControllerError::invalid_operation(format!("no {position} camera available"))
        })?;
        let input = backend.create_input(device).map_err(|e| {
            ControllerError::inputs_invalid(format!("cannot create {position} input: {e}"))
        })?;
        *cached = Some(input.clone());
        Ok(input)
    }

    pub fn stop(&mut self) {
        if self.session.is_running() {
            self.session.stop_running();
        }
        self.active = None;
        self.position = None;
    }
}

pub(crate) fn assemble(
    backend: &dyn CameraBackend,
    config: &ControllerConfig,
) -> Result<AssembledSession, ControllerError> {
    let session = backend.create_session().map_err(ControllerError::backend)?;
    log::debug!("Created capture session on {}", backend.name());

    let discovery = discover_devices(backend)?;

    let mut assembled = AssembledSession {
        session,
        discovery,
        active: None,
        position: None,
        front_input: None,
        rear_input: None,
    };

    // Any early return drops `assembled`; stop first so the device is released.
    if let Err(e) = configure(&mut assembled, backend, config) {
        assembled.stop();
        return Err(e);
    }
    Ok(assembled)
}

fn configure(
    assembled: &mut AssembledSession,
    backend: &dyn CameraBackend,
    config: &ControllerConfig,
) -> Result<(), ControllerError> {
    // Rear wins over front.
    let position = if assembled.discovery.rear.is_some() {
        CameraPosition::Rear
    } else if assembled.discovery.front.is_some() {
        CameraPosition::Front
    } else {
        return Err(ControllerError::no_cameras());
    };

    let input = assembled.input_for(backend, position)?;
    if !assembled.session.can_add_input(&input) {
        return Err(ControllerError::inputs_invalid(format!(
            "session rejected the {position} camera input"
        )));
    }
    assembled
        .session
        .add_input(&input)
        .map_err(|e| ControllerError::inputs_invalid(format!("{position} input: {e}")))?;
    assembled.active = Some(input);
    assembled.position = Some(position);
    log::debug!("Attached {} camera input", position);

    let codec = config.session.photo_codec;
    if !assembled.session.can_add_photo_output(codec) {
        return Err(ControllerError::output_unavailable(format!(
            "session rejected a {} photo output",
            codec.as_str()
        )));
    }
    assembled
        .session
        .add_photo_output(codec)
        .map_err(|e| ControllerError::output_unavailable(e.to_string()))?;

    assembled
        .session
        .start_running()
        .map_err(ControllerError::backend)?;
    log::info!("Capture session running with {} camera", position);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{CameraError, ControllerErrorKind};
    use crate::platform::SimulatedBackend;

    #[test]
    fn test_prefers_rear() {
        let backend = SimulatedBackend::front_and_rear();
        let assembled = assemble(&backend, &ControllerConfig::default()).unwrap();
        assert_eq!(assembled.position, Some(CameraPosition::Rear));
        assert!(assembled.session.is_running());
        assert_eq!(assembled.session.inputs().len(), 1);
    }

    #[test]
    fn test_falls_back_to_front() {
        let backend = SimulatedBackend::front_only();
        let assembled = assemble(&backend, &ControllerConfig::default()).unwrap();
        assert_eq!(assembled.position, Some(CameraPosition::Front));
        assert_eq!(
            assembled.active.as_ref().and_then(DeviceInput::position),
            Some(CameraPosition::Front)
        );
    }

    #[test]
    fn test_rejected_input() {
        let backend = SimulatedBackend::rear_only();
        backend.reject_inputs_for(CameraPosition::Rear);
        let err = assemble(&backend, &ControllerConfig::default()).err().unwrap();
        assert_eq!(err.kind, ControllerErrorKind::InputsAreInvalid);
        assert!(!backend.is_running());
    }

    #[test]
    fn test_rejected_output() {
        let backend = SimulatedBackend::front_and_rear();
        backend.reject_photo_output(true);
        let err = assemble(&backend, &ControllerConfig::default()).err().unwrap();
        assert_eq!(err.kind, ControllerErrorKind::OutputUnavailable);
        assert!(!backend.is_running());
    }

    #[test]
    fn test_start_failure() {
        let backend = SimulatedBackend::front_and_rear();
        backend.fail_start(Some(CameraError::SessionError("media services reset".to_string())));
        let err = assemble(&backend, &ControllerConfig::default()).err().unwrap();
        assert_eq!(err.kind, ControllerErrorKind::Backend);
        assert!(backend.attached_inputs().is_empty());
    }
}
