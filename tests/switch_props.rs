//! Property-Based Tests for discovery and camera switching
//!
//! These tests verify the session topology invariants using proptest for
//! input generation and shrinking.
//!
//! Run with: cargo test --test switch_props

use camera_controller::{
    discover_devices, CameraController, CameraPosition, ControllerConfig, ControllerError,
    ControllerErrorKind, DeviceInfo, MainQueue, SimulatedBackend, SwitchFailurePolicy,
};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn facing() -> impl Strategy<Value = Option<CameraPosition>> {
    prop_oneof![
        Just(None),
        Just(Some(CameraPosition::Front)),
        Just(Some(CameraPosition::Rear)),
    ]
}

fn device_list() -> impl Strategy<Value = Vec<DeviceInfo>> {
    prop::collection::vec(facing(), 0..6).prop_map(|facings| {
        facings
            .into_iter()
            .enumerate()
            .map(|(i, position)| {
                let device = DeviceInfo::new(format!("cam-{i}"), format!("Camera {i}"));
                match position {
                    Some(position) => device.with_position(position),
                    None => device,
                }
            })
            .collect()
    })
}

fn prepared(
    backend: &SimulatedBackend,
    config: ControllerConfig,
) -> (CameraController, MainQueue, Result<(), ControllerError>) {
    let queue = MainQueue::new();
    let controller =
        CameraController::with_config(Arc::new(backend.clone()), Arc::new(queue.clone()), config)
            .unwrap();
    let outcome = Arc::new(Mutex::new(None));
    let sink = outcome.clone();
    controller.prepare(move |result| *sink.lock().unwrap() = Some(result));
    assert!(queue.run_until(|| outcome.lock().unwrap().is_some(), WAIT));
    let result = outcome.lock().unwrap().take().unwrap();
    (controller, queue, result)
}

fn first_with(devices: &[DeviceInfo], position: CameraPosition) -> Option<String> {
    devices
        .iter()
        .find(|d| d.position == Some(position))
        .map(|d| d.id.clone())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// INVARIANT: Discovery keeps the first device of each facing and ignores the rest
    #[test]
    fn discovery_keeps_first_device_per_facing(devices in device_list()) {
        let backend = SimulatedBackend::new(devices.clone());
        let front = first_with(&devices, CameraPosition::Front);
        let rear = first_with(&devices, CameraPosition::Rear);

        match discover_devices(&backend) {
            Ok(discovery) => {
                prop_assert_eq!(discovery.front.map(|d| d.id), front);
                prop_assert_eq!(discovery.rear.map(|d| d.id), rear);
            }
            Err(e) => {
                prop_assert_eq!(e.kind, ControllerErrorKind::NoCamerasAvailable);
                prop_assert!(front.is_none() && rear.is_none());
            }
        }
    }

    /// INVARIANT: A prepared session has exactly one input, facing rear when a rear camera exists
    #[test]
    fn prepare_attaches_exactly_one_input(devices in device_list()) {
        let backend = SimulatedBackend::new(devices.clone());
        let expected = first_with(&devices, CameraPosition::Rear)
            .map(|_| CameraPosition::Rear)
            .or_else(|| first_with(&devices, CameraPosition::Front).map(|_| CameraPosition::Front));

        let (controller, _queue, result) = prepared(&backend, ControllerConfig::default());
        match expected {
            Some(position) => {
                prop_assert!(result.is_ok());
                prop_assert_eq!(controller.current_camera_position(), Some(position));
                prop_assert_eq!(backend.attached_positions(), vec![position]);
                prop_assert_eq!(backend.photo_outputs().len(), 1);
            }
            None => {
                prop_assert_eq!(result.unwrap_err().kind, ControllerErrorKind::NoCamerasAvailable);
                prop_assert!(!controller.is_running());
                prop_assert!(backend.attached_inputs().is_empty());
            }
        }
    }

    /// INVARIANT: Any switch sequence leaves exactly one input, matching the reported position
    #[test]
    fn switching_keeps_single_matching_input(
        switches in 1usize..8,
        refuse_front_after in prop::option::of(0usize..8),
        policy in prop_oneof![Just(SwitchFailurePolicy::Rollback), Just(SwitchFailurePolicy::FailOpen)],
    ) {
        let backend = SimulatedBackend::front_and_rear();
        let mut config = ControllerConfig::default();
        config.switching.failure_policy = policy;
        let (controller, _queue, result) = prepared(&backend, config);
        prop_assert!(result.is_ok());

        for step in 0..switches {
            if refuse_front_after == Some(step) {
                backend.reject_inputs_for(CameraPosition::Front);
            }
            let before = controller.current_camera_position();
            match controller.switch_cameras() {
                Ok(()) => {
                    prop_assert_eq!(controller.current_camera_position(), before.map(CameraPosition::opposite));
                }
                Err(e) => {
                    prop_assert_eq!(e.kind, ControllerErrorKind::InvalidOperation);
                    if before.is_some() && policy == SwitchFailurePolicy::Rollback {
                        prop_assert_eq!(controller.current_camera_position(), before);
                    }
                }
            }

            prop_assert!(!backend.transaction_open());
            match controller.current_camera_position() {
                Some(position) => prop_assert_eq!(backend.attached_positions(), vec![position]),
                None => prop_assert!(backend.attached_inputs().is_empty()),
            }
        }
    }
}
