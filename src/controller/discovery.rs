//! Device discovery: enumerate cameras and classify them by facing.
//!
//! Discovery never touches a session. Its only side effect is the focus
//! configuration of the rear camera.

use crate::errors::ControllerError;
use crate::hardware::CameraBackend;
use crate::types::{CameraPosition, DeviceInfo, FocusMode};

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub front: Option<DeviceInfo>,
    pub rear: Option<DeviceInfo>,
    /// Recoverable problems met while configuring the devices.
    pub warnings: Vec<ControllerError>,
}

impl Discovery {
    pub fn device(&self, position: CameraPosition) -> Option<&DeviceInfo> {
        match position {
            CameraPosition::Front => self.front.as_ref(),
            CameraPosition::Rear => self.rear.as_ref(),
        }
    }
}

pub fn discover_devices(backend: &dyn CameraBackend) -> Result<Discovery, ControllerError> {
    let devices = backend.list_devices().map_err(ControllerError::backend)?;
    log::debug!("{} reported {} camera(s)", backend.name(), devices.len());

    let mut discovery = Discovery::default();
    for device in devices {
        let slot = match device.position {
            Some(CameraPosition::Front) => &mut discovery.front,
            Some(CameraPosition::Rear) => &mut discovery.rear,
            None => {
                log::debug!("Ignoring camera {} with unknown facing", device.id);
                continue;
            }
        };
        if slot.is_some() {
            log::debug!("Ignoring additional {:?} camera {}", device.position, device.id);
            continue;
        }
        *slot = Some(device);
    }

    if discovery.front.is_none() && discovery.rear.is_none() {
        return Err(ControllerError::no_cameras());
    }

    if let Some(rear) = &discovery.rear {
        if let Err(warning) = configure_rear_focus(backend, rear) {
            log::warn!("{}", warning);
            discovery.warnings.push(warning);
        }
    }

    log::info!(
        "Discovered cameras: front={:?} rear={:?}",
        discovery.front.as_ref().map(|d| d.id.as_str()),
        discovery.rear.as_ref().map(|d| d.id.as_str())
    );
    Ok(discovery)
}

fn configure_rear_focus(
    backend: &dyn CameraBackend,
    rear: &DeviceInfo,
) -> Result<(), ControllerError> {
    if !rear.supports_continuous_autofocus {
        return Err(ControllerError::focus_configuration(
            &rear.id,
            "continuous autofocus not supported",
        ));
    }
    backend
        .set_focus_mode(rear, FocusMode::ContinuousAutoFocus)
        .map_err(|e| ControllerError::focus_configuration(&rear.id, e))
}
