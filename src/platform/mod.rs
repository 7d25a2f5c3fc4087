//! Camera backends.

pub mod simulated;

#[cfg(feature = "native")]
pub mod native;

pub use simulated::{CaptureBehavior, SimulatedBackend};

#[cfg(feature = "native")]
pub use native::NativeBackend;

use crate::config::ControllerConfig;
use crate::hardware::CameraBackend;
use std::sync::Arc;

/// The hardware backend when built with `native`, otherwise a simulated
/// phone with front and rear cameras.
pub fn default_backend(config: &ControllerConfig) -> Arc<dyn CameraBackend> {
    #[cfg(feature = "native")]
    {
        Arc::new(NativeBackend::new(config.session.jpeg_quality))
    }

    #[cfg(not(feature = "native"))]
    {
        let _ = config;
        log::info!("Built without the native feature, using the simulated backend");
        Arc::new(SimulatedBackend::front_and_rear())
    }
}
