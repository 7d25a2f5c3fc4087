//! camera-controller: a capture session controller for devices with a front
//! and a rear camera.
//!
//! The controller discovers the available cameras (preferring the rear one),
//! assembles a session with exactly one camera input and one JPEG photo
//! output, switches between cameras atomically and takes single photos whose
//! completion runs exactly once on the caller's context.
//!
//! # Features
//! - Front/rear discovery with continuous autofocus on the rear camera
//! - Atomic camera switching with rollback on failure
//! - Single-flight photo capture with timeout and stray-result detection
//! - Completions redelivered on a caller-supplied context
//! - Simulated backend for offline use, nokhwa backend behind `native`
//!
//! # Usage
//! ```toml
//! [dependencies]
//! camera-controller = { version = "0.1", features = ["native"] }
//! ```
//!
//! ```rust,no_run
//! use camera_controller::{CameraController, InlineContext, SimulatedBackend};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), camera_controller::ControllerError> {
//! let controller = CameraController::new(
//!     Arc::new(SimulatedBackend::front_and_rear()),
//!     Arc::new(InlineContext),
//! )?;
//! controller.prepare_async().await?;
//! let photo = controller.capture_image_async().await?;
//! println!("{}x{} from the {} camera", photo.width(), photo.height(), photo.position);
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod controller;
pub mod errors;
pub mod hardware;
pub mod platform;
pub mod types;

// Testing utilities - synthetic data for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::ControllerConfig;
pub use controller::{
    discover_devices, CallerContext, CameraController, CaptureCompletion, Discovery,
    InlineContext, MainQueue,
};
pub use errors::{CameraError, ControllerError, ControllerErrorKind};
pub use hardware::{CameraBackend, PhotoDelivery, RenderTarget, SessionBackend};
pub use platform::{default_backend, CaptureBehavior, SimulatedBackend};
pub use types::{
    CameraPosition, CapturedPhoto, ControllerState, DeviceInfo, DeviceInput, FlashMode,
    FocusMode, PhotoCodec, PhotoResult, PhotoSettings, PreviewConfig, PreviewFrame,
    PreviewGravity, SwitchFailurePolicy, VideoOrientation,
};

/// Initialize logging for the controller
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "camera_controller=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        native: cfg!(feature = "native"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Whether the hardware backend was compiled in.
    pub native: bool,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "camera-controller");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
        assert_eq!(info.native, cfg!(feature = "native"));
    }

    #[test]
    fn test_crate_info_serializes() {
        let json = serde_json::to_string(&get_info()).unwrap();
        assert!(json.contains("\"name\":\"camera-controller\""));
    }
}
