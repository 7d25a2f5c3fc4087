//! Capabilities the controller consumes from the camera hardware.
//!
//! A [`CameraBackend`] enumerates devices and builds sessions; a
//! [`SessionBackend`] is the live pipeline. Sessions are created and used on
//! the controller's worker thread only, so they do not need to be `Send`.

use crate::errors::CameraError;
use crate::types::{
    DeviceInfo, DeviceInput, FocusMode, PhotoCodec, PhotoResult, PhotoSettings, PreviewConfig,
    PreviewFrame,
};
use std::fmt;
use std::sync::Arc;

pub trait CameraBackend: Send + Sync + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError>;

    /// Lock the device, apply `mode`, unlock.
    fn set_focus_mode(&self, device: &DeviceInfo, mode: FocusMode) -> Result<(), CameraError>;

    /// Build an input binding for `device`. Does not attach it anywhere.
    fn create_input(&self, device: &DeviceInfo) -> Result<DeviceInput, CameraError>;

    /// Create an empty, stopped session.
    fn create_session(&self) -> Result<Box<dyn SessionBackend>, CameraError>;
}

pub trait SessionBackend {
    fn begin_configuration(&mut self);
    fn commit_configuration(&mut self);

    fn can_add_input(&self, input: &DeviceInput) -> bool;
    fn add_input(&mut self, input: &DeviceInput) -> Result<(), CameraError>;
    fn remove_input(&mut self, input: &DeviceInput);
    fn inputs(&self) -> Vec<DeviceInput>;

    fn can_add_photo_output(&self, codec: PhotoCodec) -> bool;
    fn add_photo_output(&mut self, codec: PhotoCodec) -> Result<(), CameraError>;

    fn start_running(&mut self) -> Result<(), CameraError>;
    fn stop_running(&mut self);
    fn is_running(&self) -> bool;

    /// Attach a live-video sink, replacing any previous one.
    fn attach_preview(
        &mut self,
        target: Box<dyn RenderTarget>,
        config: PreviewConfig,
    ) -> Result<(), CameraError>;

    /// Submit one photo request. The result must be reported through
    /// `delivery`, exactly once, from any thread.
    fn capture_photo(
        &mut self,
        settings: PhotoSettings,
        delivery: PhotoDelivery,
    ) -> Result<(), CameraError>;
}

/// Sink for live preview frames. Rendering itself happens outside this crate.
pub trait RenderTarget: Send + 'static {
    fn render(&mut self, frame: &PreviewFrame);
}

impl<F> RenderTarget for F
where
    F: FnMut(&PreviewFrame) + Send + 'static,
{
    fn render(&mut self, frame: &PreviewFrame) {
        self(frame)
    }
}

/// Handle a photo output uses to report results back to the controller.
#[derive(Clone)]
pub struct PhotoDelivery {
    deliver: Arc<dyn Fn(PhotoResult) + Send + Sync>,
}

impl PhotoDelivery {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(PhotoResult) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn deliver(&self, result: PhotoResult) {
        (self.deliver)(result)
    }
}

impl fmt::Debug for PhotoDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoDelivery").finish_non_exhaustive()
    }
}
