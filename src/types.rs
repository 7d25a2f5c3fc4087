//! Value types shared by the controller and the camera backends.

use crate::errors::CameraError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which way a camera points relative to the device user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraPosition {
    Front,
    Rear,
}

impl CameraPosition {
    pub fn opposite(self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Rear,
            CameraPosition::Rear => CameraPosition::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraPosition::Front => "front",
            CameraPosition::Rear => "rear",
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashMode {
    #[default]
    Off,
    On,
}

impl FlashMode {
    pub fn toggled(self) -> Self {
        match self {
            FlashMode::Off => FlashMode::On,
            FlashMode::On => FlashMode::Off,
        }
    }
}

impl fmt::Display for FlashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashMode::Off => write!(f, "off"),
            FlashMode::On => write!(f, "on"),
        }
    }
}

impl FromStr for FlashMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(FlashMode::Off),
            "on" => Ok(FlashMode::On),
            other => Err(format!("unknown flash mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    Locked,
    AutoFocus,
    ContinuousAutoFocus,
}

/// Still-image encoding requested from the photo output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoCodec {
    #[default]
    Jpeg,
}

impl PhotoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoCodec::Jpeg => "jpeg",
        }
    }
}

/// What `switch_cameras` does when the new input cannot be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchFailurePolicy {
    /// Re-attach the input that was removed; the session keeps its previous camera.
    #[default]
    Rollback,
    /// Leave the session without an input and clear the camera position.
    FailOpen,
}

/// A physical camera as reported by device discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    /// `None` when the backend cannot tell which way the camera faces.
    pub position: Option<CameraPosition>,
    pub supports_continuous_autofocus: bool,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position: None,
            supports_continuous_autofocus: false,
        }
    }

    pub fn with_position(mut self, position: CameraPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_continuous_autofocus(mut self, supported: bool) -> Self {
        self.supports_continuous_autofocus = supported;
        self
    }
}

/// A live binding of a device into a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInput {
    pub id: Uuid,
    pub device: DeviceInfo,
}

impl DeviceInput {
    pub fn new(device: DeviceInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            device,
        }
    }

    pub fn position(&self) -> Option<CameraPosition> {
        self.device.position
    }
}

/// Settings submitted with a single photo request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSettings {
    pub request_id: Uuid,
    pub flash_mode: FlashMode,
    pub codec: PhotoCodec,
}

impl PhotoSettings {
    pub fn new(flash_mode: FlashMode, codec: PhotoCodec) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            flash_mode,
            codec,
        }
    }
}

/// Raw result reported by a photo output. Either field may be missing.
#[derive(Debug, Clone)]
pub struct PhotoResult {
    pub request_id: Uuid,
    pub data: Option<Bytes>,
    pub error: Option<CameraError>,
}

impl PhotoResult {
    pub fn success(request_id: Uuid, data: impl Into<Bytes>) -> Self {
        Self {
            request_id,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn failure(request_id: Uuid, error: CameraError) -> Self {
        Self {
            request_id,
            data: None,
            error: Some(error),
        }
    }

    pub fn empty(request_id: Uuid) -> Self {
        Self {
            request_id,
            data: None,
            error: None,
        }
    }
}

/// A decoded still image handed to the capture completion.
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    pub request_id: Uuid,
    pub position: CameraPosition,
    pub flash_mode: FlashMode,
    pub captured_at: DateTime<Utc>,
    /// The encoded buffer exactly as the photo output produced it.
    pub encoded: Bytes,
    pub image: image::DynamicImage,
}

impl CapturedPhoto {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewGravity {
    ResizeAspect,
    #[default]
    ResizeAspectFill,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreviewConfig {
    pub gravity: PreviewGravity,
    pub orientation: VideoOrientation,
}

/// One RGB24 frame pushed to a preview sink.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub position: Option<CameraPosition>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Uninitialized,
    Preparing,
    Ready,
    Switching,
    Capturing,
}

impl ControllerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerState::Uninitialized => "uninitialized",
            ControllerState::Preparing => "preparing",
            ControllerState::Ready => "ready",
            ControllerState::Switching => "switching",
            ControllerState::Capturing => "capturing",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
