use std::fmt;

/// Errors raised by a camera backend (device enumeration, session topology, photo output).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("Camera initialization error: {0}")]
    InitializationError(String),
    #[error("Device configuration error: {0}")]
    ConfigurationError(String),
    #[error("Session error: {0}")]
    SessionError(String),
    #[error("Capture error: {0}")]
    CaptureError(String),
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ControllerErrorKind {
    /// The operation needs a running session and there is none.
    CaptureSessionIsMissing,
    /// A device input could not be constructed or attached.
    InputsAreInvalid,
    /// Switch preconditions violated or the switch itself failed.
    InvalidOperation,
    NoCamerasAvailable,
    /// `prepare` called while the session is already assembled.
    CaptureSessionAlreadyRunning,
    /// `prepare` called while a previous `prepare` is still running.
    AlreadyPreparing,
    /// A second capture was requested while one is pending.
    CaptureInProgress,
    /// The photo output could not be attached.
    OutputUnavailable,
    /// Focus configuration of the rear camera failed (recoverable).
    FocusConfiguration,
    Timeout,
    Backend,
    /// The hardware delivered neither a usable image nor an error.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerError {
    pub kind: ControllerErrorKind,
    pub message: String,
}

impl ControllerError {
    pub fn new(kind: ControllerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn session_missing() -> Self {
        Self::new(
            ControllerErrorKind::CaptureSessionIsMissing,
            "capture session is missing or not running",
        )
    }

    pub fn inputs_invalid(message: impl Into<String>) -> Self {
        Self::new(ControllerErrorKind::InputsAreInvalid, message)
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(ControllerErrorKind::InvalidOperation, message)
    }

    pub fn no_cameras() -> Self {
        Self::new(ControllerErrorKind::NoCamerasAvailable, "no cameras available")
    }

    pub fn already_running() -> Self {
        Self::new(
            ControllerErrorKind::CaptureSessionAlreadyRunning,
            "capture session is already running",
        )
    }

    pub fn already_preparing() -> Self {
        Self::new(
            ControllerErrorKind::AlreadyPreparing,
            "capture session is already being prepared",
        )
    }

    pub fn capture_in_progress() -> Self {
        Self::new(
            ControllerErrorKind::CaptureInProgress,
            "a photo capture is already pending",
        )
    }

    pub fn output_unavailable(message: impl Into<String>) -> Self {
        Self::new(ControllerErrorKind::OutputUnavailable, message)
    }

    pub fn focus_configuration(device_id: &str, message: impl fmt::Display) -> Self {
        Self::new(
            ControllerErrorKind::FocusConfiguration,
            format!("focus configuration failed for {device_id}: {message}"),
        )
    }

    pub fn timeout() -> Self {
        Self::new(ControllerErrorKind::Timeout, "photo capture timed out")
    }

    pub fn backend(error: CameraError) -> Self {
        Self::new(ControllerErrorKind::Backend, error.to_string())
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ControllerErrorKind::Unknown, message)
    }
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ControllerError {}

impl From<CameraError> for ControllerError {
    fn from(error: CameraError) -> Self {
        Self::backend(error)
    }
}
