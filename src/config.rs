//! Configuration management for the capture controller
//!
//! Provides loading, saving and validation of session, capture and
//! switching options. Files are TOML; environment variables prefixed with
//! `CAMERA_CONTROLLER__` override file values when loaded through
//! [`ControllerConfig::load_layered`].

use crate::errors::CameraError;
use crate::types::{FlashMode, PhotoCodec, SwitchFailurePolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "CAMERA_CONTROLLER";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub session: SessionConfig,
    pub capture: CaptureConfig,
    pub switching: SwitchingConfig,
}

/// Session assembly configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the worker thread that owns the session
    pub worker_thread_name: String,
    /// Encoding requested from the photo output
    pub photo_codec: PhotoCodec,
    /// JPEG quality (1-100) for backends that encode stills themselves
    pub jpeg_quality: u8,
}

/// Photo capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Time allowed for the hardware to report a photo; 0 disables the timeout
    pub timeout_ms: u64,
    /// Flash mode the controller starts with
    pub default_flash_mode: FlashMode,
}

/// Camera switching configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchingConfig {
    pub failure_policy: SwitchFailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            worker_thread_name: "camera-controller-session".to_string(),
            photo_codec: PhotoCodec::Jpeg,
            jpeg_quality: 90,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            default_flash_mode: FlashMode::Off,
        }
    }
}

impl CaptureConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl ControllerConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CameraError::InitializationError(format!("Failed to read config file: {}", e))
        })?;

        let config: ControllerConfig = toml::from_str(&contents).map_err(|e| {
            CameraError::InitializationError(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load defaults, then the TOML file at `path` if present, then
    /// `CAMERA_CONTROLLER__<SECTION>__<KEY>` environment variables.
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let to_error = |e: config::ConfigError| {
            CameraError::InitializationError(format!("Failed to load layered config: {}", e))
        };

        let defaults = config::Config::try_from(&Self::default()).map_err(to_error)?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(path.as_ref())
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(to_error)?;

        let config: ControllerConfig = settings.try_deserialize().map_err(to_error)?;
        config
            .validate()
            .map_err(CameraError::InitializationError)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::InitializationError(format!(
                    "Failed to create config directory: {}",
                    e
                ))
            })?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CameraError::InitializationError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            CameraError::InitializationError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("camera-controller.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.session.worker_thread_name.trim().is_empty() {
            return Err("Worker thread name must not be empty".to_string());
        }
        if self.session.jpeg_quality == 0 || self.session.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }
        if self.capture.timeout_ms > 600_000 {
            return Err("Capture timeout must not exceed 600000 ms".to_string());
        }
        Ok(())
    }
}
