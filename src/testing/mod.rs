//! Testing utilities
//!
//! Synthetic stills and preview frames for exercising the controller
//! without camera hardware.

pub mod synthetic_data;

pub use synthetic_data::{synthetic_jpeg, synthetic_preview_frame, synthetic_rgb};
