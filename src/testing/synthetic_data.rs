//! Synthetic image data
//!
//! Gradients that change with a seed, so consecutive captures differ and
//! decoders see realistic, non-uniform content.

use crate::types::{CameraPosition, PreviewFrame};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

/// RGB24 gradient varying by position and `seed`.
pub fn synthetic_rgb(width: u32, height: u32, seed: u64) -> RgbImage {
    let base = (seed % 256) as u8;
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            base.wrapping_add((x % 256) as u8),
            base.wrapping_add((y % 256) as u8),
            base.wrapping_add(((x + y) % 256) as u8),
        ])
    })
}

/// A baseline JPEG of the synthetic gradient.
///
/// Returns an empty buffer only if the encoder fails, which for in-memory
/// RGB data does not happen in practice.
pub fn synthetic_jpeg(width: u32, height: u32, seed: u64, quality: u8) -> Bytes {
    let image = synthetic_rgb(width, height, seed);
    let mut encoded = Vec::new();
    if let Err(e) = JpegEncoder::new_with_quality(&mut encoded, quality).encode_image(&image) {
        log::error!("Synthetic JPEG encoding failed: {}", e);
        return Bytes::new();
    }
    Bytes::from(encoded)
}

pub fn synthetic_preview_frame(
    sequence: u64,
    width: u32,
    height: u32,
    position: Option<CameraPosition>,
) -> PreviewFrame {
    PreviewFrame {
        sequence,
        width,
        height,
        position,
        data: Bytes::from(synthetic_rgb(width, height, sequence).into_raw()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_rgb_size() {
        let image = synthetic_rgb(64, 48, 0);
        assert_eq!(image.dimensions(), (64, 48));
        assert_eq!(image.into_raw().len(), 64 * 48 * 3);
    }

    #[test]
    fn test_synthetic_frames_differ() {
        let a = synthetic_rgb(16, 16, 1);
        let b = synthetic_rgb(16, 16, 2);
        assert_ne!(a.into_raw(), b.into_raw());
    }

    #[test]
    fn test_synthetic_jpeg_decodes() {
        let data = synthetic_jpeg(40, 30, 7, 85);
        assert!(data.starts_with(&[0xFF, 0xD8]));
        let decoded = image::load_from_memory(&data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn test_preview_frame_layout() {
        let frame = synthetic_preview_frame(3, 8, 4, Some(CameraPosition::Front));
        assert_eq!(frame.data.len(), 8 * 4 * 3);
        assert_eq!(frame.position, Some(CameraPosition::Front));
        assert_eq!(frame.sequence, 3);
    }
}
