//! Desktop cameras through nokhwa (AVFoundation, Media Foundation, V4L2).
//!
//! Desktop platforms report no facing, so devices are classified by name:
//! anything that says back/rear/environment is treated as rear, everything
//! else faces the user.
//!
//! Each attached input owns a threaded nokhwa stream. The stream is opened
//! when the input is added to a running session, so a device that cannot
//! stream fails `add_input` and the controller can roll the switch back.
//! Every frame the stream produces is forwarded to the preview sink.

use crate::errors::CameraError;
use crate::hardware::{CameraBackend, PhotoDelivery, RenderTarget, SessionBackend};
use crate::types::{
    CameraPosition, DeviceInfo, DeviceInput, FlashMode, FocusMode, PhotoCodec, PhotoResult,
    PhotoSettings, PreviewConfig, PreviewFrame,
};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    Buffer, CallbackCamera,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type PreviewSink = Arc<Mutex<Option<Box<dyn RenderTarget>>>>;

pub struct NativeBackend {
    jpeg_quality: u8,
}

impl NativeBackend {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }
}

fn classify(name: &str, description: &str) -> CameraPosition {
    let label = format!("{name} {description}").to_ascii_lowercase();
    if ["back", "rear", "environment", "world"]
        .iter()
        .any(|hint| label.contains(hint))
    {
        CameraPosition::Rear
    } else {
        CameraPosition::Front
    }
}

fn parse_index(device_id: &str) -> Result<u32, CameraError> {
    device_id
        .parse::<u32>()
        .map_err(|_| CameraError::InitializationError(format!("Invalid device ID: {device_id}")))
}

fn to_rgb(buffer: &Buffer) -> Result<RgbImage, CameraError> {
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| CameraError::CaptureError(format!("Failed to decode frame: {}", e)))?;
    let (width, height) = (decoded.width(), decoded.height());
    RgbImage::from_raw(width, height, decoded.into_raw())
        .ok_or_else(|| CameraError::CaptureError("frame buffer size mismatch".to_string()))
}

/// Forward one stream frame to the preview sink, if one is attached.
fn render_preview(
    sink: &PreviewSink,
    sequence: &AtomicU64,
    position: Option<CameraPosition>,
    buffer: &Buffer,
) {
    let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(target) = sink.as_mut() else {
        return;
    };
    match to_rgb(buffer) {
        Ok(frame) => target.render(&PreviewFrame {
            sequence: sequence.fetch_add(1, Ordering::Relaxed) + 1,
            width: frame.width(),
            height: frame.height(),
            position,
            data: Bytes::from(frame.into_raw()),
        }),
        Err(e) => log::debug!("Dropping preview frame: {}", e),
    }
}

impl CameraBackend for NativeBackend {
    fn name(&self) -> &str {
        "nokhwa"
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        let cameras = query(ApiBackend::Auto).map_err(|e| {
            CameraError::InitializationError(format!("Failed to query cameras: {}", e))
        })?;

        Ok(cameras
            .into_iter()
            .map(|info| {
                let name = info.human_name();
                let position = classify(&name, info.description());
                DeviceInfo::new(info.index().to_string(), name).with_position(position)
            })
            .collect())
    }

    fn set_focus_mode(&self, device: &DeviceInfo, _mode: FocusMode) -> Result<(), CameraError> {
        Err(CameraError::UnsupportedOperation(format!(
            "focus modes are not exposed for {}",
            device.id
        )))
    }

    fn create_input(&self, device: &DeviceInfo) -> Result<DeviceInput, CameraError> {
        parse_index(&device.id)?;
        Ok(DeviceInput::new(device.clone()))
    }

    fn create_session(&self) -> Result<Box<dyn SessionBackend>, CameraError> {
        Ok(Box::new(NativeSession {
            jpeg_quality: self.jpeg_quality,
            inputs: Vec::new(),
            output: None,
            running: false,
            camera: None,
            preview: Arc::new(Mutex::new(None)),
            preview_sequence: Arc::new(AtomicU64::new(0)),
        }))
    }
}

struct NativeSession {
    jpeg_quality: u8,
    inputs: Vec<DeviceInput>,
    output: Option<PhotoCodec>,
    running: bool,
    camera: Option<CallbackCamera>,
    preview: PreviewSink,
    preview_sequence: Arc<AtomicU64>,
}

impl NativeSession {
    fn close_camera(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {}", e);
            }
        }
    }

    fn open_camera(&mut self, input: &DeviceInput) -> Result<(), CameraError> {
        self.close_camera();

        let index = parse_index(&input.device.id)?;
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
        let sink = self.preview.clone();
        let sequence = self.preview_sequence.clone();
        let position = input.position();

        let mut camera = CallbackCamera::new(CameraIndex::Index(index), requested, move |buffer| {
            render_preview(&sink, &sequence, position, &buffer)
        })
        .map_err(|e| {
            CameraError::InitializationError(format!("Failed to initialize camera: {}", e))
        })?;
        camera.open_stream().map_err(|e| {
            CameraError::InitializationError(format!("Failed to start stream: {}", e))
        })?;
        log::debug!("Opened stream for {}", input.device.name);
        self.camera = Some(camera);
        Ok(())
    }

    fn grab_still(&mut self) -> Result<RgbImage, CameraError> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| CameraError::CaptureError("camera stream is not open".to_string()))?;
        let frame = camera
            .poll_frame()
            .map_err(|e| CameraError::CaptureError(format!("Failed to capture frame: {}", e)))?;
        to_rgb(&frame)
    }

    fn encode(&self, still: &RgbImage) -> Result<Bytes, CameraError> {
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, self.jpeg_quality)
            .encode_image(still)
            .map_err(|e| CameraError::CaptureError(format!("JPEG encoding failed: {}", e)))?;
        Ok(Bytes::from(encoded))
    }
}

impl SessionBackend for NativeSession {
    // Streams open and close with their inputs; there is nothing to batch.
    fn begin_configuration(&mut self) {}

    fn commit_configuration(&mut self) {}

    fn can_add_input(&self, input: &DeviceInput) -> bool {
        // A stream is opened per session; one input at a time.
        self.inputs.is_empty() && parse_index(&input.device.id).is_ok()
    }

    fn add_input(&mut self, input: &DeviceInput) -> Result<(), CameraError> {
        if !self.can_add_input(input) {
            return Err(CameraError::SessionError(format!(
                "cannot add input for {}",
                input.device.name
            )));
        }
        if self.running {
            self.open_camera(input)?;
        }
        self.inputs.push(input.clone());
        Ok(())
    }

    fn remove_input(&mut self, input: &DeviceInput) {
        self.inputs.retain(|i| i.id != input.id);
        if self.inputs.is_empty() {
            self.close_camera();
        }
    }

    fn inputs(&self) -> Vec<DeviceInput> {
        self.inputs.clone()
    }

    fn can_add_photo_output(&self, codec: PhotoCodec) -> bool {
        self.output.is_none() && codec == PhotoCodec::Jpeg
    }

    fn add_photo_output(&mut self, codec: PhotoCodec) -> Result<(), CameraError> {
        if !self.can_add_photo_output(codec) {
            return Err(CameraError::SessionError("cannot add photo output".to_string()));
        }
        self.output = Some(codec);
        Ok(())
    }

    fn start_running(&mut self) -> Result<(), CameraError> {
        if let Some(input) = self.inputs.first().cloned() {
            self.open_camera(&input)?;
        }
        self.running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        self.running = false;
        self.close_camera();
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn attach_preview(
        &mut self,
        target: Box<dyn RenderTarget>,
        _config: PreviewConfig,
    ) -> Result<(), CameraError> {
        *self.preview.lock().unwrap_or_else(PoisonError::into_inner) = Some(target);
        Ok(())
    }

    fn capture_photo(
        &mut self,
        settings: PhotoSettings,
        delivery: PhotoDelivery,
    ) -> Result<(), CameraError> {
        if self.output.is_none() {
            return Err(CameraError::CaptureError("no photo output attached".to_string()));
        }
        if settings.flash_mode == FlashMode::On {
            log::debug!("Flash is not available on this backend, ignoring");
        }

        let request_id = settings.request_id;
        let result = match self.grab_still().and_then(|still| self.encode(&still)) {
            Ok(data) => PhotoResult::success(request_id, data),
            Err(e) => PhotoResult::failure(request_id, e),
        };
        delivery.deliver(result);
        Ok(())
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        self.close_camera();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nokhwa::utils::{FrameFormat, Resolution};

    #[test]
    fn test_classify_by_name() {
        assert_eq!(classify("Back Camera", ""), CameraPosition::Rear);
        assert_eq!(classify("USB Camera", "rear facing"), CameraPosition::Rear);
        assert_eq!(classify("FaceTime HD Camera", ""), CameraPosition::Front);
        assert_eq!(classify("Integrated Webcam", "uvcvideo"), CameraPosition::Front);
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("2").unwrap(), 2);
        assert!(parse_index("video0").is_err());
    }

    #[test]
    fn test_unopenable_input_fails_add_on_running_session() {
        let backend = NativeBackend::new(90);
        let mut session = backend.create_session().unwrap();
        session.start_running().unwrap();

        let missing = DeviceInput::new(
            DeviceInfo::new("4096", "Missing Camera").with_position(CameraPosition::Front),
        );
        session.begin_configuration();
        assert!(session.can_add_input(&missing));
        assert!(session.add_input(&missing).is_err());
        session.commit_configuration();
        assert!(session.inputs().is_empty());
    }

    #[test]
    fn test_stream_frames_reach_preview_sink() {
        let sink: PreviewSink = Arc::new(Mutex::new(None));
        let sequence = AtomicU64::new(0);
        let (width, height) = (4u32, 2u32);
        let pixels = vec![128u8; (width * height * 3) as usize];
        let buffer = Buffer::new(Resolution::new(width, height), &pixels, FrameFormat::RAWRGB);

        // Nothing attached yet.
        render_preview(&sink, &sequence, Some(CameraPosition::Rear), &buffer);
        assert_eq!(sequence.load(Ordering::Relaxed), 0);

        let frames = Arc::new(Mutex::new(Vec::new()));
        let seen = frames.clone();
        let target: Box<dyn RenderTarget> = Box::new(move |frame: &PreviewFrame| {
            seen.lock().unwrap().push(frame.clone())
        });
        *sink.lock().unwrap() = Some(target);
        render_preview(&sink, &sequence, Some(CameraPosition::Rear), &buffer);
        render_preview(&sink, &sequence, Some(CameraPosition::Rear), &buffer);

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!((frames[0].width, frames[0].height), (width, height));
        assert_eq!(frames[0].position, Some(CameraPosition::Rear));
        assert_eq!(frames[1].sequence, 2);
    }
}
