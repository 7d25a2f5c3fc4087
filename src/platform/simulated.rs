//! Deterministic in-process camera backend.
//!
//! Models a phone with a front and a rear camera. Every session it creates
//! shares state with the backend handle, so the handle can inject faults and
//! inspect the session topology while a controller owns the session.

use crate::errors::CameraError;
use crate::hardware::{CameraBackend, PhotoDelivery, RenderTarget, SessionBackend};
use crate::testing::{synthetic_jpeg, synthetic_preview_frame};
use crate::types::{
    CameraPosition, DeviceInfo, DeviceInput, FocusMode, PhotoCodec, PhotoResult, PhotoSettings,
    PreviewConfig,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How the simulated photo output answers a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureBehavior {
    /// Deliver a synthetic JPEG.
    Deliver,
    /// Deliver an error.
    Fail(CameraError),
    /// Deliver neither data nor error.
    Empty,
    /// Deliver bytes that are not an image.
    Corrupt,
    /// Keep the request; answer later through [`SimulatedBackend::deliver_held`].
    Hold,
    /// Refuse the submission outright.
    Reject(CameraError),
}

struct SimState {
    devices: Vec<DeviceInfo>,
    fail_enumeration: Option<CameraError>,
    fail_focus: Option<CameraError>,
    refuse_input_creation: HashSet<CameraPosition>,
    reject_inputs: HashSet<CameraPosition>,
    fail_attach: HashSet<CameraPosition>,
    reject_photo_output: bool,
    fail_start: Option<CameraError>,
    capture_behavior: CaptureBehavior,
    delivery_delay: Duration,
    photo_size: (u32, u32),

    focus_modes: HashMap<String, FocusMode>,
    sessions_created: usize,
    attached: Vec<DeviceInput>,
    outputs: Vec<PhotoCodec>,
    running: bool,
    transaction_open: bool,
    committed_transactions: usize,
    capture_requests: Vec<PhotoSettings>,
    held: Option<(PhotoSettings, PhotoDelivery)>,
    preview: Option<(Box<dyn RenderTarget>, PreviewConfig)>,
    preview_sequence: u64,
}

impl SimState {
    fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices,
            fail_enumeration: None,
            fail_focus: None,
            refuse_input_creation: HashSet::new(),
            reject_inputs: HashSet::new(),
            fail_attach: HashSet::new(),
            reject_photo_output: false,
            fail_start: None,
            capture_behavior: CaptureBehavior::Deliver,
            delivery_delay: Duration::ZERO,
            photo_size: (64, 48),
            focus_modes: HashMap::new(),
            sessions_created: 0,
            attached: Vec::new(),
            outputs: Vec::new(),
            running: false,
            transaction_open: false,
            committed_transactions: 0,
            capture_requests: Vec::new(),
            held: None,
            preview: None,
            preview_sequence: 0,
        }
    }
}

#[derive(Clone)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedBackend {
    pub const FRONT_ID: &'static str = "sim-front";
    pub const REAR_ID: &'static str = "sim-rear";

    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(devices))),
        }
    }

    pub fn front_device() -> DeviceInfo {
        DeviceInfo::new(Self::FRONT_ID, "Simulated Front Camera")
            .with_position(CameraPosition::Front)
    }

    pub fn rear_device() -> DeviceInfo {
        DeviceInfo::new(Self::REAR_ID, "Simulated Back Camera")
            .with_position(CameraPosition::Rear)
            .with_continuous_autofocus(true)
    }

    pub fn front_and_rear() -> Self {
        Self::new(vec![Self::front_device(), Self::rear_device()])
    }

    pub fn rear_only() -> Self {
        Self::new(vec![Self::rear_device()])
    }

    pub fn front_only() -> Self {
        Self::new(vec![Self::front_device()])
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    // Fault injection

    pub fn fail_enumeration(&self, error: Option<CameraError>) {
        self.state().fail_enumeration = error;
    }

    pub fn fail_focus_configuration(&self, error: Option<CameraError>) {
        self.state().fail_focus = error;
    }

    /// `create_input` fails for devices facing `position`.
    pub fn refuse_input_creation_for(&self, position: CameraPosition) {
        self.state().refuse_input_creation.insert(position);
    }

    /// Sessions report `can_add_input == false` for inputs facing `position`.
    pub fn reject_inputs_for(&self, position: CameraPosition) {
        self.state().reject_inputs.insert(position);
    }

    pub fn accept_inputs_for(&self, position: CameraPosition) {
        self.state().reject_inputs.remove(&position);
    }

    /// Sessions accept inputs facing `position` in `can_add_input` but fail
    /// in `add_input`, as a device whose stream cannot be opened does.
    pub fn fail_attach_for(&self, position: CameraPosition) {
        self.state().fail_attach.insert(position);
    }

    /// The hardware stops the running session on its own.
    pub fn interrupt(&self) {
        self.state().running = false;
    }

    pub fn reject_photo_output(&self, reject: bool) {
        self.state().reject_photo_output = reject;
    }

    pub fn fail_start(&self, error: Option<CameraError>) {
        self.state().fail_start = error;
    }

    pub fn set_capture_behavior(&self, behavior: CaptureBehavior) {
        self.state().capture_behavior = behavior;
    }

    /// Delay before a photo result is delivered from the hardware thread.
    pub fn set_delivery_delay(&self, delay: Duration) {
        self.state().delivery_delay = delay;
    }

    pub fn set_photo_size(&self, width: u32, height: u32) {
        self.state().photo_size = (width, height);
    }

    // Inspection

    pub fn focus_mode(&self, device_id: &str) -> Option<FocusMode> {
        self.state().focus_modes.get(device_id).copied()
    }

    pub fn sessions_created(&self) -> usize {
        self.state().sessions_created
    }

    pub fn attached_inputs(&self) -> Vec<DeviceInput> {
        self.state().attached.clone()
    }

    pub fn attached_positions(&self) -> Vec<CameraPosition> {
        self.state()
            .attached
            .iter()
            .filter_map(DeviceInput::position)
            .collect()
    }

    pub fn photo_outputs(&self) -> Vec<PhotoCodec> {
        self.state().outputs.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn transaction_open(&self) -> bool {
        self.state().transaction_open
    }

    pub fn committed_transactions(&self) -> usize {
        self.state().committed_transactions
    }

    pub fn capture_requests(&self) -> Vec<PhotoSettings> {
        self.state().capture_requests.clone()
    }

    pub fn held_request(&self) -> Option<PhotoSettings> {
        self.state().held.as_ref().map(|(settings, _)| settings.clone())
    }

    pub fn preview_config(&self) -> Option<PreviewConfig> {
        self.state().preview.as_ref().map(|(_, config)| *config)
    }

    /// Report `result` through the delivery handle of the held request.
    /// The handle stays available, so it can be used again.
    pub fn deliver_held(&self, result: PhotoResult) -> bool {
        let delivery = self.state().held.as_ref().map(|(_, d)| d.clone());
        match delivery {
            Some(delivery) => {
                delivery.deliver(result);
                true
            }
            None => false,
        }
    }

    /// Answer the held request as [`CaptureBehavior::Deliver`] would.
    pub fn complete_held(&self) -> bool {
        let (held, size) = {
            let state = self.state();
            (state.held.clone(), state.photo_size)
        };
        match held {
            Some((settings, delivery)) => {
                let data = synthetic_jpeg(size.0, size.1, 0, 90);
                delivery.deliver(PhotoResult::success(settings.request_id, data));
                true
            }
            None => false,
        }
    }

    /// Render one synthetic frame into the attached preview sink.
    pub fn push_preview_frame(&self) -> bool {
        let mut state = self.state();
        if !state.running {
            return false;
        }
        state.preview_sequence += 1;
        let sequence = state.preview_sequence;
        let position = state.attached.first().and_then(DeviceInput::position);
        match state.preview.as_mut() {
            Some((target, _)) => {
                target.render(&synthetic_preview_frame(sequence, 16, 12, position));
                true
            }
            None => false,
        }
    }
}

impl CameraBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        let state = self.state();
        match &state.fail_enumeration {
            Some(error) => Err(error.clone()),
            None => Ok(state.devices.clone()),
        }
    }

    fn set_focus_mode(&self, device: &DeviceInfo, mode: FocusMode) -> Result<(), CameraError> {
        let mut state = self.state();
        if let Some(error) = &state.fail_focus {
            return Err(error.clone());
        }
        state.focus_modes.insert(device.id.clone(), mode);
        Ok(())
    }

    fn create_input(&self, device: &DeviceInfo) -> Result<DeviceInput, CameraError> {
        let state = self.state();
        let refused = device
            .position
            .is_some_and(|p| state.refuse_input_creation.contains(&p));
        if refused || !state.devices.iter().any(|d| d.id == device.id) {
            return Err(CameraError::InitializationError(format!(
                "cannot open device {}",
                device.id
            )));
        }
        Ok(DeviceInput::new(device.clone()))
    }

    fn create_session(&self) -> Result<Box<dyn SessionBackend>, CameraError> {
        let mut state = self.state();
        state.sessions_created += 1;
        state.attached.clear();
        state.outputs.clear();
        state.running = false;
        state.transaction_open = false;
        state.preview = None;
        state.held = None;
        Ok(Box::new(SimulatedSession {
            state: self.state.clone(),
        }))
    }
}

struct SimulatedSession {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedSession {
    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }
}

impl SessionBackend for SimulatedSession {
    fn begin_configuration(&mut self) {
        self.state().transaction_open = true;
    }

    fn commit_configuration(&mut self) {
        let mut state = self.state();
        state.transaction_open = false;
        state.committed_transactions += 1;
    }

    fn can_add_input(&self, input: &DeviceInput) -> bool {
        let state = self.state();
        // One input per facing at a time.
        let occupied = state
            .attached
            .iter()
            .any(|a| a.id == input.id || a.position() == input.position());
        let rejected = input
            .position()
            .is_some_and(|p| state.reject_inputs.contains(&p));
        !occupied && !rejected
    }

    fn add_input(&mut self, input: &DeviceInput) -> Result<(), CameraError> {
        if !self.can_add_input(input) {
            return Err(CameraError::SessionError(format!(
                "cannot add input for {}",
                input.device.id
            )));
        }
        let mut state = self.state();
        if input
            .position()
            .is_some_and(|p| state.fail_attach.contains(&p))
        {
            return Err(CameraError::InitializationError(format!(
                "failed to open stream for {}",
                input.device.id
            )));
        }
        state.attached.push(input.clone());
        Ok(())
    }

    fn remove_input(&mut self, input: &DeviceInput) {
        self.state().attached.retain(|a| a.id != input.id);
    }

    fn inputs(&self) -> Vec<DeviceInput> {
        self.state().attached.clone()
    }

    fn can_add_photo_output(&self, _codec: PhotoCodec) -> bool {
        let state = self.state();
        !state.reject_photo_output && state.outputs.is_empty()
    }

    fn add_photo_output(&mut self, codec: PhotoCodec) -> Result<(), CameraError> {
        if !self.can_add_photo_output(codec) {
            return Err(CameraError::SessionError("cannot add photo output".to_string()));
        }
        self.state().outputs.push(codec);
        Ok(())
    }

    fn start_running(&mut self) -> Result<(), CameraError> {
        let mut state = self.state();
        if let Some(error) = &state.fail_start {
            return Err(error.clone());
        }
        state.running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        self.state().running = false;
    }

    fn is_running(&self) -> bool {
        self.state().running
    }

    fn attach_preview(
        &mut self,
        target: Box<dyn RenderTarget>,
        config: PreviewConfig,
    ) -> Result<(), CameraError> {
        self.state().preview = Some((target, config));
        Ok(())
    }

    fn capture_photo(
        &mut self,
        settings: PhotoSettings,
        delivery: PhotoDelivery,
    ) -> Result<(), CameraError> {
        let mut state = self.state();
        if state.outputs.is_empty() {
            return Err(CameraError::CaptureError("no photo output attached".to_string()));
        }
        let request_id = settings.request_id;
        let seed = state.capture_requests.len() as u64 + 1;
        let (width, height) = state.photo_size;
        let behavior = state.capture_behavior.clone();
        let result = match behavior {
            CaptureBehavior::Reject(error) => return Err(error),
            CaptureBehavior::Hold => {
                state.capture_requests.push(settings.clone());
                state.held = Some((settings, delivery));
                return Ok(());
            }
            CaptureBehavior::Deliver => {
                PhotoResult::success(request_id, synthetic_jpeg(width, height, seed, 90))
            }
            CaptureBehavior::Fail(error) => PhotoResult::failure(request_id, error),
            CaptureBehavior::Empty => PhotoResult::empty(request_id),
            CaptureBehavior::Corrupt => PhotoResult::success(request_id, vec![0u8, 1, 2, 3]),
        };
        state.capture_requests.push(settings);

        let delay = state.delivery_delay;
        std::thread::spawn(move || {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            delivery.deliver(result);
        });
        Ok(())
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        // Tearing down the session releases every device it held.
        let mut state = self.state();
        state.running = false;
        state.attached.clear();
        state.outputs.clear();
        state.preview = None;
    }
}
