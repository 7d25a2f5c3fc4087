//! The capture session controller.
//!
//! [`CameraController`] owns one hardware session through a private worker
//! thread. Callers never see the session itself; they prepare it, switch
//! cameras, attach a preview and take photos, and receive completions on the
//! [`CallerContext`] the controller was built with.
//!
//! ```rust,no_run
//! use camera_controller::{CameraController, MainQueue, SimulatedBackend};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let queue = MainQueue::new();
//! let controller = CameraController::new(
//!     Arc::new(SimulatedBackend::front_and_rear()),
//!     Arc::new(queue.clone()),
//! )?;
//! controller.prepare(|result| {
//!     if let Err(e) = result {
//!         eprintln!("camera unavailable: {e}");
//!     }
//! });
//! queue.run_until(|| controller.is_running(), Duration::from_secs(5));
//! # Ok::<(), camera_controller::ControllerError>(())
//! ```

mod assembly;
pub mod discovery;
pub mod dispatch;
mod pending;
mod runtime;
mod worker;

pub use discovery::{discover_devices, Discovery};
pub use dispatch::{CallerContext, InlineContext, MainQueue, Task};
pub use pending::CaptureCompletion;

use crate::config::ControllerConfig;
use crate::errors::{CameraError, ControllerError};
use crate::hardware::{CameraBackend, RenderTarget};
use crate::types::{
    CameraPosition, CapturedPhoto, ControllerState, FlashMode, PhotoCodec, PhotoSettings,
};
use crossbeam_channel::{SendError, Sender};
use pending::{PendingCapture, PendingSlot};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use worker::{Job, Worker};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State visible to both the caller-facing handle and the worker.
pub(crate) struct Shared {
    state: Mutex<ControllerState>,
    position: Mutex<Option<CameraPosition>>,
    flash_mode: Mutex<FlashMode>,
    warnings: Mutex<Vec<ControllerError>>,
    running: AtomicBool,
    closed: AtomicBool,
    protocol_violations: AtomicU64,
    pub(crate) pending: PendingSlot,
    pub(crate) context: Arc<dyn CallerContext>,
}

impl Shared {
    pub(crate) fn set_state(&self, state: ControllerState) {
        *lock(&self.state) = state;
    }

    /// Put a running controller back into `Ready` or `Capturing`.
    pub(crate) fn settle_state(&self) {
        let mut state = lock(&self.state);
        if matches!(
            *state,
            ControllerState::Ready | ControllerState::Switching | ControllerState::Capturing
        ) {
            *state = if self.pending.is_pending() {
                ControllerState::Capturing
            } else {
                ControllerState::Ready
            };
        }
    }

    fn mark_capturing(&self) {
        let mut state = lock(&self.state);
        if *state == ControllerState::Ready && self.pending.is_pending() {
            *state = ControllerState::Capturing;
        }
    }

    pub(crate) fn set_position(&self, position: Option<CameraPosition>) {
        *lock(&self.position) = position;
    }

    pub(crate) fn set_warnings(&self, warnings: Vec<ControllerError>) {
        *lock(&self.warnings) = warnings;
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn record_protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }
}

/// Owns a capture session and exposes the operations allowed on it.
pub struct CameraController {
    shared: Arc<Shared>,
    jobs: Sender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    codec: PhotoCodec,
}

impl CameraController {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        context: Arc<dyn CallerContext>,
    ) -> Result<Self, ControllerError> {
        Self::with_config(backend, context, ControllerConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn CameraBackend>,
        context: Arc<dyn CallerContext>,
        config: ControllerConfig,
    ) -> Result<Self, ControllerError> {
        config.validate().map_err(|e| {
            ControllerError::backend(CameraError::InitializationError(format!(
                "invalid configuration: {e}"
            )))
        })?;

        let shared = Arc::new(Shared {
            state: Mutex::new(ControllerState::Uninitialized),
            position: Mutex::new(None),
            flash_mode: Mutex::new(config.capture.default_flash_mode),
            warnings: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            protocol_violations: AtomicU64::new(0),
            pending: PendingSlot::default(),
            context,
        });

        let codec = config.session.photo_codec;
        let (sender, receiver) = crossbeam_channel::unbounded();
        let thread_name = config.session.worker_thread_name.clone();
        let worker_shared = shared.clone();
        let worker_sender = sender.clone();
        // The worker is built on its own thread: the session it owns never moves.
        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || Worker::new(backend, worker_shared, config, receiver, worker_sender).run())
            .map_err(|e| {
                ControllerError::backend(CameraError::InitializationError(format!(
                    "spawn failed: {e}"
                )))
            })?;

        Ok(Self {
            shared,
            jobs: sender,
            worker_id: handle.thread().id(),
            worker: Mutex::new(Some(handle)),
            codec,
        })
    }

    /// Assemble and start the session off the calling thread.
    ///
    /// `completion` runs exactly once on the caller context: `Ok(())` once
    /// the session is running, or the first error met. A controller that is
    /// already preparing answers `AlreadyPreparing`; one that is already
    /// running answers `CaptureSessionAlreadyRunning`. Neither touches the
    /// session.
    pub fn prepare<F>(&self, completion: F)
    where
        F: FnOnce(Result<(), ControllerError>) + Send + 'static,
    {
        let rejection = {
            let mut state = lock(&self.shared.state);
            if self.shared.closed.load(Ordering::SeqCst) {
                Some(ControllerError::session_missing())
            } else {
                match *state {
                    ControllerState::Uninitialized => {
                        *state = ControllerState::Preparing;
                        None
                    }
                    ControllerState::Preparing => Some(ControllerError::already_preparing()),
                    ControllerState::Ready
                    | ControllerState::Switching
                    | ControllerState::Capturing => Some(ControllerError::already_running()),
                }
            }
        };

        if let Some(error) = rejection {
            log::warn!("prepare rejected: {}", error);
            self.shared
                .context
                .dispatch(Box::new(move || completion(Err(error))));
            return;
        }

        if let Err(SendError(job)) = self.jobs.send(Job::Prepare(Box::new(completion))) {
            self.shared.set_state(ControllerState::Uninitialized);
            if let Job::Prepare(completion) = job {
                self.shared.context.dispatch(Box::new(move || {
                    completion(Err(ControllerError::session_missing()))
                }));
            }
        }
    }

    /// Attach a live-video sink to the running session.
    pub fn display_preview<T: RenderTarget>(&self, target: T) -> Result<(), ControllerError> {
        self.ensure_running()?;
        self.ensure_off_worker("display_preview")?;
        self.request(|reply| Job::AttachPreview(Box::new(target), reply))
    }

    /// Swap the active camera for the one facing the other way.
    ///
    /// Blocks until the session queue has applied the change. If a capture
    /// is pending, the switch waits for it to resolve first.
    pub fn switch_cameras(&self) -> Result<(), ControllerError> {
        self.ensure_running()?;
        self.ensure_off_worker("switch_cameras")?;
        self.request(Job::Switch)
    }

    /// Request one photo.
    ///
    /// Returns an error, without ever calling `completion`, when the session
    /// is not running or another capture is still pending. Otherwise
    /// `completion` runs exactly once on the caller context. The photo
    /// reports the camera that was active when the session queue submitted
    /// it, which differs from the current one if a switch was in progress.
    pub fn capture_image<F>(&self, completion: F) -> Result<(), ControllerError>
    where
        F: FnOnce(Result<CapturedPhoto, ControllerError>) + Send + 'static,
    {
        self.ensure_running()?;
        let position = self
            .current_camera_position()
            .ok_or_else(|| ControllerError::invalid_operation("session has no active camera input"))?;

        let settings = PhotoSettings::new(self.flash_mode(), self.codec);
        let capture = PendingCapture::new(settings.clone(), position, Box::new(completion));
        if self.shared.pending.register(capture).is_err() {
            return Err(ControllerError::capture_in_progress());
        }
        self.shared.mark_capturing();

        log::debug!(
            "Photo request {} queued (flash {})",
            settings.request_id,
            settings.flash_mode
        );
        let request_id = settings.request_id;
        if self.jobs.send(Job::Capture(settings)).is_err() {
            // Nobody else will resolve it; hand the callback back unused.
            self.shared.pending.take_matching(request_id);
            self.shared.settle_state();
            return Err(ControllerError::session_missing());
        }
        Ok(())
    }

    /// [`prepare`](Self::prepare) as a future. The caller context must run
    /// tasks without help from the awaiting thread (e.g. [`InlineContext`]).
    pub async fn prepare_async(&self) -> Result<(), ControllerError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.prepare(move |result| {
            let _ = tx.send(result);
        });
        rx.await
            .unwrap_or_else(|_| Err(ControllerError::session_missing()))
    }

    /// [`capture_image`](Self::capture_image) as a future.
    pub async fn capture_image_async(&self) -> Result<CapturedPhoto, ControllerError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.capture_image(move |result| {
            let _ = tx.send(result);
        })?;
        rx.await
            .unwrap_or_else(|_| Err(ControllerError::session_missing()))
    }

    pub fn state(&self) -> ControllerState {
        *lock(&self.shared.state)
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn current_camera_position(&self) -> Option<CameraPosition> {
        *lock(&self.shared.position)
    }

    pub fn flash_mode(&self) -> FlashMode {
        *lock(&self.shared.flash_mode)
    }

    /// Applies to captures requested after this call.
    pub fn set_flash_mode(&self, mode: FlashMode) {
        *lock(&self.shared.flash_mode) = mode;
    }

    pub fn is_capture_pending(&self) -> bool {
        self.shared.pending.is_pending()
    }

    /// Recoverable problems from the most recent device discovery.
    pub fn discovery_warnings(&self) -> Vec<ControllerError> {
        lock(&self.shared.warnings).clone()
    }

    /// Photo results discarded because no matching request was pending.
    pub fn protocol_violations(&self) -> u64 {
        self.shared.protocol_violations.load(Ordering::Relaxed)
    }

    /// Stop the session and the worker. A pending capture resolves with
    /// `CaptureSessionIsMissing`. Later operations fail the same way.
    pub fn close(&self, join_timeout: Duration) -> Result<(), ControllerError> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.jobs.send(Job::Shutdown);

        // Joining ourselves would never finish.
        if std::thread::current().id() == self.worker_id {
            return Ok(());
        }

        let Some(handle) = lock(&self.worker).take() else {
            return Ok(());
        };
        let start = Instant::now();
        while !handle.is_finished() {
            if start.elapsed() >= join_timeout {
                *lock(&self.worker) = Some(handle);
                return Err(ControllerError::timeout());
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let _ = handle.join();
        log::debug!("Controller closed");
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), ControllerError> {
        if self.shared.is_running() {
            Ok(())
        } else {
            Err(ControllerError::session_missing())
        }
    }

    fn ensure_off_worker(&self, operation: &str) -> Result<(), ControllerError> {
        if std::thread::current().id() == self.worker_id {
            return Err(ControllerError::invalid_operation(format!(
                "{operation} cannot be called from the session queue"
            )));
        }
        Ok(())
    }

    fn request<F>(&self, job: F) -> Result<(), ControllerError>
    where
        F: FnOnce(worker::Reply) -> Job,
    {
        let (reply, response) = crossbeam_channel::bounded(1);
        self.jobs
            .send(job(reply))
            .map_err(|_| ControllerError::session_missing())?;
        response
            .recv()
            .unwrap_or_else(|_| Err(ControllerError::session_missing()))
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        if let Err(e) = self.close(Duration::from_millis(500)) {
            log::warn!("Error closing controller in drop: {}", e);
        }
    }
}
