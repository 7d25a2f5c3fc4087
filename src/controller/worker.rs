//! The session queue: one thread that owns the hardware session and runs
//! every topology change, capture submission and photo delivery in order.

use crate::config::ControllerConfig;
use crate::controller::assembly::{assemble, AssembledSession};
use crate::controller::pending::PendingCapture;
use crate::controller::runtime::{photo_outcome, switch_cameras};
use crate::controller::Shared;
use crate::errors::ControllerError;
use crate::hardware::{CameraBackend, PhotoDelivery, RenderTarget};
use crate::types::{CapturedPhoto, ControllerState, PhotoResult, PhotoSettings, PreviewConfig};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub(crate) type PrepareCompletion = Box<dyn FnOnce(Result<(), ControllerError>) + Send + 'static>;
pub(crate) type Reply = Sender<Result<(), ControllerError>>;

pub(crate) enum Job {
    Prepare(PrepareCompletion),
    Switch(Reply),
    AttachPreview(Box<dyn RenderTarget>, Reply),
    Capture(PhotoSettings),
    Delivery(PhotoResult),
    Shutdown,
}

pub(crate) struct Worker {
    backend: Arc<dyn CameraBackend>,
    shared: Arc<Shared>,
    config: ControllerConfig,
    jobs: Receiver<Job>,
    delivery: PhotoDelivery,
    assembled: Option<AssembledSession>,
    /// Switch requests waiting for the pending capture to resolve.
    deferred: VecDeque<Reply>,
    deadline: Option<(Uuid, Instant)>,
}

impl Worker {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        shared: Arc<Shared>,
        config: ControllerConfig,
        jobs: Receiver<Job>,
        sender: Sender<Job>,
    ) -> Self {
        let delivery = PhotoDelivery::new(move |result| {
            if sender.send(Job::Delivery(result)).is_err() {
                log::debug!("Photo result arrived after the session queue stopped");
            }
        });

        Self {
            backend,
            shared,
            config,
            jobs,
            delivery,
            assembled: None,
            deferred: VecDeque::new(),
            deadline: None,
        }
    }

    pub fn run(mut self) {
        log::debug!("Session queue started");
        while let Some(job) = self.next_job() {
            match job {
                Job::Prepare(completion) => self.prepare(completion),
                Job::Switch(reply) => {
                    if self.shared.pending.is_pending() {
                        log::debug!("Deferring camera switch until the pending capture resolves");
                        self.deferred.push_back(reply);
                    } else {
                        self.switch(reply);
                    }
                }
                Job::AttachPreview(target, reply) => self.attach_preview(target, reply),
                Job::Capture(settings) => self.submit_capture(settings),
                Job::Delivery(result) => self.deliver(result),
                Job::Shutdown => {
                    self.shutdown();
                    break;
                }
            }
            self.run_deferred();
        }
        log::debug!("Session queue stopped");
    }

    fn next_job(&mut self) -> Option<Job> {
        loop {
            let Some((request_id, deadline)) = self.deadline else {
                return self.jobs.recv().ok();
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.jobs.recv_timeout(remaining) {
                Ok(job) => return Some(job),
                Err(RecvTimeoutError::Timeout) => {
                    self.expire(request_id);
                    self.run_deferred();
                }
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn run_deferred(&mut self) {
        while !self.shared.pending.is_pending() {
            match self.deferred.pop_front() {
                Some(reply) => self.switch(reply),
                None => break,
            }
        }
    }

    fn prepare(&mut self, completion: PrepareCompletion) {
        log::info!("Preparing capture session on {}", self.backend.name());

        let result = match assemble(self.backend.as_ref(), &self.config) {
            Ok(assembled) => {
                self.shared.set_warnings(assembled.discovery.warnings.clone());
                self.shared.set_position(assembled.position);
                self.shared.set_running(true);
                self.shared.set_state(ControllerState::Ready);
                self.assembled = Some(assembled);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to prepare capture session: {}", e);
                self.shared.set_position(None);
                self.shared.set_state(ControllerState::Uninitialized);
                Err(e)
            }
        };

        self.shared
            .context
            .dispatch(Box::new(move || completion(result)));
    }

    fn switch(&mut self, reply: Reply) {
        self.check_session();
        let result = match self.assembled.as_mut() {
            Some(assembled) => {
                self.shared.set_state(ControllerState::Switching);
                let outcome = switch_cameras(
                    assembled,
                    self.backend.as_ref(),
                    self.config.switching.failure_policy,
                );
                self.shared.set_position(assembled.position);
                outcome.map(|position| log::info!("Switched to {} camera", position))
            }
            None => Err(ControllerError::session_missing()),
        };
        self.shared.settle_state();

        if let Err(e) = &result {
            log::warn!("Camera switch failed: {}", e);
        }
        let _ = reply.send(result);
    }

    fn attach_preview(&mut self, target: Box<dyn RenderTarget>, reply: Reply) {
        self.check_session();
        let result = match self.assembled.as_mut() {
            Some(assembled) => assembled
                .session
                .attach_preview(target, PreviewConfig::default())
                .map_err(ControllerError::backend),
            None => Err(ControllerError::session_missing()),
        };
        if result.is_ok() {
            log::debug!("Preview sink attached");
        }
        let _ = reply.send(result);
    }

    fn submit_capture(&mut self, settings: PhotoSettings) {
        let request_id = settings.request_id;
        self.check_session();
        let submitted = match self.assembled.as_mut() {
            Some(assembled) => match assembled.position {
                Some(position) => {
                    // A switch that finished after the request was registered
                    // changed the camera; label the photo with the one used.
                    self.shared.pending.stamp_position(request_id, position);
                    assembled
                        .session
                        .capture_photo(settings, self.delivery.clone())
                        .map_err(ControllerError::backend)
                }
                None => Err(ControllerError::invalid_operation(
                    "session has no active camera input",
                )),
            },
            None => Err(ControllerError::session_missing()),
        };

        match submitted {
            Ok(()) => {
                log::debug!("Submitted photo request {}", request_id);
                self.deadline = self
                    .config
                    .capture
                    .timeout()
                    .map(|timeout| (request_id, Instant::now() + timeout));
            }
            Err(e) => {
                if let Some(pending) = self.shared.pending.take_matching(request_id) {
                    self.resolve(pending, Err(e));
                }
            }
        }
    }

    fn deliver(&mut self, result: PhotoResult) {
        let request_id = result.request_id;
        match self.shared.pending.take_matching(request_id) {
            Some(pending) => {
                if matches!(self.deadline, Some((id, _)) if id == request_id) {
                    self.deadline = None;
                }
                let outcome = photo_outcome(result, &pending);
                match &outcome {
                    Ok(photo) => log::info!(
                        "Captured {}x{} photo from {} camera",
                        photo.width(),
                        photo.height(),
                        photo.position
                    ),
                    Err(e) => log::warn!("Photo capture failed: {}", e),
                }
                self.resolve(pending, outcome);
            }
            None => {
                self.shared.record_protocol_violation();
                log::error!(
                    "Protocol violation: photo result for request {} which is not pending (pending: {:?})",
                    request_id,
                    self.shared.pending.request_id()
                );
            }
        }
    }

    fn expire(&mut self, request_id: Uuid) {
        self.deadline = None;
        if let Some(pending) = self.shared.pending.take_matching(request_id) {
            log::warn!("Photo request {} timed out", request_id);
            self.resolve(pending, Err(ControllerError::timeout()));
        }
    }

    fn resolve(&self, pending: PendingCapture, outcome: Result<CapturedPhoto, ControllerError>) {
        let completion = pending.into_completion();
        self.shared.settle_state();
        self.shared
            .context
            .dispatch(Box::new(move || completion(outcome)));
    }

    /// Drop a session the hardware stopped on its own. Later operations
    /// report `CaptureSessionIsMissing` and `prepare` may run again.
    fn check_session(&mut self) {
        let stopped = self
            .assembled
            .as_ref()
            .is_some_and(|assembled| !assembled.session.is_running());
        if !stopped {
            return;
        }

        log::warn!("Capture session stopped unexpectedly");
        if let Some(mut assembled) = self.assembled.take() {
            assembled.stop();
        }
        self.shared.set_running(false);
        self.shared.set_position(None);
        self.shared.set_state(ControllerState::Uninitialized);
        self.deadline = None;
        if let Some(pending) = self.shared.pending.take() {
            self.resolve(pending, Err(ControllerError::session_missing()));
        }
    }

    fn shutdown(&mut self) {
        self.shared.set_running(false);
        self.shared.set_state(ControllerState::Uninitialized);
        self.shared.set_position(None);
        self.deadline = None;

        if let Some(pending) = self.shared.pending.take() {
            self.resolve(pending, Err(ControllerError::session_missing()));
        }
        for reply in self.deferred.drain(..) {
            let _ = reply.send(Err(ControllerError::session_missing()));
        }
        if let Some(mut assembled) = self.assembled.take() {
            assembled.stop();
            log::info!("Capture session stopped");
        }
    }
}
