//! Single-slot register for the one outstanding photo request.

use crate::errors::ControllerError;
use crate::types::{CameraPosition, CapturedPhoto, PhotoSettings};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub type CaptureCompletion =
    Box<dyn FnOnce(Result<CapturedPhoto, ControllerError>) + Send + 'static>;

pub(crate) struct PendingCapture {
    pub settings: PhotoSettings,
    pub position: CameraPosition,
    completion: CaptureCompletion,
}

impl PendingCapture {
    pub fn new(
        settings: PhotoSettings,
        position: CameraPosition,
        completion: CaptureCompletion,
    ) -> Self {
        Self {
            settings,
            position,
            completion,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.settings.request_id
    }

    /// Consume the request and hand back its completion.
    pub fn into_completion(self) -> CaptureCompletion {
        self.completion
    }
}

#[derive(Default)]
pub(crate) struct PendingSlot {
    inner: Mutex<Option<PendingCapture>>,
}

impl PendingSlot {
    fn slot(&self) -> MutexGuard<'_, Option<PendingCapture>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Occupy the slot. An occupied slot is never overwritten; the rejected
    /// request is handed back untouched.
    pub fn register(&self, capture: PendingCapture) -> Result<(), PendingCapture> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Err(capture);
        }
        *slot = Some(capture);
        Ok(())
    }

    /// Take the pending request only if it is the one `request_id` names.
    pub fn take_matching(&self, request_id: Uuid) -> Option<PendingCapture> {
        let mut slot = self.slot();
        match slot.as_ref() {
            Some(pending) if pending.request_id() == request_id => slot.take(),
            _ => None,
        }
    }

    /// Record the camera the request was submitted to. Returns false when
    /// `request_id` is no longer pending.
    pub fn stamp_position(&self, request_id: Uuid, position: CameraPosition) -> bool {
        match self.slot().as_mut() {
            Some(pending) if pending.request_id() == request_id => {
                pending.position = position;
                true
            }
            _ => false,
        }
    }

    pub fn take(&self) -> Option<PendingCapture> {
        self.slot().take()
    }

    pub fn request_id(&self) -> Option<Uuid> {
        self.slot().as_ref().map(PendingCapture::request_id)
    }

    pub fn is_pending(&self) -> bool {
        self.slot().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FlashMode, PhotoCodec};

    fn request() -> PendingCapture {
        PendingCapture::new(
            PhotoSettings::new(FlashMode::Off, PhotoCodec::Jpeg),
            CameraPosition::Rear,
            Box::new(|_| {}),
        )
    }

    #[test]
    fn test_second_registration_is_rejected() {
        let slot = PendingSlot::default();
        let first = request();
        let first_id = first.request_id();
        assert!(slot.register(first).is_ok());

        let second = request();
        let second_id = second.request_id();
        let rejected = slot.register(second).err().unwrap();
        assert_eq!(rejected.request_id(), second_id);
        assert_eq!(slot.request_id(), Some(first_id));
    }

    #[test]
    fn test_take_matching_ignores_other_ids() {
        let slot = PendingSlot::default();
        let capture = request();
        let id = capture.request_id();
        slot.register(capture).ok().unwrap();

        assert!(slot.take_matching(Uuid::new_v4()).is_none());
        assert!(slot.is_pending());
        assert!(slot.take_matching(id).is_some());
        assert!(!slot.is_pending());
        assert!(slot.take_matching(id).is_none());
    }

    #[test]
    fn test_stamp_position_only_touches_matching_request() {
        let slot = PendingSlot::default();
        let capture = request();
        let id = capture.request_id();
        slot.register(capture).ok().unwrap();

        assert!(!slot.stamp_position(Uuid::new_v4(), CameraPosition::Front));
        assert!(slot.stamp_position(id, CameraPosition::Front));
        assert_eq!(slot.take().unwrap().position, CameraPosition::Front);
        assert!(!slot.stamp_position(id, CameraPosition::Rear));
    }
}
