use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use horizon_service::{MediaType, SystemControl};

/// A pending request to replace the running title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpRequest {
    pub media: MediaType,
    /// Zero reloads the binary that is currently running.
    pub title_id: u64,
}

#[derive(Debug, Default)]
struct Mailboxes {
    shutdown: AtomicBool,
    paused: AtomicBool,
    /// Last writer wins.
    jump: Mutex<Option<JumpRequest>>,
}

/// Cloneable handle through which other host threads steer the run loop.
///
/// Every request lands in a single-slot mailbox. The emulation thread drains them once per loop
/// iteration; nothing here touches kernel or scheduler state.
#[derive(Debug, Clone, Default)]
pub struct ControlHandle {
    inner: Arc<Mailboxes>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
    }

    pub fn request_jump(&self, media: MediaType, title_id: u64) {
        let mut slot = self
            .inner
            .jump
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(JumpRequest { media, title_id });
    }

    pub fn set_paused(&self, paused: bool) {
        self.inner.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn take_shutdown(&self) -> bool {
        self.inner.shutdown.swap(false, Ordering::AcqRel)
    }

    /// Drops any pending shutdown or jump. Pause is a state, not a request, and is kept.
    pub(crate) fn clear_requests(&self) {
        self.inner.shutdown.store(false, Ordering::Release);
        self.take_jump();
    }

    pub(crate) fn take_jump(&self) -> Option<JumpRequest> {
        self.inner
            .jump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl SystemControl for ControlHandle {
    fn request_jump(&self, media: MediaType, title_id: u64) {
        ControlHandle::request_jump(self, media, title_id);
    }

    fn request_shutdown(&self) {
        ControlHandle::request_shutdown(self);
    }
}
