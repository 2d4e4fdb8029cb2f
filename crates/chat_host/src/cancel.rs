use futures::future::{AbortHandle, AbortRegistration};
use parking_lot::Mutex;
use std::sync::Arc;

/// Holds the abort handle of the one request in flight, if any.
///
/// Clones share the same slot, so a Ctrl-C handler or another task can stop
/// a request while the session is busy awaiting it.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    live: Arc<Mutex<Option<AbortHandle>>>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for a new request. A previous handle still in the
    /// slot is aborted first.
    pub fn arm(&self) -> AbortRegistration {
        let (handle, registration) = AbortHandle::new_pair();
        if let Some(previous) = self.live.lock().replace(handle) {
            previous.abort();
        }
        registration
    }

    /// Abort the live request. Returns whether there was one.
    pub fn abort(&self) -> bool {
        match self.live.lock().take() {
            Some(handle) => {
                handle.abort();
                tracing::debug!("abort requested");
                true
            }
            None => false,
        }
    }

    /// Forget the handle once its request has settled.
    pub fn disarm(&self) {
        self.live.lock().take();
    }

    pub fn is_armed(&self) -> bool {
        self.live.lock().is_some()
    }
}
