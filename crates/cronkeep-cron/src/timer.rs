//! One-shot timer used for deferred registration.

use std::time::Duration;

use tokio::runtime::Handle;

/// Callback fired once by a [`Timer`].
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Runs a callback once after a delay. Fire-and-forget: no handle is returned.
pub trait Timer: Send + Sync {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback);
}

/// Timer backed by a tokio runtime.
///
/// Each callback runs on its own spawned task; a panicking callback ends
/// that task and is reported through the runtime's panic handling.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    handle: Handle,
}

impl TokioTimer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Timer on the runtime the caller is running in, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Timer for TokioTimer {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
    }
}
