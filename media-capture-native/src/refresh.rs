//! Display-refresh scheduler driven by tokio timers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use media_capture_core::models::error::CaptureError;
use media_capture_core::traits::refresh_scheduler::{FrameCallback, FrameHandle, RefreshScheduler};

/// One frame at 60 Hz.
pub const FRAME_PERIOD: Duration = Duration::from_micros(16_667);

/// Runs each requested frame callback once, one period after the request.
pub struct TokioRefreshScheduler {
    runtime: Handle,
    period: Duration,
    next: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl TokioRefreshScheduler {
    /// Bind to the current tokio runtime at the default frame period.
    pub fn new() -> Result<Self, CaptureError> {
        Self::with_period(FRAME_PERIOD)
    }

    pub fn with_period(period: Duration) -> Result<Self, CaptureError> {
        let runtime = Handle::try_current().map_err(|e| {
            CaptureError::ConfigurationFailed(format!("refresh scheduler needs a tokio runtime: {}", e))
        })?;
        Ok(Self {
            runtime,
            period,
            next: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl RefreshScheduler for TokioRefreshScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        let period = self.period;
        let pending = Arc::clone(&self.pending);

        // Insert under the lock so the task cannot finish before it is tracked.
        let mut tasks = self.pending.lock();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(period).await;
            if pending.lock().remove(&id).is_some() {
                callback();
            }
        });
        tasks.insert(id, task);
        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if let Some(task) = self.pending.lock().remove(&handle.0) {
            task.abort();
        }
    }
}

impl Drop for TokioRefreshScheduler {
    fn drop(&mut self) {
        for (_, task) in self.pending.lock().drain() {
            task.abort();
        }
    }
}
