/// Opaque handle for a pending frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

pub type FrameCallback = Box<dyn FnOnce() + Send + 'static>;

/// Display-refresh scheduler: one callback invocation per refresh.
pub trait RefreshScheduler: Send + Sync {
    /// Run `callback` once on the next refresh.
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Cancel a pending callback. Unknown or already-fired handles are ignored.
    fn cancel_frame(&self, handle: FrameHandle);
}
