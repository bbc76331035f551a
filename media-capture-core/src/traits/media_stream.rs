use std::any::Any;
use std::sync::Arc;

/// Why a platform track stopped on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEnd {
    /// The device went away or the user revoked access.
    Ended,
    /// The platform reported a hardware or driver failure.
    Failed(String),
}

/// Callback invoked when a track of a stream ends without being stopped.
///
/// May fire on a platform thread. Keep work minimal.
pub type TrackEndedCallback = Arc<dyn Fn(TrackEnd) + Send + Sync + 'static>;

/// An exclusive, stoppable media stream handed out by a capture service.
pub trait MediaStream: Send + Sync {
    fn id(&self) -> String;

    /// Number of tracks that have not been stopped or ended.
    fn live_track_count(&self) -> usize;

    /// Stop every track and release the device. Idempotent.
    ///
    /// Stopping does not invoke `on_track_ended` callbacks.
    fn stop_tracks(&self);

    /// Register a listener for tracks ending on their own.
    fn on_track_ended(&self, callback: TrackEndedCallback);

    /// Downcast hook so a backend can recognize its own streams.
    fn as_any(&self) -> &dyn Any;
}
