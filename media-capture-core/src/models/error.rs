use thiserror::Error;

use super::facing_mode::FacingMode;

/// Errors that can occur during capture operations.
///
/// `Clone` so that one in-flight start outcome can be handed to every caller
/// waiting on it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The platform denied or could not supply the capture device
    /// (permission refusal, no device, device busy, no capture support).
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A block conversion or node-wiring step failed.
    #[error("processing fault: {0}")]
    ProcessingFault(String),

    /// The platform reported that a capture track ended or failed.
    #[error("track fault: {0}")]
    TrackFault(String),

    /// The camera switch failed, but capture was restored on the original camera.
    #[error("switch to {requested} camera failed, restored {restored}: {reason}")]
    SwitchReverted {
        requested: FacingMode,
        restored: FacingMode,
        reason: String,
    },

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl CaptureError {
    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable(_))
    }
}
