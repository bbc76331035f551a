use std::sync::Arc;

use async_trait::async_trait;

use crate::models::error::CaptureError;
use crate::models::media_models::AudioConstraints;
use crate::traits::media_stream::MediaStream;

/// Platform microphone capture service.
#[async_trait]
pub trait MicrophoneService: Send + Sync {
    /// Whether the platform supports microphone capture at all.
    fn is_available(&self) -> bool;

    /// Open an exclusive microphone stream.
    ///
    /// Fails with `DeviceUnavailable` on permission refusal, absence, or a
    /// busy device.
    async fn open(&self, constraints: AudioConstraints) -> Result<Arc<dyn MediaStream>, CaptureError>;
}
