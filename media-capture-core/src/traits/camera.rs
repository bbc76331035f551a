use std::sync::Arc;

use async_trait::async_trait;

use crate::models::error::CaptureError;
use crate::models::media_models::{MediaDeviceInfo, VideoConstraints};
use crate::traits::media_stream::MediaStream;

/// Platform camera capture service.
#[async_trait]
pub trait CameraService: Send + Sync {
    /// Open an exclusive camera stream for the requested facing mode.
    async fn open(&self, constraints: VideoConstraints) -> Result<Arc<dyn MediaStream>, CaptureError>;
}

/// Platform device enumeration service.
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    /// List capture-capable devices.
    async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, CaptureError>;
}
