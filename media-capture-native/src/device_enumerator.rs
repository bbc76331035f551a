//! Audio device enumeration through the default cpal host.
//!
//! cpal exposes audio endpoints only; video inputs are never reported, so a
//! camera manager fed by this enumerator sees a single-camera inventory.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};

use media_capture_core::models::error::CaptureError;
use media_capture_core::models::media_models::{DeviceKind, MediaDeviceInfo};
use media_capture_core::traits::camera::DeviceEnumerator;

/// Lists cpal input and output devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDeviceEnumerator;

impl CpalDeviceEnumerator {
    /// List active capture (microphone) devices.
    pub fn list_capture_devices(&self) -> Result<Vec<MediaDeviceInfo>, CaptureError> {
        let devices = cpal::default_host()
            .input_devices()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("input devices: {}", e)))?;
        Ok(describe(devices, DeviceKind::AudioInput))
    }

    /// List active render (output) devices.
    pub fn list_render_devices(&self) -> Result<Vec<MediaDeviceInfo>, CaptureError> {
        let devices = cpal::default_host()
            .output_devices()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("output devices: {}", e)))?;
        Ok(describe(devices, DeviceKind::AudioOutput))
    }

    /// Name of the default input device, if any.
    pub fn default_capture_device_name(&self) -> Option<String> {
        cpal::default_host()
            .default_input_device()
            .and_then(|d| d.name().ok())
    }
}

fn describe(devices: impl Iterator<Item = cpal::Device>, kind: DeviceKind) -> Vec<MediaDeviceInfo> {
    let prefix = match kind {
        DeviceKind::AudioInput => "input",
        DeviceKind::AudioOutput => "output",
        DeviceKind::VideoInput => "video",
    };
    devices
        .enumerate()
        .map(|(index, device)| {
            let label = device.name().unwrap_or_default();
            let id = if label.is_empty() {
                format!("{}:{}", prefix, index)
            } else {
                format!("{}:{}", prefix, label)
            };
            MediaDeviceInfo::new(id, label, kind)
        })
        .collect()
}

#[async_trait]
impl DeviceEnumerator for CpalDeviceEnumerator {
    async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, CaptureError> {
        let this = *self;
        tokio::task::spawn_blocking(move || -> Result<Vec<MediaDeviceInfo>, CaptureError> {
            let mut devices = this.list_capture_devices()?;
            match this.list_render_devices() {
                Ok(outputs) => devices.extend(outputs),
                Err(e) => log::warn!("Error listing output devices: {}", e),
            }
            Ok(devices)
        })
        .await
        .map_err(|e| CaptureError::DeviceUnavailable(format!("device enumeration panicked: {}", e)))?
    }
}
