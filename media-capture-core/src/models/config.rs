use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::facing_mode::FacingMode;
use super::media_models::{ContextOptions, LatencyHint, VideoConstraints};

/// Configuration for the microphone recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Processing context sample rate in Hz (default: 16000).
    pub sample_rate: f64,

    /// Frames per emitted sample block (default: 4096).
    pub block_size: usize,

    /// Analyser FFT size used for volume metering (default: 1024).
    pub fft_size: usize,

    pub latency_hint: LatencyHint,

    /// Capacity of the event channel; slow subscribers lag past this.
    pub event_capacity: usize,
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if !(self.sample_rate > 0.0) {
            return Err(CaptureError::ConfigurationFailed(
                "sample rate must be positive".into(),
            ));
        }
        if !self.block_size.is_power_of_two() || !(256..=16384).contains(&self.block_size) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "unsupported block size: {}",
                self.block_size
            )));
        }
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "unsupported fft size: {}",
                self.fft_size
            )));
        }
        if self.event_capacity == 0 {
            return Err(CaptureError::ConfigurationFailed(
                "event capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            sample_rate: self.sample_rate,
            latency_hint: self.latency_hint,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000.0,
            block_size: 4096,
            fft_size: 1024,
            latency_hint: LatencyHint::Interactive,
            event_capacity: 64,
        }
    }
}

/// Configuration for the camera manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera selected before the first switch (default: front).
    pub initial_facing: FacingMode,

    pub ideal_width: u32,
    pub ideal_height: u32,

    pub event_capacity: usize,
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.ideal_width == 0 || self.ideal_height == 0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "unsupported resolution hint: {}x{}",
                self.ideal_width, self.ideal_height
            )));
        }
        if self.event_capacity == 0 {
            return Err(CaptureError::ConfigurationFailed(
                "event capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Constraints for `facing` with this config's resolution hints.
    pub fn constraints(&self, facing: FacingMode) -> VideoConstraints {
        VideoConstraints {
            facing_mode: facing,
            ideal_width: Some(self.ideal_width),
            ideal_height: Some(self.ideal_height),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            initial_facing: FacingMode::User,
            ideal_width: 1280,
            ideal_height: 720,
            event_capacity: 16,
        }
    }
}
