use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::facing_mode::FacingMode;

/// Kind of a capture-capable device as reported by enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

/// A device reported by the platform's device enumeration service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub id: String,
    pub label: String,
    pub kind: DeviceKind,
}

impl MediaDeviceInfo {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }
}

/// Conditioning applied by the platform when opening a microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Requested camera and resolution hints.
///
/// `ideal_width`/`ideal_height` are hints; the platform may pick the nearest
/// supported resolution. `None` leaves the choice to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub facing_mode: FacingMode,
    pub ideal_width: Option<u32>,
    pub ideal_height: Option<u32>,
}

impl VideoConstraints {
    /// Facing mode only, no resolution hints.
    pub fn facing_only(facing_mode: FacingMode) -> Self {
        Self {
            facing_mode,
            ideal_width: None,
            ideal_height: None,
        }
    }
}

/// Latency trade-off requested from the processing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyHint {
    #[default]
    Interactive,
    Balanced,
    Playback,
}

/// Options for creating an audio processing context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextOptions {
    pub sample_rate: f64,
    pub latency_hint: LatencyHint,
}

/// Identifier of a node inside a processing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Device-config parameters a session was opened with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionParams {
    Audio { sample_rate: f64 },
    Video(VideoConstraints),
}

/// Snapshot of one active acquisition from a platform device.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSession {
    pub id: Uuid,
    pub stream_id: String,
    pub started_at: DateTime<Utc>,
    pub params: SessionParams,
}

impl CaptureSession {
    pub fn new(stream_id: impl Into<String>, params: SessionParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream_id: stream_id.into(),
            started_at: Utc::now(),
            params,
        }
    }
}
