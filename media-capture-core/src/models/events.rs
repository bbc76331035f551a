use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};

use super::error::CaptureError;
use super::state::{CameraState, RecorderState};

/// One emitted block of packed signed 16-bit little-endian samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBlock {
    bytes: Arc<[u8]>,
}

impl SampleBlock {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of samples in the block.
    pub fn frames(&self) -> usize {
        self.bytes.len() / 2
    }

    /// Decoded sample values.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Standard base64 of the packed bytes, the wire form most endpoints expect.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Events emitted by the microphone recorder.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    Data(SampleBlock),
    Volume(f32),
    Error(CaptureError),
    State(RecorderState),
}

impl AudioEvent {
    /// Name of the channel this event is published on.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Volume(_) => "volume",
            Self::Error(_) => "error",
            Self::State(_) => "state",
        }
    }
}

/// Events emitted by the camera manager.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraEvent {
    Error(CaptureError),
    State(CameraState),
}

impl CameraEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::State(_) => "state",
        }
    }
}
