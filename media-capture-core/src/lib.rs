//! # media-capture-core
//!
//! Platform-agnostic microphone and camera capture managers.
//!
//! Provides the recorder and camera state machines, sample conversion, volume
//! metering and the per-manager event channels. Platform backends implement
//! the traits in [`traits`] and are handed to the managers at construction.
//!
//! ## Architecture
//!
//! ```text
//! media-capture-core (this crate)
//! ├── traits/       ← MicrophoneService, CameraService, AudioContext, MediaStream, RefreshScheduler
//! ├── models/       ← CaptureError, RecorderState, CameraState, configs, events
//! ├── processing/   ← i16 PCM packing, volume metering, SampleRing, LinearResampler
//! ├── session/      ← AudioRecorder, CameraManager, StartGuard, ProcessingGraph
//! └── control/      ← CameraControls (switch button model)
//! ```

pub mod control;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use control::camera_controls::CameraControls;
pub use models::config::{CameraConfig, RecorderConfig};
pub use models::error::CaptureError;
pub use models::events::{AudioEvent, CameraEvent, SampleBlock};
pub use models::facing_mode::FacingMode;
pub use models::media_models::{
    AudioConstraints, CaptureSession, ContextOptions, DeviceKind, LatencyHint, MediaDeviceInfo,
    NodeId, SessionParams, VideoConstraints,
};
pub use models::state::{CameraState, RecorderState};
pub use processing::resample::LinearResampler;
pub use processing::ring_buffer::SampleRing;
pub use session::audio_recorder::{AudioPlatform, AudioRecorder};
pub use session::camera_manager::{CameraManager, CameraSwitch};
pub use traits::audio_context::{
    AnalyserNode, AudioContext, AudioContextService, BlockCallback, BlockProcessorNode,
};
pub use traits::camera::{CameraService, DeviceEnumerator};
pub use traits::media_stream::{MediaStream, TrackEnd, TrackEndedCallback};
pub use traits::microphone::MicrophoneService;
pub use traits::refresh_scheduler::{FrameCallback, FrameHandle, RefreshScheduler};
