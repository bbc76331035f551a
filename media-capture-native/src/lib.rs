//! # media-capture-native
//!
//! Native backend for media-capture-core built on cpal and tokio.
//!
//! Provides:
//! - `CpalMicrophone`: Microphone capture via the default cpal host
//! - `SoftwareContextService`: In-process audio graph with FFT analyser and block processor
//! - `TokioRefreshScheduler`: ~60 Hz frame callbacks on the tokio runtime
//! - `CpalDeviceEnumerator`: Audio input/output device listing
//!
//! There is no camera backend; cpal only reaches audio endpoints.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use media_capture_core::{AudioPlatform, AudioRecorder, RecorderConfig};
//! use media_capture_native::{CpalMicrophone, SoftwareContextService, TokioRefreshScheduler};
//!
//! let recorder = AudioRecorder::new(
//!     RecorderConfig::default(),
//!     AudioPlatform {
//!         microphone: Arc::new(CpalMicrophone::default_device()),
//!         contexts: Arc::new(SoftwareContextService),
//!         scheduler: Arc::new(TokioRefreshScheduler::new()?),
//!     },
//! )?;
//! recorder.start().await?;
//! ```

pub mod analyser;
pub mod cpal_microphone;
pub mod device_enumerator;
pub mod refresh;
pub mod software_context;

pub use analyser::SpectrumAnalyser;
pub use cpal_microphone::{CpalMicrophone, CpalStream, StreamFormat};
pub use device_enumerator::CpalDeviceEnumerator;
pub use refresh::TokioRefreshScheduler;
pub use software_context::{SoftwareContext, SoftwareContextService};
