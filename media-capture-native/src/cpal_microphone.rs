//! cpal microphone capture service.
//!
//! Opens an input device in its default configuration and delivers
//! interleaved f32 samples to the sinks registered on the returned stream.
//! The cpal stream lives on a dedicated thread for its whole lifetime.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use media_capture_core::models::error::CaptureError;
use media_capture_core::models::media_models::AudioConstraints;
use media_capture_core::traits::media_stream::{MediaStream, TrackEnd, TrackEndedCallback};
use media_capture_core::traits::microphone::MicrophoneService;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

static NEXT_STREAM: AtomicU64 = AtomicU64::new(1);

/// Receives interleaved device-rate samples on the cpal callback thread.
pub(crate) type SampleSink = Arc<dyn Fn(&[f32]) + Send + Sync + 'static>;

/// Device format negotiated when the stream was opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub channels: u16,
}

/// Microphone capture through the default cpal host.
pub struct CpalMicrophone {
    device_name: Option<String>,
}

impl CpalMicrophone {
    /// Capture from the system default input device.
    pub fn default_device() -> Self {
        Self { device_name: None }
    }

    /// Capture from the input device with this exact name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }
}

#[async_trait]
impl MicrophoneService for CpalMicrophone {
    fn is_available(&self) -> bool {
        cpal::default_host()
            .input_devices()
            .map(|mut devices| devices.next().is_some())
            .unwrap_or(false)
    }

    async fn open(&self, constraints: AudioConstraints) -> Result<Arc<dyn MediaStream>, CaptureError> {
        if constraints.echo_cancellation || constraints.noise_suppression || constraints.auto_gain_control {
            log::debug!("cpal has no input DSP; capturing the raw device signal");
        }

        let shared = Arc::new(StreamShared::new());
        let (ready_tx, ready_rx) = oneshot::channel();
        let device_name = self.device_name.clone();
        let thread_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("cpal-mic-capture".into())
            .spawn(move || capture_loop(device_name, thread_shared, ready_tx))
            .map_err(|e| CaptureError::DeviceUnavailable(format!("failed to spawn mic thread: {}", e)))?;

        let opened = ready_rx
            .await
            .map_err(|_| CaptureError::DeviceUnavailable("mic thread exited before opening".into()))
            .and_then(|result| result);
        let (label, format) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                shared.running.store(false, Ordering::SeqCst);
                join_capture_thread(handle);
                return Err(e);
            }
        };

        let id = format!("cpal-mic-{}", NEXT_STREAM.fetch_add(1, Ordering::SeqCst));
        log::info!(
            "Opened microphone '{}' as {}: {} Hz, {} channel(s)",
            label,
            id,
            format.sample_rate,
            format.channels
        );
        Ok(Arc::new(CpalStream {
            id,
            label,
            format,
            shared,
            thread: Mutex::new(Some(handle)),
        }))
    }
}

/// State shared between a [`CpalStream`] and its capture thread.
struct StreamShared {
    running: AtomicBool,
    ended: AtomicBool,
    next_sink: AtomicU64,
    sinks: Mutex<Vec<(u64, SampleSink)>>,
    listeners: Mutex<Vec<TrackEndedCallback>>,
}

impl StreamShared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            ended: AtomicBool::new(false),
            next_sink: AtomicU64::new(1),
            sinks: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn deliver(&self, interleaved: &[f32]) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let sinks: Vec<SampleSink> = self.sinks.lock().iter().map(|(_, s)| Arc::clone(s)).collect();
        for sink in sinks {
            sink(interleaved);
        }
    }

    /// Report the track as ended. Only the first report while running counts.
    fn end(&self, reason: TrackEnd) {
        if !self.running.load(Ordering::SeqCst) || self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(reason.clone());
        }
    }
}

/// A live cpal input stream.
pub struct CpalStream {
    id: String,
    label: String,
    format: StreamFormat,
    shared: Arc<StreamShared>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalStream {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub(crate) fn add_sink(&self, sink: SampleSink) -> u64 {
        let id = self.shared.next_sink.fetch_add(1, Ordering::SeqCst);
        self.shared.sinks.lock().push((id, sink));
        id
    }

    pub(crate) fn remove_sink(&self, id: u64) {
        self.shared.sinks.lock().retain(|(sink, _)| *sink != id);
    }

    /// A stream with no device behind it; samples arrive through `deliver`.
    #[cfg(test)]
    pub(crate) fn detached(sample_rate: f64, channels: u16) -> Arc<Self> {
        Arc::new(Self {
            id: format!("cpal-mic-{}", NEXT_STREAM.fetch_add(1, Ordering::SeqCst)),
            label: "test input".into(),
            format: StreamFormat {
                sample_rate,
                channels,
            },
            shared: Arc::new(StreamShared::new()),
            thread: Mutex::new(None),
        })
    }

    #[cfg(test)]
    pub(crate) fn deliver(&self, interleaved: &[f32]) {
        self.shared.deliver(interleaved);
    }

    #[cfg(test)]
    pub(crate) fn sink_count(&self) -> usize {
        self.shared.sinks.lock().len()
    }
}

impl MediaStream for CpalStream {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn live_track_count(&self) -> usize {
        let live = self.shared.running.load(Ordering::SeqCst) && !self.shared.ended.load(Ordering::SeqCst);
        usize::from(live)
    }

    fn stop_tracks(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.thread.lock().take() {
            join_capture_thread(handle);
        }
        log::debug!("Stopped microphone stream {}", self.id);
    }

    fn on_track_ended(&self, callback: TrackEndedCallback) {
        self.shared.listeners.lock().push(callback);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

/// Wait for a signalled capture thread to exit. Inside a tokio runtime the
/// wait moves to the blocking pool so async workers are never parked on it.
fn join_capture_thread(handle: thread::JoinHandle<()>) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(move || {
                if handle.join().is_err() {
                    log::error!("Microphone capture thread panicked");
                }
            });
        }
        Err(_) => {
            if handle.join().is_err() {
                log::error!("Microphone capture thread panicked");
            }
        }
    }
}

/// Capture thread body.
///
/// Sequence:
/// 1. Resolve the device (default or by name)
/// 2. Read its default input config
/// 3. Build and play an input stream in the device's sample format
/// 4. Report the negotiated format, then park until stopped
fn capture_loop(
    device_name: Option<String>,
    shared: Arc<StreamShared>,
    ready: oneshot::Sender<Result<(String, StreamFormat), CaptureError>>,
) {
    let stream = match open_input(device_name.as_deref(), &shared) {
        Ok((stream, label, format)) => {
            if ready.send(Ok((label, format))).is_err() {
                return;
            }
            stream
        }
        Err(e) => {
            log::error!("Mic capture error: {}", e);
            let _ = ready.send(Err(e));
            return;
        }
    };

    while shared.running.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
    }
    drop(stream);
}

fn open_input(
    device_name: Option<&str>,
    shared: &Arc<StreamShared>,
) -> Result<(cpal::Stream, String, StreamFormat), CaptureError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceUnavailable(format!("no input device named '{}'", name)))?,
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no default input device".into()))?,
    };
    let label = device.name().unwrap_or_else(|_| "unknown input".into());

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceUnavailable(format!("default input config: {}", e)))?;
    let format = StreamFormat {
        sample_rate: f64::from(supported.sample_rate().0),
        channels: supported.channels(),
    };
    let config = supported.config();

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_input::<f32>(&device, &config, shared),
        SampleFormat::I16 => build_input::<i16>(&device, &config, shared),
        SampleFormat::U16 => build_input::<u16>(&device, &config, shared),
        SampleFormat::I32 => build_input::<i32>(&device, &config, shared),
        other => Err(CaptureError::DeviceUnavailable(format!(
            "unsupported sample format {:?}",
            other
        ))),
    }?;

    stream
        .play()
        .map_err(|e| CaptureError::DeviceUnavailable(format!("failed to start input stream: {}", e)))?;
    Ok((stream, label, format))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: &Arc<StreamShared>,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let data_shared = Arc::clone(shared);
    let error_shared = Arc::clone(shared);
    let mut converted: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                converted.clear();
                converted.extend(data.iter().map(|s| s.to_sample::<f32>()));
                data_shared.deliver(&converted);
            },
            move |err| {
                log::error!("Input stream error: {}", err);
                let reason = match err {
                    cpal::StreamError::DeviceNotAvailable => TrackEnd::Ended,
                    other => TrackEnd::Failed(other.to_string()),
                };
                error_shared.end(reason);
            },
            None,
        )
        .map_err(|e| CaptureError::DeviceUnavailable(format!("failed to build input stream: {}", e)))
}
