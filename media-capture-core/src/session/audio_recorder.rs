use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::config::RecorderConfig;
use crate::models::error::CaptureError;
use crate::models::events::AudioEvent;
use crate::models::media_models::{AudioConstraints, CaptureSession, SessionParams};
use crate::models::state::RecorderState;
use crate::processing::{pcm, volume};
use crate::session::emitter::EventEmitter;
use crate::session::processing_graph::ProcessingGraph;
use crate::session::start_guard::StartGuard;
use crate::traits::audio_context::{AudioContext, AudioContextService, BlockCallback};
use crate::traits::media_stream::{MediaStream, TrackEnd};
use crate::traits::microphone::MicrophoneService;
use crate::traits::refresh_scheduler::{FrameHandle, RefreshScheduler};

/// Platform services the recorder drives.
#[derive(Clone)]
pub struct AudioPlatform {
    pub microphone: Arc<dyn MicrophoneService>,
    pub contexts: Arc<dyn AudioContextService>,
    pub scheduler: Arc<dyn RefreshScheduler>,
}

/// Everything acquired for one recording, protected by `parking_lot::Mutex`.
///
/// Never held across an await.
#[derive(Default)]
struct Resources {
    state: RecorderState,
    session: Option<CaptureSession>,
    stream: Option<Arc<dyn MediaStream>>,
    context: Option<Arc<dyn AudioContext>>,
    graph: Option<ProcessingGraph>,
    volume_frame: Option<FrameHandle>,
    spectrum: Vec<u8>,
}

struct RecorderInner {
    config: RecorderConfig,
    platform: AudioPlatform,
    events: EventEmitter<AudioEvent>,
    // Read from the audio thread on every block.
    recording: Arc<AtomicBool>,
    starting: StartGuard<Result<(), CaptureError>>,
    // Held for the whole of a release; starts wait on it before deciding.
    releasing: tokio::sync::Mutex<()>,
    resources: Mutex<Resources>,
}

/// Microphone recorder.
///
/// Owns the microphone stream and the processing graph while recording and
/// publishes `data`, `volume`, `error` and `state` events:
/// ```text
/// [Microphone] → [source] ─┬→ [analyser] ··· refresh tick ··→ volume
///                          └→ [block processor] → i16 LE → data
/// ```
///
/// Cloning yields another handle to the same recorder.
#[derive(Clone)]
pub struct AudioRecorder {
    inner: Arc<RecorderInner>,
}

impl AudioRecorder {
    pub fn new(config: RecorderConfig, platform: AudioPlatform) -> Result<Self, CaptureError> {
        config.validate()?;
        let events = EventEmitter::new(config.event_capacity);
        Ok(Self {
            inner: Arc::new(RecorderInner {
                config,
                platform,
                events,
                recording: Arc::new(AtomicBool::new(false)),
                starting: StartGuard::new(),
                releasing: tokio::sync::Mutex::new(()),
                resources: Mutex::new(Resources::default()),
            }),
        })
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.inner.config
    }

    pub fn state(&self) -> RecorderState {
        self.inner.resources.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.inner.recording.load(Ordering::SeqCst)
    }

    /// The active session, if recording.
    pub fn session(&self) -> Option<CaptureSession> {
        self.inner.resources.lock().session.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.inner.events.subscribe()
    }

    /// Start recording.
    ///
    /// Concurrent calls collapse onto one acquisition and all see its outcome.
    /// Already recording is a no-op success. A release in progress finishes
    /// before a new acquisition begins. On failure every partially acquired
    /// resource is released before the error is returned.
    pub async fn start(&self) -> Result<(), CaptureError> {
        if !self.inner.platform.microphone.is_available() {
            return Err(CaptureError::DeviceUnavailable(
                "microphone capture is not supported".into(),
            ));
        }
        drop(self.inner.releasing.lock().await);

        let inner = Arc::clone(&self.inner);
        let pending = self.inner.starting.run_or_join(move || {
            if inner.resources.lock().state.is_recording() {
                return None;
            }
            Some(async move { inner.acquire().await })
        });

        match pending {
            Some(pending) => pending.await,
            None => Ok(()),
        }
    }

    /// Stop recording and release everything. Safe from any state.
    ///
    /// A start in flight is allowed to settle first; whatever it acquired is
    /// then released.
    pub async fn stop(&self) {
        if let Some(pending) = self.inner.starting.pending() {
            let _ = pending.await;
        }
        if self.inner.cleanup().await {
            log::info!("Audio recording stopped");
        }
    }
}

impl RecorderInner {
    async fn acquire(self: Arc<Self>) -> Result<(), CaptureError> {
        self.set_state(RecorderState::Starting);
        match self.build_session().await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("Error starting audio recording: {}", e);
                self.cleanup().await;
                Err(e)
            }
        }
    }

    async fn build_session(self: &Arc<Self>) -> Result<(), CaptureError> {
        let stream = self
            .platform
            .microphone
            .open(AudioConstraints::default())
            .await?;
        self.resources.lock().stream = Some(Arc::clone(&stream));

        let context = self
            .platform
            .contexts
            .create(self.config.context_options())
            .await?;
        self.resources.lock().context = Some(Arc::clone(&context));
        context.resume().await?;

        let graph = ProcessingGraph::build(
            Arc::clone(&context),
            &stream,
            &self.config,
            self.block_handler(),
        )?;
        let bins = graph
            .analyser()
            .map(|a| a.frequency_bin_count())
            .unwrap_or_default();
        let session = CaptureSession::new(
            stream.id(),
            SessionParams::Audio {
                sample_rate: context.sample_rate(),
            },
        );
        let session_id = session.id;

        {
            let mut res = self.resources.lock();
            res.graph = Some(graph);
            res.spectrum = vec![0; bins];
            res.session = Some(session);
        }
        self.recording.store(true, Ordering::SeqCst);
        self.set_state(RecorderState::Recording);

        self.watch_tracks(&stream, session_id);
        self.schedule_volume_tick();

        log::info!(
            "Audio recording started: stream {} at {} Hz, {}-frame blocks",
            stream.id(),
            context.sample_rate(),
            self.config.block_size
        );
        Ok(())
    }

    /// Per-block conversion, run on the platform audio thread.
    ///
    /// A block that fails to convert is dropped and reported; the session
    /// keeps running.
    fn block_handler(&self) -> BlockCallback {
        let recording = Arc::clone(&self.recording);
        let events = self.events.sender();
        Arc::new(move |channels: &[&[f32]]| {
            if !recording.load(Ordering::SeqCst) {
                return;
            }
            match pcm::encode_block(channels) {
                Ok(block) => {
                    let _ = events.send(AudioEvent::Data(block));
                }
                Err(e) => {
                    log::error!("Error processing audio: {}", e);
                    let _ = events.send(AudioEvent::Error(e));
                }
            }
        })
    }

    fn watch_tracks(self: &Arc<Self>, stream: &Arc<dyn MediaStream>, session_id: Uuid) {
        let weak = Arc::downgrade(self);
        let runtime = tokio::runtime::Handle::try_current().ok();
        stream.on_track_ended(Arc::new(move |end: TrackEnd| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match &runtime {
                Some(runtime) => {
                    runtime.spawn(inner.handle_track_end(session_id, end));
                }
                None => log::warn!("Microphone track ended with no runtime to clean up on"),
            }
        }));
    }

    async fn handle_track_end(self: Arc<Self>, session_id: Uuid, end: TrackEnd) {
        let current = self.resources.lock().session.as_ref().map(|s| s.id);
        if current != Some(session_id) {
            log::debug!("Ignoring track end from a previous session");
            return;
        }

        let fault = CaptureError::TrackFault(match end {
            TrackEnd::Ended => "microphone track ended".into(),
            TrackEnd::Failed(reason) => reason,
        });
        log::warn!("Microphone track stopped, releasing session: {}", fault);
        self.events.emit(AudioEvent::Error(fault));
        self.cleanup().await;
    }

    fn schedule_volume_tick(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let handle = self.platform.scheduler.request_frame(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.volume_tick();
            }
        }));

        let mut res = self.resources.lock();
        if self.recording.load(Ordering::SeqCst) {
            res.volume_frame = Some(handle);
        } else {
            drop(res);
            self.platform.scheduler.cancel_frame(handle);
        }
    }

    fn volume_tick(self: Arc<Self>) {
        if !self.recording.load(Ordering::SeqCst) {
            return;
        }
        let level = {
            let mut res = self.resources.lock();
            res.volume_frame = None;
            let Resources { graph, spectrum, .. } = &mut *res;
            let Some(analyser) = graph.as_ref().and_then(|g| g.analyser()) else {
                return;
            };
            analyser.byte_frequency_data(spectrum);
            volume::volume_from_spectrum(spectrum)
        };
        self.events.emit(AudioEvent::Volume(level));
        self.schedule_volume_tick();
    }

    /// Release everything in reverse acquisition order: metering, processor,
    /// analyser, source, tracks, context. Returns whether anything was held.
    ///
    /// The state leaves `Recording` as soon as the resources are taken, before
    /// the context close is awaited.
    async fn cleanup(&self) -> bool {
        let _release = self.releasing.lock().await;
        self.recording.store(false, Ordering::SeqCst);

        let (frame, graph, stream, context) = {
            let mut res = self.resources.lock();
            res.session = None;
            (
                res.volume_frame.take(),
                res.graph.take(),
                res.stream.take(),
                res.context.take(),
            )
        };
        let held = graph.is_some() || stream.is_some() || context.is_some();
        self.set_state(RecorderState::Idle);

        if let Some(handle) = frame {
            self.platform.scheduler.cancel_frame(handle);
        }
        if let Some(mut graph) = graph {
            graph.teardown();
        }
        if let Some(stream) = stream {
            stream.stop_tracks();
        }
        if let Some(context) = context {
            if let Err(e) = context.close().await {
                log::error!("Error closing audio context: {}", e);
            }
        }
        held
    }

    fn set_state(&self, state: RecorderState) {
        let changed = {
            let mut res = self.resources.lock();
            std::mem::replace(&mut res.state, state) != state
        };
        if changed {
            log::debug!("Recorder state -> {}", state.as_str());
            self.events.emit(AudioEvent::State(state));
        }
    }
}

impl Drop for RecorderInner {
    fn drop(&mut self) {
        let res = self.resources.get_mut();
        if let Some(handle) = res.volume_frame.take() {
            self.platform.scheduler.cancel_frame(handle);
        }
        res.graph.take();
        if let Some(stream) = res.stream.take() {
            stream.stop_tracks();
        }
        if let Some(context) = res.context.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        if let Err(e) = context.close().await {
                            log::error!("Error closing audio context: {}", e);
                        }
                    });
                }
                Err(_) => log::warn!("Audio recorder dropped while recording; context left open"),
            }
        }
    }
}
