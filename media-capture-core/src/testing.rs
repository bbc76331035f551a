//! In-memory platform doubles shared by the session tests.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::models::error::CaptureError;
use crate::models::media_models::{
    AudioConstraints, ContextOptions, DeviceKind, MediaDeviceInfo, NodeId, VideoConstraints,
};
use crate::traits::audio_context::{
    AnalyserNode, AudioContext, AudioContextService, BlockCallback, BlockProcessorNode,
};
use crate::traits::camera::{CameraService, DeviceEnumerator};
use crate::traits::media_stream::{MediaStream, TrackEnd, TrackEndedCallback};
use crate::traits::microphone::MicrophoneService;
use crate::traits::refresh_scheduler::{FrameCallback, FrameHandle, RefreshScheduler};

/// Ordered record of platform calls, shared between doubles.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

pub struct FakeStream {
    id: String,
    live: AtomicUsize,
    listeners: Mutex<Vec<TrackEndedCallback>>,
    log: CallLog,
}

impl FakeStream {
    pub fn new(id: impl Into<String>, log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            live: AtomicUsize::new(1),
            listeners: Mutex::new(Vec::new()),
            log,
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.live.load(Ordering::SeqCst) == 0
    }

    /// Simulate the platform ending the track on its own.
    pub fn end(&self, reason: TrackEnd) {
        self.live.store(0, Ordering::SeqCst);
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(reason.clone());
        }
    }
}

impl MediaStream for FakeStream {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn live_track_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn stop_tracks(&self) {
        if self.live.swap(0, Ordering::SeqCst) > 0 {
            self.log.push(format!("stop {}", self.id));
        }
    }

    fn on_track_ended(&self, callback: TrackEndedCallback) {
        self.listeners.lock().push(callback);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Microphone double. `gate` holds every `open` until notified.
pub struct FakeMicrophone {
    pub available: bool,
    pub opens: AtomicUsize,
    pub failure: Mutex<Option<CaptureError>>,
    pub gate: Option<Arc<Notify>>,
    pub streams: Mutex<Vec<Arc<FakeStream>>>,
    log: CallLog,
}

impl FakeMicrophone {
    pub fn new(log: CallLog) -> Self {
        Self {
            available: true,
            opens: AtomicUsize::new(0),
            failure: Mutex::new(None),
            gate: None,
            streams: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn failing(log: CallLog, error: CaptureError) -> Self {
        let mic = Self::new(log);
        *mic.failure.lock() = Some(error);
        mic
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn unsupported(log: CallLog) -> Self {
        let mut mic = Self::new(log);
        mic.available = false;
        mic
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn last_stream(&self) -> Option<Arc<FakeStream>> {
        self.streams.lock().last().cloned()
    }
}

#[async_trait]
impl MicrophoneService for FakeMicrophone {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn open(&self, constraints: AudioConstraints) -> Result<Arc<dyn MediaStream>, CaptureError> {
        let n = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(constraints.echo_cancellation && constraints.noise_suppression && constraints.auto_gain_control);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        } else {
            tokio::task::yield_now().await;
        }
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        let stream = FakeStream::new(format!("mic-{}", n), self.log.clone());
        self.streams.lock().push(Arc::clone(&stream));
        self.log.push(format!("open mic-{}", n));
        Ok(stream)
    }
}

#[derive(Default)]
pub struct ContextFaults {
    pub create: Option<CaptureError>,
    pub connect: Option<CaptureError>,
    pub close: Option<CaptureError>,
    /// When set, `close` waits for a permit before completing.
    pub close_gate: Option<Arc<Notify>>,
}

pub struct FakeContextService {
    pub faults: Mutex<ContextFaults>,
    pub contexts: Mutex<Vec<Arc<FakeContext>>>,
    log: CallLog,
}

impl FakeContextService {
    pub fn new(log: CallLog) -> Self {
        Self {
            faults: Mutex::new(ContextFaults::default()),
            contexts: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn last_context(&self) -> Option<Arc<FakeContext>> {
        self.contexts.lock().last().cloned()
    }
}

#[async_trait]
impl AudioContextService for FakeContextService {
    async fn create(&self, options: ContextOptions) -> Result<Arc<dyn AudioContext>, CaptureError> {
        let (create, connect, close, close_gate) = {
            let faults = self.faults.lock();
            (
                faults.create.clone(),
                faults.connect.clone(),
                faults.close.clone(),
                faults.close_gate.clone(),
            )
        };
        if let Some(error) = create {
            return Err(error);
        }
        let context = Arc::new(FakeContext {
            sample_rate: options.sample_rate,
            next_id: AtomicU32::new(1),
            edges: Mutex::new(Vec::new()),
            names: Mutex::new(Vec::new()),
            processor: Arc::new(Mutex::new(None)),
            processor_id: Mutex::new(None),
            spectrum: Arc::new(Mutex::new(Vec::new())),
            resumed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            connect_fault: connect,
            close_fault: close,
            close_gate,
            log: self.log.clone(),
        });
        self.contexts.lock().push(Arc::clone(&context));
        Ok(context)
    }
}

pub struct FakeContext {
    sample_rate: f64,
    next_id: AtomicU32,
    edges: Mutex<Vec<(NodeId, NodeId)>>,
    names: Mutex<Vec<(NodeId, &'static str)>>,
    processor: Arc<Mutex<Option<BlockCallback>>>,
    processor_id: Mutex<Option<NodeId>>,
    spectrum: Arc<Mutex<Vec<u8>>>,
    resumed: AtomicBool,
    closed: AtomicBool,
    connect_fault: Option<CaptureError>,
    close_fault: Option<CaptureError>,
    close_gate: Option<Arc<Notify>>,
    log: CallLog,
}

const DESTINATION: NodeId = NodeId(0);

impl FakeContext {
    fn allocate(&self, name: &'static str) -> NodeId {
        let id = NodeId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.names.lock().push((id, name));
        id
    }

    fn name_of(&self, id: NodeId) -> &'static str {
        if id == DESTINATION {
            return "destination";
        }
        self.names
            .lock()
            .iter()
            .find(|(node, _)| *node == id)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }

    pub fn edge_count(&self) -> usize {
        self.edges.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed.load(Ordering::SeqCst)
    }

    pub fn set_spectrum(&self, bins: Vec<u8>) {
        *self.spectrum.lock() = bins;
    }

    /// Deliver one block the way the platform would: only while the processor
    /// is wired to the destination and still holds a handler.
    pub fn push_block(&self, channels: &[&[f32]]) {
        let Some(processor) = *self.processor_id.lock() else {
            return;
        };
        if !self.edges.lock().contains(&(processor, DESTINATION)) {
            return;
        }
        let callback = self.processor.lock().clone();
        if let Some(callback) = callback {
            callback(channels);
        }
    }
}

#[async_trait]
impl AudioContext for FakeContext {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        tokio::task::yield_now().await;
        self.resumed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn create_source(&self, _stream: &Arc<dyn MediaStream>) -> Result<NodeId, CaptureError> {
        Ok(self.allocate("source"))
    }

    fn create_analyser(&self, fft_size: usize) -> Result<Box<dyn AnalyserNode>, CaptureError> {
        let id = self.allocate("analyser");
        self.spectrum.lock().resize(fft_size / 2, 0);
        Ok(Box::new(FakeAnalyser {
            id,
            bins: Arc::clone(&self.spectrum),
            bin_count: fft_size / 2,
        }))
    }

    fn create_block_processor(
        &self,
        _block_size: usize,
        _input_channels: u16,
        _output_channels: u16,
        on_block: BlockCallback,
    ) -> Result<Box<dyn BlockProcessorNode>, CaptureError> {
        let id = self.allocate("processor");
        *self.processor.lock() = Some(on_block);
        *self.processor_id.lock() = Some(id);
        Ok(Box::new(FakeProcessor {
            id,
            handler: Arc::clone(&self.processor),
            log: self.log.clone(),
        }))
    }

    fn destination(&self) -> NodeId {
        DESTINATION
    }

    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), CaptureError> {
        if let Some(error) = &self.connect_fault {
            if self.name_of(to) == "destination" {
                return Err(error.clone());
            }
        }
        self.edges.lock().push((from, to));
        Ok(())
    }

    fn disconnect(&self, node: NodeId) -> Result<(), CaptureError> {
        self.edges.lock().retain(|(from, _)| *from != node);
        self.log.push(format!("disconnect {}", self.name_of(node)));
        Ok(())
    }

    async fn close(&self) -> Result<(), CaptureError> {
        if let Some(gate) = &self.close_gate {
            gate.notified().await;
        }
        tokio::task::yield_now().await;
        self.closed.store(true, Ordering::SeqCst);
        self.log.push("close context");
        match &self.close_fault {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

struct FakeAnalyser {
    id: NodeId,
    bins: Arc<Mutex<Vec<u8>>>,
    bin_count: usize,
}

impl AnalyserNode for FakeAnalyser {
    fn id(&self) -> NodeId {
        self.id
    }

    fn frequency_bin_count(&self) -> usize {
        self.bin_count
    }

    fn byte_frequency_data(&self, out: &mut [u8]) {
        let bins = self.bins.lock();
        for (slot, value) in out.iter_mut().zip(bins.iter()) {
            *slot = *value;
        }
    }
}

struct FakeProcessor {
    id: NodeId,
    handler: Arc<Mutex<Option<BlockCallback>>>,
    log: CallLog,
}

impl BlockProcessorNode for FakeProcessor {
    fn id(&self) -> NodeId {
        self.id
    }

    fn detach_handler(&self) {
        self.handler.lock().take();
        self.log.push("detach processor");
    }
}

/// Scheduler double: frames fire only when the test calls `fire`.
pub struct FakeScheduler {
    next: AtomicU64,
    pending: Mutex<Vec<(FrameHandle, FrameCallback)>>,
    log: CallLog,
}

impl FakeScheduler {
    pub fn new(log: CallLog) -> Self {
        Self {
            next: AtomicU64::new(1),
            pending: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Run every callback pending at the time of the call.
    pub fn fire(&self) {
        let due: Vec<_> = self.pending.lock().drain(..).collect();
        for (_, callback) in due {
            callback();
        }
    }
}

impl RefreshScheduler for FakeScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.next.fetch_add(1, Ordering::SeqCst));
        self.pending.lock().push((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|(h, _)| *h != handle);
        if pending.len() != before {
            self.log.push("cancel frame");
        }
    }
}

/// Camera double. Each `open` consumes the next scripted outcome; an empty
/// script means success.
pub struct FakeCamera {
    pub requests: Mutex<Vec<VideoConstraints>>,
    pub script: Mutex<VecDeque<Option<CaptureError>>>,
    pub streams: Mutex<Vec<Arc<FakeStream>>>,
    log: CallLog,
}

impl FakeCamera {
    pub fn new(log: CallLog) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            streams: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn fail_next(&self, error: CaptureError) {
        self.script.lock().push_back(Some(error));
    }

    pub fn succeed_next(&self) {
        self.script.lock().push_back(None);
    }

    pub fn open_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_stream(&self) -> Option<Arc<FakeStream>> {
        self.streams.lock().last().cloned()
    }
}

#[async_trait]
impl CameraService for FakeCamera {
    async fn open(&self, constraints: VideoConstraints) -> Result<Arc<dyn MediaStream>, CaptureError> {
        self.requests.lock().push(constraints);
        tokio::task::yield_now().await;
        let outcome = self.script.lock().pop_front().flatten();
        if let Some(error) = outcome {
            self.log.push(format!("fail {}", constraints.facing_mode));
            return Err(error);
        }
        let n = self.streams.lock().len() + 1;
        let stream = FakeStream::new(format!("cam-{}", n), self.log.clone());
        self.streams.lock().push(Arc::clone(&stream));
        self.log.push(format!("open {}", constraints.facing_mode));
        Ok(stream)
    }
}

pub struct FakeDevices {
    pub result: Result<Vec<MediaDeviceInfo>, CaptureError>,
}

impl FakeDevices {
    pub fn with_cameras(count: usize) -> Self {
        let mut devices = vec![MediaDeviceInfo::new("mic-0", "Built-in Microphone", DeviceKind::AudioInput)];
        devices.extend(
            (0..count).map(|i| MediaDeviceInfo::new(format!("cam-{}", i), format!("Camera {}", i), DeviceKind::VideoInput)),
        );
        Self { result: Ok(devices) }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(CaptureError::DeviceUnavailable("enumeration blocked".into())),
        }
    }
}

#[async_trait]
impl DeviceEnumerator for FakeDevices {
    async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, CaptureError> {
        self.result.clone()
    }
}
