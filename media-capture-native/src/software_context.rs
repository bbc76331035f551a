//! In-process audio graph fed by cpal streams.
//!
//! ```text
//! CpalStream ─sink─→ [source: downmix + resample] ─┬→ [analyser]
//!                                                  └→ [processor] → [destination]
//! ```
//!
//! Samples flow on the cpal callback thread. A processor only receives
//! samples while it is connected to the destination and the context is
//! running.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;

use media_capture_core::models::error::CaptureError;
use media_capture_core::models::media_models::{ContextOptions, NodeId};
use media_capture_core::processing::resample::{downmix_to_mono, LinearResampler};
use media_capture_core::processing::ring_buffer::SampleRing;
use media_capture_core::traits::audio_context::{
    AnalyserNode, AudioContext, AudioContextService, BlockCallback, BlockProcessorNode,
};
use media_capture_core::traits::media_stream::MediaStream;

use crate::analyser::SpectrumAnalyser;
use crate::cpal_microphone::CpalStream;

const DESTINATION: NodeId = NodeId(0);

/// Creates [`SoftwareContext`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareContextService;

#[async_trait]
impl AudioContextService for SoftwareContextService {
    async fn create(&self, options: ContextOptions) -> Result<Arc<dyn AudioContext>, CaptureError> {
        if options.sample_rate <= 0.0 {
            return Err(CaptureError::ProcessingFault(format!(
                "invalid context sample rate {}",
                options.sample_rate
            )));
        }
        log::debug!(
            "Creating software context at {} Hz ({:?} latency)",
            options.sample_rate,
            options.latency_hint
        );
        Ok(Arc::new(SoftwareContext::new(options.sample_rate)))
    }
}

enum Node {
    Source {
        stream: Arc<dyn MediaStream>,
        sink: u64,
    },
    Analyser(Arc<Mutex<SpectrumAnalyser>>),
    Processor(Arc<BlockAccumulator>),
}

enum Target {
    Analyser(Arc<Mutex<SpectrumAnalyser>>),
    Processor(Arc<BlockAccumulator>),
}

#[derive(Default)]
struct Graph {
    next_id: u32,
    nodes: HashMap<NodeId, Node>,
    edges: Vec<(NodeId, NodeId)>,
}

impl Graph {
    fn allocate(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    fn contains(&self, id: NodeId) -> bool {
        id == DESTINATION || self.nodes.contains_key(&id)
    }

    /// Nodes reached from `from` that currently accept samples.
    fn targets(&self, from: NodeId) -> Vec<Target> {
        self.edges
            .iter()
            .filter(|(source, _)| *source == from)
            .filter_map(|(_, to)| match self.nodes.get(to) {
                Some(Node::Analyser(analyser)) => Some(Target::Analyser(Arc::clone(analyser))),
                Some(Node::Processor(processor)) if self.edges.contains(&(*to, DESTINATION)) => {
                    Some(Target::Processor(Arc::clone(processor)))
                }
                _ => None,
            })
            .collect()
    }
}

/// Graph state reachable from stream sinks.
struct Router {
    graph: Mutex<Graph>,
    running: AtomicBool,
    closed: AtomicBool,
}

impl Router {
    fn route(&self, from: NodeId, samples: &[f32]) {
        if !self.running.load(Ordering::SeqCst) || samples.is_empty() {
            return;
        }
        let targets = self.graph.lock().targets(from);
        for target in targets {
            match target {
                Target::Analyser(analyser) => analyser.lock().push(samples),
                Target::Processor(processor) => processor.push(samples),
            }
        }
    }

    fn ensure_open(&self) -> Result<(), CaptureError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CaptureError::ProcessingFault("context is closed".into()));
        }
        Ok(())
    }

    /// Unhook every source from its stream and drop all nodes.
    fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let nodes: Vec<Node> = {
            let mut graph = self.graph.lock();
            graph.edges.clear();
            graph.nodes.drain().map(|(_, node)| node).collect()
        };
        for node in nodes {
            match node {
                Node::Source { stream, sink } => {
                    if let Some(cpal) = stream.as_any().downcast_ref::<CpalStream>() {
                        cpal.remove_sink(sink);
                    }
                }
                Node::Processor(processor) => processor.detach(),
                Node::Analyser(_) => {}
            }
        }
    }
}

/// Chops the incoming mono signal into fixed-size blocks for a handler.
struct BlockAccumulator {
    block_size: usize,
    pending: Mutex<SampleRing>,
    handler: Mutex<Option<BlockCallback>>,
}

impl BlockAccumulator {
    fn new(block_size: usize, handler: BlockCallback) -> Self {
        Self {
            block_size,
            pending: Mutex::new(SampleRing::new(block_size * 4)),
            handler: Mutex::new(Some(handler)),
        }
    }

    fn push(&self, samples: &[f32]) {
        self.pending.lock().push(samples);
        loop {
            let Some(block) = self.pending.lock().pop_exact(self.block_size) else {
                break;
            };
            let handler = self.handler.lock().clone();
            match handler {
                Some(handler) => handler(&[&block]),
                None => {
                    self.pending.lock().clear();
                    break;
                }
            }
        }
    }

    fn detach(&self) {
        self.handler.lock().take();
    }
}

/// A processing context running entirely in software.
pub struct SoftwareContext {
    sample_rate: f64,
    router: Arc<Router>,
}

impl SoftwareContext {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            router: Arc::new(Router {
                graph: Mutex::new(Graph::default()),
                running: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.router.running.load(Ordering::SeqCst)
    }

    pub fn edge_count(&self) -> usize {
        self.router.graph.lock().edges.len()
    }
}

#[async_trait]
impl AudioContext for SoftwareContext {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        self.router.ensure_open()?;
        self.router.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn create_source(&self, stream: &Arc<dyn MediaStream>) -> Result<NodeId, CaptureError> {
        self.router.ensure_open()?;
        let cpal = stream.as_any().downcast_ref::<CpalStream>().ok_or_else(|| {
            CaptureError::ProcessingFault(format!("stream {} is not a cpal stream", stream.id()))
        })?;

        let id = self.router.graph.lock().allocate();
        let format = cpal.format();
        let channels = usize::from(format.channels);
        let resampler = Mutex::new(LinearResampler::new(format.sample_rate, self.sample_rate));
        let router: Weak<Router> = Arc::downgrade(&self.router);

        let sink = cpal.add_sink(Arc::new(move |interleaved: &[f32]| {
            let Some(router) = router.upgrade() else {
                return;
            };
            let mono = downmix_to_mono(interleaved, channels);
            let resampled = resampler.lock().process(&mono);
            router.route(id, &resampled);
        }));

        self.router.graph.lock().nodes.insert(
            id,
            Node::Source {
                stream: Arc::clone(stream),
                sink,
            },
        );
        log::debug!(
            "Source {} resampling {} Hz x{} -> {} Hz",
            id,
            format.sample_rate,
            format.channels,
            self.sample_rate
        );
        Ok(id)
    }

    fn create_analyser(&self, fft_size: usize) -> Result<Box<dyn AnalyserNode>, CaptureError> {
        self.router.ensure_open()?;
        let core = Arc::new(Mutex::new(SpectrumAnalyser::new(fft_size)?));
        let mut graph = self.router.graph.lock();
        let id = graph.allocate();
        graph.nodes.insert(id, Node::Analyser(Arc::clone(&core)));
        Ok(Box::new(SoftwareAnalyser {
            id,
            bins: fft_size / 2,
            core,
        }))
    }

    fn create_block_processor(
        &self,
        block_size: usize,
        input_channels: u16,
        output_channels: u16,
        on_block: BlockCallback,
    ) -> Result<Box<dyn BlockProcessorNode>, CaptureError> {
        self.router.ensure_open()?;
        if block_size == 0 {
            return Err(CaptureError::ProcessingFault("block size must be non-zero".into()));
        }
        if input_channels != 1 || output_channels > 1 {
            return Err(CaptureError::ProcessingFault(format!(
                "unsupported processor layout {} in / {} out",
                input_channels, output_channels
            )));
        }
        let core = Arc::new(BlockAccumulator::new(block_size, on_block));
        let mut graph = self.router.graph.lock();
        let id = graph.allocate();
        graph.nodes.insert(id, Node::Processor(Arc::clone(&core)));
        Ok(Box::new(SoftwareProcessor { id, core }))
    }

    fn destination(&self) -> NodeId {
        DESTINATION
    }

    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), CaptureError> {
        self.router.ensure_open()?;
        let mut graph = self.router.graph.lock();
        if from == DESTINATION || !graph.contains(from) || !graph.contains(to) {
            return Err(CaptureError::ProcessingFault(format!(
                "cannot connect {} to {}",
                from, to
            )));
        }
        if !graph.edges.contains(&(from, to)) {
            graph.edges.push((from, to));
        }
        Ok(())
    }

    fn disconnect(&self, node: NodeId) -> Result<(), CaptureError> {
        self.router.ensure_open()?;
        let mut graph = self.router.graph.lock();
        if !graph.contains(node) {
            return Err(CaptureError::ProcessingFault(format!("unknown node {}", node)));
        }
        graph.edges.retain(|(from, _)| *from != node);
        Ok(())
    }

    async fn close(&self) -> Result<(), CaptureError> {
        if self.router.closed.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::ProcessingFault("context already closed".into()));
        }
        self.router.shutdown();
        Ok(())
    }
}

impl Drop for SoftwareContext {
    fn drop(&mut self) {
        if !self.router.closed.swap(true, Ordering::SeqCst) {
            self.router.shutdown();
        }
    }
}

struct SoftwareAnalyser {
    id: NodeId,
    bins: usize,
    core: Arc<Mutex<SpectrumAnalyser>>,
}

impl AnalyserNode for SoftwareAnalyser {
    fn id(&self) -> NodeId {
        self.id
    }

    fn frequency_bin_count(&self) -> usize {
        self.bins
    }

    fn byte_frequency_data(&self, out: &mut [u8]) {
        self.core.lock().byte_frequency_data(out);
    }
}

struct SoftwareProcessor {
    id: NodeId,
    core: Arc<BlockAccumulator>,
}

impl BlockProcessorNode for SoftwareProcessor {
    fn id(&self) -> NodeId {
        self.id
    }

    fn detach_handler(&self) {
        self.core.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use media_capture_core::models::config::RecorderConfig;
    use media_capture_core::models::events::AudioEvent;
    use media_capture_core::models::media_models::{AudioConstraints, LatencyHint};
    use media_capture_core::session::audio_recorder::{AudioPlatform, AudioRecorder};
    use media_capture_core::traits::microphone::MicrophoneService;

    use crate::refresh::TokioRefreshScheduler;

    struct Wired {
        context: Arc<dyn AudioContext>,
        stream: Arc<CpalStream>,
        blocks: Arc<Mutex<Vec<Vec<f32>>>>,
        processor: Box<dyn BlockProcessorNode>,
        analyser: Box<dyn AnalyserNode>,
        source: NodeId,
    }

    async fn wired(rate: f64, channels: u16, block_size: usize, resume: bool) -> Wired {
        let context = SoftwareContextService
            .create(ContextOptions {
                sample_rate: 16000.0,
                latency_hint: LatencyHint::Interactive,
            })
            .await
            .unwrap();
        if resume {
            context.resume().await.unwrap();
        }
        let stream = CpalStream::detached(rate, channels);
        let dyn_stream: Arc<dyn MediaStream> = stream.clone();
        let source = context.create_source(&dyn_stream).unwrap();
        let analyser = context.create_analyser(256).unwrap();

        let blocks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&blocks);
        let processor = context
            .create_block_processor(
                block_size,
                1,
                1,
                Arc::new(move |channels: &[&[f32]]| sink.lock().push(channels[0].to_vec())),
            )
            .unwrap();

        context.connect(source, analyser.id()).unwrap();
        context.connect(source, processor.id()).unwrap();
        context.connect(processor.id(), context.destination()).unwrap();

        Wired {
            context,
            stream,
            blocks,
            processor,
            analyser,
            source,
        }
    }

    #[tokio::test]
    async fn emits_fixed_size_blocks() {
        let w = wired(16000.0, 1, 256, true).await;

        w.stream.deliver(&[0.25; 300]);
        w.stream.deliver(&[0.25; 300]);

        let blocks = w.blocks.lock();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.len() == 256 && b.iter().all(|&s| s == 0.25)));
    }

    #[tokio::test]
    async fn nothing_flows_before_resume() {
        let w = wired(16000.0, 1, 256, false).await;

        w.stream.deliver(&[0.25; 512]);

        assert!(w.blocks.lock().is_empty());
    }

    #[tokio::test]
    async fn processor_needs_the_destination() {
        let w = wired(16000.0, 1, 256, true).await;
        w.context.disconnect(w.processor.id()).unwrap();

        w.stream.deliver(&[0.25; 512]);

        assert!(w.blocks.lock().is_empty());
    }

    #[tokio::test]
    async fn detached_processor_drops_blocks() {
        let w = wired(16000.0, 1, 256, true).await;
        w.processor.detach_handler();

        w.stream.deliver(&[0.25; 512]);

        assert!(w.blocks.lock().is_empty());
    }

    #[tokio::test]
    async fn stereo_device_is_downmixed_and_resampled() {
        let w = wired(32000.0, 2, 256, true).await;
        let frames: Vec<f32> = (0..2000).flat_map(|_| [0.5f32, -0.1]).collect();

        w.stream.deliver(&frames);

        let blocks = w.blocks.lock();
        assert_eq!(blocks.len(), 3);
        for sample in blocks.iter().flatten() {
            approx::assert_relative_eq!(*sample, 0.2, epsilon = 1e-6);
        }
    }

    #[tokio::test]
    async fn analyser_sees_source_samples() {
        let w = wired(16000.0, 1, 256, true).await;
        let tone: Vec<f32> = (0..256)
            .map(|n| (2.0 * std::f32::consts::PI * 16.0 * n as f32 / 256.0).sin())
            .collect();

        w.stream.deliver(&tone);
        let mut bins = vec![0u8; w.analyser.frequency_bin_count()];
        w.analyser.byte_frequency_data(&mut bins);

        assert_eq!(bins.len(), 128);
        assert_eq!(bins[16], 255);
    }

    #[tokio::test]
    async fn close_unhooks_streams_once() {
        let w = wired(16000.0, 1, 256, true).await;
        assert_eq!(w.stream.sink_count(), 1);

        w.context.close().await.unwrap();

        assert_eq!(w.stream.sink_count(), 0);
        assert!(w.context.close().await.is_err());
        assert!(w.context.connect(w.source, w.context.destination()).is_err());
    }

    #[tokio::test]
    async fn rejects_unknown_nodes_and_foreign_streams() {
        let w = wired(16000.0, 1, 256, true).await;
        assert!(w.context.connect(w.source, NodeId(99)).is_err());
        assert!(w.context.disconnect(NodeId(99)).is_err());
        assert!(w
            .context
            .create_block_processor(256, 2, 1, Arc::new(|_: &[&[f32]]| {}))
            .is_err());

        struct Foreign;
        impl MediaStream for Foreign {
            fn id(&self) -> String {
                "foreign".into()
            }
            fn live_track_count(&self) -> usize {
                1
            }
            fn stop_tracks(&self) {}
            fn on_track_ended(&self, _: media_capture_core::traits::media_stream::TrackEndedCallback) {}
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
        let foreign: Arc<dyn MediaStream> = Arc::new(Foreign);
        assert!(w.context.create_source(&foreign).is_err());
    }

    struct DetachedMicrophone {
        stream: Arc<CpalStream>,
        opens: AtomicUsize,
    }

    #[async_trait]
    impl MicrophoneService for DetachedMicrophone {
        fn is_available(&self) -> bool {
            true
        }

        async fn open(&self, _: AudioConstraints) -> Result<Arc<dyn MediaStream>, CaptureError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(self.stream.clone())
        }
    }

    #[tokio::test]
    async fn recorder_runs_on_the_software_graph() {
        let stream = CpalStream::detached(48000.0, 1);
        let microphone = Arc::new(DetachedMicrophone {
            stream: Arc::clone(&stream),
            opens: AtomicUsize::new(0),
        });
        let recorder = AudioRecorder::new(
            RecorderConfig {
                block_size: 1024,
                ..Default::default()
            },
            AudioPlatform {
                microphone: microphone.clone(),
                contexts: Arc::new(SoftwareContextService),
                scheduler: Arc::new(TokioRefreshScheduler::new().unwrap()),
            },
        )
        .unwrap();
        let mut rx = recorder.subscribe();

        recorder.start().await.unwrap();
        stream.deliver(&vec![0.5f32; 48000 / 4]);
        recorder.stop().await;

        let mut blocks = 0;
        while let Ok(event) = rx.try_recv() {
            if let AudioEvent::Data(block) = event {
                assert_eq!(block.frames(), 1024);
                assert!(block.samples().all(|s| s == 16383));
                blocks += 1;
            }
        }
        assert_eq!(blocks, 3);
        assert_eq!(stream.sink_count(), 0);
        assert_eq!(stream.live_track_count(), 0);
        assert_eq!(microphone.opens.load(Ordering::SeqCst), 1);
    }
}
