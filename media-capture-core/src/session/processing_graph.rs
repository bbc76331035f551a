use std::sync::Arc;

use crate::models::config::RecorderConfig;
use crate::models::error::CaptureError;
use crate::models::media_models::NodeId;
use crate::traits::audio_context::{AnalyserNode, AudioContext, BlockCallback, BlockProcessorNode};
use crate::traits::media_stream::MediaStream;

/// The recorder's signal graph.
///
/// ```text
/// source ──→ analyser
///   └──────→ block processor ──→ destination
/// ```
///
/// Nodes are released in reverse of construction order, by `teardown` or on
/// drop. A graph that fails to wire tears down whatever it built.
pub struct ProcessingGraph {
    context: Arc<dyn AudioContext>,
    source: Option<NodeId>,
    analyser: Option<Box<dyn AnalyserNode>>,
    processor: Option<Box<dyn BlockProcessorNode>>,
}

impl ProcessingGraph {
    pub fn build(
        context: Arc<dyn AudioContext>,
        stream: &Arc<dyn MediaStream>,
        config: &RecorderConfig,
        on_block: BlockCallback,
    ) -> Result<Self, CaptureError> {
        let mut graph = Self {
            context,
            source: None,
            analyser: None,
            processor: None,
        };
        if let Err(e) = graph.wire(stream, config, on_block) {
            graph.teardown();
            return Err(e);
        }
        Ok(graph)
    }

    fn wire(
        &mut self,
        stream: &Arc<dyn MediaStream>,
        config: &RecorderConfig,
        on_block: BlockCallback,
    ) -> Result<(), CaptureError> {
        let source = self.context.create_source(stream)?;
        self.source = Some(source);

        let analyser = self.context.create_analyser(config.fft_size)?;
        let analyser_id = analyser.id();
        self.analyser = Some(analyser);
        self.context.connect(source, analyser_id)?;

        let processor = self
            .context
            .create_block_processor(config.block_size, 1, 1, on_block)?;
        let processor_id = processor.id();
        self.processor = Some(processor);
        self.context.connect(source, processor_id)?;
        self.context.connect(processor_id, self.context.destination())?;
        Ok(())
    }

    pub fn analyser(&self) -> Option<&dyn AnalyserNode> {
        self.analyser.as_deref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.source.is_none() && self.analyser.is_none() && self.processor.is_none()
    }

    /// Disconnect processor, analyser, then source. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if let Some(processor) = self.processor.take() {
            self.release(processor.id(), "block processor");
            processor.detach_handler();
        }
        if let Some(analyser) = self.analyser.take() {
            self.release(analyser.id(), "analyser");
        }
        if let Some(source) = self.source.take() {
            self.release(source, "source");
        }
    }

    fn release(&self, node: NodeId, role: &str) {
        match self.context.disconnect(node) {
            Ok(()) => log::debug!("Disconnected {} {}", role, node),
            Err(e) => log::warn!("Failed to disconnect {} {}: {}", role, node, e),
        }
    }
}

impl Drop for ProcessingGraph {
    fn drop(&mut self) {
        self.teardown();
    }
}
