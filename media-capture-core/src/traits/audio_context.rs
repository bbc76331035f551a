use std::sync::Arc;

use async_trait::async_trait;

use crate::models::error::CaptureError;
use crate::models::media_models::{ContextOptions, NodeId};
use crate::traits::media_stream::MediaStream;

/// Callback invoked with one block of de-interleaved input channels.
///
/// Fires on the platform's audio thread.
pub type BlockCallback = Arc<dyn Fn(&[&[f32]]) + Send + Sync + 'static>;

/// Creates audio processing contexts.
#[async_trait]
pub trait AudioContextService: Send + Sync {
    async fn create(&self, options: ContextOptions) -> Result<Arc<dyn AudioContext>, CaptureError>;
}

/// A processing context able to build and wire signal nodes.
///
/// Connections are directed edges between node ids. `disconnect` removes every
/// outgoing edge of a node.
#[async_trait]
pub trait AudioContext: Send + Sync {
    fn sample_rate(&self) -> f64;

    async fn resume(&self) -> Result<(), CaptureError>;

    /// Source node fed by the stream's first audio track.
    fn create_source(&self, stream: &Arc<dyn MediaStream>) -> Result<NodeId, CaptureError>;

    fn create_analyser(&self, fft_size: usize) -> Result<Box<dyn AnalyserNode>, CaptureError>;

    /// Processor that calls `on_block` once per `block_size` frames while
    /// connected to the destination.
    fn create_block_processor(
        &self,
        block_size: usize,
        input_channels: u16,
        output_channels: u16,
        on_block: BlockCallback,
    ) -> Result<Box<dyn BlockProcessorNode>, CaptureError>;

    /// The sink node.
    fn destination(&self) -> NodeId;

    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), CaptureError>;

    fn disconnect(&self, node: NodeId) -> Result<(), CaptureError>;

    async fn close(&self) -> Result<(), CaptureError>;
}

/// Frequency analyser node.
pub trait AnalyserNode: Send + Sync {
    fn id(&self) -> NodeId;

    /// Half the FFT size.
    fn frequency_bin_count(&self) -> usize;

    /// Write the current byte-scaled magnitude per bin into `out`.
    fn byte_frequency_data(&self, out: &mut [u8]);
}

/// Fixed-size block processor node.
pub trait BlockProcessorNode: Send + Sync {
    fn id(&self) -> NodeId;

    /// Drop the block callback; later blocks are discarded.
    fn detach_handler(&self);
}
