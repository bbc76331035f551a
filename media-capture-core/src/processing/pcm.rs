//! Float → signed 16-bit PCM conversion for transport.

use crate::models::error::CaptureError;
use crate::models::events::SampleBlock;

/// Convert one normalized sample to a signed 16-bit value.
///
/// The sample is clamped to `[-1.0, 1.0]` first. Negative values scale by
/// `0x8000` and non-negative values by `0x7FFF`, so both ends of the range
/// map exactly onto `i16::MIN` and `i16::MAX`. NaN maps to 0.
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Pack samples as signed 16-bit little-endian bytes.
pub fn pack_i16_le(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        data.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }
    data
}

/// Convert the first channel of a processed block into a transport block.
///
/// Fails with `ProcessingFault` when the block carries no input channel.
pub fn encode_block(channels: &[&[f32]]) -> Result<SampleBlock, CaptureError> {
    let first = channels
        .first()
        .ok_or_else(|| CaptureError::ProcessingFault("block has no input channel".into()))?;
    Ok(SampleBlock::new(pack_i16_le(first)))
}
