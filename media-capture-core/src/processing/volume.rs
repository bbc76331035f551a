//! Volume metering from analyser magnitudes.

/// Reference magnitude a "full" reading is normalized against.
pub const VOLUME_REFERENCE: f32 = 128.0;

/// Average of byte frequency magnitudes divided by [`VOLUME_REFERENCE`].
///
/// Yields a value in `[0, 255/128]`; silence and an empty spectrum yield 0.
pub fn volume_from_spectrum(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u64 = bins.iter().map(|&b| b as u64).sum();
    let average = sum as f32 / bins.len() as f32;
    average / VOLUME_REFERENCE
}
