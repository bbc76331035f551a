/// Streaming linear-interpolation resampler for mono audio.
///
/// Carries the fractional read position and the previous chunk's last sample
/// between calls, so consecutive device callbacks resample without seams.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    source_rate: f64,
    target_rate: f64,
    position: f64,
    last: Option<f32>,
}

impl LinearResampler {
    pub fn new(source_rate: f64, target_rate: f64) -> Self {
        Self {
            source_rate,
            target_rate,
            position: 0.0,
            last: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        (self.source_rate - self.target_rate).abs() < 0.01
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return input.to_vec();
        }
        if input.is_empty() {
            return Vec::new();
        }

        let n = input.len() as isize;
        let step = self.source_rate / self.target_rate;
        let first = input[0];
        let sample_at = |i: isize| -> f32 {
            if i < 0 {
                self.last.unwrap_or(first)
            } else {
                input[i as usize]
            }
        };

        let mut output = Vec::with_capacity((input.len() as f64 / step) as usize + 1);
        let mut position = self.position;
        loop {
            let index = position.floor();
            let i = index as isize;
            if i >= n - 1 {
                break;
            }
            let fraction = (position - index) as f32;
            output.push(sample_at(i) * (1.0 - fraction) + sample_at(i + 1) * fraction);
            position += step;
        }

        self.position = position - n as f64;
        self.last = input.last().copied();
        output
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
        self.last = None;
    }
}

/// Average interleaved frames down to one channel.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}
