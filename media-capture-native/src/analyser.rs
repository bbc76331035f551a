//! Spectrum analysis for the software processing context.
//!
//! Byte-scaled magnitudes follow the usual analyser conventions: Blackman
//! window, magnitude normalized by the FFT size, exponential smoothing over
//! time, then decibels mapped linearly from [MIN_DECIBELS, MAX_DECIBELS] onto
//! 0..=255.

use std::f32::consts::PI;

use media_capture_core::models::error::CaptureError;
use media_capture_core::processing::ring_buffer::SampleRing;

pub const SMOOTHING: f32 = 0.8;
pub const MIN_DECIBELS: f32 = -100.0;
pub const MAX_DECIBELS: f32 = -30.0;

/// Sliding-window spectrum analyser.
pub struct SpectrumAnalyser {
    fft_size: usize,
    window: Vec<f32>,
    history: SampleRing,
    smoothed: Vec<f32>,
    re: Vec<f32>,
    im: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize) -> Result<Self, CaptureError> {
        if !fft_size.is_power_of_two() || !(32..=32768).contains(&fft_size) {
            return Err(CaptureError::ProcessingFault(format!(
                "fft size {} must be a power of two in 32..=32768",
                fft_size
            )));
        }
        Ok(Self {
            fft_size,
            window: blackman(fft_size),
            history: SampleRing::new(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            re: vec![0.0; fft_size],
            im: vec![0.0; fft_size],
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Append mono samples; only the latest `fft_size` are kept.
    pub fn push(&mut self, samples: &[f32]) {
        self.history.push(samples);
    }

    /// Analyse the current window and write one byte per bin into `out`.
    /// Extra slots in `out` are left untouched.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.history.copy_latest(&mut self.re);
        for (sample, w) in self.re.iter_mut().zip(&self.window) {
            *sample *= w;
        }
        self.im.fill(0.0);
        fft_in_place(&mut self.re, &mut self.im);

        let scale = 1.0 / self.fft_size as f32;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.re[k].hypot(self.im[k]) * scale;
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * magnitude;
        }

        for (slot, magnitude) in out.iter_mut().zip(&self.smoothed) {
            *slot = magnitude_to_byte(*magnitude);
        }
    }
}

fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

fn blackman(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    (0..size)
        .map(|n| {
            let x = n as f32 / size as f32;
            A0 - A1 * (2.0 * PI * x).cos() + A2 * (4.0 * PI * x).cos()
        })
        .collect()
}

/// Iterative radix-2 FFT. Both slices must share a power-of-two length.
pub fn fft_in_place(re: &mut [f32], im: &mut [f32]) {
    let n = re.len();
    debug_assert!(n.is_power_of_two() && im.len() == n);

    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let angle = -2.0 * std::f64::consts::PI / len as f64;
        let (step_re, step_im) = (angle.cos(), angle.sin());
        let half = len / 2;
        for start in (0..n).step_by(len) {
            let (mut w_re, mut w_im) = (1.0f64, 0.0f64);
            for k in 0..half {
                let a = start + k;
                let b = a + half;
                let (wr, wi) = (w_re as f32, w_im as f32);
                let t_re = re[b] * wr - im[b] * wi;
                let t_im = re[b] * wi + im[b] * wr;
                re[b] = re[a] - t_re;
                im[b] = im[a] - t_im;
                re[a] += t_re;
                im[a] += t_im;
                let next = w_re * step_re - w_im * step_im;
                w_im = w_re * step_im + w_im * step_re;
                w_re = next;
            }
        }
        len <<= 1;
    }
}
