/// Fixed-capacity sample ring used by processing nodes.
///
/// Overflow drops the oldest samples. `pop` consumes from the oldest end;
/// `copy_latest` reads the newest samples without consuming them, which is
/// what an analyser window needs.
#[derive(Debug)]
pub struct SampleRing {
    buffer: Vec<f32>,
    head: usize,
    len: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append samples, dropping the oldest on overflow.
    pub fn push(&mut self, samples: &[f32]) {
        let capacity = self.capacity();
        let samples = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        for &sample in samples {
            let tail = (self.head + self.len) % capacity;
            self.buffer[tail] = sample;
            if self.len == capacity {
                self.head = (self.head + 1) % capacity;
            } else {
                self.len += 1;
            }
        }
    }

    /// Remove exactly `count` of the oldest samples, or nothing if fewer are held.
    pub fn pop_exact(&mut self, count: usize) -> Option<Vec<f32>> {
        if count == 0 || count > self.len {
            return None;
        }
        let capacity = self.capacity();
        let out = (0..count)
            .map(|i| self.buffer[(self.head + i) % capacity])
            .collect();
        self.head = (self.head + count) % capacity;
        self.len -= count;
        Some(out)
    }

    /// Fill `out` with the newest samples, oldest first.
    ///
    /// When fewer than `out.len()` samples are held, the front of `out` is
    /// zero-filled.
    pub fn copy_latest(&self, out: &mut [f32]) {
        let capacity = self.capacity();
        let available = self.len.min(out.len());
        let pad = out.len() - available;
        out[..pad].fill(0.0);
        let start = self.head + self.len - available;
        for (i, slot) in out[pad..].iter_mut().enumerate() {
            *slot = self.buffer[(start + i) % capacity];
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
