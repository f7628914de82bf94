use std::collections::VecDeque;

/// Stereo frames produced at the internal mixing rate, waiting for the host.
#[derive(Debug, Clone)]
pub(crate) struct SampleQueue {
    rate: u32,
    max_frames: usize,
    frames: VecDeque<(f32, f32)>,
    /// Fractional read position carried between flushes.
    cursor: f64,
}

impl SampleQueue {
    pub fn new(rate: u32, max_buffer_seconds: f32) -> Self {
        let max_frames = Self::cap(rate, max_buffer_seconds);
        Self {
            rate,
            max_frames,
            frames: VecDeque::with_capacity(max_frames),
            cursor: 0.0,
        }
    }

    fn cap(rate: u32, seconds: f32) -> usize {
        ((rate as f64 * seconds.max(0.0) as f64) as usize).max(1)
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: u32, max_buffer_seconds: f32) {
        self.rate = rate;
        self.max_frames = Self::cap(rate, max_buffer_seconds);
        self.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.cursor = 0.0;
    }

    /// Appends a frame, dropping the oldest once the cap is reached.
    pub fn push(&mut self, left: f32, right: f32) {
        if self.frames.len() >= self.max_frames {
            self.frames.pop_front();
            self.cursor = (self.cursor - 1.0).max(0.0);
        }
        self.frames.push_back((left, right));
    }

    /// Linearly resamples to `rate` and returns `count` interleaved frames.
    /// Missing input is padded with silence.
    pub fn flush(&mut self, rate: u32, count: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(count * 2);
        let step = self.rate as f64 / rate.max(1) as f64;
        let available = self.frames.len();

        for i in 0..count {
            let pos = self.cursor + i as f64 * step;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let (l, r) = match (self.frames.get(idx), self.frames.get(idx + 1)) {
                (Some(&(l0, r0)), Some(&(l1, r1))) => {
                    (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
                }
                (Some(&frame), None) => frame,
                _ => (0.0, 0.0),
            };
            out.push(l);
            out.push(r);
        }

        let end = self.cursor + count as f64 * step;
        let consumed = (end as usize).min(available);
        self.frames.drain(..consumed);
        self.cursor = if consumed < end as usize {
            0.0
        } else {
            end - consumed as f64
        };
        out
    }
}
