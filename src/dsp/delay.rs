//! Delay lines: a ring buffer with fractional reads, and the stereo
//! feedback delay built on it (used for both the delay and reverb effects).

/// A mono ring buffer addressed by "samples ago".
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// A line able to look back at least `max_delay_samples`.
    pub fn new(max_delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay_samples + 2],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len() - 2
    }

    /// Sample written `delay` writes ago (0 = most recent write).
    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        let len = self.buffer.len();
        let newest = (self.write_pos + len - 1) % len;
        self.buffer[(newest + len - delay.min(len - 1)) % len]
    }

    /// Linearly interpolated read at a fractional delay.
    #[inline]
    pub fn read_interpolated(&self, delay: f64) -> f32 {
        let delay = delay.clamp(0.0, self.capacity() as f64);
        let whole = delay as usize;
        let frac = (delay - whole as f64) as f32;
        let a = self.read(whole);
        let b = self.read(whole + 1);
        a + frac * (b - a)
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }
}

/// Stereo delay with feedback and a wet/dry mix.
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    left: DelayLine,
    right: DelayLine,
    delay_samples: usize,
    feedback: f32,
    mix: f32,
}

impl FeedbackDelay {
    /// - `delay_time`: seconds between echoes.
    /// - `feedback`: gain of each repeat, 0.0..0.99.
    /// - `mix`: 0.0 = dry only, 1.0 = wet only.
    pub fn new(sample_rate: f64, delay_time: f64, feedback: f64, mix: f64) -> Self {
        let delay_samples = ((delay_time.max(0.0) * sample_rate) as usize).max(1);
        Self {
            left: DelayLine::new(delay_samples),
            right: DelayLine::new(delay_samples),
            delay_samples,
            feedback: feedback.clamp(0.0, 0.99) as f32,
            mix: mix.clamp(0.0, 1.0) as f32,
        }
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        // The sample written `delay_samples` calls ago sits at read(delay_samples - 1)
        // until this call's write lands.
        let echo_l = self.left.read(self.delay_samples - 1);
        let echo_r = self.right.read(self.delay_samples - 1);

        self.left.write(left + echo_l * self.feedback);
        self.right.write(right + echo_r * self.feedback);

        (
            left + (echo_l - left) * self.mix,
            right + (echo_r - right) * self.mix,
        )
    }
}
