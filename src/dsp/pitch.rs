//! Pitch shifter: two read heads sweeping a delay line at the shift ratio,
//! crossfaded with triangular windows so each head's wrap-around is silent.

use super::delay::DelayLine;

/// Sweep window, seconds. Longer windows smear transients, shorter ones flutter.
const WINDOW: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct PitchShifter {
    left: DelayLine,
    right: DelayLine,
    window: f64,
    /// Head position within the window, 0.0..1.0.
    phase: f64,
    /// Phase change per sample; zero when not shifting.
    step: f64,
}

impl PitchShifter {
    pub fn new(sample_rate: f64, semitones: f64) -> Self {
        let window = WINDOW * sample_rate;
        let ratio = 2.0_f64.powf(semitones.clamp(-24.0, 24.0) / 12.0);
        let capacity = window.ceil() as usize + 2;
        Self {
            left: DelayLine::new(capacity),
            right: DelayLine::new(capacity),
            window,
            phase: 0.0,
            // Delay shrinking by (ratio - 1) samples per sample plays back `ratio` times faster.
            step: (1.0 - ratio) / window,
        }
    }

    #[inline]
    fn head(&self, offset: f64) -> (f64, f32) {
        let pos = (self.phase + offset).rem_euclid(1.0);
        let gain = 1.0 - (2.0 * pos - 1.0).abs();
        (pos * self.window, gain as f32)
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        if self.step == 0.0 {
            return (left, right);
        }
        self.left.write(left);
        self.right.write(right);

        let (delay_a, gain_a) = self.head(0.0);
        let (delay_b, gain_b) = self.head(0.5);
        let out_l = self.left.read_interpolated(delay_a) * gain_a
            + self.left.read_interpolated(delay_b) * gain_b;
        let out_r = self.right.read_interpolated(delay_a) * gain_a
            + self.right.read_interpolated(delay_b) * gain_b;

        self.phase = (self.phase + self.step).rem_euclid(1.0);
        (out_l, out_r)
    }
}
