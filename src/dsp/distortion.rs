//! Distortion: tanh waveshaper followed by a tone lowpass.

use super::filter::{BiquadFilter, FilterType};

const TONE_MIN_HZ: f64 = 500.0;
const TONE_MAX_HZ: f64 = 16000.0;

#[derive(Debug, Clone)]
pub struct Distortion {
    drive: f32,
    tone_l: BiquadFilter,
    tone_r: BiquadFilter,
}

impl Distortion {
    /// `amount` and `tone` are 0.0..1.0. Tone sweeps the post-filter
    /// exponentially from dark (500 Hz) to open (16 kHz).
    pub fn new(sample_rate: f64, amount: f64, tone: f64) -> Self {
        let cutoff = TONE_MIN_HZ * (TONE_MAX_HZ / TONE_MIN_HZ).powf(tone.clamp(0.0, 1.0));
        let filter = BiquadFilter::new(FilterType::Lowpass, sample_rate, cutoff, 0.707, 0.0);
        Self {
            drive: 1.0 + 20.0 * amount.clamp(0.0, 1.0) as f32,
            tone_l: filter.clone(),
            tone_r: filter,
        }
    }

    #[inline]
    fn shape(&self, x: f32) -> f32 {
        (self.drive * x).tanh()
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let l = self.tone_l.process(self.shape(left) as f64) as f32;
        let r = self.tone_r.process(self.shape(right) as f64) as f32;
        (l, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn rms_error(amount: f64) -> f32 {
        let mut dist = Distortion::new(44100.0, amount, 1.0);
        let mut err = 0.0;
        for i in 0..4410 {
            let x = 0.5 * (TAU * 220.0 * i as f64 / 44100.0).sin() as f32;
            let (y, _) = dist.process(x, x);
            err += (y - x) * (y - x);
        }
        (err / 4410.0).sqrt()
    }

    #[test]
    fn output_is_bounded() {
        let mut dist = Distortion::new(44100.0, 1.0, 1.0);
        for i in 0..10000 {
            let x = ((i % 50) as f32 / 25.0 - 1.0) * 4.0;
            let (l, r) = dist.process(x, -x);
            assert!(l.abs() < 1.5 && r.abs() < 1.5, "sample {i}: {l}, {r}");
        }
    }

    #[test]
    fn more_amount_distorts_more() {
        assert!(rms_error(1.0) > rms_error(0.3));
        assert!(rms_error(0.3) > rms_error(0.0));
    }

    #[test]
    fn low_tone_darkens() {
        let mut bright = Distortion::new(44100.0, 0.5, 1.0);
        let mut dark = Distortion::new(44100.0, 0.5, 0.0);
        let mut bright_peak = 0.0_f32;
        let mut dark_peak = 0.0_f32;
        for i in 0..8820 {
            let x = 0.5 * (TAU * 6000.0 * i as f64 / 44100.0).sin() as f32;
            if i > 4410 {
                bright_peak = bright_peak.max(bright.process(x, x).0.abs());
                dark_peak = dark_peak.max(dark.process(x, x).0.abs());
            } else {
                bright.process(x, x);
                dark.process(x, x);
            }
        }
        assert!(dark_peak < bright_peak * 0.5, "dark={dark_peak}, bright={bright_peak}");
    }
}
