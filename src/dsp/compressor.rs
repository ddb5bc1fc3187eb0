//! Compressor: feed-forward dynamics with a peak envelope follower.

/// Stereo-linked hard-knee compressor.
#[derive(Debug, Clone)]
pub struct Compressor {
    /// Threshold in dB.
    threshold: f64,
    /// N:1 above threshold.
    ratio: f64,
    attack_coef: f64,
    release_coef: f64,
    /// Detector level (linear).
    envelope: f64,
}

/// One-pole smoothing coefficient for a time constant; 0 means "follow instantly".
fn time_coef(seconds: f64, sample_rate: f64) -> f64 {
    if seconds <= 0.0 {
        0.0
    } else {
        (-1.0 / (seconds * sample_rate)).exp()
    }
}

#[inline]
fn linear_to_db(linear: f64) -> f64 {
    if linear <= 1e-6 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}

#[inline]
fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

impl Compressor {
    pub fn new(sample_rate: f64, threshold: f64, ratio: f64, attack: f64, release: f64) -> Self {
        Self {
            threshold: threshold.clamp(-100.0, 0.0),
            ratio: ratio.clamp(1.0, 20.0),
            attack_coef: time_coef(attack.clamp(0.0, 1.0), sample_rate),
            release_coef: time_coef(release.clamp(0.0, 1.0), sample_rate),
            envelope: 0.0,
        }
    }

    /// Gain change in dB for a detector level in dB (zero or negative).
    #[inline]
    fn gain_reduction_db(&self, level_db: f64) -> f64 {
        if level_db <= self.threshold {
            0.0
        } else {
            (self.threshold - level_db) * (1.0 - 1.0 / self.ratio)
        }
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let peak = left.abs().max(right.abs()) as f64;
        let coef = if peak > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * peak;

        let gain = db_to_linear(self.gain_reduction_db(linear_to_db(self.envelope))) as f32;
        (left * gain, right * gain)
    }

    /// Current gain reduction in dB, positive when compressing.
    pub fn gain_reduction(&self) -> f64 {
        -self.gain_reduction_db(linear_to_db(self.envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_is_untouched() {
        let mut comp = Compressor::new(44100.0, -20.0, 4.0, 0.001, 0.1);
        for _ in 0..2000 {
            let (l, r) = comp.process(0.05, -0.05);
            assert!((l - 0.05).abs() < 1e-6);
            assert!((r + 0.05).abs() < 1e-6);
        }
        assert_eq!(comp.gain_reduction(), 0.0);
    }

    #[test]
    fn settles_at_ratio() {
        // 0 dB in, -12 dB threshold, 4:1 → -9 dB of reduction.
        let mut comp = Compressor::new(44100.0, -12.0, 4.0, 0.001, 0.1);
        let mut out = 0.0;
        for _ in 0..10000 {
            out = comp.process(1.0, 1.0).0;
        }
        let expected = db_to_linear(-9.0) as f32;
        assert!((out - expected).abs() < 0.01, "expected ~{expected}, got {out}");
        assert!((comp.gain_reduction() - 9.0).abs() < 0.1);
    }

    #[test]
    fn zero_attack_acts_immediately() {
        let mut comp = Compressor::new(44100.0, -20.0, 20.0, 0.0, 0.5);
        let (first, _) = comp.process(1.0, 1.0);
        assert!(first < 0.2, "instant attack should clamp the first sample, got {first}");
    }

    #[test]
    fn slower_attack_lets_transient_through() {
        let mut comp = Compressor::new(44100.0, -20.0, 10.0, 0.01, 0.5);
        let (first, _) = comp.process(1.0, 1.0);
        for _ in 0..2000 {
            comp.process(1.0, 1.0);
        }
        let (later, _) = comp.process(1.0, 1.0);
        assert!(first > later, "first={first}, later={later}");
    }

    #[test]
    fn gain_recovers_after_release() {
        let mut comp = Compressor::new(44100.0, -20.0, 10.0, 0.001, 0.05);
        for _ in 0..2000 {
            comp.process(1.0, 1.0);
        }
        let (compressed, _) = comp.process(0.05, 0.05);
        for _ in 0..10000 {
            comp.process(0.05, 0.05);
        }
        let (released, _) = comp.process(0.05, 0.05);
        assert!(released > compressed);
    }
}
