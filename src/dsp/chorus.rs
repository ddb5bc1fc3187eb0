//! Chorus: several LFO-modulated delay voices mixed against the dry signal.

use std::f64::consts::TAU;

use super::delay::DelayLine;

/// Number of modulated voices per channel.
const VOICES: usize = 3;
/// Centre delay of every voice, seconds.
const BASE_DELAY: f64 = 0.015;
/// Modulation swing at depth 1.0, seconds.
const MAX_SWING: f64 = 0.005;

/// Stereo multi-voice chorus.
///
/// Voices are spread evenly around the LFO cycle, and the right channel
/// runs a quarter cycle ahead of the left for width.
#[derive(Debug, Clone)]
pub struct Chorus {
    left: DelayLine,
    right: DelayLine,
    sample_rate: f64,
    phase: f64,
    rate: f64,
    swing: f64,
    mix: f32,
}

impl Chorus {
    /// - `rate`: LFO frequency in Hz.
    /// - `depth`: 0.0..1.0 modulation depth.
    /// - `mix`: 0.0..1.0 wet amount.
    pub fn new(sample_rate: f64, rate: f64, depth: f64, mix: f64) -> Self {
        let capacity = ((BASE_DELAY + MAX_SWING) * sample_rate).ceil() as usize + 1;
        Self {
            left: DelayLine::new(capacity),
            right: DelayLine::new(capacity),
            sample_rate,
            phase: 0.0,
            rate: rate.clamp(0.1, 10.0),
            swing: depth.clamp(0.0, 1.0) * MAX_SWING,
            mix: mix.clamp(0.0, 1.0) as f32,
        }
    }

    fn voice_delay(&self, voice: usize, offset: f64) -> f64 {
        let phase = self.phase + voice as f64 / VOICES as f64 + offset;
        (BASE_DELAY + self.swing * (TAU * phase).sin()) * self.sample_rate
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.left.write(left);
        self.right.write(right);

        let mut wet_l = 0.0;
        let mut wet_r = 0.0;
        for voice in 0..VOICES {
            wet_l += self.left.read_interpolated(self.voice_delay(voice, 0.0));
            wet_r += self.right.read_interpolated(self.voice_delay(voice, 0.25));
        }
        wet_l /= VOICES as f32;
        wet_r /= VOICES as f32;

        self.phase = (self.phase + self.rate / self.sample_rate) % 1.0;

        (
            left + (wet_l - left) * self.mix,
            right + (wet_r - right) * self.mix,
        )
    }
}
