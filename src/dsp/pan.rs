//! Linear pan law shared by the panning effect and the track mixer.

/// Channel gains for a pan position in -1.0 (left) ..= 1.0 (right).
///
/// Centre leaves both channels at unity; moving right attenuates the left
/// channel linearly and vice versa.
#[inline]
pub fn pan_gains(position: f32) -> (f32, f32) {
    let p = position.clamp(-1.0, 1.0);
    ((1.0 - p).min(1.0), (1.0 + p).min(1.0))
}

/// Fixed-position stereo panner.
#[derive(Debug, Clone, Copy)]
pub struct Panner {
    left_gain: f32,
    right_gain: f32,
}

impl Panner {
    pub fn new(position: f32) -> Self {
        let (left_gain, right_gain) = pan_gains(position);
        Self {
            left_gain,
            right_gain,
        }
    }

    /// Map the effect's 0..=100 intensity onto -1..=1.
    pub fn from_intensity(intensity: f64) -> Self {
        Self::new((intensity.clamp(0.0, 100.0) / 50.0 - 1.0) as f32)
    }

    #[inline]
    pub fn process(&self, left: f32, right: f32) -> (f32, f32) {
        (left * self.left_gain, right * self.right_gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_is_unity() {
        assert_eq!(pan_gains(0.0), (1.0, 1.0));
    }

    #[test]
    fn extremes_silence_opposite_side() {
        assert_eq!(pan_gains(1.0), (0.0, 1.0));
        assert_eq!(pan_gains(-1.0), (1.0, 0.0));
        assert_eq!(pan_gains(3.0), (0.0, 1.0));
    }

    #[test]
    fn linear_in_between() {
        let (l, r) = pan_gains(0.5);
        assert!((l - 0.5).abs() < 1e-6);
        assert_eq!(r, 1.0);
    }

    #[test]
    fn intensity_mapping() {
        assert_eq!(Panner::from_intensity(100.0).process(1.0, 1.0), (0.0, 1.0));
        assert_eq!(Panner::from_intensity(50.0).process(1.0, 1.0), (1.0, 1.0));
        assert_eq!(Panner::from_intensity(0.0).process(1.0, 1.0), (1.0, 0.0));
    }
}
