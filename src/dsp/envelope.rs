//! Ramp envelope: the off→on→off automation curve for an effect window.

/// Where in its window a point in time falls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    /// Outside the window; the stage passes audio through untouched.
    Outside,
    FadeIn,
    Hold,
    FadeOut,
}

/// Linear fade in over the first `fraction` of the window, hold, then
/// linear fade out over the last `fraction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampEnvelope {
    /// Window start in seconds.
    pub start: f64,
    /// Window length in seconds.
    pub duration: f64,
    /// Ramp length as a fraction of `duration` (0.25 by default).
    pub fraction: f64,
    /// When false the level is 1.0 everywhere inside the window.
    pub ramped: bool,
}

impl RampEnvelope {
    pub fn new(start: f64, duration: f64, fraction: f64) -> Self {
        RampEnvelope {
            start,
            duration,
            fraction: fraction.clamp(f64::EPSILON, 0.5),
            ramped: true,
        }
    }

    /// Window with a hard on/off edge.
    pub fn gate(start: f64, duration: f64) -> Self {
        RampEnvelope {
            ramped: false,
            ..Self::new(start, duration, 0.25)
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// True inside the closed interval `[start, end]`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end()
    }

    pub fn segment(&self, t: f64) -> Segment {
        if !self.contains(t) {
            return Segment::Outside;
        }
        let ramp = self.duration * self.fraction;
        if t < self.start + ramp {
            Segment::FadeIn
        } else if t > self.end() - ramp {
            Segment::FadeOut
        } else {
            Segment::Hold
        }
    }

    /// Envelope level in [0, 1] at time `t` (seconds).
    pub fn level(&self, t: f64) -> f64 {
        let segment = self.segment(t);
        if !self.ramped {
            return if segment == Segment::Outside { 0.0 } else { 1.0 };
        }
        let ramp = self.duration * self.fraction;
        match segment {
            Segment::Outside => 0.0,
            Segment::FadeIn => ((t - self.start) / ramp).clamp(0.0, 1.0),
            Segment::Hold => 1.0,
            Segment::FadeOut => ((self.end() - t) / ramp).clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_on_off_at_start_middle_end() {
        for (start, duration) in [(0.0, 1.0), (2.0, 2.0), (7.5, 0.4), (1.25, 13.0)] {
            let env = RampEnvelope::new(start, duration, 0.25);
            assert!(env.level(start).abs() < 1e-9, "start of {start}+{duration}");
            assert!((env.level(start + duration * 0.5) - 1.0).abs() < 1e-9);
            assert!(env.level(start + duration).abs() < 1e-9, "end of {start}+{duration}");
        }
    }

    #[test]
    fn ramps_are_linear_over_quarter_windows() {
        let env = RampEnvelope::new(2.0, 4.0, 0.25);
        // Fade in across [2, 3], hold across [3, 5], fade out across [5, 6].
        assert!((env.level(2.5) - 0.5).abs() < 1e-9);
        assert!((env.level(3.0) - 1.0).abs() < 1e-9);
        assert!((env.level(4.9) - 1.0).abs() < 1e-9);
        assert!((env.level(5.5) - 0.5).abs() < 1e-9);
        assert_eq!(env.segment(2.1), Segment::FadeIn);
        assert_eq!(env.segment(4.0), Segment::Hold);
        assert_eq!(env.segment(5.9), Segment::FadeOut);
    }

    #[test]
    fn zero_outside_window() {
        let env = RampEnvelope::new(2.0, 2.0, 0.25);
        assert_eq!(env.level(1.999), 0.0);
        assert_eq!(env.level(4.001), 0.0);
        assert_eq!(env.segment(10.0), Segment::Outside);
    }

    #[test]
    fn gate_is_flat_inside() {
        let env = RampEnvelope::gate(1.0, 2.0);
        assert_eq!(env.level(1.0), 1.0);
        assert_eq!(env.level(3.0), 1.0);
        assert_eq!(env.level(0.99), 0.0);
    }
}
