//! Three-band EQ: low shelf 200 Hz, peak 1 kHz (Q 1), high shelf 3 kHz.

use super::filter::{BiquadFilter, FilterType};

const LOW_SHELF_HZ: f64 = 200.0;
const MID_PEAK_HZ: f64 = 1000.0;
const HIGH_SHELF_HZ: f64 = 3000.0;
const SHELF_Q: f64 = 0.707;
const MID_Q: f64 = 1.0;

#[derive(Debug, Clone)]
struct Bands {
    low: BiquadFilter,
    mid: BiquadFilter,
    high: BiquadFilter,
}

impl Bands {
    fn new(sample_rate: f64, low_db: f64, mid_db: f64, high_db: f64) -> Self {
        Self {
            low: BiquadFilter::new(FilterType::LowShelf, sample_rate, LOW_SHELF_HZ, SHELF_Q, low_db),
            mid: BiquadFilter::new(FilterType::Peaking, sample_rate, MID_PEAK_HZ, MID_Q, mid_db),
            high: BiquadFilter::new(FilterType::HighShelf, sample_rate, HIGH_SHELF_HZ, SHELF_Q, high_db),
        }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        self.high.process(self.mid.process(self.low.process(x as f64))) as f32
    }
}

/// Stereo three-band equaliser with fixed band centres.
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    left: Bands,
    right: Bands,
}

impl ThreeBandEq {
    /// Gains in dB, clamped to ±12.
    pub fn new(sample_rate: f64, low_db: f64, mid_db: f64, high_db: f64) -> Self {
        let (low_db, mid_db, high_db) = (
            low_db.clamp(-12.0, 12.0),
            mid_db.clamp(-12.0, 12.0),
            high_db.clamp(-12.0, 12.0),
        );
        let bands = Bands::new(sample_rate, low_db, mid_db, high_db);
        Self {
            left: bands.clone(),
            right: bands,
        }
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.left.process(left), self.right.process(right))
    }
}
