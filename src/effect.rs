//! Effect descriptors: validated, time-bounded effect records.
//!
//! Each descriptor carries the common `{id, startTime, duration}` envelope plus
//! a typed parameter set. The JSON shape matches what the editor UI sends:
//!
//! ```json
//! { "id": "fx-1", "type": "delay", "startTime": 2.0, "duration": 4.0,
//!   "dryWet": 40, "delayTime": 0.25, "feedback": 30 }
//! ```

use std::cell::OnceCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ── Parameters ──────────────────────────────────────────────

/// Effect type and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum EffectKind {
    /// Stereo position, 0 = hard left, 50 = centre, 100 = hard right.
    Panning { intensity: f64 },
    /// Wet mix in percent, decay in seconds.
    Reverb { dry_wet: f64, decay: f64 },
    /// Wet mix in percent, delay in seconds, feedback in percent.
    Delay {
        dry_wet: f64,
        delay_time: f64,
        feedback: f64,
    },
    /// Band gains in dB.
    Eq {
        low_gain: f64,
        mid_gain: f64,
        high_gain: f64,
    },
    /// Threshold in dB, ratio N:1, attack/release in seconds.
    Compressor {
        threshold: f64,
        ratio: f64,
        attack: f64,
        release: f64,
    },
    PitchShift { semitones: f64 },
    /// Both in percent.
    Distortion { amount: f64, tone: f64 },
    /// LFO rate in Hz, depth and wet mix in percent.
    Chorus { rate: f64, depth: f64, dry_wet: f64 },
}

fn check(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl EffectKind {
    /// The type tag, as it appears in JSON.
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Panning { .. } => "panning",
            EffectKind::Reverb { .. } => "reverb",
            EffectKind::Delay { .. } => "delay",
            EffectKind::Eq { .. } => "eq",
            EffectKind::Compressor { .. } => "compressor",
            EffectKind::PitchShift { .. } => "pitchshift",
            EffectKind::Distortion { .. } => "distortion",
            EffectKind::Chorus { .. } => "chorus",
        }
    }

    /// Check every parameter against its documented range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            EffectKind::Panning { intensity } => check("panning.intensity", intensity, 0.0, 100.0),
            EffectKind::Reverb { dry_wet, decay } => {
                check("reverb.dryWet", dry_wet, 0.0, 100.0)?;
                check("reverb.decay", decay, 0.1, 10.0)
            }
            EffectKind::Delay {
                dry_wet,
                delay_time,
                feedback,
            } => {
                check("delay.dryWet", dry_wet, 0.0, 100.0)?;
                check("delay.delayTime", delay_time, 0.05, 2.0)?;
                check("delay.feedback", feedback, 0.0, 80.0)
            }
            EffectKind::Eq {
                low_gain,
                mid_gain,
                high_gain,
            } => {
                check("eq.lowGain", low_gain, -12.0, 12.0)?;
                check("eq.midGain", mid_gain, -12.0, 12.0)?;
                check("eq.highGain", high_gain, -12.0, 12.0)
            }
            EffectKind::Compressor {
                threshold,
                ratio,
                attack,
                release,
            } => {
                check("compressor.threshold", threshold, -100.0, 0.0)?;
                check("compressor.ratio", ratio, 1.0, 20.0)?;
                check("compressor.attack", attack, 0.0, 1.0)?;
                check("compressor.release", release, 0.0, 1.0)
            }
            EffectKind::PitchShift { semitones } => {
                check("pitchshift.semitones", semitones, -24.0, 24.0)
            }
            EffectKind::Distortion { amount, tone } => {
                check("distortion.amount", amount, 0.0, 100.0)?;
                check("distortion.tone", tone, 0.0, 100.0)
            }
            EffectKind::Chorus {
                rate,
                depth,
                dry_wet,
            } => {
                check("chorus.rate", rate, 0.5, 5.0)?;
                check("chorus.depth", depth, 0.0, 100.0)?;
                check("chorus.dryWet", dry_wet, 0.0, 100.0)
            }
        }
    }
}

// ── Descriptor ──────────────────────────────────────────────

/// A validated effect descriptor. The only way to obtain one is through
/// [`Effect::new`] or deserialization, both of which validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEffect", into = "RawEffect")]
pub struct Effect {
    id: String,
    start_time: f64,
    duration: f64,
    kind: EffectKind,
}

/// Unchecked wire form of [`Effect`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEffect {
    id: String,
    start_time: f64,
    duration: f64,
    #[serde(flatten)]
    kind: EffectKind,
}

impl Effect {
    pub fn new(
        id: impl Into<String>,
        start_time: f64,
        duration: f64,
        kind: EffectKind,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        // Negated comparisons so NaN is rejected too.
        if !(start_time >= 0.0) || !start_time.is_finite() {
            return Err(ValidationError::NegativeStartTime(start_time));
        }
        if !(duration > 0.0) || !duration.is_finite() {
            return Err(ValidationError::NonPositiveDuration(duration));
        }
        kind.validate()?;
        Ok(Effect {
            id,
            start_time,
            duration,
            kind,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn kind(&self) -> &EffectKind {
        &self.kind
    }
}

impl TryFrom<RawEffect> for Effect {
    type Error = ValidationError;

    fn try_from(raw: RawEffect) -> Result<Self, Self::Error> {
        Effect::new(raw.id, raw.start_time, raw.duration, raw.kind)
    }
}

impl From<Effect> for RawEffect {
    fn from(e: Effect) -> Self {
        RawEffect {
            id: e.id,
            start_time: e.start_time,
            duration: e.duration,
            kind: e.kind,
        }
    }
}

/// Order effects for the signal chain: ascending start time.
///
/// The sort is stable, so effects sharing a start time keep their
/// relative order from `effects`.
pub fn chain_order(effects: &[Effect]) -> Vec<&Effect> {
    let mut ordered: Vec<&Effect> = effects.iter().collect();
    ordered.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    ordered
}

// ── Effect List ─────────────────────────────────────────────

/// The project's effects, keyed by id.
///
/// Storage is unordered; [`EffectList::sorted`] yields chain order and is
/// cached until the next add or remove.
#[derive(Debug, Clone, Default)]
pub struct EffectList {
    effects: HashMap<String, Effect>,
    sorted: OnceCell<Vec<Effect>>,
}

impl EffectList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor. Ids must be unique within the list.
    pub fn add(&mut self, effect: Effect) -> Result<(), ValidationError> {
        if self.effects.contains_key(effect.id()) {
            return Err(ValidationError::DuplicateId(effect.id().to_string()));
        }
        self.effects.insert(effect.id().to_string(), effect);
        self.sorted = OnceCell::new();
        Ok(())
    }

    /// Remove a descriptor by id, returning it if it was present.
    pub fn remove(&mut self, id: &str) -> Option<Effect> {
        let removed = self.effects.remove(id);
        if removed.is_some() {
            self.sorted = OnceCell::new();
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Effect> {
        self.effects.get(id)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effects in signal-chain order (start time, then id for ties).
    pub fn sorted(&self) -> &[Effect] {
        self.sorted.get_or_init(|| {
            let mut all: Vec<Effect> = self.effects.values().cloned().collect();
            all.sort_by(|a, b| {
                a.start_time
                    .total_cmp(&b.start_time)
                    .then_with(|| a.id.cmp(&b.id))
            });
            all
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pan(id: &str, start: f64) -> Effect {
        Effect::new(id, start, 1.0, EffectKind::Panning { intensity: 75.0 }).unwrap()
    }

    #[test]
    fn rejects_zero_and_negative_duration() {
        let kind = EffectKind::PitchShift { semitones: 3.0 };
        assert_eq!(
            Effect::new("a", 0.0, 0.0, kind),
            Err(ValidationError::NonPositiveDuration(0.0))
        );
        assert!(Effect::new("a", 0.0, -1.0, kind).is_err());
        assert!(Effect::new("a", -0.5, 1.0, kind).is_err());
        assert!(Effect::new("a", f64::NAN, 1.0, kind).is_err());
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let cases = [
            EffectKind::Panning { intensity: 101.0 },
            EffectKind::Reverb { dry_wet: 50.0, decay: 0.05 },
            EffectKind::Delay { dry_wet: 50.0, delay_time: 0.25, feedback: 90.0 },
            EffectKind::Eq { low_gain: 0.0, mid_gain: 13.0, high_gain: 0.0 },
            EffectKind::Compressor { threshold: 5.0, ratio: 4.0, attack: 0.01, release: 0.1 },
            EffectKind::PitchShift { semitones: -25.0 },
            EffectKind::Distortion { amount: 50.0, tone: -1.0 },
            EffectKind::Chorus { rate: 0.2, depth: 50.0, dry_wet: 50.0 },
        ];
        for kind in cases {
            let err = Effect::new("x", 0.0, 1.0, kind).unwrap_err();
            assert!(
                matches!(err, ValidationError::OutOfRange { .. }),
                "{} should be rejected, got {err:?}",
                kind.name()
            );
        }
    }

    #[test]
    fn accepts_range_boundaries() {
        let kind = EffectKind::Compressor {
            threshold: -100.0,
            ratio: 20.0,
            attack: 0.0,
            release: 1.0,
        };
        assert!(Effect::new("c", 0.0, 0.5, kind).is_ok());
    }

    #[test]
    fn deserializes_ui_json() {
        let json = r#"{"id":"fx-1","type":"delay","startTime":2.0,"duration":4.0,
                       "dryWet":40,"delayTime":0.25,"feedback":30}"#;
        let effect: Effect = serde_json::from_str(json).unwrap();
        assert_eq!(effect.id(), "fx-1");
        assert_eq!(effect.end_time(), 6.0);
        assert_eq!(
            *effect.kind(),
            EffectKind::Delay { dry_wet: 40.0, delay_time: 0.25, feedback: 30.0 }
        );
    }

    #[test]
    fn deserialization_validates() {
        let json = r#"{"id":"p","type":"pitchshift","startTime":0,"duration":1,"semitones":30}"#;
        assert!(serde_json::from_str::<Effect>(json).is_err());
    }

    #[test]
    fn serializes_with_type_tag() {
        let effect = Effect::new("e", 1.0, 2.0, EffectKind::Eq {
            low_gain: 3.0,
            mid_gain: 0.0,
            high_gain: -3.0,
        })
        .unwrap();
        let value = serde_json::to_value(&effect).unwrap();
        assert_eq!(value["type"], "eq");
        assert_eq!(value["startTime"], 1.0);
        assert_eq!(value["lowGain"], 3.0);
    }

    #[test]
    fn chain_order_sorts_by_start_time() {
        let effects = vec![pan("a", 5.0), pan("b", 1.0), pan("c", 3.0)];
        let ids: Vec<&str> = chain_order(&effects).iter().map(|e| e.id()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn list_rejects_duplicate_ids() {
        let mut list = EffectList::new();
        list.add(pan("a", 0.0)).unwrap();
        assert_eq!(
            list.add(pan("a", 2.0)),
            Err(ValidationError::DuplicateId("a".into()))
        );
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn list_sort_cache_invalidated_on_change() {
        let mut list = EffectList::new();
        list.add(pan("late", 4.0)).unwrap();
        list.add(pan("early", 1.0)).unwrap();
        let ids: Vec<&str> = list.sorted().iter().map(|e| e.id()).collect();
        assert_eq!(ids, ["early", "late"]);

        list.add(pan("first", 0.0)).unwrap();
        let ids: Vec<&str> = list.sorted().iter().map(|e| e.id()).collect();
        assert_eq!(ids, ["first", "early", "late"]);

        assert!(list.remove("early").is_some());
        assert!(list.remove("early").is_none());
        let ids: Vec<&str> = list.sorted().iter().map(|e| e.id()).collect();
        assert_eq!(ids, ["first", "late"]);
    }
}
