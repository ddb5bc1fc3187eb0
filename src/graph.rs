//! Signal graph: an input node followed by one time-gated stage per effect.
//!
//! Stages run in series in ascending `startTime` order. Outside its window a
//! stage leaves the signal untouched; inside, the processed signal is
//! crossfaded against the dry signal by the window's ramp envelope.

use std::sync::Arc;

use crate::buffer::SampleBuffer;
use crate::config::EngineConfig;
use crate::dsp::chorus::Chorus;
use crate::dsp::compressor::Compressor;
use crate::dsp::delay::FeedbackDelay;
use crate::dsp::distortion::Distortion;
use crate::dsp::envelope::RampEnvelope;
use crate::dsp::eq::ThreeBandEq;
use crate::dsp::pan::Panner;
use crate::dsp::pitch::PitchShifter;
use crate::effect::{Effect, EffectKind, chain_order};

/// Feedback gain of the reverb's single delay tap.
pub const REVERB_FEEDBACK: f64 = 0.3;

/// A pull-based stereo audio source.
pub trait AudioNode: Send {
    fn sample_rate(&self) -> u32;

    /// Absolute index of the next frame this node will produce.
    fn frame(&self) -> u64;

    /// Fill up to `left.len()` frames into `left`/`right` (equal lengths).
    /// Returns how many were written; 0 once the node is exhausted.
    fn pull(&mut self, left: &mut [f32], right: &mut [f32]) -> usize;
}

// ── Input ───────────────────────────────────────────────────

/// Reads a shared sample buffer as stereo, starting at any frame.
///
/// Mono is duplicated to both sides; channels past the second are ignored.
#[derive(Debug, Clone)]
pub struct BufferReader {
    buffer: Arc<SampleBuffer>,
    frame: u64,
}

impl BufferReader {
    pub fn new(buffer: Arc<SampleBuffer>, start_frame: u64) -> Self {
        Self {
            buffer,
            frame: start_frame,
        }
    }

    /// Start reading at a time in seconds.
    pub fn at_time(buffer: Arc<SampleBuffer>, seconds: f64) -> Self {
        let frame = buffer.frame_at(seconds) as u64;
        Self::new(buffer, frame)
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }
}

impl AudioNode for BufferReader {
    fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }

    fn frame(&self) -> u64 {
        self.frame
    }

    fn pull(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
        let start = (self.frame as usize).min(self.buffer.len());
        let n = left.len().min(right.len()).min(self.buffer.len() - start);
        let src_l = &self.buffer.channel(0)[start..start + n];
        let src_r = if self.buffer.channel_count() > 1 {
            &self.buffer.channel(1)[start..start + n]
        } else {
            src_l
        };
        left[..n].copy_from_slice(src_l);
        right[..n].copy_from_slice(src_r);
        self.frame += n as u64;
        n
    }
}

// ── Stages ──────────────────────────────────────────────────

/// The DSP behind one stage, one variant per effect type.
#[derive(Debug, Clone)]
enum Processor {
    Pan(Panner),
    Reverb(FeedbackDelay),
    Delay(FeedbackDelay),
    Eq(ThreeBandEq),
    Compressor(Compressor),
    PitchShift(PitchShifter),
    Distortion(Distortion),
    Chorus(Chorus),
}

impl Processor {
    fn for_effect(kind: &EffectKind, sample_rate: f64) -> Self {
        match *kind {
            EffectKind::Panning { intensity } => Processor::Pan(Panner::from_intensity(intensity)),
            EffectKind::Reverb { dry_wet, decay } => Processor::Reverb(FeedbackDelay::new(
                sample_rate,
                decay / 4.0,
                REVERB_FEEDBACK,
                dry_wet / 100.0,
            )),
            EffectKind::Delay {
                dry_wet,
                delay_time,
                feedback,
            } => Processor::Delay(FeedbackDelay::new(
                sample_rate,
                delay_time,
                feedback / 100.0,
                dry_wet / 100.0,
            )),
            EffectKind::Eq {
                low_gain,
                mid_gain,
                high_gain,
            } => Processor::Eq(ThreeBandEq::new(sample_rate, low_gain, mid_gain, high_gain)),
            EffectKind::Compressor {
                threshold,
                ratio,
                attack,
                release,
            } => Processor::Compressor(Compressor::new(
                sample_rate,
                threshold,
                ratio,
                attack,
                release,
            )),
            EffectKind::PitchShift { semitones } => {
                Processor::PitchShift(PitchShifter::new(sample_rate, semitones))
            }
            EffectKind::Distortion { amount, tone } => {
                Processor::Distortion(Distortion::new(sample_rate, amount / 100.0, tone / 100.0))
            }
            EffectKind::Chorus {
                rate,
                depth,
                dry_wet,
            } => Processor::Chorus(Chorus::new(sample_rate, rate, depth / 100.0, dry_wet / 100.0)),
        }
    }

    #[inline]
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        match self {
            Processor::Pan(p) => p.process(left, right),
            Processor::Reverb(d) | Processor::Delay(d) => d.process(left, right),
            Processor::Eq(eq) => eq.process(left, right),
            Processor::Compressor(c) => c.process(left, right),
            Processor::PitchShift(p) => p.process(left, right),
            Processor::Distortion(d) => d.process(left, right),
            Processor::Chorus(c) => c.process(left, right),
        }
    }
}

/// One effect's time-gated wet/dry stage.
#[derive(Debug, Clone)]
pub struct EffectStage {
    id: String,
    envelope: RampEnvelope,
    processor: Processor,
}

impl EffectStage {
    pub fn new(effect: &Effect, sample_rate: u32, config: &EngineConfig) -> Self {
        let ramped = config.eq_ramp || !matches!(effect.kind(), EffectKind::Eq { .. });
        let envelope = if ramped {
            RampEnvelope::new(effect.start_time(), effect.duration(), config.ramp_fraction)
        } else {
            RampEnvelope::gate(effect.start_time(), effect.duration())
        };
        Self {
            id: effect.id().to_string(),
            envelope,
            processor: Processor::for_effect(effect.kind(), sample_rate as f64),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn envelope(&self) -> &RampEnvelope {
        &self.envelope
    }

    /// Process a block in place. `first_frame` is the absolute frame index of
    /// `left[0]`, which places the block on the effect's timeline.
    pub fn process_block(
        &mut self,
        first_frame: u64,
        sample_rate: u32,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        let sr = sample_rate as f64;
        let block_start = first_frame as f64 / sr;
        let block_end = (first_frame + left.len() as u64) as f64 / sr;
        if block_end < self.envelope.start || block_start > self.envelope.end() {
            return;
        }

        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let t = (first_frame + i as u64) as f64 / sr;
            if !self.envelope.contains(t) {
                continue;
            }
            let level = self.envelope.level(t) as f32;
            let (wet_l, wet_r) = self.processor.process(*l, *r);
            *l += (wet_l - *l) * level;
            *r += (wet_r - *r) * level;
        }
    }
}

// ── Chain ───────────────────────────────────────────────────

/// An input node with effect stages applied in series.
pub struct SignalChain {
    input: Box<dyn AudioNode>,
    stages: Vec<EffectStage>,
}

impl SignalChain {
    pub fn new(input: Box<dyn AudioNode>, effects: &[Effect], config: &EngineConfig) -> Self {
        let sample_rate = input.sample_rate();
        let stages: Vec<EffectStage> = chain_order(effects)
            .into_iter()
            .map(|e| EffectStage::new(e, sample_rate, config))
            .collect();
        log::debug!(
            "signal chain: {}",
            stages.iter().map(|s| s.id()).collect::<Vec<_>>().join(" -> ")
        );
        Self { input, stages }
    }

    /// Stage ids in processing order.
    pub fn stage_ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id()).collect()
    }
}

impl AudioNode for SignalChain {
    fn sample_rate(&self) -> u32 {
        self.input.sample_rate()
    }

    fn frame(&self) -> u64 {
        self.input.frame()
    }

    fn pull(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
        let first_frame = self.input.frame();
        let sample_rate = self.input.sample_rate();
        let n = self.input.pull(left, right);
        for stage in &mut self.stages {
            stage.process_block(first_frame, sample_rate, &mut left[..n], &mut right[..n]);
        }
        n
    }
}

/// Wrap `input` in one stage per effect. With no effects the input is
/// returned as-is.
pub fn build(
    input: Box<dyn AudioNode>,
    effects: &[Effect],
    config: &EngineConfig,
) -> Box<dyn AudioNode> {
    if effects.is_empty() {
        return input;
    }
    Box::new(SignalChain::new(input, effects, config))
}
