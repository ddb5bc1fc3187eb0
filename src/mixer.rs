//! Track mixer: sums tracks to stereo with volume, pan, mute and solo.
//!
//! The same inclusion and gain rules drive the offline [`mix`] and the live
//! [`MixNode`], whose controls can be changed while it is playing.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;
use crate::dsp::pan::pan_gains;
use crate::dsp::resample::resample;
use crate::error::{CoreError, ValidationError};
use crate::graph::{AudioNode, BufferReader};

// ── Tracks ──────────────────────────────────────────────────

/// One imported file and its mixer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    /// 0..=100
    pub volume: f64,
    /// -100 (left) ..= 100 (right)
    pub pan: f64,
    pub is_muted: bool,
    pub is_solo: bool,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channel_count: usize,
}

impl Track {
    /// A track at full volume, centred, describing `buffer`.
    pub fn from_buffer(id: impl Into<String>, name: impl Into<String>, buffer: &SampleBuffer) -> Self {
        Track {
            id: id.into(),
            name: name.into(),
            volume: 100.0,
            pan: 0.0,
            is_muted: false,
            is_solo: false,
            duration_seconds: buffer.duration(),
            sample_rate: buffer.sample_rate(),
            channel_count: buffer.channel_count(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        check_volume(self.volume)?;
        check_pan(self.pan)
    }

    /// Whether this track is heard, given whether any track is soloed.
    pub fn is_included(&self, any_solo: bool) -> bool {
        included(self.is_muted, self.is_solo, any_solo)
    }

    /// Left and right gains from volume and pan.
    pub fn gains(&self) -> (f32, f32) {
        gains(self.volume, self.pan)
    }

    fn describe(&mut self, buffer: &SampleBuffer) {
        self.duration_seconds = buffer.duration();
        self.sample_rate = buffer.sample_rate();
        self.channel_count = buffer.channel_count();
    }
}

fn check_volume(volume: f64) -> Result<(), ValidationError> {
    if (0.0..=100.0).contains(&volume) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: "track.volume",
            value: volume,
            min: 0.0,
            max: 100.0,
        })
    }
}

fn check_pan(pan: f64) -> Result<(), ValidationError> {
    if (-100.0..=100.0).contains(&pan) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: "track.pan",
            value: pan,
            min: -100.0,
            max: 100.0,
        })
    }
}

/// Solo on any track silences every non-solo track, muted or not.
/// Otherwise only muted tracks are excluded.
#[inline]
fn included(is_muted: bool, is_solo: bool, any_solo: bool) -> bool {
    if any_solo { is_solo } else { !is_muted }
}

/// Length of a mix: the longest included entry, or the longest of all when
/// nothing is included. Entries are `(length, muted, solo)`.
pub(crate) fn mix_extent<I>(entries: I) -> f64
where
    I: Iterator<Item = (f64, bool, bool)> + Clone,
{
    let any_solo = entries.clone().any(|(_, _, solo)| solo);
    let longest = |included_only: bool| {
        entries
            .clone()
            .filter(|&(_, muted, solo)| !included_only || included(muted, solo, any_solo))
            .map(|(length, _, _)| length)
            .reduce(f64::max)
    };
    longest(true).or_else(|| longest(false)).unwrap_or(0.0)
}

#[inline]
fn gains(volume: f64, pan: f64) -> (f32, f32) {
    let level = (volume.clamp(0.0, 100.0) / 100.0) as f32;
    let (l, r) = pan_gains((pan / 100.0) as f32);
    (level * l, level * r)
}

/// A partial edit of a track's mixer settings. Absent fields are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackUpdate {
    pub volume: Option<f64>,
    pub pan: Option<f64>,
    pub is_muted: Option<bool>,
    pub is_solo: Option<bool>,
}

impl TrackUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(v) = self.volume {
            check_volume(v)?;
        }
        if let Some(p) = self.pan {
            check_pan(p)?;
        }
        Ok(())
    }

    fn apply(&self, track: &mut Track) {
        if let Some(v) = self.volume {
            track.volume = v;
        }
        if let Some(p) = self.pan {
            track.pan = p;
        }
        if let Some(m) = self.is_muted {
            track.is_muted = m;
        }
        if let Some(s) = self.is_solo {
            track.is_solo = s;
        }
    }
}

// ── Registry ────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Entry {
    track: Track,
    buffer: Arc<SampleBuffer>,
}

/// Tracks and their buffers, keyed by track id, in import order.
///
/// A track record and its buffer are added and removed together.
#[derive(Debug, Clone, Default)]
pub struct TrackRegistry {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly imported track. Its duration, rate and channel
    /// count are taken from `buffer`.
    pub fn insert(&mut self, mut track: Track, buffer: SampleBuffer) -> Result<(), ValidationError> {
        track.validate()?;
        if self.entries.contains_key(&track.id) {
            return Err(ValidationError::DuplicateId(track.id));
        }
        track.describe(&buffer);
        self.order.push(track.id.clone());
        self.entries.insert(
            track.id.clone(),
            Entry {
                track,
                buffer: Arc::new(buffer),
            },
        );
        Ok(())
    }

    pub fn update(&mut self, id: &str, update: &TrackUpdate) -> Result<&Track, ValidationError> {
        update.validate()?;
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ValidationError::UnknownTrack(id.to_string()))?;
        update.apply(&mut entry.track);
        Ok(&entry.track)
    }

    /// Swap in an edited buffer, e.g. after a cut.
    pub fn replace_buffer(&mut self, id: &str, buffer: SampleBuffer) -> Result<(), ValidationError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ValidationError::UnknownTrack(id.to_string()))?;
        entry.track.describe(&buffer);
        entry.buffer = Arc::new(buffer);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<(Track, Arc<SampleBuffer>)> {
        let entry = self.entries.remove(id)?;
        self.order.retain(|t| t != id);
        Some((entry.track, entry.buffer))
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.entries.get(id).map(|e| &e.track)
    }

    pub fn buffer(&self, id: &str) -> Option<&Arc<SampleBuffer>> {
        self.entries.get(id).map(|e| &e.buffer)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tracks with their buffers, in import order.
    pub fn iter(&self) -> impl Iterator<Item = (&Track, &Arc<SampleBuffer>)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| (&e.track, &e.buffer))
    }

    /// Longest track duration in seconds.
    pub fn duration(&self) -> f64 {
        self.iter().map(|(t, _)| t.duration_seconds).fold(0.0, f64::max)
    }

    pub fn mix(&self, sample_rate: u32) -> Result<SampleBuffer, CoreError> {
        mix(self.iter().map(|(t, b)| (t, b.as_ref())), sample_rate, self.duration())
    }
}

// ── Offline mix ─────────────────────────────────────────────

/// Mix tracks to a stereo buffer at `sample_rate`.
///
/// Output length is the longest included track. When nothing is included the
/// result is `duration` seconds of silence.
pub fn mix<'a>(
    tracks: impl IntoIterator<Item = (&'a Track, &'a SampleBuffer)>,
    sample_rate: u32,
    duration: f64,
) -> Result<SampleBuffer, CoreError> {
    if sample_rate == 0 {
        return Err(ValidationError::InvalidBuffer("sample rate must be positive").into());
    }
    let tracks: Vec<(&Track, &SampleBuffer)> = tracks.into_iter().collect();
    let any_solo = tracks.iter().any(|(t, _)| t.is_solo);

    let sources = tracks
        .into_iter()
        .filter(|(t, _)| t.is_included(any_solo))
        .map(|(t, b)| -> Result<_, CoreError> {
            let buffer = if b.sample_rate() == sample_rate {
                Cow::Borrowed(b)
            } else {
                Cow::Owned(resample(b, sample_rate)?)
            };
            Ok((t.gains(), buffer))
        })
        .collect::<Result<Vec<((f32, f32), Cow<'_, SampleBuffer>)>, _>>()?;

    let frames = if sources.is_empty() {
        (duration.max(0.0) * sample_rate as f64).round() as usize
    } else {
        sources.iter().map(|(_, b)| b.len()).max().unwrap_or(0)
    };

    let mut left = vec![0.0_f32; frames];
    let mut right = vec![0.0_f32; frames];
    for ((gl, gr), buffer) in &sources {
        let src_l = buffer.channel(0);
        let src_r = if buffer.channel_count() > 1 { buffer.channel(1) } else { src_l };
        for (i, (&l, &r)) in src_l.iter().zip(src_r).enumerate() {
            left[i] += l * gl;
            right[i] += r * gr;
        }
    }
    log::debug!("mixed {} of the tracks into {frames} frames", sources.len());
    Ok(SampleBuffer::new(vec![left, right], sample_rate)?)
}

// ── Live controls ───────────────────────────────────────────

/// Mixer settings shared with a playing graph. Writes take effect on the next
/// block the graph pulls.
#[derive(Debug)]
pub struct TrackControls {
    volume: AtomicU64,
    pan: AtomicU64,
    muted: AtomicBool,
    solo: AtomicBool,
}

impl TrackControls {
    pub fn new(track: &Track) -> Self {
        Self {
            volume: AtomicU64::new(track.volume.to_bits()),
            pan: AtomicU64::new(track.pan.to_bits()),
            muted: AtomicBool::new(track.is_muted),
            solo: AtomicBool::new(track.is_solo),
        }
    }

    /// Controls for a master bus at `volume`, centred.
    pub fn master(volume: f64) -> Self {
        Self {
            volume: AtomicU64::new(volume.to_bits()),
            pan: AtomicU64::new(0.0_f64.to_bits()),
            muted: AtomicBool::new(false),
            solo: AtomicBool::new(false),
        }
    }

    pub fn apply(&self, update: &TrackUpdate) {
        if let Some(v) = update.volume {
            self.volume.store(v.to_bits(), Ordering::Relaxed);
        }
        if let Some(p) = update.pan {
            self.pan.store(p.to_bits(), Ordering::Relaxed);
        }
        if let Some(m) = update.is_muted {
            self.muted.store(m, Ordering::Relaxed);
        }
        if let Some(s) = update.is_solo {
            self.solo.store(s, Ordering::Relaxed);
        }
    }

    pub fn volume(&self) -> f64 {
        f64::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub fn pan(&self) -> f64 {
        f64::from_bits(self.pan.load(Ordering::Relaxed))
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn is_solo(&self) -> bool {
        self.solo.load(Ordering::Relaxed)
    }

    /// Current left/right gains, zero when the track is excluded.
    pub fn gains(&self, any_solo: bool) -> (f32, f32) {
        if included(self.is_muted(), self.is_solo(), any_solo) {
            gains(self.volume(), self.pan())
        } else {
            (0.0, 0.0)
        }
    }
}

/// A caller's handle on live controls. Once the playing graph is gone every
/// write is ignored and reports `false`.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    controls: Weak<TrackControls>,
}

impl ControlHandle {
    pub fn new(controls: &Arc<TrackControls>) -> Self {
        Self {
            controls: Arc::downgrade(controls),
        }
    }

    pub fn is_live(&self) -> bool {
        self.controls.strong_count() > 0
    }

    /// Apply `update` to the running graph. Out-of-range values are rejected
    /// and leave the controls untouched.
    pub fn apply(&self, update: &TrackUpdate) -> Result<bool, ValidationError> {
        update.validate()?;
        match self.controls.upgrade() {
            Some(controls) => {
                controls.apply(update);
                Ok(true)
            }
            None => {
                log::warn!("control write after playback ended was ignored");
                Ok(false)
            }
        }
    }

    pub fn set_volume(&self, volume: f64) -> Result<bool, ValidationError> {
        self.apply(&TrackUpdate {
            volume: Some(volume),
            ..TrackUpdate::default()
        })
    }

    pub fn set_pan(&self, pan: f64) -> Result<bool, ValidationError> {
        self.apply(&TrackUpdate {
            pan: Some(pan),
            ..TrackUpdate::default()
        })
    }

    pub fn set_muted(&self, muted: bool) -> Result<bool, ValidationError> {
        self.apply(&TrackUpdate {
            is_muted: Some(muted),
            ..TrackUpdate::default()
        })
    }

    pub fn set_solo(&self, solo: bool) -> Result<bool, ValidationError> {
        self.apply(&TrackUpdate {
            is_solo: Some(solo),
            ..TrackUpdate::default()
        })
    }
}

// ── Live mix ────────────────────────────────────────────────

/// Mixes track buffers block by block, reading gains from live controls.
///
/// Buffers must already be at the node's sample rate. The node ends with the
/// longest track that is currently heard, so a solo or mute written during
/// playback moves the end the same way it would move an offline mix.
pub struct MixNode {
    inputs: Vec<(BufferReader, Arc<TrackControls>)>,
    sample_rate: u32,
    frame: u64,
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
}

impl MixNode {
    pub fn new(
        inputs: Vec<(Arc<SampleBuffer>, Arc<TrackControls>)>,
        sample_rate: u32,
        start_frame: u64,
    ) -> Self {
        let inputs = inputs
            .into_iter()
            .map(|(buffer, controls)| (BufferReader::new(buffer, start_frame), controls))
            .collect();
        Self {
            inputs,
            sample_rate,
            frame: start_frame,
            scratch_left: Vec::new(),
            scratch_right: Vec::new(),
        }
    }

    /// Frames in the mix under the current control settings.
    pub fn length(&self) -> u64 {
        mix_extent(self.inputs.iter().map(|(reader, controls)| {
            (
                reader.buffer().len() as f64,
                controls.is_muted(),
                controls.is_solo(),
            )
        })) as u64
    }
}

impl AudioNode for MixNode {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame(&self) -> u64 {
        self.frame
    }

    fn pull(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
        let remaining = self.length().saturating_sub(self.frame) as usize;
        let n = left.len().min(right.len()).min(remaining);
        left[..n].fill(0.0);
        right[..n].fill(0.0);
        if self.scratch_left.len() < n {
            self.scratch_left.resize(n, 0.0);
            self.scratch_right.resize(n, 0.0);
        }

        let any_solo = self.inputs.iter().any(|(_, c)| c.is_solo());
        for (reader, controls) in &mut self.inputs {
            let got = reader.pull(&mut self.scratch_left[..n], &mut self.scratch_right[..n]);
            let (gl, gr) = controls.gains(any_solo);
            if gl == 0.0 && gr == 0.0 {
                continue;
            }
            for i in 0..got {
                left[i] += self.scratch_left[i] * gl;
                right[i] += self.scratch_right[i] * gr;
            }
        }
        self.frame += n as u64;
        n
    }
}
