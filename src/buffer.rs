//! Sample buffers and selections.
//!
//! Buffers are never mutated after construction. Editing operations
//! (`cut`, `trim`) return a freshly allocated buffer.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Multi-channel 32-bit float audio, all channels the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, ValidationError> {
        if sample_rate == 0 {
            return Err(ValidationError::InvalidBuffer("sample rate must be positive"));
        }
        let Some(first) = channels.first() else {
            return Err(ValidationError::InvalidBuffer("at least one channel is required"));
        };
        let len = first.len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(ValidationError::InvalidBuffer("channel lengths differ"));
        }
        Ok(SampleBuffer {
            channels,
            sample_rate,
        })
    }

    /// Build from channels already known to satisfy the buffer invariants.
    pub(crate) fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(sample_rate > 0 && !channels.is_empty());
        debug_assert!(channels.iter().all(|c| c.len() == channels[0].len()));
        SampleBuffer {
            channels,
            sample_rate,
        }
    }

    /// A zero-filled buffer.
    pub fn silence(
        channel_count: usize,
        frames: usize,
        sample_rate: u32,
    ) -> Result<Self, ValidationError> {
        Self::new(vec![vec![0.0; frames]; channel_count], sample_rate)
    }

    /// Split interleaved samples (`L R L R ...`) into channels.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, ValidationError> {
        if channel_count == 0 {
            return Err(ValidationError::InvalidBuffer("at least one channel is required"));
        }
        if samples.len() % channel_count != 0 {
            return Err(ValidationError::InvalidBuffer(
                "interleaved length is not a multiple of the channel count",
            ));
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Self::new(channels, sample_rate)
    }

    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * self.channel_count());
        for i in 0..self.len() {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Frame index for a time in seconds, clamped to `0..=len`.
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        frame.min(self.len())
    }

    /// Copy of the frames between two times in seconds, each clamped to the buffer.
    pub fn slice_seconds(&self, start: f64, end: f64) -> SampleBuffer {
        let start = self.frame_at(start);
        let end = self.frame_at(end).max(start);
        SampleBuffer {
            channels: self.channels.iter().map(|ch| ch[start..end].to_vec()).collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Remove the selected region, joining what was before and after it.
    pub fn cut(&self, selection: &Selection) -> SampleBuffer {
        let start = self.frame_at(selection.start_time);
        let end = self.frame_at(selection.end_time);
        let channels = self
            .channels
            .iter()
            .map(|ch| {
                let mut out = Vec::with_capacity(ch.len() - (end - start));
                out.extend_from_slice(&ch[..start]);
                out.extend_from_slice(&ch[end..]);
                out
            })
            .collect();
        SampleBuffer {
            channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Keep only the selected region.
    pub fn trim(&self, selection: &Selection) -> SampleBuffer {
        self.slice_seconds(selection.start_time, selection.end_time)
    }
}

/// A time range within one buffer, `0 <= start < end <= duration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    start_time: f64,
    end_time: f64,
}

impl Selection {
    pub fn new(start_time: f64, end_time: f64, duration: f64) -> Result<Self, ValidationError> {
        if !(0.0 <= start_time && start_time < end_time && end_time <= duration) {
            return Err(ValidationError::InvalidSelection {
                start: start_time,
                end: end_time,
                duration,
            });
        }
        Ok(Selection {
            start_time,
            end_time,
        })
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn length(&self) -> f64 {
        self.end_time - self.start_time
    }
}
