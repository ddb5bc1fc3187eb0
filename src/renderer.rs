//! Offline renderer: pulls a whole buffer through its effect chain.
//!
//! Rendering is deterministic: the chain sees absolute frame positions, never
//! wall-clock time, so the same buffer and effects always give the same output
//! whatever the block size.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::buffer::SampleBuffer;
use crate::config::EngineConfig;
use crate::effect::Effect;
use crate::error::RenderError;
use crate::graph::{self, BufferReader};

/// Render `buffer` through `effects` with the default engine settings.
pub fn render(buffer: &SampleBuffer, effects: &[Effect]) -> Result<SampleBuffer, RenderError> {
    render_with_config(buffer, effects, &EngineConfig::default())
}

/// Render `buffer` through `effects`.
///
/// With no effects the result equals the input. Otherwise the output has the
/// input's length and is stereo; mono input is up-mixed first.
pub fn render_with_config(
    buffer: &SampleBuffer,
    effects: &[Effect],
    config: &EngineConfig,
) -> Result<SampleBuffer, RenderError> {
    if effects.is_empty() {
        return Ok(buffer.clone());
    }
    let channels = buffer.channel_count();
    if channels > 2 {
        return Err(RenderError::UnsupportedChannelCount(channels));
    }

    let expected = buffer.len();
    log::debug!(
        "offline render: {expected} frames at {} Hz through {} effects",
        buffer.sample_rate(),
        effects.len()
    );

    let reader = BufferReader::new(Arc::new(buffer.clone()), 0);
    let mut node = graph::build(Box::new(reader), effects, config);

    let mut left = vec![0.0_f32; expected];
    let mut right = vec![0.0_f32; expected];
    let block = config.block_size.max(1);
    let mut rendered = 0;
    while rendered < expected {
        let end = (rendered + block).min(expected);
        let n = node.pull(&mut left[rendered..end], &mut right[rendered..end]);
        if n == 0 {
            break;
        }
        rendered += n;
    }
    if rendered < expected {
        return Err(RenderError::Incomplete { rendered, expected });
    }

    log::debug!("offline render finished: {rendered} frames");
    Ok(SampleBuffer::from_channels(vec![left, right], buffer.sample_rate()))
}

// ── Superseding ─────────────────────────────────────────────

/// Identifies one requested render. Later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RenderTicket(u64);

/// Tracks which render request is the latest, so a result that arrives after
/// a newer request was made is dropped instead of applied.
#[derive(Debug, Default)]
pub struct RenderQueue {
    latest: AtomicU64,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new render request, superseding any in flight.
    pub fn begin(&self) -> RenderTicket {
        RenderTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: RenderTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Hand back `result` only if `ticket` is still the latest request.
    pub fn finish<T>(&self, ticket: RenderTicket, result: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(result)
        } else {
            log::warn!(
                "discarding stale render #{} (latest is #{})",
                ticket.0,
                self.latest.load(Ordering::SeqCst)
            );
            None
        }
    }
}
