//! MP3 encoder: constant-bitrate LAME encoding in 1152-sample frames.

use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, Quality};

use super::{Mp3Bitrate, quantize_i16};
use crate::buffer::SampleBuffer;
use crate::error::EncodeError;

/// Samples per channel in one MPEG-1 Layer III frame.
pub const FRAME_SAMPLES: usize = 1152;

impl Mp3Bitrate {
    fn lame(self) -> Bitrate {
        match self {
            Mp3Bitrate::Kbps128 => Bitrate::Kbps128,
            Mp3Bitrate::Kbps192 => Bitrate::Kbps192,
            Mp3Bitrate::Kbps256 => Bitrate::Kbps256,
            Mp3Bitrate::Kbps320 => Bitrate::Kbps320,
        }
    }
}

/// Encode `buffer` as stereo MP3 at its own sample rate.
///
/// Mono is fed to both encoder channels. An empty buffer yields no bytes.
pub fn encode_mp3(buffer: &SampleBuffer, bitrate: Mp3Bitrate) -> Result<Vec<u8>, EncodeError> {
    if buffer.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder =
        Builder::new().ok_or_else(|| EncodeError::Backend("LAME encoder init failed".into()))?;
    builder
        .set_num_channels(2)
        .map_err(|e| EncodeError::Backend(format!("LAME set channels failed: {e:?}")))?;
    builder
        .set_sample_rate(buffer.sample_rate())
        .map_err(|_| EncodeError::SampleRate(buffer.sample_rate()))?;
    builder
        .set_brate(bitrate.lame())
        .map_err(|e| EncodeError::Backend(format!("LAME set bitrate failed: {e:?}")))?;
    builder
        .set_quality(Quality::Best)
        .map_err(|e| EncodeError::Backend(format!("LAME set quality failed: {e:?}")))?;
    let mut encoder = builder
        .build()
        .map_err(|e| EncodeError::Backend(format!("LAME build failed: {e:?}")))?;

    let left: Vec<i16> = buffer.channel(0).iter().map(|&s| quantize_i16(s)).collect();
    let right: Vec<i16> = if buffer.channel_count() > 1 {
        buffer.channel(1).iter().map(|&s| quantize_i16(s)).collect()
    } else {
        left.clone()
    };

    let mut out: Vec<u8> = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(left.len()));
    for (l, r) in left.chunks(FRAME_SAMPLES).zip(right.chunks(FRAME_SAMPLES)) {
        out.reserve(mp3lame_encoder::max_required_buffer_size(l.len()));
        let written = encoder
            .encode(DualPcm { left: l, right: r }, out.spare_capacity_mut())
            .map_err(|e| EncodeError::Backend(format!("LAME encode failed: {e:?}")))?;
        // SAFETY: the encoder initialised `written` bytes of spare capacity.
        unsafe {
            out.set_len(out.len() + written);
        }
    }

    // Final partial frame plus the encoder's internal lookahead.
    out.reserve(7200);
    let flushed = encoder
        .flush::<FlushNoGap>(out.spare_capacity_mut())
        .map_err(|e| EncodeError::Backend(format!("LAME flush failed: {e:?}")))?;
    // SAFETY: as above.
    unsafe {
        out.set_len(out.len() + flushed);
    }

    log::debug!(
        "encoded {} frames to {} bytes of MP3 at {} kbps",
        buffer.len(),
        out.len(),
        bitrate.kbps()
    );
    Ok(out)
}
