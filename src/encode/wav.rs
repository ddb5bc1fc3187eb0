//! WAV encoder: canonical 44-byte RIFF header plus interleaved PCM.

use super::{BitDepth, quantize};
use crate::buffer::SampleBuffer;
use crate::dsp::resample::resample;
use crate::error::EncodeError;

/// Encode `buffer` as PCM WAV at `sample_rate` and `bit_depth`.
///
/// A buffer at another rate is resampled before quantisation. An empty
/// buffer yields a header-only file.
pub fn encode_wav(
    buffer: &SampleBuffer,
    sample_rate: u32,
    bit_depth: BitDepth,
) -> Result<Vec<u8>, EncodeError> {
    if sample_rate == 0 {
        return Err(EncodeError::SampleRate(sample_rate));
    }
    let resampled;
    let buffer = if buffer.sample_rate() == sample_rate {
        buffer
    } else {
        resampled = resample(buffer, sample_rate)?;
        &resampled
    };

    let channels = u16::try_from(buffer.channel_count()).map_err(|_| EncodeError::TooLarge)?;
    let bits_per_sample = bit_depth.bits();
    let bytes_per_sample = bit_depth.bytes();
    let block_align = channels
        .checked_mul(bytes_per_sample as u16)
        .ok_or(EncodeError::TooLarge)?;
    let byte_rate = sample_rate
        .checked_mul(block_align as u32)
        .ok_or(EncodeError::TooLarge)?;
    let data_size = buffer
        .len()
        .checked_mul(block_align as usize)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(EncodeError::TooLarge)?;
    let file_size = data_size.checked_add(36).ok_or(EncodeError::TooLarge)?;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for i in 0..buffer.len() {
        for ch in buffer.channels() {
            let q = quantize(ch[i], bits_per_sample);
            match bit_depth {
                BitDepth::Int16 => buf.extend_from_slice(&(q as i16).to_le_bytes()),
                BitDepth::Int24 => buf.extend_from_slice(&q.to_le_bytes()[..3]),
                BitDepth::Int32 => buf.extend_from_slice(&q.to_le_bytes()),
            }
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(wav: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([wav[at], wav[at + 1]])
    }

    fn u32_at(wav: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([wav[at], wav[at + 1], wav[at + 2], wav[at + 3]])
    }

    #[test]
    fn wav_header_valid() {
        let buf = SampleBuffer::silence(2, 100, 44100).unwrap();
        let wav = encode_wav(&buf, 44100, BitDepth::Int16).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 4), wav.len() as u32 - 8);
        assert_eq!(u32_at(&wav, 16), 16);
        assert_eq!(u16_at(&wav, 20), 1);
        assert_eq!(u16_at(&wav, 22), 2);
        assert_eq!(u32_at(&wav, 24), 44100);
        assert_eq!(u32_at(&wav, 28), 44100 * 4);
        assert_eq!(u16_at(&wav, 32), 4);
        assert_eq!(u16_at(&wav, 34), 16);
    }

    #[test]
    fn wav_size_correct() {
        let buf = SampleBuffer::silence(2, 22050, 44100).unwrap();
        let wav = encode_wav(&buf, 44100, BitDepth::Int16).unwrap();
        // 22050 frames * 2 channels * 2 bytes
        assert_eq!(u32_at(&wav, 40), 88200);
        assert_eq!(wav.len(), 44 + 88200);
    }

    #[test]
    fn empty_buffer_is_header_only() {
        let buf = SampleBuffer::silence(1, 0, 48000).unwrap();
        let wav = encode_wav(&buf, 48000, BitDepth::Int24).unwrap();
        assert_eq!(wav.len(), 44);
        assert_eq!(u32_at(&wav, 40), 0);
        assert_eq!(u32_at(&wav, 4), 36);
    }

    #[test]
    fn samples_interleave_and_scale() {
        let buf = SampleBuffer::new(vec![vec![1.0, -1.0], vec![-0.5, 0.0]], 8000).unwrap();
        let wav = encode_wav(&buf, 8000, BitDepth::Int16).unwrap();
        let pcm: Vec<i16> = wav[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(pcm, [32767, -16384, -32768, 0]);
    }

    #[test]
    fn twenty_four_bit_writes_three_bytes() {
        let buf = SampleBuffer::new(vec![vec![1.0, -1.0]], 8000).unwrap();
        let wav = encode_wav(&buf, 8000, BitDepth::Int24).unwrap();
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(&wav[44..50], &[0xFF, 0xFF, 0x7F, 0x00, 0x00, 0x80]);
        assert_eq!(u16_at(&wav, 32), 3);
    }

    #[test]
    fn thirty_two_bit_extremes() {
        let buf = SampleBuffer::new(vec![vec![-1.0]], 8000).unwrap();
        let wav = encode_wav(&buf, 8000, BitDepth::Int32).unwrap();
        assert_eq!(i32::from_le_bytes([wav[44], wav[45], wav[46], wav[47]]), i32::MIN);
    }

    #[test]
    fn resamples_before_quantising() {
        let buf = SampleBuffer::silence(1, 44100, 44100).unwrap();
        let wav = encode_wav(&buf, 48000, BitDepth::Int16).unwrap();
        assert_eq!(u32_at(&wav, 24), 48000);
        assert_eq!(u32_at(&wav, 40), 48000 * 2);
    }

    #[test]
    fn zero_rate_is_rejected() {
        let buf = SampleBuffer::silence(1, 10, 44100).unwrap();
        assert_eq!(
            encode_wav(&buf, 0, BitDepth::Int16).unwrap_err(),
            EncodeError::SampleRate(0)
        );
    }
}
