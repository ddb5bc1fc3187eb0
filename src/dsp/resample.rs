//! Sample-rate conversion through rubato's FFT resampler.

use rubato::{FftFixedIn, Resampler};

use crate::buffer::SampleBuffer;
use crate::error::ResampleError;

/// Input frames handed to the resampler per call.
const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Resample every channel of `buffer` to `target_rate`.
///
/// Returns a clone when the rates already match. Output length is the input
/// duration at the new rate, rounded to the nearest frame, and the
/// resampler's own latency is trimmed off the front so the result stays
/// aligned with the input.
pub fn resample(buffer: &SampleBuffer, target_rate: u32) -> Result<SampleBuffer, ResampleError> {
    let source_rate = buffer.sample_rate();
    if source_rate == target_rate {
        return Ok(buffer.clone());
    }
    let fail = |reason: String| ResampleError {
        from: source_rate,
        to: target_rate,
        reason,
    };
    if target_rate == 0 {
        return Err(fail("target rate must be positive".into()));
    }

    let out_len = (buffer.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    let channels = buffer.channel_count();
    if out_len == 0 {
        return Ok(SampleBuffer::from_channels(vec![Vec::new(); channels], target_rate));
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        channels,
    )
    .map_err(|e| fail(e.to_string()))?;
    let delay = resampler.output_delay();
    let wanted = out_len + delay;

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted + CHUNK_SIZE); channels];
    let mut chunk: Vec<Vec<f32>> = vec![Vec::new(); channels];
    let mut pos = 0;
    // Past the end of the input the resampler is fed silence until the
    // delayed tail has come out.
    while output[0].len() < wanted {
        let needed = resampler.input_frames_next();
        for (dst, src) in chunk.iter_mut().zip(buffer.channels()) {
            dst.clear();
            dst.resize(needed, 0.0);
            if pos < src.len() {
                let n = needed.min(src.len() - pos);
                dst[..n].copy_from_slice(&src[pos..pos + n]);
            }
        }
        let processed = resampler
            .process(&chunk, None)
            .map_err(|e| fail(e.to_string()))?;
        for (out, block) in output.iter_mut().zip(processed) {
            out.extend_from_slice(&block);
        }
        pos += needed;
    }

    for out in &mut output {
        out.drain(..delay);
        out.truncate(out_len);
    }
    log::debug!(
        "resampled {} frames at {source_rate} Hz to {out_len} frames at {target_rate} Hz",
        buffer.len()
    );
    Ok(SampleBuffer::from_channels(output, target_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frames: usize, sample_rate: u32, freq: f32) -> SampleBuffer {
        let data: Vec<f32> = (0..frames)
            .map(|i| (i as f32 * freq * std::f32::consts::TAU / sample_rate as f32).sin() * 0.5)
            .collect();
        SampleBuffer::new(vec![data.clone(), data], sample_rate).unwrap()
    }

    #[test]
    fn same_rate_is_clone() {
        let buf = SampleBuffer::new(vec![vec![0.1, 0.2, 0.3]], 44100).unwrap();
        assert_eq!(resample(&buf, 44100).unwrap(), buf);
    }

    #[test]
    fn preserves_duration() {
        let buf = SampleBuffer::silence(2, 44100, 44100).unwrap();
        let out = resample(&buf, 48000).unwrap();
        assert_eq!(out.len(), 48000);
        assert_eq!(out.channel_count(), 2);
        assert!((out.duration() - buf.duration()).abs() < 1e-9);
    }

    #[test]
    fn tone_stays_in_phase() {
        let out = resample(&sine(44100, 44100, 440.0), 48000).unwrap();
        let expected = sine(48000, 48000, 440.0);
        // Skip the edges, where the filter sees the zero padding.
        for i in 2000..46000 {
            let diff = (out.channel(0)[i] - expected.channel(0)[i]).abs();
            assert!(diff < 0.05, "frame {i} off by {diff}");
        }
        assert_eq!(out.channel(0), out.channel(1));
    }

    #[test]
    fn downsampling_keeps_length() {
        let out = resample(&sine(9600, 96000, 1000.0), 44100).unwrap();
        assert_eq!(out.len(), 4410);
        assert_eq!(out.sample_rate(), 44100);
    }

    #[test]
    fn empty_and_zero_rate() {
        let empty = SampleBuffer::silence(2, 0, 44100).unwrap();
        let out = resample(&empty, 48000).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.channel_count(), 2);

        let buf = SampleBuffer::silence(1, 10, 44100).unwrap();
        let err = resample(&buf, 0).unwrap_err();
        assert_eq!(err.to, 0);
    }
}
