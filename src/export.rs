//! Export settings and format dispatch.
//!
//! Settings arrive from the UI as JSON, tagged by `format`:
//!
//! ```json
//! { "format": "wav", "sampleRate": 48000, "bitDepth": 24 }
//! { "format": "mp3", "bitrate": 320 }
//! ```

use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;
use crate::encode::wav::encode_wav;
use crate::encode::{BitDepth, Mp3Bitrate};
use crate::error::{CoreError, ValidationError};

/// Sample rates offered for WAV export.
pub const WAV_SAMPLE_RATES: [u32; 2] = [44100, 48000];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ExportSettings {
    Wav { sample_rate: u32, bit_depth: BitDepth },
    Mp3 { bitrate: Mp3Bitrate },
}

impl ExportSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            ExportSettings::Wav { sample_rate, .. } if !WAV_SAMPLE_RATES.contains(&sample_rate) => {
                Err(ValidationError::Unsupported {
                    what: "WAV sample rate",
                    value: sample_rate,
                })
            }
            _ => Ok(()),
        }
    }

    /// File extension for the format, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportSettings::Wav { .. } => "wav",
            ExportSettings::Mp3 { .. } => "mp3",
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: ExportSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Encode `buffer` per `settings`. All or nothing: on error no bytes are
/// returned.
pub fn export(buffer: &SampleBuffer, settings: &ExportSettings) -> Result<Vec<u8>, CoreError> {
    settings.validate()?;
    let bytes = match *settings {
        ExportSettings::Wav {
            sample_rate,
            bit_depth,
        } => encode_wav(buffer, sample_rate, bit_depth)?,
        ExportSettings::Mp3 { bitrate } => encode_mp3(buffer, bitrate)?,
    };
    log::info!("exported {} ({} bytes)", settings.extension(), bytes.len());
    Ok(bytes)
}

#[cfg(feature = "mp3")]
fn encode_mp3(buffer: &SampleBuffer, bitrate: Mp3Bitrate) -> Result<Vec<u8>, crate::error::EncodeError> {
    crate::encode::mp3::encode_mp3(buffer, bitrate)
}

#[cfg(not(feature = "mp3"))]
fn encode_mp3(_buffer: &SampleBuffer, _bitrate: Mp3Bitrate) -> Result<Vec<u8>, crate::error::EncodeError> {
    Err(crate::error::EncodeError::FormatUnavailable("mp3"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_settings() {
        let wav = ExportSettings::from_json(r#"{"format":"wav","sampleRate":48000,"bitDepth":24}"#).unwrap();
        assert_eq!(wav, ExportSettings::Wav {
            sample_rate: 48000,
            bit_depth: BitDepth::Int24
        });
        let mp3 = ExportSettings::from_json(r#"{"format":"mp3","bitrate":320}"#).unwrap();
        assert_eq!(mp3, ExportSettings::Mp3 {
            bitrate: Mp3Bitrate::Kbps320
        });
    }

    #[test]
    fn rejects_unsupported_values() {
        assert!(ExportSettings::from_json(r#"{"format":"wav","sampleRate":22050,"bitDepth":16}"#).is_err());
        assert!(ExportSettings::from_json(r#"{"format":"wav","sampleRate":44100,"bitDepth":12}"#).is_err());
        assert!(ExportSettings::from_json(r#"{"format":"mp3","bitrate":100}"#).is_err());
        assert!(ExportSettings::from_json(r#"{"format":"flac"}"#).is_err());
    }

    #[test]
    fn dispatches_wav() {
        let buf = SampleBuffer::silence(2, 10, 44100).unwrap();
        let settings = ExportSettings::Wav {
            sample_rate: 44100,
            bit_depth: BitDepth::Int32,
        };
        let bytes = export(&buf, &settings).unwrap();
        assert_eq!(bytes.len(), 44 + 10 * 2 * 4);
        assert_eq!(settings.extension(), "wav");
    }

    #[test]
    fn validation_runs_before_encoding() {
        let buf = SampleBuffer::silence(1, 10, 44100).unwrap();
        let settings = ExportSettings::Wav {
            sample_rate: 96000,
            bit_depth: BitDepth::Int16,
        };
        assert!(matches!(export(&buf, &settings), Err(CoreError::Validation(_))));
    }

    #[cfg(feature = "mp3")]
    #[test]
    fn dispatches_mp3() {
        let buf = SampleBuffer::silence(2, 4000, 44100).unwrap();
        let bytes = export(&buf, &ExportSettings::Mp3 {
            bitrate: Mp3Bitrate::Kbps128,
        })
        .unwrap();
        assert!(!bytes.is_empty());
    }
}
