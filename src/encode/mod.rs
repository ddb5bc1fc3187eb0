//! Encoders: sample buffers to WAV or MP3 bytes.
//!
//! Both encoders quantise with the same asymmetric rule: clamp to [-1, 1],
//! scale negative samples by the full negative range and non-negative
//! samples by the positive range.

#[cfg(feature = "mp3")]
pub mod mp3;
pub mod wav;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// PCM sample width for WAV export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    Int16,
    Int24,
    Int32,
}

impl BitDepth {
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Int32 => 32,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = ValidationError;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            16 => Ok(BitDepth::Int16),
            24 => Ok(BitDepth::Int24),
            32 => Ok(BitDepth::Int32),
            other => Err(ValidationError::Unsupported {
                what: "bit depth",
                value: other as u32,
            }),
        }
    }
}

impl From<BitDepth> for u16 {
    fn from(depth: BitDepth) -> u16 {
        depth.bits()
    }
}

/// Constant bitrate for MP3 export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Mp3Bitrate {
    Kbps128,
    Kbps192,
    Kbps256,
    Kbps320,
}

impl Mp3Bitrate {
    pub fn kbps(self) -> u32 {
        match self {
            Mp3Bitrate::Kbps128 => 128,
            Mp3Bitrate::Kbps192 => 192,
            Mp3Bitrate::Kbps256 => 256,
            Mp3Bitrate::Kbps320 => 320,
        }
    }
}

impl TryFrom<u32> for Mp3Bitrate {
    type Error = ValidationError;

    fn try_from(kbps: u32) -> Result<Self, Self::Error> {
        match kbps {
            128 => Ok(Mp3Bitrate::Kbps128),
            192 => Ok(Mp3Bitrate::Kbps192),
            256 => Ok(Mp3Bitrate::Kbps256),
            320 => Ok(Mp3Bitrate::Kbps320),
            other => Err(ValidationError::Unsupported {
                what: "MP3 bitrate",
                value: other,
            }),
        }
    }
}

impl From<Mp3Bitrate> for u32 {
    fn from(bitrate: Mp3Bitrate) -> u32 {
        bitrate.kbps()
    }
}

/// Quantise one sample to a signed integer of `bits` width.
#[inline]
pub(crate) fn quantize(sample: f32, bits: u16) -> i32 {
    let s = sample.clamp(-1.0, 1.0) as f64;
    let (negative, positive) = match bits {
        16 => (0x8000 as f64, 0x7FFF as f64),
        24 => (0x80_0000 as f64, 0x7F_FFFF as f64),
        _ => (0x8000_0000_u32 as f64, 0x7FFF_FFFF as f64),
    };
    if s < 0.0 {
        (s * negative) as i32
    } else {
        (s * positive) as i32
    }
}

#[inline]
pub(crate) fn quantize_i16(sample: f32) -> i16 {
    quantize(sample, 16) as i16
}
