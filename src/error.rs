use thiserror::Error;

/// Top-level error for everything the core can report to a caller.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("Encode failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("Resample failed: {0}")]
    Resample(#[from] ResampleError),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A descriptor, track, selection or setting was rejected at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("duration must be greater than zero, got {0}")]
    NonPositiveDuration(f64),
    #[error("start time must be zero or positive, got {0}")]
    NegativeStartTime(f64),
    #[error("id must not be empty")]
    EmptyId,
    #[error("id '{0}' is already in use")]
    DuplicateId(String),
    #[error("no track with id '{0}'")]
    UnknownTrack(String),
    #[error("selection {start}..{end} does not fit a buffer of {duration}s")]
    InvalidSelection { start: f64, end: f64, duration: f64 },
    #[error("unsupported {what}: {value}")]
    Unsupported { what: &'static str, value: u32 },
    #[error("invalid sample buffer: {0}")]
    InvalidBuffer(&'static str),
}

/// The offline renderer could not produce a complete output buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("cannot render {0} channels (only mono and stereo are supported)")]
    UnsupportedChannelCount(usize),
    #[error("render stopped after {rendered} of {expected} frames")]
    Incomplete { rendered: usize, expected: usize },
}

/// An encoder failed; no partial output is ever returned alongside this.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("unsupported sample rate {0} Hz")]
    SampleRate(u32),
    #[error("encoded data would exceed the 4 GiB RIFF limit")]
    TooLarge,
    #[error("{0} export is not available in this build")]
    FormatUnavailable(&'static str),
    #[error("encoder backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Resample(#[from] ResampleError),
}

/// Sample-rate conversion could not run.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{from} Hz -> {to} Hz: {reason}")]
pub struct ResampleError {
    pub from: u32,
    pub to: u32,
    pub reason: String,
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_field_and_bounds() {
        let e = ValidationError::OutOfRange {
            field: "reverb.decay",
            value: 12.0,
            min: 0.1,
            max: 10.0,
        };
        assert_eq!(e.to_string(), "reverb.decay = 12 is outside 0.1..=10");
    }

    #[test]
    fn core_error_wraps_sources() {
        let e: CoreError = RenderError::UnsupportedChannelCount(6).into();
        assert!(matches!(e, CoreError::Render(_)));
        assert!(e.to_string().contains("6 channels"));
    }
}
