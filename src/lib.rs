pub mod buffer;
pub mod config;
pub mod dsp;
pub mod effect;
pub mod encode;
pub mod error;
pub mod export;
pub mod graph;
pub mod mixer;
pub mod project;
pub mod renderer;
pub mod scheduler;

pub use buffer::{SampleBuffer, Selection};
pub use config::EngineConfig;
pub use effect::{Effect, EffectKind, EffectList};
pub use error::{CoreError, EncodeError, RenderError, ValidationError};
pub use export::{ExportSettings, export};
pub use mixer::{Track, TrackRegistry, TrackUpdate};
pub use project::Project;
pub use renderer::render;
pub use scheduler::{RealtimeScheduler, create_realtime_source};

use serde::Serialize;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the wavecut-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

fn js_buffer(samples: &[f32], channel_count: usize, sample_rate: u32) -> Result<SampleBuffer, JsValue> {
    SampleBuffer::from_interleaved(samples, channel_count, sample_rate).map_err(js_err)
}

/// Rendered audio handed back to JS, samples interleaved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderedAudio {
    channel_count: usize,
    sample_rate: u32,
    samples: Vec<f32>,
}

/// WASM-exposed: validate one effect descriptor object.
/// Returns the descriptor as stored, or an error naming the bad field.
#[wasm_bindgen]
pub fn validate_effect(descriptor: JsValue) -> Result<JsValue, JsValue> {
    let effect: Effect = serde_wasm_bindgen::from_value(descriptor).map_err(js_err)?;
    serde_wasm_bindgen::to_value(&effect).map_err(js_err)
}

/// WASM-exposed: render interleaved samples through an array of effect
/// descriptors. Returns `{channelCount, sampleRate, samples}`.
#[wasm_bindgen]
pub fn render_offline(
    samples: &[f32],
    channel_count: usize,
    sample_rate: u32,
    effects: JsValue,
) -> Result<JsValue, JsValue> {
    let buffer = js_buffer(samples, channel_count, sample_rate)?;
    let effects: Vec<Effect> = serde_wasm_bindgen::from_value(effects).map_err(js_err)?;
    let rendered = render(&buffer, &effects).map_err(js_err)?;
    let out = RenderedAudio {
        channel_count: rendered.channel_count(),
        sample_rate: rendered.sample_rate(),
        samples: rendered.to_interleaved(),
    };
    serde_wasm_bindgen::to_value(&out).map_err(js_err)
}

/// WASM-exposed: encode interleaved samples to a WAV byte array.
#[wasm_bindgen]
pub fn export_wav(
    samples: &[f32],
    channel_count: usize,
    sample_rate: u32,
    target_sample_rate: u32,
    bit_depth: u16,
) -> Result<Vec<u8>, JsValue> {
    let buffer = js_buffer(samples, channel_count, sample_rate)?;
    let bit_depth = encode::BitDepth::try_from(bit_depth).map_err(js_err)?;
    let settings = ExportSettings::Wav {
        sample_rate: target_sample_rate,
        bit_depth,
    };
    export(&buffer, &settings).map_err(js_err)
}

/// WASM-exposed: encode interleaved samples to an MP3 byte array.
#[cfg(feature = "mp3")]
#[wasm_bindgen]
pub fn export_mp3(
    samples: &[f32],
    channel_count: usize,
    sample_rate: u32,
    bitrate: u32,
) -> Result<Vec<u8>, JsValue> {
    let buffer = js_buffer(samples, channel_count, sample_rate)?;
    let bitrate = encode::Mp3Bitrate::try_from(bitrate).map_err(js_err)?;
    export(&buffer, &ExportSettings::Mp3 { bitrate }).map_err(js_err)
}

/// WASM-exposed: encode interleaved samples per an export settings object
/// (`{format: "wav", sampleRate, bitDepth}` or `{format: "mp3", bitrate}`).
#[wasm_bindgen]
pub fn export_audio(
    samples: &[f32],
    channel_count: usize,
    sample_rate: u32,
    settings: JsValue,
) -> Result<Vec<u8>, JsValue> {
    let buffer = js_buffer(samples, channel_count, sample_rate)?;
    let settings: ExportSettings = serde_wasm_bindgen::from_value(settings).map_err(js_err)?;
    export(&buffer, &settings).map_err(js_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn export_wav_from_interleaved() {
        let samples = [0.0_f32; 20];
        let bytes = export_wav(&samples, 2, 44100, 44100, 16).unwrap();
        assert_eq!(bytes.len(), 44 + 20 * 2);
    }
}
