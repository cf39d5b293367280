pub mod chord;
pub mod dsp;
pub mod error;
pub mod key;
pub mod pitch;

use crate::chord::{ChordRequest, ChordSpec, TriadQuality, build_chord_notes, preset_chord_notes};
use crate::dsp::settings::SynthSettings;
use crate::error::HarmonyError;
use crate::key::{Mode, roman_numeral};
use crate::pitch::Pitch;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the harmony_core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Build chord pitches from a JSON chord request.
pub fn chord_notes_from_json(json: &str) -> Result<Vec<Pitch>, HarmonyError> {
    let spec = ChordSpec::from_json(json)?;
    Ok(build_chord_notes(&spec))
}

/// WASM-exposed: build chord pitches from a chord request object
/// (`{ root, octave, baseQuality, seventh, add6, extensions, alterations, inversion }`).
#[wasm_bindgen]
pub fn chord_notes(request: JsValue) -> Result<Vec<i32>, JsValue> {
    let request: ChordRequest =
        serde_wasm_bindgen::from_value(request).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(build_chord_notes(&ChordSpec::from(request)))
}

/// WASM-exposed: pitches of a named preset ("m7", "maj7", ...) plus tension keys.
#[wasm_bindgen]
pub fn preset_notes(root: u8, octave: i32, key: &str, extensions: Vec<String>) -> Vec<i32> {
    let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
    preset_chord_notes(root, octave, key, &extensions)
}

/// WASM-exposed: "C4"-style name of a pitch.
#[wasm_bindgen]
pub fn note_name(pitch: i32) -> String {
    pitch::name_of(pitch)
}

/// WASM-exposed: parse a note name or integer literal into a pitch.
#[wasm_bindgen]
pub fn parse_note(text: &str) -> Option<i32> {
    pitch::parse_name(text)
}

/// WASM-exposed: equal-tempered frequency of a pitch in Hz.
#[wasm_bindgen]
pub fn frequency(pitch: i32) -> f64 {
    pitch::frequency_of(pitch)
}

/// WASM-exposed: roman numeral of a scale degree. An unknown or missing
/// quality falls back to the diatonic quality of the degree.
#[wasm_bindgen]
pub fn roman(degree: usize, mode: &str, quality: Option<String>) -> String {
    let quality = quality.and_then(|q| q.parse::<TriadQuality>().ok());
    roman_numeral(degree, Mode::from_name(mode), quality)
}

/// WASM-exposed: render a chord request to mono f32 samples.
/// `settings` may be `undefined` for the default synth settings.
#[wasm_bindgen]
pub fn render_chord_samples(
    request: JsValue,
    settings: JsValue,
    sample_rate: u32,
    hold_secs: f64,
) -> Result<Vec<f32>, JsValue> {
    let request: ChordRequest =
        serde_wasm_bindgen::from_value(request).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    let settings: SynthSettings = if settings.is_undefined() || settings.is_null() {
        SynthSettings::default()
    } else {
        serde_wasm_bindgen::from_value(settings).map_err(|e| JsValue::from_str(&format!("{e}")))?
    };
    dsp::renderer::render_chord(&ChordSpec::from(request), &settings, sample_rate, hold_secs)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}
