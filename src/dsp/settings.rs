//! Synth settings — the live-tweakable configuration of a voice engine.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pitch::clamp;

use super::oscillator::Waveform;

/// Lowest cutoff the engine will hand to a filter.
const MIN_CUTOFF_HZ: f64 = 1.0;

/// Tone and envelope parameters shared by every voice of an engine.
///
/// JSON uses camelCase keys; the short legacy keys (`wave`, `master`,
/// `cutoff`, `resonance`, `sustain`, `detune`) are accepted as aliases.
/// Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthSettings {
    #[serde(alias = "wave")]
    pub waveform: Waveform,
    /// Master output level [0, 1].
    #[serde(alias = "master")]
    pub master_gain: f64,
    /// Low-pass cutoff in Hz.
    #[serde(alias = "cutoff")]
    pub cutoff_hz: f64,
    /// Low-pass resonance (Q).
    #[serde(alias = "resonance")]
    pub resonance_q: f64,
    pub attack_ms: f64,
    pub decay_ms: f64,
    /// Sustain level as a fraction of the note's velocity [0, 1].
    #[serde(alias = "sustain")]
    pub sustain_level: f64,
    pub release_ms: f64,
    /// Oscillator detune in cents.
    #[serde(alias = "detune")]
    pub detune_cents: f64,
}

impl Default for SynthSettings {
    fn default() -> Self {
        SynthSettings {
            waveform: Waveform::Sawtooth,
            master_gain: 0.3,
            cutoff_hz: 8000.0,
            resonance_q: 0.7,
            attack_ms: 10.0,
            decay_ms: 180.0,
            sustain_level: 0.8,
            release_ms: 200.0,
            detune_cents: 0.0,
        }
    }
}

impl SynthSettings {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Copy with every field clamped into its valid range.
    ///
    /// Non-finite values fall back to the lower bound (or 0 cents of detune).
    pub fn sanitized(&self) -> Self {
        SynthSettings {
            waveform: self.waveform,
            master_gain: clamp(self.master_gain, 0.0, 1.0),
            cutoff_hz: clamp(self.cutoff_hz, MIN_CUTOFF_HZ, f64::MAX),
            resonance_q: clamp(self.resonance_q, 0.0, f64::MAX),
            attack_ms: clamp(self.attack_ms, 0.0, f64::MAX),
            decay_ms: clamp(self.decay_ms, 0.0, f64::MAX),
            sustain_level: clamp(self.sustain_level, 0.0, 1.0),
            release_ms: clamp(self.release_ms, 0.0, f64::MAX),
            detune_cents: if self.detune_cents.is_finite() {
                self.detune_cents
            } else {
                0.0
            },
        }
    }

    pub fn attack_secs(&self) -> f64 {
        clamp(self.attack_ms, 0.0, f64::MAX) / 1000.0
    }

    pub fn decay_secs(&self) -> f64 {
        clamp(self.decay_ms, 0.0, f64::MAX) / 1000.0
    }

    pub fn release_secs(&self) -> f64 {
        clamp(self.release_ms, 0.0, f64::MAX) / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = SynthSettings::default();
        assert_eq!(s.waveform, Waveform::Sawtooth);
        assert!((s.master_gain - 0.3).abs() < 1e-12);
        assert!((s.attack_secs() - 0.01).abs() < 1e-12);
        assert!((s.release_secs() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s = SynthSettings::from_json(r#"{"waveform": "sine", "attackMs": 5}"#)
            .expect("valid settings");
        assert_eq!(s.waveform, Waveform::Sine);
        assert!((s.attack_ms - 5.0).abs() < 1e-12);
        assert!((s.decay_ms - 180.0).abs() < 1e-12);
    }

    #[test]
    fn legacy_keys() {
        let s = SynthSettings::from_json(
            r#"{"wave": "saw", "master": 0.5, "cutoff": 1200, "sustain": 0.4, "detune": -7}"#,
        )
        .expect("valid settings");
        assert_eq!(s.waveform, Waveform::Sawtooth);
        assert!((s.master_gain - 0.5).abs() < 1e-12);
        assert!((s.cutoff_hz - 1200.0).abs() < 1e-12);
        assert!((s.sustain_level - 0.4).abs() < 1e-12);
        assert!((s.detune_cents + 7.0).abs() < 1e-12);
    }

    #[test]
    fn json_round_trip_uses_camel_case() {
        let json = SynthSettings::default().to_json().expect("serialize");
        assert!(json.contains("\"masterGain\""), "{json}");
        assert_eq!(SynthSettings::from_json(&json).expect("parse"), SynthSettings::default());
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(SynthSettings::from_json(r#"{"waveform": "noise"}"#).is_err());
        assert!(SynthSettings::from_json("42").is_err());
        assert!(SynthSettings::from_json("{").is_err());
        assert!(SynthSettings::from_json(r#"{"attackMs": "slow"}"#).is_err());
    }

    #[test]
    fn sanitize_clamps() {
        let s = SynthSettings {
            master_gain: 3.0,
            cutoff_hz: -10.0,
            resonance_q: -1.0,
            attack_ms: -5.0,
            sustain_level: f64::NAN,
            detune_cents: f64::INFINITY,
            ..SynthSettings::default()
        }
        .sanitized();
        assert_eq!(s.master_gain, 1.0);
        assert_eq!(s.cutoff_hz, 1.0);
        assert_eq!(s.resonance_q, 0.0);
        assert_eq!(s.attack_ms, 0.0);
        assert_eq!(s.sustain_level, 0.0);
        assert_eq!(s.detune_cents, 0.0);
    }
}
