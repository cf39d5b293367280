//! WAV renderer — plays a chord through a voice engine on an offline device.

use crate::chord::{ChordSpec, build_chord_notes};
use crate::error::HarmonyError;
use crate::pitch::clamp;

use super::engine::{STOP_MARGIN_SECS, TEARDOWN_MARGIN_SECS, VoiceEngine};
use super::offline::OfflineDevice;
use super::settings::SynthSettings;

/// Velocity every chord tone is struck with.
pub const CHORD_VELOCITY: f64 = 100.0;

/// Longest hold, and longest release tail, a single render will produce.
pub const MAX_RENDER_SECS: f64 = 60.0;

/// Render a chord to mono f32 samples.
///
/// All chord tones start together, are held for `hold_secs`, then released
/// with the configured release; the buffer includes the release tail. Hold and
/// tail are each capped at [`MAX_RENDER_SECS`].
pub fn render_chord(
    spec: &ChordSpec,
    settings: &SynthSettings,
    sample_rate: u32,
    hold_secs: f64,
) -> Result<Vec<f32>, HarmonyError> {
    let device = OfflineDevice::new(f64::from(sample_rate));
    let mut engine = VoiceEngine::with_settings(device, settings.clone())?;
    let notes = build_chord_notes(spec);

    for &pitch in &notes {
        engine.note_on(pitch, CHORD_VELOCITY);
    }
    let mut samples = engine.device_mut().render_seconds(clamp(hold_secs, 0.0, MAX_RENDER_SECS));

    for &pitch in &notes {
        engine.note_off(pitch, None);
    }
    let tail = (settings.sanitized().release_secs() + STOP_MARGIN_SECS).min(MAX_RENDER_SECS);
    samples.extend(engine.device_mut().render_seconds(tail));

    engine.device_mut().render_seconds(TEARDOWN_MARGIN_SECS);
    engine.reap();
    Ok(samples)
}

/// Render a chord to a 16-bit mono WAV file as bytes.
pub fn render_chord_wav(
    spec: &ChordSpec,
    settings: &SynthSettings,
    sample_rate: u32,
    hold_secs: f64,
) -> Result<Vec<u8>, HarmonyError> {
    let samples = render_chord(spec, settings, sample_rate, hold_secs)?;
    Ok(encode_wav(&to_pcm_i16(&samples), sample_rate, 1))
}

/// Convert f32 samples to i16 PCM, clamping to [-1, 1].
pub fn to_pcm_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

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
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}
