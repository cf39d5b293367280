//! DSP — the synth voice engine and the device it drives.
//!
//! The engine only schedules against an [`AudioDevice`](device::AudioDevice).
//! [`OfflineDevice`](offline::OfflineDevice) renders the same graph in-process,
//! sample by sample, for WAV export and tests.

pub mod click;
pub mod device;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod offline;
pub mod oscillator;
pub mod param;
pub mod renderer;
pub mod settings;
pub mod voice;
