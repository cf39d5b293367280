//! Voice Engine — turns note-on / note-off events into enveloped voices on an
//! [`AudioDevice`].
//!
//! The engine owns its device and a master gain routed to the device's
//! destination. Every voice is an oscillator → filter → gain chain feeding the
//! master. Nothing is rendered here: envelopes are written as parameter
//! automation against the device clock, and released voices are torn down
//! from a queue once their release (plus a margin) has elapsed.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::error::DeviceError;
use crate::pitch::{Pitch, clamp};

use super::click::Click;
use super::device::{AudioDevice, GainId, NodeId, ParamRef};
use super::envelope::EnvelopePhase;
use super::settings::SynthSettings;
use super::voice::{Voice, VoiceId, VoiceNodes};

/// Release used when a sounding pitch is struck again.
pub const RETRIGGER_RELEASE_MS: f64 = 20.0;
/// Release used by [`VoiceEngine::all_notes_off`].
pub const ALL_NOTES_OFF_RELEASE_MS: f64 = 50.0;
/// Oscillators stop this long after their release reaches zero.
pub const STOP_MARGIN_SECS: f64 = 0.01;
/// Released nodes are disconnected this long after the release ends.
pub const TEARDOWN_MARGIN_SECS: f64 = 0.08;
/// Time constant for detune, cutoff and resonance changes.
pub const PARAM_TIME_CONSTANT_SECS: f64 = 0.01;
/// Time constant for moving a sustaining voice to a new sustain level.
pub const SUSTAIN_TIME_CONSTANT_SECS: f64 = 0.05;

pub const MAX_VELOCITY: f64 = 127.0;

/// Map a 0–127 velocity into [0, 1]. Out-of-range input is clamped.
pub fn normalize_velocity(velocity: f64) -> f64 {
    clamp(velocity / MAX_VELOCITY, 0.0, 1.0)
}

/// Nodes waiting to be disconnected.
struct Teardown {
    due: f64,
    nodes: Vec<NodeId>,
    /// The released voice, when the nodes belonged to one.
    voice: Option<Voice>,
}

/// Polyphonic synth voice engine.
///
/// Every mutator takes `&mut self`; callers serialize access. Pending
/// teardowns are serviced at the start of every engine call and by
/// [`VoiceEngine::reap`].
pub struct VoiceEngine<D: AudioDevice> {
    device: D,
    master: GainId,
    settings: SynthSettings,
    settings_version: u64,
    next_voice: u64,
    /// Addressable voices by pitch, at most one per pitch after `note_on`.
    live: BTreeMap<Pitch, Vec<Voice>>,
    teardowns: Vec<Teardown>,
}

impl<D: AudioDevice> VoiceEngine<D> {
    pub fn new(device: D) -> Result<Self, DeviceError> {
        Self::with_settings(device, SynthSettings::default())
    }

    /// Take ownership of `device` and route a master gain to its destination.
    pub fn with_settings(mut device: D, settings: SynthSettings) -> Result<Self, DeviceError> {
        let master = device.create_gain(settings.sanitized().master_gain);
        let destination = device.destination();
        device.connect(master.node(), destination)?;

        Ok(VoiceEngine {
            device,
            master,
            settings,
            settings_version: 0,
            next_voice: 1,
            live: BTreeMap::new(),
            teardowns: Vec::new(),
        })
    }

    // ── Notes ───────────────────────────────────────────────

    /// Start a voice for `pitch`. `velocity` is on the 0–127 scale.
    ///
    /// A pitch that is already sounding is released with a short fade first,
    /// so it never has more than one addressable voice. Returns `None` when the
    /// device refused to build the voice; the note is dropped.
    pub fn note_on(&mut self, pitch: Pitch, velocity: f64) -> Option<VoiceId> {
        self.reap();

        if self.live.contains_key(&pitch) {
            debug!(pitch, "retrigger");
            self.release_pitch(pitch, RETRIGGER_RELEASE_MS);
        }

        let velocity = normalize_velocity(velocity);
        let settings = self.settings.sanitized();
        let id = VoiceId(self.next_voice);
        self.next_voice += 1;

        match Voice::spawn(
            &mut self.device,
            id,
            self.master.node(),
            pitch,
            velocity,
            &settings,
            self.settings_version,
        ) {
            Ok(voice) => {
                debug!(pitch, velocity, voice = id.0, "note on");
                self.live.entry(pitch).or_default().push(voice);
                Some(id)
            }
            Err(err) => {
                warn!(pitch, %err, "device failure, dropping note");
                None
            }
        }
    }

    /// Release every voice on `pitch`.
    ///
    /// `release_ms` overrides the configured release. The pitch stops being
    /// addressable immediately; its nodes fade out and are torn down later.
    /// Unknown pitches are ignored.
    pub fn note_off(&mut self, pitch: Pitch, release_ms: Option<f64>) {
        self.reap();
        let release_ms = release_ms.unwrap_or(self.settings.release_ms);
        if self.release_pitch(pitch, release_ms) == 0 {
            trace!(pitch, "note off for a silent pitch");
        }
    }

    /// Release every addressable pitch with a short fade.
    pub fn all_notes_off(&mut self) {
        self.reap();
        let pitches: Vec<Pitch> = self.live.keys().copied().collect();
        for pitch in pitches {
            self.release_pitch(pitch, ALL_NOTES_OFF_RELEASE_MS);
        }
    }

    /// Fire a metronome click straight into the destination.
    pub fn click(&mut self, accent: bool) {
        self.reap();
        let destination = self.device.destination();
        match Click::schedule(&mut self.device, destination, accent) {
            Ok(click) => self.teardowns.push(Teardown {
                due: click.teardown_at,
                nodes: click.nodes().to_vec(),
                voice: None,
            }),
            Err(err) => warn!(accent, %err, "device failure, dropping click"),
        }
    }

    fn release_pitch(&mut self, pitch: Pitch, release_ms: f64) -> usize {
        let Some(voices) = self.live.remove(&pitch) else {
            return 0;
        };
        let duration = clamp(release_ms, 0.0, f64::MAX) / 1000.0;
        let count = voices.len();

        for mut voice in voices {
            let due = match voice.release(&mut self.device, duration, STOP_MARGIN_SECS) {
                Ok(release) => release.end() + TEARDOWN_MARGIN_SECS,
                Err(err) => {
                    debug!(pitch, %err, "release failed");
                    self.device.current_time() + duration + TEARDOWN_MARGIN_SECS
                }
            };
            debug!(pitch, voice = voice.id.0, due, "note off");
            self.teardowns.push(Teardown {
                due,
                nodes: voice.nodes.all().to_vec(),
                voice: Some(voice),
            });
        }
        count
    }

    /// Disconnect everything whose teardown time has passed.
    ///
    /// Returns how many teardowns ran. Device errors are logged and ignored.
    pub fn reap(&mut self) -> usize {
        let now = self.device.current_time();
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.teardowns)
            .into_iter()
            .partition(|t| t.due <= now);
        self.teardowns = pending;

        for teardown in &due {
            for &node in &teardown.nodes {
                if let Err(err) = self.device.disconnect(node) {
                    debug!(%node, %err, "teardown failed");
                }
            }
            debug!(
                voice = teardown.voice.as_ref().map(|v| v.id.0),
                nodes = teardown.nodes.len(),
                "teardown"
            );
        }
        due.len()
    }

    // ── Settings ────────────────────────────────────────────

    pub fn settings(&self) -> &SynthSettings {
        &self.settings
    }

    /// Bumped by every settings change.
    pub fn settings_version(&self) -> u64 {
        self.settings_version
    }

    /// Replace the settings. New voices use them immediately; sounding voices
    /// pick them up on [`VoiceEngine::apply_live_settings`].
    pub fn set_settings(&mut self, settings: SynthSettings) {
        self.settings = settings;
        self.settings_version += 1;
    }

    pub fn update_settings(&mut self, update: impl FnOnce(&mut SynthSettings)) {
        update(&mut self.settings);
        self.settings_version += 1;
    }

    /// Live voices not yet synced to the current settings version.
    pub fn stale_voice_count(&self) -> usize {
        self.live
            .values()
            .flatten()
            .filter(|v| v.settings_version != self.settings_version)
            .count()
    }

    /// Push the current settings onto the master gain and every live voice.
    ///
    /// Master gain and waveform change at once; detune, cutoff and resonance
    /// glide; each voice's sustain target moves without retriggering its
    /// envelope. Pending teardowns keep the times captured at note-off.
    pub fn apply_live_settings(&mut self) {
        self.reap();
        let settings = self.settings.sanitized();
        let now = self.device.current_time();

        let master = ParamRef::gain(self.master);
        let result = self
            .device
            .cancel_scheduled_changes(master, now)
            .and_then(|()| self.device.set_value_at(master, settings.master_gain, now));
        if let Err(err) = result {
            debug!(%err, "master gain update failed");
        }

        let mut synced = 0;
        for voice in self.live.values_mut().flatten() {
            match sync_voice(&mut self.device, voice, &settings, now) {
                Ok(()) => {
                    voice.settings_version = self.settings_version;
                    synced += 1;
                }
                Err(err) => debug!(pitch = voice.pitch, %err, "live settings sync failed"),
            }
        }
        trace!(version = self.settings_version, synced, "live settings applied");
    }

    // ── Inspection ──────────────────────────────────────────

    pub fn is_live(&self, pitch: Pitch) -> bool {
        self.live.contains_key(&pitch)
    }

    /// Addressable pitches, ascending.
    pub fn live_pitches(&self) -> Vec<Pitch> {
        self.live.keys().copied().collect()
    }

    pub fn voices(&self, pitch: Pitch) -> &[Voice] {
        self.live.get(&pitch).map_or(&[], Vec::as_slice)
    }

    pub fn live_voice_count(&self) -> usize {
        self.live.values().map(Vec::len).sum()
    }

    /// Released voices whose nodes have not been torn down yet.
    pub fn releasing_count(&self) -> usize {
        self.teardowns.iter().filter(|t| t.voice.is_some()).count()
    }

    /// Teardowns still queued, clicks included.
    pub fn pending_teardowns(&self) -> usize {
        self.teardowns.len()
    }

    /// Phase of a voice at the current device time. Voices the engine no
    /// longer tracks are `Disposed`.
    pub fn voice_phase(&self, id: VoiceId) -> EnvelopePhase {
        let now = self.device.current_time();
        if let Some(voice) = self.live.values().flatten().find(|v| v.id == id) {
            return voice.phase_at(now);
        }
        let releasing = self
            .teardowns
            .iter()
            .filter_map(|t| t.voice.as_ref())
            .any(|v| v.id == id);
        if releasing {
            EnvelopePhase::Releasing
        } else {
            EnvelopePhase::Disposed
        }
    }

    pub fn master(&self) -> GainId {
        self.master
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

fn sync_voice<D: AudioDevice>(
    device: &mut D,
    voice: &mut Voice,
    settings: &SynthSettings,
    now: f64,
) -> Result<(), DeviceError> {
    let VoiceNodes {
        oscillator,
        filter,
        gain,
    } = voice.nodes;

    device.set_waveform(oscillator, settings.waveform)?;
    device.set_target_at(
        ParamRef::detune(oscillator),
        settings.detune_cents,
        now,
        PARAM_TIME_CONSTANT_SECS,
    )?;
    device.set_target_at(ParamRef::cutoff(filter), settings.cutoff_hz, now, PARAM_TIME_CONSTANT_SECS)?;
    device.set_target_at(
        ParamRef::resonance(filter),
        settings.resonance_q,
        now,
        PARAM_TIME_CONSTANT_SECS,
    )?;
    voice
        .envelope
        .retarget(device, gain, now, settings.sustain_level, SUSTAIN_TIME_CONSTANT_SECS)
}
