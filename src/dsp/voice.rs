//! Voice — one sounding pitch: an oscillator → filter → gain chain on a device.

use crate::error::DeviceError;
use crate::pitch::{Pitch, frequency_of};

use super::device::{AudioDevice, FilterId, FilterKind, GainId, NodeId, OscillatorId};
use super::envelope::{Envelope, EnvelopePhase, Release};
use super::settings::SynthSettings;

/// Engine-issued identity of a voice. Never reused within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

/// Node handles owned by a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceNodes {
    pub oscillator: OscillatorId,
    pub filter: FilterId,
    pub gain: GainId,
}

impl VoiceNodes {
    /// Teardown order: source first, then downstream.
    pub fn all(&self) -> [NodeId; 3] {
        [self.oscillator.node(), self.filter.node(), self.gain.node()]
    }
}

/// A single enveloped instance of a pitch.
#[derive(Debug, Clone)]
pub struct Voice {
    pub id: VoiceId,
    pub pitch: Pitch,
    /// Velocity normalized into [0, 1].
    pub velocity: f64,
    pub nodes: VoiceNodes,
    pub envelope: Envelope,
    /// Set once note-off has been handled.
    pub release: Option<Release>,
    /// Settings version the voice was last scheduled or synced with.
    pub settings_version: u64,
}

impl Voice {
    /// Build the node chain, wire it into `output`, start the oscillator and
    /// schedule the attack/decay envelope.
    ///
    /// If any step fails the nodes created so far are released again.
    pub fn spawn<D: AudioDevice>(
        device: &mut D,
        id: VoiceId,
        output: NodeId,
        pitch: Pitch,
        velocity: f64,
        settings: &SynthSettings,
        settings_version: u64,
    ) -> Result<Voice, DeviceError> {
        let now = device.current_time();

        let oscillator =
            device.create_oscillator(settings.waveform, frequency_of(pitch), settings.detune_cents);
        let filter = device.create_filter(FilterKind::Lowpass, settings.cutoff_hz, settings.resonance_q);
        let gain = device.create_gain(0.0);
        let nodes = VoiceNodes {
            oscillator,
            filter,
            gain,
        };

        let envelope = Envelope::new(
            now,
            settings.attack_secs(),
            settings.decay_secs(),
            velocity,
            settings.sustain_level,
        );
        let wired = envelope.schedule(device, gain).and_then(|()| {
            device.connect(oscillator.node(), filter.node())?;
            device.connect(filter.node(), gain.node())?;
            device.connect(gain.node(), output)?;
            device.start(oscillator, now)
        });
        if let Err(err) = wired {
            for node in nodes.all() {
                // Best effort.
                let _ = device.disconnect(node);
            }
            return Err(err);
        }

        Ok(Voice {
            id,
            pitch,
            velocity,
            nodes,
            envelope,
            release: None,
            settings_version,
        })
    }

    /// Begin the release ramp and schedule the oscillator stop `stop_margin`
    /// seconds after the ramp reaches zero.
    pub fn release<D: AudioDevice>(
        &mut self,
        device: &mut D,
        duration: f64,
        stop_margin: f64,
    ) -> Result<Release, DeviceError> {
        let release = Release::begin(device, self.nodes.gain, duration)?;
        device.stop(self.nodes.oscillator, release.end() + stop_margin)?;
        self.release = Some(release);
        Ok(release)
    }

    /// Phase at device time `t`. Disposal is tracked by the engine.
    pub fn phase_at(&self, t: f64) -> EnvelopePhase {
        match self.release {
            Some(_) => EnvelopePhase::Releasing,
            None => self.envelope.phase_at(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::device::ParamRef;
    use crate::dsp::offline::OfflineDevice;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn voice_produces_sound() {
        let mut dev = OfflineDevice::new(22050.0);
        let out = dev.destination();
        let settings = SynthSettings::default();
        Voice::spawn(&mut dev, VoiceId(1), out, 69, 0.8, &settings, 0).expect("spawn");

        let p = peak(&dev.render(4410));
        assert!(p > 0.1, "Voice should produce sound, peak {p}");
        assert!(p <= 1.2, "Voice output should stay bounded, peak {p}");
    }

    #[test]
    fn voice_wires_chain_into_output() {
        let mut dev = OfflineDevice::new(8000.0);
        let out = dev.destination();
        let voice = Voice::spawn(&mut dev, VoiceId(1), out, 60, 1.0, &SynthSettings::default(), 0)
            .expect("spawn");

        assert_eq!(dev.inputs_of(out), &[voice.nodes.gain.node()]);
        assert_eq!(dev.inputs_of(voice.nodes.gain.node()), &[voice.nodes.filter.node()]);
        assert_eq!(dev.inputs_of(voice.nodes.filter.node()), &[voice.nodes.oscillator.node()]);
    }

    #[test]
    fn voice_silent_after_release() {
        let mut dev = OfflineDevice::new(8000.0);
        let out = dev.destination();
        let settings = SynthSettings {
            attack_ms: 1.0,
            decay_ms: 1.0,
            sustain_level: 0.5,
            ..SynthSettings::default()
        };
        let mut voice =
            Voice::spawn(&mut dev, VoiceId(1), out, 60, 1.0, &settings, 0).expect("spawn");
        dev.render(400);
        assert_eq!(voice.phase_at(dev.current_time()), EnvelopePhase::Sustaining);

        let release = voice.release(&mut dev, 0.01, 0.01).expect("release");
        assert_eq!(voice.phase_at(dev.current_time()), EnvelopePhase::Releasing);
        assert!((release.from - 0.5).abs() < 1e-9);

        dev.render(200);
        let tail = dev.render(400);
        assert_eq!(peak(&tail), 0.0, "oscillator stopped after the release");
        let g = dev
            .value_at(ParamRef::gain(voice.nodes.gain), dev.current_time())
            .expect("gain");
        assert_eq!(g, 0.0);
    }

    #[test]
    fn failed_spawn_releases_nodes() {
        let mut dev = OfflineDevice::new(8000.0);
        let before = dev.node_count();
        let missing = NodeId(999);
        let err = Voice::spawn(&mut dev, VoiceId(1), missing, 60, 1.0, &SynthSettings::default(), 0)
            .expect_err("output does not exist");
        assert_eq!(err, DeviceError::UnknownNode(missing));
        assert_eq!(dev.node_count(), before);
    }
}
