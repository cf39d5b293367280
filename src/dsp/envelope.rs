//! ADSR envelope scheduling.
//!
//! An envelope is not rendered sample by sample here: it is written once as
//! gain automation on the device, and its phase is derived from the device
//! clock and the times captured when it was scheduled.

use crate::error::DeviceError;

use super::device::{AudioDevice, GainId, ParamRef};

/// Envelope phases of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopePhase {
    Attacking,
    Decaying,
    /// Holds until note-off.
    Sustaining,
    Releasing,
    /// Nodes disconnected; the voice no longer exists on the device.
    Disposed,
}

/// Attack / decay / sustain segment anchored at a note-on time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    /// Device time of the note-on.
    pub start: f64,
    /// Attack length in seconds.
    pub attack: f64,
    /// Decay length in seconds.
    pub decay: f64,
    /// Gain reached at the end of the attack (the normalized velocity).
    pub peak: f64,
    /// Gain held after the decay.
    pub sustain: f64,
}

impl Envelope {
    pub fn new(start: f64, attack: f64, decay: f64, peak: f64, sustain_level: f64) -> Self {
        Envelope {
            start,
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            peak,
            sustain: peak * sustain_level,
        }
    }

    pub fn attack_end(&self) -> f64 {
        self.start + self.attack
    }

    pub fn decay_end(&self) -> f64 {
        self.attack_end() + self.decay
    }

    /// Phase at time `t`, ignoring any release.
    pub fn phase_at(&self, t: f64) -> EnvelopePhase {
        if t < self.attack_end() {
            EnvelopePhase::Attacking
        } else if t < self.decay_end() {
            EnvelopePhase::Decaying
        } else {
            EnvelopePhase::Sustaining
        }
    }

    /// Expected gain at time `t` as written by [`Envelope::schedule`].
    pub fn level_at(&self, t: f64) -> f64 {
        if t <= self.start {
            0.0
        } else if t < self.attack_end() {
            self.peak * (t - self.start) / self.attack
        } else if t < self.decay_end() {
            let frac = (t - self.attack_end()) / self.decay;
            self.peak + (self.sustain - self.peak) * frac
        } else {
            self.sustain
        }
    }

    /// Write the attack and decay ramps onto `gain`.
    ///
    /// Pending changes from `start` on are cancelled first, so a retriggered
    /// gain never carries a stale schedule.
    pub fn schedule<D: AudioDevice>(&self, device: &mut D, gain: GainId) -> Result<(), DeviceError> {
        let param = ParamRef::gain(gain);
        device.cancel_scheduled_changes(param, self.start)?;
        device.set_value_at(param, 0.0, self.start)?;
        device.linear_ramp_to(param, self.peak, self.attack_end())?;
        device.linear_ramp_to(param, self.sustain, self.decay_end())?;
        Ok(())
    }

    /// Move the sustain target to `peak * sustain_level` without retriggering.
    ///
    /// The gain is re-anchored at its current value. During attack or decay
    /// the remaining ramps are rewritten to land on the new target at their
    /// original times; once sustaining, the gain approaches the new target
    /// exponentially with `time_constant`.
    pub fn retarget<D: AudioDevice>(
        &mut self,
        device: &mut D,
        gain: GainId,
        now: f64,
        sustain_level: f64,
        time_constant: f64,
    ) -> Result<(), DeviceError> {
        self.sustain = self.peak * sustain_level;

        let param = ParamRef::gain(gain);
        let current = device.value_at(param, now)?;
        device.cancel_scheduled_changes(param, now)?;
        device.set_value_at(param, current, now)?;

        match self.phase_at(now) {
            EnvelopePhase::Attacking => {
                device.linear_ramp_to(param, self.peak, self.attack_end())?;
                device.linear_ramp_to(param, self.sustain, self.decay_end())?;
            }
            EnvelopePhase::Decaying => {
                device.linear_ramp_to(param, self.sustain, self.decay_end())?;
            }
            _ => device.set_target_at(param, self.sustain, now, time_constant)?,
        }
        Ok(())
    }
}

/// A release fading from whatever gain was current at note-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Release {
    /// Device time of the note-off.
    pub start: f64,
    /// Gain captured at `start`.
    pub from: f64,
    /// Release length in seconds.
    pub duration: f64,
}

impl Release {
    pub fn new(start: f64, from: f64, duration: f64) -> Self {
        Release {
            start,
            from,
            duration: duration.max(0.0),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Capture the gain's current value, drop its pending schedule and ramp
    /// to silence from the captured value.
    pub fn begin<D: AudioDevice>(
        device: &mut D,
        gain: GainId,
        duration: f64,
    ) -> Result<Release, DeviceError> {
        let param = ParamRef::gain(gain);
        let now = device.current_time();
        let current = device.value_at(param, now)?;
        let release = Release::new(now, current, duration);

        device.cancel_scheduled_changes(param, now)?;
        device.set_value_at(param, current, now)?;
        device.linear_ramp_to(param, 0.0, release.end())?;
        Ok(release)
    }

    pub fn level_at(&self, t: f64) -> f64 {
        if t <= self.start {
            self.from
        } else if t >= self.end() {
            0.0
        } else {
            self.from * (1.0 - (t - self.start) / self.duration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::offline::OfflineDevice;

    #[test]
    fn phases_follow_clock() {
        let env = Envelope::new(1.0, 0.01, 0.1, 0.8, 0.5);
        assert_eq!(env.phase_at(1.0), EnvelopePhase::Attacking);
        assert_eq!(env.phase_at(1.05), EnvelopePhase::Decaying);
        assert_eq!(env.phase_at(1.11), EnvelopePhase::Sustaining);
        assert_eq!(env.phase_at(100.0), EnvelopePhase::Sustaining);
    }

    #[test]
    fn zero_attack_and_decay_go_straight_to_sustain() {
        let env = Envelope::new(0.0, 0.0, 0.0, 1.0, 0.6);
        assert_eq!(env.phase_at(0.0), EnvelopePhase::Sustaining);
        assert!((env.level_at(0.001) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn scheduled_gain_matches_shape() {
        let mut dev = OfflineDevice::new(1000.0);
        let gain = dev.create_gain(0.0);
        let env = Envelope::new(0.0, 0.1, 0.2, 1.0, 0.5);
        env.schedule(&mut dev, gain).expect("schedule");

        let param = ParamRef::gain(gain);
        for t in [0.0, 0.05, 0.1, 0.2, 0.3, 1.0] {
            let got = dev.value_at(param, t).expect("value");
            let want = env.level_at(t);
            assert!((got - want).abs() < 1e-9, "t={t}: device {got}, envelope {want}");
        }
    }

    #[test]
    fn release_anchors_on_current_value() {
        let mut dev = OfflineDevice::new(1000.0);
        let gain = dev.create_gain(0.0);
        Envelope::new(0.0, 0.1, 0.4, 1.0, 0.2)
            .schedule(&mut dev, gain)
            .expect("schedule");

        // Note-off mid-decay: gain is still well above the sustain target.
        dev.render(300);
        let release = Release::begin(&mut dev, gain, 0.1).expect("release");
        assert!((release.from - 0.6).abs() < 1e-9, "captured {}", release.from);

        let param = ParamRef::gain(gain);
        let mid = dev.value_at(param, 0.35).expect("value");
        assert!((mid - 0.3).abs() < 1e-9, "half way down, got {mid}");
        assert_eq!(dev.value_at(param, 0.41).expect("value"), 0.0);
        assert_eq!(dev.value_at(param, 5.0).expect("value"), 0.0);
    }

    #[test]
    fn retarget_mid_decay_keeps_timing() {
        let mut dev = OfflineDevice::new(1000.0);
        let gain = dev.create_gain(0.0);
        let mut env = Envelope::new(0.0, 0.1, 0.2, 1.0, 0.5);
        env.schedule(&mut dev, gain).expect("schedule");

        dev.render(200);
        env.retarget(&mut dev, gain, 0.2, 0.1, 0.05).expect("retarget");

        let param = ParamRef::gain(gain);
        let at_now = dev.value_at(param, 0.2).expect("value");
        assert!((at_now - 0.75).abs() < 1e-9, "no jump at retarget, got {at_now}");
        let end = dev.value_at(param, 0.31).expect("value");
        assert!((end - 0.1).abs() < 1e-9, "lands on new sustain, got {end}");
    }

    #[test]
    fn retarget_while_sustaining_approaches_smoothly() {
        let mut dev = OfflineDevice::new(1000.0);
        let gain = dev.create_gain(0.0);
        let mut env = Envelope::new(0.0, 0.01, 0.01, 0.8, 1.0);
        env.schedule(&mut dev, gain).expect("schedule");

        dev.render(500);
        env.retarget(&mut dev, gain, 0.5, 0.5, 0.05).expect("retarget");
        assert!((env.sustain - 0.4).abs() < 1e-12);

        let param = ParamRef::gain(gain);
        let soon = dev.value_at(param, 0.51).expect("value");
        assert!(soon < 0.8 && soon > 0.4, "still approaching, got {soon}");
        let later = dev.value_at(param, 1.5).expect("value");
        assert!((later - 0.4).abs() < 1e-6, "settled, got {later}");
    }
}
