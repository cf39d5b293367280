//! Metronome click — a short square-wave blip, fire and forget.

use crate::error::DeviceError;

use super::device::{AudioDevice, Automation, GainId, NodeId, OscillatorId, ParamRef};
use super::oscillator::Waveform;

pub const ACCENT_FREQUENCY_HZ: f64 = 1600.0;
pub const FREQUENCY_HZ: f64 = 1100.0;
pub const ACCENT_PEAK: f64 = 0.25;
pub const PEAK: f64 = 0.18;

const ATTACK_SECS: f64 = 0.001;
const DECAY_END_SECS: f64 = 0.08;
const DECAY_FLOOR: f64 = 0.0001;
const STOP_SECS: f64 = 0.09;
const TEARDOWN_SECS: f64 = 0.12;

/// Nodes of a scheduled click and when they may be released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Click {
    pub oscillator: OscillatorId,
    pub gain: GainId,
    pub start: f64,
    pub teardown_at: f64,
}

impl Click {
    /// Schedule a click at the device's current time, routed into `output`.
    pub fn schedule<D: AudioDevice>(
        device: &mut D,
        output: NodeId,
        accent: bool,
    ) -> Result<Click, DeviceError> {
        let (frequency, peak) = if accent {
            (ACCENT_FREQUENCY_HZ, ACCENT_PEAK)
        } else {
            (FREQUENCY_HZ, PEAK)
        };

        let now = device.current_time();
        let oscillator = device.create_oscillator(Waveform::Square, frequency, 0.0);
        let gain = device.create_gain(0.0);
        let click = Click {
            oscillator,
            gain,
            start: now,
            teardown_at: now + TEARDOWN_SECS,
        };

        let param = ParamRef::gain(gain);
        let wired = device
            .set_value_at(param, 0.0, now)
            .and_then(|()| {
                device.linear_ramp_to(param, peak, now + ATTACK_SECS)?;
                device.schedule(
                    param,
                    Automation::ExponentialRamp {
                        value: DECAY_FLOOR,
                        end: now + DECAY_END_SECS,
                    },
                )?;
                device.connect(oscillator.node(), gain.node())?;
                device.connect(gain.node(), output)?;
                device.start(oscillator, now)?;
                device.stop(oscillator, now + STOP_SECS)
            });
        if let Err(err) = wired {
            for node in click.nodes() {
                let _ = device.disconnect(node);
            }
            return Err(err);
        }
        Ok(click)
    }

    pub fn nodes(&self) -> [NodeId; 2] {
        [self.oscillator.node(), self.gain.node()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::offline::OfflineDevice;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn accent_is_louder() {
        let mut dev = OfflineDevice::new(16000.0);
        let out = dev.destination();
        Click::schedule(&mut dev, out, true).expect("click");
        let accented = peak(&dev.render(160));

        let mut dev = OfflineDevice::new(16000.0);
        let out = dev.destination();
        Click::schedule(&mut dev, out, false).expect("click");
        let plain = peak(&dev.render(160));

        assert!(accented > plain, "accent {accented} vs plain {plain}");
        assert!(accented <= 0.3, "accent peak bounded, got {accented}");
    }

    #[test]
    fn decays_and_stops() {
        let mut dev = OfflineDevice::new(16000.0);
        let out = dev.destination();
        let click = Click::schedule(&mut dev, out, false).expect("click");
        assert!((click.teardown_at - 0.12).abs() < 1e-12);

        let param = ParamRef::gain(click.gain);
        let tail = dev.value_at(param, 0.08).expect("gain");
        assert!((tail - DECAY_FLOOR).abs() < 1e-9, "got {tail}");

        dev.render(1440);
        let after_stop = dev.render(160);
        assert_eq!(peak(&after_stop), 0.0, "oscillator stopped at 90 ms");
    }
}
