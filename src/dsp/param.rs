//! Parameter automation timeline.
//!
//! Holds the scheduled events of one parameter in time order and answers
//! "what is the value at time t". Ramps interpolate from the point reached by
//! the previous event; a set-target event starts an exponential approach that
//! lasts until the next event.

use super::device::Automation;

/// Smallest value an exponential ramp may touch; zero would be a singularity.
const EXP_FLOOR: f64 = 1e-7;

/// Exponential approach started by a `SetTarget` event.
#[derive(Debug, Clone, Copy)]
struct Approach {
    from: f64,
    goal: f64,
    start: f64,
    time_constant: f64,
}

impl Approach {
    fn at(&self, t: f64) -> f64 {
        if self.time_constant <= 0.0 {
            return self.goal;
        }
        let elapsed = (t - self.start).max(0.0);
        self.goal + (self.from - self.goal) * (-elapsed / self.time_constant).exp()
    }
}

/// An automatable parameter: an initial value plus ordered events.
#[derive(Debug, Clone)]
pub struct Param {
    initial: f64,
    events: Vec<Automation>,
}

impl Param {
    pub fn new(initial: f64) -> Self {
        Param {
            initial,
            events: Vec::new(),
        }
    }

    /// Insert an event after any existing events with the same time.
    pub fn schedule(&mut self, event: Automation) {
        let t = event.time();
        let idx = self.events.partition_point(|e| e.time() <= t);
        self.events.insert(idx, event);
    }

    /// Remove every event whose time is at or after `from`.
    pub fn cancel_from(&mut self, from: f64) {
        self.events.retain(|e| e.time() < from);
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Value at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        let mut value = self.initial;
        let mut anchor = 0.0;
        let mut approach: Option<Approach> = None;

        for event in &self.events {
            match *event {
                Automation::SetValue { value: v, at } => {
                    if at > t {
                        break;
                    }
                    value = v;
                    anchor = at;
                    approach = None;
                }
                Automation::LinearRamp { value: v, end } => {
                    if end <= t {
                        value = v;
                        anchor = end;
                        approach = None;
                        continue;
                    }
                    if end <= anchor {
                        return value;
                    }
                    let frac = ((t - anchor) / (end - anchor)).clamp(0.0, 1.0);
                    return value + (v - value) * frac;
                }
                Automation::ExponentialRamp { value: v, end } => {
                    if end <= t {
                        value = v;
                        anchor = end;
                        approach = None;
                        continue;
                    }
                    if end <= anchor {
                        return value;
                    }
                    let from = value.max(EXP_FLOOR);
                    let to = v.max(EXP_FLOOR);
                    let frac = ((t - anchor) / (end - anchor)).clamp(0.0, 1.0);
                    return from * (to / from).powf(frac);
                }
                Automation::SetTarget {
                    value: v,
                    start,
                    time_constant,
                } => {
                    if start > t {
                        break;
                    }
                    if let Some(prev) = approach {
                        value = prev.at(start);
                    }
                    anchor = start;
                    approach = Some(Approach {
                        from: value,
                        goal: v,
                        start,
                        time_constant,
                    });
                }
            }
        }

        match approach {
            Some(curve) => curve.at(t),
            None => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn initial_value_before_events() {
        let mut p = Param::new(0.5);
        p.schedule(Automation::SetValue { value: 1.0, at: 2.0 });
        assert!(close(p.value_at(0.0), 0.5));
        assert!(close(p.value_at(1.999), 0.5));
        assert!(close(p.value_at(2.0), 1.0));
    }

    #[test]
    fn attack_decay_ramps() {
        let mut p = Param::new(0.0);
        p.schedule(Automation::SetValue { value: 0.0, at: 1.0 });
        p.schedule(Automation::LinearRamp { value: 1.0, end: 1.1 });
        p.schedule(Automation::LinearRamp { value: 0.5, end: 1.3 });

        assert!(close(p.value_at(1.05), 0.5), "mid attack");
        assert!(close(p.value_at(1.1), 1.0), "peak");
        assert!(close(p.value_at(1.2), 0.75), "mid decay");
        assert!(close(p.value_at(5.0), 0.5), "sustain holds");
    }

    #[test]
    fn zero_length_ramp_jumps() {
        let mut p = Param::new(0.0);
        p.schedule(Automation::SetValue { value: 0.0, at: 1.0 });
        p.schedule(Automation::LinearRamp { value: 0.8, end: 1.0 });
        assert!(close(p.value_at(1.0), 0.8));
    }

    #[test]
    fn cancel_drops_future_events() {
        let mut p = Param::new(0.0);
        p.schedule(Automation::SetValue { value: 0.0, at: 0.0 });
        p.schedule(Automation::LinearRamp { value: 1.0, end: 1.0 });
        p.cancel_from(0.5);
        assert_eq!(p.event_count(), 1);
        assert!(close(p.value_at(0.75), 0.0));
    }

    #[test]
    fn set_target_approaches_goal() {
        let mut p = Param::new(1.0);
        p.schedule(Automation::SetTarget {
            value: 0.0,
            start: 0.0,
            time_constant: 0.1,
        });
        let one_tau = p.value_at(0.1);
        assert!((one_tau - (-1.0_f64).exp()).abs() < 1e-9, "got {one_tau}");
        assert!(p.value_at(2.0) < 1e-6);
    }

    #[test]
    fn set_target_chains_from_curve() {
        let mut p = Param::new(1.0);
        p.schedule(Automation::SetTarget { value: 0.0, start: 0.0, time_constant: 0.1 });
        p.schedule(Automation::SetTarget { value: 1.0, start: 0.1, time_constant: 0.0 });
        assert!(close(p.value_at(0.2), 1.0));
        let before = p.value_at(0.099);
        assert!(before > 0.35 && before < 0.4, "got {before}");
    }

    #[test]
    fn exponential_ramp() {
        let mut p = Param::new(0.0);
        p.schedule(Automation::SetValue { value: 1.0, at: 0.0 });
        p.schedule(Automation::ExponentialRamp { value: 0.01, end: 1.0 });
        assert!((p.value_at(0.5) - 0.1).abs() < 1e-9);
        assert!(close(p.value_at(1.0), 0.01));
    }

    #[test]
    fn equal_times_keep_insertion_order() {
        let mut p = Param::new(0.0);
        p.schedule(Automation::SetValue { value: 0.2, at: 1.0 });
        p.schedule(Automation::SetValue { value: 0.7, at: 1.0 });
        assert!(close(p.value_at(1.0), 0.7));
    }
}
