//! Audio device capability — the signal-graph primitives the voice engine drives.
//!
//! The engine never renders audio itself. It builds oscillator → filter →
//! gain chains on a device, and schedules parameter automation against the
//! device clock. Anything implementing [`AudioDevice`] can host the engine:
//! a browser audio context behind bindings, or the in-process
//! [`OfflineDevice`](super::offline::OfflineDevice).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

use super::oscillator::Waveform;

/// Opaque handle to a node on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to an oscillator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OscillatorId(pub NodeId);

/// Handle to a filter node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(pub NodeId);

/// Handle to a gain node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GainId(pub NodeId);

impl OscillatorId {
    pub fn node(self) -> NodeId {
        self.0
    }
}

impl FilterId {
    pub fn node(self) -> NodeId {
        self.0
    }
}

impl GainId {
    pub fn node(self) -> NodeId {
        self.0
    }
}

/// Filter response. Only the low-pass is needed by the voice chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    #[default]
    Lowpass,
}

/// Which automatable parameter of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Gain,
    Frequency,
    Detune,
    Cutoff,
    Resonance,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Gain => "gain",
            ParamKind::Frequency => "frequency",
            ParamKind::Detune => "detune",
            ParamKind::Cutoff => "cutoff",
            ParamKind::Resonance => "resonance",
        }
    }
}

/// A parameter on a specific node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamRef {
    pub node: NodeId,
    pub kind: ParamKind,
}

impl ParamRef {
    pub fn gain(gain: GainId) -> Self {
        ParamRef { node: gain.node(), kind: ParamKind::Gain }
    }

    pub fn frequency(osc: OscillatorId) -> Self {
        ParamRef { node: osc.node(), kind: ParamKind::Frequency }
    }

    pub fn detune(osc: OscillatorId) -> Self {
        ParamRef { node: osc.node(), kind: ParamKind::Detune }
    }

    pub fn cutoff(filter: FilterId) -> Self {
        ParamRef { node: filter.node(), kind: ParamKind::Cutoff }
    }

    pub fn resonance(filter: FilterId) -> Self {
        ParamRef { node: filter.node(), kind: ParamKind::Resonance }
    }
}

/// A scheduled change to a parameter. Times are device seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Automation {
    /// Jump to `value` at `at`.
    SetValue { value: f64, at: f64 },
    /// Straight line from the previous event to `value` at `end`.
    LinearRamp { value: f64, end: f64 },
    /// Exponential curve from the previous event to `value` at `end`.
    ExponentialRamp { value: f64, end: f64 },
    /// Exponential approach towards `value` starting at `start`.
    SetTarget { value: f64, start: f64, time_constant: f64 },
}

impl Automation {
    /// The time the event is ordered by.
    pub fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { at, .. } => at,
            Automation::LinearRamp { end, .. } | Automation::ExponentialRamp { end, .. } => end,
            Automation::SetTarget { start, .. } => start,
        }
    }
}

/// Signal-graph primitives and a monotonic clock.
///
/// Every method is non-blocking: scheduling calls only record intent against
/// the device clock.
pub trait AudioDevice {
    /// Seconds since the device started. Never decreases.
    fn current_time(&self) -> f64;

    /// The final output node.
    fn destination(&self) -> NodeId;

    fn create_oscillator(
        &mut self,
        waveform: Waveform,
        frequency_hz: f64,
        detune_cents: f64,
    ) -> OscillatorId;

    fn create_filter(&mut self, kind: FilterKind, cutoff_hz: f64, resonance_q: f64) -> FilterId;

    fn create_gain(&mut self, initial: f64) -> GainId;

    fn start(&mut self, osc: OscillatorId, at: f64) -> Result<(), DeviceError>;

    fn stop(&mut self, osc: OscillatorId, at: f64) -> Result<(), DeviceError>;

    /// Waveform changes are instantaneous; there is no ramp for them.
    fn set_waveform(&mut self, osc: OscillatorId, waveform: Waveform) -> Result<(), DeviceError>;

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), DeviceError>;

    /// Remove all outgoing connections of `node`.
    fn disconnect(&mut self, node: NodeId) -> Result<(), DeviceError>;

    fn schedule(&mut self, param: ParamRef, event: Automation) -> Result<(), DeviceError>;

    /// Drop every scheduled event at or after `from`.
    fn cancel_scheduled_changes(&mut self, param: ParamRef, from: f64) -> Result<(), DeviceError>;

    /// Value the parameter has at time `t` given its current schedule.
    fn value_at(&self, param: ParamRef, t: f64) -> Result<f64, DeviceError>;

    // ── Provided helpers ────────────────────────────────────

    fn set_value_at(&mut self, param: ParamRef, value: f64, at: f64) -> Result<(), DeviceError> {
        self.schedule(param, Automation::SetValue { value, at })
    }

    fn linear_ramp_to(&mut self, param: ParamRef, value: f64, end: f64) -> Result<(), DeviceError> {
        self.schedule(param, Automation::LinearRamp { value, end })
    }

    fn set_target_at(
        &mut self,
        param: ParamRef,
        value: f64,
        start: f64,
        time_constant: f64,
    ) -> Result<(), DeviceError> {
        self.schedule(param, Automation::SetTarget { value, start, time_constant })
    }
}
