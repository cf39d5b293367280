//! Offline device — a sample-accurate, in-process [`AudioDevice`].
//!
//! Nodes live in a map keyed by monotonically issued ids, so a released id is
//! never handed out again. Rendering pulls each sample from the destination
//! through the graph, memoizing every node's output for the current sample so
//! a node feeding several consumers is evaluated once.

use std::collections::HashMap;

use crate::error::DeviceError;

use super::device::{
    AudioDevice, Automation, FilterId, FilterKind, GainId, NodeId, OscillatorId, ParamKind,
    ParamRef,
};
use super::filter::BiquadFilter;
use super::oscillator::{Oscillator, Waveform};
use super::param::Param;

enum NodeKind {
    Destination,
    Oscillator {
        osc: Oscillator,
        frequency: Param,
        detune: Param,
        start: Option<f64>,
        stop: Option<f64>,
    },
    Filter {
        filter: BiquadFilter,
        cutoff: Param,
        resonance: Param,
    },
    Gain {
        gain: Param,
    },
}

impl NodeKind {
    fn param(&self, kind: ParamKind) -> Option<&Param> {
        match (self, kind) {
            (NodeKind::Oscillator { frequency, .. }, ParamKind::Frequency) => Some(frequency),
            (NodeKind::Oscillator { detune, .. }, ParamKind::Detune) => Some(detune),
            (NodeKind::Filter { cutoff, .. }, ParamKind::Cutoff) => Some(cutoff),
            (NodeKind::Filter { resonance, .. }, ParamKind::Resonance) => Some(resonance),
            (NodeKind::Gain { gain }, ParamKind::Gain) => Some(gain),
            _ => None,
        }
    }

    fn param_mut(&mut self, kind: ParamKind) -> Option<&mut Param> {
        match (self, kind) {
            (NodeKind::Oscillator { frequency, .. }, ParamKind::Frequency) => Some(frequency),
            (NodeKind::Oscillator { detune, .. }, ParamKind::Detune) => Some(detune),
            (NodeKind::Filter { cutoff, .. }, ParamKind::Cutoff) => Some(cutoff),
            (NodeKind::Filter { resonance, .. }, ParamKind::Resonance) => Some(resonance),
            (NodeKind::Gain { gain }, ParamKind::Gain) => Some(gain),
            _ => None,
        }
    }

    /// Produce this node's output for time `t` from the summed input.
    fn process(&mut self, input: f64, t: f64) -> f64 {
        match self {
            NodeKind::Destination => input,
            NodeKind::Oscillator {
                osc,
                frequency,
                detune,
                start,
                stop,
            } => {
                let running = start.is_some_and(|s| t >= s) && stop.is_none_or(|s| t < s);
                if !running {
                    return 0.0;
                }
                osc.frequency = frequency.value_at(t);
                osc.detune = detune.value_at(t);
                osc.next_sample()
            }
            NodeKind::Filter {
                filter,
                cutoff,
                resonance,
            } => {
                filter.set_frequency(cutoff.value_at(t));
                filter.set_q(resonance.value_at(t));
                filter.process(input)
            }
            NodeKind::Gain { gain } => input * gain.value_at(t),
        }
    }
}

struct Node {
    kind: NodeKind,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
}

/// Renders the signal graph into mono f32 samples on demand.
///
/// The clock only advances while rendering. Disconnecting a node releases it;
/// this device does not support reconnecting a node once it was disconnected.
pub struct OfflineDevice {
    sample_rate: f64,
    frames_rendered: u64,
    next_id: u64,
    destination: NodeId,
    nodes: HashMap<NodeId, Node>,
    memo: HashMap<NodeId, f64>,
}

impl OfflineDevice {
    pub fn new(sample_rate: f64) -> Self {
        let destination = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            destination,
            Node {
                kind: NodeKind::Destination,
                inputs: Vec::new(),
                outputs: Vec::new(),
            },
        );
        OfflineDevice {
            sample_rate,
            frames_rendered: 0,
            next_id: 1,
            destination,
            nodes,
            memo: HashMap::new(),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Number of nodes currently alive, destination included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Current waveform of an oscillator node.
    pub fn waveform_of(&self, osc: OscillatorId) -> Option<Waveform> {
        match &self.nodes.get(&osc.node())?.kind {
            NodeKind::Oscillator { osc, .. } => Some(osc.waveform),
            _ => None,
        }
    }

    /// Nodes feeding into `node`.
    pub fn inputs_of(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(&node).map_or(&[], |n| n.inputs.as_slice())
    }

    /// Render `frames` samples, advancing the clock.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames);
        for _ in 0..frames {
            let t = self.frames_rendered as f64 / self.sample_rate;
            self.memo.clear();
            let sample = self.pull(self.destination, t);
            out.push(sample as f32);
            self.frames_rendered += 1;
        }
        out
    }

    /// Render whole seconds of audio (rounded to the nearest frame).
    pub fn render_seconds(&mut self, seconds: f64) -> Vec<f32> {
        let frames = (seconds.max(0.0) * self.sample_rate).round() as usize;
        self.render(frames)
    }

    fn pull(&mut self, id: NodeId, t: f64) -> f64 {
        if let Some(&value) = self.memo.get(&id) {
            return value;
        }
        // Placeholder breaks any feedback loop that slipped past `connect`.
        self.memo.insert(id, 0.0);

        let inputs = match self.nodes.get(&id) {
            Some(node) => node.inputs.clone(),
            None => return 0.0,
        };
        let input: f64 = inputs.into_iter().map(|src| self.pull(src, t)).sum();

        let out = match self.nodes.get_mut(&id) {
            Some(node) => node.kind.process(input, t),
            None => 0.0,
        };
        self.memo.insert(id, out);
        out
    }

    fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                kind,
                inputs: Vec::new(),
                outputs: Vec::new(),
            },
        );
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DeviceError> {
        self.nodes.get_mut(&id).ok_or(DeviceError::UnknownNode(id))
    }

    fn oscillator_times(
        &mut self,
        osc: OscillatorId,
    ) -> Result<(&mut Option<f64>, &mut Option<f64>), DeviceError> {
        let node = self.node_mut(osc.node())?;
        match &mut node.kind {
            NodeKind::Oscillator { start, stop, .. } => Ok((start, stop)),
            _ => Err(DeviceError::WrongNodeKind {
                node: osc.node(),
                expected: "oscillator",
            }),
        }
    }

    fn param_mut(&mut self, param: ParamRef) -> Result<&mut Param, DeviceError> {
        let node = self.node_mut(param.node)?;
        node.kind
            .param_mut(param.kind)
            .ok_or(DeviceError::UnknownParam {
                node: param.node,
                param: param.kind.name(),
            })
    }

    /// True if `target` is reachable downstream of `from`.
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = Vec::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.outputs.iter().copied());
            }
        }
        false
    }
}

impl AudioDevice for OfflineDevice {
    fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate
    }

    fn destination(&self) -> NodeId {
        self.destination
    }

    fn create_oscillator(
        &mut self,
        waveform: Waveform,
        frequency_hz: f64,
        detune_cents: f64,
    ) -> OscillatorId {
        let mut osc = Oscillator::new(waveform, self.sample_rate);
        osc.frequency = frequency_hz;
        osc.detune = detune_cents;
        OscillatorId(self.add_node(NodeKind::Oscillator {
            osc,
            frequency: Param::new(frequency_hz),
            detune: Param::new(detune_cents),
            start: None,
            stop: None,
        }))
    }

    fn create_filter(&mut self, kind: FilterKind, cutoff_hz: f64, resonance_q: f64) -> FilterId {
        let filter = match kind {
            FilterKind::Lowpass => BiquadFilter::new(self.sample_rate, cutoff_hz, resonance_q),
        };
        FilterId(self.add_node(NodeKind::Filter {
            filter,
            cutoff: Param::new(cutoff_hz),
            resonance: Param::new(resonance_q),
        }))
    }

    fn create_gain(&mut self, initial: f64) -> GainId {
        GainId(self.add_node(NodeKind::Gain {
            gain: Param::new(initial),
        }))
    }

    fn start(&mut self, osc: OscillatorId, at: f64) -> Result<(), DeviceError> {
        let (start, _) = self.oscillator_times(osc)?;
        *start = Some(at);
        Ok(())
    }

    fn stop(&mut self, osc: OscillatorId, at: f64) -> Result<(), DeviceError> {
        let (_, stop) = self.oscillator_times(osc)?;
        *stop = Some(at);
        Ok(())
    }

    fn set_waveform(&mut self, osc: OscillatorId, waveform: Waveform) -> Result<(), DeviceError> {
        let node = self.node_mut(osc.node())?;
        match &mut node.kind {
            NodeKind::Oscillator { osc: o, .. } => {
                o.waveform = waveform;
                Ok(())
            }
            _ => Err(DeviceError::WrongNodeKind {
                node: osc.node(),
                expected: "oscillator",
            }),
        }
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), DeviceError> {
        if !self.nodes.contains_key(&from) {
            return Err(DeviceError::UnknownNode(from));
        }
        if !self.nodes.contains_key(&to) {
            return Err(DeviceError::UnknownNode(to));
        }
        if from == to || self.reaches(to, from) {
            return Err(DeviceError::Cycle { from, to });
        }
        self.node_mut(from)?.outputs.push(to);
        self.node_mut(to)?.inputs.push(from);
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), DeviceError> {
        if node == self.destination {
            return Err(DeviceError::WrongNodeKind {
                node,
                expected: "non-destination node",
            });
        }
        let released = self.nodes.remove(&node).ok_or(DeviceError::UnknownNode(node))?;
        for out in released.outputs {
            if let Some(target) = self.nodes.get_mut(&out) {
                target.inputs.retain(|&i| i != node);
            }
        }
        for input in released.inputs {
            if let Some(source) = self.nodes.get_mut(&input) {
                source.outputs.retain(|&o| o != node);
            }
        }
        Ok(())
    }

    fn schedule(&mut self, param: ParamRef, event: Automation) -> Result<(), DeviceError> {
        self.param_mut(param)?.schedule(event);
        Ok(())
    }

    fn cancel_scheduled_changes(&mut self, param: ParamRef, from: f64) -> Result<(), DeviceError> {
        self.param_mut(param)?.cancel_from(from);
        Ok(())
    }

    fn value_at(&self, param: ParamRef, t: f64) -> Result<f64, DeviceError> {
        let node = self
            .nodes
            .get(&param.node)
            .ok_or(DeviceError::UnknownNode(param.node))?;
        node.kind
            .param(param.kind)
            .map(|p| p.value_at(t))
            .ok_or(DeviceError::UnknownParam {
                node: param.node,
                param: param.kind.name(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn silent_without_sources() {
        let mut dev = OfflineDevice::new(8000.0);
        let out = dev.render(800);
        assert_eq!(out.len(), 800);
        assert_eq!(peak(&out), 0.0);
        assert!((dev.current_time() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn oscillator_through_gain_is_audible() {
        let mut dev = OfflineDevice::new(8000.0);
        let osc = dev.create_oscillator(Waveform::Sine, 440.0, 0.0);
        let gain = dev.create_gain(0.5);
        dev.connect(osc.node(), gain.node()).expect("connect osc");
        dev.connect(gain.node(), dev.destination()).expect("connect gain");
        dev.start(osc, 0.0).expect("start");

        let p = peak(&dev.render(800));
        assert!((p - 0.5).abs() < 0.01, "expected ~0.5 peak, got {p}");
    }

    #[test]
    fn oscillator_respects_start_and_stop() {
        let mut dev = OfflineDevice::new(8000.0);
        let osc = dev.create_oscillator(Waveform::Square, 200.0, 0.0);
        dev.connect(osc.node(), dev.destination()).expect("connect");
        dev.start(osc, 0.05).expect("start");
        dev.stop(osc, 0.1).expect("stop");

        let out = dev.render(1600);
        assert_eq!(peak(&out[..400]), 0.0, "silent before start");
        assert!(peak(&out[400..800]) > 0.5, "sounding while running");
        assert_eq!(peak(&out[800..]), 0.0, "silent after stop");
    }

    #[test]
    fn gain_automation_is_sample_accurate() {
        let mut dev = OfflineDevice::new(1000.0);
        let gain = dev.create_gain(0.0);
        let param = ParamRef::gain(gain);
        dev.set_value_at(param, 0.0, 0.0).expect("set");
        dev.linear_ramp_to(param, 1.0, 1.0).expect("ramp");
        let v = dev.value_at(param, 0.25).expect("value");
        assert!((v - 0.25).abs() < 1e-9);
        dev.cancel_scheduled_changes(param, 0.5).expect("cancel");
        assert_eq!(dev.value_at(param, 0.75).expect("value"), 0.0);
    }

    #[test]
    fn oscillator_frequency_follows_automation() {
        let mut dev = OfflineDevice::new(8000.0);
        assert_eq!(dev.sample_rate(), 8000.0);
        let osc = dev.create_oscillator(Waveform::Sine, 100.0, 0.0);
        dev.connect(osc.node(), dev.destination()).expect("connect");
        dev.start(osc, 0.0).expect("start");
        dev.set_value_at(ParamRef::frequency(osc), 200.0, 0.5).expect("set");

        let out = dev.render(8000);
        let crossings = |s: &[f32]| s.windows(2).filter(|w| w[0] <= 0.0 && w[1] > 0.0).count();
        assert!((49..=51).contains(&crossings(&out[..4000])), "100 Hz first half");
        assert!((99..=101).contains(&crossings(&out[4000..])), "200 Hz second half");
        assert_eq!(dev.waveform_of(osc), Some(Waveform::Sine));

        dev.set_waveform(osc, Waveform::Triangle).expect("waveform");
        assert_eq!(dev.waveform_of(osc), Some(Waveform::Triangle));
        assert_eq!(dev.waveform_of(OscillatorId(dev.destination())), None);
    }

    #[test]
    fn disconnect_releases_node() {
        let mut dev = OfflineDevice::new(8000.0);
        let gain = dev.create_gain(1.0);
        dev.connect(gain.node(), dev.destination()).expect("connect");
        assert_eq!(dev.inputs_of(dev.destination()), &[gain.node()]);

        dev.disconnect(gain.node()).expect("first disconnect");
        assert!(!dev.contains(gain.node()));
        assert!(dev.inputs_of(dev.destination()).is_empty());
        assert_eq!(
            dev.disconnect(gain.node()),
            Err(DeviceError::UnknownNode(gain.node()))
        );
    }

    #[test]
    fn rejects_cycles_and_bad_params() {
        let mut dev = OfflineDevice::new(8000.0);
        let a = dev.create_gain(1.0);
        let b = dev.create_gain(1.0);
        dev.connect(a.node(), b.node()).expect("a -> b");
        assert!(matches!(
            dev.connect(b.node(), a.node()),
            Err(DeviceError::Cycle { .. })
        ));
        assert!(matches!(
            dev.value_at(ParamRef { node: a.node(), kind: ParamKind::Cutoff }, 0.0),
            Err(DeviceError::UnknownParam { .. })
        ));
        assert!(matches!(
            dev.start(OscillatorId(a.node()), 0.0),
            Err(DeviceError::WrongNodeKind { .. })
        ));
    }

    #[test]
    fn shared_source_is_evaluated_once_per_sample() {
        let mut dev = OfflineDevice::new(8000.0);
        let osc = dev.create_oscillator(Waveform::Sine, 100.0, 0.0);
        let left = dev.create_gain(1.0);
        let right = dev.create_gain(1.0);
        dev.connect(osc.node(), left.node()).expect("connect");
        dev.connect(osc.node(), right.node()).expect("connect");
        dev.connect(left.node(), dev.destination()).expect("connect");
        dev.connect(right.node(), dev.destination()).expect("connect");
        dev.start(osc, 0.0).expect("start");

        // Two copies of one 100 Hz sine: peak 2.0 and still 100 Hz.
        let out = dev.render(8000);
        let p = peak(&out);
        assert!((p - 2.0).abs() < 0.01, "got {p}");
        let crossings = out
            .windows(2)
            .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
            .count();
        assert!((99..=101).contains(&crossings), "got {crossings} cycles");
    }
}
