//! Pull-based render graph
//!
//! Nodes are evaluated once per block in dependency order. Signals arriving at
//! the same input are summed, with mono signals up-mixed to every channel and
//! wider signals averaged down to mono where a single channel is expected.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::application::ports::{HostError, NodeId, PcmSource};

/// Planar block: one `Vec<f32>` per channel, all the same length
pub type Signal = Vec<Vec<f32>>;

/// Channels of the monitor and mixdown destinations
pub const DESTINATION_CHANNELS: usize = 2;

pub fn silence(channels: usize, frames: usize) -> Signal {
    vec![vec![0.0; frames]; channels.max(1)]
}

/// Add `src` into `dest`, up- or down-mixing to `dest`'s channel count
pub fn mix_into(dest: &mut Signal, src: &Signal) {
    if src.is_empty() || dest.is_empty() {
        return;
    }
    if src.len() == dest.len() {
        for (d, s) in dest.iter_mut().zip(src) {
            for (a, b) in d.iter_mut().zip(s) {
                *a += *b;
            }
        }
    } else if src.len() == 1 {
        for d in dest.iter_mut() {
            for (a, b) in d.iter_mut().zip(&src[0]) {
                *a += *b;
            }
        }
    } else if dest.len() == 1 {
        let scale = 1.0 / src.len() as f32;
        for channel in src {
            for (a, b) in dest[0].iter_mut().zip(channel) {
                *a += *b * scale;
            }
        }
    } else {
        for (i, d) in dest.iter_mut().enumerate() {
            for (a, b) in d.iter_mut().zip(&src[i % src.len()]) {
                *a += *b;
            }
        }
    }
}

/// Gain parameter approaching its target exponentially
#[derive(Debug, Clone, Copy)]
struct GainParam {
    current: f32,
    target: f32,
    time_constant: f32,
}

impl GainParam {
    fn fixed(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            time_constant: 0.0,
        }
    }

    fn next(&mut self, sample_rate: u32) -> f32 {
        if self.time_constant <= 0.0 {
            self.current = self.target;
        } else {
            let coeff = 1.0 - (-1.0 / (self.time_constant * sample_rate as f32)).exp();
            self.current += (self.target - self.current) * coeff;
        }
        self.current
    }
}

enum NodeKind {
    Source(Arc<dyn PcmSource>),
    Gain(GainParam),
    Splitter(usize),
    Merger(usize),
    Mixdown,
    Monitor,
}

impl NodeKind {
    fn inputs(&self) -> usize {
        match self {
            Self::Source(_) => 0,
            Self::Merger(n) => *n,
            _ => 1,
        }
    }

    fn outputs(&self) -> usize {
        match self {
            Self::Splitter(n) => *n,
            Self::Monitor => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Connection {
    from: NodeId,
    output: usize,
    to: NodeId,
    input: usize,
}

/// Result of rendering one block
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBlock {
    pub monitor: Signal,
    /// Mixdown signal per mixdown node
    pub mixdowns: Vec<(NodeId, Signal)>,
}

/// Node graph owned by one audio context
pub struct RenderGraph {
    sample_rate: u32,
    next_id: u64,
    nodes: HashMap<NodeId, NodeKind>,
    connections: Vec<Connection>,
    monitor: NodeId,
}

impl RenderGraph {
    pub fn new(sample_rate: u32) -> Self {
        let monitor = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(monitor, NodeKind::Monitor);
        Self {
            sample_rate,
            next_id: 1,
            nodes,
            connections: Vec::new(),
            monitor,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn monitor(&self) -> NodeId {
        self.monitor
    }

    fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, kind);
        id
    }

    pub fn add_source(&mut self, source: Arc<dyn PcmSource>) -> NodeId {
        self.add(NodeKind::Source(source))
    }

    pub fn add_gain(&mut self, gain: f32) -> NodeId {
        self.add(NodeKind::Gain(GainParam::fixed(gain)))
    }

    pub fn add_splitter(&mut self, outputs: usize) -> NodeId {
        self.add(NodeKind::Splitter(outputs.max(1)))
    }

    pub fn add_merger(&mut self, inputs: usize) -> NodeId {
        self.add(NodeKind::Merger(inputs.max(1)))
    }

    pub fn add_mixdown(&mut self) -> NodeId {
        self.add(NodeKind::Mixdown)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn connect(
        &mut self,
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    ) -> Result<(), HostError> {
        let source = self.nodes.get(&from).ok_or(HostError::UnknownNode(from))?;
        if output >= source.outputs() {
            return Err(HostError::Backend(format!(
                "node {} has no output {}",
                from, output
            )));
        }
        let target = self.nodes.get(&to).ok_or(HostError::UnknownNode(to))?;
        if input >= target.inputs() {
            return Err(HostError::Backend(format!("node {} has no input {}", to, input)));
        }

        let connection = Connection {
            from,
            output,
            to,
            input,
        };
        if !self.connections.contains(&connection) {
            self.connections.push(connection);
        }
        Ok(())
    }

    /// Remove every outgoing connection of `node`
    pub fn disconnect(&mut self, node: NodeId) -> Result<(), HostError> {
        if !self.nodes.contains_key(&node) {
            return Err(HostError::UnknownNode(node));
        }
        self.connections.retain(|c| c.from != node);
        Ok(())
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.connections.iter().any(|c| c.from == from && c.to == to)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn set_gain_target(
        &mut self,
        node: NodeId,
        target: f32,
        time_constant: f32,
    ) -> Result<(), HostError> {
        match self.nodes.get_mut(&node) {
            Some(NodeKind::Gain(param)) => {
                param.target = target;
                param.time_constant = time_constant.max(0.0);
                Ok(())
            }
            Some(_) => Err(HostError::Backend(format!("node {} is not a gain node", node))),
            None => Err(HostError::UnknownNode(node)),
        }
    }

    pub fn gain_value(&self, node: NodeId) -> Option<f32> {
        match self.nodes.get(&node) {
            Some(NodeKind::Gain(param)) => Some(param.current),
            _ => None,
        }
    }

    /// Dependency order; nodes caught in a cycle are left out
    fn order(&self) -> Vec<NodeId> {
        let mut indegree: HashMap<NodeId, usize> = self.nodes.keys().map(|id| (*id, 0)).collect();
        for c in &self.connections {
            if let Some(d) = indegree.get_mut(&c.to) {
                *d += 1;
            }
        }

        let mut ready: Vec<NodeId> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        ready.sort();
        let mut queue: VecDeque<NodeId> = ready.into();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for c in self.connections.iter().filter(|c| c.from == id) {
                if let Some(d) = indegree.get_mut(&c.to) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(c.to);
                    }
                }
            }
        }
        order
    }

    /// Render `frames` frames through the whole graph
    pub fn render(&mut self, frames: usize) -> RenderedBlock {
        let order = self.order();
        let mut outputs: HashMap<(NodeId, usize), Signal> = HashMap::new();
        let mut monitor = silence(DESTINATION_CHANNELS, frames);
        let mut mixdowns = Vec::new();
        let sample_rate = self.sample_rate;

        for id in order {
            let Some(kind) = self.nodes.get(&id) else {
                continue;
            };
            let input_count = kind.inputs();

            // Gather inputs; each input keeps the widest arriving channel count
            let mut inputs: Vec<Option<Signal>> = vec![None; input_count];
            for c in self.connections.iter().filter(|c| c.to == id) {
                let Some(signal) = outputs.get(&(c.from, c.output)) else {
                    continue;
                };
                let slot = &mut inputs[c.input];
                match slot {
                    None => *slot = Some(signal.clone()),
                    Some(existing) => {
                        if signal.len() > existing.len() {
                            let mut widened = silence(signal.len(), frames);
                            mix_into(&mut widened, existing);
                            *existing = widened;
                        }
                        mix_into(existing, signal);
                    }
                }
            }

            let Some(kind) = self.nodes.get_mut(&id) else {
                continue;
            };
            match kind {
                NodeKind::Source(source) => {
                    let channels = usize::from(source.channels().max(1));
                    let mut interleaved = vec![0.0; frames * channels];
                    source.read(&mut interleaved);
                    let mut planar = silence(channels, frames);
                    for (i, sample) in interleaved.iter().enumerate() {
                        planar[i % channels][i / channels] = *sample;
                    }
                    outputs.insert((id, 0), planar);
                }
                NodeKind::Gain(param) => {
                    let mut signal = inputs[0].take().unwrap_or_else(|| silence(1, frames));
                    for frame in 0..frames {
                        let g = param.next(sample_rate);
                        for channel in signal.iter_mut() {
                            channel[frame] *= g;
                        }
                    }
                    outputs.insert((id, 0), signal);
                }
                NodeKind::Splitter(n) => {
                    let signal = inputs[0].take().unwrap_or_else(|| silence(1, frames));
                    for output in 0..*n {
                        let channel = signal
                            .get(output)
                            .cloned()
                            .unwrap_or_else(|| vec![0.0; frames]);
                        outputs.insert((id, output), vec![channel]);
                    }
                }
                NodeKind::Merger(n) => {
                    let mut merged = silence(*n, frames);
                    for (index, input) in inputs.iter().enumerate() {
                        if let Some(signal) = input {
                            let mut mono = silence(1, frames);
                            mix_into(&mut mono, signal);
                            merged[index] = mono.remove(0);
                        }
                    }
                    outputs.insert((id, 0), merged);
                }
                NodeKind::Mixdown => {
                    let mut mixed = silence(DESTINATION_CHANNELS, frames);
                    if let Some(signal) = &inputs[0] {
                        mix_into(&mut mixed, signal);
                    }
                    mixdowns.push((id, mixed.clone()));
                    outputs.insert((id, 0), mixed);
                }
                NodeKind::Monitor => {
                    if let Some(signal) = &inputs[0] {
                        mix_into(&mut monitor, signal);
                    }
                }
            }
        }

        RenderedBlock { monitor, mixdowns }
    }
}

/// Interleave a planar signal
pub fn interleave(signal: &Signal) -> Vec<f32> {
    let channels = signal.len();
    let frames = signal.first().map(Vec::len).unwrap_or(0);
    let mut out = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for channel in signal {
            out.push(channel[frame]);
        }
    }
    out
}
