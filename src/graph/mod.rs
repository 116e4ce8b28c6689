//! Block-based audio graph the synthesizer schedules voices into.
//!
//! The graph is an arena of nodes (oscillators, looping buffer players,
//! gains, panners, a compressor and one destination) joined by
//! node→node and node→parameter connections. Everything runs on a single
//! audio clock measured in frames; parameters carry sample-accurate
//! automation timelines and sources carry start/stop times.
//!
//! ```text
//!   osc ──► gain ──► chvol ──► pan ──► out ──► comp ──► destination
//!    ▲        ▲                                              │
//!   detune   gain(param)                                    tap ─► capture
//! ```
//!
//! Rendering walks the nodes in a cached topological order, 128 frames at a
//! time. Connections that would close a loop are rejected, so that order
//! always exists.

mod node;
mod param;

use std::{collections::VecDeque, sync::Arc};

use crate::{
    capture::CaptureTap,
    dsp::{Compressor, CompressorSettings, OscillatorShape},
    error::GraphError,
    RENDER_QUANTUM,
};

pub use node::{ParamSlot, SourceState};
pub use param::AudioParam;

use node::{BlockCtx, Node, NodeKind, Schedule};

/// Generational handle to a node. Stale handles never alias a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Where a connection lands: a node's input or one of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Node(NodeId),
    Param(NodeId, ParamSlot),
}

impl Target {
    pub fn node(self) -> NodeId {
        match self {
            Target::Node(id) | Target::Param(id, _) => id,
        }
    }
}

impl From<NodeId> for Target {
    fn from(id: NodeId) -> Self {
        Target::Node(id)
    }
}

/// Result of a best-effort disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    Detached,
    /// The connection was already gone. Ordinary during teardown races.
    AlreadyDetached,
}

/// Deferred cleanup run when a source reaches its stop time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    Detach { from: NodeId, to: Target },
    Release(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edge {
    from: NodeId,
    to: Target,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

struct Step {
    node: usize,
    inputs: Vec<usize>,
    params: Vec<(ParamSlot, usize)>,
}

struct Scratch {
    input: [Vec<f32>; 2],
    params: [Vec<f32>; ParamSlot::COUNT],
}

impl Scratch {
    fn new() -> Self {
        Self {
            input: [vec![0.0; RENDER_QUANTUM], vec![0.0; RENDER_QUANTUM]],
            params: std::array::from_fn(|_| vec![0.0; RENDER_QUANTUM]),
        }
    }
}

/// The node arena plus the audio clock.
pub struct AudioGraph {
    sample_rate: f64,
    frame: u64,
    slots: Vec<Slot>,
    free: Vec<u32>,
    edges: Vec<Edge>,
    plan: Option<Vec<Step>>,
    scratch: Scratch,
    destination: NodeId,
    tap: Option<CaptureTap>,
    ended: Vec<Teardown>,
}

impl AudioGraph {
    pub fn new(sample_rate: f64) -> Self {
        let mut graph = Self {
            sample_rate,
            frame: 0,
            slots: Vec::new(),
            free: Vec::new(),
            edges: Vec::new(),
            plan: None,
            scratch: Scratch::new(),
            destination: NodeId {
                index: 0,
                generation: 0,
            },
            tap: None,
            ended: Vec::new(),
        };
        graph.destination = graph.insert(Node::new(NodeKind::Destination));
        graph
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Seconds on the audio clock.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate
    }

    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn create_oscillator(&mut self, shape: OscillatorShape, frequency: f64) -> NodeId {
        self.insert(Node::new(NodeKind::Oscillator {
            shape,
            phase: 0.0,
            frequency: AudioParam::new(frequency),
            detune: AudioParam::new(0.0),
            schedule: Schedule::default(),
        }))
    }

    pub fn create_buffer_source(&mut self, buffer: Arc<[f32]>, looping: bool) -> NodeId {
        self.insert(Node::new(NodeKind::BufferSource {
            buffer,
            looping,
            position: 0.0,
            playback_rate: AudioParam::new(1.0),
            detune: AudioParam::new(0.0),
            schedule: Schedule::default(),
        }))
    }

    pub fn create_gain(&mut self, gain: f64) -> NodeId {
        self.insert(Node::new(NodeKind::Gain {
            gain: AudioParam::new(gain),
        }))
    }

    pub fn create_panner(&mut self) -> NodeId {
        self.insert(Node::new(NodeKind::Panner {
            pan: AudioParam::new(0.0),
        }))
    }

    pub fn create_compressor(&mut self, settings: CompressorSettings) -> NodeId {
        let comp = Compressor::new(settings, self.sample_rate);
        self.insert(Node::new(NodeKind::Compressor(comp)))
    }

    pub fn param(&self, id: NodeId, slot: ParamSlot) -> Result<&AudioParam, GraphError> {
        self.get(id)
            .ok_or(GraphError::UnknownNode(id))?
            .param(slot)
            .ok_or(GraphError::NoSuchParam { node: id, slot })
    }

    pub fn param_mut(&mut self, id: NodeId, slot: ParamSlot) -> Result<&mut AudioParam, GraphError> {
        self.get_mut(id)
            .ok_or(GraphError::UnknownNode(id))?
            .param_mut(slot)
            .ok_or(GraphError::NoSuchParam { node: id, slot })
    }

    /// Connect `from`'s output into a node or parameter. Connecting twice is
    /// a no-op.
    pub fn connect(&mut self, from: NodeId, to: impl Into<Target>) -> Result<(), GraphError> {
        let to = to.into();
        let source = self.get(from).ok_or(GraphError::UnknownNode(from))?;
        if source.is_destination() {
            return Err(GraphError::DestinationOutput);
        }
        let sink = self.get(to.node()).ok_or(GraphError::UnknownNode(to.node()))?;
        if let Target::Param(node, slot) = to {
            if sink.param(slot).is_none() {
                return Err(GraphError::NoSuchParam { node, slot });
            }
        }

        let edge = Edge { from, to };
        if self.edges.contains(&edge) {
            return Ok(());
        }
        if self.reaches(to.node(), from) {
            return Err(GraphError::Cycle { from, to: to.node() });
        }

        self.edges.push(edge);
        self.plan = None;
        Ok(())
    }

    /// Remove one connection if it exists.
    pub fn disconnect(&mut self, from: NodeId, to: impl Into<Target>) -> Detach {
        let edge = Edge { from, to: to.into() };
        match self.edges.iter().position(|e| *e == edge) {
            Some(i) => {
                self.edges.swap_remove(i);
                self.plan = None;
                Detach::Detached
            }
            None => Detach::AlreadyDetached,
        }
    }

    pub fn is_connected(&self, from: NodeId, to: impl Into<Target>) -> bool {
        let edge = Edge { from, to: to.into() };
        self.edges.contains(&edge)
    }

    pub fn start(&mut self, id: NodeId, when: f64) -> Result<(), GraphError> {
        self.schedule_mut(id)?.start = Some(when);
        Ok(())
    }

    pub fn stop(&mut self, id: NodeId, when: f64) -> Result<(), GraphError> {
        self.schedule_mut(id)?.stop = Some(when);
        Ok(())
    }

    /// Cleanup to run once the source `id` has passed its stop time.
    pub fn on_ended(&mut self, id: NodeId, teardown: Vec<Teardown>) -> Result<(), GraphError> {
        let node = self.get_mut(id).ok_or(GraphError::UnknownNode(id))?;
        if node.schedule().is_none() {
            return Err(GraphError::NotASource(id));
        }
        node.on_ended = teardown;
        Ok(())
    }

    pub fn source_state(&self, id: NodeId) -> Option<SourceState> {
        self.get(id)?
            .schedule()
            .map(|s| s.state_at(self.current_time()))
    }

    /// Drop a node and every connection touching it. The destination cannot
    /// be released.
    pub fn release(&mut self, id: NodeId) -> bool {
        if id == self.destination || !self.contains(id) {
            return false;
        }
        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.edges.retain(|e| e.from != id && e.to.node() != id);
        self.plan = None;
        true
    }

    /// Install a tap that sees the destination's left channel every block.
    /// Replaces any previous tap.
    pub fn set_capture_tap(&mut self, tap: CaptureTap) -> Option<CaptureTap> {
        self.tap.replace(tap)
    }

    pub fn take_capture_tap(&mut self) -> Option<CaptureTap> {
        self.tap.take()
    }

    /// Render into an interleaved buffer with `channels` channels, advancing
    /// the clock by `out.len() / channels` frames.
    ///
    /// Mono devices get `(L + R) / 2`; channels past the second are silent.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let total = out.len() / channels;
        let mut written = 0;

        while written < total {
            let frames = (total - written).min(RENDER_QUANTUM);
            self.process_block(frames);

            let dest = self.get(self.destination).map(|d| &d.output);
            let off = written * channels;
            for i in 0..frames {
                let (l, r) = dest.map_or((0.0, 0.0), |[l, r]| (l[i], r[i]));
                let frame = &mut out[off + i * channels..off + (i + 1) * channels];
                if channels == 1 {
                    frame[0] = (l + r) * 0.5;
                } else {
                    frame[0] = l;
                    frame[1] = r;
                    frame[2..].fill(0.0);
                }
            }
            written += frames;
        }
    }

    /// Advance the clock by `frames`, discarding the output.
    pub fn render_frames(&mut self, frames: usize) {
        let mut remaining = frames;
        while remaining > 0 {
            let n = remaining.min(RENDER_QUANTUM);
            self.process_block(n);
            remaining -= n;
        }
    }

    fn process_block(&mut self, frames: usize) {
        let ctx = BlockCtx {
            sample_rate: self.sample_rate,
            start_frame: self.frame,
            frames,
        };

        let plan = match self.plan.take() {
            Some(plan) => plan,
            None => self.build_plan(),
        };

        {
            let Self { slots, scratch, .. } = self;
            for step in &plan {
                let mut in_channels = 1;
                for &src in &step.inputs {
                    if let Some(node) = slots[src].node.as_ref() {
                        in_channels = in_channels.max(node.channels);
                    }
                }
                for buf in &mut scratch.input {
                    buf[..frames].fill(0.0);
                }
                for &src in &step.inputs {
                    let Some(node) = slots[src].node.as_ref() else {
                        continue;
                    };
                    let [l, r] = &node.output;
                    let [in_l, in_r] = &mut scratch.input;
                    for i in 0..frames {
                        in_l[i] += l[i];
                        if in_channels == 2 {
                            in_r[i] += if node.channels == 2 { r[i] } else { l[i] };
                        }
                    }
                }
                for &(slot, src) in &step.params {
                    let Some(node) = slots[src].node.as_ref() else {
                        continue;
                    };
                    let [l, r] = &node.output;
                    let buf = &mut scratch.params[slot.index()];
                    for i in 0..frames {
                        buf[i] += if node.channels == 2 {
                            (l[i] + r[i]) * 0.5
                        } else {
                            l[i]
                        };
                    }
                }

                if let Some(node) = slots[step.node].node.as_mut() {
                    node.process(&scratch.input, in_channels, &scratch.params, &ctx);
                }

                for &(slot, _) in &step.params {
                    scratch.params[slot.index()][..frames].fill(0.0);
                }
            }
        }
        self.plan = Some(plan);

        if let Some(tap) = self.tap.as_mut() {
            let dest = self.slots[self.destination.index as usize].node.as_ref();
            let samples = dest.map(|d| &d.output[0][..frames]);
            if tap.process(samples.unwrap_or(&[]), frames, ctx.start_frame) {
                self.tap = None;
            }
        }

        let end = ctx.end_time();
        for slot in &mut self.slots {
            let Some(node) = slot.node.as_mut() else {
                continue;
            };
            let Some(schedule) = node.schedule_mut() else {
                continue;
            };
            if !schedule.ended && schedule.stop.is_some_and(|stop| stop <= end) {
                schedule.ended = true;
                self.ended.append(&mut node.on_ended);
            }
        }

        self.frame += frames as u64;

        if !self.ended.is_empty() {
            for teardown in std::mem::take(&mut self.ended) {
                match teardown {
                    Teardown::Detach { from, to } => {
                        self.disconnect(from, to);
                    }
                    Teardown::Release(id) => {
                        self.release(id);
                    }
                }
            }
        }
    }

    /// Kahn's algorithm over live nodes. Param edges order their source
    /// before the parameter's owner.
    fn build_plan(&self) -> Vec<Step> {
        let n = self.slots.len();
        let mut indegree = vec![0usize; n];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut steps: Vec<Option<Step>> = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| {
                s.node.as_ref().map(|_| Step {
                    node: i,
                    inputs: Vec::new(),
                    params: Vec::new(),
                })
            })
            .collect();

        for edge in &self.edges {
            let from = edge.from.index as usize;
            let to = edge.to.node().index as usize;
            if let Some(step) = steps[to].as_mut() {
                match edge.to {
                    Target::Node(_) => step.inputs.push(from),
                    Target::Param(_, slot) => step.params.push((slot, from)),
                }
            }
            outgoing[from].push(to);
            indegree[to] += 1;
        }

        let mut ready: VecDeque<usize> = (0..n)
            .filter(|&i| steps[i].is_some() && indegree[i] == 0)
            .collect();
        let mut plan = Vec::with_capacity(n);
        while let Some(i) = ready.pop_front() {
            for &next in &outgoing[i] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push_back(next);
                }
            }
            if let Some(step) = steps[i].take() {
                plan.push(step);
            }
        }
        plan
    }

    /// Whether `to` is reachable from `from` along existing connections.
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.slots.len()];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            let i = id.index as usize;
            if std::mem::replace(&mut seen[i], true) {
                continue;
            }
            stack.extend(
                self.edges
                    .iter()
                    .filter(|e| e.from == id)
                    .map(|e| e.to.node()),
            );
        }
        false
    }

    fn schedule_mut(&mut self, id: NodeId) -> Result<&mut Schedule, GraphError> {
        self.get_mut(id)
            .ok_or(GraphError::UnknownNode(id))?
            .schedule_mut()
            .ok_or(GraphError::NotASource(id))
    }

    fn insert(&mut self, node: Node) -> NodeId {
        self.plan = None;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }
}
