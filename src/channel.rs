//! The sixteen persistent channel buses and the shared output stage.
//!
//! ```text
//!                         ┌──────── per channel (×16) ────────┐
//!   voice gains ───────►  │ volume (gain) ──► pan (stereo)    │ ──► out ──► compressor ──► destination
//!                         │                                   │
//!   lfo (5 Hz sine) ───►  │ modulation (gain, cents) ──► voice detune params
//!                         └───────────────────────────────────┘
//! ```
//!
//! Buses are built once when the engine starts and live until it is
//! released. Channel 9 is the percussion channel.

use tracing::debug;

use crate::{
    config::SynthConfig,
    dsp::OscillatorShape,
    error::GraphError,
    graph::{AudioGraph, NodeId, ParamSlot},
};

pub const CHANNEL_COUNT: usize = 16;
pub const PERCUSSION_CHANNEL: usize = 9;

/// Graph nodes owned by one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBus {
    /// Voices mix into this gain.
    pub volume: NodeId,
    pub pan: NodeId,
    /// Scales the shared LFO into a vibrato depth in cents.
    pub modulation: NodeId,
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub bus: ChannelBus,
    /// Index into the bank's instruments, `None` when the last selection did
    /// not resolve.
    pub instrument: Option<usize>,
    pub percussion: bool,
}

pub struct ChannelRig {
    channels: Vec<Channel>,
    lfo: NodeId,
    output: NodeId,
    compressor: NodeId,
}

impl ChannelRig {
    /// Build the output stage, the LFO and all channel buses, and start the
    /// LFO at the current audio time.
    pub fn install(graph: &mut AudioGraph, config: &SynthConfig) -> Result<Self, GraphError> {
        let output = graph.create_gain(1.0);
        let compressor = graph.create_compressor(config.compressor);
        graph.connect(output, compressor)?;
        graph.connect(compressor, graph.destination())?;

        let lfo = graph.create_oscillator(OscillatorShape::Sine, config.lfo_frequency);
        graph.start(lfo, graph.current_time())?;

        let channels = (0..CHANNEL_COUNT)
            .map(|ch| -> Result<Channel, GraphError> {
                let volume = graph.create_gain(1.0);
                let pan = graph.create_panner();
                let modulation = graph.create_gain(config.modulation_depth);
                graph.connect(volume, pan)?;
                graph.connect(pan, output)?;
                graph.connect(lfo, modulation)?;
                Ok(Channel {
                    bus: ChannelBus {
                        volume,
                        pan,
                        modulation,
                    },
                    instrument: Some(0),
                    percussion: ch == PERCUSSION_CHANNEL,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(channels = CHANNEL_COUNT, lfo_hz = config.lfo_frequency, "channel rig installed");
        Ok(Self {
            channels,
            lfo,
            output,
            compressor,
        })
    }

    pub fn channel(&self, ch: usize) -> Option<&Channel> {
        self.channels.get(ch)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Store a resolved instrument selection. Returns `false` for a channel
    /// outside 0..16.
    pub fn select_instrument(&mut self, ch: usize, instrument: Option<usize>) -> bool {
        match self.channels.get_mut(ch) {
            Some(channel) => {
                channel.instrument = instrument;
                true
            }
            None => false,
        }
    }

    pub fn lfo(&self) -> NodeId {
        self.lfo
    }

    pub fn output(&self) -> NodeId {
        self.output
    }

    pub fn compressor(&self) -> NodeId {
        self.compressor
    }

    pub fn set_volume(&self, graph: &mut AudioGraph, ch: usize, volume: f64) -> Result<(), GraphError> {
        self.set(graph, ch, |bus| bus.volume, ParamSlot::Gain, volume)
    }

    /// `pan` is clamped to [-1, 1] by the panner.
    pub fn set_pan(&self, graph: &mut AudioGraph, ch: usize, pan: f64) -> Result<(), GraphError> {
        self.set(graph, ch, |bus| bus.pan, ParamSlot::Pan, pan)
    }

    pub fn set_modulation_depth(&self, graph: &mut AudioGraph, ch: usize, cents: f64) -> Result<(), GraphError> {
        self.set(graph, ch, |bus| bus.modulation, ParamSlot::Gain, cents)
    }

    fn set(
        &self,
        graph: &mut AudioGraph,
        ch: usize,
        node: impl Fn(&ChannelBus) -> NodeId,
        slot: ParamSlot,
        value: f64,
    ) -> Result<(), GraphError> {
        // Unknown channels are ignored like any other out-of-range command.
        let Some(channel) = self.channels.get(ch) else {
            return Ok(());
        };
        graph.param_mut(node(&channel.bus), slot)?.set_value(value);
        Ok(())
    }

    /// Release every node the rig created. Called once, on engine release.
    pub fn teardown(&self, graph: &mut AudioGraph) {
        for channel in &self.channels {
            let ChannelBus {
                volume,
                pan,
                modulation,
            } = channel.bus;
            graph.release(volume);
            graph.release(pan);
            graph.release(modulation);
        }
        graph.release(self.lfo);
        graph.release(self.output);
        graph.release(self.compressor);
        debug!("channel rig torn down");
    }
}
