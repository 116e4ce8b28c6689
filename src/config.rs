//! Engine tuning knobs.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{capture::DEFAULT_THRESHOLD, dsp::CompressorSettings};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    /// Sample rate used by offline engines. Realtime engines take the
    /// device's rate instead.
    pub sample_rate: f64,
    /// Rate of the shared vibrato oscillator, in Hz.
    pub lfo_frequency: f64,
    /// Initial vibrato depth per channel, in cents.
    pub modulation_depth: f64,
    /// Percussion stops `decay * release_ratio` seconds after its start.
    pub release_ratio: f64,
    /// Seconds a melodic voice stays registered past its nominal end.
    pub voice_slack: f64,
    /// PCM samples per capture handoff.
    pub capture_threshold: usize,
    /// Handoff ring slots. `None` sizes the ring to hold a whole capture.
    pub capture_ring_capacity: Option<usize>,
    pub prune_interval_ms: u64,
    /// The pruner sweeps on every `prune_duty_cycle`-th tick.
    pub prune_duty_cycle: u32,
    /// Run the pruner on its own thread. When off, call `Synth::sweep`.
    pub background_pruner: bool,
    /// Seed for the noise tables.
    pub noise_seed: u64,
    pub compressor: CompressorSettings,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            lfo_frequency: 5.0,
            modulation_depth: 1.0,
            release_ratio: 3.5,
            voice_slack: 1.0,
            capture_threshold: DEFAULT_THRESHOLD,
            capture_ring_capacity: None,
            prune_interval_ms: 60,
            prune_duty_cycle: 3,
            background_pruner: true,
            noise_seed: 0x5eed,
            compressor: CompressorSettings::default(),
        }
    }
}

impl SynthConfig {
    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms.max(1))
    }

    /// Configuration for deterministic offline use: no pruner thread.
    pub fn offline(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            background_pruner: false,
            ..Self::default()
        }
    }
}
