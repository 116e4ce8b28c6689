use std::sync::Arc;

use crate::{
    dsp::{noise, OscillatorShape, PeriodicWave},
    patch::{NoiseKind, Waveform},
};

/// Shared sample data every voice draws its generators from.
///
/// Built once per engine at the graph's sample rate and shared by reference
/// with each buffer player.
#[derive(Debug, Clone)]
pub struct SourceBank {
    white: Arc<[f32]>,
    metallic: Arc<[f32]>,
    custom: Arc<PeriodicWave>,
}

/// What kind of graph node an operator needs.
#[derive(Debug, Clone)]
pub enum Generator {
    Oscillator(OscillatorShape),
    Noise(Arc<[f32]>),
}

impl SourceBank {
    pub fn new(sample_rate: f64, seed: u64) -> Self {
        Self {
            white: noise::white(sample_rate, seed).into(),
            metallic: noise::metallic(sample_rate, seed).into(),
            custom: Arc::new(PeriodicWave::organ()),
        }
    }

    pub fn generator(&self, waveform: Waveform) -> Generator {
        match waveform {
            Waveform::Sine => Generator::Oscillator(OscillatorShape::Sine),
            Waveform::Square => Generator::Oscillator(OscillatorShape::Square),
            Waveform::Sawtooth => Generator::Oscillator(OscillatorShape::Sawtooth),
            Waveform::Triangle => Generator::Oscillator(OscillatorShape::Triangle),
            Waveform::Custom => {
                Generator::Oscillator(OscillatorShape::Periodic(Arc::clone(&self.custom)))
            }
            Waveform::Noise(NoiseKind::White) => Generator::Noise(Arc::clone(&self.white)),
            Waveform::Noise(NoiseKind::Metallic) => Generator::Noise(Arc::clone(&self.metallic)),
        }
    }
}
