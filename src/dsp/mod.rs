//! Low-level DSP primitives used by the audio graph nodes.
//!
//! These components hold no graph knowledge. They are the signal math the
//! graph's oscillators, buffer players, panners and compressor call into one
//! block at a time.

/// Stereo-linked dynamics compressor for the master bus.
pub mod compressor;
/// Seeded white and metallic noise tables.
pub mod noise;
/// Periodic waveforms, wavetables, and pitch helpers.
pub mod oscillator;
/// Equal-power stereo panning.
pub mod pan;

pub use compressor::{Compressor, CompressorSettings};
pub use oscillator::{cents_to_ratio, OscillatorShape, PeriodicWave};
