use std::{f64::consts::TAU, sync::Arc};

/*
Oscillator Shapes
=================

Every periodic generator in the engine reads its waveform from a single
normalized phase in [0, 1). The graph advances the phase by

    increment = frequency / sample_rate

once per sample, so pitch changes (FM, detune, pitch envelopes) only ever
touch the increment and the waveform code stays stateless.


Band-Limiting
-------------

A naive sawtooth or square jumps instantaneously, which aliases loudly at
high pitches. We smooth each discontinuity with PolyBLEP: a two-sample
polynomial correction centred on the jump.

    naive saw      ╱│╱│╱│        polyblep saw   ╱╲╱╲╱╲  (rounded corners)

    t < inc          t/inc = x:   2x - x² - 1
    t > 1 - inc      (t-1)/inc:   x² + 2x + 1

The square is built from two saw-style edges (rising at 0, falling at 0.5).
Triangle and sine are continuous and need no correction.


Periodic Waves
--------------

`PeriodicWave` is a wavetable synthesized from harmonic coefficients:

    x(φ) = Σ (real[n]·cos(2πnφ) + imag[n]·sin(2πnφ))    n = 1..N

The table is normalized to a peak of 1.0 and read with linear
interpolation. `PeriodicWave::organ()` is the engine's custom wave.
*/

/// Number of samples in a periodic wavetable.
pub const WAVETABLE_SIZE: usize = 2048;

/// Convert a detune amount in cents into a frequency ratio.
#[inline]
pub fn cents_to_ratio(cents: f64) -> f64 {
    if cents == 0.0 {
        1.0
    } else {
        2.0_f64.powf(cents / 1200.0)
    }
}

/// Waveform generated by an oscillator node.
#[derive(Debug, Clone)]
pub enum OscillatorShape {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    Periodic(Arc<PeriodicWave>),
}

impl OscillatorShape {
    /// Sample the waveform at `phase` (in [0, 1)), given the current phase
    /// increment for band-limiting.
    #[inline]
    pub fn sample(&self, phase: f64, increment: f64) -> f32 {
        let inc = increment.abs().min(0.5);
        let value = match self {
            OscillatorShape::Sine => (phase * TAU).sin(),
            OscillatorShape::Sawtooth => {
                let naive = 2.0 * phase - 1.0;
                naive - poly_blep(phase, inc)
            }
            OscillatorShape::Square => {
                let naive = if phase < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(phase, inc) - poly_blep((phase + 0.5).fract(), inc)
            }
            OscillatorShape::Triangle => {
                if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                }
            }
            OscillatorShape::Periodic(wave) => return wave.sample(phase),
        };
        value as f32
    }
}

#[inline]
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let x = t / dt;
        2.0 * x - x * x - 1.0
    } else if t > 1.0 - dt {
        let x = (t - 1.0) / dt;
        x * x + 2.0 * x + 1.0
    } else {
        0.0
    }
}

/// A single-cycle wavetable built from harmonic coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicWave {
    table: Vec<f32>,
}

impl PeriodicWave {
    /// Build a wave from cosine (`real`) and sine (`imag`) coefficients.
    /// Index 0 (DC) is ignored. The result is normalized to a peak of 1.
    pub fn from_harmonics(real: &[f64], imag: &[f64]) -> Self {
        let harmonics = real.len().max(imag.len());
        let mut table: Vec<f64> = (0..WAVETABLE_SIZE)
            .map(|i| {
                let phase = i as f64 / WAVETABLE_SIZE as f64;
                (1..harmonics)
                    .map(|n| {
                        let angle = TAU * n as f64 * phase;
                        real.get(n).copied().unwrap_or(0.0) * angle.cos()
                            + imag.get(n).copied().unwrap_or(0.0) * angle.sin()
                    })
                    .sum()
            })
            .collect();

        let peak = table.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if peak > 0.0 {
            table.iter_mut().for_each(|v| *v /= peak);
        }

        Self {
            table: table.into_iter().map(|v| v as f32).collect(),
        }
    }

    /// Drawbar-organ style wave: fundamental plus a few decaying partials.
    pub fn organ() -> Self {
        let imag = [0.0, 1.0, 0.6, 0.0, 0.35, 0.0, 0.2, 0.0, 0.12];
        Self::from_harmonics(&[], &imag)
    }

    #[inline]
    pub fn sample(&self, phase: f64) -> f32 {
        let pos = phase.rem_euclid(1.0) * WAVETABLE_SIZE as f64;
        let i = pos as usize % WAVETABLE_SIZE;
        let j = (i + 1) % WAVETABLE_SIZE;
        let frac = (pos - pos.floor()) as f32;
        self.table[i] + (self.table[j] - self.table[i]) * frac
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
