#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Output Compressor
=================

The master bus runs through a feed-forward, stereo-linked compressor so that
many overlapping voices do not clip the device.

    input ──► peak(|L|,|R|) ──► envelope follower ──► dB ──► gain curve ─┐
      │                                                                  │
      └──────────────────────────── × ◄──────────────────────────────────┘

Gain curve (soft knee)
----------------------

    output
     dB  │                    ╱  slope 1/ratio
         │                ╭──╯
         │              ╱   knee (quadratic blend)
         │            ╱
         │          ╱  slope 1
         └────────────────────── input dB
                   threshold

Below `threshold - knee/2` nothing happens. Above `threshold + knee/2` every
dB over threshold is reduced to 1/ratio dB. In between the reduction grows
quadratically so the curve has no corner.

Defaults follow the browser compressor node: threshold -24 dB, knee 30 dB,
ratio 12, attack 3 ms, release 250 ms.
*/

/// Static compressor configuration.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    /// dB above which gain reduction starts.
    pub threshold: f64,
    /// Width in dB of the soft transition around the threshold.
    pub knee: f64,
    pub ratio: f64,
    /// Seconds.
    pub attack: f64,
    /// Seconds.
    pub release: f64,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold: -24.0,
            knee: 30.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}

impl CompressorSettings {
    /// Gain reduction in dB (always <= 0) for an input level in dB.
    pub fn gain_reduction(&self, input_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio.max(1.0);
        if self.knee <= 0.0 {
            return if input_db <= self.threshold {
                0.0
            } else {
                (self.threshold - input_db) * slope
            };
        }

        let half_knee = self.knee / 2.0;
        let knee_start = self.threshold - half_knee;
        if input_db <= knee_start {
            0.0
        } else if input_db >= self.threshold + half_knee {
            (self.threshold - input_db) * slope
        } else {
            let x = input_db - knee_start;
            -slope * x * x / (2.0 * self.knee)
        }
    }
}

/// Stereo-linked compressor state.
#[derive(Debug, Clone)]
pub struct Compressor {
    settings: CompressorSettings,
    attack_coef: f64,
    release_coef: f64,
    envelope: f64,
}

impl Compressor {
    pub fn new(settings: CompressorSettings, sample_rate: f64) -> Self {
        let coef = |seconds: f64| (-1.0 / (seconds.max(1e-4) * sample_rate)).exp();
        Self {
            attack_coef: coef(settings.attack),
            release_coef: coef(settings.release),
            settings,
            envelope: 0.0,
        }
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Linear gain to apply to the frame whose peak level is `peak`.
    #[inline]
    pub fn next_gain(&mut self, peak: f32) -> f32 {
        let level = f64::from(peak.abs());
        let coef = if level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * level;

        if self.envelope <= 1e-6 {
            return 1.0;
        }
        let envelope_db = 20.0 * self.envelope.log10();
        let reduction_db = self.settings.gain_reduction(envelope_db);
        10.0_f64.powf(reduction_db / 20.0) as f32
    }

    /// Compress a stereo block in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let gain = self.next_gain(l.abs().max(r.abs()));
            *l *= gain;
            *r *= gain;
        }
    }

    /// Compress a mono block in place.
    pub fn process_mono(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            let gain = self.next_gain(*s);
            *s *= gain;
        }
    }
}
