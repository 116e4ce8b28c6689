//! One-second noise tables looped by buffer-player operators.
//!
//! Both tables are generated once per engine from a seeded [`SmallRng`], so
//! offline renders are reproducible.

use std::f64::consts::TAU;

use rand::{rngs::SmallRng, Rng, SeedableRng};

const METALLIC_PAIRS: usize = 64;
const METALLIC_BASE_HZ: f64 = 440.0;

/// Uniform white noise in [-1, 1).
pub fn white(sample_rate: f64, seed: u64) -> Vec<f32> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let len = table_len(sample_rate);
    (0..len).map(|_| rng.random_range(-1.0_f32..1.0)).collect()
}

/// White noise plus 64 ring-modulated sine pairs at random ratios of 440 Hz.
pub fn metallic(sample_rate: f64, seed: u64) -> Vec<f32> {
    let mut rng = SmallRng::seed_from_u64(seed ^ 0x6d65_7461_6c6c_6963);
    let len = table_len(sample_rate);
    let mut table: Vec<f64> = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();

    for _ in 0..METALLIC_PAIRS {
        let r1: f64 = rng.random_range(1.0..11.0);
        let r2: f64 = rng.random_range(1.0..11.0);
        let w1 = TAU * METALLIC_BASE_HZ * r1 / sample_rate;
        let w2 = TAU * METALLIC_BASE_HZ * r2 / sample_rate;
        for (i, sample) in table.iter_mut().enumerate() {
            let i = i as f64;
            *sample += (w1 * i).sin() * (w2 * i).sin() / 8.0;
        }
    }

    table.into_iter().map(|v| v as f32).collect()
}

fn table_len(sample_rate: f64) -> usize {
    (sample_rate.round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_noise_is_seeded_and_bounded() {
        let a = white(8_000.0, 7);
        let b = white(8_000.0, 7);
        assert_eq!(a.len(), 8_000);
        assert_eq!(a, b);
        assert!(a.iter().all(|s| (-1.0..1.0).contains(s)));
        assert_ne!(a, white(8_000.0, 8));
    }

    #[test]
    fn metallic_noise_differs_from_white() {
        let m = metallic(8_000.0, 7);
        assert_eq!(m.len(), 8_000);
        assert_ne!(m, white(8_000.0, 7));
        assert!(m.iter().all(|s| s.is_finite()));
    }
}
