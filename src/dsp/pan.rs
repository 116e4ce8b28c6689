//! Equal-power stereo panning.

use std::f32::consts::FRAC_PI_2;

/// Place a mono sample in the stereo field. `pan` is clamped to [-1, 1].
#[inline]
pub fn pan_mono(sample: f32, pan: f32) -> (f32, f32) {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) / 2.0;
    let angle = x * FRAC_PI_2;
    (sample * angle.cos(), sample * angle.sin())
}

/// Shift a stereo frame: negative pan folds the right channel into the
/// left, positive pan folds the left into the right.
#[inline]
pub fn pan_stereo(left: f32, right: f32, pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    if pan <= 0.0 {
        let angle = (pan + 1.0) * FRAC_PI_2;
        (left + right * angle.cos(), right * angle.sin())
    } else {
        let angle = pan * FRAC_PI_2;
        (left * angle.cos(), right + left * angle.sin())
    }
}
