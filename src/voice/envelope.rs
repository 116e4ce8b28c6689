use crate::{graph::AudioParam, patch::Operator};

/*
Operator Envelopes
==================

Envelopes are not generators here. They are automation written once, at
note-on, onto the operator's gain and pitch parameters; the graph replays
them sample by sample.

Amplitude
---------

    level
     peak ┤    ╱‾‾‾‾╲
          │   ╱      ╲__
          │  ╱           ‾‾‾──────  peak · sustain
        0 ┼─╱──────────────────────►
          t   t+a   t+a+h

  attack  (a)  linear 0 → peak. With a = 0 the gain jumps to peak at t.
  hold    (h)  stays at peak.
  decay   (d)  exponential approach to peak·sustain with time constant d.
               With d = 0 the gain jumps straight to peak·sustain.

There is no release stage. Melodic voices are silenced by the pruner and
percussion stops on its own schedule.

Pitch
-----

When `pitch_target != 1` the operator glides from its carrier frequency
toward `carrier · pitch_target` with time constant `pitch_time`, starting at
the note. Drums use this for the falling "thump" of kicks and toms.
*/

/// Approach `value` from `time` with `time_constant`, or jump there when
/// the constant is zero.
pub fn set_param_target(param: &mut AudioParam, value: f64, time: f64, time_constant: f64) {
    if time_constant != 0.0 {
        param.set_target_at_time(value, time, time_constant);
    } else {
        param.set_value_at_time(value, time);
    }
}

/// Write the attack/hold/decay shape for an operator whose peak gain is
/// `peak`, starting at absolute time `start`.
pub fn schedule_amplitude(gain: &mut AudioParam, op: &Operator, peak: f64, start: f64) {
    if op.attack != 0.0 {
        gain.set_value(0.0);
        gain.set_value_at_time(0.0, start)
            .linear_ramp_to_value_at_time(peak, start + op.attack);
    } else {
        gain.set_value_at_time(peak, start);
    }
    set_param_target(gain, op.sustain * peak, start + op.attack + op.hold, op.decay);
}

/// Glide a pitch-like parameter from its current value toward `target`.
pub fn schedule_pitch(param: &mut AudioParam, target: f64, start: f64, time_constant: f64) {
    set_param_target(param, target, start, time_constant);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn op(attack: f64, hold: f64, decay: f64, sustain: f64) -> Operator {
        Operator {
            attack,
            hold,
            decay,
            sustain,
            ..Operator::default()
        }
    }

    #[test]
    fn attack_reaches_peak_exactly_at_its_end() {
        let mut gain = AudioParam::new(1.0);
        schedule_amplitude(&mut gain, &op(0.1, 0.05, 0.2, 0.5), 0.8, 2.0);
        assert_eq!(gain.value_at(1.99), 0.0);
        assert_relative_eq!(gain.value_at(2.05), 0.4, epsilon = 1e-9);
        assert_relative_eq!(gain.value_at(2.1), 0.8, epsilon = 1e-9);
        assert_relative_eq!(gain.value_at(2.15), 0.8, epsilon = 1e-9);
    }

    #[test]
    fn decay_never_exceeds_peak_and_settles_on_sustain() {
        let mut gain = AudioParam::new(0.0);
        let peak = 0.6;
        schedule_amplitude(&mut gain, &op(0.0, 0.01, 0.3, 0.25), peak, 0.0);

        let mut previous = f64::MAX;
        for i in 0..400 {
            let t = 0.01 + i as f64 * 0.01;
            let v = gain.value_at(t);
            assert!(v <= peak + 1e-12);
            assert!(v <= previous + 1e-12, "decay rose at {t}");
            previous = v;
        }
        assert_relative_eq!(gain.value_at(30.0), peak * 0.25, epsilon = 1e-9);
    }

    #[test]
    fn zero_decay_jumps_to_sustain() {
        let mut gain = AudioParam::new(0.0);
        schedule_amplitude(&mut gain, &op(0.0, 0.1, 0.0, 1.0), 0.5, 0.0);
        assert_eq!(gain.value_at(0.05), 0.5);
        assert_eq!(gain.value_at(0.2), 0.5);
    }

    #[test]
    fn pitch_glides_toward_target() {
        let mut freq = AudioParam::new(200.0);
        schedule_pitch(&mut freq, 100.0, 1.0, 0.05);
        assert_eq!(freq.value_at(0.5), 200.0);
        let mid = freq.value_at(1.05);
        assert!(mid < 200.0 && mid > 100.0);
        assert_relative_eq!(freq.value_at(3.0), 100.0, epsilon = 1e-6);
    }
}
