/*
Parameter Automation
====================

An `AudioParam` is a number the render thread reads once per sample. It has
an intrinsic value plus a timeline of scheduled events, all in seconds on
the audio clock:

  SetValue(t, v)          jump to v at t and hold
  LinearRamp(t, v)        reach v at t along a straight line that starts at
                          the previous event's time and value
  SetTarget(t, v, tau)    from t on, approach v exponentially:
                          x(τ) = v + (x0 - v) · e^(-(τ - t) / tau)

  value
    vp ┤      ╱╲
       │     ╱  ╲_
       │    ╱     ‾‾──___
  s·vp ┤   ╱             ‾‾‾‾‾‾‾────
     0 ┼──╱─────────────────────────► time
          t  t+a  t+a+h
          SetValue  LinearRamp  SetTarget(decay)

This is the shape every operator's gain follows: hold at zero until the
note, ramp through the attack, then decay toward the sustain level.

Evaluation walks the timeline in order and keeps the active segment, which
is either a held value or an exponential approach. A ramp is the only event
that affects time *before* its own timestamp, so it is resolved as soon as
the query time falls inside it.

Events with equal timestamps keep their insertion order.
*/

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParamEvent {
    SetValue { time: f64, value: f64 },
    LinearRamp { time: f64, value: f64 },
    SetTarget {
        time: f64,
        target: f64,
        time_constant: f64,
    },
}

impl ParamEvent {
    fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. }
            | ParamEvent::LinearRamp { time, .. }
            | ParamEvent::SetTarget { time, .. } => time,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Held(f64),
    Approach {
        from: f64,
        target: f64,
        start: f64,
        time_constant: f64,
    },
}

impl Segment {
    fn at(&self, t: f64) -> f64 {
        match *self {
            Segment::Held(v) => v,
            Segment::Approach {
                from,
                target,
                start,
                time_constant,
            } => {
                if time_constant <= 0.0 || t < start {
                    return if t < start { from } else { target };
                }
                target + (from - target) * (-(t - start) / time_constant).exp()
            }
        }
    }
}

/// A sample-accurate automatable parameter.
#[derive(Debug, Clone)]
pub struct AudioParam {
    value: f64,
    events: Vec<ParamEvent>,
}

impl AudioParam {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }

    /// The intrinsic value used before any event and when no events exist.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn has_automation(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(ParamEvent::SetValue { time, value });
        self
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(ParamEvent::LinearRamp { time, value });
        self
    }

    pub fn set_target_at_time(&mut self, target: f64, time: f64, time_constant: f64) -> &mut Self {
        self.insert(ParamEvent::SetTarget {
            time,
            target,
            time_constant,
        });
        self
    }

    /// Drop every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) -> &mut Self {
        self.events.retain(|e| e.time() < time);
        self
    }

    /// Value of the parameter at audio time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        if self.events.is_empty() {
            return self.value;
        }

        let mut segment = Segment::Held(self.value);
        let mut anchor_time = 0.0;
        let mut anchor_value = self.value;

        for event in &self.events {
            match *event {
                ParamEvent::LinearRamp { time, value } => {
                    if t < time {
                        let span = time - anchor_time;
                        if span <= 0.0 {
                            return value;
                        }
                        let progress = ((t - anchor_time) / span).clamp(0.0, 1.0);
                        return anchor_value + (value - anchor_value) * progress;
                    }
                    segment = Segment::Held(value);
                    anchor_time = time;
                    anchor_value = value;
                }
                _ if event.time() > t => break,
                ParamEvent::SetValue { time, value } => {
                    segment = Segment::Held(value);
                    anchor_time = time;
                    anchor_value = value;
                }
                ParamEvent::SetTarget {
                    time,
                    target,
                    time_constant,
                } => {
                    let from = segment.at(time);
                    segment = Segment::Approach {
                        from,
                        target,
                        start: time,
                        time_constant,
                    };
                    anchor_time = time;
                    anchor_value = from;
                }
            }
        }

        segment.at(t)
    }

    fn insert(&mut self, event: ParamEvent) {
        let at = self
            .events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(at, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn intrinsic_value_without_events() {
        let mut p = AudioParam::new(3.0);
        assert_eq!(p.value_at(10.0), 3.0);
        p.set_value(1.5);
        assert_eq!(p.value_at(0.0), 1.5);
        assert!(!p.has_automation());
    }

    #[test]
    fn set_value_holds_from_its_time() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(2.0, 1.0);
        assert_eq!(p.value_at(0.5), 0.0);
        assert_eq!(p.value_at(1.0), 2.0);
        assert_eq!(p.value_at(9.0), 2.0);
    }

    #[test]
    fn attack_ramp_then_exponential_decay() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 1.0)
            .linear_ramp_to_value_at_time(1.0, 1.5)
            .set_target_at_time(0.25, 1.6, 0.1);

        assert_eq!(p.value_at(0.9), 0.0);
        assert_relative_eq!(p.value_at(1.25), 0.5, epsilon = 1e-12);
        assert_relative_eq!(p.value_at(1.55), 1.0, epsilon = 1e-12);
        // One time constant into the decay: 63% of the way to the target.
        let expected = 0.25 + 0.75 * (-1.0_f64).exp();
        assert_relative_eq!(p.value_at(1.7), expected, epsilon = 1e-12);
        assert_relative_eq!(p.value_at(10.0), 0.25, epsilon = 1e-9);
    }

    #[test]
    fn ramp_without_prior_event_starts_at_zero_time() {
        let mut p = AudioParam::new(0.0);
        p.linear_ramp_to_value_at_time(4.0, 2.0);
        assert_relative_eq!(p.value_at(1.0), 2.0, epsilon = 1e-12);
        assert_eq!(p.value_at(3.0), 4.0);
    }

    #[test]
    fn zero_time_constant_jumps() {
        let mut p = AudioParam::new(1.0);
        p.set_target_at_time(0.0, 0.5, 0.0);
        assert_eq!(p.value_at(0.4), 1.0);
        assert_eq!(p.value_at(0.5), 0.0);
    }

    #[test]
    fn pitch_target_approaches_from_intrinsic() {
        let mut p = AudioParam::new(440.0);
        p.set_target_at_time(220.0, 0.0, 0.05);
        assert_eq!(p.value_at(0.0), 440.0);
        assert_relative_eq!(p.value_at(1.0), 220.0, epsilon = 1e-6);
    }

    #[test]
    fn cancel_drops_events_from_time() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(1.0, 1.0).set_value_at_time(2.0, 2.0);
        p.cancel_scheduled_values(2.0);
        assert_eq!(p.value_at(5.0), 1.0);
        p.cancel_scheduled_values(0.0);
        assert!(!p.has_automation());
        assert_eq!(p.value_at(5.0), 0.0);
    }

    #[test]
    fn equal_times_keep_insertion_order() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(1.0, 1.0).set_value_at_time(2.0, 1.0);
        assert_eq!(p.value_at(1.0), 2.0);
    }
}
