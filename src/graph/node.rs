use std::sync::Arc;

use crate::{
    dsp::{cents_to_ratio, pan, Compressor, OscillatorShape},
    RENDER_QUANTUM,
};

use super::{param::AudioParam, Teardown};

/// Automatable inputs a node may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSlot {
    /// Linear multiplier of a gain node.
    Gain,
    /// Oscillator frequency in Hz.
    Frequency,
    /// Pitch offset in cents, on oscillators and buffer players.
    Detune,
    /// Buffer player speed, 1.0 = original pitch.
    PlaybackRate,
    /// Stereo position in [-1, 1].
    Pan,
}

impl ParamSlot {
    pub const COUNT: usize = 5;

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ParamSlot::Gain => 0,
            ParamSlot::Frequency => 1,
            ParamSlot::Detune => 2,
            ParamSlot::PlaybackRate => 3,
            ParamSlot::Pan => 4,
        }
    }
}

/// Lifecycle of a scheduled source as seen from a point on the audio clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Unscheduled,
    Scheduled,
    Playing,
    Ended,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Schedule {
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub ended: bool,
}

impl Schedule {
    #[inline]
    fn is_playing(&self, t: f64) -> bool {
        !self.ended
            && self.start.is_some_and(|s| t >= s)
            && self.stop.map_or(true, |e| t < e)
    }

    pub fn state_at(&self, t: f64) -> SourceState {
        match self.start {
            _ if self.ended => SourceState::Ended,
            None => SourceState::Unscheduled,
            Some(s) if t < s => SourceState::Scheduled,
            Some(_) if self.stop.is_some_and(|e| t >= e) => SourceState::Ended,
            Some(_) => SourceState::Playing,
        }
    }
}

/// Timing of the block being rendered.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockCtx {
    pub sample_rate: f64,
    pub start_frame: u64,
    pub frames: usize,
}

impl BlockCtx {
    #[inline]
    pub fn time(&self, i: usize) -> f64 {
        (self.start_frame + i as u64) as f64 / self.sample_rate
    }

    pub fn end_time(&self) -> f64 {
        self.time(self.frames)
    }
}

pub(crate) enum NodeKind {
    Oscillator {
        shape: OscillatorShape,
        phase: f64,
        frequency: AudioParam,
        detune: AudioParam,
        schedule: Schedule,
    },
    BufferSource {
        buffer: Arc<[f32]>,
        looping: bool,
        position: f64,
        playback_rate: AudioParam,
        detune: AudioParam,
        schedule: Schedule,
    },
    Gain {
        gain: AudioParam,
    },
    Panner {
        pan: AudioParam,
    },
    Compressor(Compressor),
    Destination,
}

/// A graph vertex: its processor plus the block it produced last.
pub(crate) struct Node {
    pub kind: NodeKind,
    pub output: [Vec<f32>; 2],
    pub channels: usize,
    pub on_ended: Vec<Teardown>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            output: [vec![0.0; RENDER_QUANTUM], vec![0.0; RENDER_QUANTUM]],
            channels: 1,
            on_ended: Vec::new(),
        }
    }

    pub fn param(&self, slot: ParamSlot) -> Option<&AudioParam> {
        match (&self.kind, slot) {
            (NodeKind::Oscillator { frequency, .. }, ParamSlot::Frequency) => Some(frequency),
            (NodeKind::Oscillator { detune, .. }, ParamSlot::Detune) => Some(detune),
            (NodeKind::BufferSource { playback_rate, .. }, ParamSlot::PlaybackRate) => {
                Some(playback_rate)
            }
            (NodeKind::BufferSource { detune, .. }, ParamSlot::Detune) => Some(detune),
            (NodeKind::Gain { gain }, ParamSlot::Gain) => Some(gain),
            (NodeKind::Panner { pan }, ParamSlot::Pan) => Some(pan),
            _ => None,
        }
    }

    pub fn param_mut(&mut self, slot: ParamSlot) -> Option<&mut AudioParam> {
        match (&mut self.kind, slot) {
            (NodeKind::Oscillator { frequency, .. }, ParamSlot::Frequency) => Some(frequency),
            (NodeKind::Oscillator { detune, .. }, ParamSlot::Detune) => Some(detune),
            (NodeKind::BufferSource { playback_rate, .. }, ParamSlot::PlaybackRate) => {
                Some(playback_rate)
            }
            (NodeKind::BufferSource { detune, .. }, ParamSlot::Detune) => Some(detune),
            (NodeKind::Gain { gain }, ParamSlot::Gain) => Some(gain),
            (NodeKind::Panner { pan }, ParamSlot::Pan) => Some(pan),
            _ => None,
        }
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        match &self.kind {
            NodeKind::Oscillator { schedule, .. } | NodeKind::BufferSource { schedule, .. } => {
                Some(schedule)
            }
            _ => None,
        }
    }

    pub fn schedule_mut(&mut self) -> Option<&mut Schedule> {
        match &mut self.kind {
            NodeKind::Oscillator { schedule, .. } | NodeKind::BufferSource { schedule, .. } => {
                Some(schedule)
            }
            _ => None,
        }
    }

    pub fn is_destination(&self) -> bool {
        matches!(self.kind, NodeKind::Destination)
    }

    /// Render one block.
    ///
    /// `input` holds the summed node inputs in `in_channels` channels and
    /// `params` the summed audio-rate modulation per [`ParamSlot`]. Slots
    /// nothing is connected to are all zeros.
    pub fn process(
        &mut self,
        input: &[Vec<f32>; 2],
        in_channels: usize,
        params: &[Vec<f32>; ParamSlot::COUNT],
        ctx: &BlockCtx,
    ) {
        let n = ctx.frames;
        let [left, right] = &mut self.output;

        match &mut self.kind {
            NodeKind::Oscillator {
                shape,
                phase,
                frequency,
                detune,
                schedule,
            } => {
                let fm = &params[ParamSlot::Frequency.index()];
                let dm = &params[ParamSlot::Detune.index()];
                for i in 0..n {
                    let t = ctx.time(i);
                    if !schedule.is_playing(t) {
                        left[i] = 0.0;
                        continue;
                    }
                    let hz = (frequency.value_at(t) + f64::from(fm[i]))
                        * cents_to_ratio(detune.value_at(t) + f64::from(dm[i]));
                    let increment = hz / ctx.sample_rate;
                    left[i] = shape.sample(*phase, increment);
                    *phase = (*phase + increment).rem_euclid(1.0);
                }
                self.channels = 1;
            }

            NodeKind::BufferSource {
                buffer,
                looping,
                position,
                playback_rate,
                detune,
                schedule,
            } => {
                let rm = &params[ParamSlot::PlaybackRate.index()];
                let dm = &params[ParamSlot::Detune.index()];
                let len = buffer.len();
                for i in 0..n {
                    let t = ctx.time(i);
                    if len == 0 || !schedule.is_playing(t) {
                        left[i] = 0.0;
                        continue;
                    }
                    let pos = *position;
                    if !*looping && (pos < 0.0 || pos >= len as f64) {
                        left[i] = 0.0;
                        continue;
                    }
                    let idx = pos.floor() as usize % len;
                    let next = if *looping { (idx + 1) % len } else { (idx + 1).min(len - 1) };
                    let frac = (pos - pos.floor()) as f32;
                    left[i] = buffer[idx] + (buffer[next] - buffer[idx]) * frac;

                    let rate = (playback_rate.value_at(t) + f64::from(rm[i]))
                        * cents_to_ratio(detune.value_at(t) + f64::from(dm[i]));
                    let advanced = pos + rate;
                    *position = if *looping {
                        advanced.rem_euclid(len as f64)
                    } else {
                        advanced
                    };
                }
                self.channels = 1;
            }

            NodeKind::Gain { gain } => {
                let gm = &params[ParamSlot::Gain.index()];
                let [in_l, in_r] = input;
                for i in 0..n {
                    let g = (gain.value_at(ctx.time(i)) + f64::from(gm[i])) as f32;
                    left[i] = in_l[i] * g;
                    if in_channels == 2 {
                        right[i] = in_r[i] * g;
                    }
                }
                self.channels = in_channels;
            }

            NodeKind::Panner { pan } => {
                let pm = &params[ParamSlot::Pan.index()];
                let [in_l, in_r] = input;
                for i in 0..n {
                    let p = (pan.value_at(ctx.time(i)) + f64::from(pm[i])) as f32;
                    let (l, r) = if in_channels == 2 {
                        pan::pan_stereo(in_l[i], in_r[i], p)
                    } else {
                        pan::pan_mono(in_l[i], p)
                    };
                    left[i] = l;
                    right[i] = r;
                }
                self.channels = 2;
            }

            NodeKind::Compressor(comp) => {
                left[..n].copy_from_slice(&input[0][..n]);
                if in_channels == 2 {
                    right[..n].copy_from_slice(&input[1][..n]);
                    comp.process(&mut left[..n], &mut right[..n]);
                } else {
                    comp.process_mono(&mut left[..n]);
                }
                self.channels = in_channels;
            }

            NodeKind::Destination => {
                left[..n].copy_from_slice(&input[0][..n]);
                let src = if in_channels == 2 { &input[1] } else { &input[0] };
                right[..n].copy_from_slice(&src[..n]);
                self.channels = 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(frames: usize) -> BlockCtx {
        BlockCtx {
            sample_rate: 1_000.0,
            start_frame: 0,
            frames,
        }
    }

    fn silent() -> ([Vec<f32>; 2], [Vec<f32>; ParamSlot::COUNT]) {
        (
            [vec![0.0; RENDER_QUANTUM], vec![0.0; RENDER_QUANTUM]],
            std::array::from_fn(|_| vec![0.0; RENDER_QUANTUM]),
        )
    }

    #[test]
    fn schedule_reports_lifecycle() {
        let mut s = Schedule::default();
        assert_eq!(s.state_at(0.0), SourceState::Unscheduled);
        s.start = Some(1.0);
        s.stop = Some(2.0);
        assert_eq!(s.state_at(0.5), SourceState::Scheduled);
        assert_eq!(s.state_at(1.5), SourceState::Playing);
        assert_eq!(s.state_at(2.0), SourceState::Ended);
        assert!(!s.is_playing(2.0));
    }

    #[test]
    fn oscillator_is_silent_outside_its_schedule() {
        let mut node = Node::new(NodeKind::Oscillator {
            shape: OscillatorShape::Square,
            phase: 0.0,
            frequency: AudioParam::new(10.0),
            detune: AudioParam::new(0.0),
            schedule: Schedule {
                start: Some(0.05),
                stop: Some(0.1),
                ended: false,
            },
        });
        let (input, params) = silent();
        node.process(&input, 1, &params, &ctx(RENDER_QUANTUM));
        assert!(node.output[0][..50].iter().all(|&s| s == 0.0));
        assert!(node.output[0][50..100].iter().any(|&s| s != 0.0));
        assert!(node.output[0][100..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn looping_buffer_wraps() {
        let buffer: Arc<[f32]> = Arc::from(vec![1.0, 2.0, 3.0, 4.0]);
        let mut node = Node::new(NodeKind::BufferSource {
            buffer,
            looping: true,
            position: 0.0,
            playback_rate: AudioParam::new(1.0),
            detune: AudioParam::new(0.0),
            schedule: Schedule {
                start: Some(0.0),
                stop: None,
                ended: false,
            },
        });
        let (input, params) = silent();
        node.process(&input, 1, &params, &ctx(6));
        assert_eq!(&node.output[0][..6], &[1.0, 2.0, 3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn gain_modulation_adds_to_intrinsic_value() {
        let mut node = Node::new(NodeKind::Gain {
            gain: AudioParam::new(0.0),
        });
        let (mut input, mut params) = silent();
        input[0][..4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);
        params[ParamSlot::Gain.index()][..4].copy_from_slice(&[0.0, 0.5, 1.0, -1.0]);
        node.process(&input, 1, &params, &ctx(4));
        assert_eq!(&node.output[0][..4], &[0.0, 0.5, 1.0, -1.0]);
        assert_eq!(node.channels, 1);
    }

    #[test]
    fn sources_expose_their_own_params() {
        let node = Node::new(NodeKind::Gain {
            gain: AudioParam::new(1.0),
        });
        assert!(node.param(ParamSlot::Gain).is_some());
        assert!(node.param(ParamSlot::Detune).is_none());
        assert!(node.schedule().is_none());
    }
}
