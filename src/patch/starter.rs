//! Built-in demo bank.
//!
//! A handful of melodic instruments and a complete General-MIDI percussion
//! map. Drums are derived from a few archetypes (kick, snare, hat, tom,
//! cymbal, ...) tuned per note. Drum operators use `t = 0` so their pitch is
//! the fixed offset `f` in Hz rather than the played note.

use super::{NoiseKind, Operator, Patch, PatchBank, Route, Waveform};

const SINE: Waveform = Waveform::Sine;
const TRIANGLE: Waveform = Waveform::Triangle;
const SAW: Waveform = Waveform::Sawtooth;
const SQUARE: Waveform = Waveform::Square;
const ORGAN: Waveform = Waveform::Custom;
const WHITE: Waveform = Waveform::Noise(NoiseKind::White);
const METAL: Waveform = Waveform::Noise(NoiseKind::Metallic);

/// Fluent tweaks for writing operator tables compactly.
trait Tweak: Sized {
    fn route(self, g: u8) -> Self;
    fn level(self, v: f64) -> Self;
    fn ratio(self, t: f64) -> Self;
    /// Fixed pitch in Hz (`t = 0`, `f = hz`).
    fn fixed(self, hz: f64) -> Self;
    fn env(self, a: f64, h: f64, d: f64, s: f64) -> Self;
    fn pitch(self, p: f64, q: f64) -> Self;
    fn keyed(self, k: f64) -> Self;
}

impl Tweak for Operator {
    fn route(mut self, g: u8) -> Self {
        self.route = Route::from_raw(g);
        self
    }

    fn level(mut self, v: f64) -> Self {
        self.level = v;
        self
    }

    fn ratio(mut self, t: f64) -> Self {
        self.freq_ratio = t;
        self
    }

    fn fixed(mut self, hz: f64) -> Self {
        self.freq_ratio = 0.0;
        self.freq_offset = hz;
        self
    }

    fn env(mut self, a: f64, h: f64, d: f64, s: f64) -> Self {
        self.attack = a;
        self.hold = h;
        self.decay = d;
        self.sustain = s;
        self
    }

    fn pitch(mut self, p: f64, q: f64) -> Self {
        self.pitch_target = p;
        self.pitch_time = q;
        self
    }

    fn keyed(mut self, k: f64) -> Self {
        self.key_scale = k;
        self
    }
}

fn op(waveform: Waveform) -> Operator {
    Operator {
        waveform,
        ..Operator::default()
    }
}

pub(super) fn bank() -> PatchBank {
    PatchBank {
        instruments: instruments(),
        drums: drums(),
    }
}

fn instruments() -> Vec<Patch> {
    vec![
        Patch::new(
            "Acoustic Grand Piano",
            vec![
                op(SINE).level(0.4).env(0.0, 0.01, 0.7, 0.0),
                op(TRIANGLE).route(1).level(3.0).env(0.01, 0.01, 0.7, 0.1).keyed(-1.2),
            ],
        ),
        Patch::new(
            "Bright Acoustic Piano",
            vec![
                op(TRIANGLE).level(0.4).env(0.0, 0.01, 0.7, 0.0),
                op(TRIANGLE).route(1).ratio(3.0).level(4.0).env(0.01, 0.01, 0.4, 0.1).keyed(-1.0),
            ],
        ),
        Patch::new(
            "Electric Piano 1",
            vec![
                op(SINE).level(0.5).env(0.0, 0.01, 0.7, 0.05),
                op(SINE).route(1).ratio(4.0).level(1.5).env(0.0, 0.01, 0.2, 0.0),
            ],
        ),
        Patch::new(
            "Church Organ",
            vec![
                op(ORGAN).level(0.3).env(0.05, 0.01, 1.0, 1.0),
                op(SINE).ratio(2.0).level(0.1).env(0.05, 0.01, 1.0, 1.0),
            ],
        ),
        Patch::new(
            "Acoustic Bass",
            vec![
                op(SINE).level(0.6).env(0.0, 0.01, 0.3, 0.3),
                op(SINE).route(1).level(2.0).env(0.0, 0.01, 0.1, 0.1),
            ],
        ),
        Patch::new(
            "String Ensemble 1",
            vec![
                op(SAW).level(0.2).env(0.12, 0.5, 2.0, 0.8),
                op(SINE).route(11).ratio(0.005).level(0.4).env(0.2, 1.0, 1.0, 1.0),
            ],
        ),
        Patch::new(
            "Flute",
            vec![
                op(SINE).level(0.4).env(0.06, 0.01, 1.0, 0.8),
                op(WHITE).route(11).level(0.2).env(0.0, 0.05, 0.05, 0.0),
            ],
        ),
        Patch::new(
            "Lead 2 (sawtooth)",
            vec![
                op(SAW).level(0.25).env(0.0, 0.01, 0.4, 0.5),
                op(SQUARE).ratio(1.005).level(0.15).env(0.0, 0.01, 0.4, 0.5),
            ],
        ),
    ]
}

fn kick(hz: f64) -> Vec<Operator> {
    vec![
        op(SINE).fixed(hz).level(1.0).env(0.0, 0.03, 0.08, 0.0).pitch(0.4, 0.05),
        op(WHITE).level(0.15).env(0.0, 0.0, 0.01, 0.0),
    ]
}

fn snare(tone_hz: f64, decay: f64) -> Vec<Operator> {
    vec![
        op(WHITE).level(0.6).env(0.0, 0.02, decay, 0.0),
        op(TRIANGLE).fixed(tone_hz).level(0.5).env(0.0, 0.01, 0.05, 0.0).pitch(0.7, 0.05),
    ]
}

fn side_stick() -> Vec<Operator> {
    vec![
        op(SQUARE).fixed(450.0).level(0.3).env(0.0, 0.0, 0.02, 0.0),
        op(WHITE).level(0.2).env(0.0, 0.0, 0.01, 0.0),
    ]
}

fn clap() -> Vec<Operator> {
    vec![
        op(WHITE).level(0.6).env(0.0, 0.01, 0.06, 0.0),
        op(METAL).level(0.2).env(0.0, 0.0, 0.03, 0.0),
    ]
}

fn hat(decay: f64) -> Vec<Operator> {
    vec![op(METAL).level(0.35).env(0.0, 0.005, decay, 0.0)]
}

fn tom(hz: f64) -> Vec<Operator> {
    vec![
        op(SINE).fixed(hz).level(0.9).env(0.0, 0.03, 0.12, 0.0).pitch(0.6, 0.1),
        op(WHITE).level(0.1).env(0.0, 0.0, 0.02, 0.0),
    ]
}

fn cymbal(decay: f64) -> Vec<Operator> {
    vec![
        op(METAL).level(0.45).env(0.0, 0.01, decay, 0.0),
        op(WHITE).level(0.15).env(0.0, 0.0, decay * 0.5, 0.0),
    ]
}

fn bell(hz: f64, decay: f64) -> Vec<Operator> {
    vec![
        op(SINE).fixed(hz).level(0.5).env(0.0, 0.01, decay, 0.0),
        op(SINE).route(1).ratio(2.76).level(1.2).env(0.0, 0.01, decay * 0.5, 0.0),
    ]
}

fn shaker(noise: Waveform, decay: f64) -> Vec<Operator> {
    vec![op(noise).level(0.3).env(0.005, 0.0, decay, 0.0)]
}

fn perc(hz: f64, decay: f64) -> Vec<Operator> {
    vec![op(TRIANGLE).fixed(hz).level(0.8).env(0.0, 0.0, decay, 0.0)]
}

fn skin(hz: f64, decay: f64) -> Vec<Operator> {
    vec![
        op(SINE).fixed(hz).level(0.8).env(0.0, 0.01, decay, 0.0).pitch(0.85, 0.05),
        op(WHITE).level(0.05).env(0.0, 0.0, 0.01, 0.0),
    ]
}

fn whistle(hz: f64, length: f64) -> Vec<Operator> {
    vec![
        op(SINE).fixed(hz).level(0.35).env(0.01, length, length * 0.3, 0.0),
        op(SINE).route(1).fixed(30.0).level(0.02).env(0.0, length, 0.1, 1.0),
    ]
}

fn guiro(length: f64) -> Vec<Operator> {
    vec![
        op(WHITE).level(0.3).env(0.0, length, length * 0.3, 0.0),
        op(SQUARE).route(11).fixed(40.0).level(1.0).env(0.0, length, 0.1, 1.0),
    ]
}

fn cuica(hz: f64, glide: f64) -> Vec<Operator> {
    vec![op(SINE).fixed(hz).level(0.5).env(0.0, 0.02, 0.1, 0.0).pitch(glide, 0.06)]
}

fn drums() -> Vec<Patch> {
    let map: [(&str, Vec<Operator>); 47] = [
        ("Acoustic Bass Drum", kick(60.0)),
        ("Bass Drum 1", kick(70.0)),
        ("Side Stick", side_stick()),
        ("Acoustic Snare", snare(180.0, 0.08)),
        ("Hand Clap", clap()),
        ("Electric Snare", snare(220.0, 0.06)),
        ("Low Floor Tom", tom(80.0)),
        ("Closed Hi Hat", hat(0.02)),
        ("High Floor Tom", tom(95.0)),
        ("Pedal Hi-Hat", hat(0.035)),
        ("Low Tom", tom(110.0)),
        ("Open Hi-Hat", hat(0.15)),
        ("Low-Mid Tom", tom(130.0)),
        ("Hi-Mid Tom", tom(150.0)),
        ("Crash Cymbal 1", cymbal(0.4)),
        ("High Tom", tom(175.0)),
        ("Ride Cymbal 1", cymbal(0.25)),
        ("Chinese Cymbal", cymbal(0.3)),
        ("Ride Bell", bell(1_250.0, 0.2)),
        ("Tambourine", shaker(METAL, 0.06)),
        ("Splash Cymbal", cymbal(0.2)),
        ("Cowbell", bell(560.0, 0.08)),
        ("Crash Cymbal 2", cymbal(0.45)),
        ("Vibraslap", guiro(0.2)),
        ("Ride Cymbal 2", cymbal(0.28)),
        ("Hi Bongo", skin(400.0, 0.06)),
        ("Low Bongo", skin(300.0, 0.08)),
        ("Mute Hi Conga", skin(330.0, 0.04)),
        ("Open Hi Conga", skin(310.0, 0.1)),
        ("Low Conga", skin(220.0, 0.12)),
        ("High Timbale", skin(480.0, 0.07)),
        ("Low Timbale", skin(360.0, 0.09)),
        ("High Agogo", bell(900.0, 0.06)),
        ("Low Agogo", bell(600.0, 0.07)),
        ("Cabasa", shaker(WHITE, 0.04)),
        ("Maracas", shaker(WHITE, 0.025)),
        ("Short Whistle", whistle(2_300.0, 0.06)),
        ("Long Whistle", whistle(2_100.0, 0.25)),
        ("Short Guiro", guiro(0.06)),
        ("Long Guiro", guiro(0.2)),
        ("Claves", perc(2_500.0, 0.02)),
        ("Hi Wood Block", perc(1_700.0, 0.025)),
        ("Low Wood Block", perc(1_200.0, 0.03)),
        ("Mute Cuica", cuica(700.0, 1.2)),
        ("Open Cuica", cuica(500.0, 0.6)),
        ("Mute Triangle", bell(4_000.0, 0.03)),
        ("Open Triangle", bell(4_000.0, 0.3)),
    ];

    map.into_iter()
        .map(|(name, operators)| Patch::new(name, operators))
        .collect()
}
