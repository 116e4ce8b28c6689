//! Declarative instrument and percussion voices.
//!
//! A [`Patch`] is an ordered list of [`Operator`]s. Each operator is one
//! generator plus gain envelope; its [`Route`] decides whether it is heard
//! directly or modulates an operator declared before it. List order is a
//! dependency order: an operator may only reference lower indices.
//!
//! With the `serde` feature, operators (de)serialize with the compact
//! single-letter keys used by General-MIDI patch tables (`w`, `g`, `t`, ...),
//! and missing keys take the table defaults.

use std::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PatchError;

mod starter;

/// First MIDI note of the percussion map.
pub const FIRST_DRUM_NOTE: u8 = 35;
/// Last MIDI note of the percussion map.
pub const LAST_DRUM_NOTE: u8 = 81;
/// Number of addressable percussion voices.
pub const DRUM_NOTE_COUNT: usize = (LAST_DRUM_NOTE - FIRST_DRUM_NOTE + 1) as usize;

/// Noise tables a buffer-player operator can loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseKind {
    /// `n0`: uniform white noise.
    White,
    /// `n1`: white noise mixed with ring-modulated sine pairs.
    Metallic,
}

/// Generator selector for an operator.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    /// `w9999`: the engine's custom periodic wave.
    Custom,
    Noise(NoiseKind),
}

impl Waveform {
    pub fn is_noise(self) -> bool {
        matches!(self, Waveform::Noise(_))
    }
}

impl FromStr for Waveform {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            "w9999" => Ok(Waveform::Custom),
            "n0" => Ok(Waveform::Noise(NoiseKind::White)),
            "n1" => Ok(Waveform::Noise(NoiseKind::Metallic)),
            other => Err(PatchError::UnknownWaveform(other.to_string())),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
            Waveform::Custom => "w9999",
            Waveform::Noise(NoiseKind::White) => "n0",
            Waveform::Noise(NoiseKind::Metallic) => "n1",
        };
        f.write_str(name)
    }
}

impl TryFrom<String> for Waveform {
    type Error = PatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Waveform> for String {
    fn from(value: Waveform) -> Self {
        value.to_string()
    }
}

/// Where an operator's output goes.
///
/// Raw table values map as: `0` mix to the channel bus, `1..=10` modulate
/// the pitch of operator `g - 1`, anything above `10` modulates the level of
/// operator `g - 11`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "u8", into = "u8"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Route {
    #[default]
    MixToBus,
    ModulatePitchOf(usize),
    ModulateAmplitudeOf(usize),
}

impl Route {
    pub fn from_raw(g: u8) -> Self {
        match g {
            0 => Route::MixToBus,
            1..=10 => Route::ModulatePitchOf(usize::from(g) - 1),
            _ => Route::ModulateAmplitudeOf(usize::from(g) - 11),
        }
    }

    /// Raw table value. Pitch targets above index 9 have no raw encoding and
    /// saturate to 10.
    pub fn to_raw(self) -> u8 {
        match self {
            Route::MixToBus => 0,
            Route::ModulatePitchOf(i) => (i.min(9) + 1) as u8,
            Route::ModulateAmplitudeOf(i) => (i.min(244) + 11) as u8,
        }
    }

    /// Operator index this route references, if any.
    pub fn target(self) -> Option<usize> {
        match self {
            Route::MixToBus => None,
            Route::ModulatePitchOf(i) | Route::ModulateAmplitudeOf(i) => Some(i),
        }
    }
}

impl From<u8> for Route {
    fn from(g: u8) -> Self {
        Route::from_raw(g)
    }
}

impl From<Route> for u8 {
    fn from(route: Route) -> Self {
        route.to_raw()
    }
}

/// One generator + envelope unit of a patch.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operator {
    #[cfg_attr(feature = "serde", serde(rename = "w"))]
    pub waveform: Waveform,
    #[cfg_attr(feature = "serde", serde(rename = "g"))]
    pub route: Route,
    /// Multiplier applied to the referenced (or fundamental) frequency.
    #[cfg_attr(feature = "serde", serde(rename = "t"))]
    pub freq_ratio: f64,
    /// Offset in Hz added after the ratio.
    #[cfg_attr(feature = "serde", serde(rename = "f"))]
    pub freq_offset: f64,
    #[cfg_attr(feature = "serde", serde(rename = "v"))]
    pub level: f64,
    #[cfg_attr(feature = "serde", serde(rename = "a"))]
    pub attack: f64,
    #[cfg_attr(feature = "serde", serde(rename = "h"))]
    pub hold: f64,
    /// Time constant of the exponential decay toward `level * sustain`.
    #[cfg_attr(feature = "serde", serde(rename = "d"))]
    pub decay: f64,
    #[cfg_attr(feature = "serde", serde(rename = "s"))]
    pub sustain: f64,
    /// Carried for table fidelity; playback never reads it.
    #[cfg_attr(feature = "serde", serde(rename = "r"))]
    pub release: f64,
    /// Pitch envelope target as a ratio of the carrier. `1` disables it.
    #[cfg_attr(feature = "serde", serde(rename = "p"))]
    pub pitch_target: f64,
    #[cfg_attr(feature = "serde", serde(rename = "q"))]
    pub pitch_time: f64,
    /// Octave-wise level tracking around middle C.
    #[cfg_attr(feature = "serde", serde(rename = "k"))]
    pub key_scale: f64,
}

impl Default for Operator {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            route: Route::MixToBus,
            freq_ratio: 1.0,
            freq_offset: 0.0,
            level: 0.5,
            attack: 0.0,
            hold: 0.01,
            decay: 0.01,
            sustain: 0.0,
            release: 0.05,
            pitch_target: 1.0,
            pitch_time: 1.0,
            key_scale: 0.0,
        }
    }
}

impl Operator {
    /// `2^(((note - 60) / 12) * key_scale)`, or `1` when key scaling is off.
    pub fn key_scaling(&self, note: u8) -> f64 {
        if self.key_scale == 0.0 {
            return 1.0;
        }
        2.0_f64.powf((f64::from(note) - 60.0) / 12.0 * self.key_scale)
    }

    fn check(&self, patch: &str, index: usize) -> Result<(), PatchError> {
        let invalid = |field| PatchError::InvalidField {
            patch: patch.to_string(),
            index,
            field,
        };

        let finite = [
            (self.freq_ratio, "t"),
            (self.freq_offset, "f"),
            (self.level, "v"),
            (self.sustain, "s"),
            (self.pitch_target, "p"),
            (self.key_scale, "k"),
        ];
        for (value, field) in finite {
            if !value.is_finite() {
                return Err(invalid(field));
            }
        }

        let times = [
            (self.attack, "a"),
            (self.hold, "h"),
            (self.decay, "d"),
            (self.release, "r"),
            (self.pitch_time, "q"),
        ];
        for (value, field) in times {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field));
            }
        }

        if let Some(target) = self.route.target() {
            if target >= index {
                return Err(PatchError::ForwardRoute {
                    patch: patch.to_string(),
                    index,
                    target,
                });
            }
        }

        Ok(())
    }
}

/// A named instrument or percussion voice.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(rename = "p", alias = "operators"))]
    pub operators: Vec<Operator>,
}

impl Patch {
    pub fn new(name: impl Into<String>, operators: Vec<Operator>) -> Self {
        Self {
            name: name.into(),
            operators,
        }
    }

    /// Check that routing is forward-only and every number is usable.
    pub fn validate(&self) -> Result<(), PatchError> {
        if self.operators.is_empty() {
            return Err(PatchError::Empty {
                patch: self.name.clone(),
            });
        }
        for (index, op) in self.operators.iter().enumerate() {
            op.check(&self.name, index)?;
        }
        Ok(())
    }
}

/// The read-only table of instruments and drum voices the engine plays from.
///
/// Drums are addressed by MIDI note: entry `i` answers note `35 + i`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchBank {
    pub instruments: Vec<Patch>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub drums: Vec<Patch>,
}

impl PatchBank {
    pub fn new(instruments: Vec<Patch>, drums: Vec<Patch>) -> Result<Self, PatchError> {
        let bank = Self { instruments, drums };
        bank.validate()?;
        Ok(bank)
    }

    /// A small General-MIDI flavoured bank: a few instruments and a full
    /// 35..=81 drum map.
    pub fn starter() -> Self {
        starter::bank()
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, PatchError> {
        let bank: PatchBank = serde_json::from_str(json)?;
        bank.validate()?;
        Ok(bank)
    }

    pub fn validate(&self) -> Result<(), PatchError> {
        if self.drums.len() > DRUM_NOTE_COUNT {
            return Err(PatchError::TooManyDrums(self.drums.len()));
        }
        self.instruments
            .iter()
            .chain(self.drums.iter())
            .try_for_each(Patch::validate)
    }

    pub fn instrument_names(&self) -> Vec<String> {
        self.instruments.iter().map(|p| p.name.clone()).collect()
    }

    pub fn drum_names(&self) -> Vec<String> {
        self.drums.iter().map(|p| p.name.clone()).collect()
    }

    pub fn instrument_index(&self, name: &str) -> Option<usize> {
        self.instruments.iter().position(|p| p.name == name)
    }

    pub fn instrument(&self, index: usize) -> Option<&Patch> {
        self.instruments.get(index)
    }

    /// MIDI note that plays the named drum (map index + 35).
    pub fn drum_index(&self, name: &str) -> Option<u8> {
        self.drums
            .iter()
            .position(|p| p.name == name)
            .map(|i| FIRST_DRUM_NOTE + i as u8)
    }

    /// Drum voice for a MIDI note, or `None` outside 35..=81 or past the end
    /// of the map.
    pub fn drum_for_note(&self, note: u8) -> Option<&Patch> {
        if !(FIRST_DRUM_NOTE..=LAST_DRUM_NOTE).contains(&note) {
            return None;
        }
        self.drums.get(usize::from(note - FIRST_DRUM_NOTE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(route: Route) -> Operator {
        Operator {
            route,
            ..Operator::default()
        }
    }

    #[test]
    fn raw_routes_decode_into_roles() {
        assert_eq!(Route::from_raw(0), Route::MixToBus);
        assert_eq!(Route::from_raw(1), Route::ModulatePitchOf(0));
        assert_eq!(Route::from_raw(10), Route::ModulatePitchOf(9));
        assert_eq!(Route::from_raw(11), Route::ModulateAmplitudeOf(0));
        assert_eq!(Route::from_raw(13), Route::ModulateAmplitudeOf(2));

        for g in [0u8, 1, 5, 10, 11, 12, 40] {
            assert_eq!(Route::from_raw(g).to_raw(), g);
        }
    }

    #[test]
    fn forward_route_is_rejected() {
        let patch = Patch::new("bad", vec![op(Route::MixToBus), op(Route::ModulatePitchOf(1))]);
        let err = patch.validate().unwrap_err();
        assert!(matches!(
            err,
            PatchError::ForwardRoute {
                index: 1,
                target: 1,
                ..
            }
        ));
    }

    #[test]
    fn backward_routes_validate() {
        let patch = Patch::new(
            "fm",
            vec![
                op(Route::MixToBus),
                op(Route::ModulatePitchOf(0)),
                op(Route::ModulateAmplitudeOf(1)),
            ],
        );
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn negative_times_are_rejected() {
        let patch = Patch::new(
            "neg",
            vec![Operator {
                decay: -1.0,
                ..Operator::default()
            }],
        );
        assert!(matches!(
            patch.validate(),
            Err(PatchError::InvalidField { field: "d", .. })
        ));
    }

    #[test]
    fn drum_lookup_is_bounded_to_the_map() {
        let bank = PatchBank::starter();
        assert!(bank.drum_for_note(34).is_none());
        assert!(bank.drum_for_note(82).is_none());
        assert_eq!(bank.drum_for_note(35).map(|p| p.name.as_str()), Some("Acoustic Bass Drum"));
        assert_eq!(bank.drum_for_note(81).map(|p| p.name.as_str()), Some("Open Triangle"));
        assert_eq!(bank.drum_index("Acoustic Snare"), Some(38));
        assert_eq!(bank.drum_index("Kazoo"), None);
    }

    #[test]
    fn instrument_names_keep_table_order() {
        let bank = PatchBank::starter();
        let names = bank.instrument_names();
        assert_eq!(names.first().map(String::as_str), Some("Acoustic Grand Piano"));
        assert_eq!(bank.instrument_index(&names[2]), Some(2));
        assert_eq!(bank.instrument_index("Theremin Deluxe"), None);
    }

    #[test]
    fn starter_bank_validates() {
        let bank = PatchBank::starter();
        bank.validate().unwrap();
        assert_eq!(bank.drums.len(), DRUM_NOTE_COUNT);
    }

    #[test]
    fn waveform_names_parse() {
        assert_eq!("n1".parse::<Waveform>().unwrap(), Waveform::Noise(NoiseKind::Metallic));
        assert_eq!("w9999".parse::<Waveform>().unwrap(), Waveform::Custom);
        assert!("pulse".parse::<Waveform>().is_err());
        assert_eq!(Waveform::Sawtooth.to_string(), "sawtooth");
    }

    #[test]
    fn key_scaling_tracks_octaves() {
        let op = Operator {
            key_scale: 1.0,
            ..Operator::default()
        };
        assert!((op.key_scaling(72) - 2.0).abs() < 1e-12);
        assert!((op.key_scaling(48) - 0.5).abs() < 1e-12);
        assert_eq!(Operator::default().key_scaling(90), 1.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_bank_uses_short_keys_and_defaults() {
        let json = r#"{
            "instruments": [
                { "name": "Bell", "p": [
                    { "w": "sine", "v": 0.3, "d": 1.5 },
                    { "w": "sine", "g": 1, "t": 3.5, "v": 2 }
                ]}
            ]
        }"#;
        let bank = PatchBank::from_json(json).unwrap();
        let bell = bank.instrument(0).unwrap();
        assert_eq!(bell.operators.len(), 2);
        assert_eq!(bell.operators[1].route, Route::ModulatePitchOf(0));
        assert_eq!(bell.operators[1].freq_ratio, 3.5);
        assert_eq!(bell.operators[0].hold, 0.01);
        assert_eq!(bell.operators[0].pitch_target, 1.0);
        assert!(bank.drums.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_bank_with_forward_route_fails_to_load() {
        let json = r#"{ "instruments": [ { "name": "Loop", "p": [ { "g": 2 } ] } ] }"#;
        assert!(matches!(
            PatchBank::from_json(json),
            Err(PatchError::ForwardRoute { .. })
        ));
    }
}
