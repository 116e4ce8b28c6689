//! tsynth - play a short phrase and save what came out
//!
//! Usage: tsynth [--offline] [--bank BANK.json] [OUT.wav]

use std::{fs, path::PathBuf, thread, time::Duration};

use color_eyre::eyre::{eyre, WrapErr};
use tinysynth::{capture::Recording, NoteOn, PatchBank, Synth, SynthConfig};
use tracing::info;

/// One bar at 120 bpm.
const PHRASE_SECONDS: f64 = 2.0;

struct Args {
    offline: bool,
    bank: Option<PathBuf>,
    out: PathBuf,
}

fn parse_args() -> color_eyre::Result<Args> {
    let mut args = Args {
        offline: false,
        bank: None,
        out: PathBuf::from("tsynth.wav"),
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--offline" => args.offline = true,
            "--bank" => {
                let path = it.next().ok_or_else(|| eyre!("--bank needs a path"))?;
                args.bank = Some(path.into());
            }
            flag if flag.starts_with("--") => return Err(eyre!("unknown flag `{flag}`")),
            path => args.out = path.into(),
        }
    }
    Ok(args)
}

fn load_bank(path: Option<&PathBuf>) -> color_eyre::Result<PatchBank> {
    let Some(path) = path else {
        return Ok(PatchBank::starter());
    };
    let json = fs::read_to_string(path)
        .wrap_err_with(|| format!("reading bank {}", path.display()))?;
    PatchBank::from_json(&json).wrap_err_with(|| format!("loading bank {}", path.display()))
}

fn play_phrase(synth: &Synth) {
    let instruments = synth.instrument_names();
    if let Some(first) = instruments.first() {
        synth.set_instrument(0, first);
    }
    if let Some(bass) = instruments.iter().find(|name| name.contains("Bass")) {
        synth.set_instrument(1, bass);
    }

    let beat = PHRASE_SECONDS / 4.0;
    for (i, note) in [60u8, 64, 67, 72].into_iter().enumerate() {
        synth.note_on(NoteOn::new(0, note, i as f64 * beat, beat * 0.9));
    }
    synth.note_on(NoteOn::new(1, 36, 0.0, PHRASE_SECONDS).velocity(90));

    let kick = synth.drum_note("Acoustic Bass Drum");
    let hat = synth.drum_note("Closed Hi Hat");
    for step in 0..8 {
        let at = step as f64 * beat / 2.0;
        if let (Some(kick), 0) = (kick, step % 4) {
            synth.note_on(NoteOn::new(9, kick, at, 0.1));
        }
        if let Some(hat) = hat {
            synth.note_on(NoteOn::new(9, hat, at, 0.05).velocity(70));
        }
    }
}

fn capture_offline(synth: &Synth, mut recording: Recording) -> Vec<u8> {
    let mut block = vec![0.0f32; 1024 * 2];
    while !recording.is_complete() {
        synth.render(&mut block, 2);
        synth.sweep();
    }
    recording.into_wav()
}

fn capture_realtime(mut recording: Recording) -> Vec<u8> {
    while !recording.is_complete() {
        recording.poll();
        thread::sleep(Duration::from_millis(50));
    }
    recording.into_wav()
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = parse_args()?;
    let bank = load_bank(args.bank.as_ref())?;

    let wav = if args.offline {
        let synth = Synth::offline(bank, SynthConfig::offline(48_000.0))
            .wrap_err("starting offline engine")?;
        let recording = synth.recording(PHRASE_SECONDS);
        play_phrase(&synth);
        capture_offline(&synth, recording)
    } else {
        let synth = Synth::new(bank, SynthConfig::default()).wrap_err("opening audio output")?;
        let recording = synth.recording(PHRASE_SECONDS);
        play_phrase(&synth);
        capture_realtime(recording)
    };

    fs::write(&args.out, &wav).wrap_err_with(|| format!("writing {}", args.out.display()))?;
    info!(path = %args.out.display(), bytes = wav.len(), "capture written");
    Ok(())
}
