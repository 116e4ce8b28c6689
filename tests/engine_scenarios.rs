use approx::assert_relative_eq;
use tinysynth::{
    capture::{self, WavHeader},
    NoteOn, NoteOutcome, Operator, Patch, PatchBank, Route, SkipReason, Synth, SynthConfig,
    VoiceState,
};

const SR: f64 = 8_000.0;

fn tone(name: &str) -> Patch {
    Patch::new(
        name,
        vec![Operator {
            sustain: 1.0,
            ..Operator::default()
        }],
    )
}

fn engine() -> Synth {
    let bank = PatchBank::new(
        vec![
            tone("Lead"),
            Patch::new(
                "Bell",
                vec![
                    Operator::default(),
                    Operator {
                        route: Route::ModulatePitchOf(0),
                        freq_ratio: 3.5,
                        ..Operator::default()
                    },
                ],
            ),
        ],
        vec![tone("Kick"), tone("Kick 2")],
    )
    .unwrap();
    Synth::offline(bank, SynthConfig::offline(SR)).unwrap()
}

#[test]
fn single_voice_lifecycle() {
    let synth = engine();
    synth.set_instrument(0, "Lead");

    let outcome = synth.note_on(NoteOn::new(0, 69, 0.5, 0.5));
    let NoteOutcome::Tracked { id, expiry } = outcome else {
        panic!("expected a tracked voice, got {outcome:?}");
    };
    assert_relative_eq!(expiry, 2.0, epsilon = 1e-9);
    assert_eq!(synth.active_voices(), 1);

    synth.advance(1.9);
    assert_eq!(synth.sweep(), 0);
    assert_eq!(synth.voice_state(id), Some(VoiceState::Sounding));

    synth.advance(0.2);
    assert_eq!(synth.sweep(), 1);
    assert_eq!(synth.active_voices(), 0);
    assert_eq!(synth.voice_state(id), Some(VoiceState::Stopped));
    // A second sweep finds nothing.
    assert_eq!(synth.sweep(), 0);
}

#[test]
fn pruning_returns_the_graph_to_its_baseline() {
    let synth = engine();
    let baseline = synth.node_count();
    synth.set_instrument(0, "Bell");
    synth.set_instrument(5, "Lead");

    synth.note_on(NoteOn::new(0, 60, 0.0, 0.2));
    synth.note_on(NoteOn::new(5, 64, 0.1, 0.2));
    assert_eq!(synth.node_count(), baseline + 6);

    synth.advance(1.5);
    assert_eq!(synth.sweep(), 2);
    assert_eq!(synth.node_count(), baseline);
}

#[test]
fn all_sound_off_only_touches_its_channel() {
    let synth = engine();
    synth.set_instrument(0, "Lead");
    synth.set_instrument(1, "Lead");
    for note in [60, 64, 67] {
        synth.note_on(NoteOn::new(0, note, 0.0, 10.0));
    }
    let other = synth.note_on(NoteOn::new(1, 72, 0.0, 10.0)).voice_id().unwrap();

    assert_eq!(synth.all_sound_off(0), 3);
    assert_eq!(synth.active_voices(), 1);
    assert_eq!(synth.voice_state(other), Some(VoiceState::Sounding));
    assert_eq!(synth.all_sound_off(0), 0);
}

#[test]
fn percussion_cleans_up_without_the_registry() {
    let synth = engine();
    let baseline = synth.node_count();

    let outcome = synth.note_on(NoteOn::new(9, 35, 0.0, 0.1));
    let NoteOutcome::SelfStopping { stop_at } = outcome else {
        panic!("expected self-stopping percussion, got {outcome:?}");
    };
    // Default operator decay is 0.01 s.
    assert_relative_eq!(stop_at, 0.035, epsilon = 1e-9);
    assert_eq!(synth.active_voices(), 0);
    assert_eq!(synth.node_count(), baseline + 2);

    synth.advance(0.1);
    assert_eq!(synth.node_count(), baseline);
}

#[test]
fn percussion_map_bounds() {
    let synth = engine();
    assert!(matches!(
        synth.note_on(NoteOn::new(9, 36, 0.0, 0.1)),
        NoteOutcome::SelfStopping { .. }
    ));
    for note in [34, 37, 82] {
        assert_eq!(
            synth.note_on(NoteOn::new(9, note, 0.0, 0.1)),
            NoteOutcome::Skipped(SkipReason::DrumOutOfRange)
        );
    }
    assert_eq!(synth.drum_note("Kick 2"), Some(36));
    assert_eq!(synth.drum_note("Cowbell"), None);
}

#[test]
fn unknown_instrument_is_logged_not_fatal() {
    let synth = engine();
    assert_eq!(synth.set_instrument(4, "Theremin"), None);
    assert!(synth.note_on(NoteOn::new(4, 60, 0.0, 1.0)).is_skipped());
    assert_eq!(synth.instrument_names(), ["Lead", "Bell"]);
    assert_eq!(synth.drum_names(), ["Kick", "Kick 2"]);
}

#[test]
fn channel_setters_ignore_unknown_channels() {
    let synth = engine();
    synth.set_channel_volume(3, 0.25).unwrap();
    synth.set_channel_pan(3, -1.0).unwrap();
    synth.set_modulation_depth(3, 12.0).unwrap();
    synth.set_channel_volume(16, 0.5).unwrap();
}

#[test]
fn recording_disarms_on_the_audio_clock() {
    let synth = engine();
    synth.set_instrument(0, "Lead");
    let mut recording = synth.recording(0.5);
    synth.note_on(NoteOn::new(0, 69, 0.0, 0.5));

    synth.advance(1.0);
    assert!(!recording.is_complete());
    synth.advance(1.0);
    assert!(recording.is_complete());

    // 1.5 s of mono PCM16.
    let frames = (1.5 * SR) as usize;
    assert_eq!(recording.data_len(), frames * 2);
    assert_eq!(recording.dropped_blocks(), 0);
    assert!(recording.blocks_received() >= frames / capture::DEFAULT_THRESHOLD);

    let wav = recording.wav_bytes().unwrap();
    assert_eq!(wav.len(), capture::wav::HEADER_LEN + frames * 2);
    assert_eq!(&wav[..44], WavHeader::new(SR as u32, (frames * 2) as u32).to_bytes());
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]) as usize, frames * 2);
    assert!(wav[44..].iter().any(|&b| b != 0));
}

#[test]
fn a_new_recording_completes_the_previous_one() {
    let synth = engine();
    let mut first = synth.recording(5.0);
    synth.advance(0.25);
    let mut second = synth.recording(0.0);
    assert!(first.is_complete());
    assert_eq!(first.data_len(), (0.25 * SR) as usize * 2);

    synth.advance(1.0);
    assert!(second.is_complete());
    assert_eq!(second.data_len(), SR as usize * 2);
}

#[test]
fn background_pruner_sweeps_on_its_own() {
    let bank = PatchBank::new(vec![tone("Lead")], Vec::new()).unwrap();
    let mut config = SynthConfig::offline(SR);
    config.background_pruner = true;
    config.prune_interval_ms = 5;
    config.prune_duty_cycle = 1;
    let mut synth = Synth::offline(bank, config).unwrap();
    synth.set_instrument(0, "Lead");
    synth.note_on(NoteOn::new(0, 60, 0.0, 0.0));
    synth.advance(1.5);

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while synth.active_voices() > 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    assert_eq!(synth.active_voices(), 0);
    synth.release();
    assert!(synth.is_released());
}

#[test]
fn a_full_ring_drops_blocks_instead_of_blocking() {
    let bank = PatchBank::new(vec![tone("Lead")], Vec::new()).unwrap();
    let mut config = SynthConfig::offline(SR);
    config.capture_ring_capacity = Some(1);
    let synth = Synth::offline(bank, config).unwrap();

    // Two seconds is five full handoffs; only the first fits.
    let mut recording = synth.recording(1.0);
    synth.advance(2.5);
    assert!(recording.is_complete());
    assert_eq!(recording.dropped_blocks(), 4);
    assert_eq!(recording.data_len(), capture::DEFAULT_THRESHOLD * 2);
}

#[test]
fn one_second_note_expires_at_two_seconds() {
    let synth = engine();
    synth.set_instrument(0, "Lead");
    let outcome = synth.note_on(NoteOn::new(0, 60, 0.0, 1.0).velocity(100));
    let NoteOutcome::Tracked { expiry, .. } = outcome else {
        panic!("expected a tracked voice, got {outcome:?}");
    };
    assert_relative_eq!(expiry, 2.0, epsilon = 1e-9);

    synth.advance(2.05);
    assert_eq!(synth.sweep(), 1);
    assert_eq!(synth.active_voices(), 0);
}
