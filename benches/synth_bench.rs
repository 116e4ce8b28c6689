//! Benchmarks for the render path.
//!
//! Run with: cargo bench
//!
//! Reference timing at 48kHz sample rate:
//!   - 128 samples = 2.67ms deadline (one render quantum)
//!   - 512 samples = 10.67ms deadline
//!
//! Benchmark groups:
//!   - dsp/*        Oscillator, compressor and PCM conversion kernels
//!   - scenarios/*  Whole-engine renders at increasing polyphony

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tinysynth::{
    capture::float_to_pcm16,
    dsp::{Compressor, CompressorSettings, OscillatorShape, PeriodicWave},
    NoteOn, PatchBank, Synth, SynthConfig,
};

const SAMPLE_RATE: f64 = 48_000.0;
const BLOCK_SIZES: &[usize] = &[128, 512];

fn bench_oscillators(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");
    let increment = 440.0 / SAMPLE_RATE;
    let shapes = [
        ("sine", OscillatorShape::Sine),
        ("sawtooth", OscillatorShape::Sawtooth),
        ("square", OscillatorShape::Square),
        ("periodic", OscillatorShape::Periodic(PeriodicWave::organ().into())),
    ];

    for (name, shape) in shapes {
        group.bench_function(name, |b| {
            let mut buffer = vec![0.0f32; 128];
            b.iter(|| {
                let mut phase = 0.0;
                for sample in buffer.iter_mut() {
                    *sample = shape.sample(phase, increment);
                    phase = (phase + increment).fract();
                }
                black_box(&buffer);
            })
        });
    }
    group.finish();
}

fn bench_compressor(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/compressor");
    for &size in BLOCK_SIZES {
        let mut compressor = Compressor::new(CompressorSettings::default(), SAMPLE_RATE);
        let mut left: Vec<f32> = (0..size).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut right = left.clone();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| compressor.process(black_box(&mut left), black_box(&mut right)))
        });
    }
    group.finish();
}

fn bench_pcm(c: &mut Criterion) {
    let samples: Vec<f32> = (0..3_200).map(|i| (i as f32 * 0.01).sin() * 1.2).collect();
    c.bench_function("dsp/pcm16", |b| {
        b.iter(|| {
            let pcm: Vec<i16> = samples.iter().map(|&s| float_to_pcm16(s)).collect();
            black_box(pcm)
        })
    });
}

fn bench_polyphony(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/polyphony");
    for voices in [1usize, 8, 32] {
        let synth = Synth::offline(PatchBank::starter(), SynthConfig::offline(SAMPLE_RATE))
            .expect("offline engine");
        synth.set_instrument(0, "Electric Piano 1");
        for i in 0..voices {
            synth.note_on(NoteOn::new(0, 40 + (i % 48) as u8, 0.0, 3_600.0));
        }
        let mut out = vec![0.0f32; 128 * 2];
        group.bench_with_input(BenchmarkId::from_parameter(voices), &voices, |b, _| {
            b.iter(|| synth.render(black_box(&mut out), 2))
        });
    }
    group.finish();
}

fn bench_note_on(c: &mut Criterion) {
    let synth = Synth::offline(PatchBank::starter(), SynthConfig::offline(SAMPLE_RATE))
        .expect("offline engine");
    synth.set_instrument(0, "Acoustic Grand Piano");
    c.bench_function("scenarios/note_on_and_sweep", |b| {
        b.iter(|| {
            synth.note_on(NoteOn::new(0, 60, 0.0, 0.0));
            synth.all_sound_off(0)
        })
    });
}

criterion_group!(
    benches,
    bench_oscillators,
    bench_compressor,
    bench_pcm,
    bench_polyphony,
    bench_note_on,
);
criterion_main!(benches);
