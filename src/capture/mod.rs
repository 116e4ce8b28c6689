//! Output capture: render-thread tap → lock-free ring → WAV bytes.
//!
//! ```text
//!   render thread                     control thread
//!   ─────────────                     ──────────────
//!   CaptureTap ── Vec<i16> (≥3200) ──► Recording ── poll ──► PCM bytes
//!        ▲                                 │
//!        └──────── recycled buffers ◄──────┘
//! ```
//!
//! Both rings are bounded single-producer/single-consumer `rtrb` queues.
//! The tap disarms itself on the audio clock, hands off its partial buffer,
//! then flags completion.

mod pcm;
mod recording;
mod tap;
pub mod wav;

use std::sync::Arc;

use rtrb::RingBuffer;

pub use pcm::float_to_pcm16;
pub use recording::Recording;
pub use tap::CaptureTap;
pub use wav::{encode_wav, WavHeader};

use tap::CaptureStatus;

/// Samples accumulated before a buffer is handed to the control side.
pub const DEFAULT_THRESHOLD: usize = 3200;

/// Create a connected tap/recording pair.
///
/// The tap captures until frame `disarm_at`. `capacity` bounds how many
/// full buffers may wait in the ring before the tap starts dropping.
pub fn pair(sample_rate: u32, threshold: usize, disarm_at: u64, capacity: usize) -> (CaptureTap, Recording) {
    let capacity = capacity.max(1);
    let (producer, consumer) = RingBuffer::new(capacity);
    let (recycle, recycled) = RingBuffer::new(capacity);
    let status = Arc::new(CaptureStatus::default());

    let tap = CaptureTap::new(producer, recycled, threshold, disarm_at, Arc::clone(&status));
    let recording = Recording::new(consumer, recycle, status, sample_rate);
    (tap, recording)
}

/// Ring slots needed to hold a whole capture of `seconds` without the
/// control side polling, plus a little headroom.
pub fn ring_capacity(seconds: f64, sample_rate: f64, threshold: usize) -> usize {
    let samples = (seconds.max(0.0) * sample_rate).ceil();
    (samples / threshold.max(1) as f64).ceil() as usize + 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_flush_at_threshold() {
        let (mut tap, mut rec) = pair(48_000, 3_200, u64::MAX, 8);
        let ramp: Vec<f32> = (0..3_200).map(|i| i as f32 / 3_200.0).collect();

        // Uneven chunking must not matter.
        let mut frame = 0;
        for chunk in [1_000, 128, 2_000, 72] {
            let start = frame as usize;
            assert!(!tap.process(&ramp[start..start + chunk], chunk, frame));
            frame += chunk as u64;
        }

        assert_eq!(rec.poll(), 1);
        assert_eq!(tap.pending(), 0);
        assert_eq!(rec.data_len(), 6_400);
        let samples: Vec<i16> = rec
            .data()
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        let expected: Vec<i16> = ramp.iter().map(|&s| float_to_pcm16(s)).collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn disarm_flushes_the_partial_buffer() {
        let (mut tap, mut rec) = pair(1_000, 3_200, 200, 8);
        let block = vec![0.25_f32; 128];
        assert!(!tap.process(&block, 128, 0));
        assert!(!rec.is_complete());
        assert!(tap.process(&block, 128, 128));

        assert!(rec.is_complete());
        // 128 + 72 frames before the disarm point.
        assert_eq!(rec.data_len(), 400);
        let wav = rec.wav_bytes().unwrap();
        assert_eq!(wav.len(), wav::HEADER_LEN + 400);
    }

    #[test]
    fn full_ring_drops_instead_of_blocking() {
        let (mut tap, mut rec) = pair(1_000, 4, u64::MAX, 1);
        let block = [0.1_f32; 12];
        tap.process(&block, 12, 0);
        assert_eq!(rec.dropped_blocks(), 2);
        assert_eq!(rec.poll(), 1);
        assert_eq!(rec.data_len(), 8);
    }

    #[test]
    fn cancel_completes_at_next_block() {
        let (mut tap, mut rec) = pair(1_000, 3_200, u64::MAX, 4);
        tap.process(&[0.5; 64], 64, 0);
        rec.cancel();
        assert!(tap.process(&[0.5; 64], 64, 64));
        assert!(rec.is_complete());
        assert_eq!(rec.data_len(), 128);
    }

    #[test]
    fn dropping_the_tap_completes_the_recording() {
        let (tap, mut rec) = pair(1_000, 3_200, u64::MAX, 4);
        assert!(!rec.is_complete());
        drop(tap);
        assert!(rec.is_complete());
        assert_eq!(rec.into_wav().len(), wav::HEADER_LEN);
    }

    #[test]
    fn capacity_covers_the_whole_capture() {
        assert_eq!(ring_capacity(1.0, 48_000.0, 3_200), 19);
        assert_eq!(ring_capacity(0.0, 48_000.0, 3_200), 4);
    }
}
