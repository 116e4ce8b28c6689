use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use rtrb::{Consumer, Producer, PushError};

use super::pcm::float_to_pcm16;

/// Flags shared between a [`CaptureTap`] and its [`Recording`](super::Recording).
#[derive(Debug, Default)]
pub(crate) struct CaptureStatus {
    /// Set by the tap after its final push.
    pub finished: AtomicBool,
    /// Set by the control side to stop the tap at the next block.
    pub cancelled: AtomicBool,
    pub dropped_blocks: AtomicUsize,
}

/// Render-thread half of a capture.
///
/// Sees the output bus once per block, converts samples to 16-bit PCM and
/// pushes full buffers into a bounded ring. It never blocks and never waits
/// on the control side: a full ring drops the buffer and counts it.
pub struct CaptureTap {
    producer: Producer<Vec<i16>>,
    recycled: Consumer<Vec<i16>>,
    pending: Vec<i16>,
    threshold: usize,
    disarm_at: u64,
    status: Arc<CaptureStatus>,
}

impl CaptureTap {
    pub(crate) fn new(
        producer: Producer<Vec<i16>>,
        recycled: Consumer<Vec<i16>>,
        threshold: usize,
        disarm_at: u64,
        status: Arc<CaptureStatus>,
    ) -> Self {
        let threshold = threshold.max(1);
        Self {
            producer,
            recycled,
            pending: Vec::with_capacity(threshold),
            threshold,
            disarm_at,
            status,
        }
    }

    /// Frame index at which the tap stops taking samples.
    pub fn disarm_at(&self) -> u64 {
        self.disarm_at
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Feed one rendered block that starts at frame `block_start` and spans
    /// `frames` frames. Returns `true` once the tap has disarmed and handed
    /// off everything it holds.
    pub fn process(&mut self, samples: &[f32], frames: usize, block_start: u64) -> bool {
        if self.status.finished.load(Ordering::Relaxed) {
            return true;
        }
        if self.status.cancelled.load(Ordering::Acquire) {
            self.finish();
            return true;
        }

        let armed = self.disarm_at.saturating_sub(block_start);
        let take = samples.len().min(frames).min(armed as usize);
        for &sample in &samples[..take] {
            self.pending.push(float_to_pcm16(sample));
            if self.pending.len() >= self.threshold {
                self.flush();
            }
        }

        if block_start + frames as u64 >= self.disarm_at {
            self.finish();
            return true;
        }
        false
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let next = match self.recycled.pop() {
            Ok(mut buf) => {
                buf.clear();
                buf
            }
            Err(_) => Vec::with_capacity(self.threshold),
        };
        let full = std::mem::replace(&mut self.pending, next);
        if let Err(PushError::Full(mut rejected)) = self.producer.push(full) {
            self.status.dropped_blocks.fetch_add(1, Ordering::Relaxed);
            rejected.clear();
            self.pending = rejected;
        }
    }

    fn finish(&mut self) {
        if self.status.finished.load(Ordering::Relaxed) {
            return;
        }
        self.flush();
        self.status.finished.store(true, Ordering::Release);
    }
}

impl Drop for CaptureTap {
    fn drop(&mut self) {
        self.finish();
    }
}
