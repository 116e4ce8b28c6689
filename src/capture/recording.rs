use std::sync::{atomic::Ordering, Arc};

use rtrb::{Consumer, Producer};

use super::{tap::CaptureStatus, wav::encode_wav};

/// Control-side half of a capture.
///
/// Drains PCM buffers handed off by the render thread and assembles them
/// into a WAV file. Nothing here ever blocks the producer.
pub struct Recording {
    consumer: Consumer<Vec<i16>>,
    recycle: Producer<Vec<i16>>,
    status: Arc<CaptureStatus>,
    sample_rate: u32,
    data: Vec<u8>,
    blocks: usize,
}

impl Recording {
    pub(crate) fn new(
        consumer: Consumer<Vec<i16>>,
        recycle: Producer<Vec<i16>>,
        status: Arc<CaptureStatus>,
        sample_rate: u32,
    ) -> Self {
        Self {
            consumer,
            recycle,
            status,
            sample_rate,
            data: Vec::new(),
            blocks: 0,
        }
    }

    /// Move every handed-off buffer into the payload. Returns how many
    /// buffers arrived since the last poll.
    pub fn poll(&mut self) -> usize {
        let mut received = 0;
        while let Ok(block) = self.consumer.pop() {
            self.data.reserve(block.len() * 2);
            for sample in &block {
                self.data.extend_from_slice(&sample.to_le_bytes());
            }
            // A full return ring just means the tap allocates its next buffer.
            let _ = self.recycle.push(block);
            received += 1;
        }
        self.blocks += received;
        received
    }

    /// True once the tap has disarmed and its last buffer has been drained.
    pub fn is_complete(&mut self) -> bool {
        if !self.status.finished.load(Ordering::Acquire) {
            return false;
        }
        self.poll();
        self.consumer.is_empty()
    }

    /// The finished WAV file, or `None` while the capture is still running.
    pub fn wav_bytes(&mut self) -> Option<Vec<u8>> {
        self.is_complete()
            .then(|| encode_wav(self.sample_rate, &self.data))
    }

    /// Whatever has been captured so far, as a WAV file.
    pub fn into_wav(mut self) -> Vec<u8> {
        self.poll();
        encode_wav(self.sample_rate, &self.data)
    }

    /// Ask the tap to stop at its next block. Buffered samples are still
    /// handed off.
    pub fn cancel(&self) {
        self.status.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.cancelled.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Payload bytes collected so far.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Little-endian PCM collected so far.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn blocks_received(&self) -> usize {
        self.blocks
    }

    /// Buffers the tap discarded because the ring was full.
    pub fn dropped_blocks(&self) -> usize {
        self.status.dropped_blocks.load(Ordering::Relaxed)
    }
}
