//! Canonical 44-byte RIFF/WAVE header for mono 16-bit PCM.

pub const HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    /// Payload size in bytes.
    pub data_len: u32,
}

impl WavHeader {
    pub fn new(sample_rate: u32, data_len: u32) -> Self {
        Self {
            sample_rate,
            data_len,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let byte_rate = self.sample_rate * u32::from(BLOCK_ALIGN);

        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&(36 + self.data_len).to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&16u32.to_le_bytes());
        out[20..22].copy_from_slice(&1u16.to_le_bytes());
        out[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&BLOCK_ALIGN.to_le_bytes());
        out[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_len.to_le_bytes());
        out
    }
}

/// Prefix little-endian PCM bytes with a header describing them.
pub fn encode_wav(sample_rate: u32, data: &[u8]) -> Vec<u8> {
    let header = WavHeader::new(sample_rate, data.len() as u32);
    let mut wav = Vec::with_capacity(HEADER_LEN + data.len());
    wav.extend_from_slice(&header.to_bytes());
    wav.extend_from_slice(data);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    fn u16_at(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    #[test]
    fn header_matches_the_canonical_layout() {
        let h = WavHeader::new(48_000, 9_600).to_bytes();
        assert_eq!(&h[0..4], b"RIFF");
        assert_eq!(u32_at(&h, 4), 9_636);
        assert_eq!(&h[8..12], b"WAVE");
        assert_eq!(&h[12..16], b"fmt ");
        assert_eq!(u32_at(&h, 16), 16);
        assert_eq!(u16_at(&h, 20), 1);
        assert_eq!(u16_at(&h, 22), 1);
        assert_eq!(u32_at(&h, 24), 48_000);
        assert_eq!(u32_at(&h, 28), 96_000);
        assert_eq!(u16_at(&h, 32), 2);
        assert_eq!(u16_at(&h, 34), 16);
        assert_eq!(&h[36..40], b"data");
        assert_eq!(u32_at(&h, 40), 9_600);
    }

    #[test]
    fn encoded_file_declares_its_payload() {
        let wav = encode_wav(44_100, &[1, 2, 3, 4]);
        assert_eq!(wav.len(), HEADER_LEN + 4);
        assert_eq!(u32_at(&wav, 40), 4);
        assert_eq!(&wav[44..], &[1, 2, 3, 4]);
    }
}
