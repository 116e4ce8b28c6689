/// Convert a float sample to signed 16-bit PCM.
///
/// Negative values scale by 32768 and positive values by 32767, so both -1.0
/// and 1.0 land exactly on the integer range limits. Out-of-range input
/// clamps.
#[inline]
pub fn float_to_pcm16(sample: f32) -> i16 {
    let scaled = if sample < 0.0 {
        sample * 32768.0
    } else {
        sample * 32767.0
    };
    scaled.round().clamp(-32768.0, 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_maps_to_limits() {
        assert_eq!(float_to_pcm16(1.0), 32767);
        assert_eq!(float_to_pcm16(-1.0), -32768);
        assert_eq!(float_to_pcm16(0.0), 0);
    }

    #[test]
    fn overdrive_clamps() {
        assert_eq!(float_to_pcm16(1.7), 32767);
        assert_eq!(float_to_pcm16(-3.0), -32768);
    }

    #[test]
    fn halves_round_to_nearest() {
        assert_eq!(float_to_pcm16(0.5), 16384);
        assert_eq!(float_to_pcm16(-0.5), -16384);
        assert_eq!(float_to_pcm16(f32::NAN), 0);
    }
}
