//! Dual-motor rumble encoding
//!
//! Maps the two linear force-feedback magnitudes (weak, strong) to the
//! controller's rumble bytes. The quantisation below is a firmware contract:
//! amplitudes are steps of 649, the high band uses even steps only and the low
//! band carries its odd bit in the top bit of the band selector byte.

/// High band frequency selector
pub const HIGH_FREQ: u8 = 0x20;

/// Low band frequency selector
pub const LOW_FREQ: u8 = 0x28;

/// Magnitude per amplitude step
const AMP_STEP: u16 = 649;

/// Rumble bytes for one motor
pub type ChannelPattern = [u8; 4];

/// Encode one motor channel
pub fn encode_channel(weak: u16, strong: u16) -> ChannelPattern {
    let high_amp = ((weak / AMP_STEP) * 2) as u8;
    let low_amp_raw = strong / AMP_STEP;
    let low_amp2 = ((low_amp_raw % 2) * 128) as u8;
    let low_amp1 = (low_amp_raw / 2 + 64) as u8;

    [HIGH_FREQ, high_amp, LOW_FREQ + low_amp2, low_amp1]
}

/// Encode the 8 rumble bytes sent to the device (same pattern on both motors)
pub fn encode_rumble(weak: u16, strong: u16) -> [u8; 8] {
    let channel = encode_channel(weak, strong);
    let mut data = [0u8; 8];
    data[..4].copy_from_slice(&channel);
    data[4..].copy_from_slice(&channel);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_pattern() {
        assert_eq!(
            encode_rumble(0, 0),
            [0x20, 0x00, 0x28, 0x40, 0x20, 0x00, 0x28, 0x40]
        );
    }

    #[test]
    fn test_weak_saturates_high_amp() {
        let data = encode_rumble(u16::MAX, 0);
        // 65535 / 649 = 100 steps
        assert_eq!(data[1], 200);
        assert_eq!(data[5], 200);
    }

    #[test]
    fn test_strong_odd_step_sets_carry() {
        // 649 = exactly one step: odd, carry set, 0 / 2 + 64
        let channel = encode_channel(0, 649);
        assert_eq!(channel[2], LOW_FREQ + 0x80);
        assert_eq!(channel[3], 64);

        // Two steps: even, no carry
        let channel = encode_channel(0, 1298);
        assert_eq!(channel[2], LOW_FREQ);
        assert_eq!(channel[3], 65);
    }

    #[test]
    fn test_strong_maximum() {
        let channel = encode_channel(0, u16::MAX);
        assert_eq!(channel[2], LOW_FREQ);
        assert_eq!(channel[3], 100 / 2 + 64);
    }

    #[test]
    fn test_channels_identical() {
        let data = encode_rumble(30_000, 12_345);
        assert_eq!(data[..4], data[4..]);
    }
}
