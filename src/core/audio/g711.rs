//! G.711 μ-law companding.

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

/// Compress one linear sample to μ-law
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };
    if pcm > CLIP {
        pcm = CLIP;
    }
    pcm += BIAS;

    let mut exponent: i32 = 7;
    let mut mask = 0x4000;
    while exponent > 0 && pcm & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = (pcm >> (exponent + 3)) & 0x0F;

    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Expand one μ-law byte to a linear sample
pub fn ulaw_to_linear(byte: u8) -> i16 {
    let value = !byte;
    let sign = value & 0x80;
    let exponent = ((value >> 4) & 0x07) as i32;
    let mantissa = (value & 0x0F) as i32;

    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_maps_to_ff() {
        assert_eq!(linear_to_ulaw(0), 0xFF);
        assert_eq!(ulaw_to_linear(0xFF), 0);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(ulaw_to_linear(0x80), 32124);
        assert_eq!(ulaw_to_linear(0x00), -32124);
        assert_eq!(linear_to_ulaw(i16::MAX), 0x80);
        assert_eq!(linear_to_ulaw(i16::MIN), 0x00);
    }

    #[test]
    fn test_companding_error_is_bounded() {
        for sample in (-32000i16..32000).step_by(97) {
            let decoded = ulaw_to_linear(linear_to_ulaw(sample)) as i32;
            let error = (decoded - sample as i32).abs();
            // Quantization step grows with magnitude: at most 1/16 of the segment
            let allowed = (sample as i32).abs() / 16 + 8;
            assert!(
                error <= allowed,
                "sample {sample} decoded to {decoded} (error {error}, allowed {allowed})"
            );
        }
    }

    #[test]
    fn test_sign_is_preserved() {
        assert!(ulaw_to_linear(linear_to_ulaw(1000)) > 0);
        assert!(ulaw_to_linear(linear_to_ulaw(-1000)) < 0);
    }
}
