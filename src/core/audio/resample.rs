//! Sample-rate conversion for mono 16-bit PCM.
//!
//! Integer downsampling ratios (24 kHz -> 8 kHz) average each group of input
//! samples, which doubles as a crude low-pass filter. Any other ratio falls
//! back to linear interpolation.

/// Convert `samples` from `from_rate` to `to_rate`
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    if from_rate > to_rate && from_rate % to_rate == 0 {
        let factor = (from_rate / to_rate) as usize;
        return samples
            .chunks(factor)
            .map(|group| {
                let sum: i32 = group.iter().map(|s| *s as i32).sum();
                (sum / group.len() as i32) as i16
            })
            .collect();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = position.floor() as usize;
            let frac = position - index as f64;
            let a = samples[index.min(last)] as f64;
            let b = samples[(index + 1).min(last)] as f64;
            (a + (b - a) * frac).round() as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let input = vec![1, 2, 3];
        assert_eq!(resample(&input, 8000, 8000), input);
    }

    #[test]
    fn test_integer_ratio_averages_groups() {
        let input = vec![3, 6, 9, -3, -6, -9, 100];
        let output = resample(&input, 24000, 8000);
        assert_eq!(output, vec![6, -6, 100]);
    }

    #[test]
    fn test_fractional_ratio_length() {
        let input = vec![0i16; 441];
        let output = resample(&input, 44100, 8000);
        assert_eq!(output.len(), 80);
    }

    #[test]
    fn test_upsampling_interpolates() {
        let output = resample(&[0, 100], 8000, 16000);
        assert_eq!(output, vec![0, 50, 100, 100]);
    }
}
