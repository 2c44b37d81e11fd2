//! Signal level helpers.

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Arguments
/// * `samples` - Audio samples as 16-bit PCM
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

/// Convert i16 samples to f32 in [-1.0, 1.0], the layout Whisper expects.
pub fn to_f32(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(calculate_rms(&[0i16; 1600]), 0.0);
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_is_one() {
        let rms = calculate_rms(&[i16::MAX; 100]);
        assert!((rms - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rms_ignores_sign() {
        let positive = calculate_rms(&[8000i16; 100]);
        let alternating: Vec<i16> = (0..100)
            .map(|i| if i % 2 == 0 { 8000 } else { -8000 })
            .collect();
        assert!((positive - calculate_rms(&alternating)).abs() < 1e-6);
    }

    #[test]
    fn to_f32_maps_extremes() {
        let converted = to_f32(&[0i16, 16384, -16384, -32768]);
        assert_eq!(converted[0], 0.0);
        assert!((converted[1] - 0.5).abs() < 0.01);
        assert!((converted[2] + 0.5).abs() < 0.01);
        assert_eq!(converted[3], -1.0);
    }
}
