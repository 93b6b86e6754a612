//! Stateless numeric helpers shared by the processors.

use rand::Rng;

/// Floor added to denominators so silence never yields NaN or infinity.
pub const EPSILON: f32 = 1e-10;

/// Knee where the soft limiter starts bending.
pub const DEFAULT_LIMIT_THRESHOLD: f32 = 0.8;

/// Mean of squared samples. Zero for an empty frame.
pub fn frame_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    sum / samples.len() as f32
}

pub fn rms(samples: &[f32]) -> f32 {
    frame_energy(samples).sqrt()
}

/// Linear power ratio.
#[inline]
pub fn snr(signal_power: f32, noise_power: f32) -> f32 {
    signal_power / (noise_power + EPSILON)
}

#[inline]
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

/// Hard clamp below `threshold`, tanh knee above it. Output is always in [-1, 1].
pub fn soft_limit(sample: f32, threshold: f32) -> f32 {
    if sample.is_nan() {
        return 0.0;
    }
    let threshold = threshold.clamp(0.0, 0.999);
    let magnitude = sample.abs();
    if magnitude <= threshold {
        return clamp(sample, -1.0, 1.0);
    }
    let headroom = 1.0 - threshold;
    let bent = threshold + headroom * ((magnitude - threshold) / headroom).tanh();
    clamp(bent.copysign(sample), -1.0, 1.0)
}

/// One sample of uniform noise in [-amplitude, amplitude].
pub fn comfort_noise<R: Rng + ?Sized>(amplitude: f32, rng: &mut R) -> f32 {
    amplitude * rng.gen_range(-1.0f32..=1.0)
}

/// Sign changes per sample, in [0, 1].
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

#[inline]
pub fn linear_to_db(value: f32) -> f32 {
    20.0 * value.max(EPSILON).log10()
}

/// Power ratio expressed in dB.
#[inline]
pub fn power_ratio_db(num: f32, den: f32) -> f32 {
    10.0 * ((num + EPSILON) / (den + EPSILON)).log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn energy_of_constant_frame() {
        assert_eq!(frame_energy(&[]), 0.0);
        assert!((frame_energy(&[0.5; 10]) - 0.25).abs() < 1e-6);
        assert!((rms(&[0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn snr_with_zero_noise_is_finite() {
        assert!(snr(1.0, 0.0).is_finite());
        assert_eq!(snr(0.0, 0.0), 0.0);
    }

    #[test]
    fn soft_limit_bounds_any_input() {
        for x in [-1e30f32, -5.0, -0.9, -0.5, 0.0, 0.3, 0.81, 1.0, 2.0, 1e30, f32::INFINITY] {
            let y = soft_limit(x, DEFAULT_LIMIT_THRESHOLD);
            assert!((-1.0..=1.0).contains(&y), "x={x} y={y}");
        }
        assert_eq!(soft_limit(f32::NAN, 0.8), 0.0);
        assert_eq!(soft_limit(0.5, 0.8), 0.5);
        assert!(soft_limit(0.95, 0.8) < 0.95);
        assert!(soft_limit(-0.95, 0.8) > -0.95);
    }

    #[test]
    fn comfort_noise_stays_in_amplitude() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(comfort_noise(0.01, &mut rng).abs() <= 0.01);
        }
    }

    #[test]
    fn zcr_of_alternating_signal_is_one() {
        assert_eq!(zero_crossing_rate(&[1.0, -1.0, 1.0, -1.0]), 1.0);
        assert_eq!(zero_crossing_rate(&[0.2, 0.3, 0.4]), 0.0);
    }

    #[test]
    fn db_conversions_invert() {
        assert!((db_to_linear(20.0) - 10.0).abs() < 1e-4);
        assert!((linear_to_db(10.0) - 20.0).abs() < 1e-4);
        assert!(linear_to_db(0.0).is_finite());
    }
}
