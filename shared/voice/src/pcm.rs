//! Float <-> 16-bit PCM conversion.
//!
//! The scale is asymmetric so both ends of the i16 range map onto ±1.0:
//! positive samples use 32767, negative samples use 32768.

const POS_SCALE: f32 = 32767.0;
const NEG_SCALE: f32 = 32768.0;

#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    if !sample.is_finite() {
        return 0;
    }
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s >= 0.0 { s * POS_SCALE } else { s * NEG_SCALE };
    scaled.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    if sample >= 0 {
        sample as f32 / POS_SCALE
    } else {
        sample as f32 / NEG_SCALE
    }
}

pub fn f32_slice_to_i16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| f32_to_i16(s)).collect()
}

pub fn i16_slice_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| i16_to_f32(s)).collect()
}
