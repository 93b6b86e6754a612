//! Automatic Noise Suppression (ANS).
//!
//! Frame-level, statistics-based suppression: a minimum-statistics noise
//! floor gives the frame SNR, which together with a zero-crossing feature
//! drives a smoothed speech probability. The probability picks one of three
//! gain regimes (pass, moderate, aggressive over-subtraction). Frames judged
//! as noise get a touch of comfort noise so the suppression is not audible as
//! dead air.

use rand::{rngs::StdRng, SeedableRng};

use super::{math, noise_floor::NoiseFloor, AudioProcessor, ProcessingStats};
use crate::Audio3AConfig;

/// Zero-crossing rate typical of voiced speech.
const VOICED_ZCR: f32 = 0.15;
const ENERGY_WEIGHT: f32 = 0.7;
const ZCR_WEIGHT: f32 = 0.3;
const PROB_SMOOTHING: f32 = 0.8;
const SPEECH_PROB: f32 = 0.7;
const NOISE_PROB: f32 = 0.3;
/// Linear SNR mapped to probability 0 and 1.
const SNR_PROB_RANGE: (f32, f32) = (1.0, 10.0);
/// Lowest gain for noise frames, keeps musical-noise artifacts down.
const SPECTRAL_FLOOR: f32 = 0.01;
const COMFORT_NOISE_LEVEL: f32 = 0.1;
const COMFORT_NOISE_MAX: f32 = 0.001;

pub struct NoiseSuppressor {
    noise_floor: NoiseFloor,
    speech_prob: f32,
    over_subtraction: f32,
    last_gain: f32,
    rng: StdRng,
}

impl NoiseSuppressor {
    /// `noise_reduction_db`: configured reduction; the over-subtraction factor is
    /// twice its linear value (never below 2).
    pub fn new(noise_reduction_db: f32, history_frames: usize) -> Self {
        Self::with_rng(noise_reduction_db, history_frames, StdRng::from_entropy())
    }

    /// Deterministic comfort noise, for tests and offline runs.
    pub fn with_seed(noise_reduction_db: f32, history_frames: usize, seed: u64) -> Self {
        Self::with_rng(noise_reduction_db, history_frames, StdRng::seed_from_u64(seed))
    }

    fn with_rng(noise_reduction_db: f32, history_frames: usize, rng: StdRng) -> Self {
        let linear_reduction = math::db_to_linear(noise_reduction_db.max(0.0));
        Self {
            noise_floor: NoiseFloor::new(history_frames),
            speech_prob: 0.0,
            over_subtraction: 2.0 * linear_reduction.max(1.0),
            last_gain: 1.0,
            rng,
        }
    }

    pub fn from_config(cfg: &Audio3AConfig) -> Self {
        Self::new(cfg.ans_noise_reduction_db, cfg.ans_history_frames)
    }

    pub fn speech_probability(&self) -> f32 {
        self.speech_prob
    }

    pub fn last_gain(&self) -> f32 {
        self.last_gain
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor.estimate()
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        if samples.is_empty() {
            return;
        }
        let clean: Vec<f32> = samples
            .iter()
            .map(|&s| if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 })
            .collect();

        let energy = math::frame_energy(&clean);
        let noise = self.noise_floor.update(energy);
        let snr = math::snr(energy, noise);

        let (lo, hi) = SNR_PROB_RANGE;
        let energy_prob = ((snr - lo) / (hi - lo)).clamp(0.0, 1.0);
        let zcr = math::zero_crossing_rate(&clean);
        let zcr_prob = (1.0 - (zcr - VOICED_ZCR).abs() / VOICED_ZCR).clamp(0.0, 1.0);
        let frame_prob = ENERGY_WEIGHT * energy_prob + ZCR_WEIGHT * zcr_prob;
        self.speech_prob = PROB_SMOOTHING * self.speech_prob + (1.0 - PROB_SMOOTHING) * frame_prob;

        let gain = self.gain_for(snr);
        self.last_gain = gain;

        let noisy = self.speech_prob < NOISE_PROB;
        let amplitude = (noise.sqrt() * COMFORT_NOISE_LEVEL).min(COMFORT_NOISE_MAX);
        for (s, &c) in samples.iter_mut().zip(clean.iter()) {
            let mut out = c * gain;
            if noisy {
                out += math::comfort_noise(amplitude, &mut self.rng);
            }
            *s = out.clamp(-1.0, 1.0);
        }
    }

    fn gain_for(&self, snr: f32) -> f32 {
        if self.speech_prob > SPEECH_PROB {
            1.0
        } else if self.speech_prob >= NOISE_PROB {
            0.3 + 0.7 * (snr / 3.0).min(1.0)
        } else {
            let subtracted = 1.0 - self.over_subtraction / snr.max(math::EPSILON);
            subtracted.max(SPECTRAL_FLOOR).min(1.0)
        }
    }

    pub fn reset(&mut self) {
        self.noise_floor.reset();
        self.speech_prob = 0.0;
        self.last_gain = 1.0;
    }
}

impl AudioProcessor for NoiseSuppressor {
    fn name(&self) -> &'static str {
        "ans"
    }

    fn process(&mut self, samples: &mut [f32], _reference: Option<&[f32]>) {
        NoiseSuppressor::process(self, samples);
    }

    fn reset(&mut self) {
        NoiseSuppressor::reset(self);
    }

    fn report(&self, stats: &mut ProcessingStats) {
        stats.ans_speech_probability = Some(self.speech_prob);
        stats.ans_gain = Some(self.last_gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn noise(rng: &mut StdRng, len: usize, amp: f32) -> Vec<f32> {
        (0..len).map(|_| rng.gen_range(-amp..amp)).collect()
    }

    #[test]
    fn stationary_noise_is_attenuated() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ans = NoiseSuppressor::with_seed(20.0, 20, 9);
        let mut last_in = 0.0;
        let mut last_out = 0.0;
        for _ in 0..100 {
            let mut frame = noise(&mut rng, 160, 0.05);
            last_in = math::frame_energy(&frame);
            ans.process(&mut frame);
            last_out = math::frame_energy(&frame);
        }
        assert!(ans.speech_probability() < NOISE_PROB);
        assert!(last_out < last_in * 0.1, "in={last_in} out={last_out}");
    }

    #[test]
    fn speech_after_quiet_passes_mostly_unchanged() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut ans = NoiseSuppressor::with_seed(20.0, 20, 3);
        for _ in 0..40 {
            let mut frame = noise(&mut rng, 160, 0.001);
            ans.process(&mut frame);
        }
        // Voiced-like: 1200 Hz at 16 kHz crosses zero ~0.15 per sample.
        // Stay inside the noise-floor history window so the floor is still quiet.
        let mut gain = 0.0;
        for _ in 0..15 {
            let mut frame: Vec<f32> = (0..160)
                .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 1200.0 * i as f32 / 16_000.0).sin())
                .collect();
            ans.process(&mut frame);
            gain = ans.last_gain();
        }
        assert!(ans.speech_probability() > SPEECH_PROB);
        assert_eq!(gain, 1.0);
    }

    #[test]
    fn gain_never_exceeds_one_and_output_is_finite() {
        let mut ans = NoiseSuppressor::with_seed(40.0, 5, 4);
        let inputs: [f32; 5] = [0.0, 1e-12, 0.5, -1.0, 1e20];
        for &v in &inputs {
            let mut frame = vec![v; 64];
            ans.process(&mut frame);
            assert!(ans.last_gain() <= 1.0 && ans.last_gain() >= SPECTRAL_FLOOR);
            assert!(frame.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
        }
    }

    #[test]
    fn over_subtraction_scales_with_reduction() {
        assert_eq!(NoiseSuppressor::new(0.0, 20).over_subtraction, 2.0);
        assert!((NoiseSuppressor::new(20.0, 20).over_subtraction - 20.0).abs() < 1e-3);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut ans = NoiseSuppressor::with_seed(20.0, 20, 5);
        let mut frame = vec![0.2; 160];
        ans.process(&mut frame);
        ans.reset();
        assert_eq!(ans.speech_probability(), 0.0);
        assert_eq!(ans.noise_floor(), 0.0);
        assert_eq!(ans.last_gain(), 1.0);
    }
}
