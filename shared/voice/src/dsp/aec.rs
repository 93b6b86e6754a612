//! Acoustic Echo Cancellation (AEC).
//!
//! Time-domain NLMS adaptive filter that models the loudspeaker-to-microphone
//! path from a reference (far-end) signal and subtracts the estimated echo
//! from the capture. Adds three guards on top of plain NLMS:
//!
//! - double-talk detection freezes adaptation while the near end is talking,
//! - the step size is scaled by the smoothed echo return loss,
//! - a residual suppressor attenuates what is left of the echo.
//!
//! Without a reference (or with a silent one) the capture passes through untouched.

use super::{math, AudioProcessor, ProcessingStats};
use crate::Audio3AConfig;

/// Taps are clamped to this magnitude to bound divergence.
const MAX_TAP: f32 = 10.0;
/// Lowest gain the residual suppressor applies, so output is never fully silenced.
const RESIDUAL_FLOOR: f32 = 0.001;
/// NLMS regularization added to the reference power.
const REGULARIZATION: f32 = 1e-6;
/// ERL (dB) at which adaptation runs at the full step.
const ERL_FULL_STEP_DB: f32 = 10.0;
/// Adaptation never slows below this fraction of the base step.
const MIN_STEP_SCALE: f32 = 0.1;
const ERL_SMOOTHING: f32 = 0.9;
const ERL_RANGE_DB: (f32, f32) = (-20.0, 60.0);

pub struct EchoCanceller {
    /// Adaptive filter taps.
    weights: Vec<f32>,
    /// Reference signal ring buffer, same length as `weights`.
    ref_buf: Vec<f32>,
    /// Next write position in `ref_buf`.
    ref_pos: usize,
    /// Base NLMS step.
    mu: f32,
    double_talk_threshold: f32,
    erl_db: f32,
    double_talk: bool,
}

impl EchoCanceller {
    /// `filter_len`: taps (128 = 8ms at 16kHz). `mu`: base step, normalized by
    /// the mean reference power over the window.
    pub fn new(filter_len: usize, mu: f32, double_talk_threshold: f32) -> Self {
        let filter_len = filter_len.max(1);
        Self {
            weights: vec![0.0; filter_len],
            ref_buf: vec![0.0; filter_len],
            ref_pos: 0,
            mu,
            double_talk_threshold,
            erl_db: 0.0,
            double_talk: false,
        }
    }

    pub fn from_config(cfg: &Audio3AConfig) -> Self {
        Self::new(cfg.aec_filter_length, cfg.aec_step_size, cfg.aec_double_talk_threshold)
    }

    pub fn filter_len(&self) -> usize {
        self.weights.len()
    }

    /// Smoothed echo return loss in dB.
    pub fn erl_db(&self) -> f32 {
        self.erl_db
    }

    pub fn is_double_talk(&self) -> bool {
        self.double_talk
    }

    /// Process a capture frame in place against the matching reference frame.
    pub fn process(&mut self, capture: &mut [f32], reference: Option<&[f32]>) {
        let Some(reference) = reference else {
            return;
        };
        if capture.is_empty() {
            return;
        }
        if reference.iter().all(|&r| r == 0.0) {
            // Keep the delay line aligned; the capture itself is left as is.
            for _ in 0..capture.len() {
                self.push_reference(0.0);
            }
            self.double_talk = false;
            return;
        }

        let ref_sample = |i: usize| sanitize(reference.get(i).copied().unwrap_or(0.0));

        let capture_power = capture.iter().map(|&s| sanitize(s).powi(2)).sum::<f32>()
            / capture.len() as f32;
        let reference_power = (0..capture.len()).map(|i| ref_sample(i).powi(2)).sum::<f32>()
            / capture.len() as f32;
        self.double_talk =
            math::snr(capture_power, reference_power) > self.double_talk_threshold;

        let step_scale = (self.erl_db / ERL_FULL_STEP_DB).clamp(MIN_STEP_SCALE, 1.0);
        let n = self.weights.len();
        let mut echo_power = 0.0f32;

        for (i, s) in capture.iter_mut().enumerate() {
            let mic = sanitize(*s);
            let newest = self.push_reference(ref_sample(i));

            let mut echo_est = 0.0f32;
            let mut window_power = 0.0f32;
            for k in 0..n {
                let x = self.ref_buf[(newest + n - k) % n];
                echo_est += self.weights[k] * x;
                window_power += x * x;
            }
            echo_power += echo_est * echo_est;

            let error = mic - echo_est;

            let out = if self.double_talk {
                error
            } else {
                let step = self.mu * step_scale / (window_power / n as f32 + REGULARIZATION);
                for k in 0..n {
                    let x = self.ref_buf[(newest + n - k) % n];
                    self.weights[k] = (self.weights[k] + step * error * x).clamp(-MAX_TAP, MAX_TAP);
                }
                suppress_residual(error, echo_est)
            };

            *s = sanitize(out);
        }

        echo_power /= capture.len() as f32;
        let erl = math::power_ratio_db(capture_power, echo_power);
        if erl.is_finite() {
            let erl = erl.clamp(ERL_RANGE_DB.0, ERL_RANGE_DB.1);
            self.erl_db = ERL_SMOOTHING * self.erl_db + (1.0 - ERL_SMOOTHING) * erl;
        }
    }

    /// Write one reference sample and return the index it landed at.
    fn push_reference(&mut self, sample: f32) -> usize {
        let idx = self.ref_pos;
        self.ref_buf[idx] = sample;
        self.ref_pos = (self.ref_pos + 1) % self.ref_buf.len();
        idx
    }

    pub fn reset(&mut self) {
        self.weights.iter_mut().for_each(|w| *w = 0.0);
        self.ref_buf.iter_mut().for_each(|r| *r = 0.0);
        self.ref_pos = 0;
        self.erl_db = 0.0;
        self.double_talk = false;
    }
}

/// Scale the error down when it is small relative to the echo estimate.
fn suppress_residual(error: f32, echo_est: f32) -> f32 {
    let ratio = error.abs() / (echo_est.abs() + math::EPSILON);
    if ratio >= 1.0 {
        error
    } else {
        error * ratio.max(RESIDUAL_FLOOR)
    }
}

#[inline]
fn sanitize(s: f32) -> f32 {
    if s.is_finite() {
        s.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

impl AudioProcessor for EchoCanceller {
    fn name(&self) -> &'static str {
        "aec"
    }

    fn process(&mut self, samples: &mut [f32], reference: Option<&[f32]>) {
        EchoCanceller::process(self, samples, reference);
    }

    fn reset(&mut self) {
        EchoCanceller::reset(self);
    }

    fn report(&self, stats: &mut ProcessingStats) {
        stats.aec_erl_db = Some(self.erl_db);
        stats.aec_double_talk = Some(self.double_talk);
    }
}
