//! Automatic Gain Control (AGC).
//!
//! Envelope-following AGC steering toward a target level. A hysteresis VAD
//! decides whether the frame is speech: speech gets compression above the
//! target and full expansion below it, silence is never boosted more than 2x
//! so background noise is not pumped up. Gain moves smoothly (faster during
//! speech) and the result runs through the soft limiter.

use super::{math, noise_floor::NoiseFloor, vad::EnergyVad, AudioProcessor, ProcessingStats};
use crate::Audio3AConfig;

const SILENCE_MAX_EXPANSION: f32 = 2.0;
const SPEECH_GAIN_SMOOTHING: f32 = 0.02;
const SILENCE_GAIN_SMOOTHING: f32 = 0.005;
/// Time-constant multipliers: speech reacts faster, silence slower.
const SPEECH_TIME_SCALE: f32 = 0.5;
const SILENCE_TIME_SCALE: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct AgcSettings {
    pub target_level: f32,
    pub compression_ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub min_gain: f32,
    pub max_gain: f32,
    pub sample_rate: u32,
    /// Noise-floor window in frames; shared with the noise suppressor.
    pub noise_history: usize,
}

impl Default for AgcSettings {
    fn default() -> Self {
        Self {
            target_level: 0.25,
            compression_ratio: 4.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            min_gain: 0.1,
            max_gain: 30.0,
            sample_rate: 16_000,
            noise_history: 20,
        }
    }
}

impl From<&Audio3AConfig> for AgcSettings {
    fn from(cfg: &Audio3AConfig) -> Self {
        Self {
            target_level: cfg.agc_target_level,
            compression_ratio: cfg.agc_compression_ratio,
            attack_ms: cfg.agc_attack_ms,
            release_ms: cfg.agc_release_ms,
            min_gain: cfg.agc_min_gain,
            max_gain: cfg.agc_max_gain,
            sample_rate: cfg.sample_rate,
            noise_history: cfg.ans_history_frames,
        }
    }
}

/// Attack/release pair for one VAD state.
#[derive(Debug, Clone, Copy)]
struct Ballistics {
    attack: f32,
    release: f32,
}

pub struct GainController {
    settings: AgcSettings,
    speech_ballistics: Ballistics,
    silence_ballistics: Ballistics,
    envelope: f32,
    gain: f32,
    noise_floor: NoiseFloor,
    vad: EnergyVad,
    speech: bool,
}

impl GainController {
    pub fn new(settings: AgcSettings) -> Self {
        let rate = settings.sample_rate.max(1) as f32;
        let coef = |ms: f32| (-1.0 / (rate * ms.max(0.01) / 1000.0)).exp();
        let speech_ballistics = Ballistics {
            attack: coef(settings.attack_ms * SPEECH_TIME_SCALE),
            release: coef(settings.release_ms * SPEECH_TIME_SCALE),
        };
        let silence_ballistics = Ballistics {
            attack: coef(settings.attack_ms * SILENCE_TIME_SCALE),
            release: coef(settings.release_ms * SILENCE_TIME_SCALE),
        };
        let noise_floor = NoiseFloor::new(settings.noise_history);
        Self {
            settings,
            speech_ballistics,
            silence_ballistics,
            envelope: 0.0,
            gain: 1.0,
            noise_floor,
            vad: EnergyVad::default(),
            speech: false,
        }
    }

    pub fn from_config(cfg: &Audio3AConfig) -> Self {
        Self::new(AgcSettings::from(cfg))
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn gain_db(&self) -> f32 {
        math::linear_to_db(self.gain)
    }

    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    pub fn is_speech(&self) -> bool {
        self.speech
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        if samples.is_empty() {
            return;
        }
        for s in samples.iter_mut() {
            *s = if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 };
        }

        let energy = math::frame_energy(samples);
        let noise = self.noise_floor.update(energy);
        self.speech = self.vad.update(energy, noise);

        let (ballistics, smoothing) = if self.speech {
            (self.speech_ballistics, SPEECH_GAIN_SMOOTHING)
        } else {
            (self.silence_ballistics, SILENCE_GAIN_SMOOTHING)
        };

        for s in samples.iter_mut() {
            let level = s.abs();
            let coef = if level > self.envelope { ballistics.attack } else { ballistics.release };
            self.envelope = coef * self.envelope + (1.0 - coef) * level;

            let desired = self.desired_gain();
            self.gain += smoothing * (desired - self.gain);
            self.gain = self.gain.clamp(self.settings.min_gain, self.settings.max_gain);

            *s = math::soft_limit(*s * self.gain, math::DEFAULT_LIMIT_THRESHOLD);
        }
    }

    fn desired_gain(&self) -> f32 {
        let ratio = self.settings.target_level / self.envelope.max(math::EPSILON);
        if self.speech {
            if ratio < 1.0 {
                ratio.powf(1.0 / self.settings.compression_ratio)
            } else {
                ratio.min(self.settings.max_gain)
            }
        } else {
            ratio.min(SILENCE_MAX_EXPANSION)
        }
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.gain = 1.0;
        self.noise_floor.reset();
        self.vad.reset();
        self.speech = false;
    }
}

impl AudioProcessor for GainController {
    fn name(&self) -> &'static str {
        "agc"
    }

    fn process(&mut self, samples: &mut [f32], _reference: Option<&[f32]>) {
        GainController::process(self, samples);
    }

    fn reset(&mut self) {
        GainController::reset(self);
    }

    fn report(&self, stats: &mut ProcessingStats) {
        stats.agc_gain = Some(self.gain);
        stats.agc_speech = Some(self.speech);
    }
}
