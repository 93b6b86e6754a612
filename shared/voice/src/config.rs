use serde::{Deserialize, Serialize};

use crate::{VoiceError, VoiceResult};

/// Processor order used when a pipeline is built from config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingOrder {
    /// AEC, ANS, AGC.
    #[default]
    Standard,
    /// ANS, AEC, AGC.
    NoiseSuppressFirst,
    /// AGC, AEC, ANS.
    GainControlFirst,
    /// Caller assembles the processor list.
    Custom,
}

/// 3A settings for one room. Cloned into every participant's processor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Audio3AConfig {
    pub enable_aec: bool,
    pub enable_agc: bool,
    pub enable_ans: bool,
    pub processing_order: ProcessingOrder,

    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per processing frame (160 = 10ms at 16kHz).
    pub frame_size: usize,

    /// Linear envelope level the AGC steers toward.
    pub agc_target_level: f32,
    pub agc_compression_ratio: f32,
    pub agc_attack_ms: f32,
    pub agc_release_ms: f32,
    pub agc_min_gain: f32,
    pub agc_max_gain: f32,

    pub ans_noise_reduction_db: f32,
    /// Frames of energy history used for the noise floor.
    pub ans_history_frames: usize,

    /// Adaptive filter taps.
    pub aec_filter_length: usize,
    /// NLMS base step; normalized by the mean reference power over the window.
    pub aec_step_size: f32,
    pub aec_double_talk_threshold: f32,
}

impl Default for Audio3AConfig {
    fn default() -> Self {
        Self {
            enable_aec: true,
            enable_agc: true,
            enable_ans: true,
            processing_order: ProcessingOrder::Standard,
            sample_rate: 16_000,
            channels: 1,
            frame_size: 160,
            agc_target_level: 0.25,
            agc_compression_ratio: 4.0,
            agc_attack_ms: 10.0,
            agc_release_ms: 100.0,
            agc_min_gain: 0.1,
            agc_max_gain: 30.0,
            ans_noise_reduction_db: 20.0,
            ans_history_frames: 20,
            aec_filter_length: 128,
            aec_step_size: 0.005,
            aec_double_talk_threshold: 0.3,
        }
    }
}

impl Audio3AConfig {
    pub fn validate(&self) -> VoiceResult<()> {
        if self.sample_rate == 0 {
            return Err(VoiceError::InvalidConfig("sample rate must be positive"));
        }
        if self.channels == 0 {
            return Err(VoiceError::InvalidConfig("channel count must be positive"));
        }
        if self.frame_size == 0 {
            return Err(VoiceError::InvalidConfig("frame size must be positive"));
        }
        if self.aec_filter_length == 0 {
            return Err(VoiceError::InvalidConfig("aec filter length must be positive"));
        }
        if !(self.aec_step_size > 0.0 && self.aec_step_size.is_finite()) {
            return Err(VoiceError::InvalidConfig("aec step size must be positive"));
        }
        if !(self.aec_double_talk_threshold > 0.0) {
            return Err(VoiceError::InvalidConfig("double-talk threshold must be positive"));
        }
        if !(self.agc_target_level > 0.0 && self.agc_target_level <= 1.0) {
            return Err(VoiceError::InvalidConfig("agc target level must be in (0, 1]"));
        }
        if !(self.agc_compression_ratio >= 1.0) {
            return Err(VoiceError::InvalidConfig("agc compression ratio must be >= 1"));
        }
        if !(self.agc_attack_ms > 0.0 && self.agc_release_ms > 0.0) {
            return Err(VoiceError::InvalidConfig("agc time constants must be positive"));
        }
        if !(self.agc_min_gain > 0.0 && self.agc_min_gain <= self.agc_max_gain) {
            return Err(VoiceError::InvalidConfig("agc gain bounds invalid"));
        }
        if !(self.ans_noise_reduction_db >= 0.0) {
            return Err(VoiceError::InvalidConfig("noise reduction must be >= 0 dB"));
        }
        if self.ans_history_frames == 0 {
            return Err(VoiceError::InvalidConfig("ans history must hold at least one frame"));
        }
        Ok(())
    }

    pub fn any_enabled(&self) -> bool {
        self.enable_aec || self.enable_agc || self.enable_ans
    }
}
