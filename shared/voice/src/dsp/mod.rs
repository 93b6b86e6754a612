//! 3A pipeline: echo cancellation, noise suppression, gain control.
//!
//! Processing chain (capture path), per `ProcessingOrder`:
//!   Standard:           AEC → ANS → AGC
//!   NoiseSuppressFirst: ANS → AEC → AGC
//!   GainControlFirst:   AGC → AEC → ANS
//!   Custom:             whatever the caller pushes
//!
//! Every stage works in place on f32 samples, so output length always equals
//! input length. Only the AEC looks at the reference (far-end) signal.

pub mod aec;
pub mod agc;
pub mod ans;
pub mod math;
pub mod noise_floor;
pub mod vad;

use serde::Serialize;

use crate::{Audio3AConfig, ProcessingOrder};

pub use aec::EchoCanceller;
pub use agc::{AgcSettings, GainController};
pub use ans::NoiseSuppressor;

/// One stage of the enhancement chain.
pub trait AudioProcessor: Send {
    fn name(&self) -> &'static str;

    /// Transform `samples` in place. `reference` is the far-end signal for the
    /// same time span, if the caller has one.
    fn process(&mut self, samples: &mut [f32], reference: Option<&[f32]>);

    /// Forget all adaptive state.
    fn reset(&mut self);

    /// Fill in whatever this stage knows about its current state.
    fn report(&self, _stats: &mut ProcessingStats) {}
}

/// Snapshot of a pipeline's adaptive state.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProcessingStats {
    pub frames_processed: u64,
    pub aec_erl_db: Option<f32>,
    pub aec_double_talk: Option<bool>,
    pub ans_speech_probability: Option<f32>,
    pub ans_gain: Option<f32>,
    pub agc_gain: Option<f32>,
    pub agc_speech: Option<bool>,
}

/// Ordered list of processors, built once.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn AudioProcessor>>,
}

impl Pipeline {
    /// Empty pipeline for caller-driven assembly (`ProcessingOrder::Custom`).
    pub fn custom() -> Self {
        Self::default()
    }

    /// Build the stage list from the configured order and enable flags.
    /// `Custom` yields an empty pipeline; push stages onto it.
    pub fn from_config(cfg: &Audio3AConfig) -> Self {
        #[derive(Clone, Copy)]
        enum Stage {
            Aec,
            Ans,
            Agc,
        }

        let order: &[Stage] = match cfg.processing_order {
            ProcessingOrder::Standard => &[Stage::Aec, Stage::Ans, Stage::Agc],
            ProcessingOrder::NoiseSuppressFirst => &[Stage::Ans, Stage::Aec, Stage::Agc],
            ProcessingOrder::GainControlFirst => &[Stage::Agc, Stage::Aec, Stage::Ans],
            ProcessingOrder::Custom => &[],
        };

        let mut pipeline = Self::custom();
        for stage in order {
            match stage {
                Stage::Aec if cfg.enable_aec => pipeline.push(Box::new(EchoCanceller::from_config(cfg))),
                Stage::Ans if cfg.enable_ans => pipeline.push(Box::new(NoiseSuppressor::from_config(cfg))),
                Stage::Agc if cfg.enable_agc => pipeline.push(Box::new(GainController::from_config(cfg))),
                _ => {}
            }
        }
        pipeline
    }

    pub fn push(&mut self, stage: Box<dyn AudioProcessor>) {
        self.stages.push(stage);
    }

    pub fn with(mut self, stage: Box<dyn AudioProcessor>) -> Self {
        self.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn process(&mut self, samples: &mut [f32], reference: Option<&[f32]>) {
        for stage in self.stages.iter_mut() {
            stage.process(samples, reference);
        }
    }

    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }

    pub fn report(&self, stats: &mut ProcessingStats) {
        for stage in &self.stages {
            stage.report(stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(order: ProcessingOrder) -> Audio3AConfig {
        Audio3AConfig { processing_order: order, ..Audio3AConfig::default() }
    }

    #[test]
    fn order_selects_stage_sequence() {
        assert_eq!(Pipeline::from_config(&cfg(ProcessingOrder::Standard)).stage_names(), ["aec", "ans", "agc"]);
        assert_eq!(
            Pipeline::from_config(&cfg(ProcessingOrder::NoiseSuppressFirst)).stage_names(),
            ["ans", "aec", "agc"]
        );
        assert_eq!(
            Pipeline::from_config(&cfg(ProcessingOrder::GainControlFirst)).stage_names(),
            ["agc", "aec", "ans"]
        );
        assert!(Pipeline::from_config(&cfg(ProcessingOrder::Custom)).is_empty());
    }

    #[test]
    fn disabled_stages_are_left_out() {
        let c = Audio3AConfig { enable_aec: false, enable_agc: false, ..Audio3AConfig::default() };
        assert_eq!(Pipeline::from_config(&c).stage_names(), ["ans"]);
    }

    #[test]
    fn custom_pipeline_runs_pushed_stages() {
        let c = Audio3AConfig::default();
        let mut p = Pipeline::custom()
            .with(Box::new(GainController::from_config(&c)))
            .with(Box::new(NoiseSuppressor::with_seed(10.0, 20, 1)));
        assert_eq!(p.stage_names(), ["agc", "ans"]);

        let mut samples = vec![0.1; 160];
        p.process(&mut samples, None);
        assert_eq!(samples.len(), 160);

        let mut stats = ProcessingStats::default();
        p.report(&mut stats);
        assert!(stats.agc_gain.is_some());
        assert!(stats.ans_gain.is_some());
        assert!(stats.aec_erl_db.is_none());
    }
}
