//! Per-participant session processor.
//!
//! Owns one pipeline built from a private copy of the room config, so no
//! adaptive state is ever shared between participants. Converts PCM to float
//! and back around the pipeline. Once closed, every processing call fails with
//! `VoiceError::ProcessorClosed`.

use tracing::debug;

use crate::{
    dsp::{Pipeline, ProcessingStats},
    pcm, Audio3AConfig, AudioBuffer, VoiceError, VoiceResult,
};

pub struct SessionProcessor {
    config: Audio3AConfig,
    pipeline: Pipeline,
    frames_processed: u64,
    closed: bool,
}

impl SessionProcessor {
    /// Pipeline built from `config.processing_order`.
    pub fn new(config: Audio3AConfig) -> VoiceResult<Self> {
        config.validate()?;
        let pipeline = Pipeline::from_config(&config);
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Caller-assembled pipeline (`ProcessingOrder::Custom`).
    pub fn with_pipeline(config: Audio3AConfig, pipeline: Pipeline) -> Self {
        debug!(stages = ?pipeline.stage_names(), "session processor ready");
        Self { config, pipeline, frames_processed: 0, closed: false }
    }

    pub fn config(&self) -> &Audio3AConfig {
        &self.config
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Process float samples in place.
    pub fn process_in_place(&mut self, samples: &mut [f32], reference: Option<&[f32]>) -> VoiceResult<()> {
        self.ensure_open()?;
        if samples.is_empty() {
            return Err(VoiceError::EmptyBuffer);
        }
        self.pipeline.process(samples, reference);
        for s in samples.iter_mut() {
            if !s.is_finite() {
                *s = 0.0;
            }
        }
        self.frames_processed += 1;
        Ok(())
    }

    pub fn process(&mut self, input: &AudioBuffer, reference: Option<&AudioBuffer>) -> VoiceResult<AudioBuffer> {
        let mut out = input.clone();
        self.process_in_place(&mut out.samples, reference.map(|r| r.samples.as_slice()))?;
        Ok(out)
    }

    pub fn process_f32(&mut self, input: &[f32], reference: Option<&[f32]>) -> VoiceResult<Vec<f32>> {
        let mut out = input.to_vec();
        self.process_in_place(&mut out, reference)?;
        Ok(out)
    }

    /// PCM in, PCM out.
    pub fn process_i16(&mut self, input: &[i16], reference: Option<&[i16]>) -> VoiceResult<Vec<i16>> {
        self.ensure_open()?;
        let mut samples = pcm::i16_slice_to_f32(input);
        let reference = reference.map(pcm::i16_slice_to_f32);
        self.process_in_place(&mut samples, reference.as_deref())?;
        Ok(pcm::f32_slice_to_i16(&samples))
    }

    /// Clear every stage's adaptive state.
    pub fn reset(&mut self) -> VoiceResult<()> {
        self.ensure_open()?;
        self.pipeline.reset();
        self.frames_processed = 0;
        Ok(())
    }

    pub fn stats(&self) -> ProcessingStats {
        let mut stats = ProcessingStats { frames_processed: self.frames_processed, ..Default::default() };
        self.pipeline.report(&mut stats);
        stats
    }

    /// Dispose the pipeline. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.pipeline = Pipeline::custom();
            debug!(frames = self.frames_processed, "session processor closed");
        }
    }

    fn ensure_open(&self) -> VoiceResult<()> {
        if self.closed {
            Err(VoiceError::ProcessorClosed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessingOrder;

    #[test]
    fn rejects_invalid_config() {
        let cfg = Audio3AConfig { frame_size: 0, ..Audio3AConfig::default() };
        assert!(matches!(SessionProcessor::new(cfg), Err(VoiceError::InvalidConfig(_))));
    }

    #[test]
    fn empty_input_is_a_validation_error() {
        let mut sp = SessionProcessor::new(Audio3AConfig::default()).unwrap();
        assert_eq!(sp.process_i16(&[], None), Err(VoiceError::EmptyBuffer));
        assert_eq!(sp.stats().frames_processed, 0);
    }

    #[test]
    fn closed_processor_refuses_work() {
        let mut sp = SessionProcessor::new(Audio3AConfig::default()).unwrap();
        assert!(sp.process_i16(&[100; 160], None).is_ok());
        sp.close();
        sp.close();
        assert!(sp.is_closed());
        assert_eq!(sp.process_i16(&[100; 160], None), Err(VoiceError::ProcessorClosed));
        assert_eq!(sp.process_f32(&[0.1; 160], None), Err(VoiceError::ProcessorClosed));
        assert_eq!(sp.reset(), Err(VoiceError::ProcessorClosed));
    }

    #[test]
    fn empty_pipeline_round_trips_pcm() {
        let cfg = Audio3AConfig { processing_order: ProcessingOrder::Custom, ..Audio3AConfig::default() };
        let mut sp = SessionProcessor::new(cfg).unwrap();
        let pcm: Vec<i16> = (-80..80).map(|i| i * 400).collect();
        assert_eq!(sp.process_i16(&pcm, None).unwrap(), pcm);
    }

    #[test]
    fn stats_count_frames_and_reset_zeroes_them() {
        let mut sp = SessionProcessor::new(Audio3AConfig::default()).unwrap();
        for _ in 0..3 {
            sp.process_f32(&[0.05; 160], None).unwrap();
        }
        let stats = sp.stats();
        assert_eq!(stats.frames_processed, 3);
        assert!(stats.aec_erl_db.is_some());
        assert!(stats.agc_gain.is_some());
        sp.reset().unwrap();
        assert_eq!(sp.stats().frames_processed, 0);
    }
}
