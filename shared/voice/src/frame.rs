use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{pcm, ParticipantId};

/// Float samples in [-1.0, 1.0] with their format. Built per processing call.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self { samples, channels, sample_rate }
    }

    pub fn silence(len: usize, channels: u16, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], channels, sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn to_pcm(&self) -> PcmFrame {
        PcmFrame::new(pcm::f32_slice_to_i16(&self.samples))
    }
}

/// 16-bit signed PCM samples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PcmFrame {
    pub samples: Vec<i16>,
}

impl PcmFrame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn to_buffer(&self, channels: u16, sample_rate: u32) -> AudioBuffer {
        AudioBuffer::new(pcm::i16_slice_to_f32(&self.samples), channels, sample_rate)
    }
}

impl From<&AudioBuffer> for PcmFrame {
    fn from(buf: &AudioBuffer) -> Self {
        buf.to_pcm()
    }
}

/// A processed, sequenced chunk of one participant's audio.
///
/// Immutable once built; this is what the mixer and the recorder consume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioFrame {
    participant_id: ParticipantId,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    created_at: DateTime<Utc>,
    sequence: u64,
}

impl AudioFrame {
    pub fn new(
        participant_id: ParticipantId,
        samples: Vec<i16>,
        sample_rate: u32,
        channels: u16,
        sequence: u64,
    ) -> Self {
        Self {
            participant_id,
            samples,
            sample_rate,
            channels,
            created_at: Utc::now(),
            sequence,
        }
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples as floats, the form the recorder consumes.
    pub fn to_f32(&self) -> Vec<f32> {
        pcm::i16_slice_to_f32(&self.samples)
    }
}
