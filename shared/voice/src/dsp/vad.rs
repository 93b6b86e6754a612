//! Energy VAD with a hysteresis counter.
//!
//! Each frame whose SNR clears the threshold bumps a bounded counter, every
//! other frame decays it. Speech is declared only while the counter sits above
//! the onset level, which keeps single noisy frames from toggling the decision.

use super::math;

pub const COUNTER_CAP: u8 = 10;
pub const SPEECH_ONSET: u8 = 3;
/// Linear SNR (~6 dB) a frame must exceed to count as speech.
pub const DEFAULT_SNR_THRESHOLD: f32 = 4.0;

#[derive(Debug, Clone)]
pub struct EnergyVad {
    snr_threshold: f32,
    counter: u8,
}

impl EnergyVad {
    pub fn new(snr_threshold: f32) -> Self {
        Self { snr_threshold, counter: 0 }
    }

    /// Feed one frame's energy and current noise floor. Returns whether speech is active.
    pub fn update(&mut self, energy: f32, noise_floor: f32) -> bool {
        if math::snr(energy, noise_floor) > self.snr_threshold {
            self.counter = (self.counter + 1).min(COUNTER_CAP);
        } else {
            self.counter = self.counter.saturating_sub(1);
        }
        self.is_speech()
    }

    pub fn is_speech(&self) -> bool {
        self.counter > SPEECH_ONSET
    }

    pub fn counter(&self) -> u8 {
        self.counter
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(DEFAULT_SNR_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_several_loud_frames_to_switch_on() {
        let mut vad = EnergyVad::default();
        for _ in 0..SPEECH_ONSET {
            assert!(!vad.update(1.0, 0.001));
        }
        assert!(vad.update(1.0, 0.001));
    }

    #[test]
    fn counter_is_bounded_both_ways() {
        let mut vad = EnergyVad::default();
        for _ in 0..50 {
            vad.update(1.0, 0.001);
        }
        assert_eq!(vad.counter(), COUNTER_CAP);
        for _ in 0..50 {
            vad.update(0.001, 0.001);
        }
        assert_eq!(vad.counter(), 0);
        assert!(!vad.is_speech());
    }

    #[test]
    fn hangover_after_speech() {
        let mut vad = EnergyVad::default();
        for _ in 0..COUNTER_CAP {
            vad.update(1.0, 0.001);
        }
        // Still speech for a few quiet frames.
        assert!(vad.update(0.0, 0.001));
        assert!(vad.update(0.0, 0.001));
    }
}
