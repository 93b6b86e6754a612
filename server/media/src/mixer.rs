//! Per-listener frame mixing.
//!
//! Both mixers drop the listener's own frame, then work on the common
//! length (the shortest remaining frame; longer frames are truncated, shorter
//! ones are never padded).
//!
//! - [`mix`]: integer average of the contributors, clamped to i16.
//! - [`mix_with_auto_gain`]: contributors weighted by their share of the total
//!   RMS, so whoever is actually talking dominates the mix.

use vr_voice::{AudioFrame, ParticipantId};

fn contributors<'a>(frames: &'a [AudioFrame], exclude: Option<&ParticipantId>) -> Vec<&'a [i16]> {
    frames
        .iter()
        .filter(|f| Some(f.participant_id()) != exclude)
        .map(|f| f.samples())
        .collect()
}

fn common_len(streams: &[&[i16]]) -> usize {
    streams.iter().map(|s| s.len()).min().unwrap_or(0)
}

#[inline]
fn to_i16(v: i64) -> i16 {
    v.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

/// Average every contributor sample-wise.
pub fn mix(frames: &[AudioFrame], exclude: Option<&ParticipantId>) -> Vec<i16> {
    let streams = contributors(frames, exclude);
    match streams.len() {
        0 => Vec::new(),
        1 => streams[0].to_vec(),
        count => {
            let len = common_len(&streams);
            (0..len)
                .map(|i| {
                    let sum: i64 = streams.iter().map(|s| s[i] as i64).sum();
                    to_i16(sum / count as i64)
                })
                .collect()
        }
    }
}

/// Energy-proportional mix: each contributor weighted by its RMS over the total.
pub fn mix_with_auto_gain(frames: &[AudioFrame], exclude: Option<&ParticipantId>) -> Vec<i16> {
    let streams = contributors(frames, exclude);
    match streams.len() {
        0 => Vec::new(),
        1 => streams[0].to_vec(),
        _ => {
            let len = common_len(&streams);
            let weights: Vec<f64> = streams.iter().map(|s| rms(&s[..len])).collect();
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                return vec![0; len];
            }
            (0..len)
                .map(|i| {
                    let acc: f64 = streams
                        .iter()
                        .zip(weights.iter())
                        .map(|(s, w)| s[i] as f64 * (w / total))
                        .sum();
                    to_i16(acc.round() as i64)
                })
                .collect()
        }
    }
}

fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}
