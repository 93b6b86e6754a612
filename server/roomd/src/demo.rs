//! Synthetic call scenario.
//!
//! Creates a few rooms, fills them with participants that "speak" tones with
//! a little noise, and plays every listener's mix back into their own
//! capture as the echo reference on the next frame. This drives every stage
//! of the core: 3A processing, queues, per-listener mixing and recording.

use std::{f32::consts::PI, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use vr_control::{JoinRequest, Room, RoomOptions, RoomRegistry, TransportKind};
use vr_media::RecordingSummary;
use vr_voice::{pcm, Audio3AConfig, ParticipantId};

#[derive(Clone, Debug)]
pub struct DemoConfig {
    pub rooms: usize,
    pub participants: usize,
    pub frames: usize,
    pub record_dir: Option<PathBuf>,
    pub realtime: bool,
    pub seed: Option<u64>,
}

#[derive(Debug, Default)]
pub struct DemoReport {
    pub rooms: usize,
    pub participants: usize,
    pub frames_ingested: u64,
    pub mixes: u64,
    /// Largest absolute sample seen in any mix.
    pub peak: i16,
    pub recordings: Vec<RecordingSummary>,
}

struct Speaker {
    id: ParticipantId,
    freq: f32,
    /// Last mix this participant heard, fed back as the echo reference.
    heard: Option<Vec<i16>>,
}

pub async fn run_demo(registry: Arc<RoomRegistry>, audio: Audio3AConfig, cfg: DemoConfig) -> Result<DemoReport> {
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let frame_size = audio.frame_size;
    let rate = audio.sample_rate;

    let mut rooms: Vec<(Arc<Room>, Vec<Speaker>)> = Vec::with_capacity(cfg.rooms);
    for r in 0..cfg.rooms {
        let room = registry
            .create_room_with(RoomOptions::new(format!("demo room {r}")).config(audio.clone()))
            .context("create demo room")?;

        let mut speakers = Vec::with_capacity(cfg.participants);
        for p in 0..cfg.participants {
            let id = ParticipantId::new(format!("p{p}"))?;
            let transport = if p % 2 == 0 {
                TransportKind::WebSocket
            } else {
                TransportKind::WebRtc
            };
            let req = JoinRequest::new(id.clone(), format!("Speaker {p}")).transport(transport);
            if registry.join_room(room.id(), req)?.is_none() {
                warn!(room_id = %room.id(), participant_id = %id, "demo join rejected");
                continue;
            }
            speakers.push(Speaker {
                id,
                freq: 220.0 * (p as f32 + 1.0) + rng.gen_range(-5.0..5.0),
                heard: None,
            });
        }

        if let Some(dir) = &cfg.record_dir {
            room.start_recording(dir)?;
        }
        rooms.push((room, speakers));
    }

    let mut report = DemoReport {
        rooms: rooms.len(),
        participants: rooms.iter().map(|(_, s)| s.len()).sum(),
        ..DemoReport::default()
    };
    info!(rooms = report.rooms, participants = report.participants, frames = cfg.frames, "demo started");

    let frame_period = Duration::from_secs_f64(frame_size as f64 / f64::from(rate.max(1)));
    let mut pace = interval(frame_period);
    pace.set_missed_tick_behavior(MissedTickBehavior::Skip);

    for frame in 0..cfg.frames {
        if cfg.realtime {
            pace.tick().await;
        } else if frame % 50 == 0 {
            tokio::task::yield_now().await;
        }

        for (room, speakers) in &mut rooms {
            for s in speakers.iter() {
                let start = frame * frame_size;
                let capture: Vec<f32> = (0..frame_size)
                    .map(|k| {
                        let n = (start + k) as f32;
                        0.3 * (2.0 * PI * s.freq * n / rate as f32).sin() + rng.gen_range(-0.01..0.01)
                    })
                    .collect();
                let pcm = pcm::f32_slice_to_i16(&capture);
                if room.ingest_pcm(&s.id, &pcm, s.heard.as_deref())?.is_some() {
                    report.frames_ingested += 1;
                }
            }

            for s in speakers.iter_mut() {
                let mix = room.mix_for(&s.id);
                if mix.is_empty() {
                    continue;
                }
                let peak = mix.iter().map(|v| v.saturating_abs()).max().unwrap_or(0);
                report.peak = report.peak.max(peak);
                report.mixes += 1;
                s.heard = Some(mix);
            }
        }
    }

    for (room, speakers) in &rooms {
        if let Some(summary) = room.stop_recording().await {
            report.recordings.push(summary);
        }
        if let Some(s) = speakers.first() {
            if let Some(stats) = room.participant(&s.id).and_then(|p| p.processing_stats()) {
                info!(
                    room_id = %room.id(),
                    participant_id = %s.id,
                    erl_db = ?stats.aec_erl_db,
                    agc_gain = ?stats.agc_gain,
                    speech_prob = ?stats.ans_speech_probability,
                    "demo processing state"
                );
            }
        }
        for s in speakers {
            registry.leave_room(room.id(), &s.id);
        }
    }

    info!(
        frames = report.frames_ingested,
        mixes = report.mixes,
        peak = report.peak,
        recordings = report.recordings.len(),
        "demo finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vr_control::ControlConfig;

    fn small(record_dir: Option<PathBuf>) -> DemoConfig {
        DemoConfig {
            rooms: 2,
            participants: 3,
            frames: 20,
            record_dir,
            realtime: false,
            seed: Some(7),
        }
    }

    #[tokio::test]
    async fn demo_exercises_rooms_and_leaves_them_empty() {
        let registry = Arc::new(RoomRegistry::new(ControlConfig::default()));
        let report = run_demo(registry.clone(), Audio3AConfig::default(), small(None)).await.unwrap();

        assert_eq!(report.rooms, 2);
        assert_eq!(report.participants, 6);
        assert_eq!(report.frames_ingested, 2 * 3 * 20);
        assert_eq!(report.mixes, 2 * 3 * 20);
        assert!(report.recordings.is_empty());

        assert_eq!(registry.total_participant_count(), 0);
        assert_eq!(registry.cleanup_empty_rooms().await, 2);
    }

    #[tokio::test]
    async fn demo_records_one_file_per_room() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(RoomRegistry::new(ControlConfig::default()));
        let report = run_demo(registry, Audio3AConfig::default(), small(Some(dir.path().to_path_buf())))
            .await
            .unwrap();

        assert_eq!(report.recordings.len(), 2);
        for rec in &report.recordings {
            assert!(rec.path.exists());
            assert_eq!(rec.frames_written, 3 * 20);
            assert_eq!(rec.write_errors, 0);
        }
    }

    #[tokio::test]
    async fn demo_without_3a_still_mixes() {
        let audio = Audio3AConfig {
            enable_aec: false,
            enable_agc: false,
            enable_ans: false,
            ..Audio3AConfig::default()
        };
        let registry = Arc::new(RoomRegistry::new(ControlConfig::default()));
        let report = run_demo(registry, audio, small(None)).await.unwrap();
        assert!(report.peak > 0);
    }
}
