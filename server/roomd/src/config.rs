use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use vr_control::ControlConfig;
use vr_voice::Audio3AConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "vr-roomd", about = "Voice room daemon with 3A speech enhancement")]
pub struct Config {
    /// Prometheus scrape endpoint, e.g. 0.0.0.0:9100
    #[arg(long, env = "VR_METRICS_LISTEN", default_value = "0.0.0.0:9100")]
    pub metrics_listen: String,

    /// Do not install the Prometheus recorder or serve /metrics
    #[arg(long, default_value_t = false)]
    pub no_metrics: bool,

    /// JSON file with the 3A config used for new rooms (camelCase keys)
    #[arg(long, env = "VR_AUDIO_CONFIG")]
    pub audio_config: Option<PathBuf>,

    /// Per-participant processed frame queue depth
    #[arg(long, default_value_t = 100)]
    pub queue_depth: usize,

    /// Capacity for new rooms, 0 = unlimited
    #[arg(long, default_value_t = 0)]
    pub default_capacity: usize,

    /// Seconds between empty-room sweeps
    #[arg(long, default_value_t = 30)]
    pub cleanup_interval_s: u64,

    /// Max wait for a recording to drain on stop
    #[arg(long, default_value_t = 5_000)]
    pub recorder_drain_ms: u64,

    /// Run the synthetic call scenario instead of idling
    #[arg(long, default_value_t = false)]
    pub demo: bool,

    #[arg(long, default_value_t = 2)]
    pub demo_rooms: usize,

    #[arg(long, default_value_t = 3)]
    pub demo_participants: usize,

    /// Frames fed to every demo participant
    #[arg(long, default_value_t = 500)]
    pub demo_frames: usize,

    /// Record every demo room into this directory
    #[arg(long)]
    pub demo_record_dir: Option<PathBuf>,

    /// Pace demo frames at the audio frame rate instead of as fast as possible
    #[arg(long, default_value_t = false)]
    pub demo_realtime: bool,
}

impl Config {
    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            queue_depth: self.queue_depth,
            default_capacity: self.default_capacity,
            recorder_drain_timeout: Duration::from_millis(self.recorder_drain_ms),
            ..ControlConfig::default()
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_s.max(1))
    }

    /// Defaults when no file is given. Unknown keys are ignored, missing keys
    /// take their defaults.
    pub fn load_audio_config(&self) -> Result<Audio3AConfig> {
        let Some(path) = &self.audio_config else {
            return Ok(Audio3AConfig::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read audio config {}", path.display()))?;
        parse_audio_config(&raw).with_context(|| format!("audio config {}", path.display()))
    }
}

pub fn parse_audio_config(raw: &str) -> Result<Audio3AConfig> {
    let cfg: Audio3AConfig = serde_json::from_str(raw).context("parse json")?;
    cfg.validate()?;
    Ok(cfg)
}
