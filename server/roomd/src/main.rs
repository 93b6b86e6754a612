mod config;
mod demo;
mod janitor;
mod metrics_adapter;

use anyhow::Result;
use clap::Parser;
use config::Config;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;
use vr_control::{NoopMetrics, RoomEvent, RoomMetrics, RoomRegistry};
use vr_metrics::{MetricsConfig, MetricsServer};

use crate::demo::{run_demo, DemoConfig};
use crate::janitor::run_janitor;
use crate::metrics_adapter::room_metrics;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = Config::parse();
    let audio = cfg.load_audio_config()?;
    let shutdown = CancellationToken::new();

    // Metrics
    let daemon_metrics = if cfg.no_metrics {
        None
    } else {
        let ms = MetricsServer::install(MetricsConfig {
            listen: cfg.metrics_listen.clone(),
            namespace: "vr",
        })?;
        let stop = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = ms.serve(async move { stop.cancelled().await }).await {
                warn!("metrics endpoint failed: {:#}", e);
            }
        });
        Some(room_metrics("vr"))
    };
    let hook: Arc<dyn RoomMetrics> = match &daemon_metrics {
        Some(m) => m.clone(),
        None => Arc::new(NoopMetrics),
    };

    let registry = Arc::new(RoomRegistry::with_metrics(cfg.control_config(), hook));
    tokio::spawn(log_events(registry.clone(), shutdown.clone()));

    let janitor = tokio::spawn(run_janitor(
        registry.clone(),
        daemon_metrics.clone(),
        cfg.cleanup_interval(),
        shutdown.clone(),
    ));

    info!(
        sample_rate = audio.sample_rate,
        frame_size = audio.frame_size,
        order = ?audio.processing_order,
        "room daemon ready"
    );

    if cfg.demo {
        let demo_cfg = DemoConfig {
            rooms: cfg.demo_rooms,
            participants: cfg.demo_participants,
            frames: cfg.demo_frames,
            record_dir: cfg.demo_record_dir.clone(),
            realtime: cfg.demo_realtime,
            seed: None,
        };
        tokio::select! {
            r = run_demo(registry.clone(), audio, demo_cfg) => {
                let report = r?;
                for rec in &report.recordings {
                    info!(path = %rec.path.display(), secs = rec.audio_secs, "recording written");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("demo interrupted");
            }
        }
    } else {
        tokio::signal::ctrl_c().await?;
    }

    info!("shutdown");
    shutdown.cancel();
    registry.shutdown().await;
    if let Some(m) = &daemon_metrics {
        m.publish_totals(&registry);
    }
    let _ = janitor.await;

    Ok(())
}

async fn log_events(registry: Arc<RoomRegistry>, shutdown: CancellationToken) {
    let mut events = registry.subscribe();
    drop(registry);
    loop {
        let ev = tokio::select! {
            _ = shutdown.cancelled() => return,
            ev = events.recv() => ev,
        };
        match ev {
            Ok(RoomEvent::Presence { room_id, kind }) => debug!(%room_id, ?kind, "presence"),
            Ok(other) => debug!(room_id = %other.room_id(), event = ?other, "room event"),
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "event log lagging"),
            Err(RecvError::Closed) => return,
        }
    }
}
