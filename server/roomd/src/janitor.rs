use std::{sync::Arc, time::Duration};

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vr_control::RoomRegistry;

use crate::metrics_adapter::DaemonRoomMetrics;

/// Periodically removes empty rooms and refreshes the registry gauges.
pub async fn run_janitor(
    registry: Arc<RoomRegistry>,
    metrics: Option<Arc<DaemonRoomMetrics>>,
    every: Duration,
    cancel: CancellationToken,
) {
    info!(interval_ms = every.as_millis() as u64, "janitor started");
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately; skip it so fresh rooms get a full interval.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {}
        }

        let removed = registry.cleanup_empty_rooms().await;
        if let Some(m) = &metrics {
            m.publish_totals(&registry);
        }
        debug!(
            removed,
            rooms = registry.room_count(),
            participants = registry.total_participant_count(),
            "janitor sweep"
        );
    }
    info!("janitor stopped");
}
