use std::{collections::HashMap, sync::Arc, time::Duration};

use vr_control::{JoinRejection, RoomMetrics, RoomRegistry};
use vr_metrics::{LabelPolicy, RoomMetricsImpl};

pub fn room_metrics(namespace: &'static str) -> Arc<DaemonRoomMetrics> {
    Arc::new(DaemonRoomMetrics {
        inner: RoomMetricsImpl::new(namespace, LabelPolicy::default()),
    })
}

pub struct DaemonRoomMetrics {
    inner: RoomMetricsImpl,
}

impl DaemonRoomMetrics {
    /// Refreshes the registry gauges from a live snapshot.
    pub fn publish_totals(&self, registry: &RoomRegistry) {
        let stats = registry.stats();
        self.inner
            .set_totals(stats.active_rooms, stats.participant_count, stats.recording_rooms);

        let mut buckets = HashMap::new();
        for room in &stats.rooms {
            let bucket = self.inner.policy().room_bucket(room.id.as_str());
            *buckets.entry(bucket).or_insert(0usize) += room.participant_count;
        }
        for (bucket, participants) in &buckets {
            self.inner.set_bucket_participants(bucket, *participants);
        }
    }
}

impl RoomMetrics for DaemonRoomMetrics {
    fn inc_rooms_created(&self) {
        self.inner.room_created();
    }
    fn inc_rooms_closed(&self) {
        self.inner.room_closed();
    }
    fn inc_joins(&self) {
        self.inner.joined();
    }
    fn inc_leaves(&self) {
        self.inner.left();
    }
    fn inc_join_rejected(&self, reason: JoinRejection) {
        self.inner.join_rejected(reason.as_str());
    }
    fn inc_frames_enqueued(&self) {
        self.inner.frame_enqueued();
    }
    fn inc_frames_dropped(&self) {
        self.inner.frame_dropped("queue_full");
    }
    fn inc_frames_muted(&self) {
        self.inner.frame_dropped("muted");
    }
    fn inc_processing_errors(&self) {
        self.inner.processing_error();
    }
    fn observe_processing(&self, elapsed: Duration) {
        self.inner.processing_seconds(elapsed);
    }
    fn inc_recordings_started(&self) {
        self.inner.recording_started();
    }
    fn inc_recordings_stopped(&self, samples_written: u64) {
        self.inner.recording_stopped(samples_written);
    }
}
