use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::labels::{BoundedLabel, LabelPolicy};

/// Metric names under: {ns}_room_*
pub struct RoomMetricsImpl {
    ns: &'static str,
    policy: LabelPolicy,
}

impl RoomMetricsImpl {
    pub fn new(namespace: &'static str, policy: LabelPolicy) -> Self {
        Self { ns: namespace, policy }
    }

    pub fn policy(&self) -> &LabelPolicy {
        &self.policy
    }

    #[inline]
    pub fn room_created(&self) {
        counter!(format!("{}_room_created_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn room_closed(&self) {
        counter!(format!("{}_room_closed_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn joined(&self) {
        counter!(format!("{}_room_joins_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn left(&self) {
        counter!(format!("{}_room_leaves_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn join_rejected(&self, reason: &'static str) {
        counter!(
            format!("{}_room_join_rejected_total", self.ns),
            "reason" => LabelPolicy::reason(reason).into_string()
        )
        .increment(1);
    }

    #[inline]
    pub fn frame_enqueued(&self) {
        counter!(format!("{}_room_frames_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn frame_dropped(&self, reason: &'static str) {
        counter!(
            format!("{}_room_frame_drops_total", self.ns),
            "reason" => LabelPolicy::reason(reason).into_string()
        )
        .increment(1);
    }

    #[inline]
    pub fn processing_error(&self) {
        counter!(format!("{}_room_processing_errors_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn processing_seconds(&self, elapsed: Duration) {
        histogram!(format!("{}_room_processing_seconds", self.ns)).record(elapsed.as_secs_f64());
    }

    #[inline]
    pub fn recording_started(&self) {
        counter!(format!("{}_room_recordings_started_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn recording_stopped(&self, samples_written: u64) {
        counter!(format!("{}_room_recordings_stopped_total", self.ns)).increment(1);
        counter!(format!("{}_room_recorded_samples_total", self.ns)).increment(samples_written);
    }

    /// Point-in-time registry totals, set by whoever polls the registry.
    pub fn set_totals(&self, active_rooms: usize, participants: usize, recording_rooms: usize) {
        gauge!(format!("{}_room_active", self.ns)).set(active_rooms as f64);
        gauge!(format!("{}_room_participants", self.ns)).set(participants as f64);
        gauge!(format!("{}_room_recording", self.ns)).set(recording_rooms as f64);
    }

    /// Participants per room bucket. Callers sum rooms that share a bucket
    /// before setting it.
    pub fn set_bucket_participants(&self, bucket: &BoundedLabel, participants: usize) {
        gauge!(
            format!("{}_room_participants_by_bucket", self.ns),
            "room" => bucket.as_str().to_string()
        )
        .set(participants as f64);
    }
}
