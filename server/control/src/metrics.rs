use std::time::Duration;

/// Why a join did not go through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinRejection {
    RoomClosed,
    RoomFull,
    Duplicate,
}

impl JoinRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinRejection::RoomClosed => "closed",
            JoinRejection::RoomFull => "full",
            JoinRejection::Duplicate => "duplicate",
        }
    }
}

/// Metrics hook (optional). Implemented by the daemon with the `metrics` facade.
pub trait RoomMetrics: Send + Sync {
    fn inc_rooms_created(&self);
    fn inc_rooms_closed(&self);
    fn inc_joins(&self);
    fn inc_leaves(&self);
    fn inc_join_rejected(&self, reason: JoinRejection);
    fn inc_frames_enqueued(&self);
    fn inc_frames_dropped(&self);
    fn inc_frames_muted(&self);
    fn inc_processing_errors(&self);
    fn observe_processing(&self, elapsed: Duration);
    fn inc_recordings_started(&self);
    fn inc_recordings_stopped(&self, samples_written: u64);
}

/// No-op metrics default.
pub struct NoopMetrics;
impl RoomMetrics for NoopMetrics {
    fn inc_rooms_created(&self) {}
    fn inc_rooms_closed(&self) {}
    fn inc_joins(&self) {}
    fn inc_leaves(&self) {}
    fn inc_join_rejected(&self, _reason: JoinRejection) {}
    fn inc_frames_enqueued(&self) {}
    fn inc_frames_dropped(&self) {}
    fn inc_frames_muted(&self) {}
    fn inc_processing_errors(&self) {}
    fn observe_processing(&self, _elapsed: Duration) {}
    fn inc_recordings_started(&self) {}
    fn inc_recordings_stopped(&self, _samples_written: u64) {}
}
