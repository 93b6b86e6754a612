use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ControlConfig {
    /// Per-participant processed-frame queue depth; oldest frames drop past this.
    pub queue_depth: usize,
    /// Capacity for rooms created without one. 0 = unlimited.
    pub default_capacity: usize,
    /// Buffered presence events per subscriber before it lags.
    pub event_capacity: usize,
    pub recorder_drain_timeout: Duration,
    pub recorder_join_timeout: Duration,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            queue_depth: 100,
            default_capacity: 0,
            event_capacity: 256,
            recorder_drain_timeout: Duration::from_secs(5),
            recorder_join_timeout: Duration::from_secs(2),
        }
    }
}
