//! Server-side media: per-listener frame mixing and room recording.

pub mod errors;
pub mod mixer;
pub mod recorder;

pub use errors::{RecorderError, RecorderResult};
pub use mixer::{mix, mix_with_auto_gain};
pub use recorder::{RecorderConfig, RecordingSummary, RoomRecorder};
