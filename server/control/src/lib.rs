//! Rooms, participants and the registry that owns them.

pub mod config;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod participant;
pub mod queue;
pub mod registry;
pub mod room;

pub use config::ControlConfig;
pub use errors::{ControlError, ControlResult};
pub use events::{PresenceKind, RecordingKind, RoomEvent};
pub use metrics::{JoinRejection, NoopMetrics, RoomMetrics};
pub use participant::{JoinRequest, Participant, ParticipantState, TransportKind};
pub use queue::AudioQueue;
pub use registry::{RegistryStats, RoomRegistry};
pub use room::{ParticipantStats, Room, RoomOptions, RoomState, RoomStats};
