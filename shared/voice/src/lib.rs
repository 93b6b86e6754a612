//! Shared voice types and the per-participant 3A enhancement chain.
//!
//! The crate is transport agnostic: callers hand in PCM or float frames and
//! get enhanced audio back. Rooms, mixing and recording live in the server
//! crates and build on the types re-exported here.

pub mod config;
pub mod dsp;
pub mod errors;
pub mod frame;
pub mod ids;
pub mod pcm;
pub mod session;

pub use config::{Audio3AConfig, ProcessingOrder};
pub use dsp::{AudioProcessor, Pipeline, ProcessingStats};
pub use errors::{VoiceError, VoiceResult};
pub use frame::{AudioBuffer, AudioFrame, PcmFrame};
pub use ids::{ParticipantId, RoomId};
pub use session::SessionProcessor;
