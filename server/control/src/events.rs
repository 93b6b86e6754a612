use std::path::PathBuf;

use vr_voice::{ParticipantId, RoomId};

#[derive(Clone, Debug, PartialEq)]
pub enum RoomEvent {
    RoomCreated { room_id: RoomId, name: String },
    RoomClosed { room_id: RoomId },
    Presence { room_id: RoomId, kind: PresenceKind },
    Recording { room_id: RoomId, kind: RecordingKind },
}

impl RoomEvent {
    pub fn room_id(&self) -> &RoomId {
        match self {
            RoomEvent::RoomCreated { room_id, .. }
            | RoomEvent::RoomClosed { room_id }
            | RoomEvent::Presence { room_id, .. }
            | RoomEvent::Recording { room_id, .. } => room_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PresenceKind {
    ParticipantJoined { participant_id: ParticipantId, display_name: String },
    ParticipantLeft(ParticipantId),
    VoiceStateChanged { participant_id: ParticipantId, muted: bool },
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecordingKind {
    Started { path: PathBuf },
    Stopped { path: Option<PathBuf> },
}
