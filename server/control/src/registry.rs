use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};
use vr_media::RecordingSummary;
use vr_voice::{Audio3AConfig, ParticipantId, RoomId};

use crate::{
    errors::{ControlError, ControlResult},
    events::{PresenceKind, RoomEvent},
    metrics::{NoopMetrics, RoomMetrics},
    participant::{JoinRequest, Participant, TransportKind},
    room::{Room, RoomHooks, RoomOptions, RoomStats},
    ControlConfig,
};

#[derive(Clone, Debug, Serialize)]
pub struct RegistryStats {
    pub room_count: usize,
    pub active_rooms: usize,
    pub participant_count: usize,
    pub recording_rooms: usize,
    pub queued_frames: usize,
    pub dropped_frames: u64,
    pub rooms: Vec<RoomStats>,
}

/// Owns every room in the process. Counts are computed from the live maps
/// on each call.
pub struct RoomRegistry {
    cfg: ControlConfig,
    rooms: DashMap<RoomId, Arc<Room>>,
    hooks: RoomHooks,
}

impl RoomRegistry {
    pub fn new(cfg: ControlConfig) -> Self {
        Self::with_metrics(cfg, Arc::new(NoopMetrics))
    }

    pub fn with_metrics(cfg: ControlConfig, metrics: Arc<dyn RoomMetrics>) -> Self {
        let (events, _) = broadcast::channel(cfg.event_capacity.max(1));
        Self {
            cfg,
            rooms: DashMap::new(),
            hooks: RoomHooks { metrics, events },
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.cfg
    }

    /// Presence and lifecycle events for every room.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.hooks.events.subscribe()
    }

    // -------------------------------------------------------------------------
    // Rooms
    // -------------------------------------------------------------------------

    pub fn create_room(
        &self,
        id: Option<RoomId>,
        name: impl Into<String>,
        config: Audio3AConfig,
        transports: &[TransportKind],
    ) -> ControlResult<Arc<Room>> {
        let mut opts = RoomOptions::new(name).config(config).transports(transports.to_vec());
        opts.id = id;
        self.create_room_with(opts)
    }

    /// Fails without touching the registry if the options are invalid or the
    /// id is taken.
    pub fn create_room_with(&self, opts: RoomOptions) -> ControlResult<Arc<Room>> {
        if opts.name.trim().is_empty() {
            return Err(ControlError::InvalidArgument("room name empty"));
        }
        if opts.transports.is_empty() {
            return Err(ControlError::InvalidArgument("room needs at least one transport"));
        }
        opts.config.validate()?;

        let id = opts.id.clone().unwrap_or_else(RoomId::generate);
        let room = match self.rooms.entry(id.clone()) {
            Entry::Occupied(_) => return Err(ControlError::AlreadyExists(format!("room {id}"))),
            Entry::Vacant(v) => {
                let room = Arc::new(Room::new(id.clone(), opts, &self.cfg, self.hooks.clone()));
                v.insert(room.clone());
                room
            }
        };

        self.hooks.metrics.inc_rooms_created();
        self.hooks.emit(RoomEvent::RoomCreated {
            room_id: id.clone(),
            name: room.name().to_string(),
        });
        info!(room_id = %id, name = room.name(), capacity = room.capacity(), "room created");
        Ok(room)
    }

    /// Closes and removes a room. Returns whether it existed.
    pub async fn remove_room(&self, id: &RoomId) -> bool {
        let Some((_, room)) = self.rooms.remove(id) else {
            return false;
        };
        room.close().await;
        true
    }

    pub fn get_room(&self, id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// Snapshot ordered by room id.
    pub fn rooms(&self) -> Vec<Arc<Room>> {
        let mut out: Vec<_> = self.rooms.iter().map(|r| r.value().clone()).collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        out
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn active_room_count(&self) -> usize {
        self.rooms.iter().filter(|r| r.is_active()).count()
    }

    pub fn total_participant_count(&self) -> usize {
        self.rooms.iter().map(|r| r.participant_count()).sum()
    }

    // -------------------------------------------------------------------------
    // Membership
    // -------------------------------------------------------------------------

    /// `Ok(None)` when the room is closed, full, or already has that
    /// participant. Errors for an unknown room or an unusable config.
    pub fn join_room(&self, room_id: &RoomId, req: JoinRequest) -> ControlResult<Option<Arc<Participant>>> {
        let room = self.get_room(room_id).ok_or(ControlError::NotFound("room"))?;
        if !room.supports(req.transport) {
            return Err(ControlError::InvalidArgument("transport not supported by room"));
        }

        let participant = Arc::new(Participant::new(room_id.clone(), req, room.config())?);
        if !room.try_add_participant(participant.clone()) {
            participant.dispose();
            return Ok(None);
        }
        participant.mark_connected();

        self.hooks.metrics.inc_joins();
        self.hooks.emit(RoomEvent::Presence {
            room_id: room_id.clone(),
            kind: PresenceKind::ParticipantJoined {
                participant_id: participant.id().clone(),
                display_name: participant.display_name().to_string(),
            },
        });
        info!(
            room_id = %room_id,
            participant_id = %participant.id(),
            transport = ?participant.transport(),
            enable_3a = participant.is_3a_enabled(),
            "participant joined"
        );
        Ok(Some(participant))
    }

    /// Removes the participant and disposes its processor. Returns whether
    /// anything was removed.
    pub fn leave_room(&self, room_id: &RoomId, participant_id: &ParticipantId) -> bool {
        let Some(room) = self.get_room(room_id) else {
            return false;
        };
        let Some(participant) = room.try_remove_participant(participant_id) else {
            return false;
        };
        participant.begin_leave();
        participant.dispose();

        self.hooks.metrics.inc_leaves();
        self.hooks.emit(RoomEvent::Presence {
            room_id: room_id.clone(),
            kind: PresenceKind::ParticipantLeft(participant_id.clone()),
        });
        info!(room_id = %room_id, participant_id = %participant_id, "participant left");
        true
    }

    // -------------------------------------------------------------------------
    // Recording
    // -------------------------------------------------------------------------

    pub fn start_recording(&self, room_id: &RoomId, dir: &Path) -> ControlResult<PathBuf> {
        let room = self.get_room(room_id).ok_or(ControlError::NotFound("room"))?;
        let path = room.start_recording(dir)?;
        info!(room_id = %room_id, path = %path.display(), "recording");
        Ok(path)
    }

    pub async fn stop_recording(&self, room_id: &RoomId) -> Option<RecordingSummary> {
        let room = self.get_room(room_id)?;
        room.stop_recording().await
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Closes and removes every room with no participants. Returns how many
    /// were removed.
    pub async fn cleanup_empty_rooms(&self) -> usize {
        let candidates: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|r| r.is_empty())
            .map(|r| r.key().clone())
            .collect();

        let mut removed = 0;
        for id in candidates {
            // Re-checked under the shard lock; a room that gained a member since is kept.
            if let Some((_, room)) = self.rooms.remove_if(&id, |_, r| r.is_empty()) {
                room.close().await;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, remaining = self.rooms.len(), "removed empty rooms");
        } else {
            debug!("no empty rooms");
        }
        removed
    }

    /// Closes every room and empties the registry.
    pub async fn shutdown(&self) {
        let ids: Vec<RoomId> = self.rooms.iter().map(|r| r.key().clone()).collect();
        let mut closed = 0usize;
        for id in ids {
            if let Some((_, room)) = self.rooms.remove(&id) {
                room.close().await;
                closed += 1;
            }
        }
        info!(closed, "registry shut down");
    }

    pub fn stats(&self) -> RegistryStats {
        let rooms: Vec<RoomStats> = self.rooms().iter().map(|r| r.stats()).collect();
        RegistryStats {
            room_count: rooms.len(),
            active_rooms: rooms.iter().filter(|r| r.state == crate::RoomState::Active).count(),
            participant_count: rooms.iter().map(|r| r.participant_count).sum(),
            recording_rooms: rooms.iter().filter(|r| r.recording).count(),
            queued_frames: rooms.iter().map(|r| r.queued_frames).sum(),
            dropped_frames: rooms.iter().map(|r| r.dropped_frames).sum(),
            rooms,
        }
    }
}
