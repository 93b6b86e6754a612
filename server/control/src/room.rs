//! A single voice room: membership, per-participant frame queues, mixing
//! and at most one recorder.
//!
//! Rooms are created and destroyed by [`crate::RoomRegistry`]. Admission
//! (capacity and duplicate checks) and the Active -> Closed transition share
//! one lock, so a participant is never admitted into a room that has started
//! closing.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use vr_media::{mix_with_auto_gain, RecorderConfig, RecordingSummary, RoomRecorder};
use vr_voice::{Audio3AConfig, AudioFrame, ParticipantId, ProcessingStats, RoomId};

use crate::{
    errors::{ControlError, ControlResult},
    events::{PresenceKind, RecordingKind, RoomEvent},
    metrics::{JoinRejection, RoomMetrics},
    participant::{Participant, ParticipantState, TransportKind},
    queue::AudioQueue,
    ControlConfig,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Active,
    Closed,
}

/// Room creation input.
#[derive(Clone, Debug)]
pub struct RoomOptions {
    /// Generated when absent.
    pub id: Option<RoomId>,
    pub name: String,
    pub config: Audio3AConfig,
    pub transports: Vec<TransportKind>,
    /// 0 = unlimited. `None` takes the registry default.
    pub capacity: Option<usize>,
}

impl RoomOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            config: Audio3AConfig::default(),
            transports: vec![TransportKind::WebSocket, TransportKind::WebRtc],
            capacity: None,
        }
    }

    pub fn id(mut self, id: RoomId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn config(mut self, config: Audio3AConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transports(mut self, transports: Vec<TransportKind>) -> Self {
        self.transports = transports;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// Registry-owned side channels shared by every room.
#[derive(Clone)]
pub(crate) struct RoomHooks {
    pub metrics: Arc<dyn RoomMetrics>,
    pub events: broadcast::Sender<RoomEvent>,
}

impl RoomHooks {
    pub fn emit(&self, ev: RoomEvent) {
        // No subscribers is fine.
        let _ = self.events.send(ev);
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ParticipantStats {
    pub id: ParticipantId,
    pub display_name: String,
    pub state: ParticipantState,
    pub transport: TransportKind,
    pub joined_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub queued_frames: usize,
    pub dropped_frames: u64,
    pub processing: Option<ProcessingStats>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoomStats {
    pub id: RoomId,
    pub name: String,
    pub state: RoomState,
    pub capacity: usize,
    pub created_at: DateTime<Utc>,
    pub participant_count: usize,
    pub queued_frames: usize,
    pub dropped_frames: u64,
    pub recording: bool,
    pub recording_path: Option<PathBuf>,
    pub participants: Vec<ParticipantStats>,
}

pub struct Room {
    id: RoomId,
    name: String,
    capacity: usize,
    transports: Vec<TransportKind>,
    created_at: DateTime<Utc>,
    config: Audio3AConfig,
    state: RwLock<RoomState>,
    participants: DashMap<ParticipantId, Arc<Participant>>,
    queues: DashMap<ParticipantId, AudioQueue>,
    /// Held for admission checks and for closing.
    admission: Mutex<()>,
    recorder: Mutex<Option<Arc<RoomRecorder>>>,
    queue_depth: usize,
    recorder_cfg: RecorderConfig,
    hooks: RoomHooks,
}

impl Room {
    pub(crate) fn new(id: RoomId, opts: RoomOptions, ctl: &ControlConfig, hooks: RoomHooks) -> Self {
        let recorder_cfg = RecorderConfig {
            sample_rate: opts.config.sample_rate,
            channels: opts.config.channels,
            drain_timeout: ctl.recorder_drain_timeout,
            join_timeout: ctl.recorder_join_timeout,
        };
        Self {
            id,
            name: opts.name,
            capacity: opts.capacity.unwrap_or(ctl.default_capacity),
            transports: opts.transports,
            created_at: Utc::now(),
            config: opts.config,
            state: RwLock::new(RoomState::Active),
            participants: DashMap::new(),
            queues: DashMap::new(),
            admission: Mutex::new(()),
            recorder: Mutex::new(None),
            queue_depth: ctl.queue_depth,
            recorder_cfg,
            hooks,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn transports(&self) -> &[TransportKind] {
        &self.transports
    }

    pub fn supports(&self, transport: TransportKind) -> bool {
        self.transports.contains(&transport)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn config(&self) -> &Audio3AConfig {
        &self.config
    }

    pub fn state(&self) -> RoomState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == RoomState::Active
    }

    // ---------------------------------------------------------------------
    // Membership
    // ---------------------------------------------------------------------

    /// Admits `participant` unless the room is closed, full, or already has
    /// that id. Creates the participant's frame queue on success.
    pub fn try_add_participant(&self, participant: Arc<Participant>) -> bool {
        let _admit = self.admission.lock();

        let rejection = if !self.is_active() {
            Some(JoinRejection::RoomClosed)
        } else if self.capacity > 0 && self.participants.len() >= self.capacity {
            Some(JoinRejection::RoomFull)
        } else if self.participants.contains_key(participant.id()) {
            Some(JoinRejection::Duplicate)
        } else {
            None
        };
        if let Some(reason) = rejection {
            debug!(room_id = %self.id, participant_id = %participant.id(), reason = reason.as_str(), "join rejected");
            self.hooks.metrics.inc_join_rejected(reason);
            return false;
        }

        let id = participant.id().clone();
        self.queues.insert(id.clone(), AudioQueue::new(self.queue_depth));
        self.participants.insert(id, participant);
        true
    }

    /// Removes the participant and its queue. Lifecycle bookkeeping is left
    /// to the caller.
    pub fn try_remove_participant(&self, id: &ParticipantId) -> Option<Arc<Participant>> {
        let (_, p) = self.participants.remove(id)?;
        self.queues.remove(id);
        Some(p)
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<Arc<Participant>> {
        self.participants.get(id).map(|p| p.value().clone())
    }

    /// Snapshot ordered by participant id.
    pub fn participants(&self) -> Vec<Arc<Participant>> {
        let mut out: Vec<_> = self.participants.iter().map(|p| p.value().clone()).collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        out
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Connected <-> Muted. Returns whether the state changed.
    pub fn set_muted(&self, id: &ParticipantId, muted: bool) -> bool {
        let Some(p) = self.participant(id) else {
            return false;
        };
        let changed = if muted { p.mute() } else { p.unmute() };
        if changed {
            info!(room_id = %self.id, participant_id = %id, muted, "voice state changed");
            self.hooks.emit(RoomEvent::Presence {
                room_id: self.id.clone(),
                kind: PresenceKind::VoiceStateChanged {
                    participant_id: id.clone(),
                    muted,
                },
            });
        }
        changed
    }

    // ---------------------------------------------------------------------
    // Audio
    // ---------------------------------------------------------------------

    /// Runs one PCM frame through the participant's processor, stamps it and
    /// enqueues it. `Ok(None)` when the room is closed, the participant is
    /// unknown, or the participant is muted. A frame whose length is not a
    /// whole number of interleaved samples is rejected.
    pub fn ingest_pcm(
        &self,
        participant_id: &ParticipantId,
        pcm: &[i16],
        reference: Option<&[i16]>,
    ) -> ControlResult<Option<AudioFrame>> {
        if !self.is_active() {
            return Ok(None);
        }
        if !self.is_aligned(pcm.len()) {
            return Err(ControlError::InvalidArgument("frame length not a multiple of channel count"));
        }
        let Some(p) = self.participant(participant_id) else {
            return Ok(None);
        };
        p.touch();
        if p.is_muted() {
            self.hooks.metrics.inc_frames_muted();
            return Ok(None);
        }

        let started = Instant::now();
        let processed = match p.process_pcm(pcm, reference) {
            Ok(out) => out,
            Err(e) => {
                self.hooks.metrics.inc_processing_errors();
                warn!(room_id = %self.id, participant_id = %participant_id, error = %e, "processing failed");
                return Err(e);
            }
        };
        self.hooks.metrics.observe_processing(started.elapsed());

        let frame = AudioFrame::new(
            participant_id.clone(),
            processed,
            self.config.sample_rate,
            self.config.channels,
            p.next_sequence(),
        );
        self.enqueue_frame(frame.clone());
        Ok(Some(frame))
    }

    /// Queues an already-processed frame and feeds the recorder. Returns
    /// `false` when the room is closed, the sender has no queue, or the
    /// frame does not split evenly into the room's channels.
    pub fn enqueue_frame(&self, frame: AudioFrame) -> bool {
        if !self.is_active() {
            return false;
        }
        if !self.is_aligned(frame.samples().len()) {
            warn!(room_id = %self.id, len = frame.samples().len(), "misaligned frame dropped");
            return false;
        }
        let Some(queue) = self.queues.get(frame.participant_id()) else {
            return false;
        };

        let recorder = self.recorder.lock().clone();
        if let Some(rec) = recorder {
            rec.add_audio_data(&frame.to_f32());
        }

        let sender = frame.participant_id().clone();
        if queue.push(frame) {
            self.hooks.metrics.inc_frames_dropped();
            debug!(room_id = %self.id, participant_id = %sender, "queue full, dropped oldest frame");
        }
        self.hooks.metrics.inc_frames_enqueued();
        true
    }

    fn is_aligned(&self, len: usize) -> bool {
        len % usize::from(self.config.channels.max(1)) == 0
    }

    /// Most recent frame of every participant except `exclude`, ordered by
    /// participant id.
    pub fn latest_frames(&self, exclude: Option<&ParticipantId>) -> Vec<AudioFrame> {
        let mut out: Vec<AudioFrame> = self
            .queues
            .iter()
            .filter(|q| Some(q.key()) != exclude)
            .filter_map(|q| q.value().latest())
            .collect();
        out.sort_by(|a, b| a.participant_id().cmp(b.participant_id()));
        out
    }

    /// Takes every queued frame of one participant, oldest first.
    pub fn drain_queue(&self, id: &ParticipantId) -> Vec<AudioFrame> {
        self.queues.get(id).map(|q| q.drain()).unwrap_or_default()
    }

    pub fn queued_frames(&self, id: &ParticipantId) -> usize {
        self.queues.get(id).map(|q| q.len()).unwrap_or(0)
    }

    /// What `listener` should hear: an auto-gain mix of everyone else's
    /// latest frame.
    pub fn mix_for(&self, listener: &ParticipantId) -> Vec<i16> {
        mix_with_auto_gain(&self.latest_frames(Some(listener)), Some(listener))
    }

    // ---------------------------------------------------------------------
    // Recording
    // ---------------------------------------------------------------------

    /// Starts a recording under `dir`, or returns the current file if one is
    /// already being written.
    pub fn start_recording(&self, dir: &Path) -> ControlResult<PathBuf> {
        if !self.is_active() {
            return Err(ControlError::FailedPrecondition("room closed"));
        }
        let mut slot = self.recorder.lock();
        // close() flips the state before taking the slot.
        if !self.is_active() {
            return Err(ControlError::FailedPrecondition("room closed"));
        }
        if let Some(rec) = slot.as_ref() {
            return Ok(rec.start_recording(dir)?);
        }

        let rec = RoomRecorder::new(self.id.clone(), self.recorder_cfg.clone())?;
        let path = rec.start_recording(dir)?;
        *slot = Some(Arc::new(rec));
        drop(slot);

        self.hooks.metrics.inc_recordings_started();
        self.hooks.emit(RoomEvent::Recording {
            room_id: self.id.clone(),
            kind: RecordingKind::Started { path: path.clone() },
        });
        Ok(path)
    }

    /// Drains and closes the active recording. `None` when nothing was recording.
    pub async fn stop_recording(&self) -> Option<RecordingSummary> {
        let rec = self.recorder.lock().take()?;
        let summary = rec.shutdown().await;

        match &summary {
            Some(s) => info!(
                room_id = %self.id,
                path = %s.path.display(),
                frames = s.frames_written,
                "recording stopped"
            ),
            None => warn!(room_id = %self.id, "recording stopped without a summary"),
        }
        self.hooks
            .metrics
            .inc_recordings_stopped(summary.as_ref().map_or(0, |s| s.samples_written));
        self.hooks.emit(RoomEvent::Recording {
            room_id: self.id.clone(),
            kind: RecordingKind::Stopped {
                path: summary.as_ref().map(|s| s.path.clone()),
            },
        });
        summary
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.lock().as_ref().is_some_and(|r| r.is_recording())
    }

    pub fn recording_path(&self) -> Option<PathBuf> {
        self.recorder.lock().as_ref().and_then(|r| r.current_path())
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Active -> Closed. Stops the recorder, disconnects every participant
    /// and clears the queues. Returns `false` if the room was already closed.
    pub async fn close(&self) -> bool {
        {
            let _admit = self.admission.lock();
            let mut st = self.state.write();
            if *st == RoomState::Closed {
                return false;
            }
            *st = RoomState::Closed;
        }

        self.stop_recording().await;

        let ids: Vec<ParticipantId> = self.participants.iter().map(|p| p.key().clone()).collect();
        for id in &ids {
            if let Some(p) = self.try_remove_participant(id) {
                p.begin_leave();
                p.dispose();
            }
        }
        self.queues.clear();

        self.hooks.metrics.inc_rooms_closed();
        self.hooks.emit(RoomEvent::RoomClosed { room_id: self.id.clone() });
        info!(room_id = %self.id, disconnected = ids.len(), "room closed");
        true
    }

    pub fn stats(&self) -> RoomStats {
        let participants: Vec<ParticipantStats> = self
            .participants()
            .iter()
            .map(|p| {
                let (queued, dropped) = self
                    .queues
                    .get(p.id())
                    .map(|q| (q.len(), q.dropped()))
                    .unwrap_or((0, 0));
                ParticipantStats {
                    id: p.id().clone(),
                    display_name: p.display_name().to_string(),
                    state: p.state(),
                    transport: p.transport(),
                    joined_at: p.joined_at(),
                    last_activity: p.last_activity(),
                    queued_frames: queued,
                    dropped_frames: dropped,
                    processing: p.processing_stats(),
                }
            })
            .collect();

        RoomStats {
            id: self.id.clone(),
            name: self.name.clone(),
            state: self.state(),
            capacity: self.capacity,
            created_at: self.created_at,
            participant_count: participants.len(),
            queued_frames: participants.iter().map(|p| p.queued_frames).sum(),
            dropped_frames: participants.iter().map(|p| p.dropped_frames).sum(),
            recording: self.is_recording(),
            recording_path: self.recording_path(),
            participants,
        }
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("participants", &self.participant_count())
            .finish_non_exhaustive()
    }
}
