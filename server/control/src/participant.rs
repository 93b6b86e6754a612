use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use vr_voice::{Audio3AConfig, ParticipantId, ProcessingStats, RoomId, SessionProcessor, VoiceError};

use crate::errors::ControlResult;

/// How a participant's audio reaches the server. Tag only; transports live elsewhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    WebSocket,
    WebRtc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantState {
    Connecting,
    Connected,
    Muted,
    Disconnecting,
    Disconnected,
}

/// What a caller supplies to join a room.
#[derive(Clone, Debug)]
pub struct JoinRequest {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub transport: TransportKind,
    /// Run the room's 3A pipeline on this participant's audio.
    pub enable_3a: bool,
}

impl JoinRequest {
    pub fn new(participant_id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            participant_id,
            display_name: display_name.into(),
            transport: TransportKind::WebSocket,
            enable_3a: true,
        }
    }

    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn without_3a(mut self) -> Self {
        self.enable_3a = false;
        self
    }
}

/// One member of one room. Owns its session processor exclusively.
pub struct Participant {
    id: ParticipantId,
    display_name: String,
    room_id: RoomId,
    transport: TransportKind,
    joined_at: DateTime<Utc>,
    state: RwLock<ParticipantState>,
    last_activity: RwLock<DateTime<Utc>>,
    processor: Mutex<Option<SessionProcessor>>,
    next_seq: AtomicU64,
    disposed: AtomicBool,
}

impl Participant {
    /// Builds a `Connecting` participant. A processor is created from a
    /// private clone of `config` when 3A is requested and any stage is on.
    pub fn new(room_id: RoomId, req: JoinRequest, config: &Audio3AConfig) -> ControlResult<Self> {
        let processor = if req.enable_3a && config.any_enabled() {
            Some(SessionProcessor::new(config.clone())?)
        } else {
            None
        };

        let now = Utc::now();
        Ok(Self {
            id: req.participant_id,
            display_name: req.display_name,
            room_id,
            transport: req.transport,
            joined_at: now,
            state: RwLock::new(ParticipantState::Connecting),
            last_activity: RwLock::new(now),
            processor: Mutex::new(processor),
            next_seq: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.read()
    }

    pub fn state(&self) -> ParticipantState {
        *self.state.read()
    }

    pub fn is_muted(&self) -> bool {
        self.state() == ParticipantState::Muted
    }

    /// True while a live processor is attached.
    pub fn is_3a_enabled(&self) -> bool {
        self.processor.lock().as_ref().is_some_and(|p| !p.is_closed())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn touch(&self) {
        *self.last_activity.write() = Utc::now();
    }

    /// Sequence number for the next outgoing frame, starting at 0.
    pub fn next_sequence(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn mark_connected(&self) {
        let mut st = self.state.write();
        if *st == ParticipantState::Connecting {
            *st = ParticipantState::Connected;
        }
    }

    /// Connected -> Muted. Returns whether the state changed.
    pub fn mute(&self) -> bool {
        self.transition(ParticipantState::Connected, ParticipantState::Muted)
    }

    /// Muted -> Connected. Returns whether the state changed.
    pub fn unmute(&self) -> bool {
        self.transition(ParticipantState::Muted, ParticipantState::Connected)
    }

    fn transition(&self, from: ParticipantState, to: ParticipantState) -> bool {
        let mut st = self.state.write();
        if *st != from {
            return false;
        }
        *st = to;
        true
    }

    /// Runs the participant's pipeline over one PCM frame. Without a
    /// processor the input is returned unchanged. Fails with
    /// `ProcessorClosed` once the participant has been disposed.
    pub fn process_pcm(&self, pcm: &[i16], reference: Option<&[i16]>) -> ControlResult<Vec<i16>> {
        let mut guard = self.processor.lock();
        if self.is_disposed() {
            return Err(VoiceError::ProcessorClosed.into());
        }
        match guard.as_mut() {
            Some(p) => Ok(p.process_i16(pcm, reference)?),
            None if pcm.is_empty() => Err(VoiceError::EmptyBuffer.into()),
            None => Ok(pcm.to_vec()),
        }
    }

    pub fn processing_stats(&self) -> Option<ProcessingStats> {
        self.processor.lock().as_ref().map(SessionProcessor::stats)
    }

    /// Clears adaptive state (filter taps, noise floor, gain).
    pub fn reset_processor(&self) -> ControlResult<()> {
        let mut guard = self.processor.lock();
        if self.is_disposed() {
            return Err(VoiceError::ProcessorClosed.into());
        }
        if let Some(p) = guard.as_mut() {
            p.reset()?;
        }
        Ok(())
    }

    pub(crate) fn begin_leave(&self) {
        *self.state.write() = ParticipantState::Disconnecting;
    }

    /// Closes the processor in place and marks the participant gone. Later
    /// processing calls fail instead of passing audio through.
    pub(crate) fn dispose(&self) {
        let mut guard = self.processor.lock();
        self.disposed.store(true, Ordering::Release);
        if let Some(p) = guard.as_mut() {
            p.close();
        }
        drop(guard);
        *self.state.write() = ParticipantState::Disconnected;
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("room_id", &self.room_id)
            .field("state", &self.state())
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}
