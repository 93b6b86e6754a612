use std::sync::Arc;

use vr_control::{
    ControlConfig, ControlError, JoinRequest, ParticipantState, PresenceKind, RoomEvent, RoomOptions,
    RoomRegistry, RoomState, TransportKind,
};
use vr_voice::{Audio3AConfig, ParticipantId, RoomId, VoiceError};

const BOTH: &[TransportKind] = &[TransportKind::WebSocket, TransportKind::WebRtc];

fn rid(s: &str) -> RoomId {
    RoomId::new(s).unwrap()
}

fn pid(s: &str) -> ParticipantId {
    ParticipantId::new(s).unwrap()
}

fn registry() -> RoomRegistry {
    RoomRegistry::new(ControlConfig::default())
}

fn join(reg: &RoomRegistry, room: &str, who: &str) -> Option<Arc<vr_control::Participant>> {
    reg.join_room(&rid(room), JoinRequest::new(pid(who), who.to_uppercase())).unwrap()
}

#[tokio::test]
async fn duplicate_room_id_conflicts_and_keeps_original() {
    let reg = registry();
    let first = reg.create_room(Some(rid("r1")), "first", Audio3AConfig::default(), BOTH).unwrap();

    let err = reg.create_room(Some(rid("r1")), "second", Audio3AConfig::default(), BOTH).unwrap_err();
    assert!(matches!(err, ControlError::AlreadyExists(_)), "{err:?}");

    assert_eq!(reg.room_count(), 1);
    let kept = reg.get_room(&rid("r1")).unwrap();
    assert!(Arc::ptr_eq(&first, &kept));
    assert_eq!(kept.name(), "first");
}

#[tokio::test]
async fn missing_id_is_generated() {
    let reg = registry();
    let a = reg.create_room(None, "a", Audio3AConfig::default(), BOTH).unwrap();
    let b = reg.create_room(None, "b", Audio3AConfig::default(), BOTH).unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(reg.active_room_count(), 2);
}

#[tokio::test]
async fn invalid_input_leaves_registry_untouched() {
    let reg = registry();
    let bad = Audio3AConfig { sample_rate: 0, ..Audio3AConfig::default() };
    assert!(matches!(
        reg.create_room(Some(rid("r1")), "room", bad, BOTH),
        Err(ControlError::Voice(_))
    ));
    assert!(matches!(
        reg.create_room(Some(rid("r1")), "  ", Audio3AConfig::default(), BOTH),
        Err(ControlError::InvalidArgument(_))
    ));
    assert!(matches!(
        reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), &[]),
        Err(ControlError::InvalidArgument(_))
    ));
    assert_eq!(reg.room_count(), 0);
}

#[tokio::test]
async fn removed_room_is_closed_and_gone() {
    let reg = registry();
    let room = reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), BOTH).unwrap();
    let p = join(&reg, "r1", "p1").unwrap();

    assert!(reg.remove_room(&rid("r1")).await);
    assert!(reg.get_room(&rid("r1")).is_none());
    assert!(!reg.remove_room(&rid("r1")).await);

    assert_eq!(room.state(), RoomState::Closed);
    assert_eq!(p.state(), ParticipantState::Disconnected);
    assert!(!p.is_3a_enabled());
    assert_eq!(reg.total_participant_count(), 0);
}

#[tokio::test]
async fn join_and_leave_move_both_counts() {
    let reg = registry();
    let room = reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), BOTH).unwrap();

    let p1 = join(&reg, "r1", "p1").unwrap();
    assert_eq!(p1.state(), ParticipantState::Connected);
    assert_eq!(room.participant_count(), 1);
    assert_eq!(reg.total_participant_count(), 1);

    join(&reg, "r1", "p2").unwrap();
    assert_eq!(room.participant_count(), 2);
    assert_eq!(reg.total_participant_count(), 2);

    assert!(reg.leave_room(&rid("r1"), &pid("p1")));
    assert_eq!(room.participant_count(), 1);
    assert_eq!(reg.total_participant_count(), 1);
    assert_eq!(p1.state(), ParticipantState::Disconnected);
    assert!(!p1.is_3a_enabled());

    assert!(!reg.leave_room(&rid("r1"), &pid("p1")));
    assert!(!reg.leave_room(&rid("nope"), &pid("p2")));
}

#[tokio::test]
async fn departed_participant_no_longer_processes_audio() {
    let reg = registry();
    reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), BOTH).unwrap();
    let with_3a = join(&reg, "r1", "p1").unwrap();
    let plain = reg
        .join_room(&rid("r1"), JoinRequest::new(pid("p2"), "P2").without_3a())
        .unwrap()
        .unwrap();
    assert_eq!(plain.process_pcm(&[250i16; 160], None).unwrap(), vec![250i16; 160]);

    assert!(reg.leave_room(&rid("r1"), &pid("p1")));
    assert!(reg.leave_room(&rid("r1"), &pid("p2")));

    for p in [&with_3a, &plain] {
        assert!(p.is_disposed());
        assert!(matches!(
            p.process_pcm(&[250i16; 160], None),
            Err(ControlError::Voice(VoiceError::ProcessorClosed))
        ));
        assert!(matches!(
            p.reset_processor(),
            Err(ControlError::Voice(VoiceError::ProcessorClosed))
        ));
    }
}

#[tokio::test]
async fn duplicate_participant_is_rejected() {
    let reg = registry();
    reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), BOTH).unwrap();
    assert!(join(&reg, "r1", "p1").is_some());
    assert!(join(&reg, "r1", "p1").is_none());
    assert_eq!(reg.total_participant_count(), 1);
}

#[tokio::test]
async fn capacity_is_enforced() {
    let reg = registry();
    reg.create_room_with(RoomOptions::new("small").id(rid("r1")).capacity(2)).unwrap();
    assert!(join(&reg, "r1", "p1").is_some());
    assert!(join(&reg, "r1", "p2").is_some());
    assert!(join(&reg, "r1", "p3").is_none());

    reg.leave_room(&rid("r1"), &pid("p1"));
    assert!(join(&reg, "r1", "p3").is_some());
}

#[tokio::test]
async fn closed_room_rejects_joins_and_audio() {
    let reg = registry();
    let room = reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), BOTH).unwrap();
    join(&reg, "r1", "p1").unwrap();

    assert!(room.close().await);
    assert!(!room.close().await);
    assert_eq!(reg.active_room_count(), 0);

    assert!(join(&reg, "r1", "p2").is_none());
    assert!(room.ingest_pcm(&pid("p1"), &[0i16; 160], None).unwrap().is_none());
}

#[tokio::test]
async fn unknown_room_and_unsupported_transport_are_errors() {
    let reg = registry();
    assert!(matches!(
        reg.join_room(&rid("ghost"), JoinRequest::new(pid("p1"), "P")),
        Err(ControlError::NotFound(_))
    ));

    reg.create_room(Some(rid("ws")), "ws only", Audio3AConfig::default(), &[TransportKind::WebSocket])
        .unwrap();
    let req = JoinRequest::new(pid("p1"), "P").transport(TransportKind::WebRtc);
    assert!(matches!(reg.join_room(&rid("ws"), req), Err(ControlError::InvalidArgument(_))));
}

#[tokio::test]
async fn cleanup_removes_only_empty_rooms() {
    let reg = registry();
    for id in ["a", "b", "c", "d"] {
        reg.create_room(Some(rid(id)), id, Audio3AConfig::default(), BOTH).unwrap();
    }
    join(&reg, "b", "p1").unwrap();
    join(&reg, "d", "p2").unwrap();

    assert_eq!(reg.cleanup_empty_rooms().await, 2);
    let left: Vec<String> = reg.rooms().iter().map(|r| r.id().to_string()).collect();
    assert_eq!(left, vec!["b", "d"]);
    assert_eq!(reg.total_participant_count(), 2);

    assert_eq!(reg.cleanup_empty_rooms().await, 0);
}

#[tokio::test]
async fn presence_events_are_published() {
    let reg = registry();
    let mut events = reg.subscribe();

    let room = reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), BOTH).unwrap();
    join(&reg, "r1", "p1").unwrap();
    assert!(room.set_muted(&pid("p1"), true));
    reg.leave_room(&rid("r1"), &pid("p1"));
    reg.remove_room(&rid("r1")).await;

    let mut seen = Vec::new();
    while let Ok(ev) = events.try_recv() {
        seen.push(ev);
    }
    assert_eq!(seen.len(), 5, "{seen:?}");
    assert!(matches!(seen[0], RoomEvent::RoomCreated { .. }));
    assert!(matches!(
        &seen[1],
        RoomEvent::Presence { kind: PresenceKind::ParticipantJoined { .. }, .. }
    ));
    assert!(matches!(
        &seen[2],
        RoomEvent::Presence { kind: PresenceKind::VoiceStateChanged { muted: true, .. }, .. }
    ));
    assert!(matches!(&seen[3], RoomEvent::Presence { kind: PresenceKind::ParticipantLeft(_), .. }));
    assert!(matches!(seen[4], RoomEvent::RoomClosed { .. }));
    assert!(seen.iter().all(|e| e.room_id() == &rid("r1")));
}

#[tokio::test]
async fn muted_audio_is_not_enqueued() {
    let reg = registry();
    let room = reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), BOTH).unwrap();
    join(&reg, "r1", "p1").unwrap();

    room.set_muted(&pid("p1"), true);
    assert!(room.ingest_pcm(&pid("p1"), &[500i16; 160], None).unwrap().is_none());
    assert_eq!(room.queued_frames(&pid("p1")), 0);

    room.set_muted(&pid("p1"), false);
    let frame = room.ingest_pcm(&pid("p1"), &[500i16; 160], None).unwrap().unwrap();
    assert_eq!(frame.sequence(), 0);
    assert_eq!(room.queued_frames(&pid("p1")), 1);
}

#[tokio::test]
async fn queue_depth_caps_and_counts_drops() {
    let cfg = ControlConfig { queue_depth: 4, ..ControlConfig::default() };
    let reg = RoomRegistry::new(cfg);
    let room = reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), BOTH).unwrap();
    reg.join_room(&rid("r1"), JoinRequest::new(pid("p1"), "P").without_3a()).unwrap().unwrap();

    for _ in 0..10 {
        room.ingest_pcm(&pid("p1"), &[1i16; 160], None).unwrap();
    }
    let stats = room.stats();
    assert_eq!(stats.queued_frames, 4);
    assert_eq!(stats.dropped_frames, 6);

    let seqs: Vec<u64> = room.drain_queue(&pid("p1")).iter().map(|f| f.sequence()).collect();
    assert_eq!(seqs, vec![6, 7, 8, 9]);
}

#[tokio::test]
async fn stats_serialize_to_json() {
    let reg = registry();
    reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), BOTH).unwrap();
    join(&reg, "r1", "p1").unwrap();

    let stats = reg.stats();
    assert_eq!(stats.room_count, 1);
    assert_eq!(stats.participant_count, 1);
    assert_eq!(stats.recording_rooms, 0);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["rooms"][0]["id"], "r1");
    assert_eq!(json["rooms"][0]["participants"][0]["state"], "connected");
}

#[tokio::test]
async fn shutdown_closes_everything() {
    let reg = registry();
    let a = reg.create_room(Some(rid("a")), "a", Audio3AConfig::default(), BOTH).unwrap();
    reg.create_room(Some(rid("b")), "b", Audio3AConfig::default(), BOTH).unwrap();
    let p = join(&reg, "a", "p1").unwrap();

    reg.shutdown().await;
    assert_eq!(reg.room_count(), 0);
    assert_eq!(a.state(), RoomState::Closed);
    assert_eq!(p.state(), ParticipantState::Disconnected);
}

#[tokio::test]
async fn stereo_room_rejects_partial_frames() {
    let reg = registry();
    let stereo = Audio3AConfig { channels: 2, ..Audio3AConfig::default() };
    let room = reg.create_room(Some(rid("st")), "stereo", stereo, BOTH).unwrap();
    reg.join_room(&rid("st"), JoinRequest::new(pid("p1"), "P").without_3a()).unwrap().unwrap();

    assert!(matches!(
        room.ingest_pcm(&pid("p1"), &[10i16; 161], None),
        Err(ControlError::InvalidArgument(_))
    ));
    assert_eq!(room.queued_frames(&pid("p1")), 0);

    assert!(room.ingest_pcm(&pid("p1"), &[10i16; 160], None).unwrap().is_some());
    assert_eq!(room.queued_frames(&pid("p1")), 1);
}

#[tokio::test]
async fn closed_room_refuses_to_start_recording() {
    let dir = tempfile::tempdir().unwrap();
    let reg = registry();
    let room = reg.create_room(Some(rid("r1")), "room", Audio3AConfig::default(), BOTH).unwrap();
    room.close().await;

    assert!(matches!(
        room.start_recording(dir.path()),
        Err(ControlError::FailedPrecondition(_))
    ));
    assert!(!room.is_recording());
    assert!(room.recording_path().is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn recording_start_racing_close_never_leaves_a_live_recorder() {
    let dir = tempfile::tempdir().unwrap();
    let reg = Arc::new(registry());

    for i in 0..20 {
        let id = format!("race{i}");
        let room = reg.create_room(Some(rid(&id)), &id, Audio3AConfig::default(), BOTH).unwrap();

        let starter = {
            let room = room.clone();
            let dir = dir.path().to_path_buf();
            tokio::spawn(async move { room.start_recording(&dir).is_ok() })
        };
        let closer = {
            let room = room.clone();
            tokio::spawn(async move { room.close().await })
        };
        starter.await.unwrap();
        assert!(closer.await.unwrap());

        assert_eq!(room.state(), RoomState::Closed);
        assert!(!room.is_recording(), "room {id} still recording after close");
        assert!(room.recording_path().is_none());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_overfill_a_room() {
    let reg = Arc::new(registry());
    let room = reg.create_room_with(RoomOptions::new("tight").id(rid("r1")).capacity(5)).unwrap();

    let mut joins = Vec::new();
    for i in 0..50 {
        let reg = reg.clone();
        joins.push(tokio::spawn(async move {
            reg.join_room(&rid("r1"), JoinRequest::new(pid(&format!("p{i}")), "P")).unwrap()
        }));
    }
    let mut admitted = Vec::new();
    for j in joins {
        if let Some(p) = j.await.unwrap() {
            admitted.push(p);
        }
    }

    assert_eq!(admitted.len(), 5);
    assert_eq!(room.participant_count(), 5);
    assert_eq!(reg.total_participant_count(), 5);
    assert!(admitted.iter().all(|p| p.state() == ParticipantState::Connected));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_of_one_id_yield_a_single_room() {
    let reg = Arc::new(registry());

    let mut creates = Vec::new();
    for i in 0..16 {
        let reg = reg.clone();
        creates.push(tokio::spawn(async move {
            reg.create_room(Some(rid("dup")), format!("attempt {i}"), Audio3AConfig::default(), BOTH)
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for c in creates {
        match c.await.unwrap() {
            Ok(_) => created += 1,
            Err(ControlError::AlreadyExists(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(reg.room_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cleanup_racing_joins_keeps_counts_consistent() {
    let reg = Arc::new(registry());
    reg.create_room(Some(rid("busy")), "busy", Audio3AConfig::default(), BOTH).unwrap();
    join(&reg, "busy", "anchor").unwrap();
    for i in 0..10 {
        let id = format!("empty{i}");
        reg.create_room(Some(rid(&id)), &id, Audio3AConfig::default(), BOTH).unwrap();
    }
    reg.create_room(Some(rid("fresh")), "fresh", Audio3AConfig::default(), BOTH).unwrap();

    let mut joins = Vec::new();
    for i in 0..20 {
        let reg = reg.clone();
        joins.push(tokio::spawn(async move {
            let room = if i % 2 == 0 { "busy" } else { "fresh" };
            match reg.join_room(&rid(room), JoinRequest::new(pid(&format!("j{i}")), "J")) {
                Ok(p) => p,
                Err(ControlError::NotFound(_)) => None,
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }));
    }
    let cleaner = {
        let reg = reg.clone();
        tokio::spawn(async move { reg.cleanup_empty_rooms().await })
    };

    let mut joined = Vec::new();
    for j in joins {
        if let Some(p) = j.await.unwrap() {
            joined.push(p);
        }
    }
    let removed = cleaner.await.unwrap();
    assert!(removed >= 10, "removed {removed}");

    let busy = reg.get_room(&rid("busy")).unwrap();
    assert_eq!(busy.participant_count(), 11);
    for i in 0..10 {
        assert!(reg.get_room(&rid(&format!("empty{i}"))).is_none());
    }

    let live = joined.iter().filter(|p| p.state() == ParticipantState::Connected).count() + 1;
    assert_eq!(reg.total_participant_count(), live);
    if let Some(fresh) = reg.get_room(&rid("fresh")) {
        assert!(fresh.is_active());
        assert_eq!(fresh.participant_count(), live - 11);
    }
}
