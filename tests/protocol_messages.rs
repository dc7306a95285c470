use peersync::audio::{EncodedFrame, TrackRef};
use peersync::controller::ControlEvent;
use peersync::protocol::messages::{
    AudioChunk, ClientJoin, ClientPlayRequest, ClientTelemetry, ClientTime, DeviceInfo, Message,
    RequestedCommand, ServerTime, SyncQualityReport,
};
use peersync::scheduler::PlaybackCommand;
use peersync::sync::{ProbeReply, SyncQuality};
use peersync::Telemetry;

// =============================================================================
// Handshake Tests
// =============================================================================

#[test]
fn test_client_join_serialization() {
    let join = ClientJoin {
        device_id: "peer-123".to_string(),
        name: "Kitchen".to_string(),
        version: 1,
        supported_roles: vec!["player@v1".to_string(), "source@v1".to_string()],
        device_info: Some(DeviceInfo {
            product_name: Some("peersync demo".to_string()),
            manufacturer: None,
            software_version: Some("0.1.0".to_string()),
        }),
    };

    let json = serde_json::to_string(&Message::ClientJoin(join)).unwrap();

    assert!(json.contains("\"type\":\"client/join\""));
    assert!(json.contains("\"payload\":{"));
    assert!(json.contains("\"device_id\":\"peer-123\""));
    assert!(json.contains("\"source@v1\""));
    assert!(!json.contains("manufacturer"));
}

#[test]
fn test_server_welcome_deserialization() {
    let json = r#"{
        "type": "server/welcome",
        "payload": { "session_id": "abc-42" }
    }"#;

    match serde_json::from_str::<Message>(json).unwrap() {
        Message::ServerWelcome(welcome) => {
            assert_eq!(welcome.session_id, "abc-42");
            assert_eq!(welcome.server_name, None);
        }
        other => panic!("Expected ServerWelcome, got {:?}", other),
    }
}

// =============================================================================
// Clock Probe Tests
// =============================================================================

#[test]
fn test_client_time_serialization() {
    let json = serde_json::to_string(&Message::ClientTime(ClientTime {
        seq: 7,
        client_transmitted: 1_000_000,
    }))
    .unwrap();

    assert!(json.contains("\"type\":\"client/time\""));
    assert!(json.contains("\"seq\":7"));
    assert!(json.contains("\"client_transmitted\":1000000"));
}

#[test]
fn test_server_time_becomes_probe_reply() {
    let json = r#"{
        "type": "server/time",
        "payload": {
            "seq": 7,
            "client_transmitted": 1000000,
            "server_received": 2000050,
            "server_transmitted": 2000060
        }
    }"#;

    let message: Message = serde_json::from_str(json).unwrap();
    assert_eq!(
        message.into_control_event(),
        Some(ControlEvent::ProbeReply(ProbeReply {
            seq: 7,
            reference_received: 2_000_050,
            reference_transmitted: 2_000_060,
        }))
    );

    let reply: ProbeReply = ServerTime {
        seq: 1,
        client_transmitted: 0,
        server_received: 5,
        server_transmitted: 6,
    }
    .into();
    assert_eq!(reply.reference_transmitted, 6);
}

// =============================================================================
// Playback Command Tests
// =============================================================================

#[test]
fn test_server_play_becomes_command() {
    let json = r#"{
        "type": "server/play",
        "payload": {
            "track": "https://media.local/song.flac",
            "start_at_server_time": 1700000003000000,
            "start_at_position_ms": 5000,
            "server_time_at_broadcast": 1700000000000000
        }
    }"#;

    let message: Message = serde_json::from_str(json).unwrap();
    assert_eq!(
        message.into_control_event(),
        Some(ControlEvent::Command(PlaybackCommand::Play {
            track: TrackRef::Uri("https://media.local/song.flac".to_string()),
            reference_start_time: 1_700_000_003_000_000,
            start_position_ms: 5_000,
        }))
    );
}

#[test]
fn test_server_play_live_track() {
    let json = r#"{
        "type": "server/play",
        "payload": { "track": "live", "start_at_server_time": 0, "start_at_position_ms": 0 }
    }"#;

    match serde_json::from_str::<Message>(json).unwrap() {
        Message::ServerPlay(play) => {
            assert_eq!(play.track, TrackRef::Live);
            assert_eq!(play.server_time_at_broadcast, None);
        }
        other => panic!("Expected ServerPlay, got {:?}", other),
    }
}

#[test]
fn test_pause_and_seek_become_commands() {
    let pause: Message =
        serde_json::from_str(r#"{"type":"server/pause","payload":{"server_time":99}}"#).unwrap();
    assert_eq!(
        pause.into_control_event(),
        Some(ControlEvent::Command(PlaybackCommand::Pause { reference_time: 99 }))
    );

    let seek: Message = serde_json::from_str(
        r#"{"type":"server/seek","payload":{"start_at_server_time":10,"start_at_position_ms":42000}}"#,
    )
    .unwrap();
    assert_eq!(
        seek.into_control_event(),
        Some(ControlEvent::Command(PlaybackCommand::SeekTo {
            reference_start_time: 10,
            start_position_ms: 42_000,
        }))
    );
}

#[test]
fn test_sync_required_has_no_payload() {
    let message: Message = serde_json::from_str(r#"{"type":"server/sync_required"}"#).unwrap();
    assert_eq!(message, Message::ServerSyncRequired);
    assert_eq!(message.into_control_event(), Some(ControlEvent::SyncRequired));
}

#[test]
fn test_unknown_type_rejected() {
    assert!(serde_json::from_str::<Message>(r#"{"type":"server/dance","payload":{}}"#).is_err());
}

// =============================================================================
// Peer Report Tests
// =============================================================================

#[test]
fn test_telemetry_serialization() {
    let telemetry = Telemetry {
        rtt_micros: Some(12_000),
        offset_micros: -3_400,
        drift_ms: None,
        quality: SyncQuality::Good,
        status: "playing",
    };

    let message = Message::ClientTelemetry(ClientTelemetry::from(&telemetry));
    let json = serde_json::to_string(&message).unwrap();

    assert!(json.contains("\"type\":\"client/telemetry\""));
    assert!(json.contains("\"rtt_us\":12000"));
    assert!(json.contains("\"offset_us\":-3400"));
    assert!(json.contains("\"quality\":\"good\""));
    assert!(json.contains("\"status\":\"playing\""));
    assert!(!json.contains("drift_ms"));
    assert_eq!(message.into_control_event(), None);
}

#[test]
fn test_play_request_serialization() {
    let message = Message::ClientPlayRequest(ClientPlayRequest {
        track: TrackRef::from("https://media.local/song.flac"),
        delay_ms: 3_000,
        start_position_ms: 0,
    });
    let json = serde_json::to_string(&message).unwrap();
    assert!(json.contains("\"type\":\"client/play_request\""));
    assert!(json.contains("\"delay_ms\":3000"));

    let back: Message = serde_json::from_str(&json).unwrap();
    assert_eq!(back, message);
}

#[test]
fn test_command_request_serialization() {
    let seek = Message::ClientCommandRequest(RequestedCommand::Seek { position_ms: 42_000 });
    let json = serde_json::to_string(&seek).unwrap();
    assert_eq!(
        json,
        r#"{"type":"client/command_request","payload":{"cmd":"seek","position_ms":42000}}"#
    );

    let pause: Message =
        serde_json::from_str(r#"{"type":"client/command_request","payload":{"cmd":"pause"}}"#)
            .unwrap();
    assert_eq!(pause, Message::ClientCommandRequest(RequestedCommand::Pause));
    assert_eq!(pause.into_control_event(), None);

    let play: Message = serde_json::from_str(
        r#"{"type":"client/command_request","payload":{"cmd":"play","start_position_ms":0,"delay_ms":500}}"#,
    )
    .unwrap();
    assert_eq!(
        play,
        Message::ClientCommandRequest(RequestedCommand::Play {
            start_position_ms: 0,
            delay_ms: 500,
        })
    );
}

#[test]
fn test_quality_report_names() {
    for (quality, name) in [
        (SyncQualityReport::Good, "\"good\""),
        (SyncQualityReport::Degraded, "\"degraded\""),
        (SyncQualityReport::Lost, "\"lost\""),
    ] {
        assert_eq!(serde_json::to_string(&quality).unwrap(), name);
    }
}

// =============================================================================
// Binary Audio Tests
// =============================================================================

#[test]
fn test_audio_chunk_layout() {
    let chunk = AudioChunk::from(EncodedFrame {
        payload: vec![0xFF, 0xF9, 0x50, 0x80, 0x01, 0x1F, 0xFC, 0x21],
        presentation_timestamp_us: 0x0102_0304_0506_0708,
    });

    let bytes = chunk.encode();
    assert_eq!(bytes[0], 0x04);
    assert_eq!(&bytes[1..9], &[1u8, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(bytes.len(), 9 + 8);

    let decoded = AudioChunk::decode(&bytes).unwrap();
    assert_eq!(decoded, chunk);
}

#[test]
fn test_audio_chunk_rejects_bad_input() {
    assert!(AudioChunk::decode(&[0x04, 0, 0]).is_err());
    assert!(AudioChunk::decode(&[0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0xAA]).is_err());
}
