//! Recorder → bus → playback → renderer, end to end

use std::time::Duration;

use tempfile::TempDir;

use retrace_core::bus::RecordBus;
use retrace_core::config::{PlaybackConfig, RecorderConfig};
use retrace_core::dom::Document;
use retrace_core::playback::{
    BridgeDownMessage, BridgeRecord, BridgeUpMessage, PlaybackSession, PlaybackStatus,
    RendererEndpoint, renderer_channel, start_playback,
};
use retrace_core::record::{PrivacyLevel, RecordLog, start_recording};
use retrace_core::types::{RecordType, SerializedNodeData};

const ORIGIN: &str = "https://sandbox.example.test";

fn playback_config() -> PlaybackConfig {
    PlaybackConfig {
        sandbox_origin: ORIGIN.to_string(),
        view_id: "view-42".to_string(),
    }
}

fn recorder_config() -> RecorderConfig {
    RecorderConfig {
        default_privacy_level: PrivacyLevel::Allow,
        ..Default::default()
    }
}

async fn next_record(endpoint: &mut RendererEndpoint) -> BridgeRecord {
    let message = tokio::time::timeout(Duration::from_secs(5), endpoint.recv())
        .await
        .expect("timed out waiting for a record")
        .expect("bridge closed");
    match message {
        BridgeDownMessage::Records { mut records, .. } => {
            assert_eq!(records.len(), 1);
            records.remove(0)
        }
    }
}

#[tokio::test]
async fn test_live_recording_is_replayed_in_order() {
    let bus = RecordBus::new(64);
    let (renderer, mut endpoint) = renderer_channel(ORIGIN);
    let mut playback = start_playback(renderer, &bus, playback_config(), |_| {});

    let mut doc = Document::new("https://example.test/");
    let mut recorder = start_recording(&mut doc, recorder_config(), bus.clone());
    let div = doc.create_element("div");
    let body = doc.body();
    doc.append_child(body, div);
    recorder.flush(&mut doc);

    endpoint.post(&BridgeUpMessage::Ready).unwrap();
    assert!(playback.wait_for_status(PlaybackStatus::Ready).await);

    let mut types = Vec::new();
    for expected_order in 1..=4 {
        let record = next_record(&mut endpoint).await;
        assert_eq!(record.order_id, expected_order);
        assert_eq!(record.view_id, "view-42");
        types.push(record.record.record_type());
    }
    assert_eq!(
        types,
        vec![
            RecordType::Meta,
            RecordType::FullSnapshot,
            RecordType::Focus,
            RecordType::IncrementalSnapshot
        ]
    );

    // Live records after ready are forwarded immediately
    recorder.stop(&mut doc);
    let view_end = next_record(&mut endpoint).await;
    assert_eq!(view_end.order_id, 5);
    assert_eq!(view_end.record.record_type(), RecordType::ViewEnd);

    playback.stop();
    playback.join().await;
}

#[tokio::test]
async fn test_renderer_ready_before_any_snapshot_waits_for_resync() {
    let bus = RecordBus::new(64);
    let mut doc = Document::new("https://example.test/");
    let mut recorder = start_recording(&mut doc, recorder_config(), bus.clone());

    // The initial snapshot went out before playback subscribed
    let (renderer, mut endpoint) = renderer_channel(ORIGIN);
    let mut playback = start_playback(renderer, &bus, playback_config(), |_| {});
    endpoint.post(&BridgeUpMessage::Ready).unwrap();
    assert!(
        playback
            .wait_for_status(PlaybackStatus::WaitingForFullSnapshot)
            .await
    );

    doc.set_focus(false);
    recorder.flush(&mut doc);
    recorder.resync(&mut doc);
    assert!(playback.wait_for_status(PlaybackStatus::Ready).await);

    let first = next_record(&mut endpoint).await;
    assert_eq!(first.order_id, 1);
    assert_eq!(first.record.record_type(), RecordType::Meta);
    let second = next_record(&mut endpoint).await;
    assert_eq!(second.record.record_type(), RecordType::FullSnapshot);

    playback.stop();
}

#[tokio::test]
async fn test_saved_recording_replays_through_a_session() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("view-42.jsonl");

    let mut doc = Document::new("https://example.test/");
    let input = doc.create_element("input");
    let body = doc.body();
    doc.append_child(body, input);

    let mut recorder = start_recording(
        &mut doc,
        RecorderConfig::default(),
        RecordLog::new("view-42"),
    );
    doc.set_value(input, "hunter2");
    recorder.flush(&mut doc);
    recorder.stop(&mut doc);
    recorder.sink().save(&path).unwrap();

    let log = RecordLog::load(&path).unwrap();
    assert_eq!(log.view_id, "view-42");
    assert_eq!(log.of_type(RecordType::ViewEnd).count(), 1);
    let serialized = serde_json::to_string(&log.records).unwrap();
    assert!(!serialized.contains("hunter2"));

    let mut session = PlaybackSession::new();
    let mut forwarded = Vec::new();
    for record in log.records.clone() {
        session.on_record(record, &mut forwarded);
    }
    session.on_renderer_ready(&mut forwarded);
    assert_eq!(session.status(), PlaybackStatus::Ready);
    assert_eq!(forwarded, log.records);
    match &forwarded[1].snapshot().unwrap().data {
        SerializedNodeData::Document { .. } => {}
        other => panic!("unexpected snapshot root {:?}", other),
    }
}
