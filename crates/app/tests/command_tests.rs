//! Command dispatch and WebSocket audio callback behavior.

mod common;

use common::{RecordingBroadcaster, ScriptedEngine};
use serde_json::{json, Value};
use std::sync::Arc;

use voxbridge_app::glue::AppCore;
use voxbridge_bench::BenchmarkManager;
use voxbridge_foundation::ShutdownHandler;
use voxbridge_server::{AudioSink, CommandDispatcher};

#[test]
fn reset_command_resets_engine() {
    let engine = ScriptedEngine::new(&[], &[]);
    let core = AppCore::new(engine.clone(), None);

    let response = core.handle_command("reset", &Value::Null);
    assert_eq!(response["status"], "ok");
    assert_eq!(engine.reset_count(), 1);
}

#[test]
fn set_grammar_forwards_encoded_parameter() {
    let engine = ScriptedEngine::new(&[], &[]);
    let core = AppCore::new(engine.clone(), None);

    let response =
        core.handle_command("set_grammar", &json!({ "grammar": ["yes", "no"] }));
    assert_eq!(response["status"], "ok");
    assert_eq!(engine.grammars(), vec![r#"["yes","no"]"#.to_string()]);
}

#[test]
fn set_grammar_without_parameter_errors() {
    let engine = ScriptedEngine::new(&[], &[]);
    let core = AppCore::new(engine.clone(), None);

    let response = core.handle_command("set_grammar", &json!({}));
    assert_eq!(response["status"], "error");
    assert_eq!(response["message"], "Missing grammar parameter");
    assert!(engine.grammars().is_empty());
}

#[test]
fn stats_snapshot_has_expected_fields() {
    let engine = ScriptedEngine::new(&[], &[]);
    let core = AppCore::new(engine, None);

    let response = core.handle_command("stats", &Value::Null);
    assert_eq!(response["status"], "ok");

    let stats = &response["stats"];
    for key in [
        "uptime_seconds",
        "messages_processed",
        "running",
        "samples_processed",
        "connected_clients",
        "microphone_enabled",
        "benchmark",
    ] {
        assert!(stats.get(key).is_some(), "missing stats field {key}");
    }
    assert_eq!(stats["microphone_enabled"], false);
    assert_eq!(stats["connected_clients"], 0);
    assert_eq!(stats["benchmark"]["enabled"], false);
}

#[test]
fn benchmark_results_require_benchmark_mode() {
    let engine = ScriptedEngine::new(&[], &[]);
    let core = AppCore::new(engine, None);

    let response = core.handle_command("benchmark_results", &Value::Null);
    assert_eq!(response["status"], "error");
    assert_eq!(response["message"], "Benchmark not enabled");
}

#[test]
fn benchmark_results_project_current_metrics() {
    let engine = ScriptedEngine::new(&[], &[]);
    let benchmark = Arc::new(BenchmarkManager::new());
    benchmark.set_reference_text("hello world");
    benchmark.start();
    benchmark.add_transcription(
        "hello word",
        voxbridge_bench::SegmentKind::Final,
        1.0,
        16_000,
        10.0,
    );

    let core = AppCore::new(engine, Some(benchmark));
    let response = core.handle_command("benchmark_results", &Value::Null);

    assert_eq!(response["status"], "ok");
    assert_eq!(response["benchmark"]["word_error_rate"], 50.0);
    assert_eq!(response["benchmark"]["final_segments"], 1);
}

#[tokio::test]
async fn stop_command_requests_shutdown() {
    let engine = ScriptedEngine::new(&[], &[]);
    let core = AppCore::new(engine, None);
    let guard = ShutdownHandler::new().install().await;
    core.attach_shutdown(guard.clone());

    let response = core.handle_command("stop", &Value::Null);
    assert_eq!(response["status"], "ok");
    assert!(guard.is_shutdown_requested());
}

#[test]
fn unknown_command_is_an_error() {
    let engine = ScriptedEngine::new(&[], &[]);
    let core = AppCore::new(engine, None);

    let response = core.handle_command("make_coffee", &Value::Null);
    assert_eq!(response["status"], "error");
    assert_eq!(response["message"], "Unknown command");
}

#[test]
fn ws_audio_final_is_broadcast_with_session() {
    let engine = ScriptedEngine::new(&[r#"{"text":"hi there"}"#], &[]);
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let core = AppCore::new(engine, None);
    core.attach_broadcaster(broadcaster.clone());

    core.on_audio(&[0i16; 1_600], "client-7");

    assert_eq!(
        broadcaster.broadcasts(),
        vec![("hi there".to_string(), "client-7".to_string(), 1.0)]
    );
}

#[test]
fn ws_audio_uses_first_alternative_confidence() {
    let engine = ScriptedEngine::new(
        &[r#"{"text":"hi","alternatives":[{"text":"hi","confidence":0.87}]}"#],
        &[],
    );
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let core = AppCore::new(engine, None);
    core.attach_broadcaster(broadcaster.clone());

    core.on_audio(&[0i16; 1_600], "client-7");

    let broadcasts = broadcaster.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert!((broadcasts[0].2 - 0.87).abs() < 1e-6);
}

#[test]
fn ws_audio_partials_are_broadcast_and_recorded() {
    let engine = ScriptedEngine::new(&[r#"{"partial":"he"}"#], &[]);
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let benchmark = Arc::new(BenchmarkManager::new());
    benchmark.start();
    let core = AppCore::new(engine, Some(benchmark.clone()));
    core.attach_broadcaster(broadcaster.clone());

    core.on_audio(&[0i16; 1_600], "client-7");

    assert_eq!(broadcaster.broadcasts().len(), 1);
    let results = benchmark.get_current_results();
    assert_eq!(results.partial_segments, 1);
    assert_eq!(results.final_segments, 0);
}

#[test]
fn ws_audio_empty_result_is_dropped() {
    let engine = ScriptedEngine::new(&["{}"], &[]);
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let core = AppCore::new(engine, None);
    core.attach_broadcaster(broadcaster.clone());

    core.on_audio(&[0i16; 1_600], "client-7");

    assert!(broadcaster.broadcasts().is_empty());
}
