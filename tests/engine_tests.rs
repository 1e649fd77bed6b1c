//! Audio engine integration tests against a scripted host

mod support;

use std::time::Duration;

use freestyle_booth::application::engine::VOLUME_RAMP_TIME_CONSTANT;
use freestyle_booth::application::ports::{ContextState, HostError, MediaError, NodeId};
use freestyle_booth::application::{AudioEngine, EngineOptions};
use freestyle_booth::domain::device::ConstraintProfile;
use freestyle_booth::domain::session::{ProcessingError, SetupError, StartError};

use support::{lock, FakeHost, Script};

const BEAT_URL: &str = "https://cdn.example/beat.mp3";
const MONITOR: NodeId = NodeId(0);

fn engine(host: &std::sync::Arc<FakeHost>) -> AudioEngine<FakeHost> {
    AudioEngine::new(host.clone(), EngineOptions::default())
}

async fn install(engine: &AudioEngine<FakeHost>, profile: &ConstraintProfile) {
    let epoch = engine.epoch().await;
    let handle = engine.setup(BEAT_URL, profile, 70).await.unwrap();
    assert!(engine.install(handle, epoch).await);
}

/// Assert that nothing created by a failed setup is still held
fn assert_fully_released(host: &FakeHost) {
    let probe = host.probe();
    assert_eq!(probe.live_mics(), 0);
    if probe.context_count() > 0 {
        let graph = probe.last_graph();
        let graph = lock(&graph);
        assert_eq!(graph.state, Some(ContextState::Closed));
        assert!(graph.connections.is_empty(), "{:?}", graph.connections);
    }
    assert_eq!(probe.count("beat.load"), probe.count("beat.unload"));
}

#[tokio::test]
async fn setup_builds_complete_graph() {
    let host = FakeHost::healthy();
    let engine = engine(&host);

    let handle = engine
        .setup(BEAT_URL, &ConstraintProfile::default(), 70)
        .await
        .unwrap();

    assert_eq!(handle.beat_url(), BEAT_URL);
    assert_eq!(handle.format().mime_type(), "audio/flac");
    assert!(handle.mono_fold().is_none());

    let graph = host.probe().last_graph();
    let graph = lock(&graph);
    assert_eq!(graph.state, Some(ContextState::Running));
    assert_eq!(graph.initial_gain(handle.beat_gain()), Some(0.7));
    assert_eq!(graph.initial_gain(handle.mic_gain()), Some(1.0));
    assert!(graph.is_connected(handle.beat_gain(), 0, handle.mixdown(), 0));
    assert!(graph.is_connected(handle.mic_gain(), 0, handle.mixdown(), 0));
    // Beat is monitored, the microphone is not unless asked
    assert!(graph.is_connected(handle.beat_gain(), 0, MONITOR, 0));
    assert!(!graph.is_connected(handle.mic_gain(), 0, MONITOR, 0));
    drop(graph);

    handle.release().await;
    assert_fully_released(&host);
}

#[tokio::test]
async fn self_monitoring_routes_microphone_to_monitor() {
    let host = FakeHost::healthy();
    let engine = engine(&host);

    let profile = ConstraintProfile::default().with_monitor_self(true);
    let handle = engine.setup(BEAT_URL, &profile, 70).await.unwrap();

    let graph = host.probe().last_graph();
    assert!(lock(&graph).is_connected(handle.mic_gain(), 0, MONITOR, 0));
    handle.release().await;
}

#[tokio::test]
async fn stereo_microphone_is_folded_when_forced_mono() {
    let host = FakeHost::new(Script {
        mic_channels: 2,
        ..Default::default()
    });
    let engine = engine(&host);

    let profile = ConstraintProfile::desktop(None, true);
    let handle = engine.setup(BEAT_URL, &profile, 70).await.unwrap();
    let fold = handle.mono_fold().expect("stereo input should be folded");

    let graph = host.probe().last_graph();
    let graph = lock(&graph);
    assert_eq!(graph.kind_of(fold.splitter), Some("splitter"));
    assert_eq!(graph.kind_of(fold.merger), Some("merger"));
    assert!(graph.is_connected(fold.splitter, 0, fold.merger, 0));
    assert!(graph.is_connected(fold.splitter, 1, fold.merger, 0));
    assert!(graph.is_connected(fold.merger, 0, handle.mic_gain(), 0));
    drop(graph);
    handle.release().await;
}

#[tokio::test]
async fn mono_microphone_is_not_folded() {
    let host = FakeHost::healthy();
    let engine = engine(&host);

    let handle = engine
        .setup(BEAT_URL, &ConstraintProfile::desktop(None, true), 70)
        .await
        .unwrap();
    assert!(handle.mono_fold().is_none());
    handle.release().await;
}

#[tokio::test]
async fn stereo_microphone_without_force_mono_is_kept() {
    let host = FakeHost::new(Script {
        mic_channels: 2,
        ..Default::default()
    });
    let engine = engine(&host);

    let handle = engine
        .setup(BEAT_URL, &ConstraintProfile::mobile(), 70)
        .await
        .unwrap();
    assert!(handle.mono_fold().is_none());
    handle.release().await;
}

#[tokio::test]
async fn first_supported_format_wins() {
    let host = FakeHost::new(Script {
        supported_formats: vec!["audio/wav".to_string()],
        ..Default::default()
    });
    let engine = engine(&host);

    let handle = engine
        .setup(BEAT_URL, &ConstraintProfile::default(), 70)
        .await
        .unwrap();
    assert_eq!(handle.format().essence(), "audio/wav");
    assert_eq!(host.probe().count("recorder.create audio/wav"), 1);
    handle.release().await;
}

#[tokio::test]
async fn insecure_transport_fails_before_touching_devices() {
    let host = FakeHost::new(Script {
        secure_transport: false,
        ..Default::default()
    });
    let engine = engine(&host);

    let err = engine
        .setup(BEAT_URL, &ConstraintProfile::default(), 70)
        .await
        .unwrap_err();
    assert_eq!(err, SetupError::InsecureContext);
    assert!(host.probe().events().is_empty());
}

#[tokio::test]
async fn missing_capture_support_is_reported() {
    let host = FakeHost::new(Script {
        capture_supported: false,
        ..Default::default()
    });
    let err = engine(&host)
        .setup(BEAT_URL, &ConstraintProfile::default(), 70)
        .await
        .unwrap_err();
    assert_eq!(err, SetupError::CaptureUnsupported);
}

#[tokio::test]
async fn beat_failure_releases_partial_graph() {
    let host = FakeHost::new(Script {
        beat_load: Err(MediaError::not_supported("unrecognized media")),
        ..Default::default()
    });
    let engine = engine(&host);

    let err = engine
        .setup(BEAT_URL, &ConstraintProfile::default(), 70)
        .await
        .unwrap_err();
    assert!(matches!(err, SetupError::BeatLoad { code: Some(4), .. }));
    // Microphone is never requested when the beat cannot load
    assert_eq!(host.probe().count("mic.open"), 0);
    assert_fully_released(&host);
    assert!(!engine.is_live().await);
}

#[tokio::test(start_paused = true)]
async fn slow_beat_times_out_as_network_error() {
    let host = FakeHost::new(Script {
        beat_load_delay: Duration::from_secs(60),
        ..Default::default()
    });
    let engine = AudioEngine::new(
        host.clone(),
        EngineOptions {
            beat_load_timeout: Duration::from_secs(5),
            ..Default::default()
        },
    );

    let err = engine
        .setup(BEAT_URL, &ConstraintProfile::default(), 70)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SetupError::BeatLoad {
            code: Some(MediaError::NETWORK),
            ..
        }
    ));
    assert_fully_released(&host);
}

#[tokio::test]
async fn permission_denied_releases_partial_graph() {
    let host = FakeHost::new(Script {
        microphone: Err(HostError::PermissionDenied("user said no".to_string())),
        ..Default::default()
    });
    let engine = engine(&host);

    let err = engine
        .setup(BEAT_URL, &ConstraintProfile::default(), 70)
        .await
        .unwrap_err();
    assert_eq!(err, SetupError::PermissionDenied);
    assert_fully_released(&host);
}

#[tokio::test]
async fn microphone_without_tracks_is_released() {
    let host = FakeHost::new(Script {
        mic_tracks: 0,
        ..Default::default()
    });
    let engine = engine(&host);

    let err = engine
        .setup(BEAT_URL, &ConstraintProfile::default(), 70)
        .await
        .unwrap_err();
    assert_eq!(err, SetupError::NoAudioTracks);
    assert_eq!(host.probe().count("mic.stop"), 1);
    assert_fully_released(&host);
}

#[tokio::test]
async fn no_supported_format_lists_candidates() {
    let host = FakeHost::new(Script {
        supported_formats: Vec::new(),
        ..Default::default()
    });
    let engine = engine(&host);

    let err = engine
        .setup(BEAT_URL, &ConstraintProfile::default(), 70)
        .await
        .unwrap_err();
    match err {
        SetupError::NoSupportedFormat { tried } => {
            assert_eq!(tried.first().map(String::as_str), Some("audio/webm;codecs=opus"));
            assert_eq!(tried.len(), 4);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_fully_released(&host);
}

#[tokio::test]
async fn start_stop_finalize_assembles_chunks() {
    let host = FakeHost::healthy();
    let engine = engine(&host);
    install(&engine, &ConstraintProfile::default()).await;

    engine.start().await.unwrap();
    let probe = host.probe();
    assert!(probe.position("beat.seek", 0) < probe.position("beat.play", 0));
    assert_eq!(probe.count("recorder.start"), 1);

    let stopped = engine.stop().await.unwrap();
    assert_eq!(stopped.format().mime_type(), "audio/flac");
    let audio = engine.finalize(stopped, 5).await.unwrap();
    assert_eq!(audio.payload(), &[1, 2, 3, 4, 5]);
    assert_eq!(audio.duration_seconds(), 5);
    assert_eq!(probe.count("beat.pause"), 1);
}

#[tokio::test]
async fn empty_capture_is_a_processing_error() {
    let host = FakeHost::new(Script {
        chunks: vec![Vec::new()],
        ..Default::default()
    });
    let engine = engine(&host);
    install(&engine, &ConstraintProfile::default()).await;

    engine.start().await.unwrap();
    let stopped = engine.stop().await.unwrap();
    assert_eq!(
        engine.finalize(stopped, 1).await.unwrap_err(),
        ProcessingError::EmptyPayload
    );
}

#[tokio::test]
async fn start_without_graph_is_not_ready() {
    let host = FakeHost::healthy();
    assert_eq!(engine(&host).start().await.unwrap_err(), StartError::NotReady);
}

#[tokio::test]
async fn teardown_is_idempotent() {
    let host = FakeHost::healthy();
    let engine = engine(&host);
    install(&engine, &ConstraintProfile::default()).await;
    engine.start().await.unwrap();

    engine.teardown().await;
    engine.teardown().await;

    let probe = host.probe();
    assert_eq!(probe.count("context.close"), 1);
    assert_eq!(probe.count("mic.stop"), 1);
    assert_eq!(probe.count("recorder.stop"), 1);
    assert_eq!(probe.count(&format!("beat.unload {}", BEAT_URL)), 1);
    assert_eq!(probe.live_mics(), 0);
    assert!(!engine.is_live().await);
}

#[tokio::test]
async fn teardown_on_empty_engine_is_a_no_op() {
    let host = FakeHost::healthy();
    let engine = engine(&host);
    engine.teardown().await;
    assert!(host.probe().events().is_empty());
}

#[tokio::test]
async fn stale_handle_is_released_instead_of_installed() {
    let host = FakeHost::healthy();
    let engine = engine(&host);

    let epoch = engine.epoch().await;
    let handle = engine
        .setup(BEAT_URL, &ConstraintProfile::default(), 70)
        .await
        .unwrap();
    engine.teardown().await;

    assert!(!engine.install(handle, epoch).await);
    assert!(!engine.is_live().await);
    assert_eq!(host.probe().live_mics(), 0);
    assert_eq!(host.probe().count("context.close"), 1);
}

#[tokio::test]
async fn conditional_teardown_spares_a_newer_graph() {
    let host = FakeHost::healthy();
    let engine = engine(&host);

    install(&engine, &ConstraintProfile::default()).await;
    let first = engine.epoch().await;
    engine.teardown().await;
    install(&engine, &ConstraintProfile::default()).await;

    assert!(!engine.teardown_if(first).await);
    assert!(engine.is_live().await);
    assert_eq!(host.probe().live_mics(), 1);

    let current = engine.epoch().await;
    assert!(engine.teardown_if(current).await);
    assert!(!engine.is_live().await);
    assert_eq!(host.probe().live_mics(), 0);
}

#[tokio::test]
async fn volume_change_ramps_live_beat_gain() {
    let host = FakeHost::healthy();
    let engine = engine(&host);
    assert!(!engine.set_beat_volume(40).await);

    install(&engine, &ConstraintProfile::default()).await;
    assert!(engine.set_beat_volume(40).await);

    let beat_gain = engine.with_handle(|h| h.beat_gain()).await.unwrap();
    let graph = host.probe().last_graph();
    let graph = lock(&graph);
    assert_eq!(graph.initial_gain(beat_gain), Some(0.7));
    assert_eq!(graph.ramps, vec![(beat_gain, 0.4, VOLUME_RAMP_TIME_CONSTANT)]);
}
