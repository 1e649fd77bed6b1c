//! Recordings API and beat catalog tests against a mock HTTP server

use serde_json::json;
use wiremock::matchers::{body_bytes, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use freestyle_booth::application::ports::{
    BeatCatalog, CatalogError, SubmissionFailure, SubmissionMetadata, SubmissionStep,
};
use freestyle_booth::application::SubmissionBridge;
use freestyle_booth::domain::audio::{CapturedAudio, RecordingFormat};
use freestyle_booth::infrastructure::{HttpBeatCatalog, HttpRecordingApi};

fn take() -> CapturedAudio {
    CapturedAudio::new(b"fLaC-take".to_vec(), RecordingFormat::new("audio/flac"), 12)
}

fn metadata() -> SubmissionMetadata {
    SubmissionMetadata {
        beat_id: "beat-7".to_string(),
        title: "Cypher".to_string(),
        explicit: true,
        performer_name: "MC Mock".to_string(),
        bearer_token: "secret".to_string(),
    }
}

#[tokio::test]
async fn create_then_upload_to_own_origin() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/recordings"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "beatId": "beat-7",
            "title": "Cypher",
            "explicit": true,
            "performerName": "MC Mock",
            "mimeType": "audio/flac",
            "sizeBytes": 9,
            "durationSeconds": 12
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "rec-1",
            "uploadUrl": "/recordings/rec-1/audio"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/recordings/rec-1/audio"))
        .and(header("authorization", "Bearer secret"))
        .and(header("content-type", "audio/flac"))
        .and(body_bytes(b"fLaC-take".to_vec()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let bridge = SubmissionBridge::new(HttpRecordingApi::new(server.uri()));
    let ticket = bridge.submit(&take(), &metadata()).await.unwrap();
    assert_eq!(ticket.id, "rec-1");
}

#[tokio::test]
async fn presigned_upload_does_not_leak_the_token() {
    let api = MockServer::start().await;
    let storage = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/recordings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "rec-2",
            "uploadUrl": format!("{}/bucket/rec-2?sig=abc", storage.uri())
        })))
        .mount(&api)
        .await;

    Mock::given(method("PUT"))
        .and(path("/bucket/rec-2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&storage)
        .await;

    let bridge = SubmissionBridge::new(HttpRecordingApi::new(api.uri()));
    bridge.submit(&take(), &metadata()).await.unwrap();

    let requests = storage.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn rejected_create_skips_upload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/recordings"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let bridge = SubmissionBridge::new(HttpRecordingApi::new(server.uri()));
    let err = bridge.submit(&take(), &metadata()).await.unwrap_err();
    assert_eq!(err.step, SubmissionStep::Create);
    assert_eq!(err.failure, SubmissionFailure::Unauthorized);
}

#[tokio::test]
async fn upload_error_body_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/recordings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "rec-3",
            "uploadUrl": "/recordings/rec-3/audio"
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/recordings/rec-3/audio"))
        .respond_with(ResponseTemplate::new(507).set_body_json(json!({ "error": "disk full" })))
        .mount(&server)
        .await;

    let bridge = SubmissionBridge::new(HttpRecordingApi::new(server.uri()));
    let err = bridge.submit(&take(), &metadata()).await.unwrap_err();
    assert_eq!(err.step, SubmissionStep::Upload);
    assert_eq!(
        err.failure,
        SubmissionFailure::Rejected {
            status: 507,
            message: "disk full".to_string()
        }
    );
}

#[tokio::test]
async fn malformed_create_response_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/recordings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let bridge = SubmissionBridge::new(HttpRecordingApi::new(server.uri()));
    let err = bridge.submit(&take(), &metadata()).await.unwrap_err();
    assert!(matches!(err.failure, SubmissionFailure::ParseError(_)));
}

#[tokio::test]
async fn catalog_lists_wrapped_beats_with_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/beats"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "beats": [
                { "id": "b1", "title": "Dusty", "audioUrl": "https://cdn/b1.mp3", "bpm": 88 },
                { "id": "b2", "title": "Neon", "audioUrl": "https://cdn/b2.mp3", "producer": "K" }
            ]
        })))
        .mount(&server)
        .await;

    let catalog = HttpBeatCatalog::new(server.uri(), Some("tok".to_string()));
    let beats = catalog.list_beats().await.unwrap();
    assert_eq!(beats.len(), 2);
    assert_eq!(beats[0].bpm, Some(88));
    assert_eq!(beats[1].producer.as_deref(), Some("K"));
}

#[tokio::test]
async fn catalog_accepts_bare_lists() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/beats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "b1", "title": "Dusty", "audioUrl": "https://cdn/b1.mp3" }
        ])))
        .mount(&server)
        .await;

    let catalog = HttpBeatCatalog::new(server.uri(), None);
    let beats = catalog.list_beats().await.unwrap();
    assert_eq!(beats[0].audio_url, "https://cdn/b1.mp3");
}

#[tokio::test]
async fn unknown_beat_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/beats/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let catalog = HttpBeatCatalog::new(server.uri(), None);
    assert!(matches!(
        catalog.get_beat("missing").await,
        Err(CatalogError::NotFound(id)) if id == "missing"
    ));
}
