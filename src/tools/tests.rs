use super::*;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::{MUSIC_API_KEY_ENV, MUSIC_API_URL_ENV, TEMP_DIR_ENV};
use crate::playback::tests::FakePlayer;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn extract_json(result: &CallToolResult) -> serde_json::Value {
    let text = result
        .content
        .first()
        .and_then(|content| content.as_text())
        .map(|text| text.text.as_str())
        .expect("tool result should include text content");

    serde_json::from_str(text).expect("tool text content should be valid JSON")
}

fn is_error(result: &CallToolResult) -> bool {
    result.is_error == Some(true)
}

fn server_for(mock: &MockServer, temp: &TempDir, player: FakePlayer) -> MusicServer {
    let vars = HashMap::from([
        (MUSIC_API_URL_ENV, format!("{}/music", mock.uri())),
        (MUSIC_API_KEY_ENV, "test-key".to_string()),
        (TEMP_DIR_ENV, temp.path().display().to_string()),
    ]);
    let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
    MusicServer::with_player(config, Arc::new(player)).unwrap()
}

async fn mount_song(mock: &MockServer) -> String {
    let media_url = format!("{}/media/song.wav", mock.uri());
    Mock::given(method("GET"))
        .and(path("/media/song.wav"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(crate::audio::tests::silent_wav(8000, 0.25)),
        )
        .mount(mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/music"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": {"musicurl": media_url, "name": "Test Song", "songname": "Artist A"}
        })))
        .mount(mock)
        .await;
    media_url
}

#[test]
fn router_registers_every_tool() {
    let mut names: Vec<String> = MusicServer::tool_router()
        .list_all()
        .into_iter()
        .map(|tool| tool.name.to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        [
            "download_music",
            "music_service_status",
            "play_audiobook",
            "play_music",
            "probe_stream",
            "recommend_songs",
            "search_audiobooks",
            "search_music",
        ]
    );
}

#[tokio::test]
async fn get_info_enables_tools() {
    let mock = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();
    let info = server_for(&mock, &temp, FakePlayer::new(Duration::ZERO)).get_info();
    assert!(info.capabilities.tools.is_some());
    assert!(info.instructions.unwrap().contains("success"));
}

#[tokio::test]
async fn blank_play_is_error_result_with_kind() {
    let mock = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();
    let server = server_for(&mock, &temp, FakePlayer::new(Duration::ZERO));

    let result = server
        .play_music(Parameters(PlayParams {
            query: Some("   ".into()),
            ..Default::default()
        }))
        .await
        .unwrap();

    assert!(is_error(&result));
    let payload = extract_json(&result);
    assert_eq!(payload["success"], false);
    assert_eq!(payload["kind"], "InvalidInput");
    assert!(mock.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn search_then_play_by_session() {
    let mock = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();
    let server = server_for(&mock, &temp, FakePlayer::new(Duration::ZERO));
    mount_song(&mock).await;

    let search = server
        .search_music(Parameters(SearchParams {
            query: "Test Song".into(),
            count: Some(3),
        }))
        .await
        .unwrap();
    assert!(!is_error(&search));
    let payload = extract_json(&search);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["results"][0]["title"], "Test Song");
    assert_eq!(payload["results"][0]["artist"], "Artist A");
    let session_id = payload["session_id"].as_str().unwrap().to_string();

    let play = server
        .play_music(Parameters(PlayParams {
            session_id: Some(session_id),
            index: Some(0),
            ..Default::default()
        }))
        .await
        .unwrap();
    let payload = extract_json(&play);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["playback_performed"], true);
    assert_eq!(payload["descriptor"]["title"], "Test Song");
    assert!(std::fs::read_dir(temp.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn headless_play_returns_fallback_url() {
    let mock = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();
    let server = server_for(&mock, &temp, FakePlayer::headless());
    let media_url = mount_song(&mock).await;

    let result = server
        .play_music(Parameters(PlayParams {
            query: Some("Test Song".into()),
            ..Default::default()
        }))
        .await
        .unwrap();

    assert!(!is_error(&result));
    let payload = extract_json(&result);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["playback_performed"], false);
    assert_eq!(payload["fallback_url"], media_url);
    assert_eq!(payload["playback_error"]["kind"], "PlaybackUnavailable");
}

#[tokio::test]
async fn download_reports_size() {
    let mock = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();
    let server = server_for(&mock, &temp, FakePlayer::new(Duration::ZERO));
    mount_song(&mock).await;

    let result = server
        .download_music(Parameters(PlayParams {
            query: Some("Test Song".into()),
            ..Default::default()
        }))
        .await
        .unwrap();
    let payload = extract_json(&result);
    assert_eq!(payload["file_size_bytes"], 4044);
    assert_eq!(payload["file_size_mb"], 0.0);
    assert!(payload.get("playback_performed").is_none());
}

#[tokio::test]
async fn probe_stream_rejects_non_http_urls() {
    let mock = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();
    let server = server_for(&mock, &temp, FakePlayer::new(Duration::ZERO));

    for url in ["", "ftp://example.com/a.mp3", "not a url"] {
        let result = server
            .probe_stream(Parameters(ProbeParams { url: url.into() }))
            .await
            .unwrap();
        assert!(is_error(&result), "{url:?} should be rejected");
        assert_eq!(extract_json(&result)["kind"], "InvalidInput");
    }
}

#[tokio::test]
async fn probe_stream_reports_reachability() {
    let mock = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();
    let server = server_for(&mock, &temp, FakePlayer::new(Duration::ZERO));
    let media_url = mount_song(&mock).await;

    let result = server
        .probe_stream(Parameters(ProbeParams {
            url: media_url.clone(),
        }))
        .await
        .unwrap();
    let payload = extract_json(&result);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["probe"]["accessible"], true);

    let missing = format!("{}/media/gone.mp3", mock.uri());
    let result = server
        .probe_stream(Parameters(ProbeParams { url: missing }))
        .await
        .unwrap();
    let payload = extract_json(&result);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["probe"]["accessible"], false);
}

#[tokio::test]
async fn recommend_without_artist_uses_defaults() {
    let mock = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();
    let server = server_for(&mock, &temp, FakePlayer::new(Duration::ZERO));

    let result = server
        .recommend_songs(Parameters(RecommendParams::default()))
        .await
        .unwrap();
    let payload = extract_json(&result);
    assert_eq!(payload["source"], "default");
    assert_eq!(
        payload["recommendations"].as_array().unwrap().len(),
        crate::pipeline::DEFAULT_RECOMMENDATIONS.len()
    );
}

#[tokio::test]
async fn status_counts_every_tool_call() {
    let mock = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();
    let server = server_for(&mock, &temp, FakePlayer::new(Duration::ZERO));

    let initial = extract_json(&server.music_service_status().await.unwrap());
    assert_eq!(initial["total_requests"], 1);
    assert_eq!(initial["api_key_configured"], true);
    assert_eq!(initial["player"], "fake");
    assert_eq!(initial["uptime"], "0h 0m");

    server
        .play_music(Parameters(PlayParams::default()))
        .await
        .unwrap();
    server
        .recommend_songs(Parameters(RecommendParams::default()))
        .await
        .unwrap();

    let after = extract_json(&server.music_service_status().await.unwrap());
    assert_eq!(after["total_requests"], 4);
    assert!(after["last_request"].is_string());
}
