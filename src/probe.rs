use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;

/// Byte range requested when probing; enough to see headers and a frame or two.
pub const PROBE_RANGE: &str = "bytes=0-1023";

/// Reachability report for a candidate media URL. Never an error: an
/// unreachable URL is reported as `accessible: false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub url: String,
    pub accessible: bool,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub looks_like_audio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn probe(client: &Client, url: &Url, timeout: Duration) -> ProbeReport {
    let resp = client
        .get(url.clone())
        .header(RANGE, PROBE_RANGE)
        .timeout(timeout)
        .send()
        .await;

    let resp = match resp {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(%url, error = %e, "stream probe failed");
            return ProbeReport {
                url: url.to_string(),
                accessible: false,
                status: None,
                content_type: None,
                content_length: None,
                looks_like_audio: false,
                error: Some(if e.is_timeout() {
                    format!("probe timed out after {}s", timeout.as_secs())
                } else {
                    format!("probe request failed: {e}")
                }),
            };
        }
    };

    let status = resp.status();
    let headers = resp.headers();
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let content_length = headers
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(total_from_content_range)
        .or_else(|| {
            headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
        });

    ProbeReport {
        url: url.to_string(),
        accessible: matches!(status, StatusCode::OK | StatusCode::PARTIAL_CONTENT),
        status: Some(status.as_u16()),
        looks_like_audio: content_type.as_deref().is_some_and(is_audio_type),
        content_type,
        content_length,
        error: None,
    }
}

/// `bytes 0-1023/48213` -> 48213. Unknown totals (`*`) yield None.
fn total_from_content_range(raw: &str) -> Option<u64> {
    raw.rsplit_once('/')?.1.trim().parse().ok()
}

fn is_audio_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("audio/") || mime == "application/octet-stream"
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn content_range_total() {
        assert_eq!(total_from_content_range("bytes 0-1023/48213"), Some(48213));
        assert_eq!(total_from_content_range("bytes 0-1023/*"), None);
        assert_eq!(total_from_content_range("garbage"), None);
    }

    #[test]
    fn audio_mime_detection() {
        assert!(is_audio_type("audio/mpeg"));
        assert!(is_audio_type("Audio/MPEG; charset=binary"));
        assert!(is_audio_type("application/octet-stream"));
        assert!(!is_audio_type("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn partial_content_is_accessible() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/song.mp3"))
            .and(header("range", PROBE_RANGE))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-type", "audio/mpeg")
                    .insert_header("content-range", "bytes 0-1023/48213")
                    .set_body_bytes(vec![0u8; 1024]),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/song.mp3", server.uri())).unwrap();
        let report = probe(&Client::new(), &url, Duration::from_secs(5)).await;
        assert!(report.accessible);
        assert_eq!(report.status, Some(206));
        assert_eq!(report.content_length, Some(48213));
        assert!(report.looks_like_audio);
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn not_found_is_not_accessible() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing.mp3", server.uri())).unwrap();
        let report = probe(&Client::new(), &url, Duration::from_secs(5)).await;
        assert!(!report.accessible);
        assert_eq!(report.status, Some(404));
    }

    #[tokio::test]
    async fn connection_error_is_reported_not_raised() {
        // Nothing listens on port 9 of localhost in test environments.
        let url = Url::parse("http://127.0.0.1:9/a.mp3").unwrap();
        let report = probe(&Client::new(), &url, Duration::from_secs(2)).await;
        assert!(!report.accessible);
        assert!(report.status.is_none());
        assert!(report.error.is_some());
    }
}
