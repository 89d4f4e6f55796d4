use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::outcome::PipelineError;

/// Sentinel used when a provider omits a title or artist.
pub const UNKNOWN: &str = "unknown";

/// Upper bound on the result-count hint sent to a search endpoint.
pub const MAX_RESULTS: u32 = 10;

/// Which search endpoint a query goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Music,
    Audiobook,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Music => "music",
            Self::Audiobook => "audiobook",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated search request: trimmed, non-empty text plus a result-count hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    count: u32,
}

impl Query {
    pub fn new(raw: &str, count: Option<u32>) -> Result<Self, PipelineError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(PipelineError::invalid_input(
                "search text must not be empty",
            ));
        }
        Ok(Self {
            text: text.to_string(),
            count: count.unwrap_or(1).clamp(1, MAX_RESULTS),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Normalized search hit. `url` is either absent or a valid http(s) URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl ResourceDescriptor {
    pub fn is_playable(&self) -> bool {
        self.url.is_some()
    }

    pub fn media_url(&self) -> Option<Url> {
        self.url.as_deref().and_then(parse_media_url)
    }

    /// "Title - Artist", skipping the artist when it is the sentinel.
    pub fn label(&self) -> String {
        if self.artist == UNKNOWN {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artist)
        }
    }
}

/// Parse a candidate media URL, accepting only http and https with a host.
pub fn parse_media_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    let web = matches!(url.scheme(), "http" | "https");
    (web && url.host_str().is_some_and(|h| !h.is_empty())).then_some(url)
}
