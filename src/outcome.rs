use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::probe::ProbeReport;
use crate::types::ResourceDescriptor;

/// Failure classification reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Blank query, malformed arguments, missing credential. Rejected before any network call.
    InvalidInput,
    Timeout,
    /// Connection failure or non-2xx status on the media fetch.
    NetworkError,
    /// Search endpoint reachable but reported an application-level failure.
    UpstreamError,
    /// Search succeeded but yielded no usable media URL.
    NotFound,
    PlaybackUnavailable,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "InvalidInput",
            Self::Timeout => "Timeout",
            Self::NetworkError => "NetworkError",
            Self::UpstreamError => "UpstreamError",
            Self::NotFound => "NotFound",
            Self::PlaybackUnavailable => "PlaybackUnavailable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed stage failure. Every pipeline stage converts its own errors into this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct PipelineError {
    pub kind: FailureKind,
    pub message: String,
}

impl PipelineError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidInput, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NetworkError, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(FailureKind::UpstreamError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub fn playback_unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::PlaybackUnavailable, message)
    }

    /// Classify a reqwest failure: timeouts always map to `Timeout`,
    /// everything else to `otherwise`.
    pub fn from_reqwest(stage: &str, err: &reqwest::Error, otherwise: FailureKind) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("{stage} timed out: {err}"))
        } else {
            Self::new(otherwise, format!("{stage} failed: {err}"))
        }
    }
}

/// Fields of a successful outcome. Optional fields are omitted from JSON when unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuccessReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<ResourceDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResourceDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_performed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,
    /// Set alongside `fallback_url` when local playback could not happen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_error: Option<PipelineError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SuccessReport {
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn set_file_size(&mut self, bytes: u64) {
        self.file_size_bytes = Some(bytes);
        self.file_size_mb = Some(bytes_to_mb(bytes));
    }
}

/// Terminal result of a tool call: exactly one of success or failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Box<SuccessReport>),
    Failure(PipelineError),
}

impl Outcome {
    pub fn success(report: SuccessReport) -> Self {
        Self::Success(Box::new(report))
    }

    /// Search results, including the empty "not found" case which is not an error.
    pub fn search_results(
        query: &str,
        results: Vec<ResourceDescriptor>,
        session_id: Option<String>,
    ) -> Self {
        let note = if results.is_empty() {
            format!("No results found for '{query}'")
        } else {
            format!("Found {} result(s) for '{query}'", results.len())
        };
        Self::success(
            SuccessReport {
                results: Some(results),
                session_id,
                ..Default::default()
            }
            .with_note(note),
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(e) => Some(e.kind),
        }
    }

    pub fn report(&self) -> Option<&SuccessReport> {
        match self {
            Self::Success(r) => Some(r),
            Self::Failure(_) => None,
        }
    }

    /// Serialize with a `success` discriminator.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Success(report) => {
                let mut value = serde_json::to_value(report)?;
                if let Value::Object(ref mut map) = value {
                    map.insert("success".into(), Value::Bool(true));
                }
                Ok(value)
            }
            Self::Failure(err) => Ok(json!({
                "success": false,
                "kind": err.kind,
                "message": err.message,
            })),
        }
    }
}

impl From<PipelineError> for Outcome {
    fn from(err: PipelineError) -> Self {
        Self::Failure(err)
    }
}

impl From<Result<Outcome, PipelineError>> for Outcome {
    fn from(result: Result<Outcome, PipelineError>) -> Self {
        result.unwrap_or_else(Outcome::Failure)
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_json_has_no_success_fields() {
        let outcome = Outcome::from(PipelineError::not_found("no url"));
        let json = outcome.to_json().unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "NotFound");
        assert_eq!(json["message"], "no url");
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn empty_search_is_success_with_note() {
        let outcome = Outcome::search_results("nothing", Vec::new(), None);
        assert!(outcome.is_success());
        let json = outcome.to_json().unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["results"], json!([]));
        assert!(json["note"].as_str().unwrap().contains("No results"));
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn extra_fields_flatten_into_success() {
        let mut report = SuccessReport::default().with_extra("uptime", json!("0h 1m"));
        report.set_file_size(3 * 1024 * 1024 + 100_000);
        let json = Outcome::success(report).to_json().unwrap();
        assert_eq!(json["uptime"], "0h 1m");
        assert_eq!(json["file_size_mb"], 3.1);
        assert!(json.get("descriptor").is_none());
    }
}
