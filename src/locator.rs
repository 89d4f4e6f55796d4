use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;

use crate::config::{MUSIC_API_KEY_ENV, SearchEndpoint};
use crate::outcome::{FailureKind, PipelineError};
use crate::shapes;
use crate::types::{Provider, Query, ResourceDescriptor};

/// The audiobook endpoint rejects non-browser agents.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

/// Resolve a query to normalized descriptors. An empty list means "not found".
pub async fn locate(
    client: &Client,
    endpoint: &SearchEndpoint,
    query: &Query,
) -> Result<Vec<ResourceDescriptor>, PipelineError> {
    let request = match endpoint.provider {
        Provider::Music => {
            let key = endpoint.api_key.as_deref().ok_or_else(|| {
                PipelineError::invalid_input(format!("{MUSIC_API_KEY_ENV} is not configured"))
            })?;
            let count = query.count().to_string();
            client.post(endpoint.url.clone()).query(&[
                ("key", key),
                ("msg", query.text()),
                ("n", count.as_str()),
            ])
        }
        Provider::Audiobook => client
            .get(endpoint.url.clone())
            .query(&[("name", query.text())])
            .header(USER_AGENT, BROWSER_UA)
            .header(ACCEPT, "application/json"),
    };

    tracing::info!(provider = %endpoint.provider, query = query.text(), "searching");

    let resp = request
        .timeout(endpoint.timeout)
        .send()
        .await
        .map_err(|e| PipelineError::from_reqwest("search request", &e, FailureKind::NetworkError))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(PipelineError::upstream(format!(
            "search endpoint returned HTTP {status}"
        )));
    }

    let payload: Value = resp.json().await.map_err(|e| {
        PipelineError::from_reqwest("decoding search response", &e, FailureKind::UpstreamError)
    })?;

    let mut results = interpret_payload(endpoint.provider, &payload)?;
    results.truncate(query.count() as usize);
    Ok(results)
}

/// Check application-level status fields, then normalize.
fn interpret_payload(
    provider: Provider,
    payload: &Value,
) -> Result<Vec<ResourceDescriptor>, PipelineError> {
    if let Some(code) = payload.get("code").and_then(Value::as_i64)
        && code != 200
    {
        let message = ["msg", "message", "error"]
            .iter()
            .find_map(|k| payload.get(*k).and_then(Value::as_str))
            .unwrap_or("no message");
        return Err(PipelineError::upstream(format!(
            "search endpoint reported code {code}: {message}"
        )));
    }

    if provider == Provider::Audiobook
        && payload.get("status").and_then(Value::as_i64) == Some(0)
    {
        return Ok(Vec::new());
    }

    Ok(shapes::normalize(payload))
}
