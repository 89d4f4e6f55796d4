use schemars::JsonSchema;
use serde::Deserialize;

use crate::pipeline::Target;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SearchParams {
    #[schemars(description = "Song name, artist, or both (e.g. 'Love Story Taylor Swift')")]
    pub query: String,
    #[schemars(description = "Number of results to return (1-10, default 1)")]
    pub count: Option<u32>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PlayParams {
    #[schemars(description = "What to search for and play. Ignored when session_id is given")]
    pub query: Option<String>,
    #[schemars(
        description = "session_id returned by an earlier search; plays one of its results instead of searching again"
    )]
    pub session_id: Option<String>,
    #[schemars(description = "Zero-based index into the session's results (default 0)")]
    pub index: Option<usize>,
    #[schemars(description = "Probe the media URL before downloading (default false)")]
    pub validate: Option<bool>,
}

impl PlayParams {
    pub(crate) fn into_target(self) -> Target {
        Target {
            query: self.query,
            session_id: self.session_id,
            index: self.index,
            validate: self.validate.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProbeParams {
    #[schemars(description = "http(s) URL of the stream to check")]
    pub url: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct RecommendParams {
    #[schemars(description = "Artist to base recommendations on. Omit for a popular list")]
    pub artist: Option<String>,
}
