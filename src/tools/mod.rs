use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde_json::json;

mod params;

use params::*;

use crate::config::Config;
use crate::outcome::{Outcome, SuccessReport};
use crate::pipeline::{Pipeline, http_client};
use crate::player::{CommandPlayer, Player};
use crate::status::{ServiceStatus, format_uptime};
use crate::types::Provider;

fn internal(msg: String) -> McpError {
    McpError::internal_error(msg, None)
}

/// Render an outcome as the tool's text content. Failures are flagged as
/// tool errors so clients surface them, but still carry the same JSON body.
fn outcome_result(outcome: Outcome) -> Result<CallToolResult, McpError> {
    let value = outcome
        .to_json()
        .map_err(|e| internal(format!("Serialization error: {e}")))?;
    let text = serde_json::to_string_pretty(&value).map_err(|e| internal(format!("{e}")))?;
    if outcome.is_success() {
        Ok(CallToolResult::success(vec![Content::text(text)]))
    } else {
        Ok(CallToolResult::error(vec![Content::text(text)]))
    }
}

/// Inner shared state (not Clone).
struct ServerState {
    pipeline: Pipeline,
    status: ServiceStatus,
}

#[derive(Clone)]
pub struct MusicServer {
    state: Arc<ServerState>,
    tool_router: ToolRouter<Self>,
}

impl MusicServer {
    pub fn with_player(config: Config, player: Arc<dyn Player>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            state: Arc::new(ServerState {
                pipeline: Pipeline::new(config, player, http_client()?),
                status: ServiceStatus::new(),
            }),
            tool_router: Self::tool_router(),
        })
    }

    fn record(&self, tool: &'static str) {
        self.state.status.record_request();
        tracing::info!(tool, "tool call");
    }

    fn pipeline(&self) -> &Pipeline {
        &self.state.pipeline
    }
}

#[tool_router]
impl MusicServer {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let player = CommandPlayer::from_config(config.player_command.as_deref());
        Self::with_player(config, Arc::new(player))
    }

    #[tool(
        description = "Search for songs by name and/or artist. Returns normalized results and a session_id that play_music and download_music accept in place of a new search."
    )]
    async fn search_music(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.record("search_music");
        let p = params.0;
        outcome_result(self.pipeline().search(Provider::Music, &p.query, p.count).await)
    }

    #[tool(
        description = "Find a song and play it on this machine. Blocks until playback ends; concurrent requests play one after another. If local playback is unavailable the result includes fallback_url for the client to play instead."
    )]
    async fn play_music(&self, params: Parameters<PlayParams>) -> Result<CallToolResult, McpError> {
        self.record("play_music");
        let target = params.0.into_target();
        outcome_result(self.pipeline().play(Provider::Music, &target).await)
    }

    #[tool(
        description = "Find a song and download it to a temporary file without playing it, reporting the file size. The temporary copy is removed afterwards."
    )]
    async fn download_music(
        &self,
        params: Parameters<PlayParams>,
    ) -> Result<CallToolResult, McpError> {
        self.record("download_music");
        let target = params.0.into_target();
        outcome_result(self.pipeline().download(Provider::Music, &target).await)
    }

    #[tool(
        description = "Check whether a stream URL is reachable by fetching its first kilobyte. Reports status, content type, and size."
    )]
    async fn probe_stream(
        &self,
        params: Parameters<ProbeParams>,
    ) -> Result<CallToolResult, McpError> {
        self.record("probe_stream");
        outcome_result(self.pipeline().probe(&params.0.url).await)
    }

    #[tool(
        description = "Search for audiobooks and radio dramas by title. Returns normalized episodes and a session_id for play_audiobook."
    )]
    async fn search_audiobooks(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.record("search_audiobooks");
        let p = params.0;
        outcome_result(
            self.pipeline()
                .search(Provider::Audiobook, &p.query, p.count)
                .await,
        )
    }

    #[tool(
        description = "Find an audiobook episode and play it on this machine. Same playback rules as play_music."
    )]
    async fn play_audiobook(
        &self,
        params: Parameters<PlayParams>,
    ) -> Result<CallToolResult, McpError> {
        self.record("play_audiobook");
        let target = params.0.into_target();
        outcome_result(self.pipeline().play(Provider::Audiobook, &target).await)
    }

    #[tool(
        description = "Suggest songs. With an artist, returns songs found for that artist; otherwise a short list of popular songs."
    )]
    async fn recommend_songs(
        &self,
        params: Parameters<RecommendParams>,
    ) -> Result<CallToolResult, McpError> {
        self.record("recommend_songs");
        outcome_result(self.pipeline().recommend(params.0.artist.as_deref()).await)
    }

    #[tool(description = "Report server uptime, request counts, and playback configuration")]
    async fn music_service_status(&self) -> Result<CallToolResult, McpError> {
        self.record("music_service_status");
        let status = &self.state.status;
        let config = self.pipeline().config();
        let report = SuccessReport::default()
            .with_extra("service", json!("music-mcp"))
            .with_extra("version", json!(env!("CARGO_PKG_VERSION")))
            .with_extra("uptime", json!(format_uptime(status.uptime())))
            .with_extra("total_requests", json!(status.total_requests()))
            .with_extra("last_request", json!(status.last_request()))
            .with_extra("api_key_configured", json!(config.has_music_credential()))
            .with_extra("music_api_url", json!(config.music.url.as_str()))
            .with_extra("audiobook_api_url", json!(config.audiobook.url.as_str()))
            .with_extra("player", json!(self.pipeline().player_description()));
        outcome_result(Outcome::success(report))
    }
}

#[tool_handler]
impl ServerHandler for MusicServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Music and audiobook playback server. Search for songs or audiobooks, play them \
                 on the host's speakers, download them, or probe stream URLs. Every result has \
                 a boolean `success`; failures carry a `kind` and `message`."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests;
