//! Search → (probe) → fetch → play, reported as a single [`Outcome`].

use std::sync::Arc;

use reqwest::Client;
use serde_json::{Value, json};

use crate::config::Config;
use crate::locator;
use crate::outcome::{Outcome, PipelineError, SuccessReport};
use crate::playback::{Invocation, PlaybackCoordinator, PlaybackStatus, Stage};
use crate::player::Player;
use crate::probe::{self, ProbeReport};
use crate::session::SessionRegistry;
use crate::types::{MAX_RESULTS, Provider, Query, ResourceDescriptor, parse_media_url};

pub const USER_AGENT: &str = concat!("music-mcp/", env!("CARGO_PKG_VERSION"));

/// Offered when no artist is given or an artist search turns up nothing.
pub const DEFAULT_RECOMMENDATIONS: &[&str] = &[
    "周杰伦 七里香",
    "邓紫棋 光年之外",
    "林俊杰 不为谁而作的歌",
    "Taylor Swift Love Story",
];

/// What a play/download call should act on: a fresh query, or one result of
/// an earlier search session.
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub query: Option<String>,
    pub session_id: Option<String>,
    pub index: Option<usize>,
    /// Probe the media URL before downloading.
    pub validate: bool,
}

impl Target {
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            query: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn session(id: impl Into<String>, index: usize) -> Self {
        Self {
            session_id: Some(id.into()),
            index: Some(index),
            ..Default::default()
        }
    }
}

/// Shared client for search, probe, and fetch. Per-request timeouts come from [`Config`].
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder().user_agent(USER_AGENT).build()
}

pub struct Pipeline {
    http: Client,
    config: Config,
    coordinator: PlaybackCoordinator,
    sessions: SessionRegistry,
}

impl Pipeline {
    pub fn new(config: Config, player: Arc<dyn Player>, http: Client) -> Self {
        let coordinator =
            PlaybackCoordinator::new(player, config.fetch.clone(), config.max_playback);
        Self {
            http,
            config,
            coordinator,
            sessions: SessionRegistry::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn player_description(&self) -> String {
        self.coordinator.player_description()
    }

    /// Search only. An empty result list is a success with a "not found" note.
    pub async fn search(&self, provider: Provider, raw_query: &str, count: Option<u32>) -> Outcome {
        let mut inv = Invocation::start("search");
        let result = self.run_search(provider, raw_query, count, &mut inv).await;
        conclude(&mut inv, result)
    }

    /// Resolve, download, and play locally. Playback failure is reported as a
    /// success with `playback_performed: false` and a `fallback_url`.
    pub async fn play(&self, provider: Provider, target: &Target) -> Outcome {
        let mut inv = Invocation::start("play");
        let result = self.run_play(provider, target, &mut inv).await;
        conclude(&mut inv, result)
    }

    /// Resolve and download without playing, reporting the file size.
    pub async fn download(&self, provider: Provider, target: &Target) -> Outcome {
        let mut inv = Invocation::start("download");
        let result = self.run_download(provider, target, &mut inv).await;
        conclude(&mut inv, result)
    }

    /// Probe a URL for reachability. An unreachable URL is still a success.
    pub async fn probe(&self, raw_url: &str) -> Outcome {
        let Some(url) = parse_media_url(raw_url) else {
            return PipelineError::invalid_input(format!("'{}' is not an http(s) URL", raw_url.trim()))
                .into();
        };
        let report = probe::probe(&self.http, &url, self.config.probe_timeout).await;
        let note = if report.accessible {
            "Stream is reachable"
        } else {
            "Stream is not reachable"
        };
        Outcome::success(
            SuccessReport {
                probe: Some(report),
                ..Default::default()
            }
            .with_note(note),
        )
    }

    /// Songs by `artist` when given and found, otherwise a fixed list.
    pub async fn recommend(&self, artist: Option<&str>) -> Outcome {
        let artist = artist.map(str::trim).filter(|a| !a.is_empty());
        if let Some(artist) = artist {
            match self.search(Provider::Music, artist, Some(MAX_RESULTS / 2)).await {
                Outcome::Success(report)
                    if report.results.as_ref().is_some_and(|r| !r.is_empty()) =>
                {
                    let mut report = *report;
                    let labels = recommendation_labels(report.results.as_deref().unwrap_or_default());
                    report.extra.insert("recommendations".into(), labels);
                    report.note = Some(format!("Songs by {artist}"));
                    report.extra.insert("source".into(), json!("search"));
                    return Outcome::success(report);
                }
                Outcome::Failure(e) => {
                    tracing::info!(artist, error = %e, "artist search failed, using defaults");
                }
                Outcome::Success(_) => {}
            }
        }
        Outcome::success(
            SuccessReport::default()
                .with_extra("recommendations", json!(DEFAULT_RECOMMENDATIONS))
                .with_extra("source", json!("default"))
                .with_note("Popular songs; pass one to play_music"),
        )
    }

    async fn run_search(
        &self,
        provider: Provider,
        raw_query: &str,
        count: Option<u32>,
        inv: &mut Invocation,
    ) -> Result<Outcome, PipelineError> {
        let query = Query::new(raw_query, count)?;
        inv.advance(Stage::Searching);
        let results = locator::locate(&self.http, self.config.endpoint(provider), &query).await?;
        let session_id = self.sessions.insert(provider, query.text(), results.clone());
        Ok(Outcome::search_results(query.text(), results, Some(session_id)))
    }

    async fn run_play(
        &self,
        provider: Provider,
        target: &Target,
        inv: &mut Invocation,
    ) -> Result<Outcome, PipelineError> {
        let descriptor = self.resolve(provider, target, inv).await?;
        let probe = self.validate(&descriptor, target, inv).await;
        let report = self.coordinator.play(&self.http, &descriptor, inv).await?;

        let label = report.descriptor.label();
        let mut out = SuccessReport {
            descriptor: Some(report.descriptor.clone()),
            probe,
            ..Default::default()
        };
        out.set_file_size(report.file_size_bytes);
        if let Some(secs) = report.duration_secs {
            out.extra.insert("duration_secs".into(), json!(secs));
        }
        let out = match report.status {
            PlaybackStatus::Played => {
                out.playback_performed = Some(true);
                out.with_note(format!("Played '{label}'"))
            }
            PlaybackStatus::Unavailable(reason) => {
                out.playback_performed = Some(false);
                out.fallback_url = report.descriptor.url.clone();
                out.playback_error = Some(PipelineError::playback_unavailable(reason));
                out.with_note(format!(
                    "Found '{label}' but it could not be played on this machine; \
                     play it from fallback_url instead"
                ))
            }
        };
        Ok(Outcome::success(out))
    }

    async fn run_download(
        &self,
        provider: Provider,
        target: &Target,
        inv: &mut Invocation,
    ) -> Result<Outcome, PipelineError> {
        let descriptor = self.resolve(provider, target, inv).await?;
        let probe = self.validate(&descriptor, target, inv).await;
        let report = self.coordinator.download(&self.http, &descriptor, inv).await?;

        let mut out = SuccessReport {
            descriptor: Some(report.descriptor.clone()),
            probe,
            ..Default::default()
        };
        out.set_file_size(report.file_size_bytes);
        if let Some(secs) = report.duration_secs {
            out.extra.insert("duration_secs".into(), json!(secs));
        }
        let note = format!(
            "Downloaded '{}' ({} MB); the temporary copy was removed",
            report.descriptor.label(),
            out.file_size_mb.unwrap_or_default()
        );
        Ok(Outcome::success(out.with_note(note)))
    }

    async fn resolve(
        &self,
        provider: Provider,
        target: &Target,
        inv: &mut Invocation,
    ) -> Result<ResourceDescriptor, PipelineError> {
        let session_id = target
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let descriptor = match session_id {
            Some(id) => self.sessions.pick(id, target.index.unwrap_or(0), provider)?,
            None => {
                let query = Query::new(target.query.as_deref().unwrap_or(""), Some(1))?;
                inv.advance(Stage::Searching);
                let results =
                    locator::locate(&self.http, self.config.endpoint(provider), &query).await?;
                results.into_iter().next().ok_or_else(|| {
                    PipelineError::not_found(format!("No results found for '{}'", query.text()))
                })?
            }
        };

        if !descriptor.is_playable() {
            return Err(PipelineError::not_found(format!(
                "'{}' was found but has no playable URL",
                descriptor.label()
            )));
        }
        Ok(descriptor)
    }

    async fn validate(
        &self,
        descriptor: &ResourceDescriptor,
        target: &Target,
        inv: &mut Invocation,
    ) -> Option<ProbeReport> {
        if !target.validate {
            return None;
        }
        let url = descriptor.media_url()?;
        inv.advance(Stage::Validating);
        let report = probe::probe(&self.http, &url, self.config.probe_timeout).await;
        if !report.accessible {
            tracing::warn!(%url, status = ?report.status, "media URL failed probe, fetching anyway");
        }
        Some(report)
    }
}

fn conclude(inv: &mut Invocation, result: Result<Outcome, PipelineError>) -> Outcome {
    match result {
        Ok(outcome) => {
            inv.finish();
            outcome
        }
        Err(e) => Outcome::Failure(inv.fail(e)),
    }
}

/// Search results rendered for the `recommendations` field.
fn recommendation_labels(results: &[ResourceDescriptor]) -> Value {
    json!(results.iter().map(ResourceDescriptor::label).collect::<Vec<_>>())
}
