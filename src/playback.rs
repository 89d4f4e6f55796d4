use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;

use crate::audio;
use crate::fetch::{self, FetchOptions, FetchedMedia};
use crate::outcome::PipelineError;
use crate::player::Player;
use crate::types::ResourceDescriptor;

/// Extra time allowed past the media's own duration before the player is killed.
const PLAYBACK_SLACK: Duration = Duration::from_secs(30);

/// Upper bound on any single playback, whatever duration the provider claims.
const PLAYBACK_CEILING: Duration = Duration::from_secs(6 * 60 * 60);

/// Per-invocation pipeline stage, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Searching,
    Validating,
    Fetching,
    Playing,
    Failed,
}

/// Tracks one invocation's progress through the stages.
#[derive(Debug)]
pub struct Invocation {
    tool: &'static str,
    stage: Stage,
}

impl Invocation {
    pub fn start(tool: &'static str) -> Self {
        Self {
            tool,
            stage: Stage::Idle,
        }
    }

    #[cfg(test)]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, next: Stage) {
        tracing::debug!(tool = self.tool, from = ?self.stage, to = ?next, "stage transition");
        self.stage = next;
    }

    /// Record a failure on the way out, passing the error through.
    pub fn fail(&mut self, err: PipelineError) -> PipelineError {
        tracing::warn!(tool = self.tool, stage = ?self.stage, kind = %err.kind, "{}", err.message);
        self.advance(Stage::Failed);
        err
    }

    pub fn finish(&mut self) {
        self.advance(Stage::Idle);
    }
}

/// How local playback went once the media was downloaded.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackStatus {
    Played,
    /// Soft failure: no device, no player, or the player failed.
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    pub descriptor: ResourceDescriptor,
    pub file_size_bytes: u64,
    pub duration_secs: Option<f64>,
    pub status: PlaybackStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadReport {
    pub descriptor: ResourceDescriptor,
    pub file_size_bytes: u64,
    pub duration_secs: Option<f64>,
}

/// Owns the single local audio device. At most one fetch-and-play runs at a time.
pub struct PlaybackCoordinator {
    device: Mutex<()>,
    player: Arc<dyn Player>,
    fetch: FetchOptions,
    max_playback: Duration,
}

impl PlaybackCoordinator {
    pub fn new(player: Arc<dyn Player>, fetch: FetchOptions, max_playback: Duration) -> Self {
        Self {
            device: Mutex::new(()),
            player,
            fetch,
            max_playback,
        }
    }

    pub fn player_description(&self) -> String {
        self.player.describe()
    }

    /// Download and play under the device lock. The temporary file is gone when
    /// this returns, whatever the result.
    pub async fn play(
        &self,
        http: &Client,
        descriptor: &ResourceDescriptor,
        invocation: &mut Invocation,
    ) -> Result<PlaybackReport, PipelineError> {
        let _device = self.device.lock().await;

        invocation.advance(Stage::Fetching);
        let media = fetch::fetch(http, descriptor, &self.fetch).await?;
        let duration_secs = media_duration(&media, descriptor).await;

        invocation.advance(Stage::Playing);
        let limit = self.playback_limit(duration_secs);
        let played = self.player.play(media.path(), limit).await;

        let file_size_bytes = media.size_bytes();
        discard(media);

        let status = match played {
            Ok(()) => PlaybackStatus::Played,
            Err(e) => {
                tracing::warn!(title = %descriptor.title, error = %e, "local playback unavailable");
                PlaybackStatus::Unavailable(e.to_string())
            }
        };
        Ok(PlaybackReport {
            descriptor: descriptor.clone(),
            file_size_bytes,
            duration_secs,
            status,
        })
    }

    /// Download under the device lock without playing, report the size, and delete.
    pub async fn download(
        &self,
        http: &Client,
        descriptor: &ResourceDescriptor,
        invocation: &mut Invocation,
    ) -> Result<DownloadReport, PipelineError> {
        let _device = self.device.lock().await;

        invocation.advance(Stage::Fetching);
        let media = fetch::fetch(http, descriptor, &self.fetch).await?;
        let report = DownloadReport {
            descriptor: descriptor.clone(),
            file_size_bytes: media.size_bytes(),
            duration_secs: media_duration(&media, descriptor).await,
        };
        discard(media);
        Ok(report)
    }

    /// Known duration plus slack, capped at [`PLAYBACK_CEILING`]. Unknown or
    /// unrepresentable durations get `max_playback`.
    fn playback_limit(&self, duration_secs: Option<f64>) -> Duration {
        duration_secs
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .and_then(|d| d.checked_add(PLAYBACK_SLACK))
            .map_or(self.max_playback, |limit| limit.min(PLAYBACK_CEILING))
    }
}

/// Prefer the duration measured from the file over the provider's claim.
/// Measuring may walk every packet, so it runs on the blocking pool.
async fn media_duration(media: &FetchedMedia, descriptor: &ResourceDescriptor) -> Option<f64> {
    let path = media.path().to_path_buf();
    match tokio::task::spawn_blocking(move || audio::probe_duration(&path)).await {
        Ok(Ok(secs)) => Some(secs),
        Ok(Err(e)) => {
            tracing::debug!(path = %media.path().display(), error = %e, "could not measure duration");
            descriptor.duration_secs
        }
        Err(e) => {
            tracing::warn!(error = %e, "duration task failed");
            descriptor.duration_secs
        }
    }
}

fn discard(media: FetchedMedia) {
    let path = media.path().to_path_buf();
    if let Err(e) = media.close() {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary media file");
    }
}
