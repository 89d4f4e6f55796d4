use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, Url};
use tempfile::NamedTempFile;

use crate::outcome::{FailureKind, PipelineError};
use crate::types::ResourceDescriptor;

pub const TEMP_PREFIX: &str = "music-mcp-";

const KNOWN_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "wav", "flac", "ogg"];

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_bytes: Option<u64>,
    pub temp_dir: PathBuf,
}

/// A downloaded media body in a scoped temporary file. The file is removed
/// when this value is dropped or closed.
#[derive(Debug)]
pub struct FetchedMedia {
    file: NamedTempFile,
    size: u64,
}

impl FetchedMedia {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size
    }

    /// Delete the file now, surfacing any removal error.
    pub fn close(self) -> std::io::Result<()> {
        self.file.close()
    }
}

/// Stream a descriptor's media URL into a fresh temporary file.
pub async fn fetch(
    client: &Client,
    descriptor: &ResourceDescriptor,
    opts: &FetchOptions,
) -> Result<FetchedMedia, PipelineError> {
    let url = descriptor.media_url().ok_or_else(|| {
        PipelineError::not_found(format!("'{}' has no playable URL", descriptor.title))
    })?;

    let mut resp = client
        .get(url.clone())
        .timeout(opts.timeout)
        .send()
        .await
        .map_err(|e| PipelineError::from_reqwest("media download", &e, FailureKind::NetworkError))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(PipelineError::network(format!(
            "media download returned HTTP {status} for {url}"
        )));
    }

    if let (Some(max), Some(len)) = (opts.max_bytes, resp.content_length())
        && len > max
    {
        return Err(PipelineError::network(format!(
            "media is {len} bytes, over the {max} byte download limit"
        )));
    }

    // Dropping `file` on any early return below removes the partial download.
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&media_suffix(&url))
        .tempfile_in(&opts.temp_dir)
        .map_err(|e| {
            PipelineError::network(format!(
                "could not create temporary file in {}: {e}",
                opts.temp_dir.display()
            ))
        })?;

    let mut size: u64 = 0;
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| PipelineError::from_reqwest("media download", &e, FailureKind::NetworkError))?
    {
        size += chunk.len() as u64;
        if let Some(max) = opts.max_bytes
            && size > max
        {
            return Err(PipelineError::network(format!(
                "media exceeded the {max} byte download limit"
            )));
        }
        file.write_all(&chunk)
            .map_err(|e| PipelineError::network(format!("writing media to disk failed: {e}")))?;
    }
    file.flush()
        .map_err(|e| PipelineError::network(format!("writing media to disk failed: {e}")))?;

    if size == 0 {
        return Err(PipelineError::network(format!(
            "media download from {url} returned an empty body"
        )));
    }

    tracing::debug!(path = %file.path().display(), size, "media downloaded");
    Ok(FetchedMedia { file, size })
}

/// File suffix from the URL path's extension, `.mp3` when unknown.
fn media_suffix(url: &Url) -> String {
    let ext = Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| KNOWN_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or_else(|| "mp3".to_string());
    format!(".{ext}")
}
