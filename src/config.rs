use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::fetch::FetchOptions;
use crate::types::Provider;

pub const MUSIC_API_KEY_ENV: &str = "MUSIC_API_KEY";
pub const MUSIC_API_URL_ENV: &str = "MUSIC_API_URL";
pub const AUDIOBOOK_API_URL_ENV: &str = "AUDIOBOOK_API_URL";
pub const PLAYER_CMD_ENV: &str = "MUSIC_PLAYER_CMD";
pub const TEMP_DIR_ENV: &str = "MUSIC_MCP_TEMP_DIR";
pub const SEARCH_TIMEOUT_ENV: &str = "MUSIC_SEARCH_TIMEOUT_SECS";
pub const FETCH_TIMEOUT_ENV: &str = "MUSIC_FETCH_TIMEOUT_SECS";
pub const MAX_DOWNLOAD_MB_ENV: &str = "MUSIC_MAX_DOWNLOAD_MB";
pub const LOG_FILE_ENV: &str = "MUSIC_MCP_LOG_FILE";

pub const DEFAULT_MUSIC_API_URL: &str = "https://api.yaohud.cn/api/music/wy";
pub const DEFAULT_AUDIOBOOK_API_URL: &str = "https://www.hhlqilongzhu.cn/api/ximalaya/ximalaya.php";

const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_AUDIOBOOK_TIMEOUT_SECS: u64 = 15;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_DOWNLOAD_MB: u64 = 200;
const DEFAULT_MAX_PLAYBACK_SECS: u64 = 15 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// One search provider endpoint.
#[derive(Debug, Clone)]
pub struct SearchEndpoint {
    pub provider: Provider,
    pub url: Url,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub music: SearchEndpoint,
    pub audiobook: SearchEndpoint,
    pub probe_timeout: Duration,
    pub fetch: FetchOptions,
    /// Playback cap when the media duration can't be determined.
    pub max_playback: Duration,
    /// Overrides the platform default player, e.g. `mpv --no-video`.
    pub player_command: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let search_timeout = parse_secs(SEARCH_TIMEOUT_ENV, get(SEARCH_TIMEOUT_ENV))?;
        let fetch_timeout = parse_secs(FETCH_TIMEOUT_ENV, get(FETCH_TIMEOUT_ENV))?
            .unwrap_or(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS));
        let max_download_mb = match get(MAX_DOWNLOAD_MB_ENV) {
            Some(raw) => parse_u64(MAX_DOWNLOAD_MB_ENV, &raw)?,
            None => DEFAULT_MAX_DOWNLOAD_MB,
        };

        let max_bytes = match max_download_mb {
            0 => None,
            mb => Some(mb.checked_mul(1024 * 1024).ok_or_else(|| ConfigError::Invalid {
                var: MAX_DOWNLOAD_MB_ENV,
                reason: format!("{mb} MB is too large"),
            })?),
        };

        let temp_dir = get(TEMP_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        Ok(Self {
            music: SearchEndpoint {
                provider: Provider::Music,
                url: parse_url(
                    MUSIC_API_URL_ENV,
                    get(MUSIC_API_URL_ENV).as_deref().unwrap_or(DEFAULT_MUSIC_API_URL),
                )?,
                api_key: get(MUSIC_API_KEY_ENV),
                timeout: search_timeout.unwrap_or(Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS)),
            },
            audiobook: SearchEndpoint {
                provider: Provider::Audiobook,
                url: parse_url(
                    AUDIOBOOK_API_URL_ENV,
                    get(AUDIOBOOK_API_URL_ENV)
                        .as_deref()
                        .unwrap_or(DEFAULT_AUDIOBOOK_API_URL),
                )?,
                api_key: None,
                timeout: search_timeout
                    .unwrap_or(Duration::from_secs(DEFAULT_AUDIOBOOK_TIMEOUT_SECS)),
            },
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            fetch: FetchOptions {
                timeout: fetch_timeout,
                max_bytes,
                temp_dir,
            },
            max_playback: Duration::from_secs(DEFAULT_MAX_PLAYBACK_SECS),
            player_command: get(PLAYER_CMD_ENV),
            log_file: get(LOG_FILE_ENV).map(PathBuf::from),
        })
    }

    pub fn endpoint(&self, provider: Provider) -> &SearchEndpoint {
        match provider {
            Provider::Music => &self.music,
            Provider::Audiobook => &self.audiobook,
        }
    }

    pub fn has_music_credential(&self) -> bool {
        self.music.api_key.is_some()
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("'{raw}' is not a URL: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("'{raw}' must use http or https"),
        });
    }
    Ok(url)
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        var,
        reason: format!("'{raw}' is not a non-negative integer"),
    })
}

fn parse_secs(var: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(raw) => match parse_u64(var, &raw)? {
            0 => Err(ConfigError::Invalid {
                var,
                reason: "timeout must be at least 1 second".into(),
            }),
            secs => Ok(Some(Duration::from_secs(secs))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.music.url.as_str(), DEFAULT_MUSIC_API_URL);
        assert_eq!(cfg.music.timeout, Duration::from_secs(10));
        assert_eq!(cfg.audiobook.timeout, Duration::from_secs(15));
        assert_eq!(cfg.fetch.timeout, Duration::from_secs(30));
        assert_eq!(cfg.fetch.max_bytes, Some(200 * 1024 * 1024));
        assert!(!cfg.has_music_credential());
        assert!(cfg.player_command.is_none());
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let cfg = config_from(&[(MUSIC_API_KEY_ENV, "   ")]).unwrap();
        assert!(!cfg.has_music_credential());
        let cfg = config_from(&[(MUSIC_API_KEY_ENV, "k3y")]).unwrap();
        assert_eq!(cfg.music.api_key.as_deref(), Some("k3y"));
    }

    #[test]
    fn endpoint_urls_are_trimmed_and_validated() {
        let cfg = config_from(&[(MUSIC_API_URL_ENV, " http://127.0.0.1:8080/api ")]).unwrap();
        assert_eq!(cfg.music.url.as_str(), "http://127.0.0.1:8080/api");
        assert!(config_from(&[(MUSIC_API_URL_ENV, "ws://x")]).is_err());
        assert!(config_from(&[(AUDIOBOOK_API_URL_ENV, "nope")]).is_err());
    }

    #[test]
    fn numeric_overrides() {
        let cfg = config_from(&[
            (SEARCH_TIMEOUT_ENV, "3"),
            (FETCH_TIMEOUT_ENV, "60"),
            (MAX_DOWNLOAD_MB_ENV, "0"),
        ])
        .unwrap();
        assert_eq!(cfg.music.timeout, Duration::from_secs(3));
        assert_eq!(cfg.audiobook.timeout, Duration::from_secs(3));
        assert_eq!(cfg.fetch.timeout, Duration::from_secs(60));
        assert_eq!(cfg.fetch.max_bytes, None);
        assert!(config_from(&[(SEARCH_TIMEOUT_ENV, "0")]).is_err());
        assert!(config_from(&[(FETCH_TIMEOUT_ENV, "soon")]).is_err());
    }

    #[test]
    fn oversized_download_cap_is_rejected() {
        let err = config_from(&[(MAX_DOWNLOAD_MB_ENV, "99999999999999")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: MAX_DOWNLOAD_MB_ENV, .. }));
        let cfg = config_from(&[(MAX_DOWNLOAD_MB_ENV, "17592186044415")]).unwrap();
        assert_eq!(cfg.fetch.max_bytes, Some(17592186044415 * 1024 * 1024));
    }
}
