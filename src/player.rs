use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The player binary is missing or could not be started.
    #[error("audio player '{program}' could not be started: {reason}")]
    Spawn { program: String, reason: String },
    /// The player ran but failed, typically because no output device exists.
    #[error("audio player exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("playback did not finish within {0}s")]
    Timeout(u64),
}

/// Local audio output. Implementations play a file to completion.
#[async_trait]
pub trait Player: Send + Sync {
    fn describe(&self) -> String;

    async fn play(&self, path: &Path, limit: Duration) -> Result<(), PlayerError>;
}

/// Plays files by running an external command with the file path appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line. Returns None when empty.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("afplay", Vec::new())
        } else {
            Self::new(
                "ffplay",
                ["-nodisp", "-autoexit", "-loglevel", "quiet"]
                    .map(str::to_string)
                    .to_vec(),
            )
        }
    }

    pub fn from_config(command_line: Option<&str>) -> Self {
        command_line
            .and_then(Self::parse)
            .unwrap_or_else(Self::platform_default)
    }
}

#[async_trait]
impl Player for CommandPlayer {
    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    async fn play(&self, path: &Path, limit: Duration) -> Result<(), PlayerError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| PlayerError::Spawn {
            program: self.program.clone(),
            reason: e.to_string(),
        })?;

        let output = timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| PlayerError::Timeout(limit.as_secs()))?
            .map_err(|e| PlayerError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PlayerError::Exit {
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    "(no stderr output)".to_string()
                } else {
                    stderr
                },
            });
        }
        Ok(())
    }
}
