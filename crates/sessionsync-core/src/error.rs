use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("git {command} failed: {output}")]
    Transport { command: String, output: String },

    #[error("Not initialized: run `sessionsync init --repo <url>` first")]
    NotInitialized,

    #[error("Invalid device id {0:?}: must be a single non-empty path segment")]
    InvalidDeviceId(String),

    #[error("Detected {0} potential secret(s); push blocked")]
    SecretsDetected(usize),
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn transport(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Transport {
            command: command.into(),
            output: output.into(),
        }
    }
}
