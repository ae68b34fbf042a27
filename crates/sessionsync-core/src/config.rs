use crate::error::SyncError;
use crate::paths::SyncPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote URL of the shared repository.
    pub repo: String,
    pub repo_path: PathBuf,
    pub device: String,
}

impl SyncConfig {
    pub fn new(repo: impl Into<String>, repo_path: PathBuf, device: &str) -> Result<Self, SyncError> {
        Ok(Self {
            repo: repo.into(),
            repo_path,
            device: validated_device_id(device)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfigStore {
    paths: SyncPaths,
}

impl Default for SyncConfigStore {
    fn default() -> Self {
        Self {
            paths: SyncPaths::detect(),
        }
    }
}

impl SyncConfigStore {
    pub fn new(paths: SyncPaths) -> Self {
        Self { paths }
    }

    /// Missing or unreadable config means "not initialized".
    pub fn load(&self) -> Option<SyncConfig> {
        let data = std::fs::read(&self.paths.config_path).ok()?;
        serde_json::from_slice(&data).ok()
    }

    pub fn require(&self) -> Result<SyncConfig, SyncError> {
        self.load().ok_or(SyncError::NotInitialized)
    }

    pub fn save(&self, config: &SyncConfig) -> Result<(), SyncError> {
        self.paths
            .ensure_runtime_dir()
            .map_err(|e| SyncError::io(&self.paths.runtime_directory, e))?;
        let mut payload = serde_json::to_vec_pretty(config)?;
        payload.push(b'\n');
        std::fs::write(&self.paths.config_path, payload)
            .map_err(|e| SyncError::io(&self.paths.config_path, e))
    }

    pub fn paths(&self) -> &SyncPaths {
        &self.paths
    }
}

/// Device ids name a directory under `devices/`, so they must be one plain segment.
pub fn validated_device_id(raw: &str) -> Result<String, SyncError> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !trimmed.contains(['/', '\\'])
        && !trimmed.chars().any(char::is_control);
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(SyncError::InvalidDeviceId(raw.to_string()))
    }
}

/// Best-effort host name used as the default device id.
pub fn default_device_id() -> String {
    for var in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(value) = std::env::var(var) {
            if let Ok(id) = validated_device_id(&value) {
                return id;
            }
        }
    }

    std::fs::read_to_string("/etc/hostname")
        .ok()
        .and_then(|value| validated_device_id(&value).ok())
        .unwrap_or_else(|| String::from("device"))
}
