use crate::config::SyncConfig;
use crate::models::{DeviceStatus, RepoStatusInfo};
use crate::paths::{device_sessions_dir, devices_dir, SyncEnvironment};
use crate::scanner::scan_sessions;
use crate::skills::SkillResolver;
use crate::transport::Repository;
use std::fs;
use std::path::Path;
use tracing::debug;

pub fn status(
    config: &SyncConfig,
    environment: &SyncEnvironment,
    transport: &dyn Repository,
) -> RepoStatusInfo {
    let repo = config.repo_path.as_path();
    let tree = transport
        .status(repo)
        .map_err(|error| debug!(%error, "working tree status unavailable"))
        .ok();

    RepoStatusInfo {
        repo_path: config.repo_path.clone(),
        device: config.device.clone(),
        tree,
        last_commit: transport.last_commit(repo),
        devices: device_statuses(repo),
        local_sessions: scan_sessions(&environment.projects_directory).len(),
        skills: SkillResolver::new(environment.clone()).skills_status(repo),
    }
}

pub fn device_statuses(repo: &Path) -> Vec<DeviceStatus> {
    let Ok(entries) = fs::read_dir(devices_dir(repo)) else {
        return Vec::new();
    };

    let mut devices: Vec<DeviceStatus> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let sessions_dir = device_sessions_dir(repo, &name);
            if !sessions_dir.is_dir() {
                return None;
            }
            let sessions = scan_sessions(&sessions_dir);
            Some(DeviceStatus {
                session_count: sessions.len(),
                total_bytes: sessions.iter().map(|session| session.size).sum(),
                last_activity: sessions.iter().map(|session| session.modified).max(),
                name,
            })
        })
        .collect();
    devices.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
    devices
}

pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < KIB * KIB {
        format!("{:.1} KB", value / KIB)
    } else {
        format!("{:.1} MB", value / (KIB * KIB))
    }
}
