use crate::cache::CacheState;
use crate::error::SyncError;
use crate::fs_ops::{copy_dir_recursive, copy_file, modified_time};
use crate::manifest::Manifest;
use crate::models::{SessionArtifact, SessionPullReport, SessionPushReport};
use crate::paths::{
    device_manifest_path, device_sessions_dir, devices_dir, SyncEnvironment, SESSIONS_INDEX_FILE,
};
use crate::scanner::scan_sessions;
use crate::transport::Repository;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A session selected for push, with every file that will land in the repository.
#[derive(Debug, Clone)]
pub struct PlannedSessionCopy {
    pub artifact: SessionArtifact,
    /// `devices/<device>/sessions/<projectDir>` inside the repository.
    pub destination_dir: PathBuf,
    /// The local project's `sessions-index.json`, when it exists.
    pub index_file: Option<PathBuf>,
}

impl PlannedSessionCopy {
    /// `(source, destination)` pairs for every file this copy writes.
    pub fn files(&self) -> Vec<(PathBuf, PathBuf)> {
        let session_id = &self.artifact.session_id;
        let mut files = vec![(
            self.artifact.path.clone(),
            self.destination_dir.join(format!("{session_id}.jsonl")),
        )];

        if let Some(aux) = &self.artifact.aux_directory {
            let aux_destination = self.destination_dir.join(session_id);
            for entry in WalkDir::new(aux)
                .follow_links(true)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
            {
                if let Ok(relative) = entry.path().strip_prefix(aux) {
                    files.push((entry.path().to_path_buf(), aux_destination.join(relative)));
                }
            }
        }

        if let Some(index) = &self.index_file {
            files.push((index.clone(), self.destination_dir.join(SESSIONS_INDEX_FILE)));
        }
        files
    }
}

/// The outcome of consulting the manifest, before anything is written.
#[derive(Debug, Clone)]
pub struct SessionPushPlan {
    pub device: String,
    pub copies: Vec<PlannedSessionCopy>,
    pub skipped: usize,
    manifest: Manifest,
}

impl SessionPushPlan {
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    pub fn files(&self) -> Vec<(PathBuf, PathBuf)> {
        self.copies.iter().flat_map(PlannedSessionCopy::files).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SessionSync {
    environment: SyncEnvironment,
}

impl SessionSync {
    pub fn new(environment: SyncEnvironment) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> &SyncEnvironment {
        &self.environment
    }

    pub fn local_sessions(&self) -> Vec<SessionArtifact> {
        scan_sessions(&self.environment.projects_directory)
    }

    pub fn plan_push(&self, repo: &Path, device: &str) -> SessionPushPlan {
        let manifest = Manifest::load(&device_manifest_path(repo, device));
        let target_root = device_sessions_dir(repo, device);

        let mut copies = Vec::new();
        let mut skipped = 0;
        for artifact in self.local_sessions() {
            let key = artifact.key();
            if manifest.should_skip(&key, artifact.modified) {
                debug!(%key, "session unchanged since last push");
                skipped += 1;
                continue;
            }

            let index = self
                .environment
                .projects_directory
                .join(&artifact.project_dir)
                .join(SESSIONS_INDEX_FILE);
            copies.push(PlannedSessionCopy {
                destination_dir: target_root.join(&artifact.project_dir),
                index_file: index.is_file().then_some(index),
                artifact,
            });
        }

        SessionPushPlan {
            device: device.to_string(),
            copies,
            skipped,
            manifest,
        }
    }

    /// Copy every planned session into the repository and record it in the
    /// manifest. A failed session is counted and left out of the manifest so
    /// the next run retries it; earlier copies are kept.
    pub fn apply_push(&self, plan: SessionPushPlan) -> SessionPushReport {
        let SessionPushPlan {
            copies,
            skipped,
            mut manifest,
            ..
        } = plan;

        let mut report = SessionPushReport {
            skipped,
            ..SessionPushReport::default()
        };

        for planned in &copies {
            let key = planned.artifact.key();
            match copy_session_into(planned) {
                Ok(()) => {
                    manifest.record(&key, planned.artifact.modified);
                    report.copied += 1;
                    report.total_bytes += planned.artifact.size;
                    debug!(%key, "session copied into repository");
                }
                Err(error) => {
                    warn!(%key, %error, "failed to copy session");
                    report.failed += 1;
                }
            }
        }

        if report.copied > 0 {
            if let Err(error) = manifest.save() {
                warn!(%error, "failed to save manifest; sessions will be recopied next run");
            }
        }
        report
    }

    /// Copy changed local sessions into this device's subtree, then commit and push.
    pub fn push_sessions(
        &self,
        repo: &Path,
        device: &str,
        transport: &dyn Repository,
    ) -> SessionPushReport {
        let plan = self.plan_push(repo, device);
        let mut report = self.apply_push(plan);
        if report.copied > 0 {
            report.commit = transport.commit_and_push(repo, &commit_message(device, report.copied));
        }
        info!(
            copied = report.copied,
            skipped = report.skipped,
            failed = report.failed,
            "session push finished"
        );
        report
    }

    /// Pull the shared repository, then merge every device's sessions into
    /// the local tree. A failed pull is reported and the merge still runs.
    pub fn pull_sessions(
        &self,
        repo: &Path,
        transport: &dyn Repository,
        cache: &dyn CacheState,
    ) -> Result<SessionPullReport, SyncError> {
        let pull = transport.pull(repo);
        if !pull.ok {
            warn!(output = %pull.output, "pull failed; merging local repository state");
        }

        let mut report = self.merge_devices(repo, cache)?;
        report.pulled = pull.ok;
        report.error = (!pull.ok).then_some(pull.output);
        Ok(report)
    }

    /// Merge all device subtrees (the local device's own included) into the
    /// canonical local tree. The newer modification time wins; on a tie the
    /// local copy is kept.
    pub fn merge_devices(
        &self,
        repo: &Path,
        cache: &dyn CacheState,
    ) -> Result<SessionPullReport, SyncError> {
        let mut report = SessionPullReport::default();

        for device in device_names(repo) {
            let sessions_dir = device_sessions_dir(repo, &device);
            if !sessions_dir.is_dir() {
                continue;
            }

            for remote in scan_sessions(&sessions_dir) {
                let local_project = self.environment.projects_directory.join(&remote.project_dir);
                let local_log = local_project.join(format!("{}.jsonl", remote.session_id));

                if let Some(local_time) = modified_time(&local_log) {
                    if local_time >= remote.modified {
                        report.sessions_skipped += 1;
                        continue;
                    }
                }

                match deploy_session(&remote, &local_project, &local_log) {
                    Ok(()) => {
                        debug!(device = %device, key = %remote.key(), "session deployed");
                        report.sessions_copied += 1;
                    }
                    Err(error) => {
                        warn!(device = %device, key = %remote.key(), %error, "failed to deploy session");
                        report.failed += 1;
                    }
                }
            }
            report.devices_seen.push(device);
        }

        if report.sessions_copied > 0 {
            match cache.invalidate() {
                Ok(()) => report.cache_invalidated = true,
                Err(error) => warn!(%error, "failed to invalidate stats cache"),
            }
        }

        info!(
            copied = report.sessions_copied,
            skipped = report.sessions_skipped,
            devices = report.devices_seen.len(),
            "session merge finished"
        );
        Ok(report)
    }
}

pub fn commit_message(device: &str, sessions: usize) -> String {
    format!("sync({device}): {sessions} session(s) updated")
}

/// Undo the project directory encoding: the leading `-` and every other `-`
/// become path separators. Lossy for paths whose segments contain dashes.
pub fn decode_project_dir(encoded: &str) -> String {
    let (prefix, rest) = match encoded.strip_prefix('-') {
        Some(rest) => ("/", rest),
        None => ("", encoded),
    };
    format!("{prefix}{}", rest.replace('-', "/"))
}

/// Write a minimal `sessions-index.json` if the project directory lacks one.
pub fn ensure_sessions_index(project_dir: &Path, encoded: &str) -> Result<bool, SyncError> {
    let index = project_dir.join(SESSIONS_INDEX_FILE);
    if index.exists() {
        return Ok(false);
    }

    let payload = json!({
        "version": 1,
        "entries": [],
        "originalPath": decode_project_dir(encoded),
    });
    let data = serde_json::to_vec_pretty(&payload)?;
    fs::write(&index, data).map_err(|e| SyncError::io(&index, e))?;
    Ok(true)
}

fn device_names(repo: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(devices_dir(repo)) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

fn copy_session_into(planned: &PlannedSessionCopy) -> Result<(), SyncError> {
    let artifact = &planned.artifact;
    let destination = &planned.destination_dir;
    fs::create_dir_all(destination).map_err(|e| SyncError::io(destination, e))?;

    copy_file(
        &artifact.path,
        &destination.join(format!("{}.jsonl", artifact.session_id)),
    )?;
    if let Some(aux) = &artifact.aux_directory {
        copy_dir_recursive(aux, &destination.join(&artifact.session_id))?;
    }
    if let Some(index) = &planned.index_file {
        copy_file(index, &destination.join(SESSIONS_INDEX_FILE))?;
    }
    Ok(())
}

fn deploy_session(
    remote: &SessionArtifact,
    local_project: &Path,
    local_log: &Path,
) -> Result<(), SyncError> {
    fs::create_dir_all(local_project).map_err(|e| SyncError::io(local_project, e))?;
    ensure_sessions_index(local_project, &remote.project_dir)?;
    copy_file(&remote.path, local_log)?;
    if let Some(aux) = &remote.aux_directory {
        copy_dir_recursive(aux, &local_project.join(&remote.session_id))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn decode_project_dir_maps_dashes_to_separators() {
        assert_eq!(decode_project_dir("-Users-me-app"), "/Users/me/app");
        assert_eq!(decode_project_dir("relative-dir"), "relative/dir");
        // Known lossy case: a dash inside a real segment.
        assert_eq!(decode_project_dir("-Users-me-my-app"), "/Users/me/my/app");
    }

    #[test]
    fn ensure_sessions_index_never_overwrites() {
        let dir = tempdir().expect("tempdir");
        assert!(ensure_sessions_index(dir.path(), "-Users-me-app").expect("create"));

        let raw = fs::read_to_string(dir.path().join(SESSIONS_INDEX_FILE)).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["originalPath"], "/Users/me/app");
        assert_eq!(value["version"], 1);

        fs::write(dir.path().join(SESSIONS_INDEX_FILE), b"{\"custom\":true}").expect("write");
        assert!(!ensure_sessions_index(dir.path(), "-Users-me-app").expect("noop"));
        assert_eq!(
            fs::read(dir.path().join(SESSIONS_INDEX_FILE)).expect("read"),
            b"{\"custom\":true}"
        );
    }

    #[test]
    fn commit_message_names_device_and_count() {
        assert_eq!(commit_message("laptop", 3), "sync(laptop): 3 session(s) updated");
    }
}
