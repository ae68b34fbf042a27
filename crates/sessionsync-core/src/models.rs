use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One session log found on disk. Recomputed on every run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionArtifact {
    pub path: PathBuf,
    pub session_id: String,
    /// Filesystem-safe encoding of the original project path, e.g. `-Users-me-app`.
    pub project_dir: String,
    /// `<projectDir>/<sessionId>/` holding subagent transcripts and tool outputs.
    pub aux_directory: Option<PathBuf>,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

impl SessionArtifact {
    /// Manifest key, `<projectDir>/<sessionId>`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.project_dir, self.session_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub committed: bool,
    pub pushed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullOutcome {
    pub ok: bool,
    pub output: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPushReport {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_bytes: u64,
    pub commit: CommitOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPullReport {
    pub pulled: bool,
    pub sessions_copied: usize,
    pub sessions_skipped: usize,
    pub failed: usize,
    pub devices_seen: Vec<String>,
    pub cache_invalidated: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillClass {
    UserAuthored,
    Vendored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillEntry {
    pub name: String,
    pub class: SkillClass,
    /// The entry as it appears in the skills directory (possibly a symlink).
    pub entry_path: PathBuf,
    /// Where the content actually lives once links are followed.
    pub content_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillsPushReport {
    pub copied: usize,
    pub skipped: usize,
    pub vendored: usize,
    pub failed: usize,
    pub lock_copied: bool,
    pub lock_changed: bool,
}

impl SkillsPushReport {
    pub fn has_changes(&self) -> bool {
        self.copied > 0 || self.lock_changed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLinkConflict {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillsPullReport {
    pub linked: usize,
    pub skipped: usize,
    pub failed: usize,
    pub conflicts: Vec<SkillLinkConflict>,
    pub consumers: Vec<PathBuf>,
    pub lock_copied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerLinkCount {
    pub directory: PathBuf,
    pub linked: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillsStatus {
    pub bundle_count: usize,
    pub consumers: Vec<ConsumerLinkCount>,
    pub has_lock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    pub line: usize,
    pub pattern_id: String,
    pub label: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub findings: Vec<Finding>,
    pub files_scanned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCommit {
    pub hash: String,
    pub message: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingTreeStatus {
    pub branch: String,
    pub clean: bool,
    pub changes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub name: String,
    pub session_count: usize,
    pub total_bytes: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStatusInfo {
    pub repo_path: PathBuf,
    pub device: String,
    pub tree: Option<WorkingTreeStatus>,
    pub last_commit: Option<LastCommit>,
    pub devices: Vec<DeviceStatus>,
    pub local_sessions: usize,
    pub skills: SkillsStatus,
}
