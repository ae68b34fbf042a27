#![allow(dead_code)]

use filetime::FileTime;
use sessionsync_core::{
    CommitOutcome, LastCommit, PullOutcome, Repository, SyncConfig, SyncEnvironment, SyncError,
    WorkingTreeStatus,
};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SESSION_A: &str = "0b0c2f6e-5a4d-4c1e-9f7a-3d2b1a0e9c8d";
pub const SESSION_B: &str = "7e1d4c2a-9b3f-4e8d-a6c5-1f2e3d4c5b6a";
pub const PROJECT: &str = "-Users-me-app";
pub const BASE_TIME: i64 = 1_760_000_000;

/// In-memory transport: records commits, never touches a real git binary.
pub struct FakeRepository {
    pub pull_ok: bool,
    pub push_error: Option<String>,
    /// `None` makes change detection fail.
    pub changed: Option<Vec<String>>,
    pub tracked: Vec<String>,
    pub pulls: Cell<usize>,
    pub commits: RefCell<Vec<String>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self {
            pull_ok: true,
            push_error: None,
            changed: Some(Vec::new()),
            tracked: Vec::new(),
            pulls: Cell::new(0),
            commits: RefCell::new(Vec::new()),
        }
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.commits.borrow().clone()
    }
}

impl Repository for FakeRepository {
    fn clone_repo(&self, _url: &str, path: &Path) -> Result<bool, SyncError> {
        fs::create_dir_all(path).map_err(|e| SyncError::io(path, e))?;
        Ok(true)
    }

    fn init(&self, path: &Path, _url: &str) -> Result<(), SyncError> {
        fs::create_dir_all(path).map_err(|e| SyncError::io(path, e))
    }

    fn configure_binary_logs(&self, _path: &Path) -> Result<bool, SyncError> {
        Ok(false)
    }

    fn pull(&self, _path: &Path) -> PullOutcome {
        self.pulls.set(self.pulls.get() + 1);
        if self.pull_ok {
            PullOutcome {
                ok: true,
                output: String::from("Already up to date."),
            }
        } else {
            PullOutcome {
                ok: false,
                output: String::from("fatal: unable to access remote"),
            }
        }
    }

    fn commit_and_push(&self, _path: &Path, message: &str) -> CommitOutcome {
        self.commits.borrow_mut().push(message.to_string());
        CommitOutcome {
            committed: true,
            pushed: self.push_error.is_none(),
            error: self.push_error.clone(),
        }
    }

    fn changed_files(&self, _path: &Path) -> Result<Vec<String>, SyncError> {
        self.changed
            .clone()
            .ok_or_else(|| SyncError::transport("diff", "not a git repository"))
    }

    fn tracked_files(&self, _path: &Path) -> Result<Vec<String>, SyncError> {
        Ok(self.tracked.clone())
    }

    fn status(&self, _path: &Path) -> Result<WorkingTreeStatus, SyncError> {
        Ok(WorkingTreeStatus {
            branch: String::from("main"),
            clean: true,
            changes: 0,
        })
    }

    fn last_commit(&self, _path: &Path) -> Option<LastCommit> {
        None
    }
}

pub struct Fixture {
    pub temp: TempDir,
    pub environment: SyncEnvironment,
    pub repo: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("tempdir");
        let home = temp.path().join("home");
        let repo = temp.path().join("repo");
        fs::create_dir_all(&home).expect("home");
        fs::create_dir_all(&repo).expect("repo");
        Self {
            environment: SyncEnvironment::from_home(home),
            repo,
            temp,
        }
    }

    pub fn config(&self, device: &str) -> SyncConfig {
        SyncConfig {
            repo: String::from("git@github.com:me/sessions.git"),
            repo_path: self.repo.clone(),
            device: device.to_string(),
        }
    }

    pub fn local_session_path(&self, project: &str, id: &str) -> PathBuf {
        self.environment
            .projects_directory
            .join(project)
            .join(format!("{id}.jsonl"))
    }

    pub fn write_local_session(&self, project: &str, id: &str, body: &str, offset: i64) -> PathBuf {
        let path = self.local_session_path(project, id);
        write_with_mtime(&path, body, offset);
        path
    }

    pub fn repo_session_path(&self, device: &str, project: &str, id: &str) -> PathBuf {
        self.repo
            .join("devices")
            .join(device)
            .join("sessions")
            .join(project)
            .join(format!("{id}.jsonl"))
    }

    pub fn write_repo_session(
        &self,
        device: &str,
        project: &str,
        id: &str,
        body: &str,
        offset: i64,
    ) -> PathBuf {
        let path = self.repo_session_path(device, project, id);
        write_with_mtime(&path, body, offset);
        path
    }
}

pub fn write_with_mtime(path: &Path, body: &str, offset: i64) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
    fs::write(path, body).expect("write");
    set_mtime(path, offset);
}

pub fn set_mtime(path: &Path, offset: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(BASE_TIME + offset, 0))
        .expect("set mtime");
}

pub fn mtime_of(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&fs::metadata(path).expect("metadata"))
}
