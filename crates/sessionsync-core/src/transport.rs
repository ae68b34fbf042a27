use crate::error::SyncError;
use crate::models::{CommitOutcome, LastCommit, PullOutcome, WorkingTreeStatus};
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Version-control transport for the shared repository.
///
/// Engines only talk to this trait. Failures of `pull` and `commit_and_push`
/// come back as data so already-completed local work is never discarded.
pub trait Repository {
    /// Clone `url` into `path`. Returns `false` when `path` is already a checkout.
    fn clone_repo(&self, url: &str, path: &Path) -> Result<bool, SyncError>;

    /// Create an empty checkout with `origin` pointing at `url`.
    fn init(&self, path: &Path, url: &str) -> Result<(), SyncError>;

    /// Make sure session logs are stored as opaque blobs. Returns whether
    /// large-file tracking is in use (otherwise a plain attribute is written).
    fn configure_binary_logs(&self, path: &Path) -> Result<bool, SyncError>;

    /// Rebase local commits on top of the remote branch.
    fn pull(&self, path: &Path) -> PullOutcome;

    /// Stage everything, commit with `message` and push.
    fn commit_and_push(&self, path: &Path, message: &str) -> CommitOutcome;

    /// Repository-relative paths that differ from `HEAD`, plus untracked files.
    fn changed_files(&self, path: &Path) -> Result<Vec<String>, SyncError>;

    fn tracked_files(&self, path: &Path) -> Result<Vec<String>, SyncError>;

    fn status(&self, path: &Path) -> Result<WorkingTreeStatus, SyncError>;

    fn last_commit(&self, path: &Path) -> Option<LastCommit>;
}

#[derive(Debug, Clone, Default)]
pub struct GitRepository;

impl GitRepository {
    pub fn new() -> Self {
        Self
    }

    fn current_branch(&self, path: &Path) -> String {
        run_git(path, &["branch", "--show-current"])
            .ok()
            .filter(|branch| !branch.is_empty())
            .unwrap_or_else(|| String::from("main"))
    }
}

impl Repository for GitRepository {
    fn clone_repo(&self, url: &str, path: &Path) -> Result<bool, SyncError> {
        if path.join(".git").exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        let target = path.to_string_lossy();
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        run_git(parent, &["clone", url, target.as_ref()])?;
        Ok(true)
    }

    fn init(&self, path: &Path, url: &str) -> Result<(), SyncError> {
        std::fs::create_dir_all(path).map_err(|e| SyncError::io(path, e))?;
        run_git(path, &["init"])?;
        run_git(path, &["remote", "add", "origin", url])?;
        Ok(())
    }

    fn configure_binary_logs(&self, path: &Path) -> Result<bool, SyncError> {
        if run_git(path, &["lfs", "version"]).is_ok() {
            run_git(path, &["lfs", "install", "--local"])?;
            run_git(path, &["lfs", "track", "*.jsonl"])?;
            return Ok(true);
        }

        let attributes = path.join(".gitattributes");
        let existing = std::fs::read_to_string(&attributes).unwrap_or_default();
        if !existing.lines().any(|line| line.trim() == "*.jsonl binary") {
            let mut next = existing;
            if !next.is_empty() && !next.ends_with('\n') {
                next.push('\n');
            }
            next.push_str("*.jsonl binary\n");
            std::fs::write(&attributes, next).map_err(|e| SyncError::io(&attributes, e))?;
        }
        Ok(false)
    }

    fn pull(&self, path: &Path) -> PullOutcome {
        let branch = self.current_branch(path);
        match run_git(path, &["ls-remote", "--heads", "origin", &branch]) {
            Ok(heads) if !heads.is_empty() => {}
            _ => {
                return PullOutcome {
                    ok: true,
                    output: String::from("No remote commits yet"),
                }
            }
        }

        match run_git(path, &["pull", "--rebase", "origin", &branch]) {
            Ok(output) => PullOutcome { ok: true, output },
            Err(error) => PullOutcome {
                ok: false,
                output: error.to_string(),
            },
        }
    }

    fn commit_and_push(&self, path: &Path, message: &str) -> CommitOutcome {
        let failed = |error: SyncError| CommitOutcome {
            committed: false,
            pushed: false,
            error: Some(error.to_string()),
        };

        if let Err(error) = run_git(path, &["add", "-A"]) {
            return failed(error);
        }
        match run_git(path, &["status", "--porcelain"]) {
            Ok(status) if status.is_empty() => return CommitOutcome::default(),
            Ok(_) => {}
            Err(error) => return failed(error),
        }
        if let Err(error) = run_git(path, &["commit", "-m", message]) {
            return failed(error);
        }

        let branch = self.current_branch(path);
        match run_git(path, &["push", "-u", "origin", &branch]) {
            Ok(_) => CommitOutcome {
                committed: true,
                pushed: true,
                error: None,
            },
            Err(error) => {
                warn!(%error, "commit recorded locally but push failed");
                CommitOutcome {
                    committed: true,
                    pushed: false,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    fn changed_files(&self, path: &Path) -> Result<Vec<String>, SyncError> {
        let mut files = BTreeSet::new();
        // Fails on a repository without commits; untracked files still cover that case.
        match run_git(path, &["diff", "--name-only", "HEAD"]) {
            Ok(output) => files.extend(non_empty_lines(&output)),
            Err(error) => debug!(%error, "diff against HEAD unavailable"),
        }
        let untracked = run_git(path, &["ls-files", "--others", "--exclude-standard"])?;
        files.extend(non_empty_lines(&untracked));
        Ok(files.into_iter().collect())
    }

    fn tracked_files(&self, path: &Path) -> Result<Vec<String>, SyncError> {
        let output = run_git(path, &["ls-files"])?;
        Ok(non_empty_lines(&output).collect())
    }

    fn status(&self, path: &Path) -> Result<WorkingTreeStatus, SyncError> {
        let branch = self.current_branch(path);
        let status = run_git(path, &["status", "--porcelain"])?;
        let changes = non_empty_lines(&status).count();
        Ok(WorkingTreeStatus {
            branch,
            clean: changes == 0,
            changes,
        })
    }

    fn last_commit(&self, path: &Path) -> Option<LastCommit> {
        let log = run_git(path, &["log", "-1", "--format=%h|%s|%ci"]).ok()?;
        let mut parts = log.splitn(3, '|');
        let hash = parts.next()?.to_string();
        let message = parts.next()?.to_string();
        let date = parts.next()?.to_string();
        Some(LastCommit {
            hash,
            message,
            date,
        })
    }
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<String, SyncError> {
    let command = args.first().copied().unwrap_or_default();
    debug!(cwd = %cwd.display(), ?args, "running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| SyncError::transport(command, e.to_string()))?;

    if !output.status.success() {
        return Err(SyncError::transport(
            command,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn non_empty_lines(output: &str) -> impl Iterator<Item = String> + '_ {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}
