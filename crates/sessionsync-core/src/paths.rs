use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SESSIONS_INDEX_FILE: &str = "sessions-index.json";
pub const SKILL_MARKER_FILE: &str = "SKILL.md";
pub const REPO_SKILL_LOCK_FILE: &str = "skill-lock.json";
pub const IGNORE_SECRETS_FILE: &str = ".sessionsync-ignore-secrets";

/// Where sessionsync keeps its own files (config and the default checkout).
#[derive(Debug, Clone)]
pub struct SyncPaths {
    pub runtime_directory: PathBuf,
    pub config_path: PathBuf,
    pub default_repo_path: PathBuf,
}

impl SyncPaths {
    pub fn detect() -> Self {
        if let Ok(override_dir) = std::env::var("SESSIONSYNC_HOME") {
            if !override_dir.trim().is_empty() {
                return Self::from_runtime(PathBuf::from(override_dir));
            }
        }

        if let Some(home) = home_dir() {
            return Self::from_runtime(home.join(".sessionsync"));
        }

        if let Some(project_dirs) = ProjectDirs::from("dev", "sessionsync", "SessionSync") {
            return Self::from_runtime(project_dirs.data_dir().to_path_buf());
        }

        Self::from_runtime(PathBuf::from(".sessionsync"))
    }

    pub fn from_runtime(runtime_directory: PathBuf) -> Self {
        let config_path = runtime_directory.join("config.json");
        let default_repo_path = runtime_directory.join("repo");
        Self {
            runtime_directory,
            config_path,
            default_repo_path,
        }
    }

    pub fn ensure_runtime_dir(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.runtime_directory)
    }
}

/// On-device locations the engines read from and deploy into.
///
/// Engines never consult the home directory themselves; everything they touch
/// outside the shared repository is named here.
#[derive(Debug, Clone)]
pub struct SyncEnvironment {
    /// Canonical session tree, `<projectDir>/<sessionId>.jsonl`.
    pub projects_directory: PathBuf,
    /// Marker whose deletion forces the assistant to recompute usage stats.
    pub stats_cache_file: PathBuf,
    /// The assistant's own skills directory; source for push, primary link consumer on pull.
    pub skills_directory: PathBuf,
    /// Root managed by the third-party skill installer. Links into it are vendored.
    pub vendor_skills_root: PathBuf,
    /// Extra consumers that receive links only when the directory already exists.
    pub secondary_skill_consumers: Vec<PathBuf>,
    pub skill_lock_file: PathBuf,
}

impl SyncEnvironment {
    pub fn current() -> Self {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("/"));
        Self::from_home(home)
    }

    pub fn from_home(home: PathBuf) -> Self {
        let claude = home.join(".claude");
        let agents = home.join(".agents");
        Self {
            projects_directory: claude.join("projects"),
            stats_cache_file: claude.join("stats-cache.json"),
            skills_directory: claude.join("skills"),
            vendor_skills_root: agents.join("skills"),
            secondary_skill_consumers: vec![home.join(".openclaw").join("skills")],
            skill_lock_file: agents.join(".skill-lock.json"),
        }
    }
}

pub fn devices_dir(repo: &Path) -> PathBuf {
    repo.join("devices")
}

pub fn device_dir(repo: &Path, device: &str) -> PathBuf {
    devices_dir(repo).join(device)
}

pub fn device_sessions_dir(repo: &Path, device: &str) -> PathBuf {
    device_dir(repo, device).join("sessions")
}

pub fn device_manifest_path(repo: &Path, device: &str) -> PathBuf {
    device_dir(repo, device).join(MANIFEST_FILE)
}

pub fn repo_skills_dir(repo: &Path) -> PathBuf {
    repo.join("skills")
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()))
}

pub fn standardized(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Repository-relative display form with `/` separators regardless of platform.
pub fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
