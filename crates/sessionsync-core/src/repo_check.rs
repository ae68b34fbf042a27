use crate::error::SyncError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

static GITHUB_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com[/:]([^/]+/[^/.]+)").unwrap_or_else(|error| panic!("{error}"))
});

/// Entries appended to the shared repository's `.gitignore` on init.
pub const SECURITY_GITIGNORE_ENTRIES: &[&str] = &[
    "# Secrets & credentials",
    ".env",
    ".env.*",
    ".env.local",
    ".env.*.local",
    "*.pem",
    "*.key",
    "*.p12",
    "*.pfx",
    "id_rsa*",
    "id_ed25519*",
    "id_ecdsa*",
    "credentials.json",
    "token.json",
    "service-account*.json",
    ".gcp-credentials.json",
    "",
    "# OS",
    ".DS_Store",
    "Thumbs.db",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoVisibility {
    Private,
    Public,
    Unknown,
}

/// `owner/repo` from an https or ssh GitHub URL.
pub fn extract_repo_slug(url: &str) -> Option<String> {
    GITHUB_SLUG
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|slug| slug.as_str().to_string())
}

/// Ask the GitHub CLI whether the repository is private. Anything other than
/// a clear answer, including a missing `gh`, is `Unknown`.
pub fn check_repo_visibility(url: &str) -> RepoVisibility {
    let Some(slug) = extract_repo_slug(url) else {
        return RepoVisibility::Unknown;
    };

    let output = Command::new("gh")
        .args(["api", &format!("repos/{slug}"), "--jq", ".private"])
        .output();
    match output {
        Ok(output) if output.status.success() => {
            match String::from_utf8_lossy(&output.stdout).trim() {
                "true" => RepoVisibility::Private,
                "false" => RepoVisibility::Public,
                _ => RepoVisibility::Unknown,
            }
        }
        _ => RepoVisibility::Unknown,
    }
}

/// Append the security entries missing from `<repo>/.gitignore`.
/// Returns how many lines were added.
pub fn ensure_security_gitignore(repo: &Path) -> Result<usize, SyncError> {
    let path = repo.join(".gitignore");
    let existing = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(error) => return Err(SyncError::io(&path, error)),
    };

    let present: Vec<&str> = existing.lines().map(str::trim).collect();
    let missing: Vec<&str> = SECURITY_GITIGNORE_ENTRIES
        .iter()
        .copied()
        .filter(|entry| !entry.is_empty() && !entry.starts_with('#'))
        .filter(|entry| !present.contains(entry))
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let mut next = existing.clone();
    if !next.is_empty() && !next.ends_with('\n') {
        next.push('\n');
    }
    if existing.is_empty() {
        next.push_str(&SECURITY_GITIGNORE_ENTRIES.join("\n"));
        next.push('\n');
    } else {
        for entry in &missing {
            next.push_str(entry);
            next.push('\n');
        }
    }
    std::fs::write(&path, next).map_err(|e| SyncError::io(&path, e))?;
    Ok(missing.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn slug_from_https_and_ssh_urls() {
        assert_eq!(
            extract_repo_slug("https://github.com/me/sessions.git").as_deref(),
            Some("me/sessions")
        );
        assert_eq!(
            extract_repo_slug("git@github.com:me/sessions.git").as_deref(),
            Some("me/sessions")
        );
        assert_eq!(extract_repo_slug("https://gitlab.com/me/sessions.git"), None);
        assert_eq!(check_repo_visibility("file:///tmp/repo"), RepoVisibility::Unknown);
    }

    #[test]
    fn gitignore_entries_are_appended_once() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join(".gitignore"), "node_modules\n.env").expect("write");

        let added = ensure_security_gitignore(dir.path()).expect("first");
        assert!(added > 0);
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).expect("read");
        assert_eq!(content.lines().filter(|line| *line == ".env").count(), 1);
        assert!(content.lines().any(|line| line == "*.pem"));

        assert_eq!(ensure_security_gitignore(dir.path()).expect("second"), 0);
    }
}
