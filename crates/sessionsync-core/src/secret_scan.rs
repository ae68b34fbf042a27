use crate::models::{Finding, ScanReport};
use crate::paths::{relative_display, IGNORE_SECRETS_FILE};
use crate::transport::Repository;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Files larger than this are treated as bulk data and not scanned.
pub const MAX_SCAN_BYTES: u64 = 5 * 1024 * 1024;
/// Values this short are masked completely.
const FULL_REDACTION_LEN: usize = 8;
const REDACTION_MARKER: &str = "***";
const SNIPPET_CONTEXT: usize = 10;

#[derive(Debug)]
pub struct SecretPattern {
    pub id: &'static str,
    pub label: &'static str,
    pub regex: Regex,
}

fn pattern(id: &'static str, label: &'static str, regex: &str) -> SecretPattern {
    SecretPattern {
        id,
        label,
        regex: Regex::new(regex).unwrap_or_else(|error| panic!("invalid pattern {id}: {error}")),
    }
}

/// Credential detectors, applied in this order.
pub static SECRET_PATTERNS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    vec![
        pattern("aws-access-key", "AWS Access Key ID", r"\b(AKIA[0-9A-Z]{16})\b"),
        pattern(
            "aws-secret-key",
            "AWS Secret Access Key",
            r#"(?i)(?:aws_secret_access_key|secret_key|aws_secret)\s*[=:]\s*["']?([A-Za-z0-9/+=]{40})["']?"#,
        ),
        pattern("github-token", "GitHub Token", r"\b(ghp_[A-Za-z0-9]{36,})\b"),
        pattern(
            "github-pat",
            "GitHub Personal Access Token",
            r"\b(github_pat_[A-Za-z0-9_]{22,})\b",
        ),
        pattern("openai-key", "OpenAI API Key", r"\b(sk-[A-Za-z0-9]{20,})\b"),
        pattern("google-api-key", "Google API Key", r"\b(AIza[A-Za-z0-9_-]{35})\b"),
        pattern("slack-token", "Slack Token", r"\b(xox[bpras]-[A-Za-z0-9-]{10,})\b"),
        pattern(
            "ssh-private-key",
            "SSH Private Key",
            r"-----BEGIN (OPENSSH|RSA|DSA|EC|PGP) PRIVATE KEY-----",
        ),
        // Quoted values only, at least 8 chars, so `password=""` stays quiet.
        pattern(
            "generic-secret",
            "Generic Secret Assignment",
            r#"(?i)(?:secret|password|passwd|token|api_key|apikey|access_key)\s*[=:]\s*["']([^"'\s]{8,})["']"#,
        ),
    ]
});

/// Suppressions read from the repository's ignore file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreRules {
    pub paths: Vec<String>,
    pub patterns: Vec<String>,
}

impl IgnoreRules {
    /// `path:<prefix>` and `rule:<id>` lines; comments, blanks and anything
    /// else are skipped.
    pub fn parse(content: &str) -> Self {
        let mut rules = Self::default();
        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(prefix) = line.strip_prefix("path:") {
                let prefix = prefix.trim();
                if !prefix.is_empty() {
                    rules.paths.push(prefix.to_string());
                }
            } else if let Some(id) = line.strip_prefix("rule:") {
                let id = id.trim();
                if !id.is_empty() {
                    rules.patterns.push(id.to_string());
                }
            }
        }
        rules
    }

    pub fn load(repo: &Path) -> Self {
        std::fs::read_to_string(repo.join(IGNORE_SECRETS_FILE))
            .map(|content| Self::parse(&content))
            .unwrap_or_default()
    }

    /// Plain string prefix match on the repository-relative path.
    pub fn ignores_path(&self, relative: &str) -> bool {
        self.paths.iter().any(|prefix| relative.starts_with(prefix.as_str()))
    }

    pub fn disables(&self, pattern_id: &str) -> bool {
        self.patterns.iter().any(|id| id == pattern_id)
    }
}

/// `***` for short values, otherwise the first 4 and last 2 chars around `***`.
pub fn redact(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= FULL_REDACTION_LEN {
        return REDACTION_MARKER.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}{REDACTION_MARKER}{tail}")
}

/// A file offered to the scanner: where to read it, and the repository-relative
/// path used for reporting and ignore rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
    pub source: PathBuf,
    pub display: String,
}

impl ScanCandidate {
    pub fn in_repo(repo: &Path, relative: &str) -> Self {
        Self {
            source: repo.join(relative),
            display: relative.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecretScanner {
    rules: IgnoreRules,
}

impl SecretScanner {
    pub fn new(rules: IgnoreRules) -> Self {
        Self { rules }
    }

    pub fn for_repo(repo: &Path) -> Self {
        Self::new(IgnoreRules::load(repo))
    }

    pub fn rules(&self) -> &IgnoreRules {
        &self.rules
    }

    fn active_patterns(&self) -> impl Iterator<Item = &'static SecretPattern> + '_ {
        SECRET_PATTERNS
            .iter()
            .filter(|pattern| !self.rules.disables(pattern.id))
    }

    pub fn scan(&self, candidates: &[ScanCandidate]) -> ScanReport {
        let mut report = ScanReport::default();
        for candidate in candidates {
            if self.rules.ignores_path(&candidate.display) {
                debug!(file = %candidate.display, "ignored by path rule");
                continue;
            }
            let Some(content) = read_text(&candidate.source) else {
                continue;
            };
            report
                .findings
                .extend(self.scan_text(&candidate.display, &content));
            report.files_scanned += 1;
        }
        report
    }

    /// One finding per line and pattern, reporting the first match.
    pub fn scan_text(&self, display: &str, content: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (index, line) in content.split('\n').enumerate() {
            for pattern in self.active_patterns() {
                let Some(captures) = pattern.regex.captures(line) else {
                    continue;
                };
                let Some(matched) = captures.get(1).or_else(|| captures.get(0)) else {
                    continue;
                };
                findings.push(Finding {
                    file: display.to_string(),
                    line: index + 1,
                    pattern_id: pattern.id.to_string(),
                    label: pattern.label.to_string(),
                    snippet: snippet(line, matched.start(), matched.end()),
                });
            }
        }
        findings
    }
}

/// Context around a match, with the matched value replaced by its redaction.
fn snippet(line: &str, start: usize, end: usize) -> String {
    let window_start = line[..start]
        .char_indices()
        .rev()
        .take(SNIPPET_CONTEXT)
        .last()
        .map(|(offset, _)| offset)
        .unwrap_or(start);
    let window_end = line[end..]
        .char_indices()
        .nth(SNIPPET_CONTEXT)
        .map(|(offset, _)| end + offset)
        .unwrap_or(line.len());

    let value = &line[start..end];
    format!(
        "{}{}{}",
        &line[window_start..start],
        redact(value),
        &line[end..window_end]
    )
    .trim()
    .to_string()
}

/// Text of a file within the size ceiling. Invalid UTF-8 is replaced rather
/// than rejected, so one stray byte never hides the rest of the file.
fn read_text(path: &Path) -> Option<String> {
    let metadata = std::fs::metadata(path).ok()?;
    if !metadata.is_file() || metadata.len() > MAX_SCAN_BYTES {
        return None;
    }
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(error) => {
            debug!(path = %path.display(), %error, "unreadable file skipped by secret scan");
            None
        }
    }
}

/// Files in the repository that would be committed as-is: working tree
/// changes and untracked files, or every tracked file when change detection
/// is unavailable.
pub fn repository_candidates(repo: &Path, transport: &dyn Repository) -> Vec<ScanCandidate> {
    let relative = match transport.changed_files(repo) {
        Ok(files) => files,
        Err(error) => {
            warn!(%error, "change detection unavailable; scanning all tracked files");
            transport.tracked_files(repo).unwrap_or_default()
        }
    };
    relative
        .iter()
        .map(|path| ScanCandidate::in_repo(repo, path))
        .collect()
}

/// Candidates for files about to be copied into the repository. Each is read
/// from its local source and reported under its destination path.
pub fn planned_candidates(repo: &Path, files: &[(PathBuf, PathBuf)]) -> Vec<ScanCandidate> {
    files
        .iter()
        .map(|(source, destination)| ScanCandidate {
            source: source.clone(),
            display: relative_display(repo, destination),
        })
        .collect()
}

/// Merge candidate lists; for a path present in both, the planned (local)
/// source wins because that is what will be committed.
pub fn merge_candidates(
    planned: Vec<ScanCandidate>,
    existing: Vec<ScanCandidate>,
) -> Vec<ScanCandidate> {
    let mut seen = BTreeSet::new();
    planned
        .into_iter()
        .chain(existing)
        .filter(|candidate| seen.insert(candidate.display.clone()))
        .collect()
}
