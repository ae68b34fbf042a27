use crate::error::SyncError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Per-device record of the last pushed modification time of every session.
///
/// Persisted as a flat JSON object `{ "<projectDir>/<sessionId>": "<rfc3339>" }`.
/// The manifest never enforces monotonic timestamps; callers only `record`
/// after copying a source they have already found newer.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Load from `path`. A missing, unreadable or corrupted file yields an
    /// empty manifest; the cost is a redundant recopy, never a lost push.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read(path) {
            Ok(data) => match serde_json::from_slice::<BTreeMap<String, String>>(&data) {
                Ok(entries) => entries,
                Err(error) => {
                    warn!(path = %path.display(), %error, "manifest is corrupted; treating as empty");
                    BTreeMap::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => {
                warn!(path = %path.display(), %error, "manifest is unreadable; treating as empty");
                BTreeMap::new()
            }
        };

        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn should_skip(&self, key: &str, source_time: DateTime<Utc>) -> bool {
        self.recorded(key)
            .map(|recorded| recorded >= source_time)
            .unwrap_or(false)
    }

    pub fn record(&mut self, key: &str, source_time: DateTime<Utc>) {
        self.entries.insert(key.to_string(), iso8601(source_time));
    }

    /// Stored time for `key`; an unparseable value counts as absent.
    pub fn recorded(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.entries.get(key)?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|value| value.with_timezone(&Utc))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save(&self) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        let mut payload = serde_json::to_vec_pretty(&self.entries)?;
        payload.push(b'\n');
        std::fs::write(&self.path, payload).map_err(|e| SyncError::io(&self.path, e))
    }
}

pub fn iso8601(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
