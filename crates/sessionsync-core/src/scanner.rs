use crate::models::SessionArtifact;
use std::fs;
use std::path::Path;
use uuid::Uuid;

const SESSION_EXTENSION: &str = ".jsonl";

/// Enumerate `<projectDir>/<sessionId>.jsonl` logs under `projects_dir`.
///
/// Entries whose stem is not a hyphenated UUID are ignored. A missing root
/// yields an empty list.
pub fn scan_sessions(projects_dir: &Path) -> Vec<SessionArtifact> {
    let Ok(projects) = fs::read_dir(projects_dir) else {
        return Vec::new();
    };

    let mut sessions = Vec::new();
    for project in projects.filter_map(Result::ok) {
        let project_path = project.path();
        if !project_path.is_dir() {
            continue;
        }
        let project_dir = project.file_name().to_string_lossy().to_string();

        let Ok(entries) = fs::read_dir(&project_path) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(session_id) = file_name.strip_suffix(SESSION_EXTENSION) else {
                continue;
            };
            if !is_session_id(session_id) {
                continue;
            }

            let path = entry.path();
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };

            let aux = project_path.join(session_id);
            let aux_directory = aux.is_dir().then_some(aux);

            sessions.push(SessionArtifact {
                path,
                session_id: session_id.to_string(),
                project_dir: project_dir.clone(),
                aux_directory,
                modified: modified.into(),
                size: metadata.len(),
            });
        }
    }

    sessions.sort_by(|lhs, rhs| lhs.key().cmp(&rhs.key()));
    sessions
}

pub fn is_session_id(value: &str) -> bool {
    value.len() == 36 && Uuid::try_parse(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ID: &str = "0b0c2f6e-5a4d-4c1e-9f7a-3d2b1a0e9c8d";

    #[test]
    fn session_id_requires_hyphenated_uuid() {
        assert!(is_session_id(ID));
        assert!(is_session_id(&ID.to_ascii_uppercase()));
        assert!(!is_session_id("0b0c2f6e5a4d4c1e9f7a3d2b1a0e9c8d"));
        assert!(!is_session_id("notes"));
    }

    #[test]
    fn scan_finds_logs_and_aux_directories() {
        let dir = tempdir().expect("tempdir");
        let project = dir.path().join("-Users-me-app");
        fs::create_dir_all(project.join(ID).join("tool-results")).expect("aux");
        fs::write(project.join(format!("{ID}.jsonl")), b"{}\n").expect("log");
        fs::write(project.join("scratch.jsonl"), b"{}\n").expect("noise");
        fs::write(project.join("sessions-index.json"), b"{}").expect("index");

        let sessions = scan_sessions(dir.path());
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.session_id, ID);
        assert_eq!(session.project_dir, "-Users-me-app");
        assert_eq!(session.size, 3);
        assert_eq!(session.aux_directory, Some(project.join(ID)));
        assert_eq!(session.key(), format!("-Users-me-app/{ID}"));
    }

    #[test]
    fn scan_of_missing_root_is_empty() {
        let dir = tempdir().expect("tempdir");
        assert!(scan_sessions(&dir.path().join("absent")).is_empty());
    }
}
