use crate::error::SyncError;
use crate::fs_ops::{
    copy_dir_recursive, copy_file, create_symlink, is_symlink, link_target, modified_time,
    remove_symlink,
};
use crate::models::{
    ConsumerLinkCount, SkillClass, SkillEntry, SkillLinkConflict, SkillsPullReport,
    SkillsPushReport, SkillsStatus,
};
use crate::paths::{
    repo_skills_dir, standardized, SyncEnvironment, REPO_SKILL_LOCK_FILE, SKILL_MARKER_FILE,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const PLACEHOLDER: &str = ".gitkeep";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Already pointed at the shared copy; not touched.
    Unchanged,
    Created,
    /// Pointed elsewhere (or was dangling) and was recreated.
    Repaired,
    /// The slot holds real user data and was left alone.
    Conflict,
}

#[derive(Debug, Clone)]
pub struct PlannedSkillCopy {
    pub entry: SkillEntry,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct SkillsPushPlan {
    pub copies: Vec<PlannedSkillCopy>,
    pub skipped: usize,
    pub vendored: usize,
    /// `(local lock, repository lock)` when a local lock file exists.
    pub lock: Option<(PathBuf, PathBuf)>,
}

impl SkillsPushPlan {
    /// `(source, destination)` pairs for every file the plan writes.
    pub fn files(&self) -> Vec<(PathBuf, PathBuf)> {
        let mut files = Vec::new();
        for copy in &self.copies {
            let content = &copy.entry.content_path;
            if content.is_dir() {
                for entry in WalkDir::new(content)
                    .follow_links(true)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_type().is_file())
                {
                    if let Ok(relative) = entry.path().strip_prefix(content) {
                        files.push((entry.path().to_path_buf(), copy.destination.join(relative)));
                    }
                }
            } else {
                files.push((content.clone(), copy.destination.clone()));
            }
        }
        if let Some((source, destination)) = &self.lock {
            files.push((source.clone(), destination.clone()));
        }
        files
    }
}

#[derive(Debug, Clone)]
pub struct SkillResolver {
    environment: SyncEnvironment,
}

impl SkillResolver {
    pub fn new(environment: SyncEnvironment) -> Self {
        Self { environment }
    }

    /// Vendored iff the entry is a symlink whose resolved target lies under the
    /// vendor root. Everything else, broken links included, is user-authored.
    pub fn classify(&self, entry_path: &Path) -> (SkillClass, PathBuf) {
        let Some(target) = link_target(entry_path) else {
            return (SkillClass::UserAuthored, entry_path.to_path_buf());
        };

        let resolved = standardized(&target);
        let vendor_root = standardized(&self.environment.vendor_skills_root);
        let vendored = resolved.starts_with(&vendor_root)
            || target.starts_with(&self.environment.vendor_skills_root);
        let class = if vendored {
            SkillClass::Vendored
        } else {
            SkillClass::UserAuthored
        };
        (class, resolved)
    }

    pub fn scan_local_skills(&self) -> Vec<SkillEntry> {
        let Ok(entries) = fs::read_dir(&self.environment.skills_directory) else {
            return Vec::new();
        };

        let mut skills: Vec<SkillEntry> = entries
            .filter_map(Result::ok)
            .map(|entry| {
                let entry_path = entry.path();
                let (class, content_path) = self.classify(&entry_path);
                SkillEntry {
                    name: entry.file_name().to_string_lossy().to_string(),
                    class,
                    entry_path,
                    content_path,
                }
            })
            .collect();
        skills.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
        skills
    }

    pub fn plan_push(&self, repo: &Path) -> SkillsPushPlan {
        let bundle = repo_skills_dir(repo);
        let mut plan = SkillsPushPlan::default();

        for entry in self.scan_local_skills() {
            if entry.class == SkillClass::Vendored {
                debug!(skill = %entry.name, "skipping vendored skill");
                plan.vendored += 1;
                continue;
            }
            if !entry.content_path.exists() {
                debug!(skill = %entry.name, "skill content is missing");
                continue;
            }

            let destination = bundle.join(&entry.name);
            // Skills linked in by an earlier pull already live in the bundle.
            if standardized(&entry.content_path) == standardized(&destination)
                || is_up_to_date(&entry.content_path, &destination)
            {
                plan.skipped += 1;
                continue;
            }
            plan.copies.push(PlannedSkillCopy { entry, destination });
        }

        if self.environment.skill_lock_file.is_file() {
            plan.lock = Some((
                self.environment.skill_lock_file.clone(),
                repo.join(REPO_SKILL_LOCK_FILE),
            ));
        }
        plan
    }

    pub fn apply_push(&self, repo: &Path, plan: SkillsPushPlan) -> Result<SkillsPushReport, SyncError> {
        let bundle = repo_skills_dir(repo);
        fs::create_dir_all(&bundle).map_err(|e| SyncError::io(&bundle, e))?;

        let mut report = SkillsPushReport {
            skipped: plan.skipped,
            vendored: plan.vendored,
            ..SkillsPushReport::default()
        };

        for copy in &plan.copies {
            let content = &copy.entry.content_path;
            let copied = if content.is_dir() {
                copy_dir_recursive(content, &copy.destination).map(|_| ())
            } else {
                copy_file(content, &copy.destination).map(|_| ())
            };
            match copied {
                Ok(()) => report.copied += 1,
                Err(error) => {
                    warn!(skill = %copy.entry.name, %error, "failed to copy skill");
                    report.failed += 1;
                }
            }
        }

        // The lock tracks every installed skill, vendored ones included, so it
        // is refreshed regardless of per-skill freshness.
        if let Some((source, destination)) = &plan.lock {
            let before = fs::read(destination).ok();
            match copy_file(source, destination) {
                Ok(_) => {
                    report.lock_copied = true;
                    report.lock_changed =
                        before.as_deref() != fs::read(destination).ok().as_deref();
                }
                Err(error) => {
                    warn!(%error, "failed to copy skill lock");
                    report.failed += 1;
                }
            }
        }

        info!(
            copied = report.copied,
            skipped = report.skipped,
            vendored = report.vendored,
            "skill push finished"
        );
        Ok(report)
    }

    pub fn push_skills(&self, repo: &Path) -> Result<SkillsPushReport, SyncError> {
        let plan = self.plan_push(repo);
        self.apply_push(repo, plan)
    }

    /// Consumers that receive links: the primary skills directory always,
    /// secondary ones only when they already exist.
    pub fn consumers(&self) -> Vec<PathBuf> {
        let mut consumers = vec![self.environment.skills_directory.clone()];
        consumers.extend(
            self.environment
                .secondary_skill_consumers
                .iter()
                .filter(|dir| dir.is_dir())
                .cloned(),
        );
        consumers
    }

    /// Link every shared skill into every consumer. `linked` counts links
    /// created or repaired; `skipped` counts slots left as they were.
    pub fn pull_skills(&self, repo: &Path) -> Result<SkillsPullReport, SyncError> {
        let bundle = repo_skills_dir(repo);
        if !bundle.is_dir() {
            return Ok(SkillsPullReport::default());
        }

        let consumers = self.consumers();
        let mut report = SkillsPullReport {
            consumers: consumers.clone(),
            ..SkillsPullReport::default()
        };

        for name in bundle_entries(&bundle) {
            let shared = standardized(&bundle.join(&name));
            for consumer in &consumers {
                let link = consumer.join(&name);
                match ensure_link(&shared, &link) {
                    Ok(LinkOutcome::Created) | Ok(LinkOutcome::Repaired) => report.linked += 1,
                    Ok(LinkOutcome::Unchanged) => report.skipped += 1,
                    Ok(LinkOutcome::Conflict) => {
                        warn!(path = %link.display(), "real file occupies skill link slot; left untouched");
                        report.skipped += 1;
                        report.conflicts.push(SkillLinkConflict {
                            name: name.clone(),
                            path: link,
                        });
                    }
                    Err(error) => {
                        warn!(path = %link.display(), %error, "failed to link skill");
                        report.failed += 1;
                    }
                }
            }
        }

        let repo_lock = repo.join(REPO_SKILL_LOCK_FILE);
        if let Some(repo_time) = modified_time(&repo_lock) {
            let local_lock = &self.environment.skill_lock_file;
            let newer = modified_time(local_lock)
                .map(|local_time| repo_time > local_time)
                .unwrap_or(true);
            if newer {
                copy_file(&repo_lock, local_lock)?;
                report.lock_copied = true;
            }
        }

        info!(
            linked = report.linked,
            skipped = report.skipped,
            conflicts = report.conflicts.len(),
            "skill pull finished"
        );
        Ok(report)
    }

    pub fn skills_status(&self, repo: &Path) -> SkillsStatus {
        let bundle = repo_skills_dir(repo);
        let bundle_root = standardized(&bundle);

        let consumers = self
            .consumers()
            .into_iter()
            .map(|directory| {
                let linked = fs::read_dir(&directory)
                    .map(|entries| {
                        entries
                            .filter_map(Result::ok)
                            .filter_map(|entry| link_target(&entry.path()))
                            .filter(|target| standardized(target).starts_with(&bundle_root))
                            .count()
                    })
                    .unwrap_or(0);
                ConsumerLinkCount { directory, linked }
            })
            .collect();

        SkillsStatus {
            bundle_count: bundle_entries(&bundle).len(),
            consumers,
            has_lock: repo.join(REPO_SKILL_LOCK_FILE).is_file(),
        }
    }
}

/// Make `link` a symlink to `target` without ever replacing real content.
pub fn ensure_link(target: &Path, link: &Path) -> Result<LinkOutcome, SyncError> {
    if is_symlink(link) {
        if let Some(existing) = link_target(link) {
            if standardized(&existing) == standardized(target) {
                return Ok(LinkOutcome::Unchanged);
            }
        }
        remove_symlink(link)?;
        create_symlink(target, link)?;
        return Ok(LinkOutcome::Repaired);
    }

    if link.exists() {
        return Ok(LinkOutcome::Conflict);
    }

    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    create_symlink(target, link)?;
    Ok(LinkOutcome::Created)
}

/// Directory skills compare their `SKILL.md`; single-file skills compare themselves.
/// Only a strictly newer source needs copying.
fn is_up_to_date(content: &Path, destination: &Path) -> bool {
    let (source_marker, destination_marker) = if content.is_dir() {
        (content.join(SKILL_MARKER_FILE), destination.join(SKILL_MARKER_FILE))
    } else {
        (content.to_path_buf(), destination.to_path_buf())
    };

    match (modified_time(&source_marker), modified_time(&destination_marker)) {
        (Some(source), Some(destination)) => destination >= source,
        _ => false,
    }
}

fn bundle_entries(bundle: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(bundle) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name != PLACEHOLDER)
        .collect();
    names.sort();
    names
}
