use crate::cache::CacheState;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::gate::{GateOutcome, SecretGate};
use crate::models::{
    CommitOutcome, ScanReport, SessionPullReport, SessionPushReport, SkillsPullReport,
    SkillsPushReport,
};
use crate::paths::SyncEnvironment;
use crate::secret_scan::{
    merge_candidates, planned_candidates, repository_candidates, ScanCandidate, SecretScanner,
};
use crate::sessions::{SessionPushPlan, SessionSync};
use crate::skills::{SkillResolver, SkillsPushPlan};
use crate::transport::Repository;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Skip the secret scan entirely. The push proceeds unchecked.
    pub skip_secret_scan: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSummary {
    pub sessions: SessionPushReport,
    pub skills: SkillsPushReport,
    pub commit: CommitOutcome,
    pub gate: GateOutcome,
}

impl PushSummary {
    /// Nothing reached the repository history because the transport failed.
    pub fn is_fatal(&self) -> bool {
        !self.commit.committed && self.commit.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The gate found secrets; nothing was copied and the repository is untouched.
    Blocked(ScanReport),
    NothingToPush {
        sessions: SessionPushReport,
        skills: SkillsPushReport,
        gate: GateOutcome,
    },
    Pushed(PushSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSummary {
    pub sessions: SessionPullReport,
    pub skills: SkillsPullReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub pull: PullSummary,
    pub push: PushOutcome,
}

/// Sequential pull → scan → push pipeline over one configured repository.
pub struct SyncPipeline<'a> {
    config: &'a SyncConfig,
    sessions: SessionSync,
    skills: SkillResolver,
    transport: &'a dyn Repository,
    cache: &'a dyn CacheState,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        config: &'a SyncConfig,
        environment: SyncEnvironment,
        transport: &'a dyn Repository,
        cache: &'a dyn CacheState,
    ) -> Self {
        Self {
            config,
            sessions: SessionSync::new(environment.clone()),
            skills: SkillResolver::new(environment),
            transport,
            cache,
        }
    }

    fn repo(&self) -> &Path {
        &self.config.repo_path
    }

    pub fn sessions(&self) -> &SessionSync {
        &self.sessions
    }

    pub fn skills(&self) -> &SkillResolver {
        &self.skills
    }

    pub fn pull(&self) -> Result<PullSummary, SyncError> {
        let sessions = self
            .sessions
            .pull_sessions(self.repo(), self.transport, self.cache)?;
        let skills = self.skills.pull_skills(self.repo())?;
        Ok(PullSummary { sessions, skills })
    }

    /// Run the secret scan over what a push would send, without pushing.
    pub fn scan(&self) -> ScanReport {
        let session_plan = self.sessions.plan_push(self.repo(), &self.config.device);
        let skill_plan = self.skills.plan_push(self.repo());
        let candidates = self.candidates(&session_plan, &skill_plan);
        SecretScanner::for_repo(self.repo()).scan(&candidates)
    }

    pub fn push(&self, options: PushOptions) -> Result<PushOutcome, SyncError> {
        let repo = self.repo();
        let device = &self.config.device;

        let session_plan = self.sessions.plan_push(repo, device);
        let skill_plan = self.skills.plan_push(repo);

        let candidates = if options.skip_secret_scan {
            Vec::new()
        } else {
            self.candidates(&session_plan, &skill_plan)
        };
        let mut gate = SecretGate::new(SecretScanner::for_repo(repo));
        let gate_outcome = gate.run(&candidates, options.skip_secret_scan);
        if let GateOutcome::Blocked(report) = &gate_outcome {
            return Ok(PushOutcome::Blocked(report.clone()));
        }

        let skills = self.skills.apply_push(repo, skill_plan)?;
        let sessions = self.sessions.apply_push(session_plan);

        if sessions.copied == 0 && !skills.has_changes() {
            info!("nothing to push");
            return Ok(PushOutcome::NothingToPush {
                sessions,
                skills,
                gate: gate_outcome,
            });
        }

        let message = push_message(device, &sessions, &skills);
        let commit = self.transport.commit_and_push(repo, &message);
        info!(
            committed = commit.committed,
            pushed = commit.pushed,
            "push finished"
        );
        Ok(PushOutcome::Pushed(PushSummary {
            sessions,
            skills,
            commit,
            gate: gate_outcome,
        }))
    }

    /// Pull first so local state reflects peers, then gate and push.
    pub fn sync(&self, options: PushOptions) -> Result<SyncSummary, SyncError> {
        let pull = self.pull()?;
        let push = self.push(options)?;
        Ok(SyncSummary { pull, push })
    }

    fn candidates(
        &self,
        session_plan: &SessionPushPlan,
        skill_plan: &SkillsPushPlan,
    ) -> Vec<ScanCandidate> {
        let mut files = session_plan.files();
        files.extend(skill_plan.files());
        merge_candidates(
            planned_candidates(self.repo(), &files),
            repository_candidates(self.repo(), self.transport),
        )
    }
}

fn push_message(device: &str, sessions: &SessionPushReport, skills: &SkillsPushReport) -> String {
    let mut parts = Vec::new();
    if sessions.copied > 0 {
        parts.push(format!("{} session(s)", sessions.copied));
    }
    if skills.copied > 0 {
        parts.push(format!("{} skill(s)", skills.copied));
    }
    if skills.lock_changed {
        parts.push(String::from("skill lock"));
    }
    format!("sync({device}): {} updated", parts.join(", "))
}
