pub mod cache;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod gate;
pub mod manifest;
pub mod models;
pub mod paths;
pub mod pipeline;
pub mod repo_check;
pub mod scanner;
pub mod secret_scan;
pub mod sessions;
pub mod skills;
pub mod status;
pub mod transport;

pub use cache::{CacheState, FileCacheMarker, MemoryCacheMarker};
pub use config::{default_device_id, validated_device_id, SyncConfig, SyncConfigStore};
pub use error::SyncError;
pub use gate::{GateOutcome, GateState, SecretGate};
pub use manifest::Manifest;
pub use models::{
    CommitOutcome, ConsumerLinkCount, DeviceStatus, Finding, LastCommit, PullOutcome,
    RepoStatusInfo, ScanReport, SessionArtifact, SessionPullReport, SessionPushReport,
    SkillClass, SkillEntry, SkillLinkConflict, SkillsPullReport, SkillsPushReport, SkillsStatus,
    WorkingTreeStatus,
};
pub use paths::{SyncEnvironment, SyncPaths};
pub use pipeline::{PullSummary, PushOptions, PushOutcome, PushSummary, SyncPipeline, SyncSummary};
pub use repo_check::RepoVisibility;
pub use secret_scan::{IgnoreRules, ScanCandidate, SecretScanner};
pub use sessions::SessionSync;
pub use skills::{LinkOutcome, SkillResolver};
pub use transport::{GitRepository, Repository};
