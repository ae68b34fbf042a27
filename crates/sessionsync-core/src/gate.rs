use crate::models::ScanReport;
use crate::secret_scan::{ScanCandidate, SecretScanner};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Scanning,
    Clean,
    Blocked,
    Bypassed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Clean(ScanReport),
    Blocked(ScanReport),
    /// Scanning was skipped on request; nothing was checked.
    Bypassed,
}

impl GateOutcome {
    pub fn allows_push(&self) -> bool {
        !matches!(self, Self::Blocked(_))
    }
}

/// Safety check standing between local data and the shared repository.
/// One gate is run once per push or sync.
#[derive(Debug)]
pub struct SecretGate {
    scanner: SecretScanner,
    state: GateState,
}

impl SecretGate {
    pub fn new(scanner: SecretScanner) -> Self {
        Self {
            scanner,
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn run(&mut self, candidates: &[ScanCandidate], bypass: bool) -> GateOutcome {
        if bypass {
            warn!("secret scan skipped on request; pushing unchecked");
            self.state = GateState::Bypassed;
            return GateOutcome::Bypassed;
        }

        if candidates.is_empty() {
            self.state = GateState::Clean;
            return GateOutcome::Clean(ScanReport::default());
        }

        self.state = GateState::Scanning;
        let report = self.scanner.scan(candidates);
        if report.findings.is_empty() {
            info!(files = report.files_scanned, "secret scan clean");
            self.state = GateState::Clean;
            GateOutcome::Clean(report)
        } else {
            warn!(
                findings = report.findings.len(),
                files = report.files_scanned,
                "secret scan blocked push"
            );
            self.state = GateState::Blocked;
            GateOutcome::Blocked(report)
        }
    }
}
