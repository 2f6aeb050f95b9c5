//! Per-run outcome report

use crate::error::{CloudError, ErrorKind};
use crate::kind::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exit status of a run whose every object converged
pub const EXIT_OK: i32 = 0;
/// At least one object failed or was skipped
pub const EXIT_FAILURES: i32 = 1;
/// The spec document was rejected
pub const EXIT_SPEC_INVALID: i32 = 2;
/// Authentication against the identity service failed
pub const EXIT_AUTH_FAILED: i32 = 3;
/// The run deadline expired
pub const EXIT_TIMEOUT: i32 = 4;

/// Result of reconciling one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
    Failed,
    SkippedDependencyFailed,
}

impl Outcome {
    /// Whether dependents of an object with this outcome may run
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Created | Outcome::Updated | Outcome::Unchanged)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Created => write!(f, "created"),
            Outcome::Updated => write!(f, "updated"),
            Outcome::Unchanged => write!(f, "unchanged"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::SkippedDependencyFailed => write!(f, "skipped-dependency-failed"),
        }
    }
}

/// One line of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Object key, `<kind>:<symbolic key>`
    pub key: String,

    pub kind: ResourceKind,

    pub outcome: Outcome,

    /// Live ID when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Patched fields, partial progress and similar notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ReportEntry {
    pub fn new(kind: ResourceKind, key: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            key: key.into(),
            kind,
            outcome,
            id: None,
            error_kind: None,
            message: None,
            detail: None,
        }
    }

    pub fn failed(kind: ResourceKind, key: impl Into<String>, error: &CloudError) -> Self {
        Self {
            error_kind: Some(error.kind()),
            message: Some(error.message()),
            ..Self::new(kind, key, Outcome::Failed)
        }
    }

    pub fn skipped(kind: ResourceKind, key: impl Into<String>, failed_dependency: &str) -> Self {
        Self {
            error_kind: Some(ErrorKind::SkippedDependencyFailed),
            message: Some(format!("dependency {} did not converge", failed_dependency)),
            ..Self::new(kind, key, Outcome::SkippedDependencyFailed)
        }
    }
}

/// Full result of one reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub started_at: DateTime<Utc>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,

    pub dry_run: bool,

    /// Dispatch stopped on a cancellation signal
    pub cancelled: bool,

    /// Dispatch stopped because the run deadline expired
    pub timed_out: bool,

    /// The backend rejected our credentials during the run
    pub auth_failed: bool,

    /// Objects never dispatched because the run was cut short
    pub pending: usize,

    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            duration_ms: 0,
            dry_run,
            cancelled: false,
            timed_out: false,
            auth_failed: false,
            pending: 0,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    /// Sort entries by object key for stable output
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.key.cmp(&b.key));
    }

    pub fn entry(&self, key: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn entries_by_outcome(&self, outcome: Outcome) -> Vec<&ReportEntry> {
        self.entries.iter().filter(|e| e.outcome == outcome).collect()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            created: self.entries_by_outcome(Outcome::Created).len(),
            updated: self.entries_by_outcome(Outcome::Updated).len(),
            unchanged: self.entries_by_outcome(Outcome::Unchanged).len(),
            failed: self.entries_by_outcome(Outcome::Failed).len(),
            skipped: self
                .entries_by_outcome(Outcome::SkippedDependencyFailed)
                .len(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == EXIT_OK
    }

    pub fn exit_code(&self) -> i32 {
        if self.auth_failed {
            return EXIT_AUTH_FAILED;
        }
        if self.timed_out {
            return EXIT_TIMEOUT;
        }
        let summary = self.summary();
        if summary.failed > 0 || summary.skipped > 0 || self.cancelled {
            EXIT_FAILURES
        } else {
            EXIT_OK
        }
    }
}

/// Counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} failed, {} skipped",
            self.created, self.updated, self.unchanged, self.failed, self.skipped
        )
    }
}
