//! Structured results of a reconciliation
//!
//! The reconciler never logs inline. It returns one [`RecordChange`] per
//! provider-facing operation and callers decide what to do with them;
//! [`ChangeSet::log`] is the default consumer.

use crate::error::Error;
use crate::traits::RecordType;
use std::fmt;
use tracing::{debug, error, info};

/// What happened to a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Reading the existing records (only reported when it fails)
    Fetch,
    /// A record was created
    Create,
    /// A record's content was replaced
    Update,
    /// A record was deleted
    Delete,
    /// The record already had the desired content
    Keep,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Fetch => "fetch",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Keep => "keep",
        })
    }
}

/// Outcome of one provider-facing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    /// Record name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Record content involved, when known
    pub content: Option<String>,
    /// Operation attempted
    pub operation: Operation,
    /// Failure description, `None` on success
    pub error: Option<String>,
}

impl RecordChange {
    /// A successful operation
    pub fn ok(
        name: &str,
        record_type: RecordType,
        content: Option<&str>,
        operation: Operation,
    ) -> Self {
        Self {
            name: name.to_string(),
            record_type,
            content: content.map(str::to_string),
            operation,
            error: None,
        }
    }

    /// A failed operation
    pub fn failed(
        name: &str,
        record_type: RecordType,
        content: Option<&str>,
        operation: Operation,
        error: &Error,
    ) -> Self {
        Self {
            name: name.to_string(),
            record_type,
            content: content.map(str::to_string),
            operation,
            error: Some(error.to_string()),
        }
    }

    /// Whether the operation succeeded
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    fn log(&self) {
        let content = self.content.as_deref().unwrap_or("-");
        match (&self.error, self.operation) {
            (Some(err), operation) => error!(
                name = %self.name,
                record_type = %self.record_type,
                content,
                %operation,
                error = %err,
                "Record operation failed"
            ),
            (None, Operation::Keep) => debug!(
                name = %self.name,
                record_type = %self.record_type,
                content,
                "No change needed"
            ),
            (None, operation) => info!(
                name = %self.name,
                record_type = %self.record_type,
                content,
                %operation,
                "Record changed"
            ),
        }
    }
}

/// Counts per outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    /// Records created
    pub created: usize,
    /// Records updated in place
    pub updated: usize,
    /// Records deleted
    pub deleted: usize,
    /// Records already as desired
    pub unchanged: usize,
    /// Operations that failed
    pub failed: usize,
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} deleted={} unchanged={} failed={}",
            self.created, self.updated, self.deleted, self.unchanged, self.failed
        )
    }
}

/// Ordered list of record changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<RecordChange>,
}

impl ChangeSet {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one change
    pub fn push(&mut self, change: RecordChange) {
        self.changes.push(change);
    }

    /// Append every change of another set
    pub fn extend(&mut self, other: ChangeSet) {
        self.changes.extend(other.changes);
    }

    /// Iterate over the changes in order
    pub fn iter(&self) -> impl Iterator<Item = &RecordChange> {
        self.changes.iter()
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether no operation was attempted
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of successful operations
    pub fn succeeded(&self) -> usize {
        self.changes.iter().filter(|c| c.succeeded()).count()
    }

    /// Number of failed operations
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Whether every operation succeeded
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Count outcomes
    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        for change in &self.changes {
            if !change.succeeded() {
                summary.failed += 1;
                continue;
            }
            match change.operation {
                Operation::Create => summary.created += 1,
                Operation::Update => summary.updated += 1,
                Operation::Delete => summary.deleted += 1,
                Operation::Keep => summary.unchanged += 1,
                Operation::Fetch => {}
            }
        }
        summary
    }

    /// Emit one log line per change
    pub fn log(&self) {
        for change in &self.changes {
            change.log();
        }
    }

    /// Consume into the underlying list
    pub fn into_vec(self) -> Vec<RecordChange> {
        self.changes
    }
}

impl From<RecordChange> for ChangeSet {
    fn from(change: RecordChange) -> Self {
        Self {
            changes: vec![change],
        }
    }
}

/// Aggregate result of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Changes per target name, in execution order
    pub targets: Vec<(String, ChangeSet)>,
}

impl RunReport {
    /// Record the changes made for one name
    pub fn record(&mut self, name: impl Into<String>, changes: ChangeSet) {
        self.targets.push((name.into(), changes));
    }

    /// Total operations attempted
    pub fn total(&self) -> usize {
        self.targets.iter().map(|(_, changes)| changes.len()).sum()
    }

    /// Operations that succeeded
    pub fn succeeded(&self) -> usize {
        self.targets.iter().map(|(_, changes)| changes.succeeded()).sum()
    }

    /// Operations that failed
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Every operation succeeded and at least one ran
    pub fn is_success(&self) -> bool {
        self.total() > 0 && self.failed() == 0
    }

    /// The changes recorded for `name`
    pub fn changes_for(&self, name: &str) -> Option<&ChangeSet> {
        self.targets
            .iter()
            .find(|(target, _)| target == name)
            .map(|(_, changes)| changes)
    }

    /// Counts across all names
    pub fn summary(&self) -> ChangeSummary {
        let mut total = ChangeSummary::default();
        for (_, changes) in &self.targets {
            let summary = changes.summary();
            total.created += summary.created;
            total.updated += summary.updated;
            total.deleted += summary.deleted;
            total.unchanged += summary.unchanged;
            total.failed += summary.failed;
        }
        total
    }

    /// Emit the final summary line
    pub fn log_summary(&self) {
        let summary = self.summary();
        if self.is_success() {
            info!(
                succeeded = self.succeeded(),
                total = self.total(),
                %summary,
                "Completed: {}/{} operations succeeded",
                self.succeeded(),
                self.total()
            );
        } else {
            error!(
                succeeded = self.succeeded(),
                total = self.total(),
                %summary,
                "Completed with failures: {}/{} operations succeeded",
                self.succeeded(),
                self.total()
            );
        }
    }
}
