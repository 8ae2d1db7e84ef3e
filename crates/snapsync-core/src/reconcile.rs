//! Driving a [`Plan`] through a [`TransferExecutor`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ErrorCode, SyncError};
use crate::plan::{Operation, plan};
use crate::repository::{SnapshotProbe, list_snapshots};
use crate::snapshot::SnapshotDescriptor;
use crate::transfer::{TransferExecutor, TransferOutput};

/// What to do when an external operation fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure, assume the intended state, keep going.
    #[default]
    Continue,
    /// Stop at the first failure; nothing after it is attempted.
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Log every operation without invoking the executor.
    pub dry_run: bool,
    pub policy: FailurePolicy,
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationStatus {
    /// Dry run: the operation would have been executed.
    Planned,
    Succeeded,
    Failed { code: &'static str },
    /// Skipped because an earlier failure aborted the run.
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    pub operation: Operation,
    #[serde(flatten)]
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<TransferOutput>,
}

impl OperationRecord {
    #[must_use]
    pub const fn failed(&self) -> bool {
        matches!(self.status, OperationStatus::Failed { .. })
    }

    #[must_use]
    pub const fn completed(&self) -> bool {
        matches!(
            self.status,
            OperationStatus::Succeeded | OperationStatus::Planned
        )
    }
}

/// Everything that happened during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub records: Vec<OperationRecord>,
    /// True when [`FailurePolicy::Abort`] stopped the run early.
    pub aborted: bool,
    /// Destination identifiers as believed after the run.
    pub destination: Vec<String>,
}

impl ReconcileReport {
    /// Deletes that succeeded (or would have, in a dry run).
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.count(|r| r.operation.is_delete() && r.completed())
    }

    /// Copies that succeeded (or would have, in a dry run).
    #[must_use]
    pub fn copied(&self) -> usize {
        self.count(|r| r.operation.is_copy() && r.completed())
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.count(OperationRecord::failed)
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failures() > 0
    }

    fn count(&self, pred: impl Fn(&OperationRecord) -> bool) -> usize {
        self.records.iter().filter(|&r| pred(r)).count()
    }
}

/// Converges a destination directory onto a source directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    options: ReconcileOptions,
}

impl Reconciler {
    #[must_use]
    pub const fn new(options: ReconcileOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub const fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// List both directories through `probe`, then [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Propagates listing errors and duplicate identifiers.
    pub fn sync(
        &self,
        probe: &dyn SnapshotProbe,
        executor: &dyn TransferExecutor,
        source_dir: &Path,
        destination_dir: &Path,
        on_event: impl FnMut(&OperationRecord),
    ) -> Result<ReconcileReport, SyncError> {
        let source = list_snapshots(probe, source_dir, self.options.policy)?;
        let destination = list_snapshots(probe, destination_dir, self.options.policy)?;
        info!(
            source = source.len(),
            destination = destination.len(),
            "listed snapshot directories"
        );
        self.run(&source, &destination, destination_dir, executor, on_event)
    }

    /// Delete orphans, then copy missing snapshots, reporting each record to
    /// `on_event` as soon as it is known.
    ///
    /// Under [`FailurePolicy::Continue`] a failed operation still updates the
    /// believed destination state, so later copies chain from it exactly as
    /// if it had succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DuplicateIdentifier`] before any operation runs if
    /// either listing repeats an identifier.
    pub fn run(
        &self,
        source: &[SnapshotDescriptor],
        destination: &[SnapshotDescriptor],
        destination_dir: &Path,
        executor: &dyn TransferExecutor,
        mut on_event: impl FnMut(&OperationRecord),
    ) -> Result<ReconcileReport, SyncError> {
        let plan = plan(source, destination, destination_dir)?;
        let mut state: Vec<SnapshotDescriptor> = destination.to_vec();
        let mut report = ReconcileReport {
            dry_run: self.options.dry_run,
            ..ReconcileReport::default()
        };

        for operation in plan.operations {
            if report.aborted {
                let record = OperationRecord {
                    operation,
                    status: OperationStatus::NotAttempted,
                    output: None,
                };
                on_event(&record);
                report.records.push(record);
                continue;
            }

            let (failure, output) = if self.options.dry_run {
                info!(dry_run = true, "would {operation}");
                (None, None)
            } else {
                let output = execute(&operation, destination_dir, executor);
                (failure_code(&operation, &output), Some(output))
            };

            let status = match failure {
                None if self.options.dry_run => OperationStatus::Planned,
                None => OperationStatus::Succeeded,
                Some(code) => {
                    let stderr = output.as_ref().map_or("", |o| o.stderr.trim());
                    warn!(code = code.code(), %stderr, "{operation} failed: {}", code.message());
                    OperationStatus::Failed { code: code.code() }
                }
            };

            if failure.is_some() && self.options.policy == FailurePolicy::Abort {
                warn!("aborting remaining operations");
                report.aborted = true;
            } else {
                apply(&mut state, &operation, destination_dir);
            }

            let record = OperationRecord {
                operation,
                status,
                output,
            };
            on_event(&record);
            report.records.push(record);
        }

        report.destination = state.into_iter().map(|s| s.identifier).collect();
        info!(
            deleted = report.deleted(),
            copied = report.copied(),
            failed = report.failures(),
            aborted = report.aborted,
            "reconciliation finished"
        );
        Ok(report)
    }
}

fn execute(
    operation: &Operation,
    destination_dir: &Path,
    executor: &dyn TransferExecutor,
) -> TransferOutput {
    info!("{operation}");
    match operation {
        Operation::Delete { snapshot } => executor.delete(snapshot),
        Operation::Copy { snapshot, parent } => {
            executor.copy(snapshot, parent.as_ref(), destination_dir)
        }
    }
}

/// `None` when the operation succeeded.
const fn failure_code(operation: &Operation, output: &TransferOutput) -> Option<ErrorCode> {
    if output.success {
        None
    } else if output.timed_out {
        Some(ErrorCode::Timeout)
    } else if operation.is_delete() {
        Some(ErrorCode::DeleteFailed)
    } else {
        Some(ErrorCode::TransferFailed)
    }
}

/// Record the intended effect of `operation` on the in-memory listing.
fn apply(state: &mut Vec<SnapshotDescriptor>, operation: &Operation, destination_dir: &Path) {
    match operation {
        Operation::Delete { snapshot } => state.retain(|s| s.identifier != snapshot.identifier),
        Operation::Copy { snapshot, .. } => state.push(snapshot.at(destination_dir)),
    }
}
