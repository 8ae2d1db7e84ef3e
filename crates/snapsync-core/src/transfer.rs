//! Mutating operations against the storage subsystem.

use std::path::Path;

use serde::Serialize;

use crate::snapshot::SnapshotDescriptor;

/// Captured result of one copy or delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    /// Set when the operation was killed after exceeding its time limit.
    pub timed_out: bool,
}

impl TransferOutput {
    #[must_use]
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            success: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            ..Self::default()
        }
    }
}

/// Copies and deletes snapshots.
///
/// Implementations never return an error: every failure, including failing
/// to start the underlying tool, is reported through [`TransferOutput`].
pub trait TransferExecutor {
    /// Copy `snapshot` into `destination`. With a `parent` the copy is an
    /// incremental transfer relative to it, otherwise a full transfer.
    fn copy(
        &self,
        snapshot: &SnapshotDescriptor,
        parent: Option<&SnapshotDescriptor>,
        destination: &Path,
    ) -> TransferOutput;

    /// Delete `snapshot`.
    fn delete(&self, snapshot: &SnapshotDescriptor) -> TransferOutput;
}
