//! Pure computation of the delete-then-copy sequence that converges a
//! destination listing onto a source listing.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::SyncError;
use crate::snapshot::{SnapshotDescriptor, SnapshotIndex, missing, orphans};

/// A single mutating step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Remove a destination snapshot that no longer exists in the source.
    Delete { snapshot: SnapshotDescriptor },
    /// Send a source snapshot, incrementally against `parent` when present.
    Copy {
        snapshot: SnapshotDescriptor,
        parent: Option<SnapshotDescriptor>,
    },
}

impl Operation {
    #[must_use]
    pub const fn snapshot(&self) -> &SnapshotDescriptor {
        match self {
            Self::Delete { snapshot } | Self::Copy { snapshot, .. } => snapshot,
        }
    }

    #[must_use]
    pub const fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }

    #[must_use]
    pub const fn is_copy(&self) -> bool {
        matches!(self, Self::Copy { .. })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete { snapshot } => write!(f, "delete {}", snapshot.path().display()),
            Self::Copy {
                snapshot,
                parent: Some(parent),
            } => write!(
                f,
                "copy {} (incremental from {})",
                snapshot.path().display(),
                parent.identifier
            ),
            Self::Copy {
                snapshot,
                parent: None,
            } => write!(f, "copy {} (full)", snapshot.path().display()),
        }
    }
}

/// Ordered operations: every delete, then every copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub operations: Vec<Operation>,
}

impl Plan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Plan the convergence of `destination` onto `source`.
///
/// Both listings must be ascending by creation time. Orphans are deleted
/// first, in destination order, so they can never serve as a copy parent.
/// Each missing source snapshot is then copied against the newest entry of
/// the destination as it stands after all earlier steps, which makes the
/// transfer chain strictly linear.
///
/// # Errors
///
/// Returns [`SyncError::DuplicateIdentifier`] if either listing repeats an
/// identifier.
pub fn plan(
    source: &[SnapshotDescriptor],
    destination: &[SnapshotDescriptor],
    destination_dir: &Path,
) -> Result<Plan, SyncError> {
    let source_index = SnapshotIndex::build(source)?;
    let destination_index = SnapshotIndex::build(destination)?;
    let stale = orphans(&source_index, &destination_index);
    let absent = missing(&source_index, &destination_index);

    let mut operations = Vec::with_capacity(stale.len() + absent.len());
    let mut newest: Option<SnapshotDescriptor> = None;

    for snapshot in destination {
        if stale.contains(snapshot.identifier.as_str()) {
            operations.push(Operation::Delete {
                snapshot: snapshot.clone(),
            });
        } else {
            newest = Some(snapshot.clone());
        }
    }

    for snapshot in source {
        if !absent.contains(snapshot.identifier.as_str()) {
            continue;
        }
        let parent = newest.replace(snapshot.at(destination_dir));
        operations.push(Operation::Copy {
            snapshot: snapshot.clone(),
            parent,
        });
    }

    Ok(Plan { operations })
}
