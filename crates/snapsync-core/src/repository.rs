//! Listing the managed snapshots of one directory.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::SyncError;
use crate::reconcile::FailurePolicy;
use crate::snapshot::{SnapshotDescriptor, sort_by_creation};

/// Read-only queries against the storage subsystem.
pub trait SnapshotProbe {
    /// Whether `path` is a snapshot this tool manages. A `false` answer is
    /// not an error; the entry is simply ignored.
    fn is_snapshot(&self, path: &Path) -> bool;

    /// Creation time of the snapshot at `path`, in seconds since the epoch.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the timestamp cannot be resolved.
    fn creation_time(&self, path: &Path) -> Result<i64, String>;
}

/// List the snapshots directly inside `directory`, ascending by creation time.
///
/// Entries failing the probe are skipped silently. Entries whose creation
/// time cannot be resolved are skipped with a warning under
/// [`FailurePolicy::Continue`] and are fatal under [`FailurePolicy::Abort`].
///
/// # Errors
///
/// Returns [`SyncError::DirectoryUnreadable`] when `directory` cannot be
/// enumerated and [`SyncError::TimestampUnavailable`] as described above.
pub fn list_snapshots(
    probe: &dyn SnapshotProbe,
    directory: &Path,
    policy: FailurePolicy,
) -> Result<Vec<SnapshotDescriptor>, SyncError> {
    let unreadable = |source| SyncError::DirectoryUnreadable {
        path: directory.to_path_buf(),
        source,
    };

    let mut snapshots = Vec::new();
    for entry in fs::read_dir(directory).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();

        if !probe.is_snapshot(&path) {
            debug!(path = %path.display(), "not a snapshot, skipping");
            continue;
        }

        let creation_time = match probe.creation_time(&path) {
            Ok(ts) => ts,
            Err(reason) => match policy {
                FailurePolicy::Abort => {
                    return Err(SyncError::TimestampUnavailable { path, reason });
                }
                FailurePolicy::Continue => {
                    warn!(path = %path.display(), %reason, "skipping snapshot without creation time");
                    continue;
                }
            },
        };

        let identifier = entry.file_name().to_string_lossy().into_owned();
        snapshots.push(SnapshotDescriptor::new(identifier, creation_time, directory));
    }

    sort_by_creation(&mut snapshots);
    debug!(
        directory = %directory.display(),
        count = snapshots.len(),
        "listed snapshots"
    );
    Ok(snapshots)
}
