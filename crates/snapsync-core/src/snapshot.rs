//! Snapshot descriptors and per-directory identifier indexes.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::SyncError;

/// One managed snapshot as seen in a single directory.
///
/// Cross-directory identity is the `identifier` alone: a source and a
/// destination descriptor describe "the same snapshot" iff their identifiers
/// are equal. Equality, hashing and `Ord` all follow the identifier; use
/// [`sort_by_creation`] for chronological order.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotDescriptor {
    /// Final path component of the snapshot.
    pub identifier: String,
    /// Creation time in seconds since the Unix epoch.
    pub creation_time: i64,
    /// Directory this descriptor was read from (or synthesized for).
    pub location: PathBuf,
}

impl SnapshotDescriptor {
    pub fn new(
        identifier: impl Into<String>,
        creation_time: i64,
        location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            creation_time,
            location: location.into(),
        }
    }

    /// Full path of the snapshot: `location/identifier`.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.location.join(&self.identifier)
    }

    /// Descriptor for the copy of this snapshot inside `location`.
    ///
    /// Used after a copy without re-querying storage.
    #[must_use]
    pub fn at(&self, location: &Path) -> Self {
        Self {
            identifier: self.identifier.clone(),
            creation_time: self.creation_time,
            location: location.to_path_buf(),
        }
    }
}

impl PartialEq for SnapshotDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for SnapshotDescriptor {}

impl Hash for SnapshotDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl PartialOrd for SnapshotDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SnapshotDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identifier.cmp(&other.identifier)
    }
}

/// Sort ascending by creation time. Ties keep discovery order.
pub fn sort_by_creation(snapshots: &mut [SnapshotDescriptor]) {
    snapshots.sort_by_key(|s| s.creation_time);
}

/// Identifier set of one listing.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndex<'a> {
    ids: BTreeSet<&'a str>,
}

impl<'a> SnapshotIndex<'a> {
    /// Build an index, rejecting listings that repeat an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DuplicateIdentifier`] for the first repeated name.
    pub fn build(snapshots: &'a [SnapshotDescriptor]) -> Result<Self, SyncError> {
        let mut ids = BTreeSet::new();
        for snapshot in snapshots {
            if !ids.insert(snapshot.identifier.as_str()) {
                return Err(SyncError::DuplicateIdentifier {
                    identifier: snapshot.identifier.clone(),
                    location: snapshot.location.clone(),
                });
            }
        }
        Ok(Self { ids })
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.ids.contains(identifier)
    }

    /// Identifiers present here but absent from `other`.
    #[must_use]
    pub fn difference(&self, other: &SnapshotIndex<'_>) -> BTreeSet<&'a str> {
        self.ids
            .iter()
            .filter(|id| !other.contains(id))
            .copied()
            .collect()
    }
}

/// Destination identifiers with no source counterpart.
#[must_use]
pub fn orphans<'a>(
    source: &SnapshotIndex<'_>,
    destination: &SnapshotIndex<'a>,
) -> BTreeSet<&'a str> {
    destination.difference(source)
}

/// Source identifiers with no destination counterpart.
#[must_use]
pub fn missing<'a>(
    source: &SnapshotIndex<'a>,
    destination: &SnapshotIndex<'_>,
) -> BTreeSet<&'a str> {
    source.difference(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: &str, ts: i64, dir: &str) -> SnapshotDescriptor {
        SnapshotDescriptor::new(id, ts, dir)
    }

    #[test]
    fn path_joins_location_and_identifier() {
        let s = snap("2024-01-01", 10, "/mnt/src");
        assert_eq!(s.path(), PathBuf::from("/mnt/src/2024-01-01"));
    }

    #[test]
    fn at_moves_descriptor_to_new_location() {
        let s = snap("a", 10, "/mnt/src");
        let copy = s.at(Path::new("/mnt/dst"));
        assert_eq!(copy.identifier, "a");
        assert_eq!(copy.creation_time, 10);
        assert_eq!(copy.location, PathBuf::from("/mnt/dst"));
    }

    #[test]
    fn sort_is_ascending_and_stable_on_ties() {
        let mut list = vec![snap("c", 30, "/s"), snap("x", 10, "/s"), snap("y", 10, "/s")];
        sort_by_creation(&mut list);
        let ids: Vec<_> = list.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(ids, ["x", "y", "c"]);
    }

    #[test]
    fn index_rejects_duplicates() {
        let list = vec![snap("a", 1, "/s"), snap("a", 2, "/s")];
        let err = SnapshotIndex::build(&list).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateIdentifier { ref identifier, .. } if identifier == "a"));
    }

    #[test]
    fn orphans_and_missing_are_key_differences() {
        let src = vec![snap("a", 1, "/s"), snap("b", 2, "/s")];
        let dst = vec![snap("b", 2, "/d"), snap("z", 0, "/d")];
        let src_idx = SnapshotIndex::build(&src).unwrap();
        let dst_idx = SnapshotIndex::build(&dst).unwrap();

        assert_eq!(orphans(&src_idx, &dst_idx).into_iter().collect::<Vec<_>>(), ["z"]);
        assert_eq!(missing(&src_idx, &dst_idx).into_iter().collect::<Vec<_>>(), ["a"]);
        assert!(dst_idx.contains("b"));
    }

    #[test]
    fn identity_is_the_identifier() {
        let source = snap("a", 10, "/mnt/src");
        let copy = source.at(Path::new("/mnt/dst"));
        assert_eq!(source, copy);
        assert_ne!(source, snap("b", 10, "/mnt/src"));

        let mut by_name = vec![snap("c", 1, "/s"), snap("a", 3, "/s"), snap("b", 2, "/s")];
        by_name.sort();
        let ids: Vec<_> = by_name.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
