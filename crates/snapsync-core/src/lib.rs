//! snapsync-core library.
//!
//! Lists the snapshots of a source and a destination directory, plans the
//! deletes and incremental copies that make the destination match the
//! source, and drives them through a pluggable executor.
//!
//! # Conventions
//!
//! - **Errors**: fatal conditions are [`SyncError`]; failed copies and deletes
//!   are data ([`TransferOutput`]), never errors.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod btrfs;
pub mod config;
pub mod error;
pub mod plan;
pub mod process;
pub mod reconcile;
pub mod repository;
pub mod snapshot;
pub mod transfer;

pub use error::{ErrorCode, SyncError};
pub use plan::{Operation, Plan};
pub use reconcile::{
    FailurePolicy, OperationRecord, OperationStatus, ReconcileOptions, ReconcileReport, Reconciler,
};
pub use repository::{SnapshotProbe, list_snapshots};
pub use snapshot::{SnapshotDescriptor, SnapshotIndex};
pub use transfer::{TransferExecutor, TransferOutput};
