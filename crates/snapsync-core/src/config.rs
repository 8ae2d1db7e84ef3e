use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::btrfs::BtrfsCli;
use crate::error::SyncError;
use crate::reconcile::FailurePolicy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Path or name of the btrfs binary.
    #[serde(default = "default_btrfs")]
    pub btrfs: PathBuf,
    /// Upper bound for a single copy or delete. Unbounded when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            btrfs: default_btrfs(),
            timeout_secs: None,
        }
    }
}

impl TransferConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn backend(&self) -> BtrfsCli {
        BtrfsCli::new(self.btrfs.clone(), self.timeout())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Abort on the first failed operation instead of continuing.
    #[serde(default)]
    pub strict: bool,
}

impl ReconcileConfig {
    #[must_use]
    pub const fn policy(&self) -> FailurePolicy {
        if self.strict {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        }
    }
}

/// Default user config location: `<config dir>/snapsync/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("snapsync/config.toml"))
}

/// Load `explicit` if given (it must exist), otherwise the default user
/// config if present, otherwise defaults.
///
/// # Errors
///
/// Returns [`SyncError::ConfigUnreadable`] or [`SyncError::ConfigParseError`].
pub fn load_config(explicit: Option<&Path>) -> Result<SyncConfig, SyncError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => read_config(&path),
        _ => Ok(SyncConfig::default()),
    }
}

fn read_config(path: &Path) -> Result<SyncConfig, SyncError> {
    let content = std::fs::read_to_string(path).map_err(|source| SyncError::ConfigUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str::<SyncConfig>(&content).map_err(|source| SyncError::ConfigParseError {
        path: path.to_path_buf(),
        source,
    })
}

fn default_btrfs() -> PathBuf {
    PathBuf::from("btrfs")
}
