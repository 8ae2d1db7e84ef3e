//! btrfs-progs backed probe and executor.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chrono::DateTime;
use tracing::debug;

use crate::error::SyncError;
use crate::process::{self, ProcessOutput};
use crate::repository::SnapshotProbe;
use crate::snapshot::SnapshotDescriptor;
use crate::transfer::{TransferExecutor, TransferOutput};

const CREATION_TIME_PREFIX: &str = "Creation time:";
const CREATION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Shells out to the `btrfs` command line tool.
#[derive(Debug, Clone)]
pub struct BtrfsCli {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl Default for BtrfsCli {
    fn default() -> Self {
        Self::new("btrfs", None)
    }
}

impl BtrfsCli {
    /// `timeout` bounds copies and deletes; read-only queries are unbounded.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Make sure the binary can be started at all.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ToolUnavailable`] on spawn failure.
    pub fn check_available(&self) -> Result<(), SyncError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--version");
        let output = process::run(&mut cmd, None).map_err(|source| SyncError::ToolUnavailable {
            program: self.binary.display().to_string(),
            source,
        })?;
        debug!(version = %output.stdout.trim(), "btrfs available");
        Ok(())
    }

    fn show(&self, path: &Path) -> Option<ProcessOutput> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["subvolume", "show"]).arg(path);
        process::run(&mut cmd, None).ok()
    }

    fn spawn_failure(&self, err: &std::io::Error) -> TransferOutput {
        TransferOutput::failed(format!(
            "failed to start {}: {err}",
            self.binary.display()
        ))
    }
}

impl SnapshotProbe for BtrfsCli {
    fn is_snapshot(&self, path: &Path) -> bool {
        path.is_dir() && self.show(path).is_some_and(|out| out.success)
    }

    fn creation_time(&self, path: &Path) -> Result<i64, String> {
        match self.show(path) {
            Some(out) if out.success => parse_creation_time(&out.stdout),
            Some(out) => Err(out.stderr.trim().to_string()),
            None => Err(format!("failed to start {}", self.binary.display())),
        }
    }
}

impl TransferExecutor for BtrfsCli {
    fn copy(
        &self,
        snapshot: &SnapshotDescriptor,
        parent: Option<&SnapshotDescriptor>,
        destination: &Path,
    ) -> TransferOutput {
        let mut send = Command::new(&self.binary);
        send.arg("send");
        if let Some(parent) = parent {
            // `send -p` needs the parent on the sending filesystem, where the
            // same-named snapshot lives next to the one being sent.
            send.arg("-p").arg(snapshot.location.join(&parent.identifier));
        }
        send.arg(snapshot.path());

        let mut receive = Command::new(&self.binary);
        receive.arg("receive").arg(destination);

        process::run_pipeline(&mut send, &mut receive, self.timeout)
            .map_or_else(|err| self.spawn_failure(&err), TransferOutput::from)
    }

    fn delete(&self, snapshot: &SnapshotDescriptor) -> TransferOutput {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["subvolume", "delete"]).arg(snapshot.path());

        process::run(&mut cmd, self.timeout)
            .map_or_else(|err| self.spawn_failure(&err), TransferOutput::from)
    }
}

impl From<ProcessOutput> for TransferOutput {
    fn from(out: ProcessOutput) -> Self {
        Self {
            stdout: out.stdout,
            stderr: out.stderr,
            success: out.success,
            timed_out: out.timed_out,
        }
    }
}

/// Extract the `Creation time:` field of `btrfs subvolume show` output as
/// seconds since the epoch.
///
/// # Errors
///
/// Returns a reason when the field is absent or not a timestamp (btrfs
/// prints `-` for subvolumes without one).
pub fn parse_creation_time(show_output: &str) -> Result<i64, String> {
    let value = show_output
        .lines()
        .find_map(|line| line.trim().strip_prefix(CREATION_TIME_PREFIX))
        .map(str::trim)
        .ok_or_else(|| "no creation time in `subvolume show` output".to_string())?;

    DateTime::parse_from_str(value, CREATION_TIME_FORMAT)
        .map(|dt| dt.timestamp())
        .map_err(|err| format!("unparseable creation time '{value}': {err}"))
}
