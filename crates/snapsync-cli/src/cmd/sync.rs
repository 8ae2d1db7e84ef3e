//! `snapsync SRC DST`: mirror the snapshots of SRC into DST.

use anyhow::Result;
use clap::Args;
use snapsync_core::config::{SyncConfig, load_config};
use snapsync_core::{ReconcileOptions, Reconciler, SyncError};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::output::{OutputMode, render_item};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Directory holding the source snapshots.
    #[arg(value_name = "SRC")]
    pub src: PathBuf,

    /// Directory receiving the snapshot copies.
    #[arg(value_name = "DST")]
    pub dst: PathBuf,

    /// Print the intended operations without performing any of them.
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Stop at the first failed copy or delete and exit non-zero.
    #[arg(long)]
    pub strict: bool,

    /// Kill a copy or delete that runs longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// btrfs binary to invoke.
    #[arg(long, value_name = "PATH")]
    pub btrfs: Option<PathBuf>,

    /// Config file (default: <config dir>/snapsync/config.toml if present).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl SyncArgs {
    /// Layer command-line overrides on top of the loaded config.
    fn apply(&self, mut config: SyncConfig) -> SyncConfig {
        if self.strict {
            config.reconcile.strict = true;
        }
        if let Some(secs) = self.timeout {
            config.transfer.timeout_secs = Some(secs);
        }
        if let Some(btrfs) = &self.btrfs {
            config.transfer.btrfs.clone_from(btrfs);
        }
        config
    }
}

/// Entry point wired from `main.rs`.
pub fn run_sync(args: &SyncArgs, output: OutputMode) -> Result<()> {
    let config = args.apply(load_config(args.config.as_deref()).map_err(with_hint)?);
    debug!(?config, "resolved configuration");

    let options = ReconcileOptions {
        dry_run: args.dry_run,
        policy: config.reconcile.policy(),
    };
    ensure_dir(&args.src)?;
    ensure_dir(&args.dst)?;

    let backend = config.transfer.backend();
    backend.check_available().map_err(with_hint)?;

    let report = Reconciler::new(options)
        .sync(&backend, &backend, &args.src, &args.dst, |record| {
            if !output.is_json() {
                if let Err(err) = render_item(record, output) {
                    warn!(%err, "failed to write progress");
                }
            }
        })
        .map_err(with_hint)?;

    render_item(&report, output)?;

    if config.reconcile.strict && report.has_failures() {
        anyhow::bail!(
            "{} of {} operation(s) failed",
            report.failures(),
            report.records.len()
        );
    }

    Ok(())
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        anyhow::bail!("{} is not a directory", path.display());
    }
    Ok(())
}

/// Prefix the stable error code and append the remediation hint.
fn with_hint(err: SyncError) -> anyhow::Error {
    match err.hint() {
        Some(hint) => anyhow::anyhow!("{}: {err}\nhint: {hint}", err.code()),
        None => anyhow::anyhow!("{}: {err}", err.code()),
    }
}
