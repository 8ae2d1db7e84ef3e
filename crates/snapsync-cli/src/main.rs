#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::Parser;
use output::OutputMode;
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "snapsync: mirror btrfs snapshots with incremental sends",
    long_about = "Make DST hold exactly the snapshots of SRC: snapshots missing from SRC are \
                  deleted from DST, then missing ones are sent oldest first, each incremental \
                  against the newest snapshot already in DST.",
    after_help = "EXAMPLES:\n    # Preview what would change\n    snapsync -d /mnt/pool/.snapshots /mnt/backup/snapshots\n\n    # Mirror, stopping at the first failure\n    snapsync --strict /mnt/pool/.snapshots /mnt/backup/snapshots\n\n    # Emit machine-readable output\n    snapsync --json /mnt/pool/.snapshots /mnt/backup/snapshots"
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit a JSON report instead of progress lines.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    sync: cmd::sync::SyncArgs,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

/// Filter used when `SNAPSYNC_LOG` is unset.
const fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "snapsync=debug,info"
    } else {
        "snapsync=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("SNAPSYNC_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let format = env::var("SNAPSYNC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(?cli, "parsed arguments");

    cmd::sync::run_sync(&cli.sync, cli.output_mode())
}
