//! Output layer shared by the CLI: human progress lines or a JSON report.
//!
//! In human mode every operation is printed as soon as it finishes. In JSON
//! mode nothing is printed until the run completes, then the whole report
//! is written as one object so stdout stays machine-parseable.

use serde::Serialize;
use snapsync_core::{OperationRecord, OperationStatus, ReconcileReport};
use std::io::{self, Write};

/// Output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Anything the CLI prints in both modes.
pub trait Renderable {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()>;

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()>;
}

/// Render `item` to stdout using `mode`.
pub fn render_item<R: Renderable>(item: &R, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Human => item.render_human(&mut out),
        OutputMode::Json => {
            item.render_json(&mut out)?;
            writeln!(out)
        }
    }
}

fn write_json<T: Serialize>(w: &mut dyn Write, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, value).map_err(io::Error::from)
}

impl Renderable for OperationRecord {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        match &self.status {
            OperationStatus::Planned => writeln!(w, "[dry-run] {}", self.operation),
            OperationStatus::Succeeded => writeln!(w, "✓ {}", self.operation),
            OperationStatus::NotAttempted => {
                writeln!(w, "- {} (skipped after failure)", self.operation)
            }
            OperationStatus::Failed { code } => {
                writeln!(w, "✗ {} [{code}]", self.operation)?;
                let stderr = self.output.as_ref().map_or("", |o| o.stderr.trim());
                for line in stderr.lines() {
                    writeln!(w, "    {line}")?;
                }
                Ok(())
            }
        }
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        write_json(w, self)
    }
}

impl Renderable for ReconcileReport {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        if self.records.is_empty() {
            writeln!(w, "Already in sync ({} snapshot(s))", self.destination.len())?;
        }
        if self.aborted {
            writeln!(w, "Aborted after {} failure(s)", self.failures())?;
        }
        Ok(())
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        write_json(w, self)
    }
}
