//! E2E tests for `snapsync` against a fake `btrfs` script.
//!
//! The fake treats a directory as a snapshot when it holds a `.ctime` file
//! (its creation time). `send` emits the snapshot path on stdout and
//! `receive` copies that path into the destination, so the pipeline behaves
//! like the real thing. Every invocation is appended to a log file.

#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FAKE_BTRFS: &str = r#"#!/bin/sh
[ -n "$FAKE_BTRFS_LOG" ] && echo "$*" >> "$FAKE_BTRFS_LOG"
case "$1" in
  --version)
    echo "btrfs-progs v6.6 (fake)"
    ;;
  subvolume)
    case "$2" in
      show)
        if [ -f "$3/.ctime" ]; then
          printf '%s\n\tName: \t\t\t%s\n\tCreation time: \t\t%s\n' "$3" "$(basename "$3")" "$(cat "$3/.ctime")"
        else
          echo "ERROR: Not a Btrfs subvolume: $3" >&2
          exit 1
        fi
        ;;
      delete)
        rm -rf "$3" && echo "Delete subvolume (no-commit): '$3'"
        ;;
    esac
    ;;
  send)
    while [ $# -gt 1 ]; do shift; done
    echo "$1"
    ;;
  receive)
    read -r src
    if [ -f "$(dirname "$src")/.fail-$(basename "$src")" ]; then
      echo "ERROR: receive failed for $src" >&2
      exit 1
    fi
    cp -r "$src" "$2/" && echo "At subvol $(basename "$src")"
    ;;
  *)
    echo "unsupported: $*" >&2
    exit 2
    ;;
esac
"#;

struct Fixture {
    _root: TempDir,
    src: PathBuf,
    dst: PathBuf,
    btrfs: PathBuf,
    log: PathBuf,
    config_home: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        let src = root.path().join("src");
        let dst = root.path().join("dst");
        let config_home = root.path().join("config");
        fs::create_dir_all(&src).expect("src dir");
        fs::create_dir_all(&dst).expect("dst dir");
        fs::create_dir_all(&config_home).expect("config dir");

        let btrfs = root.path().join("btrfs");
        fs::write(&btrfs, FAKE_BTRFS).expect("write fake btrfs");
        fs::set_permissions(&btrfs, fs::Permissions::from_mode(0o755)).expect("chmod");

        let log = root.path().join("btrfs.log");
        Self {
            src,
            dst,
            btrfs,
            log,
            config_home,
            _root: root,
        }
    }

    fn snapshot(dir: &Path, name: &str, day: u32) {
        let path = dir.join(name);
        fs::create_dir_all(&path).expect("snapshot dir");
        fs::write(
            path.join(".ctime"),
            format!("2024-01-{day:02} 10:00:00 +0000"),
        )
        .expect("ctime");
    }

    fn src_snapshot(&self, name: &str, day: u32) {
        Self::snapshot(&self.src, name, day);
    }

    fn dst_snapshot(&self, name: &str, day: u32) {
        Self::snapshot(&self.dst, name, day);
    }

    fn fail_receive(&self, name: &str) {
        fs::write(self.src.join(format!(".fail-{name}")), "").expect("fail marker");
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("snapsync"));
        cmd.env("SNAPSYNC_LOG", "error");
        cmd.env("FAKE_BTRFS_LOG", &self.log);
        cmd.env("XDG_CONFIG_HOME", &self.config_home);
        cmd.arg("--btrfs").arg(&self.btrfs);
        cmd
    }

    fn run(&self, extra: &[&str]) -> assert_cmd::assert::Assert {
        self.cmd().args(extra).arg(&self.src).arg(&self.dst).assert()
    }

    /// Mutating invocations recorded by the fake, with the source prefix stripped.
    fn mutations(&self) -> Vec<String> {
        let log = fs::read_to_string(&self.log).unwrap_or_default();
        let prefix = format!("{}/", self.src.display());
        let dst_prefix = format!("{}/", self.dst.display());
        log.lines()
            .filter(|l| l.starts_with("send") || l.starts_with("subvolume delete"))
            .map(|l| l.replace(&prefix, "").replace(&dst_prefix, ""))
            .collect()
    }

    fn dst_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.dst)
            .expect("read dst")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[test]
fn help_lists_dry_run_flag() {
    Command::new(assert_cmd::cargo::cargo_bin!("snapsync"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn missing_destination_is_fatal() {
    let fx = Fixture::new();
    fx.cmd()
        .arg(&fx.src)
        .arg(fx.dst.join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
}

#[test]
fn initial_sync_sends_a_linear_chain() {
    let fx = Fixture::new();
    fx.src_snapshot("c", 3);
    fx.src_snapshot("a", 1);
    fx.src_snapshot("b", 2);

    fx.run(&[])
        .success()
        .stdout(predicate::str::contains("✓ copy"));

    assert_eq!(fx.mutations(), ["send a", "send -p a b", "send -p b c"]);
    assert_eq!(fx.dst_entries(), ["a", "b", "c"]);
}

#[test]
fn orphans_are_deleted_before_copies() {
    let fx = Fixture::new();
    fx.src_snapshot("y", 2);
    fx.src_snapshot("z", 3);
    fx.dst_snapshot("x", 1);
    fx.dst_snapshot("y", 2);

    fx.run(&[]).success();

    assert_eq!(fx.mutations(), ["subvolume delete x", "send -p y z"]);
    assert_eq!(fx.dst_entries(), ["y", "z"]);
}

#[test]
fn dry_run_changes_nothing() {
    let fx = Fixture::new();
    fx.src_snapshot("a", 1);
    fx.dst_snapshot("old", 1);

    fx.run(&["-d"])
        .success()
        .stdout(predicate::str::contains("[dry-run] delete"))
        .stdout(predicate::str::contains("[dry-run] copy"));

    assert!(fx.mutations().is_empty());
    assert_eq!(fx.dst_entries(), ["old"]);
}

#[test]
fn second_run_reports_in_sync() {
    let fx = Fixture::new();
    fx.src_snapshot("a", 1);
    fx.src_snapshot("b", 2);

    fx.run(&[]).success();
    fx.run(&[])
        .success()
        .stdout(predicate::str::contains("Already in sync (2 snapshot(s))"));

    assert_eq!(fx.mutations().len(), 2);
}

#[test]
fn failed_copy_is_logged_but_exit_is_zero() {
    let fx = Fixture::new();
    fx.src_snapshot("a", 1);
    fx.src_snapshot("b", 2);
    fx.src_snapshot("c", 3);
    fx.fail_receive("b");

    fx.run(&[])
        .success()
        .stdout(predicate::str::contains("✗ copy"))
        .stdout(predicate::str::contains("receive failed"));

    assert_eq!(fx.mutations(), ["send a", "send -p a b", "send -p b c"]);
}

#[test]
fn strict_mode_stops_and_fails() {
    let fx = Fixture::new();
    fx.src_snapshot("a", 1);
    fx.src_snapshot("b", 2);
    fx.src_snapshot("c", 3);
    fx.fail_receive("b");

    fx.run(&["--strict"])
        .failure()
        .stdout(predicate::str::contains("skipped after failure"))
        .stderr(predicate::str::contains("1 of 3 operation(s) failed"));

    assert_eq!(fx.mutations(), ["send a", "send -p a b"]);
}

#[test]
fn json_report_is_machine_readable() {
    let fx = Fixture::new();
    fx.src_snapshot("a", 1);
    fx.dst_snapshot("gone", 1);

    let output = fx
        .cmd()
        .arg("--json")
        .arg(&fx.src)
        .arg(&fx.dst)
        .output()
        .expect("run snapsync");
    assert!(
        output.status.success(),
        "snapsync failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let records = report["records"].as_array().expect("records array");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["operation"]["op"], "delete");
    assert_eq!(records[1]["operation"]["op"], "copy");
    assert_eq!(records[1]["status"], "succeeded");
    assert_eq!(report["destination"], serde_json::json!(["a"]));
}

#[test]
fn config_file_enables_strict_mode() {
    let fx = Fixture::new();
    fx.src_snapshot("a", 1);
    fx.src_snapshot("b", 2);
    fx.fail_receive("a");

    let config = fx.config_home.join("snapsync.toml");
    fs::write(&config, "[reconcile]\nstrict = true\n").expect("write config");

    fx.run(&["--config", config.to_str().expect("utf-8 path")])
        .failure();

    assert_eq!(fx.mutations(), ["send a"]);
}

#[test]
fn broken_config_fails_with_code_and_hint() {
    let fx = Fixture::new();
    let config = fx.config_home.join("broken.toml");
    fs::write(&config, "[transfer\n").expect("write config");

    fx.run(&["--config", config.to_str().expect("utf-8 path")])
        .failure()
        .stderr(predicate::str::contains("E2102"))
        .stderr(predicate::str::contains("hint:"));

    assert!(fx.mutations().is_empty());
}

#[test]
fn failed_first_copy_still_sends_the_rest() {
    let fx = Fixture::new();
    fx.src_snapshot("a", 1);
    fx.src_snapshot("b", 2);
    fx.fail_receive("a");

    fx.run(&["--timeout", "30"])
        .success()
        .stdout(predicate::str::contains("✗ copy"))
        .stdout(predicate::str::contains("✓ copy"));

    assert_eq!(fx.mutations(), ["send a", "send -p a b"]);
}
