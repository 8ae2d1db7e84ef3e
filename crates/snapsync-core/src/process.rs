//! Blocking child-process execution with full output capture and an
//! optional deadline.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long to keep collecting output after a kill. Grandchildren that
/// inherited the pipes can hold them open indefinitely.
const DRAIN_AFTER_KILL: Duration = Duration::from_millis(500);

/// Captured output of a finished (or killed) command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub timed_out: bool,
}

/// Run `command` to completion, killing it once `timeout` elapses.
///
/// # Errors
///
/// Returns the spawn error when the program cannot be started.
pub fn run(command: &mut Command, timeout: Option<Duration>) -> io::Result<ProcessOutput> {
    debug!(?command, "spawning");
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = capture(child.stdout.take());
    let stderr = capture(child.stderr.take());
    let deadline = timeout.map(|t| Instant::now() + t);
    let status = wait(&mut [&mut child], deadline)?;
    let timed_out = status.is_none();

    Ok(ProcessOutput {
        stdout: collect(stdout, timed_out),
        stderr: collect(stderr, timed_out),
        success: status.is_some_and(|s| s.iter().all(ExitStatus::success)),
        timed_out,
    })
}

/// Run `producer | consumer`, capturing both stderr streams and the
/// consumer's stdout.
///
/// Success requires both sides to exit successfully.
///
/// # Errors
///
/// Returns the spawn error of whichever program could not be started.
pub fn run_pipeline(
    producer: &mut Command,
    consumer: &mut Command,
    timeout: Option<Duration>,
) -> io::Result<ProcessOutput> {
    debug!(?producer, ?consumer, "spawning pipeline");
    let mut upstream = producer
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let Some(stream) = upstream.stdout.take() else {
        kill(&mut upstream);
        return Err(io::Error::other("producer stdout was not captured"));
    };

    let spawned = consumer
        .stdin(Stdio::from(stream))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    // The command still owns the read end of the pipe. Drop it so the
    // producer gets EPIPE instead of blocking when the consumer exits early.
    consumer.stdin(Stdio::null());

    let mut downstream = match spawned {
        Ok(child) => child,
        Err(err) => {
            kill(&mut upstream);
            return Err(err);
        }
    };

    let upstream_err = capture(upstream.stderr.take());
    let stdout = capture(downstream.stdout.take());
    let stderr = capture(downstream.stderr.take());
    let deadline = timeout.map(|t| Instant::now() + t);
    let status = wait(&mut [&mut upstream, &mut downstream], deadline)?;
    let timed_out = status.is_none();

    let mut combined = collect(upstream_err, timed_out);
    combined.push_str(&collect(stderr, timed_out));

    Ok(ProcessOutput {
        stdout: collect(stdout, timed_out),
        stderr: combined,
        success: status.is_some_and(|s| s.iter().all(ExitStatus::success)),
        timed_out,
    })
}

/// Wait for every child. `None` means the deadline passed and all children
/// were killed.
fn wait(
    children: &mut [&mut Child],
    deadline: Option<Instant>,
) -> io::Result<Option<Vec<ExitStatus>>> {
    let mut statuses: Vec<Option<ExitStatus>> = vec![None; children.len()];
    loop {
        for (child, status) in children.iter_mut().zip(statuses.iter_mut()) {
            if status.is_none() {
                *status = child.try_wait()?;
            }
        }

        if statuses.iter().all(Option::is_some) {
            return Ok(Some(statuses.into_iter().flatten().collect()));
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("deadline exceeded, killing child processes");
            for child in children.iter_mut() {
                kill(child);
            }
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Read `stream` to EOF on a detached thread.
fn capture<R: Read + Send + 'static>(stream: Option<R>) -> Option<Receiver<String>> {
    stream.map(|mut stream| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stream.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// Wait for a captured stream. After a kill the wait is bounded and output
/// still held hostage by a surviving grandchild is given up.
fn collect(output: Option<Receiver<String>>, killed: bool) -> String {
    let Some(rx) = output else {
        return String::new();
    };
    if killed {
        rx.recv_timeout(DRAIN_AFTER_KILL).unwrap_or_else(|_| {
            debug!("output pipe still open after kill, abandoning reader");
            String::new()
        })
    } else {
        rx.recv().unwrap_or_default()
    }
}
