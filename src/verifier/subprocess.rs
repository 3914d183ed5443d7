//! External tool supervision.
//!
//! Each tool runs in its own process group with stdin and stdout closed, so
//! that killing it on timeout or interrupt also takes down any children it
//! spawned. Stderr is drained on a separate thread into a bounded buffer; it
//! feeds `fail_if_stderr` matching and the record's diagnostic.
//!
//! A tool can exit while a background child still holds stderr open. Waiting
//! for that pipe is bounded by the same deadline and shutdown flag as the
//! tool itself; when either fires, the group is killed.

use super::Verification;
use crate::outcome::Outcome;
use crate::registry::SubprocessSpec;
use crate::runtime::ShutdownCheck;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, warn};

const PATH_TOKEN: &str = "{path}";
const DEVNULL_TOKEN: &str = "{devnull}";

#[cfg(unix)]
const DEVNULL: &str = "/dev/null";
#[cfg(not(unix))]
const DEVNULL: &str = "NUL";

/// Stderr kept for matching and diagnostics; the rest is read and dropped.
const STDERR_CAP: usize = 64 * 1024;

/// Time a tool gets to exit after SIGTERM before it is killed outright.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

const POLL_MIN: Duration = Duration::from_millis(1);
const POLL_MAX: Duration = Duration::from_millis(50);

/// Why supervision stopped waiting for the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stopped {
    Exited(ExitStatus),
    TimedOut,
    Interrupted,
}

pub(super) fn run(
    path: &Path,
    spec: &SubprocessSpec,
    timeout: Option<Duration>,
    shutdown: &dyn ShutdownCheck,
) -> Verification {
    let program = spec.program();
    let Some(executable) = find_executable(program) else {
        debug!(tool = program, "Tool not found on PATH");
        return Verification::new(Outcome::tool_unavailable(program));
    };

    // Dropped (and removed) only after the child has been reaped.
    let scratch = if spec.use_temporary_dir {
        match TempDir::with_prefix("rotscan-") {
            Ok(dir) => Some(dir),
            Err(e) => {
                return Verification::new(Outcome::unverifiable(format!(
                    "could not create scratch directory: {e}"
                )));
            }
        }
    } else {
        None
    };

    let mut command = Command::new(&executable);
    command
        .args(build_args(&spec.argv[1..], path))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    if let Some(dir) = &scratch {
        command.current_dir(dir.path());
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!(tool = program, error = %e, "Failed to start tool");
            return Verification::new(Outcome::tool_unavailable(program))
                .with_diagnostic(Some(e.to_string()));
        }
    };

    let group = child.id();
    let stderr_rx = child.stderr.take().map(|mut stderr| {
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let mut kept = Vec::new();
            let _ = (&mut stderr).take(STDERR_CAP as u64).read_to_end(&mut kept);
            let _ = io::copy(&mut stderr, &mut io::sink());
            let _ = tx.send(String::from_utf8_lossy(&kept).into_owned());
        });
        rx
    });

    let deadline = timeout.map(|t| Instant::now() + t);
    let stopped = match supervise(&mut child, deadline, shutdown) {
        Ok(stopped) => stopped,
        Err(e) => {
            terminate(&mut child);
            return Verification::new(Outcome::unverifiable(format!(
                "lost track of {program}: {e}"
            )));
        }
    };

    let (stopped, stderr) = match (stopped, stderr_rx) {
        (stopped, None) => (stopped, String::new()),
        (Stopped::Exited(status), Some(rx)) => match drain_stderr(&rx, deadline, shutdown) {
            Ok(stderr) => (Stopped::Exited(status), stderr),
            Err(stopped) => {
                warn!(tool = program, "Tool left processes holding stderr open, killing process group");
                kill_group(group);
                (stopped, rx.recv_timeout(TERMINATE_GRACE).unwrap_or_default())
            }
        },
        (stopped, Some(rx)) => (stopped, rx.recv_timeout(TERMINATE_GRACE).unwrap_or_default()),
    };
    drop(scratch);

    let outcome = judge(program, stopped, &stderr, spec, timeout);
    let diagnostic = Some(stderr.trim().to_string()).filter(|s| !s.is_empty());
    Verification::new(outcome).with_diagnostic(diagnostic)
}

fn judge(
    program: &str,
    stopped: Stopped,
    stderr: &str,
    spec: &SubprocessSpec,
    timeout: Option<Duration>,
) -> Outcome {
    match stopped {
        Stopped::TimedOut => Outcome::failed(format!(
            "{program} timed out after {}s",
            timeout.map(|t| t.as_secs()).unwrap_or_default()
        )),
        Stopped::Interrupted => Outcome::failed("interrupted"),
        Stopped::Exited(status) => {
            if let Some(token) = &spec.fail_if_stderr
                && stderr.contains(token.as_str())
            {
                return Outcome::failed(format!("{program} reported '{token}' on stderr"));
            }
            if status.success() {
                return Outcome::Ok;
            }
            match status.code() {
                Some(code) => Outcome::failed(format!("{program} exited with status {code}")),
                None => Outcome::failed(format!("{program} was terminated by a signal")),
            }
        }
    }
}

/// Wait for the child while watching the deadline and the shutdown flag.
fn supervise(
    child: &mut Child,
    deadline: Option<Instant>,
    shutdown: &dyn ShutdownCheck,
) -> io::Result<Stopped> {
    let mut pause = POLL_MIN;

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Stopped::Exited(status));
        }
        if shutdown.should_stop() {
            terminate(child);
            return Ok(Stopped::Interrupted);
        }
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            warn!(pid = child.id(), "Tool exceeded its time limit, killing process group");
            terminate(child);
            return Ok(Stopped::TimedOut);
        }
        thread::sleep(pause);
        pause = (pause * 2).min(POLL_MAX);
    }
}

/// Wait for the stderr reader to finish, up to the tool's deadline.
fn drain_stderr(
    rx: &Receiver<String>,
    deadline: Option<Instant>,
    shutdown: &dyn ShutdownCheck,
) -> Result<String, Stopped> {
    loop {
        let wait = deadline.map_or(POLL_MAX, |d| {
            d.saturating_duration_since(Instant::now()).min(POLL_MAX)
        });
        match rx.recv_timeout(wait) {
            Ok(stderr) => return Ok(stderr),
            Err(RecvTimeoutError::Disconnected) => return Ok(String::new()),
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.should_stop() {
                    return Err(Stopped::Interrupted);
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Err(Stopped::TimedOut);
                }
            }
        }
    }
}

/// SIGKILL whatever is left of a process group whose leader was reaped.
#[cfg(unix)]
fn kill_group(group: u32) {
    if let Ok(pgid) = libc::pid_t::try_from(group) {
        // SAFETY: kill(2) has no memory-safety preconditions. A group id is
        // not handed out again while any member of the group is alive.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_group: u32) {}

/// Stop the child's whole process group and reap it.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        let _ = child.kill();
        let _ = child.wait();
        return;
    };

    // SAFETY: kill(2) has no memory-safety preconditions. The group id is the
    // child's pid because it was spawned with process_group(0), and the child
    // has not been reaped yet, so the id cannot have been recycled.
    unsafe {
        libc::kill(-pgid, libc::SIGTERM);
    }

    let grace_end = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < grace_end {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        thread::sleep(POLL_MAX);
    }

    // SAFETY: as above.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Expand the argument template for one file.
///
/// `{path}` and `{devnull}` are replaced wherever they occur. If the template
/// never mentions `{path}`, the path is appended as the final argument.
pub(crate) fn build_args(template: &[String], path: &Path) -> Vec<OsString> {
    let mut mentions_path = false;
    let mut args: Vec<OsString> = template
        .iter()
        .map(|arg| {
            if arg == PATH_TOKEN {
                mentions_path = true;
                return path.as_os_str().to_owned();
            }
            if arg.contains(PATH_TOKEN) {
                mentions_path = true;
                let expanded = arg
                    .replace(PATH_TOKEN, &path.to_string_lossy())
                    .replace(DEVNULL_TOKEN, DEVNULL);
                return OsString::from(expanded);
            }
            OsString::from(arg.replace(DEVNULL_TOKEN, DEVNULL))
        })
        .collect();

    if !mentions_path {
        args.push(path.as_os_str().to_owned());
    }
    args
}

/// Resolve `program` the way a shell would, without running it.
pub(crate) fn find_executable(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(program))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
