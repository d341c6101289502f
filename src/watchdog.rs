//! Per-session watchdog: PID-namespace isolation, wall-clock deadline,
//! submission archival, scratch cleanup.
//!
//! The clone/sleep/kill sequencing follows a fork-based watchdog: a timed
//! `waitpid` loop and `kill(-pid, SIGKILL)` on timeout. Here the watchdog
//! is the parent of a single cloned PID namespace rather than a sibling
//! thread inside a long-lived process, since this supervisor only ever
//! runs one session before exiting.

use std::io::Read;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::Path;
use std::time::{Duration, Instant};

use nix::sched::{CloneFlags, clone};
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use walkdir::WalkDir;

use crate::config::{SupervisorConfig, limits};
use crate::error::SandboxError;
use crate::random::RandomSource;
use crate::{scratch, session, submission};

/// Removes its scratch tree on drop, so a scratch directory is never left
/// behind regardless of which `?` in [`supervise`] returns early — the
/// cleanup invariant holds on every exit path, not just the one that
/// reaches the end of the function.
struct CleanupGuard {
    path: std::path::PathBuf,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        cleanup(&self.path);
    }
}

/// Run one full session end to end: provision, compile, run, archive the
/// submission, and remove both scratch trees — bounded by a fixed
/// wall-clock deadline regardless of what the submitted workload does.
pub fn supervise(
    config: &SupervisorConfig,
    template_dir: &Path,
    source: &mut dyn RandomSource,
    submission_in: &mut dyn Read,
) -> Result<Vec<u8>, SandboxError> {
    let build = scratch::tempdir(&config.build_base(), source)?;
    let build_path = build.path.clone();
    let _build_guard = CleanupGuard { path: build_path.clone() };

    let run = scratch::tempdir(&config.run_base(), source)?;
    let run_path = run.path.clone();
    let _run_guard = CleanupGuard { path: run_path.clone() };

    let mut submission_buf = Vec::new();
    submission_in
        .take(limits::SUBMISSION_CAP as u64)
        .read_to_end(&mut submission_buf)
        .map_err(SandboxError::Io)?;

    // The child closure must be `'static` (nix's `clone` takes a boxed
    // trait object), so everything it needs is moved in by value. The
    // paths were already cloned out above: the parent still needs them
    // afterward, for archival and cleanup, once `build`/`run` themselves
    // belong to the child.
    let template_dir = template_dir.to_path_buf();

    let (read_end, write_end) = nix::unistd::pipe().map_err(SandboxError::from)?;
    let write_fd = write_end.as_raw_fd();

    let mut stack = vec![0u8; 2 * 1024 * 1024];
    let child_body: Box<dyn FnMut() -> isize> = Box::new(move || {
        let mut cursor = std::io::Cursor::new(&submission_buf);
        let outcome = session::drive_session(&build, &run, &template_dir, &mut cursor);
        let bytes = outcome.unwrap_or_else(|e| format!("internal error: {e}\n").into_bytes());
        write_all(write_fd, &bytes);
        0
    });

    // SAFETY: the child runs in its own PID namespace and touches only fds
    // and directories already owned by this process; it never returns
    // across the clone boundary except via the isize it evaluates to.
    let child_pid = unsafe { clone(child_body, &mut stack, CloneFlags::CLONE_NEWPID, Some(libc::SIGCHLD)) }
        .map_err(SandboxError::from)?;

    drop(write_end);

    let deadline = Instant::now() + Duration::from_millis(limits::WALL_CLOCK_MS);
    if !wait_with_deadline(child_pid, deadline) {
        tracing::warn!(pid = child_pid.as_raw(), "session exceeded wall-clock deadline, killing");
        let _ = kill(Pid::from_raw(-child_pid.as_raw()), Signal::SIGKILL);
        let _ = waitpid(child_pid, None);
    }

    let mut output = Vec::new();
    let mut reader: std::fs::File = read_end.into();
    let _ = reader.read_to_end(&mut output);

    if let Err(e) = archive_submission(config, source, &build_path) {
        tracing::warn!(error = %e, "could not archive submission");
    }

    // `_build_guard`/`_run_guard` remove both scratch trees on drop here,
    // whether this function is returning normally or an earlier `?` already
    // took it out through an error path.
    Ok(output)
}

fn wait_with_deadline(pid: Pid, deadline: Instant) -> bool {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => {
                if Instant::now() >= deadline {
                    return false;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(_) => return true,
            Err(_) => return true,
        }
    }
}

fn write_all(fd: std::os::fd::RawFd, data: &[u8]) {
    // SAFETY: `fd` is the write end of a pipe this process owns for the
    // lifetime of this call; nothing else touches it concurrently.
    let borrowed: BorrowedFd = unsafe { BorrowedFd::borrow_raw(fd) };
    let mut written = 0;
    while written < data.len() {
        match nix::unistd::write(borrowed, &data[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(_) => break,
        }
    }
}

/// Hard-link the session's submission into the log directory under a fresh
/// random name, so a crash loop can be diagnosed after the fact. Uses plain
/// `std::fs::hard_link` rather than the `*at` idiom used elsewhere in this
/// crate: both paths are fully owned and freshly constructed here, and the
/// run stage has already exited, so there's no window for a race.
fn archive_submission(
    config: &SupervisorConfig,
    source: &mut dyn RandomSource,
    build_path: &Path,
) -> Result<(), SandboxError> {
    let src = build_path.join(submission::SUBMISSION_FILE);
    if !src.exists() {
        return Ok(());
    }
    let name = crate::random::random_hex_name(source).map_err(SandboxError::Setup)?;
    let dest = config.log_dir.join(format!("in.myr.{name}"));
    std::fs::hard_link(&src, &dest).map_err(SandboxError::Io)?;
    tracing::debug!(dest = %dest.display(), "archived submission");
    Ok(())
}

/// Remove a scratch tree bottom-up, tolerating per-entry failures: one
/// unremovable file must not leave the rest of the tree behind.
fn cleanup(root: &Path) {
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "walk error during scratch cleanup");
                continue;
            }
        };
        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            std::fs::remove_dir(path)
        } else {
            std::fs::remove_file(path)
        };
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch entry");
        }
    }
}
