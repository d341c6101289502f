//! Stage runner: fork, chdir+chroot, install filter, exec, wait.
//!
//! Built on `std::process::Command::pre_exec` rather than a hand-rolled
//! `fork()`/`execve()` pair, the same way isolation setup is commonly run
//! between fork and exec without widening the attack window a separate
//! privileged helper process would create.
//!
//! Ordering inside the child is fixed and load-bearing: stderr is merged
//! into stdout first (cosmetic), then `chdir` before `chroot` (so the jail
//! path resolves against the *outer* root), then the filter goes on *after*
//! `chroot` (so `chroot` itself needn't be in the stage's own allow-list —
//! only the master filter's), and only then does `exec` happen.

use std::io;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{SandboxError, StageError, SystemError};
use crate::jailer::{Stage, seccomp};

/// What happened to a stage, without relying on the caller observing
/// process termination directly.
#[derive(Debug)]
pub enum StageOutcome {
    Success,
    NonZero(i32),
    Signaled(i32),
}

pub struct StageResult {
    pub outcome: StageOutcome,
    /// Captured stdout, with stderr merged in when `capture_stderr` was set.
    pub output: Vec<u8>,
}

/// Run `argv[0]` chrooted into `jail_path` under `filter_stage`'s policy.
///
/// `name` is used only for diagnostics (it labels which stage failed in
/// `StageError`).
pub fn run_stage(
    name: &'static str,
    jail_path: &Path,
    argv: &[&str],
    filter_stage: Stage,
    capture_stderr: bool,
) -> Result<StageResult, SandboxError> {
    let filter = seccomp::generate_bpf_filter(filter_stage).map_err(SandboxError::Setup)?;
    let jail = jail_path.to_path_buf();

    let mut cmd = Command::new(argv[0]);
    cmd.args(&argv[1..]);
    cmd.env_clear();
    cmd.env("LD_LIBRARY_PATH", "/lib64");
    cmd.env("PATH", "/");
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::null());

    // SAFETY: the closure only calls async-signal-safe operations (nix's
    // thin wrappers over chdir(2)/chroot(2)/dup2(2) and the seccomp
    // apply_filter syscall), and runs after fork but before exec, which is
    // exactly the window `pre_exec` documents as sound for this.
    unsafe {
        cmd.pre_exec(move || {
            if capture_stderr {
                nix_dup2(1, 2)?;
            }
            nix_chdir(&jail)?;
            nix_chroot(&jail)?;
            apply_filter_raw(&filter)?;
            Ok(())
        });
    }

    let child = cmd
        .spawn()
        .map_err(|source| SandboxError::Stage(StageError::Spawn { stage: name, source }))?;

    let output = child
        .wait_with_output()
        .map_err(|source| SandboxError::Stage(StageError::Spawn { stage: name, source }))?;

    let outcome = if let Some(code) = output.status.code() {
        if code == 0 {
            StageOutcome::Success
        } else {
            StageOutcome::NonZero(code)
        }
    } else if let Some(signal) = output.status.signal() {
        StageOutcome::Signaled(signal)
    } else {
        // Neither WIFEXITED nor WIFSIGNALED — treat as a signal-class
        // failure with signal 0 rather than inventing a fourth variant.
        StageOutcome::Signaled(0)
    };

    match &outcome {
        StageOutcome::Success => tracing::debug!(stage = name, "stage exited 0"),
        StageOutcome::NonZero(code) => tracing::warn!(stage = name, code, "stage exited nonzero"),
        StageOutcome::Signaled(sig) => tracing::warn!(stage = name, sig, "stage terminated by signal"),
    }

    Ok(StageResult {
        outcome,
        output: output.stdout,
    })
}

fn nix_chdir(path: &Path) -> io::Result<()> {
    nix::unistd::chdir(path).map_err(|e| io::Error::from_raw_os_error(e as i32))
}

fn nix_chroot(path: &Path) -> io::Result<()> {
    nix::unistd::chroot(path).map_err(|e| io::Error::from_raw_os_error(e as i32))
}

fn nix_dup2(src: i32, dst: i32) -> io::Result<()> {
    use std::os::fd::BorrowedFd;
    // SAFETY: fd 1 is always valid in a freshly-spawned child with piped
    // stdout; dup2 onto fd 2 is the only operation performed on it.
    let src_fd = unsafe { BorrowedFd::borrow_raw(src) };
    nix::unistd::dup2(src_fd, unsafe { BorrowedFd::borrow_raw(dst) })
        .map(|_| ())
        .map_err(|e| io::Error::from_raw_os_error(e as i32))
}

#[cfg(target_os = "linux")]
fn apply_filter_raw(filter: &seccompiler::BpfProgram) -> io::Result<()> {
    seccomp::apply_filter(filter).map_err(system_error_to_io)
}

#[cfg(not(target_os = "linux"))]
fn apply_filter_raw(filter: &[u8]) -> io::Result<()> {
    seccomp::apply_filter(filter).map_err(system_error_to_io)
}

fn system_error_to_io(e: SystemError) -> io::Error {
    io::Error::other(e.to_string())
}
