//! The three fixed seccomp-BPF policies: `master`, `compile`, `run`.
//!
//! Each allow-list is declared independently as its own constant — not
//! derived from another by set subtraction — because independent tables
//! are what a reviewer actually audits: the question "does `run` allow
//! anything `compile` also needed?" is answered by reading two short
//! arrays side by side, not by tracing a derivation.
//!
//! BPF generation and application go through `seccompiler`. The default
//! (no-match) action here is `SeccompAction::KillProcess` rather than
//! `SeccompAction::Trap`: a `Trap`-based policy sends `SIGSYS` to a
//! handler the allow-list doesn't actually forbid installing, while a
//! disallowed syscall must never have a chance to run application code
//! afterward.

use std::collections::BTreeMap;

use crate::error::SystemError;
use crate::jailer::Stage;

/// Syscalls the supervisor itself needs before and around cloning the
/// session: process control, filesystem traversal/mutation inside the
/// chroot, memory, and the handful of misc calls `setsid`/`uname`/etc.
/// pull in.
pub const MASTER_ALLOWED: &[&str] = &[
    "access",
    "arch_prctl",
    "prctl",
    "brk",
    "chdir",
    "chmod",
    "chroot",
    "clone",
    "close",
    "dup2",
    "execve",
    "exit",
    "exit_group",
    "fcntl",
    "fork",
    "fstat",
    "fsync",
    "getcwd",
    "getpid",
    "getrlimit",
    "getrusage",
    "gettid",
    "kill",
    "linkat",
    "lseek",
    "lstat",
    "mkdir",
    "mkdirat",
    "mmap",
    "mprotect",
    "munmap",
    "nanosleep",
    "open",
    "openat",
    "read",
    "restart_syscall",
    "rt_sigprocmask",
    "setsid",
    "stat",
    "tgkill",
    "umask",
    "uname",
    "wait4",
    "write",
];

/// Master set minus `kill`, `tgkill`, `mkdir`, `chroot`: the compiler needs
/// no kill/tgkill and writes only into the tree already created for it, so
/// it has no business calling `mkdir` or `chroot` again.
pub const COMPILE_ALLOWED: &[&str] = &[
    "access",
    "arch_prctl",
    "prctl",
    "brk",
    "chdir",
    "chmod",
    "clone",
    "close",
    "dup2",
    "execve",
    "exit",
    "exit_group",
    "fcntl",
    "fork",
    "fstat",
    "fsync",
    "getcwd",
    "getpid",
    "getrlimit",
    "getrusage",
    "gettid",
    "linkat",
    "lseek",
    "lstat",
    "mkdirat",
    "mmap",
    "mprotect",
    "munmap",
    "nanosleep",
    "open",
    "openat",
    "read",
    "restart_syscall",
    "rt_sigprocmask",
    "setsid",
    "stat",
    "umask",
    "uname",
    "wait4",
    "write",
];

/// Minimal run-stage set: the compiled workload can exec itself into
/// existence, exit, map/unmap its own memory, and write to its inherited
/// stdout/stderr. Nothing else.
pub const RUN_ALLOWED: &[&str] = &["execve", "exit", "exit_group", "mmap", "munmap", "write"];

fn allowed_for(stage: Stage) -> &'static [&'static str] {
    match stage {
        Stage::Master => MASTER_ALLOWED,
        Stage::Compile => COMPILE_ALLOWED,
        Stage::Run => RUN_ALLOWED,
    }
}

/// Map a syscall name to its number on the current architecture.
///
/// Only the syscalls actually referenced by the three allow-lists above are
/// mapped; an unknown name is a programming error in this module, not a
/// runtime condition, so callers treat `None` as fatal at filter-build time.
fn syscall_name_to_nr(name: &str) -> Option<i64> {
    Some(match name {
        "access" => libc::SYS_access,
        "arch_prctl" => libc::SYS_arch_prctl,
        "prctl" => libc::SYS_prctl,
        "brk" => libc::SYS_brk,
        "chdir" => libc::SYS_chdir,
        "chmod" => libc::SYS_chmod,
        "chroot" => libc::SYS_chroot,
        "clone" => libc::SYS_clone,
        "close" => libc::SYS_close,
        "dup2" => libc::SYS_dup2,
        "execve" => libc::SYS_execve,
        "exit" => libc::SYS_exit,
        "exit_group" => libc::SYS_exit_group,
        "fcntl" => libc::SYS_fcntl,
        "fork" => libc::SYS_fork,
        "fstat" => libc::SYS_fstat,
        "fsync" => libc::SYS_fsync,
        "getcwd" => libc::SYS_getcwd,
        "getpid" => libc::SYS_getpid,
        "getrlimit" => libc::SYS_getrlimit,
        "getrusage" => libc::SYS_getrusage,
        "gettid" => libc::SYS_gettid,
        "kill" => libc::SYS_kill,
        "linkat" => libc::SYS_linkat,
        "lseek" => libc::SYS_lseek,
        "lstat" => libc::SYS_lstat,
        "mkdir" => libc::SYS_mkdir,
        "mkdirat" => libc::SYS_mkdirat,
        "mmap" => libc::SYS_mmap,
        "mprotect" => libc::SYS_mprotect,
        "munmap" => libc::SYS_munmap,
        "nanosleep" => libc::SYS_nanosleep,
        "open" => libc::SYS_open,
        "openat" => libc::SYS_openat,
        "read" => libc::SYS_read,
        "restart_syscall" => libc::SYS_restart_syscall,
        "rt_sigprocmask" => libc::SYS_rt_sigprocmask,
        "setsid" => libc::SYS_setsid,
        "stat" => libc::SYS_stat,
        "tgkill" => libc::SYS_tgkill,
        "umask" => libc::SYS_umask,
        "uname" => libc::SYS_uname,
        "wait4" => libc::SYS_wait4,
        "write" => libc::SYS_write,
        _ => return None,
    })
}

#[cfg(target_os = "linux")]
fn target_arch() -> seccompiler::TargetArch {
    #[cfg(target_arch = "x86_64")]
    {
        seccompiler::TargetArch::x86_64
    }
    #[cfg(target_arch = "aarch64")]
    {
        seccompiler::TargetArch::aarch64
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        compile_error!("unsupported architecture for seccomp filter generation")
    }
}

/// Compile `stage`'s allow-list into BPF bytecode: architecture check,
/// explicit equality tests per allowed syscall, kill-process on anything
/// else (including an architecture mismatch).
#[cfg(target_os = "linux")]
pub fn generate_bpf_filter(stage: Stage) -> Result<seccompiler::BpfProgram, SystemError> {
    use seccompiler::{SeccompAction, SeccompFilter};

    let mut rules = BTreeMap::new();
    for name in allowed_for(stage) {
        let nr = syscall_name_to_nr(name)
            .ok_or_else(|| SystemError::Seccomp(format!("unmapped syscall in allow-list: {name}")))?;
        rules.insert(nr, vec![]);
    }

    let filter = SeccompFilter::new(
        rules,
        SeccompAction::KillProcess,
        SeccompAction::Allow,
        target_arch(),
    )
    .map_err(|e| SystemError::Seccomp(format!("{} filter: {e}", stage.name())))?;

    filter
        .try_into()
        .map_err(|e: seccompiler::BackendError| {
            SystemError::Seccomp(format!("{} filter BPF compilation: {e}", stage.name()))
        })
}

#[cfg(not(target_os = "linux"))]
pub fn generate_bpf_filter(_stage: Stage) -> Result<Vec<u8>, SystemError> {
    Ok(Vec::new())
}

/// Install a compiled filter on the current thread. Once applied it cannot
/// be removed or widened — only a narrower filter may be layered on top.
#[cfg(target_os = "linux")]
pub fn apply_filter(filter: &seccompiler::BpfProgram) -> Result<(), SystemError> {
    seccompiler::apply_filter(filter)
        .map_err(|e| SystemError::Seccomp(format!("could not apply filter: {e}")))
}

#[cfg(not(target_os = "linux"))]
pub fn apply_filter(_filter: &[u8]) -> Result<(), SystemError> {
    tracing::warn!("seccomp is only available on Linux; filter not applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_is_master_minus_the_documented_four() {
        let removed = ["kill", "tgkill", "mkdir", "chroot"];
        for name in removed {
            assert!(MASTER_ALLOWED.contains(&name));
            assert!(!COMPILE_ALLOWED.contains(&name), "{name} should not be in compile");
        }
        for name in MASTER_ALLOWED {
            if removed.contains(name) {
                continue;
            }
            assert!(COMPILE_ALLOWED.contains(name), "{name} missing from compile");
        }
    }

    #[test]
    fn run_stage_syscalls_are_all_it_needs_and_nothing_more() {
        assert_eq!(RUN_ALLOWED, &["execve", "exit", "exit_group", "mmap", "munmap", "write"]);
        // The run stage must not be able to kill, fork, or touch the filesystem.
        for forbidden in ["kill", "tgkill", "fork", "clone", "open", "openat", "chroot"] {
            assert!(!RUN_ALLOWED.contains(&forbidden));
        }
    }

    #[test]
    fn every_allow_listed_syscall_maps_to_a_number() {
        for stage in [Stage::Master, Stage::Compile, Stage::Run] {
            for name in allowed_for(stage) {
                assert!(
                    syscall_name_to_nr(name).is_some(),
                    "{name} (stage {}) has no syscall number mapping",
                    stage.name()
                );
            }
        }
    }

    #[test]
    fn no_allow_list_is_empty() {
        for stage in [Stage::Master, Stage::Compile, Stage::Run] {
            assert!(!allowed_for(stage).is_empty());
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn filters_compile_to_nonempty_bpf_for_every_stage() {
        for stage in [Stage::Master, Stage::Compile, Stage::Run] {
            let bpf = generate_bpf_filter(stage).unwrap();
            assert!(!bpf.is_empty());
        }
    }
}
