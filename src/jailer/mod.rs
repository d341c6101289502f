//! Isolation primitives applied between `chroot` and `execve`.
//!
//! ```text
//! jailer/
//! ├── mod.rs      (Stage enum, public API)
//! ├── seccomp.rs   (three fixed BPF allow-lists + compilation)
//! ├── caps.rs      (capability drop + no_new_privs)
//! └── rlimits.rs   (the resource envelope)
//! ```
//!
//! # Ordering
//!
//! The supervisor installs the master filter, rlimits, and `no_new_privs`
//! once, before chroot and before cloning the session — every descendant
//! inherits them. Each stage runner then installs its own (more
//! restrictive) filter after `chroot` and before `execve`. No step may be
//! reordered: a disallowed syscall reaching the kernel's filter is a
//! security defect regardless of which layer should have caught it.

pub mod caps;
pub mod rlimits;
pub mod seccomp;

/// Which of the three fixed policies to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Installed once by the supervisor, before chroot, inherited by all
    /// descendants.
    Master,
    /// Installed by the stage runner for the compile step.
    Compile,
    /// Installed by the stage runner for the run step.
    Run,
}

impl Stage {
    /// Human-readable name, used in log fields and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Master => "master",
            Stage::Compile => "compile",
            Stage::Run => "run",
        }
    }
}
