//! Supervisor configuration.
//!
//! Four filesystem paths are overridable via environment variables; the
//! resource envelope is not — it's a security property, not an operator
//! convenience, so it stays a set of `const`s next to this struct rather
//! than a field on it.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const DEFAULT_SANDBOX_ROOT: &str = "/var/lib/cellblock/root";
const DEFAULT_SCRATCH_BASE: &str = "/scratch";
const DEFAULT_TEMPLATE_DIR: &str = "/build-template";
const DEFAULT_LOG_DIR: &str = "/log";

const ENV_SANDBOX_ROOT: &str = "CELLBLOCK_SANDBOX_ROOT";
const ENV_SCRATCH_BASE: &str = "CELLBLOCK_SCRATCH_BASE";
const ENV_TEMPLATE_DIR: &str = "CELLBLOCK_TEMPLATE_DIR";
const ENV_LOG_DIR: &str = "CELLBLOCK_LOG_DIR";

/// Paths the supervisor needs before it can provision a session.
///
/// Threaded explicitly through the driver and watchdog rather than read
/// from globals, so a test can point `scratch_base` at a tmpfs directory
/// and `template_dir`/`log_dir` at fixtures without touching the real
/// filesystem root.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Host directory the supervisor chroots into before spawning a
    /// session. `scratch_base`, `template_dir`, and `log_dir` are resolved
    /// *inside* this root once the chroot has happened, so this directory
    /// must actually contain the subtrees those three paths name.
    pub sandbox_root: PathBuf,
    /// Parent directory under which `build/<rand>` and `run/<rand>` are
    /// created.
    pub scratch_base: PathBuf,
    /// Read-only tree containing every path in [`crate::manifest::TEMPLATE_MANIFEST`].
    pub template_dir: PathBuf,
    /// Directory submissions are archived into after a session completes.
    pub log_dir: PathBuf,
}

impl SupervisorConfig {
    /// Build a config from environment overrides, falling back to the
    /// compiled-in defaults. Rejects empty-string overrides outright.
    ///
    /// Read once at process start, before the supervisor chroots: these
    /// variables describe the real, pre-chroot filesystem (`sandbox_root`)
    /// and paths meaningful after the chroot (the other three), and
    /// `std::env::var` only sees the real environment while it's still
    /// being called pre-chroot.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            sandbox_root: resolve_override(ENV_SANDBOX_ROOT, DEFAULT_SANDBOX_ROOT)?,
            scratch_base: resolve_override(ENV_SCRATCH_BASE, DEFAULT_SCRATCH_BASE)?,
            template_dir: resolve_override(ENV_TEMPLATE_DIR, DEFAULT_TEMPLATE_DIR)?,
            log_dir: resolve_override(ENV_LOG_DIR, DEFAULT_LOG_DIR)?,
        })
    }

    /// Build-dir scratch base (`<scratch_base>/build`).
    pub fn build_base(&self) -> PathBuf {
        self.scratch_base.join("build")
    }

    /// Run-dir scratch base (`<scratch_base>/run`).
    pub fn run_base(&self) -> PathBuf {
        self.scratch_base.join("run")
    }
}

fn resolve_override(var: &'static str, default: &str) -> Result<PathBuf, ConfigError> {
    match std::env::var(var) {
        Ok(val) if val.is_empty() => Err(ConfigError::EmptyOverride { var }),
        Ok(val) => Ok(PathBuf::from(val)),
        Err(_) => Ok(PathBuf::from(default)),
    }
}

/// The fixed resource envelope installed on the session before it runs.
/// Never overridable — see the module doc comment.
pub mod limits {
    /// `RLIMIT_AS`: 512 MiB.
    pub const ADDRESS_SPACE: u64 = 512 * 1024 * 1024;
    /// `RLIMIT_CPU`: 1 second.
    pub const CPU_SECONDS: u64 = 1;
    /// `RLIMIT_CORE`: disabled.
    pub const CORE_SIZE: u64 = 0;
    /// `RLIMIT_FSIZE`: 32 MiB.
    pub const OUTPUT_SIZE: u64 = 32 * 1024 * 1024;
    /// `RLIMIT_NOFILE`: 32 descriptors.
    pub const OPEN_FILES: u64 = 32;
    /// `RLIMIT_RSS`: 128 MiB.
    pub const RESIDENT_SET: u64 = 128 * 1024 * 1024;
    /// `RLIMIT_STACK`: 32 MiB.
    pub const STACK_SIZE: u64 = 32 * 1024 * 1024;
    /// `RLIMIT_NPROC`: 2048 processes — the fixed build command may shell
    /// out to an assembler and linker as subprocesses of its own.
    pub const PROCESS_COUNT: u64 = 2048;
    /// Watchdog wall-clock deadline.
    pub const WALL_CLOCK_MS: u64 = 500;
    /// Maximum submission size read from stdin.
    pub const SUBMISSION_CAP: usize = 16 * 1024;
}

/// Returns `true` if `path` has no parent or any component beyond root,
/// used only to sanity-check config paths are non-degenerate before use.
pub(crate) fn is_rooted(path: &Path) -> bool {
    path.is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        // SAFETY: test runs single-threaded with respect to these vars.
        unsafe {
            std::env::remove_var(ENV_SANDBOX_ROOT);
            std::env::remove_var(ENV_SCRATCH_BASE);
            std::env::remove_var(ENV_TEMPLATE_DIR);
            std::env::remove_var(ENV_LOG_DIR);
        }
        let cfg = SupervisorConfig::from_env().unwrap();
        assert_eq!(cfg.sandbox_root, PathBuf::from(DEFAULT_SANDBOX_ROOT));
        assert_eq!(cfg.scratch_base, PathBuf::from(DEFAULT_SCRATCH_BASE));
        assert_eq!(cfg.template_dir, PathBuf::from(DEFAULT_TEMPLATE_DIR));
        assert_eq!(cfg.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
        assert!(is_rooted(&cfg.sandbox_root));
        assert!(is_rooted(&cfg.scratch_base));
    }

    #[test]
    fn empty_override_is_rejected() {
        unsafe {
            std::env::set_var(ENV_SCRATCH_BASE, "");
        }
        let err = SupervisorConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyOverride { var } if var == ENV_SCRATCH_BASE));
        unsafe {
            std::env::remove_var(ENV_SCRATCH_BASE);
        }
    }

    #[test]
    fn build_and_run_base_are_distinct_subdirs() {
        unsafe {
            std::env::set_var(ENV_SCRATCH_BASE, "/tmp/cellblock-test-scratch");
        }
        let cfg = SupervisorConfig::from_env().unwrap();
        assert_ne!(cfg.build_base(), cfg.run_base());
        assert!(cfg.build_base().starts_with(&cfg.scratch_base));
        unsafe {
            std::env::remove_var(ENV_SCRATCH_BASE);
        }
    }
}
