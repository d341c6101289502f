//! Error types for the sandbox supervisor.
//!
//! Mirrors the four error kinds from the design: setup failures (before any
//! scratch state exists), provisioning failures, stage failures, and the I/O
//! errors that thread through all of them via `?`.

use thiserror::Error;
use std::path::PathBuf;

/// Top-level result type used throughout the crate.
pub type SandboxResult<T> = Result<T, SandboxError>;

#[derive(Debug, Error)]
pub enum SandboxError {
    /// Fatal before any scratch directory has been created.
    #[error("setup failed: {0}")]
    Setup(#[from] SystemError),

    /// Fatal inside the session; the watchdog still cleans up whatever was
    /// created before the failure.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// A compile or run stage exited nonzero or was terminated by a signal.
    #[error("stage failed: {0}")]
    Stage(#[from] StageError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<nix::Error> for SandboxError {
    fn from(err: nix::Error) -> Self {
        SandboxError::Io(std::io::Error::from(err))
    }
}

/// Failures that can occur while the supervisor is bringing up its own
/// isolation (master filter, rlimits, chroot, randomness source).
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("could not open randomness source: {0}")]
    Random(std::io::Error),

    #[error("could not set resource limit {name}: {source}")]
    Rlimit {
        name: &'static str,
        source: std::io::Error,
    },

    #[error("could not install seccomp filter: {0}")]
    Seccomp(String),

    #[error("could not chroot to {path}: {source}")]
    Chroot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not drop capabilities: {0}")]
    Capabilities(String),

    #[error("could not create scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of a compile or run stage, and the error variant carrying the
/// non-success cases.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage}: exited with status {code}")]
    NonZero { stage: &'static str, code: i32 },

    #[error("{stage}: terminated by signal {signal}")]
    Signaled { stage: &'static str, signal: i32 },

    #[error("{stage}: could not spawn: {source}")]
    Spawn {
        stage: &'static str,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {var} is set but empty")]
    EmptyOverride { var: &'static str },
}
