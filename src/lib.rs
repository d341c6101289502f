//! A single-shot isolation kernel: chroot a submitted program into a
//! scratch jail, compile it, run it, and tear everything down again,
//! bounded throughout by seccomp-BPF, rlimits, dropped capabilities, and a
//! private PID namespace.
//!
//! The crate is organized bottom-up, each module owning one layer:
//!
//! ```text
//! config      — paths + the fixed resource envelope
//! error       — the SandboxError hierarchy
//! random      — RandomSource seam over /dev/urandom
//! manifest    — the fixed template-directory contents
//! scratch     — unguessable scratch directory creation
//! provision   — populating a compile jail from the template
//! submission  — capped ingestion of the submitted program
//! jailer      — seccomp / capabilities / rlimits primitives
//! stage       — fork+chroot+filter+exec for one compile or run step
//! session     — sequencing compile then run for one submission
//! watchdog    — PID namespace, wall-clock deadline, archival, cleanup
//! ```

pub mod config;
pub mod error;
pub mod jailer;
pub mod manifest;
pub mod provision;
pub mod random;
pub mod scratch;
pub mod session;
pub mod stage;
pub mod submission;
pub mod watchdog;

use std::io::Read;

pub use config::SupervisorConfig;
pub use error::{SandboxError, SandboxResult};

use random::RandomSource;

/// Run one supervised session against `config`, reading the submission
/// from `submission` and returning whatever the workload produced.
///
/// Expected to be called once per process invocation: this sandbox is a
/// CGI-style tool, not a long-lived server, and its resource envelope and
/// single private PID namespace are sized for exactly that.
pub fn run_supervisor(
    config: &SupervisorConfig,
    source: &mut dyn RandomSource,
    submission: &mut dyn Read,
) -> SandboxResult<Vec<u8>> {
    watchdog::supervise(config, &config.template_dir, source, submission)
}

/// Initialize the process-wide tracing subscriber: structured logs to
/// stderr, `RUST_LOG`-driven filtering, stdout left untouched for the
/// CGI response body.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
