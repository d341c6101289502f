//! CGI-style entry point: one invocation, one submission, one response.
//!
//! Reads the submission from stdin, applies the master-level isolation
//! (rlimits, `no_new_privs`, capability drop, master seccomp filter, then
//! a chroot into the sandbox root) before handing off to
//! [`cellblock::run_supervisor`], and writes a CGI response (a
//! `Content-type` header, then the captured output) to stdout. The binary
//! does setup and argument plumbing; the library does the work.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use cellblock::error::{SandboxError, SystemError};
use cellblock::jailer::{Stage, caps, rlimits, seccomp};
use cellblock::random::UrandomSource;
use cellblock::{SupervisorConfig, init_logging, run_supervisor};

fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(output) => {
            emit_response(&output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "supervisor failed before a response could be produced");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<Vec<u8>, SandboxError> {
    let config = SupervisorConfig::from_env()?;

    // Order matters and is not reorderable: rlimits and no_new_privs first
    // (so nothing that follows can escape them), then capabilities
    // dropped, then the master filter — narrowest last, since installing a
    // filter makes every syscall it doesn't list fatal, including ones a
    // misordered later step might still need. The chroot comes after the
    // filter (chroot is itself in the master allow-list) and before any
    // session is spawned, so every descendant inherits a jailed view of
    // the filesystem from the moment it starts.
    rlimits::apply_all().map_err(SandboxError::Setup)?;
    caps::set_no_new_privs().map_err(SandboxError::Setup)?;
    caps::drop_all().map_err(SandboxError::Setup)?;

    let master_filter = seccomp::generate_bpf_filter(Stage::Master).map_err(SandboxError::Setup)?;
    seccomp::apply_filter(&master_filter).map_err(SandboxError::Setup)?;

    chroot_to_sandbox_root(&config.sandbox_root)?;

    let mut source = UrandomSource;
    let mut stdin = std::io::stdin().lock();
    run_supervisor(&config, &mut source, &mut stdin)
}

/// Chroot the supervisor itself into `root` before any session is spawned,
/// so the master-filtered process that provisions and archives sessions
/// never has the real host filesystem in view, only the jail it was
/// configured with. `scratch_base`, `template_dir`, and `log_dir` are
/// resolved against this new root afterward, not the original one.
fn chroot_to_sandbox_root(root: &Path) -> Result<(), SandboxError> {
    nix::unistd::chdir(root).map_err(|e| chroot_error(root, e))?;
    nix::unistd::chroot(root).map_err(|e| chroot_error(root, e))?;
    Ok(())
}

fn chroot_error(path: &Path, source: nix::Error) -> SandboxError {
    SandboxError::Setup(SystemError::Chroot {
        path: path.to_path_buf(),
        source: std::io::Error::from(source),
    })
}

/// Write the fixed CGI header, a banner line shown before any real output
/// exists, then the captured bytes.
fn emit_response(output: &[u8]) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let _ = write!(handle, "Content-type: text/plain\r\n\r\n");
    let _ = writeln!(handle, "Building");
    let _ = handle.write_all(output);
}
