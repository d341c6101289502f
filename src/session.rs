//! One compile-then-run session, given an already-provisioned build and run
//! scratch directory.
//!
//! Scratch directories are created by the caller (the watchdog, see
//! [`crate::watchdog`]) rather than here: they're needed both inside this
//! function (to provision and chroot into) and outside it afterward (to
//! archive the submission and to clean up), so ownership has to live above
//! the session boundary regardless of which side creates them.

use std::io::Read;
use std::path::Path;

use nix::unistd::{LinkatFlags, linkat};

use crate::error::SandboxError;
use crate::jailer::{Stage, caps};
use crate::provision::setup_compile_jail;
use crate::scratch::ScratchDir;
use crate::stage::{StageOutcome, run_stage};
use crate::submission::{SUBMISSION_FILE, read_submission};

/// Name the compiled artifact is linked under in both jails.
const ARTIFACT_NAME: &str = "a.out";

/// Compile the submission and, if that succeeds, run it.
///
/// A nonzero exit or signal from the *compile* stage is the student's
/// fault (their program doesn't compile) and is reported back as ordinary
/// output, not a [`SandboxError`] — the same is true of the run stage. Only
/// a failure to provision, chroot, or install a filter is a supervisor
/// error.
pub fn drive_session(
    build: &ScratchDir,
    run: &ScratchDir,
    template_dir: &Path,
    submission: &mut dyn Read,
) -> Result<Vec<u8>, SandboxError> {
    caps::drop_all().map_err(SandboxError::Setup)?;

    setup_compile_jail(build, template_dir)?;
    read_submission(build, submission)?;

    let compile_argv = [
        "mbld",
        "-b",
        ARTIFACT_NAME,
        SUBMISSION_FILE,
        "-I",
        "/lib/myr",
        "-r",
        "/lib/myr/_myrrt.o",
    ];
    let compile_result = run_stage("compile", &build.path, &compile_argv, Stage::Compile, true)?;

    if !matches!(compile_result.outcome, StageOutcome::Success) {
        tracing::info!("compile stage did not succeed; returning its output verbatim");
        return Ok(compile_result.output);
    }

    linkat(
        build.as_fd(),
        ARTIFACT_NAME,
        run.as_fd(),
        ARTIFACT_NAME,
        LinkatFlags::NoSymlinkFollow,
    )
    .map_err(|e| {
        SandboxError::Provision(format!("could not link compiled artifact into run jail: {e}"))
    })?;

    let run_argv = ["/a.out"];
    let run_result = run_stage("run", &run.path, &run_argv, Stage::Run, true)?;

    Ok(run_result.output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_matches_run_argv() {
        assert_eq!(format!("/{ARTIFACT_NAME}"), "/a.out");
    }
}
