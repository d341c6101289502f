//! Build jail population.
//!
//! `setup_compile_jail` creates the fixed directory skeleton under a fresh
//! build scratch dir and hard-links every [`TEMPLATE_MANIFEST`] entry in
//! from the template directory. Hard-linking, not copying, is required:
//! population must be fast and atomic per entry, and the compile stage
//! never writes through these links (it writes new files of its own).

use std::os::fd::AsFd as _;
use std::path::Path;

use nix::dir::Dir;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use nix::unistd::{LinkatFlags, linkat, mkdirat};

use crate::error::SandboxError;
use crate::manifest::{BUILD_SUBDIRS, TEMPLATE_MANIFEST};
use crate::scratch::ScratchDir;

/// Populate `build` (already created by [`crate::scratch::tempdir`]) with
/// the directory skeleton and every manifest entry, hard-linked from
/// `template_dir`.
pub fn setup_compile_jail(build: &ScratchDir, template_dir: &Path) -> Result<(), SandboxError> {
    for subdir in BUILD_SUBDIRS {
        mkdirat(build.as_fd(), *subdir, Mode::from_bits_truncate(0o700)).map_err(|e| {
            SandboxError::Provision(format!("could not create {subdir} in build jail: {e}"))
        })?;
    }

    let template = Dir::open(template_dir, OFlag::O_DIRECTORY | OFlag::O_RDONLY, Mode::empty())
        .map_err(|e| {
            SandboxError::Provision(format!(
                "could not open template directory {}: {e}",
                template_dir.display()
            ))
        })?;

    for entry in TEMPLATE_MANIFEST {
        linkat(
            template.as_fd(),
            *entry,
            build.as_fd(),
            *entry,
            LinkatFlags::NoSymlinkFollow,
        )
        .map_err(|e| {
            SandboxError::Provision(format!(
                "could not link template entry {entry} into build jail: {e}"
            ))
        })?;
    }

    tracing::debug!(
        entries = TEMPLATE_MANIFEST.len(),
        "populated compile jail from template"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::fake::CountingSource;
    use crate::scratch::tempdir;
    use std::fs;

    fn build_template(dir: &Path) {
        for subdir in BUILD_SUBDIRS {
            fs::create_dir_all(dir.join(subdir)).unwrap();
        }
        for entry in TEMPLATE_MANIFEST {
            fs::write(dir.join(entry), b"stub").unwrap();
        }
    }

    #[test]
    fn populates_every_manifest_entry() {
        let template = tempfile::tempdir().unwrap();
        build_template(template.path());

        let scratch_base = tempfile::tempdir().unwrap();
        let mut source = CountingSource::default();
        let build = tempdir(scratch_base.path(), &mut source).unwrap();

        setup_compile_jail(&build, template.path()).unwrap();

        for entry in TEMPLATE_MANIFEST {
            assert!(build.path.join(entry).exists(), "missing {entry}");
        }
        for subdir in BUILD_SUBDIRS {
            assert!(build.path.join(subdir).is_dir());
        }
    }

    #[test]
    fn missing_manifest_entry_is_fatal() {
        let template = tempfile::tempdir().unwrap();
        build_template(template.path());
        fs::remove_file(template.path().join("ld")).unwrap();

        let scratch_base = tempfile::tempdir().unwrap();
        let mut source = CountingSource::default();
        let build = tempdir(scratch_base.path(), &mut source).unwrap();

        let err = setup_compile_jail(&build, template.path()).unwrap_err();
        assert!(matches!(err, SandboxError::Provision(_)));
    }
}
