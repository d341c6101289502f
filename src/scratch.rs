//! Scratch directory provisioning.
//!
//! `tempdir()` creates an unguessable, exclusively-owned directory and
//! returns it paired with an open directory descriptor, so everything that
//! populates it afterwards (`provision::setup_compile_jail`,
//! `submission::read_submission`, the artifact `linkat`) uses `*at`
//! operations against the fd rather than re-resolving the path — path
//! resolution racing a symlink swap is exactly the class of bug a chroot
//! jail exists to prevent.

use std::path::{Path, PathBuf};

use nix::dir::Dir;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;

use crate::error::SystemError;
use crate::random::RandomSource;

/// An `(path, fd)` pair for a provisioned scratch directory.
pub struct ScratchDir {
    pub path: PathBuf,
    dir: Dir,
}

impl ScratchDir {
    /// The open directory descriptor, for `*at` calls.
    pub fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        use std::os::fd::AsFd;
        self.dir.as_fd()
    }
}

/// Create `<base>/<64 hex chars>` with mode `0700` and return it opened.
///
/// `EEXIST` on the `mkdir` is treated as fatal rather than retried: the
/// random name makes a collision a bug (insufficient entropy or a reused
/// source), not an expected condition to paper over.
pub fn tempdir(base: &Path, source: &mut dyn RandomSource) -> Result<ScratchDir, SystemError> {
    let name = crate::random::random_hex_name(source)?;
    debug_assert_eq!(name.len(), 64, "random_hex_name must yield 64 hex chars");

    let path = base.join(&name);
    let expected_len = base.as_os_str().len() + 1 + 64;
    assert_eq!(
        path.as_os_str().len(),
        expected_len,
        "scratch path formatter truncated or padded unexpectedly"
    );

    nix::unistd::mkdir(&path, Mode::from_bits_truncate(0o700)).map_err(|e| SystemError::Scratch {
        path: path.clone(),
        source: std::io::Error::from(e),
    })?;

    tracing::debug!(path = %path.display(), "created scratch directory");

    let dir = Dir::open(&path, OFlag::O_DIRECTORY | OFlag::O_RDONLY, Mode::empty()).map_err(
        |e| SystemError::Scratch {
            path: path.clone(),
            source: std::io::Error::from(e),
        },
    )?;

    Ok(ScratchDir { path, dir })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::fake::CountingSource;

    #[test]
    fn tempdir_name_has_expected_length_and_mode() {
        let base = tempfile::tempdir().unwrap();
        let mut source = CountingSource::default();
        let scratch = tempdir(base.path(), &mut source).unwrap();

        let suffix = scratch
            .path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(suffix.len(), 64);

        let meta = std::fs::metadata(&scratch.path).unwrap();
        use std::os::unix::fs::PermissionsExt;
        assert_eq!(meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn distinct_invocations_get_distinct_paths() {
        let base = tempfile::tempdir().unwrap();
        let mut source = CountingSource::default();
        let a = tempdir(base.path(), &mut source).unwrap();
        let b = tempdir(base.path(), &mut source).unwrap();
        assert_ne!(a.path, b.path);
    }
}
