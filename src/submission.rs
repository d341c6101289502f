//! Submission reader.
//!
//! Reads up to [`crate::config::limits::SUBMISSION_CAP`] bytes from any
//! `Read` source into `in.myr` under the build jail. Generalized over
//! `Read` (instead of hardcoding stdin) so it can be exercised in tests
//! against an in-memory byte slice.

use std::io::Read;
use std::os::fd::AsFd as _;

use nix::fcntl::{OFlag, openat};
use nix::sys::stat::Mode;
use nix::unistd::{close, write};

use crate::config::limits::SUBMISSION_CAP;
use crate::error::SandboxError;
use crate::scratch::ScratchDir;

/// Name of the submission file inside the build jail.
pub const SUBMISSION_FILE: &str = "in.myr";

/// Read up to `SUBMISSION_CAP` bytes from `source` into `in.myr` in
/// `build`, truncating silently if the source has more. Short reads and
/// short writes are tolerated; end-of-input before the cap is normal.
pub fn read_submission(build: &ScratchDir, source: &mut dyn Read) -> Result<usize, SandboxError> {
    let fd = openat(
        build.as_fd(),
        SUBMISSION_FILE,
        OFlag::O_WRONLY | OFlag::O_CREAT,
        Mode::from_bits_truncate(0o600),
    )
    .map_err(|e| SandboxError::Provision(format!("could not open {SUBMISSION_FILE}: {e}")))?;

    let mut buf = [0u8; 4096];
    let mut total = 0usize;

    let result = (|| -> Result<usize, SandboxError> {
        loop {
            if total >= SUBMISSION_CAP {
                break;
            }
            let want = std::cmp::min(buf.len(), SUBMISSION_CAP - total);
            let n = source
                .read(&mut buf[..want])
                .map_err(SandboxError::Io)?;
            if n == 0 {
                break;
            }
            let mut written = 0;
            while written < n {
                let w = write(fd.as_fd(), &buf[written..n]).map_err(|e| {
                    SandboxError::Provision(format!("could not write {SUBMISSION_FILE}: {e}"))
                })?;
                written += w;
            }
            total += n;
        }
        Ok(total)
    })();

    let _ = close(fd);
    let total = result?;
    tracing::debug!(bytes = total, "ingested submission");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::fake::CountingSource;
    use crate::scratch::tempdir;
    use std::io::Cursor;

    fn fresh_build() -> (tempfile::TempDir, ScratchDir) {
        let base = tempfile::tempdir().unwrap();
        let mut source = CountingSource::default();
        let build = tempdir(base.path(), &mut source).unwrap();
        (base, build)
    }

    #[test]
    fn exactly_the_cap_is_accepted_verbatim() {
        let (_base, build) = fresh_build();
        let payload = vec![b'x'; SUBMISSION_CAP];
        let mut cursor = Cursor::new(payload.clone());

        let n = read_submission(&build, &mut cursor).unwrap();
        assert_eq!(n, SUBMISSION_CAP);

        let on_disk = std::fs::read(build.path.join(SUBMISSION_FILE)).unwrap();
        assert_eq!(on_disk, payload);
    }

    #[test]
    fn one_byte_over_the_cap_is_truncated() {
        let (_base, build) = fresh_build();
        let mut payload = vec![b'x'; SUBMISSION_CAP];
        payload.push(b'y');
        let mut cursor = Cursor::new(payload);

        let n = read_submission(&build, &mut cursor).unwrap();
        assert_eq!(n, SUBMISSION_CAP);

        let on_disk = std::fs::read(build.path.join(SUBMISSION_FILE)).unwrap();
        assert_eq!(on_disk.len(), SUBMISSION_CAP);
        assert!(on_disk.iter().all(|&b| b == b'x'));
    }

    #[test]
    fn zero_byte_submission_creates_empty_file() {
        let (_base, build) = fresh_build();
        let mut cursor = Cursor::new(Vec::new());

        let n = read_submission(&build, &mut cursor).unwrap();
        assert_eq!(n, 0);

        let on_disk = std::fs::read(build.path.join(SUBMISSION_FILE)).unwrap();
        assert!(on_disk.is_empty());
    }
}
