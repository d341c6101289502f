//! The fixed resource envelope.
//!
//! `apply_all` installs every limit in the envelope in one pass. Written
//! as a small, allocation-free function suitable for calling from a
//! `pre_exec` hook (between `fork` and `exec`, where only
//! async-signal-safe operations are sound) as well as directly from the
//! supervisor's own startup path.

use nix::sys::resource::{Resource, setrlimit};

use crate::config::limits;
use crate::error::SystemError;

/// One `(name, resource, soft, hard)` entry per limit in the envelope.
/// Soft and hard are always equal here: nothing in this sandbox is meant
/// to raise a limit later.
const ENVELOPE: &[(&str, Resource, u64)] = &[
    ("RLIMIT_AS", Resource::RLIMIT_AS, limits::ADDRESS_SPACE),
    ("RLIMIT_CPU", Resource::RLIMIT_CPU, limits::CPU_SECONDS),
    ("RLIMIT_CORE", Resource::RLIMIT_CORE, limits::CORE_SIZE),
    ("RLIMIT_FSIZE", Resource::RLIMIT_FSIZE, limits::OUTPUT_SIZE),
    ("RLIMIT_NOFILE", Resource::RLIMIT_NOFILE, limits::OPEN_FILES),
    ("RLIMIT_RSS", Resource::RLIMIT_RSS, limits::RESIDENT_SET),
    ("RLIMIT_STACK", Resource::RLIMIT_STACK, limits::STACK_SIZE),
    ("RLIMIT_NPROC", Resource::RLIMIT_NPROC, limits::PROCESS_COUNT),
];

/// Apply every limit in [`ENVELOPE`], in order. The first failure aborts —
/// there's no reasonable partial-envelope state to continue from.
pub fn apply_all() -> Result<(), SystemError> {
    for (name, resource, value) in ENVELOPE {
        setrlimit(*resource, *value, *value).map_err(|e| SystemError::Rlimit {
            name,
            source: std::io::Error::from(e),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_covers_every_documented_limit() {
        let names: Vec<&str> = ENVELOPE.iter().map(|(n, _, _)| *n).collect();
        for expected in [
            "RLIMIT_AS",
            "RLIMIT_CPU",
            "RLIMIT_CORE",
            "RLIMIT_FSIZE",
            "RLIMIT_NOFILE",
            "RLIMIT_RSS",
            "RLIMIT_STACK",
            "RLIMIT_NPROC",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn soft_and_hard_limits_never_diverge() {
        // Encoded structurally above (one value reused for both), this
        // just documents the invariant in a way a future edit would break
        // visibly if someone split soft/hard apart.
        assert_eq!(ENVELOPE.len(), 8);
    }
}
