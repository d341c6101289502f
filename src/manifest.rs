//! The fixed template manifest.
//!
//! A compile-time list of template-relative paths that must exist in the
//! template directory and get hard-linked into every build jail. Kept as a
//! `&[&str]` constant rather than a configuration input: the manifest is
//! fixed per toolchain build, not per deployment.

/// Binaries, dynamic loader, and libstd archives the compile stage needs.
/// Order is insignificant; linking stops at the first failure, which the
/// caller treats as fatal regardless of which entry failed.
pub const TEMPLATE_MANIFEST: &[&str] = &[
    // Compiler toolchain binaries.
    "mbld",
    "6m",
    "as",
    "ld",
    // Dynamic loader and its dependencies.
    "lib64/libbfd-2.24.51-system.20140903.so",
    "lib64/libopcodes-2.24.51-system.20140903.so",
    "lib64/libz.so.1",
    "lib64/libdl.so.2",
    "lib64/libc.so.6",
    "lib64/ld-linux-x86-64.so.2",
    // Standard library sources and archives.
    "lib/myr/std",
    "lib/myr/libstd.a",
    "lib/myr/regex",
    "lib/myr/libregex.a",
    "lib/myr/bio",
    "lib/myr/libbio.a",
    "lib/myr/date",
    "lib/myr/libdate.a",
    "lib/myr/_myrrt.o",
];

/// Directories created (mode `0700`) under a fresh build scratch dir before
/// the manifest is hard-linked in.
pub const BUILD_SUBDIRS: &[&str] = &["lib64", "lib", "lib/myr", "tmp"];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn manifest_has_no_duplicates() {
        let set: HashSet<&str> = TEMPLATE_MANIFEST.iter().copied().collect();
        assert_eq!(set.len(), TEMPLATE_MANIFEST.len());
    }

    #[test]
    fn manifest_is_nonempty() {
        assert!(!TEMPLATE_MANIFEST.is_empty());
    }

    #[test]
    fn build_subdirs_cover_every_manifest_parent() {
        for entry in TEMPLATE_MANIFEST {
            if let Some(parent) = std::path::Path::new(entry).parent() {
                let parent = parent.to_string_lossy();
                if parent.is_empty() {
                    continue;
                }
                assert!(
                    BUILD_SUBDIRS.contains(&parent.as_ref()),
                    "manifest entry {entry} has parent {parent} not in BUILD_SUBDIRS"
                );
            }
        }
    }
}
