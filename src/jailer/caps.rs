//! Capability dropping and `no_new_privs`.
//!
//! Both must happen before any untrusted code runs: dropping effective and
//! permitted capabilities removes any ambient privilege the process might
//! still carry, and `no_new_privs` guarantees `execve` of a setuid binary
//! inside the jail can't raise privileges back up. `no_new_privs` is set
//! first so it's in effect for every subsequent step, including filter
//! installation itself — filter composition only narrows, never widens.

use caps::CapSet;

use crate::error::SystemError;

/// Clear the effective, permitted, and inheritable capability sets of the
/// current process.
pub fn drop_all() -> Result<(), SystemError> {
    for set in [CapSet::Inheritable, CapSet::Effective, CapSet::Permitted] {
        caps::clear(None, set)
            .map_err(|e| SystemError::Capabilities(format!("clearing {set:?}: {e}")))?;
    }
    debug_assert!(
        caps::read(None, CapSet::Effective)
            .map(|s| s.is_empty())
            .unwrap_or(true),
        "effective capability set not empty after drop_all"
    );
    Ok(())
}

/// Set `PR_SET_NO_NEW_PRIVS`, preventing any future `execve` in this
/// process (or its descendants) from gaining privileges it doesn't already
/// have.
pub fn set_no_new_privs() -> Result<(), SystemError> {
    let rc = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
    if rc != 0 {
        return Err(SystemError::Capabilities(format!(
            "prctl(PR_SET_NO_NEW_PRIVS) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

/// Read back whether `no_new_privs` is set on the current thread.
pub fn no_new_privs_is_set() -> bool {
    unsafe { libc::prctl(libc::PR_GET_NO_NEW_PRIVS, 0, 0, 0, 0) == 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_no_new_privs_is_observable() {
        // Harmless to call repeatedly; no_new_privs is monotonic (can only
        // be turned on, never back off) so this is safe in a test process.
        set_no_new_privs().unwrap();
        assert!(no_new_privs_is_set());
    }
}
