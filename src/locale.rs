//! Defensive process environment normalization
//!
//! Modules inherit whatever locale and working directory the transport
//! left behind. Both get fixed up before anything else runs; neither
//! failure mode is fatal.

use std::ffi::CString;
use std::path::{Path, PathBuf};

/// Validate the environment-selected locale; on failure fall back to
/// the neutral "C" locale and pin the locale variables so child
/// processes agree with us.
pub fn check_locale() {
    let empty = CString::new("").unwrap();
    let selected = unsafe { libc::setlocale(libc::LC_ALL, empty.as_ptr()) };
    if !selected.is_null() {
        return;
    }
    let neutral = CString::new("C").unwrap();
    unsafe {
        libc::setlocale(libc::LC_ALL, neutral.as_ptr());
        for var in ["LANG", "LC_ALL", "LC_MESSAGES"] {
            std::env::set_var(var, "C");
        }
    }
    log::debug!("environment locale unavailable, fell back to C");
}

/// Make sure the working directory is somewhere we can actually be.
/// Fallback chain: home directory, then the system temp directory.
/// Total failure is tolerated - some modules never touch the cwd.
pub fn normalize_cwd() -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if readable(&cwd) {
            return Some(cwd);
        }
    }
    let candidates = [dirs::home_dir(), Some(std::env::temp_dir())];
    for candidate in candidates.into_iter().flatten() {
        if readable(&candidate) && std::env::set_current_dir(&candidate).is_ok() {
            return Some(candidate);
        }
    }
    None
}

fn readable(path: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).is_ok_and(|c_path| {
        (unsafe { libc::access(c_path.as_ptr(), libc::F_OK | libc::R_OK) }) == 0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_locale_never_panics() {
        check_locale();
    }

    #[test]
    fn test_normalize_cwd_lands_somewhere_readable() {
        let cwd = normalize_cwd().expect("some directory must be usable");
        assert!(readable(&cwd));
    }
}
