//! Owner/group identity resolution through the system user database

use crate::error::{Error, Result};
use std::ffi::{CStr, CString};
use std::mem::MaybeUninit;
use std::path::Path;
use std::ptr;

/// Resolve an owner argument - numeric id or account name - to a uid.
/// A name that does not exist is fatal, never silently skipped.
pub fn resolve_uid(owner: &str) -> Result<u32> {
    if let Ok(uid) = owner.parse::<u32>() {
        return Ok(uid);
    }
    uid_for_name(owner).ok_or_else(|| Error::UserLookup(owner.to_string()))
}

/// Resolve a group argument to a gid.
pub fn resolve_gid(group: &str) -> Result<u32> {
    if let Ok(gid) = group.parse::<u32>() {
        return Ok(gid);
    }
    gid_for_name(group).ok_or_else(|| Error::GroupLookup(group.to_string()))
}

/// Current owner and group of a path, without following a final symlink.
pub fn user_and_group(path: &Path) -> Result<(u32, u32)> {
    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::symlink_metadata(path)?;
    Ok((meta.uid(), meta.gid()))
}

fn uid_for_name(name: &str) -> Option<u32> {
    let c_name = CString::new(name).ok()?;
    let mut pwd = MaybeUninit::<libc::passwd>::uninit();
    let mut buf = vec![0_u8; 4096];
    let mut result: *mut libc::passwd = ptr::null_mut();

    unsafe {
        libc::getpwnam_r(
            c_name.as_ptr(),
            pwd.as_mut_ptr(),
            buf.as_mut_ptr().cast(),
            buf.len(),
            &mut result,
        );
        if result.is_null() {
            None
        } else {
            Some((*result).pw_uid)
        }
    }
}

fn gid_for_name(name: &str) -> Option<u32> {
    let c_name = CString::new(name).ok()?;
    let mut grp = MaybeUninit::<libc::group>::uninit();
    let mut buf = vec![0_u8; 4096];
    let mut result: *mut libc::group = ptr::null_mut();

    unsafe {
        libc::getgrnam_r(
            c_name.as_ptr(),
            grp.as_mut_ptr(),
            buf.as_mut_ptr().cast(),
            buf.len(),
            &mut result,
        );
        if result.is_null() {
            None
        } else {
            Some((*result).gr_gid)
        }
    }
}

/// Account name for a uid, falling back to the numeric form.
pub fn user_name(uid: u32) -> String {
    let mut pwd = MaybeUninit::<libc::passwd>::uninit();
    let mut buf = vec![0_u8; 4096];
    let mut result: *mut libc::passwd = ptr::null_mut();

    unsafe {
        libc::getpwuid_r(
            uid,
            pwd.as_mut_ptr(),
            buf.as_mut_ptr().cast(),
            buf.len(),
            &mut result,
        );
        if result.is_null() {
            uid.to_string()
        } else {
            CStr::from_ptr((*result).pw_name)
                .to_string_lossy()
                .into_owned()
        }
    }
}

/// Group name for a gid, falling back to the numeric form.
pub fn group_name(gid: u32) -> String {
    let mut grp = MaybeUninit::<libc::group>::uninit();
    let mut buf = vec![0_u8; 4096];
    let mut result: *mut libc::group = ptr::null_mut();

    unsafe {
        libc::getgrgid_r(
            gid,
            grp.as_mut_ptr(),
            buf.as_mut_ptr().cast(),
            buf.len(),
            &mut result,
        );
        if result.is_null() {
            gid.to_string()
        } else {
            CStr::from_ptr((*result).gr_name)
                .to_string_lossy()
                .into_owned()
        }
    }
}

/// Effective uid of this process.
pub fn effective_uid() -> u32 {
    unsafe { libc::geteuid() }
}

/// Effective gid of this process.
pub fn effective_gid() -> u32 {
    unsafe { libc::getegid() }
}

/// Whether the process is acting under a different identity than it
/// was invoked with (sudo and friends).
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() != libc::getuid() }
}

/// Current process umask, read without changing it observably.
pub fn current_umask() -> u32 {
    unsafe {
        let mask = libc::umask(0);
        libc::umask(mask);
        u32::from(mask)
    }
}

/// Change ownership of `path`, following symlinks. `None` leaves that
/// half untouched.
pub fn chown(path: &Path, uid: Option<u32>, gid: Option<u32>) -> std::io::Result<()> {
    chown_impl(path, uid, gid, false)
}

/// Change ownership of `path` itself, never following a final symlink.
pub fn lchown(path: &Path, uid: Option<u32>, gid: Option<u32>) -> std::io::Result<()> {
    chown_impl(path, uid, gid, true)
}

fn chown_impl(path: &Path, uid: Option<u32>, gid: Option<u32>, link: bool) -> std::io::Result<()> {
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let uid = uid.map_or(libc::uid_t::MAX, |u| u as libc::uid_t);
    let gid = gid.map_or(libc::gid_t::MAX, |g| g as libc::gid_t);
    let rc = unsafe {
        if link {
            libc::lchown(c_path.as_ptr(), uid, gid)
        } else {
            libc::chown(c_path.as_ptr(), uid, gid)
        }
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_identity_passes_through() {
        assert_eq!(resolve_uid("0").unwrap(), 0);
        assert_eq!(resolve_gid("12").unwrap(), 12);
    }

    #[test]
    fn test_root_resolves_by_name() {
        assert_eq!(resolve_uid("root").unwrap(), 0);
    }

    #[test]
    fn test_unknown_name_is_fatal() {
        assert!(resolve_uid("no-such-user-here").is_err());
        assert!(resolve_gid("no-such-group-here").is_err());
    }

    #[test]
    fn test_uid_zero_names_root() {
        assert_eq!(user_name(0), "root");
    }

    #[test]
    fn test_umask_round_trip() {
        let first = current_umask();
        assert_eq!(current_umask(), first);
    }
}
