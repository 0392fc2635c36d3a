//! Security-label handling (SELinux-style mandatory access labels)
//!
//! The label subsystem is strictly feature-detected: when the kernel
//! interface is absent or disabled every operation is a no-op, so
//! nothing in this module is a hard dependency. Label I/O goes through
//! the `security.selinux` xattr; default labels come from the system's
//! path matcher binary when one is installed.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

const LABEL_XATTR: &str = "security.selinux";

/// A label split into its fields: user, role, type and, on MLS-aware
/// systems, level. `None` fields mean "keep whatever is there".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeContext(pub Vec<Option<String>>);

impl SeContext {
    /// Parse `user:role:type[:level]`. The level may itself contain
    /// colons, so the split is capped at four fields.
    pub fn from_label(label: &str) -> Self {
        Self(
            label
                .trim_end_matches('\0')
                .splitn(4, ':')
                .map(|part| Some(part.to_string()))
                .collect(),
        )
    }

    /// Render back to the colon-joined form; unset fields are empty.
    pub fn join(&self) -> String {
        self.0
            .iter()
            .map(|part| part.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(":")
    }

    pub fn is_unset(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

/// Invocation-scoped handle on the label subsystem.
#[derive(Debug, Clone)]
pub struct LabelSubsystem {
    enabled: bool,
    mls: bool,
    /// Filesystem types whose labels are fixed by the mount, not by us
    special_fs: Vec<String>,
}

impl LabelSubsystem {
    /// Probe the kernel interface once per invocation.
    pub fn detect(special_fs: Vec<String>) -> Self {
        let enabled = cfg!(target_os = "linux") && Path::new("/sys/fs/selinux/enforce").exists();
        let mls = enabled
            && std::fs::read_to_string("/sys/fs/selinux/mls")
                .map(|s| s.trim() == "1")
                .unwrap_or(false);
        Self {
            enabled,
            mls,
            special_fs,
        }
    }

    /// A subsystem that is never active; for tests and foreign platforms.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            mls: false,
            special_fs: Vec::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn mls_enabled(&self) -> bool {
        self.mls
    }

    /// All-unset context of the right width for this system.
    pub fn initial_context(&self) -> SeContext {
        SeContext(vec![None; if self.mls { 4 } else { 3 }])
    }

    /// Current label of a path. Paths without a label (or on
    /// label-less filesystems) read as the initial context.
    pub fn context(&self, path: &Path) -> Result<SeContext> {
        if !self.enabled {
            return Ok(self.initial_context());
        }
        match xattr::get(path, LABEL_XATTR) {
            Ok(Some(label)) => Ok(SeContext::from_label(&String::from_utf8_lossy(&label))),
            Ok(None) => Ok(self.initial_context()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::Label {
                path: path.to_path_buf(),
                reason: format!("path {} does not exist", path.display()),
            }),
            Err(e) => Err(Error::Label {
                path: path.to_path_buf(),
                reason: format!("failed to retrieve security label: {e}"),
            }),
        }
    }

    /// Default label for a path per the system's pattern database.
    /// Falls back to the initial context when no matcher is available.
    pub fn default_context(&self, path: &Path) -> SeContext {
        if !self.enabled {
            return self.initial_context();
        }
        let Ok(matcher) = which::which("matchpathcon") else {
            return self.initial_context();
        };
        let output = Command::new(matcher)
            .arg("-n")
            .arg(path)
            .output();
        match output {
            Ok(out) if out.status.success() => {
                let label = String::from_utf8_lossy(&out.stdout);
                let label = label.trim();
                if label.is_empty() || label == "<<none>>" {
                    self.initial_context()
                } else {
                    SeContext::from_label(label)
                }
            }
            _ => self.initial_context(),
        }
    }

    /// Label of the mount point when the path lives on a filesystem
    /// whose labels are externally fixed (network mounts and such).
    pub fn special_context(&self, path: &Path) -> Option<SeContext> {
        let mounts = std::fs::read_to_string("/proc/mounts").ok()?;
        let mount_point = find_mount_point(path);
        for line in mounts.lines() {
            let mut fields = line.split(' ');
            let _device = fields.next()?;
            let point = fields.next()?;
            let fstype = fields.next()?;
            if Path::new(point) == mount_point
                && self.special_fs.iter().any(|fs| fstype.contains(fs))
            {
                return self.context(Path::new(point)).ok();
            }
        }
        None
    }

    /// Converge the label of `path` toward `desired`, field by field.
    /// Returns the accumulated changed flag; in check mode a detected
    /// difference reports true without mutating.
    pub fn set_context_if_different(
        &self,
        path: &Path,
        desired: &SeContext,
        changed: bool,
        check_mode: bool,
    ) -> Result<bool> {
        if !self.enabled {
            return Ok(changed);
        }
        let current = self.context(path)?;
        let new_context = match self.special_context(path) {
            // Externally fixed label: copy it verbatim
            Some(special) => special,
            None => {
                let mut merged = current.clone();
                for (i, slot) in merged.0.iter_mut().enumerate() {
                    if let Some(Some(want)) = desired.0.get(i) {
                        *slot = Some(want.clone());
                    }
                }
                merged
            }
        };

        if current == new_context {
            return Ok(changed);
        }
        if check_mode {
            return Ok(true);
        }
        xattr::set(path, LABEL_XATTR, new_context.join().as_bytes()).map_err(|e| Error::Label {
            path: path.to_path_buf(),
            reason: format!(
                "invalid security label transition {} -> {}: {e}",
                current.join(),
                new_context.join()
            ),
        })?;
        Ok(true)
    }

    /// Reset a path to its default label (used after renames, which do
    /// not reliably preserve labels everywhere).
    pub fn set_default_context(&self, path: &Path) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        let default = self.default_context(path);
        self.set_context_if_different(path, &default, false, false)
    }
}

/// Walk up to the mount point containing `path`.
fn find_mount_point(path: &Path) -> PathBuf {
    use std::os::unix::fs::MetadataExt;

    let mut current = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());
    while !current.exists() {
        if !current.pop() {
            return PathBuf::from("/");
        }
    }
    loop {
        let Some(parent) = current.parent() else {
            return current;
        };
        let same_device = match (current.metadata(), parent.metadata()) {
            (Ok(a), Ok(b)) => a.dev() == b.dev(),
            _ => return current,
        };
        if !same_device {
            return current;
        }
        current = parent.to_path_buf();
    }
}

/// Thin lgetxattr/lsetxattr wrappers; labels never follow symlinks.
mod xattr {
    use std::ffi::CString;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    fn c_path(path: &Path) -> io::Result<CString> {
        CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }

    #[cfg(target_os = "linux")]
    pub fn get(path: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
        let c_path = c_path(path)?;
        let c_name = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut buf = vec![0_u8; 256];
        let len = unsafe {
            libc::lgetxattr(
                c_path.as_ptr(),
                c_name.as_ptr(),
                buf.as_mut_ptr().cast(),
                buf.len(),
            )
        };
        if len >= 0 {
            buf.truncate(len as usize);
            return Ok(Some(buf));
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            // No label present, or the filesystem does not do labels
            Some(libc::ENODATA) | Some(libc::EOPNOTSUPP) => Ok(None),
            _ => Err(err),
        }
    }

    #[cfg(target_os = "linux")]
    pub fn set(path: &Path, name: &str, value: &[u8]) -> io::Result<()> {
        let c_path = c_path(path)?;
        let c_name = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let rc = unsafe {
            libc::lsetxattr(
                c_path.as_ptr(),
                c_name.as_ptr(),
                value.as_ptr().cast(),
                value.len(),
                0,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn get(path: &Path, _name: &str) -> io::Result<Option<Vec<u8>>> {
        let _ = c_path(path)?;
        Ok(None)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn set(path: &Path, _name: &str, _value: &[u8]) -> io::Result<()> {
        let _ = c_path(path)?;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "security labels are not supported on this platform",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_parsing_caps_at_level() {
        let ctx = SeContext::from_label("system_u:object_r:etc_t:s0:c0.c1023");
        assert_eq!(ctx.0.len(), 4);
        assert_eq!(ctx.0[3].as_deref(), Some("s0:c0.c1023"));
        assert_eq!(ctx.join(), "system_u:object_r:etc_t:s0:c0.c1023");
    }

    #[test]
    fn test_disabled_subsystem_is_inert() {
        let label = LabelSubsystem::disabled();
        assert!(!label.enabled());
        let ctx = label.context(Path::new("/definitely/not/there")).unwrap();
        assert!(ctx.is_unset());
        let changed = label
            .set_context_if_different(Path::new("/tmp"), &ctx, false, false)
            .unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_find_mount_point_reaches_a_mount() {
        let mp = find_mount_point(Path::new("/usr/share/doc/nothing/here"));
        assert!(mp.exists());
    }
}
