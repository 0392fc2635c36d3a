//! Idempotent attribute convergence
//!
//! Each attribute follows the same shape: read the current value,
//! compare with the desired one, skip when nothing is declared,
//! otherwise mutate (or report "would change" in check mode) and fold
//! the decision into the aggregate `changed` flag. The aggregate is
//! the logical OR of the independent per-attribute decisions.

use crate::error::{Error, Result};
use crate::ident;
use crate::mode::{ModeSpec, PERM_BITS};
use crate::selabel::{LabelSubsystem, SeContext};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Desired state of one filesystem path.
#[derive(Debug, Clone)]
pub struct FileAttrs {
    pub path: PathBuf,
    pub mode: Option<ModeSpec>,
    pub owner: Option<String>,
    pub group: Option<String>,
    /// Desired security label; `None` skips label reconciliation
    pub secontext: Option<SeContext>,
    /// Operate on the symlink target instead of the link itself
    pub follow: bool,
}

impl FileAttrs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: None,
            owner: None,
            group: None,
            secontext: None,
            follow: false,
        }
    }
}

/// Invocation-scoped reconciler: carries the label subsystem handle and
/// the check-mode flag so callers never thread them by hand.
#[derive(Debug)]
pub struct Reconciler<'a> {
    selinux: &'a LabelSubsystem,
    check_mode: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(selinux: &'a LabelSubsystem, check_mode: bool) -> Self {
        Self {
            selinux,
            check_mode,
        }
    }

    /// Converge every declared attribute; the result is the OR of the
    /// per-attribute decisions folded over the incoming flag.
    pub fn set_fs_attributes_if_different(
        &self,
        attrs: &FileAttrs,
        changed: bool,
    ) -> Result<bool> {
        let mut changed = changed;
        if let Some(context) = &attrs.secontext {
            changed = self.set_context_if_different(&attrs.path, context, changed)?;
        }
        changed = self.set_owner_if_different(&attrs.path, attrs.owner.as_deref(), changed)?;
        changed = self.set_group_if_different(&attrs.path, attrs.group.as_deref(), changed)?;
        changed = self.set_mode_if_different(&attrs.path, attrs.mode.as_ref(), changed)?;
        Ok(changed)
    }

    pub fn set_context_if_different(
        &self,
        path: &Path,
        context: &SeContext,
        changed: bool,
    ) -> Result<bool> {
        self.selinux
            .set_context_if_different(path, context, changed, self.check_mode)
    }

    pub fn set_owner_if_different(
        &self,
        path: &Path,
        owner: Option<&str>,
        changed: bool,
    ) -> Result<bool> {
        let Some(owner) = owner else {
            return Ok(changed);
        };
        let (current_uid, _) = ident::user_and_group(path)?;
        let uid = ident::resolve_uid(owner)?;
        if current_uid == uid {
            return Ok(changed);
        }
        if self.check_mode {
            return Ok(true);
        }
        ident::lchown(path, Some(uid), None).map_err(|source| Error::Chown {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }

    pub fn set_group_if_different(
        &self,
        path: &Path,
        group: Option<&str>,
        changed: bool,
    ) -> Result<bool> {
        let Some(group) = group else {
            return Ok(changed);
        };
        let (_, current_gid) = ident::user_and_group(path)?;
        let gid = ident::resolve_gid(group)?;
        if current_gid == gid {
            return Ok(changed);
        }
        if self.check_mode {
            return Ok(true);
        }
        ident::lchown(path, None, Some(gid)).map_err(|source| Error::Chown {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }

    /// Mode convergence. After a real chmod the mode is re-read; if it
    /// still differs from the target (symlinks on platforms that cannot
    /// chmod them) the attempt counts as a no-op rather than an error.
    pub fn set_mode_if_different(
        &self,
        path: &Path,
        mode: Option<&ModeSpec>,
        changed: bool,
    ) -> Result<bool> {
        let Some(mode) = mode else {
            return Ok(changed);
        };
        let stat = fs::symlink_metadata(path)?;
        let prev_mode = stat.permissions().mode() & PERM_BITS;
        let target = mode.resolve(prev_mode, stat.is_dir(), ident::current_umask())?;

        if prev_mode == target {
            return Ok(changed);
        }
        if self.check_mode {
            return Ok(true);
        }

        let is_link = stat.file_type().is_symlink();
        if let Err(e) = apply_mode(path, target, is_link) {
            let tolerated = match e.raw_os_error() {
                // Can't set mode on symbolic links
                Some(libc::EPERM) => is_link,
                // Can't set mode on broken symbolic links
                Some(libc::ENOENT | libc::ELOOP) => true,
                _ => false,
            };
            if !tolerated {
                return Err(Error::Chmod {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }

        let new_mode = fs::symlink_metadata(path)?.permissions().mode() & PERM_BITS;
        if new_mode == prev_mode {
            Ok(changed)
        } else {
            Ok(true)
        }
    }
}

/// chmod wrapper. Plain paths chmod directly; for symlinks the chmod
/// follows the link, so the target's original mode is put back if the
/// call ended up altering it.
fn apply_mode(path: &Path, target: u32, is_link: bool) -> std::io::Result<()> {
    if !is_link {
        return fs::set_permissions(path, fs::Permissions::from_mode(target));
    }
    let underlying = fs::metadata(path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(target))?;
    let after = fs::metadata(path)?;
    if underlying.permissions().mode() != after.permissions().mode() {
        fs::set_permissions(
            path,
            fs::Permissions::from_mode(underlying.permissions().mode() & PERM_BITS),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn reconciler(selinux: &LabelSubsystem) -> Reconciler<'_> {
        Reconciler::new(selinux, false)
    }

    #[test]
    fn test_mode_apply_then_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("target");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        let selinux = LabelSubsystem::disabled();
        let rec = reconciler(&selinux);
        let mut attrs = FileAttrs::new(&file);
        attrs.mode = Some(ModeSpec::Octal(0o600));

        assert!(rec.set_fs_attributes_if_different(&attrs, false).unwrap());
        assert_eq!(
            fs::metadata(&file).unwrap().permissions().mode() & PERM_BITS,
            0o600
        );
        // Second application converges to no change
        assert!(!rec.set_fs_attributes_if_different(&attrs, false).unwrap());
    }

    #[test]
    fn test_symbolic_mode_resolves_against_current() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("target");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        let selinux = LabelSubsystem::disabled();
        let rec = reconciler(&selinux);
        let changed = rec
            .set_mode_if_different(&file, Some(&ModeSpec::parse("u+x")), false)
            .unwrap();
        assert!(changed);
        assert_eq!(
            fs::metadata(&file).unwrap().permissions().mode() & PERM_BITS,
            0o744
        );
    }

    #[test]
    fn test_check_mode_reports_without_mutating() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("target");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        let selinux = LabelSubsystem::disabled();
        let rec = Reconciler::new(&selinux, true);
        let changed = rec
            .set_mode_if_different(&file, Some(&ModeSpec::Octal(0o600)), false)
            .unwrap();
        assert!(changed);
        assert_eq!(
            fs::metadata(&file).unwrap().permissions().mode() & PERM_BITS,
            0o644
        );
    }

    #[test]
    fn test_unset_attributes_are_skipped() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("target");
        fs::write(&file, b"x").unwrap();

        let selinux = LabelSubsystem::disabled();
        let rec = reconciler(&selinux);
        let attrs = FileAttrs::new(&file);
        assert!(!rec.set_fs_attributes_if_different(&attrs, false).unwrap());
    }

    #[test]
    fn test_owner_noop_when_already_owned() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("target");
        fs::write(&file, b"x").unwrap();
        let (uid, gid) = ident::user_and_group(&file).unwrap();

        let selinux = LabelSubsystem::disabled();
        let rec = reconciler(&selinux);
        let changed = rec
            .set_owner_if_different(&file, Some(&uid.to_string()), false)
            .unwrap();
        assert!(!changed);
        let changed = rec
            .set_group_if_different(&file, Some(&gid.to_string()), false)
            .unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_unknown_owner_is_fatal() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("target");
        fs::write(&file, b"x").unwrap();

        let selinux = LabelSubsystem::disabled();
        let rec = reconciler(&selinux);
        let err = rec
            .set_owner_if_different(&file, Some("no-such-user-here"), false)
            .unwrap_err();
        assert!(matches!(err, Error::UserLookup(_)));
    }
}
