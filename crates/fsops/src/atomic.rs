//! Atomic content replacement
//!
//! The destination is, at every externally observable instant, either
//! the old content or the new content - never missing, never torn.
//! rename(2) gives that directly when it works; the fallback stages a
//! temporary file inside the destination directory so the final rename
//! is still same-filesystem atomic.

use crate::copy::preserved_copy;
use crate::error::{Error, Result};
use crate::ident;
use crate::mode::{DEFAULT_PERM, PERM_BITS};
use crate::selabel::{LabelSubsystem, SeContext};
use std::fs::{self, Metadata, Permissions};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

/// Atomically move `src` onto `dest`, copying attributes from an
/// existing destination so the replacement is invisible to observers.
///
/// `unsafe_writes` is the caller's explicit opt-in to a non-atomic
/// truncate-and-copy when the filesystem refuses every atomic route
/// (container bind mounts and other exotic setups).
pub fn atomic_replace(
    selinux: &LabelSubsystem,
    src: &Path,
    dest: &Path,
    unsafe_writes: bool,
) -> Result<()> {
    let dest_stat = fs::metadata(dest).ok();
    let mut context: Option<SeContext> = None;

    if let Some(stat) = &dest_stat {
        // Carry the existing mode and ownership over to the incoming
        // file; EPERM is expected for unprivileged callers
        if let Err(e) = copy_ownership(src, stat) {
            if e.raw_os_error() != Some(libc::EPERM) {
                return Err(Error::Io(e));
            }
        }
        if selinux.enabled() {
            context = Some(selinux.context(dest)?);
        }
    } else if selinux.enabled() {
        context = Some(selinux.default_context(dest));
    }

    let creating = dest_stat.is_none();

    if let Err(e) = fs::rename(src, dest) {
        match e.raw_os_error() {
            // Cross-device, permission, access and busy-text errors
            // have a workaround; everything else is fatal
            Some(libc::EPERM | libc::EXDEV | libc::EACCES | libc::ETXTBSY | libc::EBUSY) => {
                fallback_replace(
                    selinux,
                    src,
                    dest,
                    dest_stat.as_ref(),
                    context.as_ref(),
                    unsafe_writes,
                )?;
            }
            _ => {
                return Err(Error::Replace {
                    src: src.to_path_buf(),
                    dest: dest.to_path_buf(),
                    source: e,
                });
            }
        }
    }

    if creating {
        let umask = ident::current_umask();
        fs::set_permissions(dest, Permissions::from_mode(DEFAULT_PERM & !umask))?;
        // Hand a newly created file to the acting identity; failure
        // here is fine, unprivileged users simply cannot chown
        let _ = ident::chown(
            dest,
            Some(ident::effective_uid()),
            Some(ident::effective_gid()),
        );
    }

    if selinux.enabled() {
        if let Some(context) = &context {
            // rename does not reliably preserve the label everywhere
            selinux.set_context_if_different(dest, context, false, false)?;
        }
    }
    Ok(())
}

fn copy_ownership(src: &Path, dest_stat: &Metadata) -> std::io::Result<()> {
    fs::set_permissions(src, Permissions::from_mode(dest_stat.mode() & PERM_BITS))?;
    ident::chown(src, Some(dest_stat.uid()), Some(dest_stat.gid()))
}

/// Stage through a tempfile in the destination directory and rename
/// that into place. Any failure removes the tempfile before raising.
fn fallback_replace(
    selinux: &LabelSubsystem,
    src: &Path,
    dest: &Path,
    dest_stat: Option<&Metadata>,
    context: Option<&SeContext>,
    unsafe_writes: bool,
) -> Result<()> {
    let dest_dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let suffix = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let staged = match tempfile::Builder::new()
        .prefix(".modkit_tmp")
        .suffix(&suffix)
        .tempfile_in(dest_dir)
    {
        Ok(file) => file,
        Err(e) => {
            if unsafe_writes {
                return unsafe_write(src, dest);
            }
            return Err(Error::DestDirNotWritable {
                dir: dest_dir.to_path_buf(),
                source: e,
            });
        }
    };
    // Close the handle before operating by name; the TempPath removes
    // the file on drop, which covers every error exit below
    let staged = staged.into_temp_path();

    if ident::is_elevated() && ident::effective_uid() != 0 {
        // A moved file would stay stranded under the elevated
        // identity; copy instead and let the caller's scratch
        // directory reap the source
        preserved_copy(selinux, src, &staged)?;
    } else if fs::rename(src, &staged).is_err() {
        // Cross-device move degrades to a metadata-preserving copy
        preserved_copy(selinux, src, &staged)?;
    }

    if selinux.enabled() {
        if let Some(context) = context {
            selinux.set_context_if_different(&staged, context, false, false)?;
        }
    }

    if let Some(stat) = dest_stat {
        let (staged_uid, staged_gid) = ident::user_and_group(&staged)?;
        if staged_uid != stat.uid() || staged_gid != stat.gid() {
            if let Err(e) = ident::chown(&staged, Some(stat.uid()), Some(stat.gid())) {
                if e.raw_os_error() != Some(libc::EPERM) {
                    return Err(Error::Io(e));
                }
            }
        }
    }

    match fs::rename(&staged, dest) {
        Ok(()) => {
            // The rename consumed the staged file; forget the path so
            // drop does not try to delete the now-live destination path
            let _ = staged.keep();
            Ok(())
        }
        Err(e) if unsafe_writes && e.raw_os_error() == Some(libc::EBUSY) => {
            unsafe_write(&staged, dest)
        }
        Err(e) => Err(Error::Replace {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            source: e,
        }),
    }
}

/// Non-atomic last resort, only on explicit caller opt-in.
fn unsafe_write(src: &Path, dest: &Path) -> Result<()> {
    let mut input = fs::File::open(src).map_err(|e| replace_error(src, dest, e))?;
    let mut output = fs::File::create(dest).map_err(|e| replace_error(src, dest, e))?;
    std::io::copy(&mut input, &mut output).map_err(|e| replace_error(src, dest, e))?;
    Ok(())
}

fn replace_error(src: &Path, dest: &Path, source: std::io::Error) -> Error {
    Error::Replace {
        src: src.to_path_buf(),
        dest: dest.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_replace_existing_preserves_mode() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("incoming");
        let dest = dir.path().join("config");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();
        fs::set_permissions(&dest, Permissions::from_mode(0o640)).unwrap();

        atomic_replace(&LabelSubsystem::disabled(), &src, &dest, false).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert_eq!(
            fs::metadata(&dest).unwrap().permissions().mode() & PERM_BITS,
            0o640
        );
        assert!(!src.exists());
    }

    #[test]
    fn test_create_applies_umask_perm() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("incoming");
        let dest = dir.path().join("fresh");
        fs::write(&src, b"content").unwrap();

        atomic_replace(&LabelSubsystem::disabled(), &src, &dest, false).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"content");
        let expected = DEFAULT_PERM & !ident::current_umask();
        assert_eq!(
            fs::metadata(&dest).unwrap().permissions().mode() & PERM_BITS,
            expected
        );
    }

    #[test]
    fn test_destination_never_missing_during_replace() {
        // Replacing repeatedly, the destination must exist with full
        // content at every step - rename guarantees it, this guards
        // the orchestration around the rename
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("live");
        fs::write(&dest, b"gen-0").unwrap();

        for generation in 1..=5_u8 {
            let src = dir.path().join("staging");
            fs::write(&src, format!("gen-{generation}")).unwrap();
            atomic_replace(&LabelSubsystem::disabled(), &src, &dest, false).unwrap();
            assert!(dest.exists());
            let content = fs::read_to_string(&dest).unwrap();
            assert_eq!(content, format!("gen-{generation}"));
        }
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = atomic_replace(
            &LabelSubsystem::disabled(),
            &dir.path().join("ghost"),
            &dir.path().join("dest"),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Replace { .. }));
    }
}
