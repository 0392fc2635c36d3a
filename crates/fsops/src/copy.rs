//! Metadata-preserving copies, dated backups, cleanup, content digests

use crate::error::{Error, Result};
use crate::ident;
use crate::selabel::LabelSubsystem;
use std::ffi::CString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Copy a file with permissions, timestamps, ownership and security
/// label preserved. Ownership transfer tolerates EPERM (unprivileged
/// callers cannot chown); every other failure is fatal.
pub fn preserved_copy(selinux: &LabelSubsystem, src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest)?;
    copy_times(src, dest);

    if selinux.enabled() {
        let context = selinux.context(src)?;
        selinux.set_context_if_different(dest, &context, false, false)?;
    }

    let (src_uid, src_gid) = ident::user_and_group(src)?;
    let (dest_uid, dest_gid) = ident::user_and_group(dest)?;
    if src_uid != dest_uid || src_gid != dest_gid {
        if let Err(e) = ident::chown(dest, Some(src_uid), Some(src_gid)) {
            if e.raw_os_error() != Some(libc::EPERM) {
                return Err(Error::Io(e));
            }
        }
    }
    Ok(())
}

/// Best-effort atime/mtime transfer.
fn copy_times(src: &Path, dest: &Path) {
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = fs::metadata(src) else { return };
    let Ok(c_dest) = CString::new(dest.as_os_str().as_bytes()) else {
        return;
    };
    let times = [
        libc::timespec {
            tv_sec: meta.atime(),
            tv_nsec: meta.atime_nsec(),
        },
        libc::timespec {
            tv_sec: meta.mtime(),
            tv_nsec: meta.mtime_nsec(),
        },
    ];
    let rc = unsafe { libc::utimensat(libc::AT_FDCWD, c_dest.as_ptr(), times.as_ptr(), 0) };
    if rc != 0 {
        log::debug!("could not preserve timestamps on {}", dest.display());
    }
}

/// Make a date-marked backup next to the original:
/// `name.<pid>.<YYYY-MM-DD@HH:MM:SS~>`. Returns the backup path, or
/// `None` when there is nothing to back up.
pub fn backup_local(selinux: &LabelSubsystem, path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let stamp = chrono::Local::now().format("%Y-%m-%d@%H:%M:%S~");
    let backup = PathBuf::from(format!(
        "{}.{}.{stamp}",
        path.display(),
        std::process::id()
    ));
    preserved_copy(selinux, path, &backup)?;
    Ok(Some(backup))
}

/// Delete a leftover temporary file. Best-effort: failure is logged,
/// never fatal.
pub fn cleanup_path(path: &Path) {
    if !path.exists() && !path.is_symlink() {
        return;
    }
    if let Err(e) = fs::remove_file(path) {
        log::warn!("could not cleanup {}: {e}", path.display());
    }
}

/// Hex content digest of a file, or `None` when it does not exist.
pub fn digest_from_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    if path.is_dir() {
        return Err(Error::ChecksumDirectory(path.to_path_buf()));
    }

    let mut hasher = blake3::Hasher::new();
    let mut file = fs::File::open(path)?;
    let mut block = vec![0_u8; 64 * 1024];
    loop {
        let read = file.read(&mut block)?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
    }
    Ok(Some(hasher.finalize().to_hex().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_preserved_copy_keeps_mode() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::write(&src, b"payload").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o640)).unwrap();

        preserved_copy(&LabelSubsystem::disabled(), &src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert_eq!(
            fs::metadata(&dest).unwrap().permissions().mode() & 0o7777,
            0o640
        );
    }

    #[test]
    fn test_backup_local_names_and_content() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("config");
        fs::write(&original, b"v1").unwrap();

        let backup = backup_local(&LabelSubsystem::disabled(), &original)
            .unwrap()
            .unwrap();
        assert!(backup.to_string_lossy().ends_with('~'));
        assert!(
            backup
                .to_string_lossy()
                .contains(&std::process::id().to_string())
        );
        assert_eq!(fs::read(&backup).unwrap(), b"v1");

        let missing = dir.path().join("absent");
        assert!(
            backup_local(&LabelSubsystem::disabled(), &missing)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_cleanup_is_silent_on_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone");
        cleanup_path(&path);
        fs::write(&path, b"x").unwrap();
        cleanup_path(&path);
        assert!(!path.exists());
    }

    #[test]
    fn test_digest_matches_known_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, b"abc").unwrap();

        let digest = digest_from_file(&path).unwrap().unwrap();
        assert_eq!(digest, blake3::hash(b"abc").to_hex().to_string());
        assert!(digest_from_file(&dir.path().join("nope")).unwrap().is_none());
        assert!(digest_from_file(dir.path()).is_err());
    }
}
