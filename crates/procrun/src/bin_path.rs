//! Executable lookup across PATH and the sbin directories

use std::path::{Path, PathBuf};

const SBIN_PATHS: &[&str] = &["/sbin", "/usr/sbin", "/usr/local/sbin"];

/// Find an executable by name.
///
/// Searches any `opt_dirs` first, then PATH, then the sbin directories
/// (system tools often live there even for unprivileged callers).
/// Returns `None` when nothing matches.
pub fn get_bin_path(name: &str, opt_dirs: &[&Path]) -> Option<PathBuf> {
    let mut paths: Vec<PathBuf> = opt_dirs
        .iter()
        .filter(|dir| dir.exists())
        .map(|dir| dir.to_path_buf())
        .collect();

    if let Some(env_path) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&env_path));
    }
    for sbin in SBIN_PATHS {
        let sbin = PathBuf::from(sbin);
        if sbin.exists() && !paths.contains(&sbin) {
            paths.push(sbin);
        }
    }

    let joined = std::env::join_paths(paths).ok()?;
    let cwd = std::env::current_dir().ok()?;
    which::which_in(name, Some(joined), cwd).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_sh() {
        let path = get_bin_path("sh", &[]).expect("sh should exist");
        assert!(path.is_absolute());
    }

    #[test]
    fn test_missing_binary_is_none() {
        assert!(get_bin_path("definitely-not-a-binary-name", &[]).is_none());
    }

    #[test]
    fn test_opt_dirs_take_precedence() {
        let dir = std::env::temp_dir();
        // A nonexistent opt_dir is skipped without error
        let missing = dir.join("no-such-subdir-for-bin-path");
        assert!(get_bin_path("sh", &[&missing]).is_some());
    }
}
