//! Error types for filesystem operations.
//!
//! Variants distinguish tolerated conditions (handled inside this
//! crate) from fatal ones that must abort the invocation. Anything
//! surfacing here is fatal; symlink-permission and broken-link cases
//! never escape the reconciler.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Owner name did not resolve to a uid
    #[error("chown failed: failed to look up user {0}")]
    UserLookup(String),

    /// Group name did not resolve to a gid
    #[error("chgrp failed: failed to look up group {0}")]
    GroupLookup(String),

    #[error("chown failed on {path}: {source}")]
    Chown {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("chmod failed on {path}: {source}")]
    Chmod {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Mode string is neither octal nor valid symbolic syntax
    #[error("mode must be in octal or symbolic form: {reason}")]
    BadMode { reason: String },

    /// Security-label lookup or set failed while the subsystem is active
    #[error("security label operation failed on {path}: {reason}")]
    Label { path: PathBuf, reason: String },

    /// Rename/replace failed with an errno we do not work around
    #[error("could not replace file {src} to {dest}: {source}")]
    Replace {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The fallback tempfile could not be created next to the destination
    #[error("the destination directory ({dir}) is not writable by the current user: {source}")]
    DestDirNotWritable {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("attempted to take checksum of directory: {0}")]
    ChecksumDirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
