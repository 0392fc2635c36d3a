//! Process execution errors.
//!
//! Every variant is fatal to the invocation; messages are already
//! redacted where they embed command lines or stderr.

use thiserror::Error;

/// Reserved return code signaling an internal executor condition
/// (spawn failure, prompt detection) rather than a child exit code.
pub const SENTINEL_RC: i32 = 257;

#[derive(Debug, Error)]
pub enum Error {
    /// The child process could not be started
    #[error("failed to execute {cmd}: {reason}")]
    Spawn {
        /// Redacted command echo
        cmd: String,
        reason: String,
        /// errno when the OS supplied one, else [`SENTINEL_RC`]
        rc: i32,
    },

    #[error("invalid prompt regular expression given: {0}")]
    BadPromptRegex(String),

    /// Command string could not be tokenized
    #[error("could not tokenize command line: {0}")]
    BadShellWords(String),

    /// Caller requested a success check and the child exited non-zero
    #[error("command {cmd} returned {rc}: {msg}")]
    NonZeroExit {
        /// Redacted command echo
        cmd: String,
        rc: i32,
        /// Redacted stderr
        msg: String,
        stdout: String,
        stderr: String,
    },
}

impl Error {
    /// Return code to surface in a failure envelope.
    pub fn rc(&self) -> i32 {
        match self {
            Self::Spawn { rc, .. } => *rc,
            Self::NonZeroExit { rc, .. } => *rc,
            _ => SENTINEL_RC,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
