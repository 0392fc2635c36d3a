//! Execution request and result types

use std::collections::BTreeMap;
use std::path::PathBuf;

/// What to run: a ready argument vector or a command line string.
#[derive(Debug, Clone)]
pub enum CommandSpec {
    Argv(Vec<String>),
    Line(String),
}

/// One external command execution, builder-style.
///
/// The shell matrix follows the safe-by-default rule: an argument
/// vector runs without a shell unless `unsafe_shell` is requested (in
/// which case it is quoted and joined); a command line is tokenized
/// with shell-word rules unless `unsafe_shell` passes it verbatim to a
/// shell.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub(crate) command: CommandSpec,
    pub(crate) use_unsafe_shell: bool,
    pub(crate) data: Option<Vec<u8>>,
    pub(crate) binary_data: bool,
    pub(crate) check_rc: bool,
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) environ: BTreeMap<String, String>,
    pub(crate) path_prefix: Option<String>,
    pub(crate) prompt_regex: Option<String>,
    pub(crate) umask: Option<u32>,
}

impl ExecRequest {
    /// Run an argument vector (no shell unless [`Self::unsafe_shell`]).
    pub fn argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CommandSpec::Argv(argv.into_iter().map(Into::into).collect()))
    }

    /// Run a command line (tokenized unless [`Self::unsafe_shell`]).
    pub fn line(line: impl Into<String>) -> Self {
        Self::new(CommandSpec::Line(line.into()))
    }

    fn new(command: CommandSpec) -> Self {
        Self {
            command,
            use_unsafe_shell: false,
            data: None,
            binary_data: false,
            check_rc: false,
            cwd: None,
            environ: BTreeMap::new(),
            path_prefix: None,
            prompt_regex: None,
            umask: None,
        }
    }

    /// Interpret through a shell. The caller owns the quoting risk.
    pub fn unsafe_shell(mut self) -> Self {
        self.use_unsafe_shell = true;
        self
    }

    /// Feed the child this stdin payload, then close the stream. A
    /// trailing newline is appended unless [`Self::binary_data`].
    pub fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn binary_data(mut self) -> Self {
        self.binary_data = true;
        self
    }

    /// Fail the invocation when the child exits non-zero.
    pub fn check_rc(mut self) -> Self {
        self.check_rc = true;
        self
    }

    /// Working directory for the child; silently ignored when it is
    /// not a directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Environment override for the child only.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.environ.insert(key.to_string(), value.to_string());
        self
    }

    /// Extra directory prepended to the child's PATH.
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    /// Abort with the sentinel code when this pattern appears on
    /// stdout and no stdin payload was supplied - the command is
    /// waiting for input nobody will type.
    pub fn prompt_regex(mut self, pattern: impl Into<String>) -> Self {
        self.prompt_regex = Some(pattern.into());
        self
    }

    /// umask in effect while the child runs.
    pub fn umask(mut self, mask: u32) -> Self {
        self.umask = Some(mask);
        self
    }
}

/// Outcome of one execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
}
