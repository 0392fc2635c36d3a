//! External process execution for configuration modules
//!
//! Commands run without a shell by default, with both output pipes
//! polled from a single thread so nothing deadlocks, interactive
//! prompts detected instead of hanging forever, and every echoed
//! command line scrubbed of anything password-shaped.
//!
//! ```no_run
//! use procrun::{ExecRequest, Runner};
//!
//! let runner = Runner::new();
//! let result = runner
//!     .run(&ExecRequest::argv(["systemctl", "is-active", "sshd"]))
//!     .unwrap();
//! println!("rc={} out={}", result.rc, result.stdout.trim());
//! ```

mod bin_path;
mod error;
mod request;
mod run;
mod words;

pub use bin_path::get_bin_path;
pub use error::{Error, Result, SENTINEL_RC};
pub use request::{CommandSpec, ExecRequest, ExecResult};
pub use run::Runner;
pub use words::{join as shell_join, quote as shell_quote, split as shell_split};
