//! modkit - shared runtime for single-shot configuration modules
//!
//! A module is a short-lived process: it receives parameters, performs
//! one idempotent action, reports one structured result, and exits.
//! This crate is everything those modules share:
//!
//! - a declarative argument contract with aliases, constraint groups
//!   and deterministic coercion ([`contract`])
//! - idempotent filesystem attribute convergence and atomic content
//!   replacement ([`fsops`])
//! - external command execution with multiplexed capture, prompt
//!   detection and secret-safe echoing ([`procrun`])
//! - the orchestration shell around all of it: locale and working
//!   directory normalization, input merging, redacted invocation
//!   logging, cleanup registration, and the success/failure result
//!   envelope ([`Module`])
//!
//! ```no_run
//! use modkit::{ArgSpec, Behaviors, Module, Param, ParamType};
//! use serde_json::json;
//!
//! let spec = ArgSpec::new()
//!     .param("name", Param::str().required())
//!     .param("count", Param::new(ParamType::Int).default(1));
//!
//! let module = Module::new("example", spec, Behaviors::new().supports_check_mode());
//! let name = module.params["name"].as_str().unwrap_or_default().to_string();
//! // ... perform the idempotent action ...
//! module.exit_json(json!({ "changed": false, "name": name }));
//! ```

mod envelope;
mod file_args;
mod input;
mod locale;
mod module;

pub use contract::{ArgSpec, Param, ParamType, Violation};
pub use envelope::add_path_info;
pub use file_args::{common_file_params, load_file_common_arguments};
pub use fsops::{FileAttrs, LabelSubsystem, ModeSpec, Reconciler, SeContext};
pub use input::{load_from_process, merge_inputs, parse_flat_args};
pub use locale::{check_locale, normalize_cwd};
pub use module::{Behaviors, InitError, Module};
pub use procrun::{ExecRequest, ExecResult, Runner, SENTINEL_RC};

/// Wire the log facade to stderr the way host binaries expect:
/// quiet by default, `-v`/`-vv`/`-vvv` raising the filter.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .try_init();
}
