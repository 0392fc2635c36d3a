//! Declarative argument contracts
//!
//! A module declares what it accepts - names, types, defaults,
//! aliases, constraint groups - and this crate turns raw invocation
//! input into fully-resolved parameters or a precise [`Violation`].
//! Resolution is all-or-nothing: nothing downstream runs until the
//! whole contract is satisfied.
//!
//! ```
//! use contract::{ArgSpec, Param, ParamType, resolve};
//! use serde_json::json;
//!
//! let spec = ArgSpec::new()
//!     .param("name", Param::str().required())
//!     .param("count", Param::new(ParamType::Int).default(1));
//!
//! let raw = json!({"name": "foo"});
//! let resolved = resolve(&spec, raw.as_object().unwrap(), false).unwrap();
//! assert_eq!(resolved.params["count"], json!(1));
//! ```

mod coerce;
mod error;
mod literal;
mod size;
mod spec;
mod validate;

pub use coerce::{coerce, coerce_str};
pub use error::{Result, Violation};
pub use size::{bytes_to_human, human_to_bytes};
pub use spec::{ArgSpec, Param, ParamType, RequiredIf};
pub use validate::{
    CHECK_MODE_KEY, NO_LOG_KEY, Resolved, redacted_summary, resolve, wants_check_mode,
    wants_no_log,
};
