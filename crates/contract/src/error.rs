//! Contract violations and authoring errors.
//!
//! Every way user input can fail the declared contract gets its own
//! variant so callers can fail fast with a precise message. A
//! [`Violation`] is always fatal and always raised before any side
//! effect.

use thiserror::Error;

/// An invocation input failed to satisfy the declared contract.
#[derive(Debug, Error)]
pub enum Violation {
    /// Input keys that no parameter (or alias) declares
    #[error(
        "unsupported parameters: {}. Supported parameters include: {}",
        .unsupported.join(", "),
        .supported.join(", ")
    )]
    UnknownParameter {
        /// Offending input keys, sorted
        unsupported: Vec<String>,
        /// Declared parameter names, sorted
        supported: Vec<String>,
    },

    /// Required parameters absent after alias resolution, reported together
    #[error("missing required arguments: {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    /// More than one member of an exclusive group was supplied
    #[error("parameters are mutually exclusive: {}", .0.join(", "))]
    MutuallyExclusive(Vec<String>),

    /// Some but not all members of a co-required group were supplied
    #[error("parameters are required together: {}", .0.join(", "))]
    RequiredTogether(Vec<String>),

    /// No member of a one-of group was supplied
    #[error("one of the following is required: {}", .0.join(", "))]
    RequiredOneOf(Vec<String>),

    /// A conditional requirement triggered and its parameters are absent
    #[error(
        "{key} is {value} but {} of the following are missing: {}",
        if *.any { "any" } else { "all" },
        .missing.join(", ")
    )]
    RequiredIf {
        key: String,
        value: String,
        missing: Vec<String>,
        any: bool,
    },

    /// Value outside the declared enumeration
    #[error("value of {name} must be one of: {allowed}, got: {got}")]
    BadChoice {
        name: String,
        allowed: String,
        got: String,
    },

    /// Value could not be coerced to the declared type
    #[error("argument {name} could not be converted to {wanted}: {reason}")]
    BadType {
        name: String,
        wanted: &'static str,
        reason: String,
    },

    /// The contract itself is malformed (authoring error, not user error)
    #[error("internal error: {0}")]
    BadContract(String),
}

/// Result type for contract resolution.
pub type Result<T> = std::result::Result<T, Violation>;
