//! Contract declaration types
//!
//! A module declares one [`ArgSpec`] per invocation: a map of parameter
//! name to [`Param`] plus contract-level constraint groups. Construction
//! is builder-style so module code reads like a table.

use serde_json::Value;
use std::collections::BTreeMap;

/// Declared type of a parameter, driving coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Any scalar, stringified
    Str,
    /// Sequence; comma-split or wrapped from a scalar
    List,
    /// Mapping; parsed from JSON, literal syntax, or `k=v` pairs
    Dict,
    /// Fixed truthy/falsy vocabulary
    Bool,
    Int,
    Float,
    /// String with `~` and `$VAR` expansion applied
    Path,
    /// Passed through untouched
    Raw,
    /// JSON document string; structured input is re-serialized
    Json,
    /// Human-readable byte size ("512K", "1.5G")
    Bytes,
    /// Human-readable bit size
    Bits,
}

impl ParamType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Path => "path",
            Self::Raw => "raw",
            Self::Json => "json",
            Self::Bytes => "bytes",
            Self::Bits => "bits",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub ty: ParamType,
    pub default: Option<Value>,
    pub required: bool,
    pub choices: Vec<Value>,
    pub aliases: Vec<String>,
    /// Value must never appear in logs or output, including on failure
    pub no_log: bool,
    /// Environment variables consulted, in order, when the parameter
    /// is absent from input
    pub env_fallback: Vec<String>,
}

impl Param {
    pub fn new(ty: ParamType) -> Self {
        Self {
            ty,
            default: None,
            required: false,
            choices: Vec::new(),
            aliases: Vec::new(),
            no_log: false,
            env_fallback: Vec::new(),
        }
    }

    /// Shorthand for the most common declaration.
    pub fn str() -> Self {
        Self::new(ParamType::Str)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn no_log(mut self) -> Self {
        self.no_log = true;
        self
    }

    pub fn fallback_env(mut self, var: &str) -> Self {
        self.env_fallback.push(var.to_string());
        self
    }
}

/// Conditional requirement: when `key` resolves to `value`, the listed
/// parameters must be present (all of them, or any one when `any`).
#[derive(Debug, Clone)]
pub struct RequiredIf {
    pub key: String,
    pub value: Value,
    pub requirements: Vec<String>,
    pub any: bool,
}

/// The full declarative contract for one invocation.
#[derive(Debug, Clone, Default)]
pub struct ArgSpec {
    pub params: BTreeMap<String, Param>,
    pub mutually_exclusive: Vec<Vec<String>>,
    pub required_together: Vec<Vec<String>>,
    pub required_one_of: Vec<Vec<String>>,
    pub required_if: Vec<RequiredIf>,
}

impl ArgSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: &str, param: Param) -> Self {
        self.params.insert(name.to_string(), param);
        self
    }

    pub fn mutually_exclusive<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutually_exclusive
            .push(group.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_together<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_together
            .push(group.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_one_of<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_one_of
            .push(group.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_if<I, S>(mut self, key: &str, value: impl Into<Value>, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_if.push(RequiredIf {
            key: key.to_string(),
            value: value.into(),
            requirements: requirements.into_iter().map(Into::into).collect(),
            any: false,
        });
        self
    }

    pub fn required_if_any<I, S>(
        mut self,
        key: &str,
        value: impl Into<Value>,
        requirements: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_if.push(RequiredIf {
            key: key.to_string(),
            value: value.into(),
            requirements: requirements.into_iter().map(Into::into).collect(),
            any: true,
        });
        self
    }

    /// Merge another parameter table in, keeping existing declarations
    /// on name collision. Used for the shared file-argument block.
    pub fn merge_params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (String, Param)>,
    {
        for (name, param) in params {
            self.params.entry(name).or_insert(param);
        }
        self
    }
}
