//! Contract resolution
//!
//! Consumes the declared [`ArgSpec`] and the raw invocation input,
//! producing either fully-resolved parameters or the first
//! [`Violation`]. Resolution never partially applies: on any violation
//! the caller sees untouched input and no side effects have occurred.
//!
//! Pass order: contract sanity, env fallbacks, alias back-fill, no-log
//! collection, legality, mutual exclusion, pre-defaults, required,
//! type coercion, choices, co-requirements, post-defaults.

use crate::coerce::{self, coerce_str};
use crate::error::{Result, Violation};
use crate::spec::ArgSpec;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Reserved control key: request check-mode (dry run).
pub const CHECK_MODE_KEY: &str = "_check_mode";

/// Reserved control key: suppress the invocation log line.
pub const NO_LOG_KEY: &str = "_no_log";

/// Fully-resolved invocation parameters.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Canonical name to coerced value; every declared parameter is
    /// present, absent ones as explicit `Null`.
    pub params: Map<String, Value>,
    /// Values that must never be logged or returned.
    pub no_log_values: Vec<String>,
    /// Alias to canonical name.
    pub aliases: BTreeMap<String, String>,
}

/// Resolve raw input against a contract.
///
/// `bypass_checks` skips the constraint passes (legality, groups,
/// required, choices, types) but still resolves aliases and defaults —
/// the escape hatch for modules that do their own validation.
pub fn resolve(spec: &ArgSpec, raw: &Map<String, Value>, bypass_checks: bool) -> Result<Resolved> {
    check_contract_sanity(spec)?;

    let mut params: Map<String, Value> = raw
        .iter()
        .filter(|(k, _)| k.as_str() != CHECK_MODE_KEY && k.as_str() != NO_LOG_KEY)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    apply_env_fallbacks(spec, &mut params);
    let aliases = resolve_aliases(spec, &mut params);
    let no_log_values = collect_no_log_values(spec, &params);

    if !bypass_checks {
        check_legal_inputs(spec, &params, &aliases)?;
        check_mutually_exclusive(spec, &params)?;
    }

    // Pre-defaults: only fields that are not required carry defaults
    for (name, param) in &spec.params {
        if let Some(default) = &param.default {
            if !params.contains_key(name) {
                params.insert(name.clone(), default.clone());
            }
        }
    }

    if !bypass_checks {
        check_required(spec, &params)?;
        coerce_types(spec, &mut params)?;
        check_choices(spec, &mut params)?;
        check_required_together(spec, &params)?;
        check_required_one_of(spec, &params)?;
        check_required_if(spec, &params)?;
    }

    // Post-defaults: anything still absent is explicitly Null
    for name in spec.params.keys() {
        if !params.contains_key(name) {
            params.insert(name.clone(), Value::Null);
        }
    }

    Ok(Resolved {
        params,
        no_log_values,
        aliases,
    })
}

fn check_contract_sanity(spec: &ArgSpec) -> Result<()> {
    for (name, param) in &spec.params {
        if param.default.is_some() && param.required {
            return Err(Violation::BadContract(format!(
                "required and default are mutually exclusive for {name}"
            )));
        }
    }
    Ok(())
}

fn apply_env_fallbacks(spec: &ArgSpec, params: &mut Map<String, Value>) {
    for (name, param) in &spec.params {
        if params.contains_key(name) {
            continue;
        }
        for var in &param.env_fallback {
            if let Ok(value) = std::env::var(var) {
                params.insert(name.clone(), Value::String(value));
                break;
            }
        }
    }
}

/// Copy alias values onto canonical names. Returns alias -> canonical.
fn resolve_aliases(spec: &ArgSpec, params: &mut Map<String, Value>) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    for (name, param) in &spec.params {
        for alias in &param.aliases {
            aliases.insert(alias.clone(), name.clone());
            if let Some(value) = params.get(alias).cloned() {
                params.insert(name.clone(), value);
            }
        }
    }
    aliases
}

fn collect_no_log_values(spec: &ArgSpec, params: &Map<String, Value>) -> Vec<String> {
    let mut values = Vec::new();
    for (name, param) in &spec.params {
        if !param.no_log {
            continue;
        }
        if let Some(value) = params.get(name) {
            values.extend(redact::collect_values(value));
        }
    }
    values.sort();
    values.dedup();
    values
}

fn check_legal_inputs(
    spec: &ArgSpec,
    params: &Map<String, Value>,
    aliases: &BTreeMap<String, String>,
) -> Result<()> {
    let mut unsupported: Vec<String> = params
        .keys()
        .filter(|k| !spec.params.contains_key(*k) && !aliases.contains_key(*k))
        .cloned()
        .collect();
    if unsupported.is_empty() {
        return Ok(());
    }
    unsupported.sort();
    Err(Violation::UnknownParameter {
        unsupported,
        supported: spec.params.keys().cloned().collect(),
    })
}

fn count_present(group: &[String], params: &Map<String, Value>) -> usize {
    group.iter().filter(|k| params.contains_key(*k)).count()
}

fn check_mutually_exclusive(spec: &ArgSpec, params: &Map<String, Value>) -> Result<()> {
    for group in &spec.mutually_exclusive {
        if count_present(group, params) > 1 {
            return Err(Violation::MutuallyExclusive(group.clone()));
        }
    }
    Ok(())
}

fn check_required(spec: &ArgSpec, params: &Map<String, Value>) -> Result<()> {
    let missing: Vec<String> = spec
        .params
        .iter()
        .filter(|(name, param)| param.required && !params.contains_key(*name))
        .map(|(name, _)| name.clone())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Violation::MissingRequired(missing))
    }
}

fn coerce_types(spec: &ArgSpec, params: &mut Map<String, Value>) -> Result<()> {
    for (name, param) in &spec.params {
        let Some(value) = params.get(name) else {
            continue;
        };
        if value.is_null() {
            // Explicit null unsets a parameter; leave it alone
            continue;
        }
        let coerced = coerce::coerce(param.ty, value).map_err(|reason| Violation::BadType {
            name: name.clone(),
            wanted: param.ty.name(),
            reason,
        })?;
        params.insert(name.clone(), coerced);
    }
    Ok(())
}

fn check_choices(spec: &ArgSpec, params: &mut Map<String, Value>) -> Result<()> {
    for (name, param) in &spec.params {
        if param.choices.is_empty() {
            continue;
        }
        let Some(value) = params.get(name).cloned() else {
            continue;
        };
        if value.is_null() || param.choices.contains(&value) {
            continue;
        }
        // Structured input sometimes turns unquoted yes/no into
        // "True"/"False"; map back when the intent is unambiguous
        if let Some(mapped) = lenient_boolean_choice(&value, &param.choices) {
            params.insert(name.clone(), mapped);
            continue;
        }
        let allowed: Vec<String> = param.choices.iter().map(coerce_str).collect();
        return Err(Violation::BadChoice {
            name: name.clone(),
            allowed: allowed.join(", "),
            got: coerce_str(&value),
        });
    }
    Ok(())
}

fn lenient_boolean_choice(value: &Value, choices: &[Value]) -> Option<Value> {
    const TRUTHY: &[&str] = &["y", "yes", "on", "1", "true"];
    const FALSY: &[&str] = &["n", "no", "off", "0", "false"];
    let vocabulary: &[&str] = match value.as_str() {
        Some("True") => TRUTHY,
        Some("False") => FALSY,
        _ => return None,
    };
    let overlap: Vec<&Value> = choices
        .iter()
        .filter(|c| c.as_str().is_some_and(|s| vocabulary.contains(&s)))
        .collect();
    match overlap.as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    }
}

fn check_required_together(spec: &ArgSpec, params: &Map<String, Value>) -> Result<()> {
    for group in &spec.required_together {
        let present = count_present(group, params);
        if present > 0 && present < group.len() {
            return Err(Violation::RequiredTogether(group.clone()));
        }
    }
    Ok(())
}

fn check_required_one_of(spec: &ArgSpec, params: &Map<String, Value>) -> Result<()> {
    for group in &spec.required_one_of {
        if count_present(group, params) == 0 {
            return Err(Violation::RequiredOneOf(group.clone()));
        }
    }
    Ok(())
}

fn check_required_if(spec: &ArgSpec, params: &Map<String, Value>) -> Result<()> {
    for rule in &spec.required_if {
        if params.get(&rule.key) != Some(&rule.value) {
            continue;
        }
        let missing: Vec<String> = rule
            .requirements
            .iter()
            .filter(|k| !params.contains_key(*k))
            .cloned()
            .collect();
        let violated = if rule.any {
            missing.len() == rule.requirements.len()
        } else {
            !missing.is_empty()
        };
        if violated {
            return Err(Violation::RequiredIf {
                key: rule.key.clone(),
                value: coerce_str(&rule.value),
                missing,
                any: rule.any,
            });
        }
    }
    Ok(())
}

/// Whether a raw input map requests check-mode.
pub fn wants_check_mode(raw: &Map<String, Value>) -> bool {
    raw.get(CHECK_MODE_KEY).is_some_and(truthy)
}

/// Whether a raw input map suppresses logging.
pub fn wants_no_log(raw: &Map<String, Value>) -> bool {
    raw.get(NO_LOG_KEY).is_some_and(truthy)
}

fn truthy(value: &Value) -> bool {
    matches!(
        coerce::coerce(crate::spec::ParamType::Bool, value),
        Ok(Value::Bool(true))
    )
}

/// Build a one-line `key=value` summary of resolved parameters with
/// secrets suppressed: no-log fields and password-looking names get
/// fixed placeholders, everything else passes through the heuristic
/// scrub.
pub fn redacted_summary(spec: &ArgSpec, resolved: &Resolved) -> String {
    let mut pieces = Vec::new();
    for (name, value) in &resolved.params {
        let canon = resolved.aliases.get(name).unwrap_or(name);
        let declared = spec.params.get(canon);
        let rendered = if declared.is_some_and(|p| p.no_log) {
            "NOT_LOGGING_PARAMETER".to_string()
        } else if redact::looks_like_password_name(name)
            && declared.is_none_or(|p| {
                p.ty != crate::spec::ParamType::Bool && p.choices.is_empty()
            })
        {
            // A password-ish name the contract forgot to mark no_log;
            // booleans and enums are about password *state*, not value
            "NOT_LOGGING_PASSWORD".to_string()
        } else {
            redact::sanitize_with(&coerce_str(value), &resolved.no_log_values)
        };
        pieces.push(format!("{name}={rendered}"));
    }
    if pieces.is_empty() {
        "Invoked".to_string()
    } else {
        format!("Invoked with {}", pieces.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ArgSpec, Param, ParamType};
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("raw input must be a mapping"),
        }
    }

    fn name_count_spec() -> ArgSpec {
        ArgSpec::new()
            .param("name", Param::str().required())
            .param("count", Param::new(ParamType::Int).default(1))
    }

    #[test]
    fn test_valid_input_resolves() {
        let resolved = resolve(&name_count_spec(), &raw(json!({"name": "foo"})), false).unwrap();
        assert_eq!(resolved.params["name"], json!("foo"));
        assert_eq!(resolved.params["count"], json!(1));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = resolve(&name_count_spec(), &raw(json!({"name": "x", "bogus": 1})), false)
            .unwrap_err();
        assert!(matches!(err, Violation::UnknownParameter { .. }));
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_control_keys_are_legal_and_stripped() {
        let input = raw(json!({"name": "x", "_check_mode": true, "_no_log": "yes"}));
        let resolved = resolve(&name_count_spec(), &input, false).unwrap();
        assert!(!resolved.params.contains_key("_check_mode"));
        assert!(wants_check_mode(&input));
        assert!(wants_no_log(&input));
    }

    #[test]
    fn test_missing_required_reported_together() {
        let spec = ArgSpec::new()
            .param("alpha", Param::str().required())
            .param("beta", Param::str().required());
        let err = resolve(&spec, &raw(json!({})), false).unwrap_err();
        assert_eq!(err.to_string(), "missing required arguments: alpha, beta");
    }

    #[test]
    fn test_alias_sets_canonical_identically() {
        let spec = ArgSpec::new().param("attributes", Param::str().alias("attr"));
        let resolved = resolve(&spec, &raw(json!({"attr": "ij"})), false).unwrap();
        assert_eq!(resolved.params["attributes"], json!("ij"));
        assert_eq!(resolved.params["attr"], json!("ij"));
    }

    #[test]
    fn test_required_with_default_is_authoring_error() {
        let spec = ArgSpec::new().param("bad", Param::str().required().default("x"));
        let err = resolve(&spec, &raw(json!({"bad": "y"})), false).unwrap_err();
        assert!(matches!(err, Violation::BadContract(_)));
    }

    #[test]
    fn test_mutually_exclusive_group() {
        let spec = ArgSpec::new()
            .param("src", Param::str())
            .param("content", Param::str())
            .mutually_exclusive(["src", "content"]);
        assert!(resolve(&spec, &raw(json!({"src": "a"})), false).is_ok());
        let err = resolve(&spec, &raw(json!({"src": "a", "content": "b"})), false).unwrap_err();
        assert!(matches!(err, Violation::MutuallyExclusive(_)));
    }

    #[test]
    fn test_required_together_strict_subset() {
        let spec = ArgSpec::new()
            .param("user", Param::str())
            .param("password", Param::str().no_log())
            .required_together(["user", "password"]);
        assert!(resolve(&spec, &raw(json!({})), false).is_ok());
        assert!(resolve(&spec, &raw(json!({"user": "a", "password": "b"})), false).is_ok());
        let err = resolve(&spec, &raw(json!({"user": "a"})), false).unwrap_err();
        assert!(matches!(err, Violation::RequiredTogether(_)));
    }

    #[test]
    fn test_required_one_of_empty() {
        let spec = ArgSpec::new()
            .param("path", Param::str())
            .param("content", Param::str())
            .required_one_of(["path", "content"]);
        let err = resolve(&spec, &raw(json!({})), false).unwrap_err();
        assert!(matches!(err, Violation::RequiredOneOf(_)));
    }

    #[test]
    fn test_required_if_triggers_on_value() {
        let spec = ArgSpec::new()
            .param("state", Param::str().choices(["present", "absent"]))
            .param("src", Param::str())
            .required_if("state", "present", ["src"]);
        assert!(resolve(&spec, &raw(json!({"state": "absent"})), false).is_ok());
        let err = resolve(&spec, &raw(json!({"state": "present"})), false).unwrap_err();
        assert!(matches!(err, Violation::RequiredIf { .. }));
    }

    #[test]
    fn test_choice_violation() {
        let spec = ArgSpec::new().param("state", Param::str().choices(["present", "absent"]));
        let err = resolve(&spec, &raw(json!({"state": "latest"})), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "value of state must be one of: present, absent, got: latest"
        );
    }

    #[test]
    fn test_choices_checked_after_coercion() {
        let spec = ArgSpec::new().param("level", Param::new(ParamType::Int).choices([1, 2, 3]));
        let resolved = resolve(&spec, &raw(json!({"level": "2"})), false).unwrap();
        assert_eq!(resolved.params["level"], json!(2));
    }

    #[test]
    fn test_lenient_boolean_choice_mapping() {
        let spec = ArgSpec::new().param("force", Param::str().choices(["yes", "no"]));
        let resolved = resolve(&spec, &raw(json!({"force": "True"})), false).unwrap();
        assert_eq!(resolved.params["force"], json!("yes"));
    }

    #[test]
    fn test_post_defaults_fill_null() {
        let spec = ArgSpec::new().param("opt", Param::str());
        let resolved = resolve(&spec, &raw(json!({})), false).unwrap();
        assert_eq!(resolved.params["opt"], Value::Null);
    }

    #[test]
    fn test_env_fallback_fills_absent_param() {
        // PATH is set in any sane environment
        let spec = ArgSpec::new().param("search_path", Param::str().fallback_env("PATH"));
        let resolved = resolve(&spec, &raw(json!({})), false).unwrap();
        assert_eq!(
            resolved.params["search_path"],
            json!(std::env::var("PATH").unwrap())
        );
    }

    #[test]
    fn test_no_log_values_collected() {
        let spec = ArgSpec::new().param("token", Param::str().no_log());
        let resolved = resolve(&spec, &raw(json!({"token": "hunter2"})), false).unwrap();
        assert_eq!(resolved.no_log_values, vec!["hunter2"]);
    }

    #[test]
    fn test_bypass_checks_still_resolves_defaults() {
        let resolved = resolve(&name_count_spec(), &raw(json!({"stray": 1})), true).unwrap();
        assert_eq!(resolved.params["count"], json!(1));
        assert!(resolved.params.contains_key("stray"));
    }

    #[test]
    fn test_summary_masks_secrets() {
        let spec = ArgSpec::new()
            .param("name", Param::str())
            .param("api_password", Param::str())
            .param("token", Param::str().no_log());
        let resolved = resolve(
            &spec,
            &raw(json!({"name": "n", "api_password": "s3cret", "token": "t0k"})),
            false,
        )
        .unwrap();
        let summary = redacted_summary(&spec, &resolved);
        assert!(summary.contains("api_password=NOT_LOGGING_PASSWORD"));
        assert!(summary.contains("token=NOT_LOGGING_PARAMETER"));
        assert!(!summary.contains("s3cret"));
        assert!(!summary.contains("t0k"));
    }
}
