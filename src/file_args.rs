//! The shared file-argument block
//!
//! Most modules that touch files accept the same knobs. Opting in via
//! [`crate::Behaviors::add_file_common_args`] merges this block into
//! the module's contract (module declarations win on collision), and
//! [`crate::Module::load_file_common_arguments`] turns the resolved
//! values into a [`fsops::FileAttrs`] descriptor.

use contract::{Param, ParamType};
use fsops::{FileAttrs, LabelSubsystem, ModeSpec, SeContext};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Sentinel choice asking for the path's computed default label field.
const DEFAULT_LABEL: &str = "_default";

/// Parameters merged into every file-touching module's contract.
pub fn common_file_params() -> Vec<(String, Param)> {
    let entries: Vec<(&str, Param)> = vec![
        ("src", Param::str()),
        ("mode", Param::new(ParamType::Raw)),
        ("owner", Param::str()),
        ("group", Param::str()),
        ("seuser", Param::str()),
        ("serole", Param::str()),
        ("selevel", Param::str()),
        ("setype", Param::str()),
        ("follow", Param::new(ParamType::Bool).default(false)),
        // not consumed here, but file-adjacent modules pass them around
        ("content", Param::str().no_log()),
        ("backup", Param::str()),
        ("force", Param::str()),
        ("remote_src", Param::str()),
        ("regexp", Param::str()),
        ("delimiter", Param::str()),
        ("directory_mode", Param::new(ParamType::Raw)),
        ("unsafe_writes", Param::new(ParamType::Bool)),
        ("attributes", Param::str().alias("attr")),
    ];
    entries
        .into_iter()
        .map(|(name, param)| (name.to_string(), param))
        .collect()
}

/// Build the attribute descriptor from resolved parameters. Returns
/// `None` when the module has no `path`/`dest` to act on.
pub fn load_file_common_arguments(
    selinux: &LabelSubsystem,
    params: &Map<String, Value>,
) -> Option<FileAttrs> {
    let path = params
        .get("path")
        .or_else(|| params.get("dest"))
        .and_then(Value::as_str)?;
    let path = expand(path);

    let follow = params
        .get("follow")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let path = if follow && path.is_symlink() {
        path.canonicalize().unwrap_or(path)
    } else {
        path
    };

    let mode = params.get("mode").and_then(|value| match value {
        Value::Number(n) => n.as_u64().map(|m| ModeSpec::Octal(m as u32)),
        Value::String(s) => Some(ModeSpec::parse(s)),
        _ => None,
    });

    let owner = params.get("owner").and_then(Value::as_str).map(String::from);
    let group = params.get("group").and_then(Value::as_str).map(String::from);

    let mut label_fields: Vec<Option<String>> = vec![
        params.get("seuser").and_then(Value::as_str).map(String::from),
        params.get("serole").and_then(Value::as_str).map(String::from),
        params.get("setype").and_then(Value::as_str).map(String::from),
    ];
    if selinux.mls_enabled() {
        label_fields.push(params.get("selevel").and_then(Value::as_str).map(String::from));
    }

    let secontext = if label_fields.iter().any(Option::is_some) {
        let defaults = selinux.default_context(&path);
        for (idx, field) in label_fields.iter_mut().enumerate() {
            if field.as_deref() == Some(DEFAULT_LABEL) {
                *field = defaults.0.get(idx).cloned().flatten();
            }
        }
        Some(SeContext(label_fields))
    } else {
        None
    };

    Some(FileAttrs {
        path,
        mode,
        owner,
        group,
        secontext,
        follow,
    })
}

fn expand(path: &str) -> PathBuf {
    shellexpand::full(path)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .unwrap_or_else(|_| PathBuf::from(shellexpand::tilde(path).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_no_path_no_descriptor() {
        let selinux = LabelSubsystem::disabled();
        assert!(load_file_common_arguments(&selinux, &params(json!({"name": "x"}))).is_none());
    }

    #[test]
    fn test_descriptor_from_params() {
        let selinux = LabelSubsystem::disabled();
        let attrs = load_file_common_arguments(
            &selinux,
            &params(json!({
                "path": "/etc/motd",
                "mode": "0644",
                "owner": "root",
                "group": "0",
            })),
        )
        .unwrap();
        assert_eq!(attrs.path, PathBuf::from("/etc/motd"));
        assert_eq!(attrs.mode, Some(ModeSpec::Octal(0o644)));
        assert_eq!(attrs.owner.as_deref(), Some("root"));
        assert_eq!(attrs.group.as_deref(), Some("0"));
        assert!(attrs.secontext.is_none());
        assert!(!attrs.follow);
    }

    #[test]
    fn test_numeric_mode_is_literal_bits() {
        let selinux = LabelSubsystem::disabled();
        let attrs = load_file_common_arguments(
            &selinux,
            &params(json!({"dest": "/tmp/f", "mode": 420})),
        )
        .unwrap();
        // 420 == 0o644
        assert_eq!(attrs.mode, Some(ModeSpec::Octal(0o644)));
    }

    #[test]
    fn test_symbolic_mode_passes_through() {
        let selinux = LabelSubsystem::disabled();
        let attrs = load_file_common_arguments(
            &selinux,
            &params(json!({"path": "/tmp/f", "mode": "u+rwx,g-w"})),
        )
        .unwrap();
        assert_eq!(attrs.mode, Some(ModeSpec::Symbolic("u+rwx,g-w".into())));
    }

    #[test]
    fn test_label_fields_collected() {
        let selinux = LabelSubsystem::disabled();
        let attrs = load_file_common_arguments(
            &selinux,
            &params(json!({"path": "/tmp/f", "setype": "etc_t"})),
        )
        .unwrap();
        let ctx = attrs.secontext.unwrap();
        assert_eq!(ctx.0[2].as_deref(), Some("etc_t"));
        assert!(ctx.0[0].is_none());
    }
}
