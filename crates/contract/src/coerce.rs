//! Deterministic type coercion
//!
//! One pure function per declared type. Each returns either the coerced
//! value or a reason string; nothing here panics, touches the
//! filesystem, or inspects global state. The validator maps a failure
//! onto a [`crate::Violation::BadType`].

use crate::literal;
use crate::size::human_to_bytes;
use crate::spec::ParamType;
use serde_json::{Map, Number, Value};

/// Coerce `value` to the declared type.
pub fn coerce(ty: ParamType, value: &Value) -> Result<Value, String> {
    match ty {
        ParamType::Str => Ok(Value::String(coerce_str(value))),
        ParamType::List => coerce_list(value),
        ParamType::Dict => coerce_dict(value),
        ParamType::Bool => coerce_bool(value),
        ParamType::Int => coerce_int(value),
        ParamType::Float => coerce_float(value),
        ParamType::Path => Ok(Value::String(expand_path(&coerce_str(value)))),
        ParamType::Raw => Ok(value.clone()),
        ParamType::Json => coerce_json(value),
        ParamType::Bytes => coerce_size(value, false),
        ParamType::Bits => coerce_size(value, true),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Stringify anything non-string.
pub fn coerce_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn coerce_list(value: &Value) -> Result<Value, String> {
    match value {
        Value::Array(_) => Ok(value.clone()),
        Value::String(s) => Ok(Value::Array(
            s.split(',').map(|p| Value::String(p.to_string())).collect(),
        )),
        Value::Number(n) => Ok(Value::Array(vec![Value::String(n.to_string())])),
        other => Err(format!("{} cannot be converted to a list", kind(other))),
    }
}

fn coerce_dict(value: &Value) -> Result<Value, String> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        Value::String(s) => {
            if s.starts_with('{') {
                if let Ok(parsed @ Value::Object(_)) = serde_json::from_str::<Value>(s) {
                    return Ok(parsed);
                }
                match literal::parse(s) {
                    Ok(parsed @ Value::Object(_)) => Ok(parsed),
                    _ => Err("unable to evaluate string as dictionary".to_string()),
                }
            } else if s.contains('=') {
                split_key_value_pairs(s)
            } else {
                Err("dictionary requested, could not parse JSON or key=value".to_string())
            }
        }
        other => Err(format!("{} cannot be converted to a dict", kind(other))),
    }
}

/// Split `k1=v1, k2=v2` with quote and backslash awareness; separators
/// are commas and spaces outside quotes.
fn split_key_value_pairs(input: &str) -> Result<Value, String> {
    let mut fields: Vec<String> = Vec::new();
    let mut buffer = String::new();
    let mut in_quote: Option<char> = None;
    let mut in_escape = false;

    for c in input.trim().chars() {
        if in_escape {
            buffer.push(c);
            in_escape = false;
        } else if c == '\\' {
            in_escape = true;
        } else if in_quote.is_none() && (c == '\'' || c == '"') {
            in_quote = Some(c);
        } else if in_quote == Some(c) {
            in_quote = None;
        } else if in_quote.is_none() && (c == ',' || c == ' ') {
            if !buffer.is_empty() {
                fields.push(std::mem::take(&mut buffer));
            }
        } else {
            buffer.push(c);
        }
    }
    if !buffer.is_empty() {
        fields.push(buffer);
    }

    let mut map = Map::new();
    for field in fields {
        let (k, v) = field
            .split_once('=')
            .ok_or_else(|| format!("missing '=' in key=value field: {field}"))?;
        map.insert(k.to_string(), Value::String(v.to_string()));
    }
    Ok(Value::Object(map))
}

fn coerce_bool(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) => match s.to_lowercase().as_str() {
            "y" | "yes" | "on" | "1" | "true" | "t" => Ok(Value::Bool(true)),
            "n" | "no" | "off" | "0" | "false" | "f" => Ok(Value::Bool(false)),
            _ => Err(format!("'{s}' is not a valid boolean")),
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Ok(Value::Bool(true)),
            Some(0) => Ok(Value::Bool(false)),
            _ => Err(format!("{n} is not a valid boolean")),
        },
        other => Err(format!("{} cannot be converted to a bool", kind(other))),
    }
}

fn coerce_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|i| Value::Number(i.into()))
            .map_err(|_| format!("'{s}' cannot be converted to an int")),
        other => Err(format!("{} cannot be converted to an int", kind(other))),
    }
}

fn coerce_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) => {
            let f = n.as_f64().ok_or_else(|| format!("{n} is out of range"))?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| format!("{n} is not a finite float"))
        }
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("'{s}' cannot be converted to a float")),
        other => Err(format!("{} cannot be converted to a float", kind(other))),
    }
}

/// Expand `~` and environment variables; an undefined variable leaves
/// the tilde-expanded text untouched rather than failing coercion.
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| shellexpand::tilde(path).into_owned())
}

fn coerce_json(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(s) => Ok(Value::String(s.trim().to_string())),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value)
            .map(Value::String)
            .map_err(|e| e.to_string()),
        other => Err(format!(
            "{} cannot be converted to a json string",
            kind(other)
        )),
    }
}

fn coerce_size(value: &Value, isbits: bool) -> Result<Value, String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            let unit = if isbits { "Bit" } else { "Byte" };
            return Err(format!("{} cannot be converted to a {unit} value", kind(other)));
        }
    };
    human_to_bytes(&text, None, isbits).map(|n| Value::Number(n.into()))
}
