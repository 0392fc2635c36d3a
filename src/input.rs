//! Raw invocation input loading and merging
//!
//! A module receives two blobs: a whitespace-tokenized `key=value`
//! string and a structured JSON document. They merge into one raw
//! parameter map with the flat form winning on key collision; a
//! duplicated flat key is a parse error, not a silent overwrite.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};
use std::io::Read;

/// Wrapper key an embedding harness may use around the parameters.
const MODULE_ARGS_KEY: &str = "module_args";

/// Parse the flat `key=value` token blob.
pub fn parse_flat_args(blob: &str) -> Result<Map<String, Value>> {
    let words = procrun::shell_split(blob)
        .map_err(|reason| anyhow!("error parsing argument string: {reason}"))?;
    let mut map = Map::new();
    for word in words {
        let (key, value) = word
            .split_once('=')
            .ok_or_else(|| anyhow!("argument is missing a '=': {word}"))?;
        if map.contains_key(key) {
            bail!("duplicate parameter: {key}");
        }
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(map)
}

/// Parse the structured document blob (empty means no parameters).
pub fn parse_document(doc: &str) -> Result<Map<String, Value>> {
    let doc = doc.trim();
    if doc.is_empty() {
        return Ok(Map::new());
    }
    let value: Value =
        serde_json::from_str(doc).context("unable to decode parameter document as JSON")?;
    into_params(value)
}

fn into_params(value: Value) -> Result<Map<String, Value>> {
    let Value::Object(mut map) = value else {
        bail!("parameter document must be a mapping");
    };
    // accept either bare parameters or the harness wrapper form
    if let Some(inner) = map.remove(MODULE_ARGS_KEY) {
        return into_params(inner);
    }
    Ok(map)
}

/// Merge the two input blobs; flat wins on collision.
pub fn merge_inputs(doc: &str, flat: &str) -> Result<Map<String, Value>> {
    let mut params = parse_document(doc)?;
    for (key, value) in parse_flat_args(flat)? {
        params.insert(key, value);
    }
    Ok(params)
}

/// Load parameters the way a standalone module binary receives them:
/// a JSON document as argv[1] (inline or a file path), else stdin.
pub fn load_from_process() -> Result<Map<String, Value>> {
    let mut args = std::env::args().skip(1);
    let buffer = match args.next() {
        Some(arg) => {
            if std::path::Path::new(&arg).is_file() {
                std::fs::read_to_string(&arg)
                    .with_context(|| format!("unable to read parameter file {arg}"))?
            } else {
                arg
            }
        }
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("unable to read parameters from stdin")?;
            buffer
        }
    };
    parse_document(&buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_parsing() {
        let map = parse_flat_args("name=foo count=3 msg='hello world'").unwrap();
        assert_eq!(map["name"], json!("foo"));
        assert_eq!(map["count"], json!("3"));
        assert_eq!(map["msg"], json!("hello world"));
    }

    #[test]
    fn test_duplicate_flat_key_is_fatal() {
        assert!(parse_flat_args("a=1 a=2").is_err());
    }

    #[test]
    fn test_token_without_equals_is_fatal() {
        assert!(parse_flat_args("a=1 stray").is_err());
    }

    #[test]
    fn test_flat_wins_over_document() {
        let merged = merge_inputs(r#"{"name": "doc", "count": 5}"#, "name=flat").unwrap();
        assert_eq!(merged["name"], json!("flat"));
        assert_eq!(merged["count"], json!(5));
    }

    #[test]
    fn test_wrapper_key_unwraps() {
        let params = parse_document(r#"{"module_args": {"name": "x"}}"#).unwrap();
        assert_eq!(params["name"], json!("x"));
    }

    #[test]
    fn test_non_mapping_document_rejected() {
        assert!(parse_document("[1, 2]").is_err());
        assert!(parse_document("plainly not json").is_err());
    }
}
