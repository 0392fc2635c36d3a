//! Result envelope assembly
//!
//! Exactly one JSON document goes to stdout per invocation. The
//! envelope is an ordered mapping; `changed` is always present on
//! success, `failed` + `msg` on failure, and any `path`/`dest` field
//! gets the live filesystem facts appended.

use fsops::LabelSubsystem;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Augment a result with stats about the file a `path` or `dest`
/// field points at: ownership, mode, size, and what kind of thing it
/// is (`link`/`directory`/`hard`/`file`/`absent`).
pub fn add_path_info(selinux: &LabelSubsystem, fields: &mut Map<String, Value>) {
    let Some(path) = fields
        .get("path")
        .or_else(|| fields.get("dest"))
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        return;
    };
    let path = Path::new(&path);

    let Ok(meta) = fs::symlink_metadata(path) else {
        fields.insert("state".to_string(), Value::String("absent".to_string()));
        return;
    };

    use std::os::unix::fs::MetadataExt;
    use std::os::unix::fs::PermissionsExt;

    let uid = meta.uid();
    let gid = meta.gid();
    fields.insert("uid".to_string(), Value::from(uid));
    fields.insert("gid".to_string(), Value::from(gid));
    fields.insert("owner".to_string(), Value::String(fsops::user_name(uid)));
    fields.insert("group".to_string(), Value::String(fsops::group_name(gid)));
    fields.insert(
        "mode".to_string(),
        Value::String(format!("0{:03o}", meta.permissions().mode() & fsops::PERM_BITS)),
    );

    let state = if meta.file_type().is_symlink() {
        "link"
    } else if meta.is_dir() {
        "directory"
    } else if meta.nlink() > 1 {
        "hard"
    } else {
        "file"
    };
    fields.insert("state".to_string(), Value::String(state.to_string()));

    if selinux.enabled() {
        if let Ok(context) = selinux.context(path) {
            fields.insert("secontext".to_string(), Value::String(context.join()));
        }
    }
    fields.insert("size".to_string(), Value::from(meta.len()));
}

/// Serialize and print the envelope - the single stdout artifact of
/// the whole invocation.
pub fn emit(envelope: &Map<String, Value>) {
    let rendered = serde_json::to_string(&Value::Object(envelope.clone()))
        .unwrap_or_else(|_| r#"{"failed": true, "msg": "result was not serializable"}"#.to_string());
    println!("{rendered}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields_for(path: &Path) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "path".to_string(),
            Value::String(path.to_string_lossy().into_owned()),
        );
        add_path_info(&LabelSubsystem::disabled(), &mut fields);
        fields
    }

    #[test]
    fn test_absent_path() {
        let dir = TempDir::new().unwrap();
        let fields = fields_for(&dir.path().join("missing"));
        assert_eq!(fields["state"], json!("absent"));
        assert!(!fields.contains_key("size"));
    }

    #[test]
    fn test_regular_file_facts() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("present");
        fs::write(&file, b"12345").unwrap();

        let fields = fields_for(&file);
        assert_eq!(fields["state"], json!("file"));
        assert_eq!(fields["size"], json!(5));
        assert!(fields["mode"].as_str().unwrap().starts_with('0'));
        assert!(fields.contains_key("owner"));
        assert!(fields.contains_key("group"));
    }

    #[test]
    fn test_directory_and_link_states() {
        let dir = TempDir::new().unwrap();
        assert_eq!(fields_for(dir.path())["state"], json!("directory"));

        let target = dir.path().join("t");
        let link = dir.path().join("l");
        fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();
        assert_eq!(fields_for(&link)["state"], json!("link"));
    }

    #[test]
    fn test_dest_is_honored_too() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("d");
        fs::write(&file, b"x").unwrap();
        let mut fields = Map::new();
        fields.insert(
            "dest".to_string(),
            Value::String(file.to_string_lossy().into_owned()),
        );
        add_path_info(&LabelSubsystem::disabled(), &mut fields);
        assert_eq!(fields["state"], json!("file"));
    }
}
