//! The invocation orchestrator
//!
//! One [`Module`] value is the whole lifetime of an invocation: it
//! normalizes the environment, resolves the argument contract, hands
//! the module its parameters, and owns the two terminal operations.
//! Every code path must end in exactly one of [`Module::exit_json`] or
//! [`Module::fail_json`]; both run registered cleanups, emit the
//! envelope, and terminate the process.

use crate::{envelope, file_args, input, locale};
use contract::{ArgSpec, Violation};
use fsops::{FileAttrs, LabelSubsystem, Reconciler};
use procrun::{ExecRequest, ExecResult, Runner};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

/// Filesystem types whose security labels are owned by the mount.
const DEFAULT_SPECIAL_FS: &[&str] = &["fuse", "nfs", "vboxsf", "ramfs"];

/// Behavior flags a module supplies alongside its contract.
#[derive(Debug, Clone, Default)]
pub struct Behaviors {
    /// The module knows how to simulate its action; without this,
    /// check-mode invocations skip the module entirely
    pub supports_check_mode: bool,
    /// Skip constraint validation (the module validates on its own)
    pub bypass_checks: bool,
    /// Suppress the invocation log line unconditionally
    pub no_log: bool,
    /// Merge the shared file-argument block into the contract
    pub add_file_common_args: bool,
    /// Override the special-filesystem list for label handling
    pub selinux_special_fs: Option<Vec<String>>,
}

impl Behaviors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn supports_check_mode(mut self) -> Self {
        self.supports_check_mode = true;
        self
    }

    pub fn bypass_checks(mut self) -> Self {
        self.bypass_checks = true;
        self
    }

    pub fn no_log(mut self) -> Self {
        self.no_log = true;
        self
    }

    pub fn add_file_common_args(mut self) -> Self {
        self.add_file_common_args = true;
        self
    }
}

/// Why a module could not be constructed.
#[derive(Debug)]
pub enum InitError {
    /// Input failed the declared contract
    Violation(Violation),
    /// Check mode was requested but the module cannot simulate;
    /// terminal outcome is a skipped success, not a failure
    CheckModeUnsupported { name: String },
}

/// An in-flight invocation.
#[derive(Debug)]
pub struct Module {
    name: String,
    pub params: Map<String, Value>,
    pub check_mode: bool,
    pub selinux: LabelSubsystem,
    /// Executor for external commands; echoes are scrubbed with the
    /// no-log registry collected during validation
    pub runner: Runner,
    no_log: bool,
    no_log_values: Vec<String>,
    cleanup_files: Vec<PathBuf>,
    warnings: Vec<String>,
    deprecations: Vec<Value>,
}

impl Module {
    /// Build a module from the process's own input (argv or stdin),
    /// terminating with a failure envelope when anything is wrong.
    /// This is the entry point for real module binaries.
    pub fn new(name: &str, spec: ArgSpec, behaviors: Behaviors) -> Self {
        let raw = match input::load_from_process() {
            Ok(raw) => raw,
            Err(e) => bare_failure(&e.to_string()),
        };
        Self::from_raw(name, spec, behaviors, raw)
    }

    /// Build from the two build-time-substituted blobs: a structured
    /// document and a flat `key=value` token string (flat wins).
    pub fn from_blobs(
        name: &str,
        spec: ArgSpec,
        behaviors: Behaviors,
        document: &str,
        flat: &str,
    ) -> Self {
        let raw = match input::merge_inputs(document, flat) {
            Ok(raw) => raw,
            Err(e) => bare_failure(&e.to_string()),
        };
        Self::from_raw(name, spec, behaviors, raw)
    }

    /// Build from an already-parsed raw parameter map, terminating the
    /// process on contract violations.
    pub fn from_raw(name: &str, spec: ArgSpec, behaviors: Behaviors, raw: Map<String, Value>) -> Self {
        match Self::try_new(name, spec, behaviors, raw) {
            Ok(module) => module,
            Err(InitError::CheckModeUnsupported { name }) => {
                let mut fields = Map::new();
                fields.insert("changed".to_string(), Value::Bool(false));
                fields.insert("skipped".to_string(), Value::Bool(true));
                fields.insert(
                    "msg".to_string(),
                    Value::String(format!("module ({name}) does not support check mode")),
                );
                envelope::emit(&fields);
                std::process::exit(0);
            }
            Err(InitError::Violation(violation)) => {
                bare_failure(&redact::heuristic_sanitize(&violation.to_string()))
            }
        }
    }

    /// Fallible constructor for embedding and tests: no process exit,
    /// no envelope.
    pub fn try_new(
        name: &str,
        spec: ArgSpec,
        behaviors: Behaviors,
        raw: Map<String, Value>,
    ) -> Result<Self, InitError> {
        locale::check_locale();

        let check_mode = contract::wants_check_mode(&raw);
        let no_log = behaviors.no_log || contract::wants_no_log(&raw);

        let spec = if behaviors.add_file_common_args {
            spec.merge_params(file_args::common_file_params())
        } else {
            spec
        };

        let resolved =
            contract::resolve(&spec, &raw, behaviors.bypass_checks).map_err(InitError::Violation)?;

        if check_mode && !behaviors.supports_check_mode {
            return Err(InitError::CheckModeUnsupported {
                name: name.to_string(),
            });
        }

        // One redacted line to the log sink, best-effort
        if !no_log {
            log::info!("{} | {}", name, contract::redacted_summary(&spec, &resolved));
        }

        locale::normalize_cwd();

        let special_fs = behaviors
            .selinux_special_fs
            .unwrap_or_else(|| DEFAULT_SPECIAL_FS.iter().map(ToString::to_string).collect());
        let selinux = LabelSubsystem::detect(special_fs);

        let mut runner = Runner::new();
        runner.no_log_values = resolved.no_log_values.clone();

        Ok(Self {
            name: name.to_string(),
            params: resolved.params,
            check_mode,
            selinux,
            runner,
            no_log,
            no_log_values: resolved.no_log_values,
            cleanup_files: Vec::new(),
            warnings: Vec::new(),
            deprecations: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a warning; it rides the result envelope.
    pub fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.no_log {
            log::warn!("{} | {warning}", self.name);
        }
        self.warnings.push(warning);
    }

    /// Record a deprecation notice for the envelope.
    pub fn deprecate(&mut self, msg: impl Into<String>, version: Option<&str>) {
        self.deprecations.push(json!({
            "msg": msg.into(),
            "version": version,
        }));
    }

    /// Register a scratch file for deletion at exit, success or
    /// failure alike.
    pub fn add_cleanup_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.cleanup_files.contains(&path) {
            self.cleanup_files.push(path);
        }
    }

    /// Delete registered scratch files, best-effort and in order.
    pub fn do_cleanup_files(&mut self) {
        for path in std::mem::take(&mut self.cleanup_files) {
            fsops::cleanup_path(&path);
        }
    }

    /// Execute an external command through the invocation's runner.
    pub fn run_command(&self, request: &ExecRequest) -> procrun::Result<ExecResult> {
        self.runner.run(request)
    }

    /// Locate an executable; see [`procrun::get_bin_path`].
    pub fn get_bin_path(&self, name: &str, opt_dirs: &[&Path]) -> Option<PathBuf> {
        procrun::get_bin_path(name, opt_dirs)
    }

    /// Interpret a parameter value with the boolean vocabulary.
    pub fn boolean(&self, value: &Value) -> Option<bool> {
        match contract::coerce(contract::ParamType::Bool, value) {
            Ok(Value::Bool(b)) => Some(b),
            _ => None,
        }
    }

    /// Attribute reconciler bound to this invocation's label subsystem
    /// and check-mode flag.
    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.selinux, self.check_mode)
    }

    /// Converge a descriptor's attributes; the usual tail call of
    /// file-touching modules before reporting `changed`.
    pub fn set_fs_attributes_if_different(
        &self,
        attrs: &FileAttrs,
        changed: bool,
    ) -> fsops::Result<bool> {
        self.reconciler().set_fs_attributes_if_different(attrs, changed)
    }

    /// Atomically install `src` as `dest`; see [`fsops::atomic_replace`].
    pub fn atomic_move(&self, src: &Path, dest: &Path, unsafe_writes: bool) -> fsops::Result<()> {
        fsops::atomic_replace(&self.selinux, src, dest, unsafe_writes)
    }

    /// Date-marked backup of `path`; see [`fsops::backup_local`].
    pub fn backup_local(&self, path: &Path) -> fsops::Result<Option<PathBuf>> {
        fsops::backup_local(&self.selinux, path)
    }

    /// Descriptor built from the shared file-argument block, when the
    /// invocation names a `path`/`dest`.
    pub fn load_file_common_arguments(&self) -> Option<FileAttrs> {
        file_args::load_file_common_arguments(&self.selinux, &self.params)
    }

    /// Late required-parameter check for conditions the contract
    /// cannot express; fails the invocation if anything is missing.
    pub fn fail_on_missing_params(self, required: &[&str]) -> Self {
        let missing: Vec<&str> = required
            .iter()
            .filter(|name| {
                self.params
                    .get(**name)
                    .map_or(true, Value::is_null)
            })
            .copied()
            .collect();
        if missing.is_empty() {
            self
        } else {
            self.fail_json(json!({
                "msg": format!("missing required arguments: {}", missing.join(", "))
            }))
        }
    }

    /// Terminal success. Defaults `changed` to false, augments path
    /// facts, cleans up, emits the envelope, exits 0.
    pub fn exit_json(self, fields: Value) -> ! {
        self.terminate(fields, false)
    }

    /// Terminal failure. `msg` is mandatory - its absence is a
    /// programming error, not a user error. Exits 1.
    pub fn fail_json(self, fields: Value) -> ! {
        self.terminate(fields, true)
    }

    /// Terminal failure from any error value.
    pub fn fail_from(self, error: impl std::fmt::Display) -> ! {
        let msg = redact::sanitize_with(&error.to_string(), &self.no_log_values);
        self.fail_json(json!({ "msg": msg }))
    }

    /// Terminal failure from an executor error, surfacing the return
    /// code (the 257 sentinel for spawn failures and prompt timeouts).
    pub fn fail_exec(self, error: procrun::Error) -> ! {
        let rc = error.rc();
        let msg = redact::sanitize_with(&error.to_string(), &self.no_log_values);
        self.fail_json(json!({ "msg": msg, "rc": rc }))
    }

    /// Assemble the final envelope without emitting it. Exposed so the
    /// envelope shape is testable; module code wants
    /// [`Self::exit_json`] / [`Self::fail_json`] instead.
    pub fn render_result(&mut self, fields: Value, failure: bool) -> Map<String, Value> {
        let mut fields = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => panic!("result fields must be a mapping"),
        };

        if failure {
            assert!(
                fields.contains_key("msg"),
                "implementation error -- msg to explain the error is required"
            );
            fields.insert("failed".to_string(), Value::Bool(true));
        } else if !fields.contains_key("changed") {
            fields.insert("changed".to_string(), Value::Bool(false));
        }

        envelope::add_path_info(&self.selinux, &mut fields);

        if !fields.contains_key("invocation") {
            fields.insert(
                "invocation".to_string(),
                json!({ "module_args": self.params }),
            );
        }

        if !self.warnings.is_empty() {
            let entry = fields
                .entry("warnings")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = entry {
                list.extend(self.warnings.drain(..).map(Value::String));
            }
        }
        if !self.deprecations.is_empty() {
            let entry = fields
                .entry("deprecations")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = entry {
                list.append(&mut self.deprecations);
            }
        }

        match redact::remove_values(&Value::Object(fields), &self.no_log_values) {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn terminate(mut self, fields: Value, failure: bool) -> ! {
        let envelope_map = self.render_result(fields, failure);
        self.do_cleanup_files();
        envelope::emit(&envelope_map);
        std::process::exit(i32::from(failure));
    }
}

/// Failure emitted before a module exists (unparsable input, contract
/// violations). Mirrors the envelope shape without any augmentation.
fn bare_failure(msg: &str) -> ! {
    let mut fields = Map::new();
    fields.insert("failed".to_string(), Value::Bool(true));
    fields.insert("msg".to_string(), Value::String(msg.to_string()));
    envelope::emit(&fields);
    std::process::exit(1);
}
