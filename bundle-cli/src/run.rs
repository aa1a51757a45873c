use std::fs;
use std::path::Path;

use bundle_engine::persistence::{self, PersistedRoot};
use bundle_engine::{Bundle, Diagnostics, ExecutionContext, RootInstance, TextEncoding, TextSink};

use crate::error::CliError;

/// Loads and validates the named schema, then loads, parses, and validates
/// the instance file against it. Returns the validated instance on success;
/// diagnostics accumulated along the way are always reported through
/// `diag`, even on failure.
pub fn load_and_validate_instance(
    bundle: &mut Bundle,
    schema_name: &str,
    instance_path: &Path,
    diag: &mut Diagnostics,
) -> Result<RootInstance, CliError> {
    let schema = bundle.schema_mut(schema_name).ok_or_else(|| CliError::UnknownSchema(schema_name.to_string()))?;
    if !schema.validate(diag) {
        return Err(CliError::ValidationFailed);
    }

    let instance_text =
        fs::read_to_string(instance_path).map_err(|source| CliError::Io { path: instance_path.to_path_buf(), source })?;
    let doc: PersistedRoot =
        PersistedRoot::from_json(&instance_text).map_err(|source| CliError::InstanceJson { path: instance_path.to_path_buf(), source })?;

    let mut instance = persistence::load(&doc, schema, diag).ok_or(CliError::ValidationFailed)?;
    if !instance.validate(diag, schema) {
        return Err(CliError::ValidationFailed);
    }

    Ok(instance)
}

/// Validates the named schema and task, then runs the task to completion
/// against the instance loaded from `instance_path`. Returns the output
/// sink's buffered bytes on success.
pub fn run_task(
    bundle: &mut Bundle,
    schema_name: &str,
    task_name: &str,
    instance_path: &Path,
    diag: &mut Diagnostics,
) -> Result<Vec<u8>, CliError> {
    let instance = load_and_validate_instance(bundle, schema_name, instance_path, diag)?;

    let schema = bundle.schema(schema_name).expect("schema existence already checked");
    let task = bundle.task_mut(task_name).ok_or_else(|| CliError::UnknownTask(task_name.to_string()))?;
    if !task.validate(diag) {
        return Err(CliError::ValidationFailed);
    }
    let task = bundle.task(task_name).expect("task existence already checked");

    let mut sink = TextSink::new(TextEncoding::Utf8);
    let mut ctx = ExecutionContext::new(task, schema, &instance, diag, &mut sink);
    let completed = ctx.continue_execution();

    if !completed {
        return Err(CliError::ExecutionAborted);
    }

    Ok(sink.result().to_vec())
}
