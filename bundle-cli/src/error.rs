//! One top-level binary error enum covering every way loading a manifest,
//! parsing a schema/task/instance file, or running a command can fail.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum CliError {
    Io { path: PathBuf, source: std::io::Error },
    ManifestToml { path: PathBuf, source: toml::de::Error },
    SchemaJson { path: PathBuf, source: serde_json::Error },
    TaskJson { path: PathBuf, source: serde_json::Error },
    InstanceJson { path: PathBuf, source: serde_json::Error },
    UnknownSchema(String),
    UnknownTask(String),
    ValidationFailed,
    ExecutionAborted,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io { path, source } => write!(f, "could not read `{}`: {source}", path.display()),
            CliError::ManifestToml { path, source } => write!(f, "malformed manifest `{}`: {source}", path.display()),
            CliError::SchemaJson { path, source } => write!(f, "malformed schema `{}`: {source}", path.display()),
            CliError::TaskJson { path, source } => write!(f, "malformed task `{}`: {source}", path.display()),
            CliError::InstanceJson { path, source } => write!(f, "malformed instance `{}`: {source}", path.display()),
            CliError::UnknownSchema(name) => write!(f, "no schema named `{name}` in this bundle"),
            CliError::UnknownTask(name) => write!(f, "no task named `{name}` in this bundle"),
            CliError::ValidationFailed => write!(f, "validation failed; see diagnostics above"),
            CliError::ExecutionAborted => write!(f, "execution aborted; see diagnostics above"),
        }
    }
}

impl std::error::Error for CliError {}
