//! Reads a bundle manifest off disk and assembles a [`bundle_engine::Bundle`]
//! from it. The manifest is a small `toml` document naming the schema and
//! task JSON files that make up a bundle.
//!
//! `bundle-engine` itself never reads a file; this module exists only so
//! `bundle-cli` can exercise the library end-to-end.

use std::fs;
use std::path::{Path, PathBuf};

use bundle_engine::{Bundle, RootType, Task};
use serde::Deserialize;

use crate::error::CliError;

pub const MANIFEST_FILE_NAME: &str = "bundle.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleManifest {
    pub name: String,
    #[serde(default)]
    pub schemas: Vec<ManifestEntry>,
    #[serde(default)]
    pub tasks: Vec<ManifestEntry>,
}

/// Accepts either the manifest file itself or the directory containing it.
fn resolve_manifest_path(given: &Path) -> PathBuf {
    if given.is_dir() {
        given.join(MANIFEST_FILE_NAME)
    } else {
        given.to_path_buf()
    }
}

pub fn load_bundle(manifest_path: &Path) -> Result<Bundle, CliError> {
    let manifest_path = resolve_manifest_path(manifest_path);
    let manifest_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let manifest_text = fs::read_to_string(&manifest_path)
        .map_err(|source| CliError::Io { path: manifest_path.clone(), source })?;
    let manifest: BundleManifest =
        toml::from_str(&manifest_text).map_err(|source| CliError::ManifestToml { path: manifest_path.clone(), source })?;

    let mut bundle = Bundle::new();

    for entry in &manifest.schemas {
        let schema_path = manifest_dir.join(&entry.path);
        let text = fs::read_to_string(&schema_path).map_err(|source| CliError::Io { path: schema_path.clone(), source })?;
        let schema: RootType =
            serde_json::from_str(&text).map_err(|source| CliError::SchemaJson { path: schema_path.clone(), source })?;
        bundle.add_schema(entry.name.clone(), schema);
    }

    for entry in &manifest.tasks {
        let task_path = manifest_dir.join(&entry.path);
        let text = fs::read_to_string(&task_path).map_err(|source| CliError::Io { path: task_path.clone(), source })?;
        let task: Task =
            serde_json::from_str(&text).map_err(|source| CliError::TaskJson { path: task_path.clone(), source })?;
        bundle.add_task(entry.name.clone(), task);
    }

    Ok(bundle)
}
