//! Project descriptor validation (.groverc marker + elm.json manifest)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Presence of this file is the sole signal that a directory is a project.
pub const MARKER_FILE: &str = ".groverc";
/// Required companion manifest, consumed read-only.
pub const MANIFEST_FILE: &str = "elm.json";

#[derive(Error, Debug)]
pub enum ValidationError {
    /// The directory lacks the marker file. Expected outcome for foreign
    /// directories, not corruption.
    #[error("not a project: {0}")]
    NotAProject(String),
    /// The marker is present but the project structure is broken.
    #[error("corrupt project: {0}")]
    CorruptProject(String),
}

/// Marker file contents (JSON object).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerFile {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<IconInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestsInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconInfo {
    pub style: String,
    pub angle: i32,
    pub color: IconColor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestsInfo {
    pub status: Option<String>,
}

/// Immutable snapshot of one validated project directory.
///
/// Never mutated in place; re-validation builds a replacement.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDescriptor {
    pub path: PathBuf,
    pub dir_name: String,
    pub name: String,
    pub author: Option<String>,
    pub icon: Option<IconInfo>,
    pub tests: Option<TestsInfo>,
    /// Direct dependencies from the manifest, when extractable.
    pub dependencies: Option<BTreeMap<String, String>>,
    /// Non-essential fields that failed to extract (graceful degradation).
    pub field_errors: Vec<String>,
}

/// Validate a directory as a project.
///
/// Marker absent → `NotAProject`. Marker present but unparseable, or the
/// required manifest missing/unparseable → `CorruptProject`. Dependency
/// extraction failures degrade to `field_errors` instead of aborting.
pub fn validate(path: &Path) -> Result<ProjectDescriptor, ValidationError> {
    let marker_path = path.join(MARKER_FILE);
    if !marker_path.is_file() {
        return Err(ValidationError::NotAProject(path.display().to_string()));
    }

    let raw = fs::read_to_string(&marker_path)
        .map_err(|e| ValidationError::CorruptProject(format!("{}: {}", MARKER_FILE, e)))?;
    let marker: MarkerFile = serde_json::from_str(&raw)
        .map_err(|e| ValidationError::CorruptProject(format!("{}: {}", MARKER_FILE, e)))?;

    let manifest_path = path.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(ValidationError::CorruptProject(format!(
            "{}: missing {}",
            path.display(),
            MANIFEST_FILE
        )));
    }
    let manifest_raw = fs::read_to_string(&manifest_path)
        .map_err(|e| ValidationError::CorruptProject(format!("{}: {}", MANIFEST_FILE, e)))?;
    let manifest: serde_json::Value = serde_json::from_str(&manifest_raw)
        .map_err(|e| ValidationError::CorruptProject(format!("{}: {}", MANIFEST_FILE, e)))?;

    let mut field_errors = Vec::new();
    let dependencies = match extract_dependencies(&manifest) {
        Ok(deps) => Some(deps),
        Err(e) => {
            field_errors.push(format!("dependencies: {}", e));
            None
        }
    };

    let dir_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    debug!(path = %path.display(), name = %marker.name, "Project validated");

    Ok(ProjectDescriptor {
        path: path.to_path_buf(),
        dir_name,
        name: marker.name,
        author: marker.author,
        icon: marker.icon,
        tests: marker.tests,
        dependencies,
        field_errors,
    })
}

/// Pull `dependencies.direct` out of the manifest.
fn extract_dependencies(manifest: &serde_json::Value) -> Result<BTreeMap<String, String>, String> {
    let direct = manifest
        .get("dependencies")
        .and_then(|d| d.get("direct"))
        .ok_or_else(|| "no dependencies.direct table".to_string())?;
    let table = direct
        .as_object()
        .ok_or_else(|| "dependencies.direct is not an object".to_string())?;

    let mut deps = BTreeMap::new();
    for (package, version) in table {
        match version.as_str() {
            Some(v) => {
                deps.insert(package.clone(), v.to_string());
            }
            None => return Err(format!("version of {} is not a string", package)),
        }
    }
    Ok(deps)
}
