//! One-shot production build
//!
//! Distinct from the dev-server registry: runs the bundler to completion in
//! non-watch, optimized mode and describes the output directory as a
//! recursive bundle manifest. Never tracked as a long-lived handle.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::server::process;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to clear {0}: {1}")]
    ClearFailed(String, String),
    #[error("bundler failed: {0}")]
    BundlerFailed(String),
    #[error("failed to read build output: {0}")]
    ManifestFailed(String),
}

/// Recursive description of a build artifact. Directories carry their
/// children and the summed size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub name: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<BundleManifest>,
}

/// Clear the output directory, run the bundler, and manifest the result.
///
/// A missing output directory counts as already cleared.
pub async fn run_production_build(
    project: &Path,
    program: &str,
    args: &[String],
    out_dir: &str,
) -> Result<BundleManifest, BuildError> {
    let out_path = project.join(out_dir);
    match fs::remove_dir_all(&out_path) {
        Ok(()) => debug!(out = %out_path.display(), "Previous build output cleared"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(BuildError::ClearFailed(
                out_path.display().to_string(),
                e.to_string(),
            ))
        }
    }

    let output = process::run(program, args, project)
        .await
        .map_err(BuildError::BundlerFailed)?;
    if !output.success() {
        return Err(BuildError::BundlerFailed(format!(
            "exit code {}: {}",
            output.exit_code,
            output.stderr_tail(2048)
        )));
    }

    let manifest = manifest_for(&out_path)?;
    info!(
        project = %project.display(),
        size_bytes = manifest.size_bytes,
        artifacts = manifest.entries.len(),
        "Production build finished"
    );
    Ok(manifest)
}

/// Build the recursive manifest for a directory. A missing directory yields
/// an empty manifest (the bundler succeeded but produced nothing).
pub fn manifest_for(dir: &Path) -> Result<BundleManifest, BuildError> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if !dir.exists() {
        return Ok(BundleManifest {
            name,
            size_bytes: 0,
            entries: Vec::new(),
        });
    }
    manifest_entry(dir).map_err(|e| BuildError::ManifestFailed(e.to_string()))
}

fn manifest_entry(path: &Path) -> io::Result<BundleManifest> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let metadata = fs::metadata(path)?;
    if metadata.is_file() {
        return Ok(BundleManifest {
            name,
            size_bytes: metadata.len(),
            entries: Vec::new(),
        });
    }

    let mut entries = Vec::new();
    let mut size_bytes = 0;
    for entry in fs::read_dir(path)? {
        let child = manifest_entry(&entry?.path())?;
        size_bytes += child.size_bytes;
        entries.push(child);
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(BundleManifest {
        name,
        size_bytes,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_recurses_and_sums_sizes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "12345").unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets/app.js"), "1234567890").unwrap();

        let manifest = manifest_for(dir.path()).unwrap();
        assert_eq!(manifest.size_bytes, 15);
        assert_eq!(manifest.entries.len(), 2);
        let assets = manifest
            .entries
            .iter()
            .find(|e| e.name == "assets")
            .unwrap();
        assert_eq!(assets.size_bytes, 10);
        assert_eq!(assets.entries[0].name, "app.js");
    }

    #[test]
    fn missing_output_dir_is_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = manifest_for(&dir.path().join("dist")).unwrap();
        assert_eq!(manifest.size_bytes, 0);
        assert!(manifest.entries.is_empty());
    }

    #[tokio::test]
    async fn stale_output_is_cleared_before_building() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/stale.js"), "old").unwrap();

        let args = vec![
            "-c".to_string(),
            "mkdir -p dist && echo fresh > dist/index.html".to_string(),
        ];
        let manifest = run_production_build(dir.path(), "sh", &args, "dist")
            .await
            .unwrap();

        assert!(manifest.entries.iter().all(|e| e.name != "stale.js"));
        assert!(manifest.entries.iter().any(|e| e.name == "index.html"));
    }

    #[tokio::test]
    async fn bundler_failure_carries_the_cause() {
        let dir = tempfile::tempdir().unwrap();
        let args = vec!["-c".to_string(), "echo boom >&2; exit 1".to_string()];

        let err = run_production_build(dir.path(), "sh", &args, "dist")
            .await
            .unwrap_err();
        match err {
            BuildError::BundlerFailed(cause) => assert!(cause.contains("boom")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
