//! Workspace scanning with per-project failure isolation

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::project::descriptor::{validate, ProjectDescriptor, ValidationError};

/// OS/tooling directories that are never project candidates.
pub const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "elm-stuff",
    ".git",
    ".DS_Store",
    "Thumbs.db",
    "$RECYCLE.BIN",
    "System Volume Information",
];

#[derive(Error, Debug)]
pub enum ScanError {
    /// The root itself cannot be listed. The only wholesale failure mode.
    #[error("workspace root unavailable: {0}")]
    RootUnavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Wholesale snapshot of the workspace root. Rebuilt per scan; callers must
/// tolerate it being stale by the time it is consumed.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshot {
    pub root: PathBuf,
    pub projects: HashMap<PathBuf, ProjectDescriptor>,
    pub errors: Vec<ScanFailure>,
    pub scanned_at: DateTime<Utc>,
}

/// Scan the immediate subdirectories of `root`.
///
/// Each candidate is validated independently: `NotAProject` entries are
/// skipped silently, `CorruptProject` entries are recorded while the scan
/// continues.
pub fn scan(root: &Path) -> Result<WorkspaceSnapshot, ScanError> {
    let entries = fs::read_dir(root)
        .map_err(|e| ScanError::RootUnavailable(format!("{}: {}", root.display(), e)))?;

    let mut projects = HashMap::new();
    let mut errors = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Unreadable directory entry, skipping");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || IGNORED_DIRS.contains(&name.as_str()) {
            continue;
        }

        match validate(&path) {
            Ok(descriptor) => {
                projects.insert(path, descriptor);
            }
            Err(ValidationError::NotAProject(_)) => {
                debug!(path = %path.display(), "Not a project, skipping");
            }
            Err(err @ ValidationError::CorruptProject(_)) => {
                warn!(path = %path.display(), error = %err, "Corrupt project recorded");
                errors.push(ScanFailure {
                    path,
                    error: err.to_string(),
                });
            }
        }
    }

    info!(
        root = %root.display(),
        projects = projects.len(),
        errors = errors.len(),
        "Workspace scanned"
    );

    Ok(WorkspaceSnapshot {
        root: root.to_path_buf(),
        projects,
        errors,
        scanned_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::scaffold::scaffold;
    use crate::project::templates::StarterKind;

    #[test]
    fn missing_root_fails_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(matches!(scan(&gone), Err(ScanError::RootUnavailable(_))));
    }

    #[test]
    fn mixed_root_isolates_failures() {
        let root = tempfile::tempdir().unwrap();

        // a valid project
        scaffold(
            &root.path().join("good"),
            "good",
            Some("alice"),
            StarterKind::Sandbox,
        )
        .unwrap();

        // a marker-bearing directory with garbage metadata
        let corrupt = root.path().join("broken");
        fs::create_dir_all(&corrupt).unwrap();
        fs::write(corrupt.join(".groverc"), "{ nope").unwrap();

        // a foreign directory and a plain file
        fs::create_dir_all(root.path().join("random")).unwrap();
        fs::write(root.path().join("notes.txt"), "hi").unwrap();

        // denylisted and hidden entries
        fs::create_dir_all(root.path().join("node_modules")).unwrap();
        fs::create_dir_all(root.path().join(".cache")).unwrap();

        let snapshot = scan(root.path()).unwrap();
        assert_eq!(snapshot.projects.len(), 1);
        assert!(snapshot.projects.contains_key(&root.path().join("good")));
        assert_eq!(snapshot.errors.len(), 1);
        assert_eq!(snapshot.errors[0].path, corrupt);
    }

    #[test]
    fn foreign_directories_are_not_errors() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("just-a-dir")).unwrap();

        let snapshot = scan(root.path()).unwrap();
        assert!(snapshot.projects.is_empty());
        assert!(snapshot.errors.is_empty());
    }
}
