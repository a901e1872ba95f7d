//! Ordered materialization of a new project directory
//!
//! The marker file is written strictly last: its presence is exactly the
//! validator's success signal, so a half-scaffolded directory is never
//! reported as a valid project. No rollback happens here; the coordinator
//! cleans up after a failed step.

use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::project::descriptor::MARKER_FILE;
use crate::project::templates::{self, StarterKind};

/// Template files shipped without their leading dot so the template set does
/// not contain literal hidden files. Renamed to the dotted form after writing.
const DOTLESS_FILES: &[&str] = &["gitignore"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaffoldStep {
    CreateDir,
    WriteCommon,
    RenameDotfiles,
    WriteMarker,
}

impl fmt::Display for ScaffoldStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScaffoldStep::CreateDir => "create_dir",
            ScaffoldStep::WriteCommon => "write_common",
            ScaffoldStep::RenameDotfiles => "rename_dotfiles",
            ScaffoldStep::WriteMarker => "write_marker",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("invalid project name: {0:?}")]
    InvalidName(String),
    #[error("target already exists: {0}")]
    AlreadyExists(String),
    #[error("scaffold step {step} failed: {cause}")]
    Step { step: ScaffoldStep, cause: String },
}

/// Reject names that are empty or not filesystem-safe.
pub fn check_project_name(name: &str) -> Result<(), ScaffoldError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(ScaffoldError::InvalidName(name.to_string()));
    }
    if trimmed.starts_with('.') {
        return Err(ScaffoldError::InvalidName(name.to_string()));
    }
    let safe = trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '));
    if !safe {
        return Err(ScaffoldError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Scaffold a new project at `target`.
///
/// Write order: create directories, write common template files, rename
/// dotless dotfiles, write the marker last.
pub fn scaffold(
    target: &Path,
    name: &str,
    author: Option<&str>,
    variant: StarterKind,
) -> Result<(), ScaffoldError> {
    check_project_name(name)?;

    if target.exists() {
        let occupied = !target.is_dir()
            || fs::read_dir(target)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(true);
        if occupied {
            return Err(ScaffoldError::AlreadyExists(target.display().to_string()));
        }
    }

    fs::create_dir_all(target.join("src")).map_err(|e| ScaffoldError::Step {
        step: ScaffoldStep::CreateDir,
        cause: e.to_string(),
    })?;

    let common: &[(&str, String)] = &[
        ("src/index.html", templates::index_html(name)),
        ("src/index.js", templates::index_js()),
        ("src/Main.elm", templates::main_elm(variant, name)),
        ("elm.json", templates::elm_json(variant)),
        ("README.md", templates::readme(name)),
        ("gitignore", templates::gitignore()),
    ];
    for (rel, content) in common {
        fs::write(target.join(rel), content).map_err(|e| ScaffoldError::Step {
            step: ScaffoldStep::WriteCommon,
            cause: format!("{}: {}", rel, e),
        })?;
    }

    for dotless in DOTLESS_FILES {
        fs::rename(target.join(dotless), target.join(format!(".{}", dotless))).map_err(|e| {
            ScaffoldError::Step {
                step: ScaffoldStep::RenameDotfiles,
                cause: format!("{}: {}", dotless, e),
            }
        })?;
    }

    fs::write(target.join(MARKER_FILE), templates::marker(name, author)).map_err(|e| {
        ScaffoldError::Step {
            step: ScaffoldStep::WriteMarker,
            cause: e.to_string(),
        }
    })?;

    info!(target = %target.display(), name, variant = ?variant, "Project scaffolded");
    Ok(())
}
