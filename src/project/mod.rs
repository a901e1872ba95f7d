//! Project layer - descriptor validation, workspace scanning, scaffolding
//!
//! This module provides:
//! - Marker/manifest validation into project descriptors
//! - Workspace root scanning with per-project failure isolation
//! - Template rendering and ordered scaffolding of new projects

pub mod descriptor;
pub mod scaffold;
pub mod scanner;
pub mod templates;

pub use descriptor::{validate, ProjectDescriptor, ValidationError, MANIFEST_FILE, MARKER_FILE};
pub use scaffold::{check_project_name, scaffold, ScaffoldError, ScaffoldStep};
pub use scanner::{scan, ScanError, WorkspaceSnapshot};
pub use templates::StarterKind;
