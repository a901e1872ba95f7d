//! Lifecycle coordinator - create/delete/eject/build/develop transactions
//!
//! Each operation is a short-lived transaction serialized per project path:
//! no two create/delete/eject/build/develop operations interleave on the
//! same directory. Stop-before-delete is enforced here, not by incidental
//! ordering. Outcomes are published on a broadcast bus the presentation
//! layer subscribes to.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::project::descriptor::{validate, ValidationError};
use crate::project::scaffold::{self, ScaffoldError};
use crate::project::scanner::{self, ScanError};
use crate::project::templates::{self, StarterKind};
use crate::server::build::{self, BuildError};
use crate::server::process;
use crate::server::protocol::{ProjectInfo, ServerMessage};
use crate::server::registry::{DevServerRegistry, ServeCommand, SharedDevServerRegistry, StartError};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Scaffold(#[from] ScaffoldError),
    #[error(transparent)]
    Start(#[from] StartError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("deletion not confirmed for {0}")]
    NotConfirmed(String),
    #[error("delete left partial state at {path}: {cause}")]
    DeletePartial { path: String, cause: String },
    #[error("destination already contains {0}")]
    DestinationConflict(String),
    #[error("io error: {0}")]
    Io(String),
}

impl OrchestratorError {
    /// Stable protocol error code.
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::Validation(ValidationError::NotAProject(_)) => "not_a_project",
            OrchestratorError::Validation(ValidationError::CorruptProject(_)) => "corrupt_project",
            OrchestratorError::Scan(ScanError::RootUnavailable(_)) => "root_unavailable",
            OrchestratorError::Scaffold(ScaffoldError::InvalidName(_)) => "invalid_name",
            OrchestratorError::Scaffold(ScaffoldError::AlreadyExists(_)) => "already_exists",
            OrchestratorError::Scaffold(ScaffoldError::Step { .. }) => "scaffold_error",
            OrchestratorError::Start(_) => "start_error",
            OrchestratorError::Build(_) => "build_error",
            OrchestratorError::NotConfirmed(_) => "not_confirmed",
            OrchestratorError::DeletePartial { .. } => "delete_partial",
            OrchestratorError::DestinationConflict(_) => "destination_conflict",
            OrchestratorError::Io(_) => "io_error",
        }
    }
}

/// External command lines the orchestrator drives. Overridable for tests.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub root: PathBuf,
    pub serve: ServeCommand,
    pub build_program: String,
    pub build_args: Vec<String>,
    pub out_dir: String,
    pub install_program: String,
    pub install_args: Vec<String>,
}

impl OrchestratorConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            serve: ServeCommand {
                program: "npx".to_string(),
                args: vec![
                    "parcel".to_string(),
                    "src/index.html".to_string(),
                    "--port".to_string(),
                    "{port}".to_string(),
                ],
            },
            build_program: "npx".to_string(),
            build_args: vec![
                "parcel".to_string(),
                "build".to_string(),
                "src/index.html".to_string(),
            ],
            out_dir: "dist".to_string(),
            install_program: "npm".to_string(),
            install_args: vec!["install".to_string()],
        }
    }
}

/// Single orchestrator instance, process-wide lifetime. Owns the dev-server
/// registry, the per-path operation locks, and the notification bus.
pub struct Orchestrator {
    config: RwLock<OrchestratorConfig>,
    registry: SharedDevServerRegistry,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    notify: broadcast::Sender<ServerMessage>,
}

pub type SharedOrchestrator = Arc<Orchestrator>;

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> SharedOrchestrator {
        let (notify, _) = broadcast::channel(256);
        Arc::new(Self {
            config: RwLock::new(config),
            registry: Arc::new(Mutex::new(DevServerRegistry::new())),
            locks: Mutex::new(HashMap::new()),
            notify,
        })
    }

    /// Subscribe to outcome notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.notify.subscribe()
    }

    pub fn notify_sender(&self) -> broadcast::Sender<ServerMessage> {
        self.notify.clone()
    }

    pub fn registry(&self) -> SharedDevServerRegistry {
        self.registry.clone()
    }

    pub async fn root(&self) -> PathBuf {
        self.config.read().await.root.clone()
    }

    /// Fire-and-forget publish; no subscribers is not an error.
    pub fn publish(&self, msg: ServerMessage) {
        let _ = self.notify.send(msg);
    }

    pub fn publish_error(&self, err: &OrchestratorError) {
        self.publish(ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }

    /// Per-path operation lock. Serializes lifecycle transactions for one
    /// project without locking the whole workspace.
    async fn path_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry for a path nobody is waiting on. Called after
    /// delete/eject so removed projects do not pin map entries for the
    /// process lifetime.
    async fn prune_lock(&self, path: &Path) {
        let mut locks = self.locks.lock().await;
        if let Some(entry) = locks.get(path) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(path);
            }
        }
    }

    /// Point the orchestrator at a new workspace root and publish a fresh
    /// snapshot.
    pub async fn set_root(&self, root: PathBuf) -> Result<(), OrchestratorError> {
        info!(root = %root.display(), "Workspace root changed");
        {
            self.config.write().await.root = root;
        }
        self.rescan().await
    }

    /// Rebuild the workspace snapshot wholesale and publish it.
    pub async fn rescan(&self) -> Result<(), OrchestratorError> {
        let root = self.root().await;
        let snapshot = scanner::scan(&root)?;
        self.publish(ServerMessage::workspace(&snapshot));
        Ok(())
    }

    /// Create a new project under the workspace root.
    ///
    /// Scaffold failure triggers best-effort removal of the partial
    /// directory; the workspace ends no worse than before the operation.
    pub async fn create_project(
        &self,
        name: &str,
        author: Option<&str>,
        variant: Option<&str>,
    ) -> Result<ProjectInfo, OrchestratorError> {
        scaffold::check_project_name(name)?;
        let target = self.root().await.join(name);

        let lock = self.path_lock(&target).await;
        let _guard = lock.lock().await;

        let kind = StarterKind::from_selector(variant);
        if let Err(err) = scaffold::scaffold(&target, name, author, kind) {
            // AlreadyExists/InvalidName fail before anything is written;
            // only step failures leave a partial directory behind
            if matches!(err, ScaffoldError::Step { .. }) {
                if let Err(e) = fs::remove_dir_all(&target) {
                    warn!(target = %target.display(), error = %e, "Failed to clean up partial scaffold");
                }
            }
            return Err(err.into());
        }

        let descriptor = validate(&target)?;
        let project = ProjectInfo::from(&descriptor);
        info!(path = %target.display(), name, "Project created");
        self.publish(ServerMessage::ProjectCreated {
            project: project.clone(),
        });
        Ok(project)
    }

    /// Delete a project: stop its server first, then remove the tree.
    pub async fn delete_project(
        &self,
        path: &Path,
        confirmed: bool,
    ) -> Result<(), OrchestratorError> {
        if !confirmed {
            return Err(OrchestratorError::NotConfirmed(
                path.display().to_string(),
            ));
        }

        let lock = self.path_lock(path).await;
        let result = {
            let _guard = lock.lock().await;
            self.delete_locked(path).await
        };
        drop(lock);
        self.prune_lock(path).await;
        result
    }

    /// Delete body, caller holds the path lock. Stop-before-delete: the
    /// server must not hold file handles that block removal, and the
    /// registry reflects "no server" even if removal fails partway.
    async fn delete_locked(&self, path: &Path) -> Result<(), OrchestratorError> {
        let stopped = {
            let mut registry = self.registry.lock().await;
            registry.stop(path).await
        };
        if stopped {
            self.publish(ServerMessage::ServerStopped {
                path: path.to_string_lossy().to_string(),
            });
        }

        match fs::remove_dir_all(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(OrchestratorError::DeletePartial {
                    path: path.display().to_string(),
                    cause: e.to_string(),
                })
            }
        }

        info!(path = %path.display(), "Project deleted");
        self.publish(ServerMessage::ProjectDeleted {
            path: path.to_string_lossy().to_string(),
        });
        Ok(())
    }

    /// Start (or join) the dev server for a project, optionally launching an
    /// external editor.
    pub async fn develop_project(
        &self,
        path: &Path,
        editor_command: Option<&str>,
    ) -> Result<u16, OrchestratorError> {
        let lock = self.path_lock(path).await;
        let _guard = lock.lock().await;

        // re-validate under the lock so a develop racing a delete resolves
        // deterministically
        let descriptor = validate(path)?;
        let serve = self.config.read().await.serve.clone();

        let port = {
            let mut registry = self.registry.lock().await;
            registry.start(path, &serve)?
        };
        info!(path = %path.display(), name = %descriptor.name, port, "Develop session ready");
        self.publish(ServerMessage::ServerStarted {
            path: path.to_string_lossy().to_string(),
            port,
        });

        if let Some(editor) = editor_command {
            let args = vec![path.to_string_lossy().to_string()];
            if let Err(e) = process::launch_detached(editor, &args, path) {
                // editor launch is best-effort, the dev server is already up
                warn!(editor, error = %e, "Failed to launch editor");
            }
        }

        Ok(port)
    }

    /// Stop the dev server for a project. Unconditional and immediate; does
    /// not queue behind the per-path operation lock.
    pub async fn stop_server(&self, path: &Path) {
        let stopped = {
            let mut registry = self.registry.lock().await;
            registry.stop(path).await
        };
        if stopped {
            self.publish(ServerMessage::ServerStopped {
                path: path.to_string_lossy().to_string(),
            });
        }
    }

    /// Move a project out of the workspace to an external destination.
    ///
    /// The conflict check runs before any copy; a failed eject leaves the
    /// managed project untouched.
    pub async fn eject_project(
        &self,
        path: &Path,
        destination: &Path,
    ) -> Result<PathBuf, OrchestratorError> {
        let lock = self.path_lock(path).await;
        let result = {
            let _guard = lock.lock().await;
            self.eject_locked(path, destination).await
        };
        drop(lock);
        self.prune_lock(path).await;
        result
    }

    /// Eject body, caller holds the path lock.
    async fn eject_locked(
        &self,
        path: &Path,
        destination: &Path,
    ) -> Result<PathBuf, OrchestratorError> {
        let descriptor = validate(path)?;
        let dir_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| OrchestratorError::Io(format!("no directory name: {}", path.display())))?;
        let dest_dir = destination.join(&dir_name);
        if dest_dir.exists() {
            return Err(OrchestratorError::DestinationConflict(
                dest_dir.display().to_string(),
            ));
        }

        if let Err(e) = copy_tree(path, &dest_dir) {
            // best-effort cleanup of the partial copy; the source is intact
            if let Err(cleanup) = fs::remove_dir_all(&dest_dir) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(dest = %dest_dir.display(), error = %cleanup, "Failed to clean up partial eject copy");
                }
            }
            return Err(OrchestratorError::Io(e.to_string()));
        }

        // ejected-only files: the standalone manifest a managed project does
        // not carry, plus a refreshed readme
        let author = descriptor.author.clone().unwrap_or_default();
        fs::write(
            dest_dir.join("package.json"),
            templates::package_json(&descriptor.name, &author, None),
        )
        .map_err(|e| OrchestratorError::Io(e.to_string()))?;
        fs::write(
            dest_dir.join("README.md"),
            templates::readme(&descriptor.name),
        )
        .map_err(|e| OrchestratorError::Io(e.to_string()))?;

        self.delete_locked(path).await?;

        info!(path = %path.display(), dest = %dest_dir.display(), "Project ejected");
        self.publish(ServerMessage::ProjectEjected {
            path: path.to_string_lossy().to_string(),
            destination: dest_dir.to_string_lossy().to_string(),
        });
        Ok(dest_dir)
    }

    /// One-shot production build. Completion is reported as a build-result
    /// notification, success or failure; only pre-flight validation errors
    /// propagate as operation errors.
    pub async fn build_project(&self, path: &Path) -> Result<(), OrchestratorError> {
        let lock = self.path_lock(path).await;
        let _guard = lock.lock().await;

        validate(path)?;
        let (program, args, out_dir) = {
            let config = self.config.read().await;
            (
                config.build_program.clone(),
                config.build_args.clone(),
                config.out_dir.clone(),
            )
        };

        match build::run_production_build(path, &program, &args, &out_dir).await {
            Ok(manifest) => {
                self.publish(ServerMessage::BuildSucceeded {
                    path: path.to_string_lossy().to_string(),
                    manifest,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Production build failed");
                self.publish(ServerMessage::BuildFailed {
                    path: path.to_string_lossy().to_string(),
                    cause: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run the package manager in the project through the process bridge.
    pub async fn install_dependencies(&self, path: &Path) -> Result<(), OrchestratorError> {
        let lock = self.path_lock(path).await;
        let _guard = lock.lock().await;

        validate(path)?;
        let (program, args) = {
            let config = self.config.read().await;
            (config.install_program.clone(), config.install_args.clone())
        };

        let result = process::run(&program, &args, path).await;
        let (ok, detail) = match &result {
            Ok(output) if output.success() => (true, None),
            Ok(output) => (false, Some(output.stderr_tail(2048))),
            Err(e) => (false, Some(e.clone())),
        };
        if !ok {
            warn!(path = %path.display(), "Dependency install failed");
        }
        self.publish(ServerMessage::InstallFinished {
            path: path.to_string_lossy().to_string(),
            ok,
            detail,
        });
        Ok(())
    }

    /// Tear down every dev server. Called once on application shutdown.
    pub async fn shutdown(&self) {
        let mut registry = self.registry.lock().await;
        registry.stop_all().await;
    }
}

/// Copy a directory tree, preserving relative layout.
fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
