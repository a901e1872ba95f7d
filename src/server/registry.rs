//! Dev-server registry - at most one supervised bundler process per project
//!
//! The registry owns the mapping from project path to a live dev-server
//! child. All mutations happen under one mutex, so the "does a handle exist"
//! check and the spawn that follows it are a single critical section.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::server::protocol::{ServerInfo, ServerMessage};

#[derive(Error, Debug)]
pub enum StartError {
    #[error("build tool not found: {0}")]
    ToolMissing(String),
    #[error("no free port: {0}")]
    NoPort(String),
    #[error("failed to spawn dev server: {0}")]
    SpawnFailed(String),
}

/// How to launch the dev server for a project. `{port}` in the args is
/// replaced with the allocated port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServeCommand {
    fn resolved_args(&self, port: u16) -> Vec<String> {
        let port = port.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{port}", &port))
            .collect()
    }
}

/// Live dev-server handle. Exists only while the child is believed alive.
pub struct ServerHandle {
    child: Child,
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

/// Process-wide registry, lifetime = orchestrator lifetime.
#[derive(Default)]
pub struct DevServerRegistry {
    servers: HashMap<PathBuf, ServerHandle>,
}

pub type SharedDevServerRegistry = Arc<Mutex<DevServerRegistry>>;

impl DevServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a dev server for `path`, or return the existing endpoint.
    ///
    /// Idempotent: re-issuing develop on a running project returns the same
    /// port and spawns nothing. On any failure no handle is registered.
    pub fn start(&mut self, path: &Path, command: &ServeCommand) -> Result<u16, StartError> {
        if let Some(handle) = self.servers.get_mut(path) {
            match handle.child.try_wait() {
                Ok(None) => {
                    debug!(path = %path.display(), port = handle.port, "Dev server already running");
                    return Ok(handle.port);
                }
                _ => {
                    // exited but not yet reaped
                    self.servers.remove(path);
                }
            }
        }

        which::which(&command.program)
            .map_err(|e| StartError::ToolMissing(format!("{}: {}", command.program, e)))?;

        let port = free_port().map_err(|e| StartError::NoPort(e.to_string()))?;

        let child = Command::new(&command.program)
            .args(command.resolved_args(port))
            .current_dir(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StartError::SpawnFailed(e.to_string()))?;

        info!(path = %path.display(), port, program = %command.program, "Dev server started");

        self.servers.insert(
            path.to_path_buf(),
            ServerHandle {
                child,
                port,
                started_at: Utc::now(),
            },
        );
        Ok(port)
    }

    /// Stop the dev server for `path`. No-op without a handle; safe to call
    /// repeatedly. Returns whether a handle was removed.
    pub async fn stop(&mut self, path: &Path) -> bool {
        match self.servers.remove(path) {
            Some(mut handle) => {
                if let Err(e) = handle.child.kill().await {
                    warn!(path = %path.display(), error = %e, "Failed to kill dev server");
                }
                info!(path = %path.display(), port = handle.port, "Dev server stopped");
                true
            }
            None => false,
        }
    }

    /// Tear down every handle. Called on application shutdown so no bundler
    /// process outlives the orchestrator.
    pub async fn stop_all(&mut self) {
        for (path, mut handle) in self.servers.drain() {
            if let Err(e) = handle.child.kill().await {
                warn!(path = %path.display(), error = %e, "Failed to kill dev server");
            }
            info!(path = %path.display(), "Dev server stopped on shutdown");
        }
    }

    /// Remove handles whose child has exited on its own. Returns the reaped
    /// entries so the caller can publish notifications.
    pub fn reap_exited(&mut self) -> Vec<(PathBuf, u16)> {
        let exited: Vec<PathBuf> = self
            .servers
            .iter_mut()
            .filter_map(|(path, handle)| match handle.child.try_wait() {
                Ok(Some(_)) | Err(_) => Some(path.clone()),
                Ok(None) => None,
            })
            .collect();

        exited
            .into_iter()
            .filter_map(|path| {
                self.servers.remove(&path).map(|handle| {
                    warn!(path = %path.display(), port = handle.port, "Dev server exited unexpectedly");
                    (path, handle.port)
                })
            })
            .collect()
    }

    pub fn port_of(&self, path: &Path) -> Option<u16> {
        self.servers.get(path).map(|handle| handle.port)
    }

    pub fn list(&self) -> Vec<ServerInfo> {
        self.servers
            .iter()
            .map(|(path, handle)| ServerInfo {
                path: path.to_string_lossy().to_string(),
                port: handle.port,
                started_at: handle.started_at,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Ask the OS for a free loopback port.
fn free_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Background task that reaps exited dev servers and publishes
/// `ServerStopped` for each, keeping the registry consistent with the
/// actual processes.
pub fn spawn_exit_monitor(
    registry: SharedDevServerRegistry,
    notify: broadcast::Sender<ServerMessage>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(1));
        loop {
            interval.tick().await;
            let reaped = {
                let mut reg = registry.lock().await;
                reg.reap_exited()
            };
            for (path, _port) in reaped {
                let _ = notify.send(ServerMessage::ServerStopped {
                    path: path.to_string_lossy().to_string(),
                });
            }
        }
    });
}
