//! Wire protocol - tagged request/notification messages
//!
//! MessagePack on the wire, encoded with `rmp_serde::to_vec_named` so fields
//! travel by name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::project::descriptor::{IconInfo, ProjectDescriptor};
use crate::project::scanner::WorkspaceSnapshot;
use crate::server::build::BundleManifest;
use crate::server::registry::DevServerRegistry;

pub const PROTOCOL_VERSION: u32 = 1;

/// Inbound requests from the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    SetRoot {
        path: String,
    },
    ScanWorkspace,
    CreateProject {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        variant: Option<String>,
    },
    DevelopProject {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        editor_command: Option<String>,
    },
    StopServer {
        path: String,
    },
    ListServers,
    DeleteProject {
        path: String,
        #[serde(default)]
        confirmed: bool,
    },
    EjectProject {
        path: String,
        destination: String,
    },
    BuildProject {
        path: String,
    },
    InstallDependencies {
        path: String,
    },
}

/// Request wrapper with an optional client correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub body: ClientMessage,
}

/// Outbound notifications. Fire-and-forget; every subscriber sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Hello {
        version: u32,
    },
    Pong,
    Workspace {
        root: String,
        projects: Vec<ProjectInfo>,
        errors: Vec<ScanErrorInfo>,
        scanned_at: DateTime<Utc>,
    },
    ProjectCreated {
        project: ProjectInfo,
    },
    ProjectDeleted {
        path: String,
    },
    ProjectEjected {
        path: String,
        destination: String,
    },
    ServerStarted {
        path: String,
        port: u16,
    },
    ServerStopped {
        path: String,
    },
    ServerList {
        items: Vec<ServerInfo>,
    },
    BuildSucceeded {
        path: String,
        manifest: BundleManifest,
    },
    BuildFailed {
        path: String,
        cause: String,
    },
    InstallFinished {
        path: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Error {
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub path: String,
    pub dir_name: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<IconInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<std::collections::BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<String>,
}

impl From<&ProjectDescriptor> for ProjectInfo {
    fn from(descriptor: &ProjectDescriptor) -> Self {
        Self {
            path: descriptor.path.to_string_lossy().to_string(),
            dir_name: descriptor.dir_name.clone(),
            name: descriptor.name.clone(),
            author: descriptor.author.clone(),
            icon: descriptor.icon.clone(),
            dependencies: descriptor.dependencies.clone(),
            field_errors: descriptor.field_errors.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanErrorInfo {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub path: String,
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

impl ServerMessage {
    /// Full-snapshot notification from a scan result.
    pub fn workspace(snapshot: &WorkspaceSnapshot) -> Self {
        ServerMessage::Workspace {
            root: snapshot.root.to_string_lossy().to_string(),
            projects: snapshot.projects.values().map(ProjectInfo::from).collect(),
            errors: snapshot
                .errors
                .iter()
                .map(|failure| ScanErrorInfo {
                    path: failure.path.to_string_lossy().to_string(),
                    error: failure.error.clone(),
                })
                .collect(),
            scanned_at: snapshot.scanned_at,
        }
    }

    pub fn server_list(registry: &DevServerRegistry) -> Self {
        ServerMessage::ServerList {
            items: registry.list(),
        }
    }
}
