pub mod build;
pub mod coordinator;
pub mod process;
pub mod protocol;
pub mod registry;
pub mod ws;

pub use build::{manifest_for, run_production_build, BuildError, BundleManifest};
pub use coordinator::{Orchestrator, OrchestratorConfig, OrchestratorError, SharedOrchestrator};
pub use process::{launch_detached, run, CommandOutput};
pub use protocol::{
    ClientMessage, ProjectInfo, RequestEnvelope, ScanErrorInfo, ServerInfo, ServerMessage,
    PROTOCOL_VERSION,
};
pub use registry::{
    spawn_exit_monitor, DevServerRegistry, ServeCommand, SharedDevServerRegistry, StartError,
};
pub use ws::run_server;
