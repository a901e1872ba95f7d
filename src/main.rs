use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use grove_core::server::{Orchestrator, OrchestratorConfig};

#[derive(Parser)]
#[command(name = "grove-core", about = "Project workspace and dev-server orchestrator")]
struct Cli {
    /// Port for the WebSocket control plane
    #[arg(long, env = "GROVE_PORT", default_value_t = 47990)]
    port: u16,

    /// Workspace root holding the managed projects
    #[arg(long, env = "GROVE_ROOT")]
    root: Option<PathBuf>,
}

fn default_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Grove"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    grove_core::util::init_logging();

    let cli = Cli::parse();
    let root = cli.root.unwrap_or_else(default_root);
    std::fs::create_dir_all(&root)?;

    info!(root = %root.display(), port = cli.port, "Starting Grove Core");

    let orchestrator = Orchestrator::new(OrchestratorConfig::new(root));
    grove_core::server::run_server(cli.port, orchestrator).await
}
