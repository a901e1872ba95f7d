//! Grove Core - project workspace and dev-server orchestrator
//!
//! Headless main process of the Grove project manager. It discovers Elm
//! projects under a workspace root, scaffolds new ones from templates,
//! supervises at most one dev-server process per project, and runs one-shot
//! production builds. A graphical front end connects over a local WebSocket
//! and exchanges tagged protocol messages.

pub mod project;
pub mod server;
pub mod util;
