//! WebSocket presentation bridge
//!
//! One route, `/ws`. Each connection gets a select loop interleaving inbound
//! requests with notifications from the orchestrator's broadcast bus.
//! Lifecycle operations run in background tasks so a slow build never stalls
//! the socket.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::server::coordinator::{Orchestrator, OrchestratorError, SharedOrchestrator};
use crate::server::protocol::{ClientMessage, RequestEnvelope, ServerMessage, PROTOCOL_VERSION};
use crate::server::registry::spawn_exit_monitor;

/// Run the WebSocket server on the specified port.
pub async fn run_server(
    port: u16,
    orchestrator: SharedOrchestrator,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting WebSocket server on port {}", port);

    // keep the registry consistent with dev-server processes that exit on
    // their own
    spawn_exit_monitor(orchestrator.registry(), orchestrator.notify_sender());

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(orchestrator.clone());

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        "Listening on ws://{}/ws (protocol v{})",
        addr, PROTOCOL_VERSION
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // no bundler process survives the orchestrator
    orchestrator.shutdown().await;
    info!("All dev servers stopped, exiting");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(orchestrator): State<SharedOrchestrator>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, orchestrator))
}

/// Handle one client connection.
async fn handle_socket(mut socket: WebSocket, orchestrator: SharedOrchestrator) {
    info!("New client connection established");

    let hello = ServerMessage::Hello {
        version: PROTOCOL_VERSION,
    };
    if let Err(e) = send_message(&mut socket, &hello).await {
        error!("Failed to send Hello message: {}", e);
        return;
    }

    let mut notifications = orchestrator.subscribe();

    loop {
        tokio::select! {
            biased;

            msg_result = socket.recv() => {
                match msg_result {
                    Some(Ok(Message::Binary(data))) => {
                        if let Err(e) = handle_client_message(&data, &mut socket, &orchestrator).await {
                            warn!("Error handling client message: {}", e);
                            let err = ServerMessage::Error {
                                code: "message_error".to_string(),
                                message: e,
                            };
                            if let Err(send_err) = send_message(&mut socket, &err).await {
                                error!("Failed to send error message: {}", send_err);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Connection closed by client");
                        break;
                    }
                    Some(Ok(Message::Text(_))) => {
                        warn!("Received text message, binary MessagePack expected");
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // handled automatically by axum
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("Connection closed (recv returned None)");
                        break;
                    }
                }
            }

            result = notifications.recv() => {
                match result {
                    Ok(msg) => {
                        if let Err(e) = send_message(&mut socket, &msg).await {
                            error!("Failed to forward notification: {}", e);
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Notification stream lagged by {} messages", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    info!("Client connection handler finished");
}

/// Send a server message over WebSocket.
pub async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), String> {
    // to_vec_named keeps the dictionary encoding (field names on the wire)
    let bytes = rmp_serde::to_vec_named(msg).map_err(|e| e.to_string())?;
    socket
        .send(Message::Binary(bytes))
        .await
        .map_err(|e| e.to_string())
}

/// Decode one request and dispatch it.
///
/// Cheap queries answer on the requesting socket; lifecycle operations run
/// in background tasks and publish their outcome on the bus, which every
/// connection forwards.
async fn handle_client_message(
    data: &[u8],
    socket: &mut WebSocket,
    orchestrator: &SharedOrchestrator,
) -> Result<(), String> {
    let envelope = decode_request(data)?;

    match envelope.body {
        ClientMessage::Ping => {
            send_message(socket, &ServerMessage::Pong).await?;
        }

        ClientMessage::ListServers => {
            let reply = {
                let registry = orchestrator.registry();
                let reg = registry.lock().await;
                ServerMessage::server_list(&reg)
            };
            send_message(socket, &reply).await?;
        }

        ClientMessage::SetRoot { path } => {
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orch.set_root(PathBuf::from(path)).await {
                    report(&orch, "set_root", e);
                }
            });
        }

        ClientMessage::ScanWorkspace => {
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orch.rescan().await {
                    report(&orch, "scan_workspace", e);
                }
            });
        }

        ClientMessage::CreateProject {
            name,
            author,
            variant,
        } => {
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orch
                    .create_project(&name, author.as_deref(), variant.as_deref())
                    .await
                {
                    report(&orch, "create_project", e);
                }
            });
        }

        ClientMessage::DevelopProject {
            path,
            editor_command,
        } => {
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orch
                    .develop_project(&PathBuf::from(path), editor_command.as_deref())
                    .await
                {
                    report(&orch, "develop_project", e);
                }
            });
        }

        ClientMessage::StopServer { path } => {
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                orch.stop_server(&PathBuf::from(path)).await;
            });
        }

        ClientMessage::DeleteProject { path, confirmed } => {
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orch.delete_project(&PathBuf::from(path), confirmed).await {
                    report(&orch, "delete_project", e);
                }
            });
        }

        ClientMessage::EjectProject { path, destination } => {
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orch
                    .eject_project(&PathBuf::from(path), &PathBuf::from(destination))
                    .await
                {
                    report(&orch, "eject_project", e);
                }
            });
        }

        ClientMessage::BuildProject { path } => {
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orch.build_project(&PathBuf::from(path)).await {
                    report(&orch, "build_project", e);
                }
            });
        }

        ClientMessage::InstallDependencies { path } => {
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orch.install_dependencies(&PathBuf::from(path)).await {
                    report(&orch, "install_dependencies", e);
                }
            });
        }
    }

    Ok(())
}

fn decode_request(data: &[u8]) -> Result<RequestEnvelope, String> {
    rmp_serde::from_slice(data).map_err(|e| format!("Parse error: {}", e))
}

fn report(orchestrator: &Orchestrator, op: &str, err: OrchestratorError) {
    warn!(op, error = %err, "Operation failed");
    orchestrator.publish_error(&err);
}
