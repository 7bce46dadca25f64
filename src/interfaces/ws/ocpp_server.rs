//! OCPP 1.6 WebSocket server
//!
//! Accepts charge-point connections at `ws://<host>:<port>/ocpp/{charge_point_id}`.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::application::handlers::{OcppHandlerV16, OcppServices};
use crate::notifications::{ChargePointConnectedEvent, ChargePointDisconnectedEvent, Event};
use crate::shared::ShutdownSignal;

/// OCPP 1.6 WebSocket subprotocol
const OCPP_SUBPROTOCOL: &str = "ocpp1.6";

/// OCPP WebSocket Server
pub struct OcppServer {
    address: String,
    services: OcppServices,
    shutdown_signal: Option<ShutdownSignal>,
}

impl OcppServer {
    pub fn new(address: impl Into<String>, services: OcppServices) -> Self {
        Self {
            address: address.into(),
            services,
            shutdown_signal: None,
        }
    }

    /// Set the shutdown signal for graceful shutdown
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown_signal = Some(signal);
        self
    }

    /// Start the WebSocket server
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.address).await?;

        info!("🔌 OCPP 1.6 endpoint started on ws://{}", self.address);
        info!(
            "   Charge points should connect to: ws://{}/ocpp/{{charge_point_id}}",
            self.address
        );

        match self.shutdown_signal.clone() {
            Some(shutdown) => self.run_with_shutdown(listener, shutdown).await,
            None => self.run_loop(listener).await,
        }
    }

    async fn run_loop(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        while let Ok((stream, addr)) = listener.accept().await {
            self.spawn_connection(stream, addr);
        }
        Ok(())
    }

    async fn run_with_shutdown(
        &self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("🛑 WebSocket server received shutdown signal");
                    self.graceful_shutdown().await;
                    return Ok(());
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let services = self.services.clone();
        let shutdown = self.shutdown_signal.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, services, shutdown).await {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }

    async fn graceful_shutdown(&self) {
        let registry = &self.services.registry;
        let connected = registry.connected_ids();
        if !connected.is_empty() {
            info!("📢 Closing {} charge point connections...", connected.len());
        }

        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

        for cp_id in connected {
            registry.unregister(&cp_id);
            self.services.command_sender.cleanup_charge_point(&cp_id);
        }

        info!("✅ WebSocket server shutdown complete");
    }
}

/// Extract charge point ID from WebSocket request path.
/// Expected format: /ocpp/{charge_point_id} or /{charge_point_id}
fn extract_charge_point_id(path: &str) -> Option<String> {
    let path = path.trim_start_matches('/');

    if let Some(id) = path.strip_prefix("ocpp/") {
        let id = id.trim_start_matches('/');
        if !id.is_empty() && !id.contains('/') {
            return Some(id.to_string());
        }
    }

    if !path.is_empty() && !path.contains('/') {
        return Some(path.to_string());
    }

    None
}

/// Handle a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    services: OcppServices,
    shutdown: Option<ShutdownSignal>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("New connection from: {}", addr);

    let mut charge_point_id: Option<String> = None;

    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, mut response: Response| {
            let path = req.uri().path();
            debug!("WebSocket handshake from: {}, path: {}", addr, path);

            let requested_protocols = req
                .headers()
                .get("Sec-WebSocket-Protocol")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");

            let supports_ocpp16 = requested_protocols
                .split(',')
                .map(|s| s.trim())
                .any(|p| p == OCPP_SUBPROTOCOL);

            if supports_ocpp16 {
                response.headers_mut().insert(
                    "Sec-WebSocket-Protocol",
                    HeaderValue::from_static(OCPP_SUBPROTOCOL),
                );
            } else if !requested_protocols.is_empty() {
                warn!(
                    "Client does not support ocpp1.6, requested: {}",
                    requested_protocols
                );
            }

            charge_point_id = extract_charge_point_id(path);
            Ok(response)
        },
    )
    .await?;

    let charge_point_id = charge_point_id.unwrap_or_else(|| format!("CP_{}", addr.port()));
    info!("[{}] Connected from {}", charge_point_id, addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let registry = services.registry.clone();
    let command_sender = services.command_sender.clone();
    let event_bus = services.event_bus.clone();

    registry.register(&charge_point_id, tx);
    event_bus.publish(Event::ChargePointConnected(ChargePointConnectedEvent {
        charge_point_id: charge_point_id.clone(),
        timestamp: Utc::now(),
        remote_addr: Some(addr.to_string()),
    }));

    let handler = Arc::new(OcppHandlerV16::new(charge_point_id.clone(), services));

    // Outgoing message sender task
    let cp_id_send = charge_point_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            debug!("[{}] -> {}", cp_id_send, msg);
            if let Err(e) = ws_sender.send(Message::Text(msg)).await {
                error!("[{}] Send error: {}", cp_id_send, e);
                break;
            }
        }
    });

    // Incoming message receiver task
    let cp_id_recv = charge_point_id.clone();
    let session_reg = registry.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Some(response) = handler.handle(&text).await {
                        if let Err(e) = session_reg.send_to(&cp_id_recv, response) {
                            error!("[{}] Failed to send response: {}", cp_id_recv, e);
                            break;
                        }
                    }
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    session_reg.touch(&cp_id_recv);
                }
                Ok(Message::Close(frame)) => {
                    info!("[{}] Close frame received: {:?}", cp_id_recv, frame);
                    break;
                }
                Ok(Message::Binary(data)) => {
                    warn!(
                        "[{}] Binary message received ({} bytes), ignoring",
                        cp_id_recv,
                        data.len()
                    );
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    error!("[{}] WebSocket error: {}", cp_id_recv, e);
                    break;
                }
            }
        }
    });

    // Wait for tasks or shutdown
    match shutdown {
        Some(shutdown) => {
            tokio::select! {
                _ = send_task => {},
                _ = recv_task => {},
                _ = shutdown.notified().wait() => {
                    info!("[{}] Connection closing due to server shutdown", charge_point_id);
                }
            }
        }
        None => {
            tokio::select! {
                _ = send_task => {},
                _ = recv_task => {},
            }
        }
    }

    // Cleanup
    registry.unregister(&charge_point_id);
    command_sender.cleanup_charge_point(&charge_point_id);

    event_bus.publish(Event::ChargePointDisconnected(ChargePointDisconnectedEvent {
        charge_point_id: charge_point_id.clone(),
        timestamp: Utc::now(),
    }));

    info!("[{}] Disconnected", charge_point_id);
    Ok(())
}
