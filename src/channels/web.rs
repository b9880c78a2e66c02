//! Web chat channel: WebSocket chat where every connection is a session.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, mpsc};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channels::{Channel, ChannelEvent, EventStream, IncomingMessage, OutgoingResponse};
use crate::error::ChannelError;
use crate::session::SessionId;

const CHANNEL_NAME: &str = "web";

// ── JSON Protocol ───────────────────────────────────────────────────────

/// Message from browser client → server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    #[serde(rename = "message")]
    Message { content: String },
}

/// Message from server → browser client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    #[serde(rename = "response")]
    Response { content: String },
    #[serde(rename = "error")]
    Error { message: String },
}

// ── Shared State ────────────────────────────────────────────────────────

/// Internal state shared between the channel and WS handlers.
struct WebChannelInner {
    /// Sender for session events (WS handler → Channel::start stream).
    incoming_tx: mpsc::UnboundedSender<ChannelEvent>,
    /// Outgoing queue per live connection, keyed by connection id.
    connections: RwLock<HashMap<String, mpsc::UnboundedSender<ServerMessage>>>,
}

/// Axum handler state (cloneable).
#[derive(Clone)]
struct WsState {
    inner: Arc<WebChannelInner>,
}

// ── WebChannel ──────────────────────────────────────────────────────────

/// A WebSocket-based chat channel.
///
/// Architecture:
/// - Each WS connection gets a fresh `web:<uuid>` session. Connecting emits
///   `SessionStarted`, every text frame a `Message`, and disconnecting
///   `SessionEnded`.
/// - `send()` looks the connection up by session id and queues the reply on
///   that connection's outgoing sender.
pub struct WebChannel {
    inner: Arc<WebChannelInner>,
    /// Receiver side of the incoming channel: consumed once in `start()`.
    incoming_rx: Mutex<Option<mpsc::UnboundedReceiver<ChannelEvent>>>,
}

impl WebChannel {
    pub fn new() -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(WebChannelInner {
            incoming_tx,
            connections: RwLock::new(HashMap::new()),
        });

        Self {
            inner,
            incoming_rx: Mutex::new(Some(incoming_rx)),
        }
    }

    /// Build an Axum router with `/ws/chat` and `/health`.
    pub fn router(&self) -> Router {
        let state = WsState {
            inner: Arc::clone(&self.inner),
        };

        Router::new()
            .route("/ws/chat", get(ws_chat_handler))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}

impl Default for WebChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for WebChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let rx = self
            .incoming_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: "start() already called".to_string(),
            })?;

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(
        &self,
        session: &SessionId,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let connections = self.inner.connections.read().await;
        let tx = connections
            .get(&session.id)
            .ok_or_else(|| ChannelError::SendFailed {
                name: CHANNEL_NAME.to_string(),
                reason: format!("session {session} is not connected"),
            })?;

        tx.send(ServerMessage::Response {
            content: response.content,
        })
        .map_err(|_| ChannelError::SendFailed {
            name: CHANNEL_NAME.to_string(),
            reason: format!("session {session} disconnected"),
        })
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        // Dropping the senders ends every connection's forward loop.
        self.inner.connections.write().await.clear();
        Ok(())
    }
}

// ── HTTP / WebSocket Handlers ───────────────────────────────────────────

async fn health() -> &'static str {
    "ok"
}

async fn ws_chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
) -> impl IntoResponse {
    debug!("Web chat client connecting");
    ws.on_upgrade(|socket| handle_chat_socket(socket, state.inner))
}

async fn handle_chat_socket(mut socket: WebSocket, inner: Arc<WebChannelInner>) {
    let connection_id = Uuid::new_v4().to_string();
    let session = SessionId::new(CHANNEL_NAME, &connection_id);

    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();
    inner
        .connections
        .write()
        .await
        .insert(connection_id.clone(), outgoing_tx);

    info!(session = %session, "Web chat client connected");
    if inner
        .incoming_tx
        .send(ChannelEvent::SessionStarted(session.clone()))
        .is_err()
    {
        warn!("Web incoming channel closed");
        inner.connections.write().await.remove(&connection_id);
        return;
    }

    loop {
        tokio::select! {
            // Forward replies to this WS client
            outgoing = outgoing_rx.recv() => {
                let Some(msg) = outgoing else {
                    debug!(session = %session, "Outgoing queue closed");
                    break;
                };
                if let Ok(json) = serde_json::to_string(&msg) {
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        debug!(session = %session, "Web chat client disconnected during send");
                        break;
                    }
                }
            }

            // Receive messages from the client
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Message { content }) => {
                                let content = content.trim().to_string();
                                if content.is_empty() {
                                    continue;
                                }
                                let msg = IncomingMessage::new(session.clone(), content);
                                if inner.incoming_tx.send(ChannelEvent::Message(msg)).is_err() {
                                    warn!("Web incoming channel closed");
                                    break;
                                }
                            }
                            Err(e) => {
                                debug!(error = %e, text = %text, "Invalid JSON from web client");
                                let reply = ServerMessage::Error {
                                    message: "expected {\"type\":\"message\",\"content\":\"...\"}".to_string(),
                                };
                                if let Ok(json) = serde_json::to_string(&reply) {
                                    if socket.send(Message::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Web chat WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    inner.connections.write().await.remove(&connection_id);
    let _ = inner.incoming_tx.send(ChannelEvent::SessionEnded(session.clone()));
    info!(session = %session, "Web chat client disconnected");
}
