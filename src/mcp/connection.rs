//! Persistent connections.
//!
//! Each connection moves through `Connecting -> Open -> Closed`. While open,
//! its loop is strictly sequential: one inbound frame is dispatched and its
//! response written before the next frame is read. Distinct connections run
//! independently on their own tasks.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::mcp::dispatcher::ProtocolDispatcher;
use crate::mcp::types::ResponseEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Why a connection loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed the channel or sent a close frame.
    Disconnected,
    /// Unrecoverable transport error while receiving or sending.
    TransportError(String),
}

/// Per-connection lifecycle, held in the manager's active map.
#[derive(Debug)]
pub struct Connection {
    id: Option<String>,
    state: ConnectionState,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        Self {
            id: None,
            state: ConnectionState::Connecting,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// `Connecting -> Open`. Ignored in any other state.
    fn open(&mut self, id: String) {
        if self.state == ConnectionState::Connecting {
            self.id = Some(id);
            self.state = ConnectionState::Open;
        }
    }

    fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}

#[derive(Debug)]
struct ActiveConnection {
    opened_at: DateTime<Utc>,
    push: mpsc::UnboundedSender<ResponseEnvelope>,
    conn: Connection,
}

/// Snapshot of one active connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub opened_at: DateTime<Utc>,
    pub state: ConnectionState,
}

/// Tracks active connections and runs their receive/dispatch/send loops.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    dispatcher: ProtocolDispatcher,
    active: Arc<RwLock<HashMap<String, ActiveConnection>>>,
}

/// Unregisters on drop, so cleanup runs even if the loop's task is cancelled.
struct Registration {
    manager: ConnectionManager,
    id: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.manager.unregister_connection(&self.id);
    }
}

impl ConnectionManager {
    pub fn new(dispatcher: ProtocolDispatcher) -> Self {
        Self {
            dispatcher,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn dispatcher(&self) -> &ProtocolDispatcher {
        &self.dispatcher
    }

    /// Mint an identifier and add it to the active mapping.
    ///
    /// The returned receiver yields messages queued with [`Self::push`].
    pub fn register_connection(&self) -> (String, mpsc::UnboundedReceiver<ResponseEnvelope>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.clone(),
                ActiveConnection {
                    opened_at: Utc::now(),
                    push: tx,
                    conn: Connection::new(),
                },
            );
        (id, rx)
    }

    /// Remove a connection. Tolerates the entry already being absent;
    /// returns whether anything was removed.
    pub fn unregister_connection(&self, id: &str) -> bool {
        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.active.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn active_connections(&self) -> Vec<ConnectionInfo> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, c)| ConnectionInfo {
                id: id.clone(),
                opened_at: c.opened_at,
                state: c.conn.state(),
            })
            .collect()
    }

    /// Lifecycle state of a registered connection.
    pub fn state(&self, id: &str) -> Option<ConnectionState> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|c| c.conn.state())
    }

    fn update_connection(&self, id: &str, f: impl FnOnce(&mut Connection)) {
        if let Some(active) = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
        {
            f(&mut active.conn);
        }
    }

    /// Queue an unsolicited message for an open connection.
    ///
    /// It is written between request iterations, never while a request is
    /// being dispatched. Returns `false` if the connection is not open.
    pub fn push(&self, id: &str, message: ResponseEnvelope) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .is_some_and(|c| c.push.send(message).is_ok())
    }

    /// Run one connection to completion over an already-upgraded channel.
    pub async fn serve<S, K, E>(&self, mut inbound: S, mut outbound: K) -> CloseReason
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        K: Sink<Message> + Unpin,
        K::Error: Display,
        E: Display,
    {
        let (id, mut pushed) = self.register_connection();
        let _registration = Registration {
            manager: self.clone(),
            id: id.clone(),
        };
        self.update_connection(&id, |c| c.open(id.clone()));
        info!(name: "mcp.connection.opened", connection_id = %id, "MCP client connected");

        let reason = loop {
            tokio::select! {
                frame = inbound.next() => {
                    let msg = match frame {
                        None => break CloseReason::Disconnected,
                        Some(Err(e)) => break CloseReason::TransportError(e.to_string()),
                        Some(Ok(msg)) => msg,
                    };
                    let payload = match msg {
                        Message::Text(text) => text.as_bytes().to_vec(),
                        Message::Binary(data) => data.to_vec(),
                        Message::Close(_) => break CloseReason::Disconnected,
                        Message::Ping(_) | Message::Pong(_) => continue,
                    };

                    let response = self.dispatcher.handle_raw(&payload).await;
                    if let Err(e) = send(&mut outbound, &response).await {
                        break CloseReason::TransportError(e);
                    }
                }
                Some(message) = pushed.recv() => {
                    debug!(name: "mcp.connection.push", connection_id = %id, "Pushing unsolicited message");
                    if let Err(e) = send(&mut outbound, &message).await {
                        break CloseReason::TransportError(e);
                    }
                }
            }
        };

        self.update_connection(&id, Connection::close);
        match &reason {
            CloseReason::Disconnected => {
                info!(name: "mcp.connection.closed", connection_id = %id, "MCP client disconnected");
            }
            CloseReason::TransportError(e) => {
                warn!(name: "mcp.connection.failed", connection_id = %id, error = %e, "MCP connection error");
            }
        }
        reason
    }
}

async fn send<K>(outbound: &mut K, envelope: &ResponseEnvelope) -> Result<(), String>
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let text = serde_json::to_string(envelope).map_err(|e| e.to_string())?;
    outbound
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| e.to_string())
}
