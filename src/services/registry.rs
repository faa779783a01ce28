// src/services/registry.rs
//! Connection registry and broadcast engine.
//!
//! The set of live connections and the paddle positions share a single
//! reader/writer lock. Mutations (register, unregister, paddle updates,
//! reaping) take it exclusively; snapshots and the delivery pass of a
//! broadcast only take it shared. Delivery never blocks on a socket: each
//! connection has a bounded outbound queue drained by its own writer task.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;

use crate::error::RelayError;
use crate::models::game::{validate_paddle_y, GameState, PaddleUpdate, Side};
use crate::models::message::Message;

/// Sending half of a connection's outbound queue. Frames are already-encoded
/// JSON text.
pub type OutboundSender = mpsc::Sender<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a session learns about itself when it registers.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub id: ConnectionId,
    pub side: Side,
    pub connected_at: DateTime<Utc>,
    /// Connections registered, including this one, right after insertion.
    pub total: usize,
    /// Game state at the moment of registration. Every later update is
    /// broadcast to this connection, so nothing falls between the two.
    pub snapshot: GameState,
}

struct Connection {
    addr: SocketAddr,
    side: Side,
    connected_at: DateTime<Utc>,
    outbound: OutboundSender,
}

struct Inner {
    connections: HashMap<ConnectionId, Connection>,
    game_state: GameState,
}

/// Result of one broadcast pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections whose queue accepted the frame.
    pub delivered: usize,
    /// Live connections whose queue was full; they miss this frame only.
    pub dropped: usize,
    /// Dead connections removed after the delivery pass.
    pub reaped: Vec<ConnectionId>,
}

pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
    canvas_height: f64,
}

impl ConnectionRegistry {
    pub fn new(initial: GameState, canvas_height: f64) -> Self {
        Self {
            inner: RwLock::new(Inner {
                connections: HashMap::new(),
                game_state: initial,
            }),
            next_id: AtomicU64::new(1),
            canvas_height,
        }
    }

    /// Adds a connection and assigns it the side with fewer holders
    /// (left on a tie). Registration is never refused.
    ///
    /// Frames queued on `outbound` are only broadcasts; the caller writes the
    /// initial state from the returned snapshot before draining the queue.
    pub async fn register(&self, addr: SocketAddr, outbound: OutboundSender) -> Registration {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.inner.write().await;

        let left = inner
            .connections
            .values()
            .filter(|c| c.side == Side::Left)
            .count();
        let right = inner.connections.len() - left;
        let side = if left <= right { Side::Left } else { Side::Right };

        let connected_at = Utc::now();
        inner.connections.insert(
            id,
            Connection {
                addr,
                side,
                connected_at,
                outbound,
            },
        );

        Registration {
            id,
            side,
            connected_at,
            total: inner.connections.len(),
            snapshot: inner.game_state,
        }
    }

    /// Removes a connection. Returns the remaining count if it was present,
    /// `None` if it had already been removed (e.g. reaped by a broadcast).
    pub async fn unregister(&self, id: ConnectionId) -> Option<usize> {
        let mut inner = self.inner.write().await;
        inner.connections.remove(&id)?;
        Some(inner.connections.len())
    }

    /// Validates and applies a paddle move as one exclusive step. On success
    /// returns the state right after the update; on rejection the state is
    /// untouched.
    pub async fn apply_update(&self, update: &PaddleUpdate) -> Result<GameState, RelayError> {
        validate_paddle_y(update.y, self.canvas_height)?;

        let mut inner = self.inner.write().await;
        inner.game_state.set_paddle(update.side, update.y);
        Ok(inner.game_state)
    }

    pub async fn snapshot(&self) -> GameState {
        self.inner.read().await.game_state
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.inner.read().await.connections.contains_key(&id)
    }

    /// When a still-registered connection joined.
    pub async fn connected_at(&self, id: ConnectionId) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .await
            .connections
            .get(&id)
            .map(|c| c.connected_at)
    }

    pub async fn broadcast(&self, message: &Message) -> Result<BroadcastReport, serde_json::Error> {
        let text = message.encode()?;
        Ok(self.broadcast_text(&text).await)
    }

    /// Queues `text` for every registered connection, then removes the ones
    /// whose queue turned out to be closed.
    pub async fn broadcast_text(&self, text: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();

        {
            let inner = self.inner.read().await;
            for (id, conn) in &inner.connections {
                match conn.outbound.try_send(text.to_owned()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        report.dropped += 1;
                        tracing::warn!(
                            conn_id = %id,
                            addr = %conn.addr,
                            "Outbound queue full, dropping frame"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::error!(
                            conn_id = %id,
                            addr = %conn.addr,
                            "Failed to broadcast message"
                        );
                        dead.push(*id);
                    }
                }
            }
        }

        if !dead.is_empty() {
            let mut inner = self.inner.write().await;
            for id in dead {
                if let Some(conn) = inner.connections.remove(&id) {
                    tracing::info!(
                        conn_id = %id,
                        addr = %conn.addr,
                        side = %conn.side,
                        connected_for_ms = (Utc::now() - conn.connected_at).num_milliseconds(),
                        remaining = inner.connections.len(),
                        "Removed dead connection"
                    );
                    report.reaped.push(id);
                }
            }
        }

        report
    }
}
