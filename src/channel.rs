//! Presence & Operation Channel — realtime pub/sub over a pluggable transport.
//!
//! DESIGN
//! ======
//! Every message is an [`Envelope`]: flat key/value data, typed by
//! [`MessageKind`]. The channel joins a room, broadcasts cursor positions and
//! edit operations, and tracks peer cursors from inbound traffic. It never
//! mutates the scene — applying received operations is a consumer concern,
//! and so is any conflict resolution. Delivery order is whatever the
//! transport provides; there is no dedup.
//!
//! Sends while not joined are dropped, not queued; the `bool` return makes
//! the drop observable to callers. An unavailable transport degrades the
//! channel to inert with a warning — it never fails the editor.

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::prelude::IndexedRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, Severity};
use crate::object::now_ms;

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = HashMap<String, serde_json::Value>;

/// Presence colors assigned to users that don't pick one.
const PRESENCE_COLORS: [&str; 6] = ["#D94B4B", "#4B6FD9", "#3F9D63", "#C98A2D", "#8A4BD9", "#2DA8C9"];

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("transport closed")]
    Closed,
}

impl ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "E_TRANSPORT_UNAVAILABLE",
            Self::Closed => "E_TRANSPORT_CLOSED",
        }
    }

    fn severity(&self) -> Severity {
        Severity::Degraded
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Message category, dispatched to per-kind callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A peer joined the room.
    Join,
    /// A peer left the room.
    Leave,
    /// A peer cursor position update.
    Cursor,
    /// A generic edit operation, opaque to the channel.
    Op,
}

/// The universal channel message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    /// Milliseconds since Unix epoch. Set automatically at construction.
    pub ts: i64,
    pub room: String,
    pub from: String,
    pub kind: MessageKind,
    pub data: Data,
}

impl Envelope {
    #[must_use]
    pub fn new(kind: MessageKind, room: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ts: now_ms(),
            room: room.into(),
            from: from.into(),
            kind,
            data: Data::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// A connected link to a realtime transport. Send is synchronous; inbound
/// traffic is drained cooperatively via `try_recv`.
pub trait Transport {
    /// Send an envelope to the room's peers.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the link is no longer usable.
    fn emit(&self, env: &Envelope) -> Result<(), TransportError>;

    /// Pop the next inbound envelope, if any.
    fn try_recv(&mut self) -> Option<Envelope>;
}

struct HubInner {
    /// room -> client id -> inbound sender.
    rooms: HashMap<String, HashMap<Uuid, mpsc::UnboundedSender<Envelope>>>,
}

/// In-process relay transport: every emit is forwarded to all room peers
/// excluding the sender. Used by tests and same-process sessions; a network
/// transport implements [`Transport`] against its own socket.
#[derive(Clone)]
pub struct LocalHub {
    inner: Arc<Mutex<HubInner>>,
}

impl LocalHub {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HubInner { rooms: HashMap::new() })) }
    }

    /// Open a link into a room. The link is removed from the room on drop.
    #[must_use]
    pub fn open(&self, room: &str) -> LocalLink {
        let client_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut inner) = self.inner.lock() {
            inner.rooms.entry(room.to_owned()).or_default().insert(client_id, tx);
        }
        LocalLink { hub: Arc::clone(&self.inner), room: room.to_owned(), client_id, rx }
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One client's connection to a [`LocalHub`] room.
pub struct LocalLink {
    hub: Arc<Mutex<HubInner>>,
    room: String,
    client_id: Uuid,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Transport for LocalLink {
    fn emit(&self, env: &Envelope) -> Result<(), TransportError> {
        let inner = self.hub.lock().map_err(|_| TransportError::Closed)?;
        let Some(peers) = inner.rooms.get(&self.room) else {
            return Err(TransportError::Closed);
        };
        for (peer_id, tx) in peers {
            if *peer_id != self.client_id {
                let _ = tx.send(env.clone());
            }
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}

impl Drop for LocalLink {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.hub.lock() {
            if let Some(peers) = inner.rooms.get_mut(&self.room) {
                peers.remove(&self.client_id);
            }
        }
    }
}

// =============================================================================
// PRESENCE CHANNEL
// =============================================================================

/// Connection lifecycle. `connect` takes an already-established link, so
/// there is no observable in-flight state: the session is down or joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Joined,
}

/// Connection parameters for a shared room.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub room: String,
    pub user: String,
    /// Presence color; assigned from the palette when omitted.
    pub color: Option<String>,
}

/// A remote participant's last known cursor state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerCursor {
    pub user: String,
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub last_seen: i64,
}

/// Outbound cursor position with optional metadata.
#[derive(Debug, Clone, Default)]
pub struct CursorUpdate {
    pub x: f64,
    pub y: f64,
    pub meta: Option<serde_json::Value>,
}

type Handler = Box<dyn FnMut(&Envelope)>;

/// Realtime presence session: join a room, broadcast cursors and ops, track
/// peers from inbound traffic.
#[derive(Default)]
pub struct PresenceChannel {
    state: Option<Session>,
    handlers: HashMap<MessageKind, Vec<Handler>>,
}

struct Session {
    link: Box<dyn Transport>,
    room: String,
    user: String,
    color: String,
    peers: HashMap<String, PeerCursor>,
}

impl PresenceChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        if self.state.is_some() { ChannelState::Joined } else { ChannelState::Disconnected }
    }

    /// Connect over an established transport link: tears down any existing
    /// session first (idempotent reconnect), then announces the join.
    pub fn connect(&mut self, link: Box<dyn Transport>, opts: ConnectOptions) {
        self.disconnect();

        let color = opts.color.unwrap_or_else(pick_color);
        let join = Envelope::new(MessageKind::Join, &opts.room, &opts.user).with_data("color", color.clone());
        if let Err(e) = link.emit(&join) {
            warn!(error = %e, room = %opts.room, "join announce failed; channel degraded");
        }
        info!(room = %opts.room, user = %opts.user, "channel joined");

        self.state = Some(Session {
            link,
            room: opts.room,
            user: opts.user,
            color,
            peers: HashMap::new(),
        });
    }

    /// Connect if the transport came up, otherwise log and stay inert. The
    /// editor keeps working either way.
    pub fn connect_or_inert(&mut self, link: Result<Box<dyn Transport>, TransportError>, opts: ConnectOptions) {
        match link {
            Ok(link) => self.connect(link, opts),
            Err(e) => {
                warn!(error = %e, room = %opts.room, "realtime transport unavailable; channel inert");
            }
        }
    }

    /// Broadcast a cursor position. Returns `false` when the update was
    /// dropped (not joined, or the link refused it). Drops are not queued.
    pub fn send_cursor(&mut self, update: &CursorUpdate) -> bool {
        let Some(session) = &self.state else {
            return false;
        };
        let mut env = Envelope::new(MessageKind::Cursor, &session.room, &session.user)
            .with_data("x", update.x)
            .with_data("y", update.y)
            .with_data("color", session.color.clone());
        if let Some(meta) = &update.meta {
            env = env.with_data("meta", meta.clone());
        }
        self.emit(&env)
    }

    /// Broadcast an edit operation, opaque to the channel. Same drop
    /// semantics as [`PresenceChannel::send_cursor`].
    pub fn send_op(&mut self, op: serde_json::Value) -> bool {
        let Some(session) = &self.state else {
            return false;
        };
        let env = Envelope::new(MessageKind::Op, &session.room, &session.user).with_data("op", op);
        self.emit(&env)
    }

    fn emit(&mut self, env: &Envelope) -> bool {
        let Some(session) = &self.state else {
            return false;
        };
        match session.link.emit(env) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, kind = ?env.kind, "send dropped");
                false
            }
        }
    }

    /// Register a callback for one inbound message kind. Multiple callbacks
    /// per kind run in registration order.
    pub fn on(&mut self, kind: MessageKind, handler: impl FnMut(&Envelope) + 'static) {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Drain inbound messages: update the peer map, then dispatch each
    /// envelope to its kind's callbacks. Returns how many were processed.
    pub fn poll(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let Some(session) = &mut self.state else {
                return processed;
            };
            let Some(env) = session.link.try_recv() else {
                return processed;
            };

            match env.kind {
                MessageKind::Join => {
                    let color = env
                        .data
                        .get("color")
                        .and_then(|v| v.as_str())
                        .unwrap_or("#8a8178")
                        .to_owned();
                    session.peers.insert(
                        env.from.clone(),
                        PeerCursor { user: env.from.clone(), x: 0.0, y: 0.0, color, last_seen: env.ts },
                    );
                }
                MessageKind::Leave => {
                    session.peers.remove(&env.from);
                }
                MessageKind::Cursor => {
                    let x = env.data.get("x").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
                    let y = env.data.get("y").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
                    let color = env
                        .data
                        .get("color")
                        .and_then(|v| v.as_str())
                        .unwrap_or("#8a8178")
                        .to_owned();
                    session.peers.insert(
                        env.from.clone(),
                        PeerCursor { user: env.from.clone(), x, y, color, last_seen: env.ts },
                    );
                }
                MessageKind::Op => {}
            }

            if let Some(handlers) = self.handlers.get_mut(&env.kind) {
                for handler in handlers {
                    handler(&env);
                }
            }
            processed += 1;
        }
    }

    /// Remote cursor states keyed by peer identity. Empty when not joined.
    #[must_use]
    pub fn peers(&self) -> Vec<&PeerCursor> {
        self.state.as_ref().map_or_else(Vec::new, |s| s.peers.values().collect())
    }

    /// Release the transport and clear room state. A best-effort leave is
    /// announced first. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(session) = self.state.take() {
            let leave = Envelope::new(MessageKind::Leave, &session.room, &session.user);
            if let Err(e) = session.link.emit(&leave) {
                warn!(error = %e, "leave announce dropped");
            }
            info!(room = %session.room, "channel disconnected");
        }
    }
}

fn pick_color() -> String {
    PRESENCE_COLORS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("#8a8178")
        .to_owned()
}
