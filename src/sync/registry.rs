// Connection Registry - Track live peer connections
//
// Every live connection owns a bounded outbound queue drained by its writer
// task. Broadcasting encodes a message once and hands the same frame to each
// queue. A queue whose writer is gone, or that is full because the peer stopped
// reading, gets its connection dropped instead of failing the broadcast.
//
// Frames larger than the wire limit are refused up front so they never reach
// a writer.

use crate::market::PeerId;
use crate::sync::framing::DEFAULT_MAX_FRAME_LEN;
use crate::sync::protocol::Message;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Registry errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}

// ============================================================================
// CONNECTION ID
// ============================================================================

/// Locally unique identifier for a connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId([u8; 16]);

impl ConnectionId {
    /// Generate a new unique connection ID
    pub fn generate() -> Self {
        use rand::Rng;
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

// ============================================================================
// CONNECTION STATE
// ============================================================================

/// Lifecycle of a connection. Linear, no retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Established,
    Closed,
}

impl ConnectionState {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: ConnectionState) -> bool {
        matches!(
            (self, target),
            (Self::Connecting, Self::Established)
                | (Self::Connecting, Self::Closed)
                | (Self::Established, Self::Closed)
        )
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Established)
    }
}

// ============================================================================
// CONNECTION INFO
// ============================================================================

/// Bookkeeping for one registered connection
#[derive(Clone, Debug)]
pub struct ConnectionInfo {
    id: ConnectionId,
    remote: String,
    peer: Option<PeerId>,
    state: ConnectionState,
    connected_at: u64,
    frames_sent: u64,
    bytes_sent: u64,
}

impl ConnectionInfo {
    fn new(id: ConnectionId, remote: String) -> Self {
        let connected_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            id,
            remote,
            peer: None,
            state: ConnectionState::Connecting,
            connected_at,
            frames_sent: 0,
            bytes_sent: 0,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Label describing the remote end (address or adapter-specific)
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Marketplace identity of the remote, once its catalog request arrived
    pub fn peer(&self) -> Option<&PeerId> {
        self.peer.as_ref()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Unix timestamp (ms) when the connection was registered
    pub fn connected_at(&self) -> u64 {
        self.connected_at
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn transition(&mut self, target: ConnectionState) {
        if self.state.can_transition_to(target) {
            self.state = target;
        }
    }
}

struct ConnectionHandle {
    info: ConnectionInfo,
    outbound: mpsc::Sender<Bytes>,
    // dropped with the handle, which wakes the connection's reader
    _forgotten: oneshot::Sender<()>,
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Set of live connections for one node
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    max_frame_len: usize,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that refuses frames longer than `max_frame_len`
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            connections: HashMap::new(),
            max_frame_len,
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn info(&self, id: &ConnectionId) -> Option<&ConnectionInfo> {
        self.connections.get(id).map(|c| &c.info)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Record a connection as live
    ///
    /// The returned receiver resolves once the registry forgets the
    /// connection, whether through `remove` or a failed send.
    pub fn add(
        &mut self,
        id: ConnectionId,
        remote: impl Into<String>,
        outbound: mpsc::Sender<Bytes>,
    ) -> Result<oneshot::Receiver<()>, RegistryError> {
        if self.connections.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }

        let mut info = ConnectionInfo::new(id, remote.into());
        info.transition(ConnectionState::Established);
        let (forgotten_tx, forgotten_rx) = oneshot::channel();
        self.connections.insert(
            id,
            ConnectionHandle {
                info,
                outbound,
                _forgotten: forgotten_tx,
            },
        );
        Ok(forgotten_rx)
    }

    /// Drop a connection. Unknown ids are ignored.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<ConnectionInfo> {
        self.connections.remove(id).map(|handle| {
            let mut info = handle.info;
            info.transition(ConnectionState::Closed);
            info
        })
    }

    /// Record the marketplace identity behind a connection
    ///
    /// Returns the connection's remote label the first time an identity is
    /// learned, `None` if it was already known or the connection is gone.
    pub fn identify(&mut self, id: &ConnectionId, peer: PeerId) -> Option<String> {
        let handle = self.connections.get_mut(id)?;
        if handle.info.peer.is_some() {
            return None;
        }
        handle.info.peer = Some(peer);
        Some(handle.info.remote.clone())
    }

    /// Send a message to one connection
    ///
    /// Returns false if the connection is unknown, has gone away, or the
    /// message does not fit in one frame.
    pub fn send_to(&mut self, id: &ConnectionId, message: &Message) -> bool {
        match self.encode(message) {
            Some(frame) => self.deliver(id, frame),
            None => false,
        }
    }

    /// Send a message to every live connection except `exclude`
    ///
    /// Returns the number of connections the frame was queued on.
    pub fn broadcast(&mut self, message: &Message, exclude: Option<&ConnectionId>) -> usize {
        let Some(frame) = self.encode(message) else {
            return 0;
        };

        let targets: Vec<ConnectionId> = self
            .connections
            .keys()
            .filter(|id| Some(*id) != exclude)
            .copied()
            .collect();

        targets
            .iter()
            .filter(|id| self.deliver(id, frame.clone()))
            .count()
    }

    fn encode(&self, message: &Message) -> Option<Bytes> {
        let frame = match message.to_bytes() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping unencodable message");
                return None;
            }
        };

        if frame.len() > self.max_frame_len {
            warn!(
                kind = ?message.message_type(),
                len = frame.len(),
                max = self.max_frame_len,
                "message exceeds frame limit, not sent"
            );
            return None;
        }
        Some(frame)
    }

    fn deliver(&mut self, id: &ConnectionId, frame: Bytes) -> bool {
        let Some(handle) = self.connections.get_mut(id) else {
            return false;
        };

        let len = frame.len() as u64;
        match handle.outbound.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(connection = %id, "outbound queue full, dropping slow peer");
                self.remove(id);
                return false;
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection = %id, "writer gone, dropping connection");
                self.remove(id);
                return false;
            }
        }

        handle.info.frames_sent += 1;
        handle.info.bytes_sent = handle.info.bytes_sent.saturating_add(len);
        true
    }
}
