// Discovery Traits and Core Types
// Defines the abstract Discovery trait and the types shared by all adapters

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Name every marketplace node rendezvous on
pub const APP_TOPIC_NAME: &str = "p2p-auction";

// ============================================================================
// TOPIC
// ============================================================================

/// Shared discovery topic, derived from a fixed application name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic([u8; 32]);

impl Topic {
    /// SHA-256 of the topic name
    pub fn from_name(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Default for Topic {
    fn default() -> Self {
        Self::from_name(APP_TOPIC_NAME)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

// ============================================================================
// PEER CONNECTION
// ============================================================================

/// Read half of a peer connection
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a peer connection
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A bidirectional byte channel to one remote peer
pub struct PeerConnection {
    remote: String,
    reader: BoxedReader,
    writer: BoxedWriter,
}

impl PeerConnection {
    /// Build from already split halves
    pub fn new(remote: impl Into<String>, reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            remote: remote.into(),
            reader,
            writer,
        }
    }

    /// Build from a full-duplex stream
    pub fn from_stream<S>(remote: impl Into<String>, stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(remote, Box::new(reader), Box::new(writer))
    }

    /// Adapter-specific description of the remote end
    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn into_parts(self) -> (String, BoxedReader, BoxedWriter) {
        (self.remote, self.reader, self.writer)
    }
}

impl fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerConnection")
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TRANSPORT ERRORS
// ============================================================================

/// Errors that can occur in discovery adapters
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Bind failed: {0}")]
    BindFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Handshake timeout")]
    HandshakeTimeout,

    #[error("Topic mismatch")]
    TopicMismatch,

    #[error("Discovery closed")]
    DiscoveryClosed,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

// ============================================================================
// DISCOVERY TRAIT
// ============================================================================

/// Source of peer connections for one topic
///
/// No ordering or count guarantees: connections show up as peers are found.
#[async_trait]
pub trait Discovery: Send {
    /// Wait for the next connection. `None` means the adapter is exhausted.
    async fn next_connection(&mut self) -> Option<PeerConnection>;
}
