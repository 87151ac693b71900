// In-process discovery
//
// Nodes living in the same process are wired together with in-memory duplex
// pipes. `MemorySwarm` mimics topic rendezvous (every joiner is connected to
// everyone already on the topic); `connect` builds arbitrary topologies.

use crate::transport::{Discovery, PeerConnection, Topic, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Buffer size of each in-memory pipe direction
pub const PIPE_CAPACITY: usize = 64 * 1024;

static NEXT_ENDPOINT: AtomicU64 = AtomicU64::new(1);

/// Handle used to push connections into a `MemoryDiscovery`
#[derive(Clone, Debug)]
pub struct MemoryEndpoint {
    label: String,
    found_tx: mpsc::UnboundedSender<PeerConnection>,
}

impl MemoryEndpoint {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Connect two endpoints with a fresh pipe
    pub fn connect(&self, other: &MemoryEndpoint) -> Result<(), TransportError> {
        let (ours, theirs) = tokio::io::duplex(PIPE_CAPACITY);

        other
            .found_tx
            .send(PeerConnection::from_stream(self.label.clone(), theirs))
            .map_err(|_| TransportError::DiscoveryClosed)?;
        self.found_tx
            .send(PeerConnection::from_stream(other.label.clone(), ours))
            .map_err(|_| TransportError::DiscoveryClosed)?;
        Ok(())
    }
}

/// Discovery adapter fed by in-memory endpoints
#[derive(Debug)]
pub struct MemoryDiscovery {
    endpoint: MemoryEndpoint,
    found_rx: mpsc::UnboundedReceiver<PeerConnection>,
}

impl MemoryDiscovery {
    /// Create a discovery with an auto-generated label
    pub fn new() -> Self {
        let n = NEXT_ENDPOINT.fetch_add(1, Ordering::Relaxed);
        Self::with_label(format!("memory:{}", n))
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        let (found_tx, found_rx) = mpsc::unbounded_channel();
        Self {
            endpoint: MemoryEndpoint {
                label: label.into(),
                found_tx,
            },
            found_rx,
        }
    }

    /// Handle other discoveries use to connect to this one
    pub fn endpoint(&self) -> MemoryEndpoint {
        self.endpoint.clone()
    }
}

impl Default for MemoryDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Discovery for MemoryDiscovery {
    async fn next_connection(&mut self) -> Option<PeerConnection> {
        self.found_rx.recv().await
    }
}

/// Topic-keyed rendezvous for in-process nodes
#[derive(Clone, Default)]
pub struct MemorySwarm {
    members: Arc<Mutex<HashMap<Topic, Vec<MemoryEndpoint>>>>,
}

impl MemorySwarm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a topic: the new member is connected to every current member
    pub async fn join(&self, topic: Topic) -> MemoryDiscovery {
        let discovery = MemoryDiscovery::new();
        let joiner = discovery.endpoint();

        let mut members = self.members.lock().await;
        let peers = members.entry(topic).or_default();
        // members whose discovery was dropped have left the topic
        peers.retain(|peer| joiner.connect(peer).is_ok());
        peers.push(joiner);

        discovery
    }

    /// Number of live members on a topic
    pub async fn member_count(&self, topic: &Topic) -> usize {
        self.members
            .lock()
            .await
            .get(topic)
            .map_or(0, |peers| peers.iter().filter(|p| !p.found_tx.is_closed()).count())
    }
}
