// TCP Discovery Implementation
// Listens for peers, dials bootstrap peers, and only hands over connections
// whose remote end announced the same topic.

use crate::transport::{Discovery, PeerConnection, Topic, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

// ============================================================================
// TCP DISCOVERY CONFIG
// ============================================================================

/// Configuration for TCP discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpDiscoveryConfig {
    /// Address to bind to
    pub bind_address: String,
    /// Port to bind to (0 for random)
    pub bind_port: u16,
    /// Peers dialed right after binding (host:port)
    pub bootstrap: Vec<String>,
    /// Time allowed for dialing and exchanging topics
    pub handshake_timeout_secs: u64,
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// Handshaken connections buffered before the node picks them up
    pub queue_capacity: usize,
}

impl Default for TcpDiscoveryConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: 0,
            bootstrap: Vec::new(),
            handshake_timeout_secs: 10,
            nodelay: true,
            queue_capacity: 64,
        }
    }
}

impl TcpDiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_address(mut self, addr: &str) -> Self {
        self.bind_address = addr.to_string();
        self
    }

    pub fn with_bind_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    pub fn with_bootstrap_peer(mut self, addr: &str) -> Self {
        self.bootstrap.push(addr.to_string());
        self
    }

    pub fn with_handshake_timeout(mut self, secs: u64) -> Self {
        self.handshake_timeout_secs = secs;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.handshake_timeout_secs == 0 {
            return Err(TransportError::InvalidConfig(
                "handshake_timeout_secs cannot be 0".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(TransportError::InvalidConfig(
                "queue_capacity cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TCP DISCOVERY
// ============================================================================

/// TCP discovery adapter
pub struct TcpDiscovery {
    topic: Topic,
    config: TcpDiscoveryConfig,
    local_addr: SocketAddr,
    found_tx: mpsc::Sender<PeerConnection>,
    found_rx: mpsc::Receiver<PeerConnection>,
    listener_handle: tokio::task::JoinHandle<()>,
}

impl TcpDiscovery {
    /// Bind the listener and start dialing bootstrap peers
    pub async fn bind(config: TcpDiscoveryConfig, topic: Topic) -> Result<Self, TransportError> {
        config.validate()?;

        let bind_addr = format!("{}:{}", config.bind_address, config.bind_port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, %topic, "listening for peers");

        let (found_tx, found_rx) = mpsc::channel(config.queue_capacity);

        let accept_tx = found_tx.clone();
        let handshake_timeout = Duration::from_secs(config.handshake_timeout_secs);
        let nodelay = config.nodelay;
        let listener_handle = tokio::spawn(async move {
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        break;
                    }
                };
                let tx = accept_tx.clone();
                tokio::spawn(async move {
                    stream.set_nodelay(nodelay).ok();
                    match handshake(stream, topic, handshake_timeout).await {
                        Ok(stream) => {
                            let _ = tx.send(PeerConnection::from_stream(addr.to_string(), stream)).await;
                        }
                        Err(e) => debug!(%addr, error = %e, "inbound handshake failed"),
                    }
                });
            }
        });

        let discovery = Self {
            topic,
            config,
            local_addr,
            found_tx,
            found_rx,
            listener_handle,
        };

        for peer in discovery.config.bootstrap.clone() {
            discovery.dial(&peer);
        }

        Ok(discovery)
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Connect to a peer in the background
    ///
    /// Failures are logged; a successful dial shows up through
    /// `next_connection`.
    pub fn dial(&self, addr: &str) {
        let addr = addr.to_string();
        let tx = self.found_tx.clone();
        let topic = self.topic;
        let handshake_timeout = Duration::from_secs(self.config.handshake_timeout_secs);
        let nodelay = self.config.nodelay;

        tokio::spawn(async move {
            let stream = match timeout(handshake_timeout, TcpStream::connect(&addr)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    warn!(%addr, error = %e, "dial failed");
                    return;
                }
                Err(_) => {
                    warn!(%addr, "dial timed out");
                    return;
                }
            };
            stream.set_nodelay(nodelay).ok();

            match handshake(stream, topic, handshake_timeout).await {
                Ok(stream) => {
                    let _ = tx.send(PeerConnection::from_stream(addr, stream)).await;
                }
                Err(e) => warn!(%addr, error = %e, "outbound handshake failed"),
            }
        });
    }
}

impl Drop for TcpDiscovery {
    fn drop(&mut self) {
        self.listener_handle.abort();
    }
}

#[async_trait]
impl Discovery for TcpDiscovery {
    async fn next_connection(&mut self) -> Option<PeerConnection> {
        self.found_rx.recv().await
    }
}

/// Both sides send their topic and keep the stream only if the topics match
async fn handshake(
    mut stream: TcpStream,
    topic: Topic,
    limit: Duration,
) -> Result<TcpStream, TransportError> {
    let exchange = async {
        stream.write_all(topic.as_bytes()).await?;
        let mut remote = [0u8; 32];
        stream.read_exact(&mut remote).await?;
        Ok::<_, std::io::Error>(Topic::from_bytes(remote))
    };

    let remote_topic = timeout(limit, exchange)
        .await
        .map_err(|_| TransportError::HandshakeTimeout)??;

    if remote_topic != topic {
        return Err(TransportError::TopicMismatch);
    }
    Ok(stream)
}
