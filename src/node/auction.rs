// Auction Node - Runs the gossip engine over live connections
//
// Task layout:
// - one discovery task accepting new connections
// - per connection, one reader task (decode + dispatch) and one writer task
//   (drains the connection's bounded outbound queue)
//
// The reader owns the connection's lifetime: it stops on EOF, read errors,
// shutdown, or when the writer task ends, then deregisters the connection.
//
// The engine sits behind a single lock so every merge is atomic. Actions are
// applied while that lock is held, which keeps queued frames in the same order
// as the store changes they describe.

use crate::market::{BidRejection, Item, PeerId};
use crate::node::{NodeConfig, NodeError, NodeEvent};
use crate::sync::{
    framed_reader, framed_writer, ConnectionId, ConnectionRegistry, GossipAction, GossipEngine,
    GossipStats, Message, NewItem,
};
use crate::transport::{BoxedWriter, Discovery, PeerConnection};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Shared {
    local_id: PeerId,
    config: NodeConfig,
    engine: Mutex<GossipEngine>,
    registry: Mutex<ConnectionRegistry>,
    events: broadcast::Sender<NodeEvent>,
    shutdown: watch::Sender<bool>,
}

/// A marketplace peer
///
/// Cheap to clone; clones share the same store, connections and events.
#[derive(Clone)]
pub struct AuctionNode {
    shared: Arc<Shared>,
}

impl AuctionNode {
    /// Create a node with a fresh random identity
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        Self::with_peer_id(config, PeerId::generate())
    }

    /// Create a node with a given identity
    pub fn with_peer_id(config: NodeConfig, local_id: PeerId) -> Result<Self, NodeError> {
        config.validate()?;

        let (events, _) = broadcast::channel(config.event_capacity);
        let (shutdown, _) = watch::channel(false);
        let max_frame_length = config.max_frame_length;

        Ok(Self {
            shared: Arc::new(Shared {
                local_id,
                config,
                engine: Mutex::new(GossipEngine::new(local_id)),
                registry: Mutex::new(ConnectionRegistry::with_max_frame_len(
                    max_frame_length,
                )),
                events,
                shutdown,
            }),
        })
    }

    pub fn local_id(&self) -> PeerId {
        self.shared.local_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.shared.config
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.shared.events.subscribe()
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Start consuming connections from a discovery adapter
    ///
    /// The node keeps serving existing connections if the adapter runs dry.
    pub fn start<D>(&self, mut discovery: D) -> JoinHandle<()>
    where
        D: Discovery + 'static,
    {
        info!(peer = %self.local_id(), topic = %self.shared.config.topic_name, "auction started");

        let node = self.clone();
        let mut shutdown = self.shared.shutdown.subscribe();

        tokio::spawn(async move {
            node.emit(NodeEvent::Ready);
            loop {
                tokio::select! {
                    _ = wait_for_shutdown(&mut shutdown) => break,
                    next = discovery.next_connection() => match next {
                        Some(connection) => node.spawn_connection(connection),
                        None => {
                            info!("discovery exhausted");
                            break;
                        }
                    },
                }
            }
        })
    }

    /// Stop discovery and close every connection
    pub fn shutdown(&self) {
        info!(peer = %self.local_id(), "shutting down");
        self.shared.shutdown.send_replace(true);
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shared.shutdown.borrow()
    }

    // ========================================================================
    // LOCAL ACTIONS
    // ========================================================================

    /// List a new item and announce it to every peer
    ///
    /// Items whose announcement would not fit in one frame are refused and
    /// leave the store untouched.
    pub async fn add_item(
        &self,
        id: &str,
        name: &str,
        description: &str,
        starting_bid: u64,
    ) -> Result<Item, NodeError> {
        let item = Item::new(id, name, description, starting_bid);

        let announcement = Message::NewItem(NewItem::new(self.local_id(), item.clone()));
        let len = announcement.to_bytes()?.len();
        let max = self.shared.config.max_frame_length;
        if len > max {
            warn!(item = id, len, max, "item too large to announce");
            return Err(NodeError::ItemTooLarge { len, max });
        }

        let mut engine = self.shared.engine.lock().await;
        let actions = engine.add_item(item.clone());
        self.apply(None, actions).await;

        Ok(item)
    }

    /// Bid on an item as this node
    pub async fn bid_on_item(&self, item_id: &str, amount: u64) -> Result<(), BidRejection> {
        let mut engine = self.shared.engine.lock().await;
        let actions = engine.bid_on_item(item_id, amount)?;
        self.apply(None, actions).await;
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub async fn item(&self, item_id: &str) -> Option<Item> {
        self.shared.engine.lock().await.store().get(item_id).cloned()
    }

    pub async fn items(&self) -> Vec<Item> {
        self.shared.engine.lock().await.store().snapshot_all()
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.shared.registry.lock().await.len()
    }

    pub async fn stats(&self) -> GossipStats {
        self.shared.engine.lock().await.stats().clone()
    }

    // ========================================================================
    // CONNECTIONS
    // ========================================================================

    fn spawn_connection(&self, connection: PeerConnection) {
        let node = self.clone();
        tokio::spawn(async move { node.run_connection(connection).await });
    }

    async fn run_connection(self, connection: PeerConnection) {
        let (remote, reader, writer) = connection.into_parts();
        let id = ConnectionId::generate();
        let max_frame_length = self.shared.config.max_frame_length;
        let (outbound_tx, outbound_rx) = mpsc::channel(self.shared.config.outbound_capacity);

        let mut forgotten = {
            let engine = self.shared.engine.lock().await;
            let mut registry = self.shared.registry.lock().await;
            let forgotten = match registry.add(id, remote.clone(), outbound_tx) {
                Ok(forgotten) => forgotten,
                Err(e) => {
                    warn!(error = %e, "refusing connection");
                    return;
                }
            };
            registry.send_to(&id, &engine.request_items());
            forgotten
        };

        info!(connection = %id, %remote, "new peer connected");
        self.emit(NodeEvent::PeerConnected {
            remote: remote.clone(),
        });

        let mut writer_task = tokio::spawn(write_frames(
            id,
            writer,
            outbound_rx,
            max_frame_length,
        ));

        let mut frames = framed_reader(reader, max_frame_length);
        let mut shutdown = self.shared.shutdown.subscribe();
        loop {
            let frame = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = &mut writer_task => {
                    debug!(connection = %id, "writer stopped, closing connection");
                    break;
                }
                _ = &mut forgotten => {
                    debug!(connection = %id, "dropped from registry, closing connection");
                    break;
                }
                frame = frames.next() => frame,
            };

            match frame {
                Some(Ok(frame)) => self.handle_frame(&id, &frame).await,
                Some(Err(e)) => {
                    warn!(connection = %id, error = %e, "read failed");
                    break;
                }
                None => break,
            }
        }

        self.shared.registry.lock().await.remove(&id);
        // queued frames are not retried once the connection is closed
        writer_task.abort();

        info!(connection = %id, %remote, "peer disconnected");
        self.emit(NodeEvent::PeerDisconnected { remote });
    }

    async fn handle_frame(&self, origin: &ConnectionId, frame: &[u8]) {
        let message = match Message::from_bytes(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(connection = %origin, error = %e, "discarding malformed message");
                return;
            }
        };
        debug!(connection = %origin, kind = ?message.message_type(), "message received");

        let mut engine = self.shared.engine.lock().await;
        // catalog requests are never forwarded, so their sender is the peer itself
        match &message {
            Message::RequestItems(request) if *request.sender() != self.local_id() => {
                let peer = *request.sender();
                let newly_identified = self.shared.registry.lock().await.identify(origin, peer);
                if let Some(remote) = newly_identified {
                    debug!(connection = %origin, %peer, "peer identified");
                    self.emit(NodeEvent::PeerIdentified { remote, peer });
                }
            }
            _ => {}
        }
        let actions = engine.process_message(message);
        self.apply(Some(origin), actions).await;
    }

    /// Carry out the engine's actions. Callers hold the engine lock.
    async fn apply(&self, origin: Option<&ConnectionId>, actions: Vec<GossipAction>) {
        if actions.is_empty() {
            return;
        }

        let mut registry = self.shared.registry.lock().await;
        for action in actions {
            match action {
                GossipAction::Reply(message) => {
                    if let Some(origin) = origin {
                        registry.send_to(origin, &message);
                    }
                }
                GossipAction::Forward(message) => {
                    let sent = registry.broadcast(&message, origin);
                    debug!(kind = ?message.message_type(), sent, "forwarded");
                }
                GossipAction::Broadcast(message) => {
                    let sent = registry.broadcast(&message, None);
                    debug!(kind = ?message.message_type(), sent, "broadcast");
                }
                GossipAction::Notify(event) => self.emit(event),
            }
        }
    }

    fn emit(&self, event: NodeEvent) {
        // no subscribers is fine
        let _ = self.shared.events.send(event);
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

/// Drain a connection's outbound queue onto the wire
async fn write_frames(
    id: ConnectionId,
    writer: BoxedWriter,
    mut outbound: mpsc::Receiver<Bytes>,
    max_frame_length: usize,
) {
    let mut sink = framed_writer(writer, max_frame_length);
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = sink.send(frame).await {
            warn!(connection = %id, error = %e, "write failed");
            break;
        }
    }
}
