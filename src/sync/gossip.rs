// Gossip Engine - The heart of marketplace replication
//
// Implements flood gossip with dedup-by-acceptance:
// - Catch-up: every new connection asks for the peer's full catalog
// - Push: new items and accepted bids are forwarded to every other neighbour
// - Dedup: an update is only forwarded when it changed the local store, so
//   re-deliveries are absorbed instead of flooding forever
//
// The engine never touches sockets. It returns the actions the caller must
// perform, which keeps it usable without any network at all.

use crate::market::{BidOutcome, BidRejection, Item, ItemStore, PeerId};
use crate::sync::events::NodeEvent;
use crate::sync::protocol::{ItemsList, Message, NewBid, NewItem, RequestItems};
use tracing::{debug, info, warn};

/// What the caller must do after the engine handled something
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GossipAction {
    /// Send on the connection the message arrived from
    Reply(Message),
    /// Send to every connection except the one the message arrived from
    Forward(Message),
    /// Send to every connection
    Broadcast(Message),
    /// Surface an event to subscribers
    Notify(NodeEvent),
}

/// Statistics about the gossip engine
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GossipStats {
    pub messages_processed: u64,
    pub messages_forwarded: u64,
    pub self_messages_dropped: u64,
    pub unknown_messages: u64,
    pub catalogs_served: u64,
    pub items_received: u64,
    pub bids_accepted: u64,
    pub bids_rejected: u64,
}

/// The gossip engine - owns the store and applies the merge rules
pub struct GossipEngine {
    /// Our identity, stamped on everything we author
    local_id: PeerId,
    store: ItemStore,
    stats: GossipStats,
}

impl GossipEngine {
    /// Create an engine with an empty store
    pub fn new(local_id: PeerId) -> Self {
        Self::with_store(local_id, ItemStore::new())
    }

    /// Create an engine over an existing store
    pub fn with_store(local_id: PeerId, store: ItemStore) -> Self {
        Self {
            local_id,
            store,
            stats: GossipStats::default(),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn stats(&self) -> &GossipStats {
        &self.stats
    }

    /// First message sent on every established connection
    pub fn request_items(&self) -> Message {
        Message::RequestItems(RequestItems::new(self.local_id))
    }

    // ========================================================================
    // LOCAL ACTIONS
    // ========================================================================

    /// Store a locally created item and announce it to everyone
    pub fn add_item(&mut self, item: Item) -> Vec<GossipAction> {
        info!(item = item.id(), name = item.name(), "item added");
        self.store.insert(item.clone());

        vec![
            GossipAction::Broadcast(Message::NewItem(NewItem::new(self.local_id, item.clone()))),
            GossipAction::Notify(NodeEvent::ItemAdded(item)),
        ]
    }

    /// Bid on an item as this node
    pub fn bid_on_item(
        &mut self,
        item_id: &str,
        amount: u64,
    ) -> Result<Vec<GossipAction>, BidRejection> {
        if let BidOutcome::Rejected(reason) = self.store.apply_bid(item_id, amount, self.local_id)
        {
            info!(item = item_id, amount, %reason, "local bid rejected");
            return Err(reason);
        }

        info!(item = item_id, amount, "placed bid");
        Ok(vec![
            GossipAction::Broadcast(Message::NewBid(NewBid::new(
                self.local_id,
                item_id,
                amount,
            ))),
            GossipAction::Notify(NodeEvent::BidPlaced {
                item_id: item_id.to_string(),
                amount,
            }),
        ])
    }

    // ========================================================================
    // MESSAGE PROCESSING
    // ========================================================================

    /// Process an incoming message
    pub fn process_message(&mut self, msg: Message) -> Vec<GossipAction> {
        self.stats.messages_processed += 1;

        if msg.sender() == Some(&self.local_id) {
            self.stats.self_messages_dropped += 1;
            return Vec::new();
        }

        match msg {
            Message::RequestItems(request) => {
                debug!(peer = %request.sender(), "serving catalog");
                self.stats.catalogs_served += 1;
                let items = self.store.snapshot_all();
                vec![GossipAction::Reply(Message::ItemsList(ItemsList::new(
                    self.local_id,
                    items,
                )))]
            }

            Message::ItemsList(list) => {
                let peer = *list.sender();
                let items = list.into_items();
                let inserted = items
                    .iter()
                    .filter(|item| self.store.upsert_if_new((*item).clone()))
                    .count();
                self.stats.items_received += inserted as u64;
                info!(%peer, received = items.len(), inserted, "received items from peer");

                vec![GossipAction::Notify(NodeEvent::ItemsReceived(items))]
            }

            Message::NewItem(announcement) => {
                let item = announcement.item().clone();
                if !self.store.upsert_if_new(item.clone()) {
                    return Vec::new();
                }

                info!(item = item.id(), name = item.name(), "new item received");
                self.stats.items_received += 1;
                self.stats.messages_forwarded += 1;
                vec![
                    GossipAction::Forward(Message::NewItem(announcement)),
                    GossipAction::Notify(NodeEvent::ItemReceived(item)),
                ]
            }

            Message::NewBid(bid) => {
                let bidder = *bid.sender();
                match self.store.apply_bid(bid.item_id(), bid.amount(), bidder) {
                    BidOutcome::Accepted => {
                        info!(item = bid.item_id(), amount = bid.amount(), %bidder, "new bid received");
                        self.stats.bids_accepted += 1;
                        self.stats.messages_forwarded += 1;
                        let event = NodeEvent::BidReceived {
                            item_id: bid.item_id().to_string(),
                            amount: bid.amount(),
                            bidder,
                        };
                        vec![
                            GossipAction::Forward(Message::NewBid(bid)),
                            GossipAction::Notify(event),
                        ]
                    }
                    BidOutcome::Rejected(reason) => {
                        debug!(item = bid.item_id(), amount = bid.amount(), %reason, "remote bid ignored");
                        self.stats.bids_rejected += 1;
                        Vec::new()
                    }
                }
            }

            Message::Unknown { tag } => {
                warn!(tag, "unknown message type");
                self.stats.unknown_messages += 1;
                Vec::new()
            }
        }
    }
}
