// Node events - what an operator (or a test) can observe

use crate::market::{Item, PeerId};

/// Observable events emitted by a node
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    /// Discovery is up and the node accepts connections
    Ready,
    /// A connection to a peer was established
    ///
    /// `remote` is the discovery adapter's label for the other end (a socket
    /// address for TCP). The peer's marketplace identity is not known yet; it
    /// arrives with `PeerIdentified`.
    PeerConnected { remote: String },
    /// The peer announced its identity with its catalog request
    PeerIdentified { remote: String, peer: PeerId },
    /// A connection closed and was forgotten
    PeerDisconnected { remote: String },
    /// A local item was stored and announced
    ItemAdded(Item),
    /// A previously unknown item arrived through gossip
    ItemReceived(Item),
    /// A local bid was accepted and announced
    BidPlaced { item_id: String, amount: u64 },
    /// A remote bid was accepted
    BidReceived {
        item_id: String,
        amount: u64,
        bidder: PeerId,
    },
    /// A peer's catalog arrived (as sent, before merging)
    ItemsReceived(Vec<Item>),
}
