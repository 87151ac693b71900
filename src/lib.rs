// p2pauction - Peer-to-peer auction marketplace
//
// Nodes find each other on a shared topic, swap item catalogs when they
// connect, and flood new items and winning bids so every connected peer ends
// up with the same view of the market.

pub mod market;
pub mod node;
pub mod sync;
pub mod transport;

pub use market::{BidRejection, Item, ItemStore, PeerId};
pub use node::{AuctionNode, NodeConfig, NodeError, NodeEvent};
