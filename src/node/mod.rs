// Node module - THE RUNNING PEER
// Wires discovery, the connection registry and the gossip engine together

mod auction;
mod config;

pub use auction::AuctionNode;
pub use config::NodeConfig;
pub use crate::sync::NodeEvent;

use crate::sync::ProtocolError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors from setting up or running a node
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Item announcement is {len} bytes, frame limit is {max}")]
    ItemTooLarge { len: usize, max: usize },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
