// Market Model - Peer identities and auction items

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Length of a peer identity in bytes
pub const PEER_ID_LEN: usize = 8;

/// Errors from parsing model values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid peer id: {0}")]
    InvalidPeerId(String),
}

// ============================================================================
// PEER ID
// ============================================================================

/// Identity of a node in the marketplace
///
/// Random per process instance and never verified: any peer can claim any id.
/// Used to tag authorship of gossip messages and to drop self-messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId([u8; PEER_ID_LEN]);

impl PeerId {
    /// Generate a random peer ID
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; PEER_ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; PEER_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; PEER_ID_LEN] {
        &self.0
    }

    /// Parse from a lowercase or uppercase hex string
    pub fn from_hex(s: &str) -> Result<Self, ModelError> {
        let bytes = hex::decode(s).map_err(|e| ModelError::InvalidPeerId(e.to_string()))?;
        let bytes: [u8; PEER_ID_LEN] = bytes
            .try_into()
            .map_err(|_| ModelError::InvalidPeerId(format!("expected {} bytes", PEER_ID_LEN)))?;
        Ok(Self(bytes))
    }

    /// Hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ============================================================================
// ITEM
// ============================================================================

/// An auctionable item and its current highest bid
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: String,
    name: String,
    description: String,
    starting_bid: u64,
    current_bid: u64,
    highest_bidder: Option<PeerId>,
}

impl Item {
    /// Create a fresh item with no bids yet
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        starting_bid: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            starting_bid,
            current_bid: starting_bid,
            highest_bidder: None,
        }
    }

    /// Attach a bid state, as received from a peer's catalog
    pub fn with_bid(mut self, current_bid: u64, highest_bidder: Option<PeerId>) -> Self {
        self.current_bid = current_bid;
        self.highest_bidder = highest_bidder;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn starting_bid(&self) -> u64 {
        self.starting_bid
    }

    pub fn current_bid(&self) -> u64 {
        self.current_bid
    }

    pub fn highest_bidder(&self) -> Option<&PeerId> {
        self.highest_bidder.as_ref()
    }

    /// Check the bid invariants
    ///
    /// `current_bid` never drops below `starting_bid`, and a bidder is recorded
    /// exactly when some bid has raised the price.
    pub fn is_consistent(&self) -> bool {
        self.current_bid >= self.starting_bid
            && self.highest_bidder.is_some() == (self.current_bid > self.starting_bid)
    }

    /// Record a winning bid. Callers check that `amount` beats `current_bid`.
    pub(crate) fn record_bid(&mut self, amount: u64, bidder: PeerId) {
        self.current_bid = amount;
        self.highest_bidder = Some(bidder);
    }
}
