// Item Store - In-memory catalog of items and their highest bids
//
// Merge rules:
// - Items are only ever added, never overwritten by remote announcements
// - Bids only ever increase (strictly greater than the current bid wins)

use crate::market::{Item, PeerId};
use std::collections::HashMap;
use thiserror::Error;

/// Why a bid was not applied
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum BidRejection {
    #[error("Item not found")]
    UnknownItem,

    #[error("Bid too low: current bid is {current}")]
    TooLow { current: u64 },
}

/// Result of applying a bid to the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BidOutcome {
    /// The bid became the new highest bid
    Accepted,
    /// The store was left untouched
    Rejected(BidRejection),
}

impl BidOutcome {
    /// Check if the bid was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Mapping of item id to item record
#[derive(Clone, Debug, Default)]
pub struct ItemStore {
    items: HashMap<String, Item>,
}

impl ItemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of known items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if an item is known
    pub fn contains(&self, item_id: &str) -> bool {
        self.items.contains_key(item_id)
    }

    /// Get an item by id
    pub fn get(&self, item_id: &str) -> Option<&Item> {
        self.items.get(item_id)
    }

    /// Insert or replace an item (local authorship)
    pub fn insert(&mut self, item: Item) {
        self.items.insert(item.id().to_string(), item);
    }

    /// Insert an item only if its id is not known yet
    ///
    /// Returns true if the item was inserted. Items that break the bid
    /// invariants are refused.
    pub fn upsert_if_new(&mut self, item: Item) -> bool {
        if self.items.contains_key(item.id()) || !item.is_consistent() {
            return false;
        }
        self.items.insert(item.id().to_string(), item);
        true
    }

    /// Apply a bid: highest bid wins, ties lose
    pub fn apply_bid(&mut self, item_id: &str, amount: u64, bidder: PeerId) -> BidOutcome {
        let Some(item) = self.items.get_mut(item_id) else {
            return BidOutcome::Rejected(BidRejection::UnknownItem);
        };

        if amount <= item.current_bid() {
            return BidOutcome::Rejected(BidRejection::TooLow {
                current: item.current_bid(),
            });
        }

        item.record_bid(amount, bidder);
        BidOutcome::Accepted
    }

    /// Copy of every known item, in no particular order
    pub fn snapshot_all(&self) -> Vec<Item> {
        self.items.values().cloned().collect()
    }
}
