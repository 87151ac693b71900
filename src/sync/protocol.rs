// Protocol - Message types for auction gossip
//
// Defines the wire format for all messages exchanged between nodes:
// - RequestItems/ItemsList: Point-to-point catalog catch-up on connect
// - NewItem: Flooded announcement of a new item
// - NewBid: Flooded announcement of an accepted bid
//
// Each encoded message is a one-byte tag followed by the postcard encoding of
// the variant's payload. Tags this node does not know decode to
// `Message::Unknown` instead of an error.

use crate::market::{Item, PeerId};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Wire tags for each message variant
pub mod tags {
    pub const REQUEST_ITEMS: u8 = 0x01;
    pub const ITEMS_LIST: u8 = 0x02;
    pub const NEW_ITEM: u8 = 0x03;
    pub const NEW_BID: u8 = 0x04;
}

/// Types of messages in the protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    RequestItems,
    ItemsList,
    NewItem,
    NewBid,
    Unknown,
}

/// Protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Empty frame")]
    EmptyFrame,

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization of {kind:?} failed: {reason}")]
    DeserializationFailed { kind: MessageType, reason: String },
}

/// Wrapper for all message types
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    RequestItems(RequestItems),
    ItemsList(ItemsList),
    NewItem(NewItem),
    NewBid(NewBid),
    /// A tag this node does not understand
    Unknown { tag: u8 },
}

impl Message {
    /// Get the message type
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::RequestItems(_) => MessageType::RequestItems,
            Message::ItemsList(_) => MessageType::ItemsList,
            Message::NewItem(_) => MessageType::NewItem,
            Message::NewBid(_) => MessageType::NewBid,
            Message::Unknown { .. } => MessageType::Unknown,
        }
    }

    /// Wire tag of this message
    pub fn tag(&self) -> u8 {
        match self {
            Message::RequestItems(_) => tags::REQUEST_ITEMS,
            Message::ItemsList(_) => tags::ITEMS_LIST,
            Message::NewItem(_) => tags::NEW_ITEM,
            Message::NewBid(_) => tags::NEW_BID,
            Message::Unknown { tag } => *tag,
        }
    }

    /// Declared author of the message, if the variant carries one
    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            Message::RequestItems(m) => Some(&m.sender),
            Message::ItemsList(m) => Some(&m.sender),
            Message::NewItem(m) => Some(&m.sender),
            Message::NewBid(m) => Some(&m.sender),
            Message::Unknown { .. } => None,
        }
    }

    /// Serialize to bytes (tag + payload)
    pub fn to_bytes(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::new();
        buf.put_u8(self.tag());

        let body = match self {
            Message::RequestItems(m) => postcard::to_allocvec(m),
            Message::ItemsList(m) => postcard::to_allocvec(m),
            Message::NewItem(m) => postcard::to_allocvec(m),
            Message::NewBid(m) => postcard::to_allocvec(m),
            Message::Unknown { .. } => Ok(Vec::new()),
        }
        .map_err(|e| ProtocolError::SerializationFailed(e.to_string()))?;

        buf.extend_from_slice(&body);
        Ok(buf.freeze())
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (&tag, body) = bytes.split_first().ok_or(ProtocolError::EmptyFrame)?;

        let message = match tag {
            tags::REQUEST_ITEMS => Message::RequestItems(decode(MessageType::RequestItems, body)?),
            tags::ITEMS_LIST => Message::ItemsList(decode(MessageType::ItemsList, body)?),
            tags::NEW_ITEM => Message::NewItem(decode(MessageType::NewItem, body)?),
            tags::NEW_BID => Message::NewBid(decode(MessageType::NewBid, body)?),
            tag => Message::Unknown { tag },
        };

        Ok(message)
    }
}

fn decode<T: DeserializeOwned>(kind: MessageType, body: &[u8]) -> Result<T, ProtocolError> {
    postcard::from_bytes(body).map_err(|e| ProtocolError::DeserializationFailed {
        kind,
        reason: e.to_string(),
    })
}

// ============================================================================
// REQUEST ITEMS
// ============================================================================

/// Ask a freshly connected peer for its whole catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItems {
    sender: PeerId,
}

impl RequestItems {
    pub fn new(sender: PeerId) -> Self {
        Self { sender }
    }

    pub fn sender(&self) -> &PeerId {
        &self.sender
    }
}

// ============================================================================
// ITEMS LIST
// ============================================================================

/// Reply to `RequestItems` carrying every item the responder knows
///
/// Catch-up only: receivers merge it but never re-broadcast it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsList {
    sender: PeerId,
    items: Vec<Item>,
}

impl ItemsList {
    pub fn new(sender: PeerId, items: Vec<Item>) -> Self {
        Self { sender, items }
    }

    pub fn sender(&self) -> &PeerId {
        &self.sender
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

// ============================================================================
// NEW ITEM
// ============================================================================

/// Announcement of an item, flooded to every neighbour
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    sender: PeerId,
    item: Item,
}

impl NewItem {
    pub fn new(sender: PeerId, item: Item) -> Self {
        Self { sender, item }
    }

    pub fn sender(&self) -> &PeerId {
        &self.sender
    }

    pub fn item(&self) -> &Item {
        &self.item
    }
}

// ============================================================================
// NEW BID
// ============================================================================

/// Announcement of a bid; the sender is the bidder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBid {
    sender: PeerId,
    item_id: String,
    amount: u64,
}

impl NewBid {
    pub fn new(sender: PeerId, item_id: impl Into<String>, amount: u64) -> Self {
        Self {
            sender,
            item_id: item_id.into(),
            amount,
        }
    }

    pub fn sender(&self) -> &PeerId {
        &self.sender
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }
}
