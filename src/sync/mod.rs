// Sync module - HOW NODES TALK
// Handles the gossip protocol, connection tracking, and message framing

mod events;
mod framing;
mod gossip;
mod protocol;
mod registry;

pub use events::NodeEvent;
pub use framing::{frame_codec, framed_reader, framed_writer, DEFAULT_MAX_FRAME_LEN};
pub use gossip::{GossipAction, GossipEngine, GossipStats};
pub use protocol::{
    tags, ItemsList, Message, MessageType, NewBid, NewItem, ProtocolError, RequestItems,
};
pub use registry::{
    ConnectionId, ConnectionInfo, ConnectionRegistry, ConnectionState, RegistryError,
};
