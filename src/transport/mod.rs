// Transport module - WHERE PEERS COME FROM
// Discovery adapters that hand the node bidirectional byte connections

mod memory;
mod tcp;
mod traits;

pub use traits::{
    // Core trait
    Discovery,
    // Connection types
    BoxedReader, BoxedWriter, PeerConnection,
    // Rendezvous
    Topic, APP_TOPIC_NAME,
    // Errors
    TransportError,
};

pub use tcp::{TcpDiscovery, TcpDiscoveryConfig};

pub use memory::{MemoryDiscovery, MemoryEndpoint, MemorySwarm, PIPE_CAPACITY};
