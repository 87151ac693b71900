// Market module - WHAT IS FOR SALE
// Items, bids, peer identities and the merge rules that keep replicas convergent

mod model;
mod store;

pub use model::{Item, ModelError, PeerId, PEER_ID_LEN};
pub use store::{BidOutcome, BidRejection, ItemStore};
