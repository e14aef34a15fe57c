//! Peer-to-peer networking
//!
//! Length-prefixed request/reply exchanges over plain TCP: the wire
//! envelope, the client transport, the listener, the peer set and the
//! node that ties them to a ledger.

pub mod message;
pub mod node;
pub mod peers;
pub mod server;
pub mod transport;

pub use message::{read_frame, write_frame, Package, Response};
pub use node::{Node, NodeState};
pub use peers::{PeerAddress, PeerRegistry};
pub use server::Server;
pub use transport::GossipTransport;
