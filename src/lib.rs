//! # Gossip Chain
//!
//! A small replicated ledger. Each node keeps a hash-linked chain of blocks
//! on disk, accepts RSA-signed JSON payloads, mines them into blocks with a
//! fixed-difficulty proof of work and converges with its peers by adopting
//! the longest valid chain it can see.
//!
//! ## Layout
//! - `core/`: blocks, payloads, proof of work and the ledger rules
//! - `storage/`: one file per block under a per-ledger directory
//! - `wallet/`: RSA identities, signing and verification
//! - `network/`: wire framing, client transport, listener and the node facade
//! - `config/`: node settings from defaults, environment and TOML
//! - `utils/`: hashing, timestamps and the binary encoding
//! - `cli/`: command-line interface

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, NodeArgs, Opt};
pub use config::Config;
pub use crate::core::{
    proof_of_work, proof_of_work_until, valid_proof, Block, Ledger, MiningAbort, Payload, Record,
};
pub use error::{ChainError, Result};
pub use network::{GossipTransport, Node, PeerAddress, PeerRegistry};
pub use storage::BlockStore;
pub use utils::{current_timestamp, sha256_digest, sha256_hex};
pub use wallet::{Identity, KeyPairPem};
