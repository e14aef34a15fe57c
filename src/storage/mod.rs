//! Data storage and persistence
//!
//! Blocks are persisted one file per block so the chain can be rebuilt
//! at startup and rewritten wholesale after conflict resolution.

pub mod block_store;

pub use block_store::BlockStore;
