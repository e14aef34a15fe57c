//! Utility functions and helpers
//!
//! Hashing, timestamps, local address discovery and the canonical
//! binary encoding used throughout the ledger.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, local_ip, sha256_digest, sha256_hex};

pub use serialization::{deserialize, serialize, MAX_DECODE_BYTES};
