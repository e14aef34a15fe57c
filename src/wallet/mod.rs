//! Key management
//!
//! RSA keypairs used to sign transactions before they enter the ledger.

pub mod identity;

pub use identity::{parse_public_key, verify, Identity, KeyPairPem, KEY_BITS};
