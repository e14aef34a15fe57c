//! Core ledger functionality
//!
//! Blocks, transaction payloads, the proof-of-work puzzle and the
//! in-memory chain with its validity rules.

pub mod block;
pub mod ledger;
pub mod payload;
pub mod proof_of_work;

pub use block::{Block, GENESIS_NAME, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
pub use ledger::{Ledger, Record};
pub use payload::Payload;
pub use proof_of_work::{
    proof_of_work, proof_of_work_until, valid_proof, MiningAbort, DIFFICULTY_PREFIX,
};
