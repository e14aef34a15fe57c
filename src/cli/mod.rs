//! Command-line interface
//!
//! Argument parsing for the `gossip-chain` binary and the helpers that turn
//! flags into a node configuration and signing identity.

pub mod commands;

pub use commands::{read_key_file, write_key_file, Command, NodeArgs, Opt};
