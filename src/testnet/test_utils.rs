//! Test utilities for ledger testing

use crate::core::Ledger;
use crate::error::Result;
use crate::storage::BlockStore;
use crate::wallet::Identity;
use tempfile::TempDir;

/// Key size for test identities; full-size keys make key generation the slowest part of a test run
pub const TEST_KEY_BITS: usize = 1024;

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| crate::error::ChainError::Io(e.to_string()))
}

/// Create a ledger backed by a fresh temporary directory
pub fn create_test_ledger() -> Result<(Ledger, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let store = BlockStore::for_ledger(temp_dir.path(), "test");
    let ledger = Ledger::open(store)?;
    Ok((ledger, temp_dir))
}

/// A freshly generated identity with a small key
pub fn test_identity() -> Identity {
    Identity::generate_with_bits(TEST_KEY_BITS).expect("test key generation")
}
