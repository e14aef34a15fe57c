//! Shared helpers for unit tests

pub mod test_utils;

pub use test_utils::{create_temp_dir, create_test_ledger, test_identity, TEST_KEY_BITS};
