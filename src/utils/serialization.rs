// Canonical binary encoding shared by the block store, block hashing and the wire
use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};

/// Upper bound on the bytes a single decode may claim. Length prefixes
/// inside the input are checked against it before anything is allocated.
pub const MAX_DECODE_BYTES: usize = 64 * 1024 * 1024;

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| ChainError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration, bounded by `MAX_DECODE_BYTES`
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard().with_limit::<MAX_DECODE_BYTES>();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| ChainError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}
