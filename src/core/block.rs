use crate::core::Payload;
use crate::error::Result;
use crate::utils::{current_timestamp, deserialize, serialize, sha256_hex};
use serde::{Deserialize, Serialize};

/// `previous_hash` carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "1";
/// Seed proof of the genesis block. Fixed, never mined.
pub const GENESIS_PROOF: u64 = 100;
pub const GENESIS_NAME: &str = "GENESIS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    id: u64,
    name: String,
    data: Vec<Payload>,
    timestamp: f64,
    proof: u64,
    previous_hash: String,
    signer_public_key: String,
}

impl Block {
    pub fn new_block(
        id: u64,
        name: &str,
        data: Vec<Payload>,
        proof: u64,
        previous_hash: String,
        signer_public_key: &str,
    ) -> Result<Block> {
        Ok(Block {
            id,
            name: name.to_string(),
            data,
            timestamp: current_timestamp()?,
            proof,
            previous_hash,
            signer_public_key: signer_public_key.to_string(),
        })
    }

    pub fn generate_genesis_block() -> Result<Block> {
        Block::new_block(
            1,
            GENESIS_NAME,
            vec![],
            GENESIS_PROOF,
            GENESIS_PREVIOUS_HASH.to_string(),
            "",
        )
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    /// Hex SHA-256 of the canonical encoding of every field
    pub fn hash(&self) -> Result<String> {
        Ok(sha256_hex(self.serialize()?.as_slice()))
    }

    pub fn is_genesis(&self) -> bool {
        self.id == 1 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    pub fn get_id(&self) -> u64 {
        self.id
    }

    pub fn get_name(&self) -> &str {
        self.name.as_str()
    }

    pub fn get_data(&self) -> &[Payload] {
        self.data.as_slice()
    }

    pub fn get_timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn get_proof(&self) -> u64 {
        self.proof
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_signer_public_key(&self) -> &str {
        self.signer_public_key.as_str()
    }

    /// Copy with a different previous hash (for testing tampered chains)
    #[cfg(test)]
    pub fn with_previous_hash(&self, previous_hash: &str) -> Block {
        Block {
            previous_hash: previous_hash.to_string(),
            ..self.clone()
        }
    }
}
