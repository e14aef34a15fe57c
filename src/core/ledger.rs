// The authoritative in-memory chain for one named ledger, backed by a BlockStore.
// Every mutation persists before it becomes visible in memory.

use crate::core::proof_of_work::{proof_of_work, valid_proof};
use crate::core::{Block, Payload};
use crate::error::{ChainError, Result};
use crate::storage::BlockStore;
use crate::wallet;
use log::{info, warn};
use rsa::RsaPublicKey;
use serde::Serialize;
use uuid::Uuid;

/// One payload from a labeled block, flattened for tabular reads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub block_id: u64,
    pub timestamp: f64,
    pub payload: Payload,
}

pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Payload>,
    node_identifier: String,
    store: BlockStore,
}

impl Ledger {
    /// Rebuild the chain from `store`, creating the genesis block on an empty store
    pub fn open(store: BlockStore) -> Result<Ledger> {
        let chain = store.load_all()?;
        let mut ledger = Ledger {
            chain,
            pending: vec![],
            node_identifier: Uuid::new_v4().simple().to_string(),
            store,
        };

        if ledger.chain.is_empty() {
            let genesis = Block::generate_genesis_block()?;
            ledger.store.save(&genesis)?;
            ledger.chain.push(genesis);
            info!(
                "Created genesis block in {}",
                ledger.store.dir().display()
            );
        } else {
            info!(
                "Loaded {} blocks from {}",
                ledger.chain.len(),
                ledger.store.dir().display()
            );
        }

        Ok(ledger)
    }

    pub fn hash(block: &Block) -> Result<String> {
        block.hash()
    }

    pub fn chain(&self) -> &[Block] {
        self.chain.as_slice()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        // open() guarantees at least the genesis block and nothing shrinks the chain
        &self.chain[self.chain.len() - 1]
    }

    pub fn pending(&self) -> &[Payload] {
        self.pending.as_slice()
    }

    pub fn node_identifier(&self) -> &str {
        self.node_identifier.as_str()
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Buffer a signed payload for the next block.
    ///
    /// Returns the id of the block it will land in, or `None` when the
    /// signature does not check out. Rejected payloads are dropped.
    pub fn new_transaction(
        &mut self,
        payload: Payload,
        signature: &[u8],
        public_key: &RsaPublicKey,
    ) -> Option<u64> {
        if !wallet::verify(&payload, signature, public_key) {
            warn!("Dropped transaction with invalid signature");
            return None;
        }
        self.pending.push(payload);
        Some(self.last_block().get_id() + 1)
    }

    /// Solve the proof for the current tip and commit every pending payload
    pub fn mint_block(&mut self, name: &str, public_key: &str) -> Result<Block> {
        let proof = proof_of_work(self.last_block().get_proof());
        self.commit_block(name, public_key, proof)
    }

    /// Commit pending payloads with an already solved `proof` for the current tip
    pub fn commit_block(&mut self, name: &str, public_key: &str, proof: u64) -> Result<Block> {
        let last_block = self.last_block();
        let (last_id, last_hash) = (last_block.get_id(), last_block.hash()?);
        if !valid_proof(last_block.get_proof(), proof) {
            return Err(ChainError::Mining(format!(
                "proof {proof} does not solve tip {last_id}"
            )));
        }

        let block = Block::new_block(
            last_id + 1,
            name,
            std::mem::take(&mut self.pending),
            proof,
            last_hash,
            public_key,
        )?;

        self.store.save(&block)?;
        self.chain.push(block.clone());
        info!(
            "Minted block {} ({}) with {} transactions, proof {}",
            block.get_id(),
            block.get_name(),
            block.get_data().len(),
            block.get_proof()
        );
        Ok(block)
    }

    /// Walk `chain` checking id density, hash links and proofs.
    ///
    /// Empty and single-block chains are vacuously valid.
    pub fn valid_chain(chain: &[Block]) -> bool {
        for pair in chain.windows(2) {
            let (prior, current) = (&pair[0], &pair[1]);
            if current.get_id() != prior.get_id() + 1 {
                return false;
            }
            match prior.hash() {
                Ok(hash) if hash == current.get_previous_hash() => {}
                _ => return false,
            }
            if !valid_proof(prior.get_proof(), current.get_proof()) {
                return false;
            }
        }
        true
    }

    /// Append a block received from a peer if it extends the local tip.
    ///
    /// Returns `Ok(false)` when the block does not fit; those are left for
    /// the next conflict-resolution pass.
    pub fn accept_block(&mut self, block: Block) -> Result<bool> {
        let last_block = self.last_block();
        if block.get_id() != last_block.get_id() + 1 {
            return Ok(false);
        }
        if block.get_previous_hash() != last_block.hash()? {
            return Ok(false);
        }
        if !valid_proof(last_block.get_proof(), block.get_proof()) {
            return Ok(false);
        }

        self.store.save(&block)?;
        info!("Accepted pushed block {}", block.get_id());
        self.chain.push(block);
        Ok(true)
    }

    /// Replace the whole chain with `candidate` when it is strictly longer and valid.
    ///
    /// Every candidate block is written to the store before the swap.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<bool> {
        if candidate.len() <= self.chain.len() {
            return Ok(false);
        }
        match candidate.first() {
            Some(first) if first.is_genesis() => {}
            _ => {
                return Err(ChainError::InvalidBlock(
                    "candidate chain does not start with a genesis block".to_string(),
                ))
            }
        }
        if !Self::valid_chain(&candidate) {
            return Err(ChainError::InvalidBlock(
                "candidate chain failed validation".to_string(),
            ));
        }

        for block in &candidate {
            self.store.save(block)?;
        }
        info!(
            "Replaced chain of {} blocks with chain of {} blocks",
            self.chain.len(),
            candidate.len()
        );
        self.chain = candidate;
        Ok(true)
    }

    /// Payloads of every block labeled `name`, in chain order
    pub fn records(&self, name: &str) -> Vec<Record> {
        self.chain
            .iter()
            .filter(|block| block.get_name() == name)
            .flat_map(|block| {
                block.get_data().iter().map(|payload| Record {
                    block_id: block.get_id(),
                    timestamp: block.get_timestamp(),
                    payload: payload.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
    use crate::testnet::{create_test_ledger, test_identity};
    use serde_json::json;

    #[test]
    fn test_fresh_ledger_has_genesis_only() {
        let (ledger, _temp_dir) = create_test_ledger().unwrap();
        assert_eq!(ledger.len(), 1);

        let genesis = ledger.last_block();
        assert_eq!(genesis.get_previous_hash(), GENESIS_PREVIOUS_HASH);
        assert_eq!(genesis.get_proof(), GENESIS_PROOF);
        assert!(Ledger::valid_chain(ledger.chain()));
        assert_eq!(ledger.store().load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_does_not_create_second_genesis() {
        let (ledger, temp_dir) = create_test_ledger().unwrap();
        let genesis_hash = ledger.last_block().hash().unwrap();
        let store = ledger.store().clone();
        drop(ledger);

        let reopened = Ledger::open(store).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.last_block().hash().unwrap(), genesis_hash);
        drop(temp_dir);
    }

    #[test]
    fn test_node_identifier_is_random() {
        let (first, _a) = create_test_ledger().unwrap();
        let (second, _b) = create_test_ledger().unwrap();
        assert_eq!(first.node_identifier().len(), 32);
        assert_ne!(first.node_identifier(), second.node_identifier());
    }

    #[test]
    fn test_valid_signature_is_buffered() {
        let (mut ledger, _temp_dir) = create_test_ledger().unwrap();
        let identity = test_identity();
        let payload = Payload::new(&json!({"k": "v"})).unwrap();
        let signature = identity.sign(&payload).unwrap();

        let next_id = ledger.new_transaction(payload.clone(), &signature, identity.public_key());
        assert_eq!(next_id, Some(2));
        assert_eq!(ledger.pending(), &[payload]);
    }

    #[test]
    fn test_invalid_signature_is_dropped() {
        let (mut ledger, _temp_dir) = create_test_ledger().unwrap();
        let identity = test_identity();
        let payload = Payload::new(&json!({"k": "v"})).unwrap();
        let other = Payload::new(&json!({"k": "x"})).unwrap();
        let signature = identity.sign(&other).unwrap();

        assert_eq!(ledger.new_transaction(payload, &signature, identity.public_key()), None);
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn test_mint_block_links_and_clears_pending() {
        let (mut ledger, _temp_dir) = create_test_ledger().unwrap();
        let identity = test_identity();
        let payload = Payload::new(&json!({"k": "v"})).unwrap();
        let signature = identity.sign(&payload).unwrap();
        ledger.new_transaction(payload.clone(), &signature, identity.public_key());

        let genesis_hash = ledger.last_block().hash().unwrap();
        let block = ledger.mint_block("row", identity.public_pem()).unwrap();

        assert_eq!(block.get_id(), 2);
        assert_eq!(block.get_name(), "row");
        assert_eq!(block.get_data(), &[payload]);
        assert_eq!(block.get_previous_hash(), genesis_hash);
        assert_eq!(block.get_signer_public_key(), identity.public_pem());
        assert!(valid_proof(GENESIS_PROOF, block.get_proof()));
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.store().load(2).unwrap(), Some(block));
    }

    #[test]
    fn test_mint_with_empty_pending_makes_empty_block() {
        let (mut ledger, _temp_dir) = create_test_ledger().unwrap();
        let block = ledger.mint_block("empty", "").unwrap();
        assert!(block.get_data().is_empty());
    }

    #[test]
    fn test_commit_rejects_wrong_proof() {
        let (mut ledger, _temp_dir) = create_test_ledger().unwrap();
        let bad_proof = (0..).find(|p| !valid_proof(GENESIS_PROOF, *p)).unwrap();
        assert!(matches!(
            ledger.commit_block("row", "", bad_proof),
            Err(ChainError::Mining(_))
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_minted_chain_is_valid() {
        let (mut ledger, _temp_dir) = create_test_ledger().unwrap();
        for _ in 0..3 {
            ledger.mint_block("row", "").unwrap();
        }
        assert_eq!(ledger.len(), 4);
        assert!(Ledger::valid_chain(ledger.chain()));
    }

    #[test]
    fn test_tampered_previous_hash_is_invalid() {
        let (mut ledger, _temp_dir) = create_test_ledger().unwrap();
        ledger.mint_block("row", "").unwrap();
        ledger.mint_block("row", "").unwrap();

        let mut chain = ledger.chain().to_vec();
        chain[2] = chain[2].with_previous_hash("0000deadbeef");
        assert!(!Ledger::valid_chain(&chain));
    }

    #[test]
    fn test_empty_and_single_chains_are_valid() {
        let genesis = Block::generate_genesis_block().unwrap();
        assert!(Ledger::valid_chain(&[]));
        assert!(Ledger::valid_chain(&[genesis]));
    }

    #[test]
    fn test_accept_block_extending_tip() {
        let (mut source, _a) = create_test_ledger().unwrap();
        let (mut target, _b) = create_test_ledger().unwrap();
        // same genesis on both sides
        target.chain = source.chain().to_vec();

        let block = source.mint_block("row", "").unwrap();
        assert!(target.accept_block(block.clone()).unwrap());
        assert_eq!(target.last_block(), &block);
        assert_eq!(target.store().load(2).unwrap(), Some(block));
    }

    #[test]
    fn test_accept_block_rejects_gap_and_bad_link() {
        let (mut source, _a) = create_test_ledger().unwrap();
        let (mut target, _b) = create_test_ledger().unwrap();

        // different genesis, so the link check fails
        let block = source.mint_block("row", "").unwrap();
        assert!(!target.accept_block(block).unwrap());

        let gap = source.mint_block("row", "").unwrap();
        assert!(!target.accept_block(gap).unwrap());
        assert_eq!(target.len(), 1);
    }

    #[test]
    fn test_accept_block_rejects_unsolved_proof() {
        let (mut ledger, _temp_dir) = create_test_ledger().unwrap();
        let genesis_hash = ledger.last_block().hash().unwrap();
        let bad_proof = (0..).find(|p| !valid_proof(GENESIS_PROOF, *p)).unwrap();
        let block = Block::new_block(2, "row", vec![], bad_proof, genesis_hash, "").unwrap();

        assert!(!ledger.accept_block(block).unwrap());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.store().load(2).unwrap(), None);
    }

    #[test]
    fn test_replace_chain_requires_strictly_longer() {
        let (mut source, _a) = create_test_ledger().unwrap();
        let (mut target, _b) = create_test_ledger().unwrap();
        source.mint_block("row", "").unwrap();
        target.mint_block("row", "").unwrap();

        assert!(!target.replace_chain(source.chain().to_vec()).unwrap());

        source.mint_block("row", "").unwrap();
        assert!(target.replace_chain(source.chain().to_vec()).unwrap());
        assert_eq!(target.chain(), source.chain());
        assert_eq!(target.store().load_all().unwrap(), source.chain().to_vec());
    }

    #[test]
    fn test_replace_chain_rejects_invalid_candidate() {
        let (mut source, _a) = create_test_ledger().unwrap();
        let (mut target, _b) = create_test_ledger().unwrap();
        source.mint_block("row", "").unwrap();
        source.mint_block("row", "").unwrap();

        let mut candidate = source.chain().to_vec();
        candidate[1] = candidate[1].with_previous_hash("broken");
        assert!(target.replace_chain(candidate).is_err());
        assert_eq!(target.len(), 1);
    }

    #[test]
    fn test_records_flatten_labeled_blocks() {
        let (mut ledger, _temp_dir) = create_test_ledger().unwrap();
        let identity = test_identity();
        for value in ["a", "b"] {
            let payload = Payload::new(&json!({ "v": value })).unwrap();
            let signature = identity.sign(&payload).unwrap();
            ledger.new_transaction(payload, &signature, identity.public_key());
        }
        ledger.mint_block("row", identity.public_pem()).unwrap();
        ledger.mint_block("other", identity.public_pem()).unwrap();

        let records = ledger.records("row");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.block_id == 2));
        assert_eq!(records[1].payload.as_json(), r#"{"v":"b"}"#);
        assert!(ledger.records("missing").is_empty());
    }
}
