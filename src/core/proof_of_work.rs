use crate::error::{ChainError, Result};
use crate::utils::sha256_hex;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Hex prefix a proof hash must start with
pub const DIFFICULTY_PREFIX: &str = "0000";

// Candidates tried between abort checks
const ABORT_CHECK_INTERVAL: u64 = 4096;

/// Checks whether `proof` solves the puzzle posed by `last_proof`
pub fn valid_proof(last_proof: u64, proof: u64) -> bool {
    let guess = format!("{last_proof}{proof}");
    sha256_hex(guess.as_bytes()).starts_with(DIFFICULTY_PREFIX)
}

/// Smallest non-negative proof that satisfies `valid_proof(last_proof, _)`.
///
/// Blocks the calling thread until a solution is found.
pub fn proof_of_work(last_proof: u64) -> u64 {
    let mut proof = 0;
    while !valid_proof(last_proof, proof) {
        proof += 1;
    }
    proof
}

/// Same search as [`proof_of_work`], giving up once `abort` fires
pub fn proof_of_work_until(last_proof: u64, abort: &MiningAbort) -> Result<u64> {
    let mut proof: u64 = 0;
    loop {
        if proof % ABORT_CHECK_INTERVAL == 0 && abort.is_aborted() {
            debug!("Proof-of-work on {last_proof} aborted after {proof} candidates");
            return Err(ChainError::Mining(format!(
                "proof-of-work aborted after {proof} candidates"
            )));
        }
        if valid_proof(last_proof, proof) {
            return Ok(proof);
        }
        proof = proof
            .checked_add(1)
            .ok_or_else(|| ChainError::Mining("proof space exhausted".to_string()))?;
    }
}

/// Cancellation handle for a running proof-of-work search.
///
/// Clones share the same flag, so one can be handed to another thread
/// and cancelled from there.
#[derive(Debug, Clone, Default)]
pub struct MiningAbort {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl MiningAbort {
    /// An abort that only fires when cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// An abort that also fires once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_of_work_result_is_valid() {
        let proof = proof_of_work(100);
        assert!(valid_proof(100, proof));
    }

    #[test]
    fn test_proof_of_work_is_minimal() {
        let last_proof = 35293;
        let proof = proof_of_work(last_proof);
        assert!((0..proof).all(|candidate| !valid_proof(last_proof, candidate)));
    }

    #[test]
    fn test_valid_proof_checks_prefix() {
        let proof = proof_of_work(7);
        let guess = format!("7{proof}");
        assert!(sha256_hex(guess.as_bytes()).starts_with("0000"));
    }

    #[test]
    fn test_abortable_search_matches_unbounded_search() {
        let abort = MiningAbort::new();
        assert_eq!(proof_of_work_until(100, &abort).unwrap(), proof_of_work(100));
    }

    #[test]
    fn test_cancelled_search_returns_mining_error() {
        let abort = MiningAbort::new();
        abort.clone().cancel();
        let result = proof_of_work_until(100, &abort);
        assert!(matches!(result, Err(ChainError::Mining(_))));
    }

    #[test]
    fn test_expired_deadline_aborts() {
        let abort = MiningAbort::with_timeout(Duration::from_millis(0));
        assert!(abort.is_aborted());
        assert!(proof_of_work_until(1, &abort).is_err());
    }
}
