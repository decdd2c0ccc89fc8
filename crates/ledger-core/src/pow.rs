use crate::constants::{MINE_CHECK_INTERVAL, POW_DIFFICULTY};
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag for a proof search. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub fn proof_digest(previous_proof: u64, proof: u64, previous_hash: &str) -> [u8; 32] {
    let guess = format!("{previous_proof}{proof}{previous_hash}");
    let digest = Sha256::digest(guess.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// True when `sha256("{previous_proof}{proof}{previous_hash}")` starts with
/// `POW_DIFFICULTY` hex zeros.
pub fn valid_proof(previous_proof: u64, proof: u64, previous_hash: &str) -> bool {
    let digest = proof_digest(previous_proof, proof, previous_hash);
    count_leading_zero_bits(&digest) >= POW_DIFFICULTY * 4
}

/// Linear search from 0; returns the smallest proof accepted by [`valid_proof`].
pub fn mine(previous_proof: u64, previous_hash: &str, cancel: &CancelToken) -> Result<u64> {
    let mut candidate = 0u64;
    loop {
        if candidate % MINE_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if valid_proof(previous_proof, candidate, previous_hash) {
            return Ok(candidate);
        }
        candidate = candidate
            .checked_add(1)
            .ok_or(Error::NonceSpaceExhausted)?;
    }
}

pub fn count_leading_zero_bits(hash: &[u8]) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 8;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}
