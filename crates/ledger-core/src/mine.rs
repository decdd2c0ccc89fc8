use crate::constants::MINE_BATCH_SIZE;
use crate::pow::{valid_proof, CancelToken};
use crate::{Error, Result};
use rayon::prelude::*;
use tracing::{debug, info};

/// Parallel variant of [`crate::pow::mine`]. Candidates are searched in
/// consecutive batches across the rayon pool, so the proof returned is still
/// the smallest valid one. The token is checked between batches.
pub fn mine_parallel(
    previous_proof: u64,
    previous_hash: &str,
    cancel: &CancelToken,
) -> Result<u64> {
    mine_parallel_with_batch(previous_proof, previous_hash, cancel, MINE_BATCH_SIZE)
}

pub fn mine_parallel_with_batch(
    previous_proof: u64,
    previous_hash: &str,
    cancel: &CancelToken,
    batch_size: u64,
) -> Result<u64> {
    let batch_size = batch_size.max(1);
    let mut start = 0u64;
    loop {
        if cancel.is_cancelled() {
            debug!("mining on {previous_hash} cancelled at candidate {start}");
            return Err(Error::Cancelled);
        }

        let end = start.saturating_add(batch_size);
        let found = (start..end)
            .into_par_iter()
            .find_first(|candidate| valid_proof(previous_proof, *candidate, previous_hash));

        if let Some(proof) = found {
            info!(
                "Mined proof {} after previous proof {} (hash {})",
                proof, previous_proof, previous_hash
            );
            return Ok(proof);
        }

        if end == u64::MAX {
            // The half-open batches never reach u64::MAX itself.
            return if valid_proof(previous_proof, u64::MAX, previous_hash) {
                Ok(u64::MAX)
            } else {
                Err(Error::NonceSpaceExhausted)
            };
        }
        start = end;
    }
}
