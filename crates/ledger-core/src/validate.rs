use crate::pow::valid_proof;
use crate::Block;
use serde::Serialize;
use thiserror::Error;

/// First problem found while walking a chain. `position` is the offset of the
/// offending block in the slice, not its `index` field.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
pub enum ChainFault {
    #[error("chain is empty")]
    Empty,
    #[error("block at position {position} does not link to its predecessor")]
    BrokenLink { position: usize },
    #[error("block at position {position} carries an invalid proof of work")]
    InvalidProof { position: usize },
    #[error("peer reported length {reported} but sent {actual} blocks")]
    LengthMismatch { reported: usize, actual: usize },
}

/// Walks the chain from the second block on; genesis is taken as given.
/// Stops at the first fault. Pure: no logging, no shared state.
pub fn verify_chain(chain: &[Block]) -> Result<(), ChainFault> {
    if chain.is_empty() {
        return Err(ChainFault::Empty);
    }
    for (position, pair) in chain.windows(2).enumerate() {
        let (prev, curr) = (&pair[0], &pair[1]);
        let prev_hash = prev.hash();
        if curr.previous_hash != prev_hash {
            return Err(ChainFault::BrokenLink {
                position: position + 1,
            });
        }
        if !valid_proof(prev.proof, curr.proof, &prev_hash) {
            return Err(ChainFault::InvalidProof {
                position: position + 1,
            });
        }
    }
    Ok(())
}

pub fn is_valid(chain: &[Block]) -> bool {
    verify_chain(chain).is_ok()
}
