use crate::consensus::{ChainFetcher, ChainResponse};
use crate::pow::mine;
use crate::{Block, Error, Ledger, Result};
use std::collections::HashMap;

pub(crate) fn mine_next(ledger: &Ledger) -> Block {
    let job = ledger.mining_job().unwrap();
    let proof = mine(job.previous_proof, &job.previous_hash, &job.cancel).unwrap();
    ledger.commit_block(proof, None).unwrap()
}

/// A valid chain of `len` blocks rooted at the shared genesis block.
pub(crate) fn build_chain(len: usize) -> Vec<Block> {
    let ledger = Ledger::new();
    while ledger.len() < len {
        ledger.submit_transaction("0", "miner", 1.0).unwrap();
        mine_next(&ledger);
    }
    ledger.chain()
}

/// Serves canned responses keyed by peer address; unknown peers are unreachable.
#[derive(Default)]
pub(crate) struct MapFetcher {
    responses: HashMap<String, Result<ChainResponse>>,
}

impl MapFetcher {
    pub(crate) fn with_chain(mut self, peer: &str, chain: Vec<Block>) -> Self {
        self.responses
            .insert(peer.to_string(), Ok(ChainResponse::from_chain(chain)));
        self
    }

    pub(crate) fn with_response(mut self, peer: &str, response: ChainResponse) -> Self {
        self.responses.insert(peer.to_string(), Ok(response));
        self
    }
}

impl ChainFetcher for MapFetcher {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse> {
        self.responses.get(peer).cloned().unwrap_or_else(|| {
            Err(Error::PeerUnreachable {
                peer: peer.to_string(),
                reason: "connection refused".to_string(),
            })
        })
    }
}
