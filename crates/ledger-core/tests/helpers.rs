#![allow(dead_code)]

use ledger_core::mine::mine_parallel;
use ledger_core::{Block, ChainFetcher, ChainResponse, Error, Ledger, Result, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Mines one block on `ledger` the way a node does, reward included.
pub fn mine_block(ledger: &Ledger, node_id: &str) -> Block {
    let job = ledger.mining_job().expect("ledger has a tip");
    let proof = mine_parallel(job.previous_proof, &job.previous_hash, &job.cancel)
        .expect("mining was not cancelled");
    ledger
        .commit_mined(&job, proof, Some(Transaction::new("0", node_id, 1.0)))
        .expect("tip did not move")
}

/// In-process network: every node's chain endpoint reads straight from its ledger.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    nodes: Arc<Mutex<HashMap<String, Arc<Ledger>>>>,
    down: Arc<Mutex<HashSet<String>>>,
}

impl LocalNetwork {
    pub fn join(&self, address: &str) -> Arc<Ledger> {
        let ledger = Arc::new(Ledger::new());
        self.nodes
            .lock()
            .unwrap()
            .insert(address.to_string(), Arc::clone(&ledger));
        ledger
    }

    pub fn take_down(&self, address: &str) {
        self.down.lock().unwrap().insert(address.to_string());
    }

    pub fn bring_up(&self, address: &str) {
        self.down.lock().unwrap().remove(address);
    }
}

impl ChainFetcher for LocalNetwork {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse> {
        let unreachable = |reason: &str| Error::PeerUnreachable {
            peer: peer.to_string(),
            reason: reason.to_string(),
        };
        if self.down.lock().unwrap().contains(peer) {
            return Err(unreachable("connection refused"));
        }
        let ledger = self
            .nodes
            .lock()
            .unwrap()
            .get(peer)
            .cloned()
            .ok_or_else(|| unreachable("unknown host"))?;
        Ok(ChainResponse::from_chain(ledger.chain()))
    }
}
