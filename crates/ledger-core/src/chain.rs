use crate::pow::CancelToken;
use crate::{genesis_block, now_timestamp, Block, Error, Result, Transaction};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Snapshot of the tip a proof search runs against.
#[derive(Clone, Debug)]
pub struct MiningJob {
    pub index: u64,
    pub previous_proof: u64,
    pub previous_hash: String,
    pub cancel: CancelToken,
}

#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    /// Token handed to mining jobs started on the current chain.
    cancel: CancelToken,
}

impl LedgerState {
    fn last_block(&self) -> Result<&Block> {
        self.chain.last().ok_or(Error::EmptyChain)
    }

    fn commit(&mut self, proof: u64, previous_hash: Option<String>) -> Result<Block> {
        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => self.last_block()?.hash(),
        };
        let block = Block {
            index: self.chain.len() as u64 + 1,
            timestamp: now_timestamp(),
            // Taken under the same lock as submissions, so nothing slips
            // between the read and the clear.
            transactions: std::mem::take(&mut self.pending),
            proof,
            previous_hash,
        };
        self.chain.push(block.clone());
        Ok(block)
    }

    fn swap_chain(&mut self, new_chain: Vec<Block>) {
        self.chain = new_chain;
        self.cancel.cancel();
        self.cancel = CancelToken::new();
    }
}

/// The node's chain plus its pending pool. Chain, pool and the mining cancel
/// token share one mutex, so a reader always sees a whole chain and a commit
/// always claims exactly the transactions pending at that instant.
#[derive(Debug)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// A ledger holding only the genesis block.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                chain: vec![genesis_block()],
                pending: Vec::new(),
                cancel: CancelToken::new(),
            }),
        }
    }

    pub fn with_chain(chain: Vec<Block>) -> Result<Self> {
        if chain.is_empty() {
            return Err(Error::EmptyChain);
        }
        let ledger = Self::new();
        ledger.lock().chain = chain;
        Ok(ledger)
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // Every mutation leaves the state consistent before it can panic.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a transaction and returns the index of the block that will hold it.
    pub fn submit_transaction(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: f64,
    ) -> Result<u64> {
        self.submit(Transaction::new(sender, recipient, amount))
    }

    pub fn submit(&self, tx: Transaction) -> Result<u64> {
        let mut state = self.lock();
        let next_index = state.last_block()?.index + 1;
        state.pending.push(tx);
        Ok(next_index)
    }

    /// Appends a block holding the whole pending pool. Without an explicit
    /// `previous_hash` the hash of the current last block is used.
    pub fn commit_block(&self, proof: u64, previous_hash: Option<String>) -> Result<Block> {
        let block = self.lock().commit(proof, previous_hash)?;
        info!(
            "Committed block {} with {} transactions",
            block.index,
            block.transactions.len()
        );
        Ok(block)
    }

    pub fn mining_job(&self) -> Result<MiningJob> {
        let state = self.lock();
        let last = state.last_block()?;
        Ok(MiningJob {
            index: state.chain.len() as u64 + 1,
            previous_proof: last.proof,
            previous_hash: last.hash(),
            cancel: state.cancel.clone(),
        })
    }

    /// Commits a proof found for `job`, adding `reward` to the block. Fails
    /// with `StaleTip` when the chain moved on since the job was taken, in
    /// which case the pending pool is left untouched.
    pub fn commit_mined(
        &self,
        job: &MiningJob,
        proof: u64,
        reward: Option<Transaction>,
    ) -> Result<Block> {
        let mut state = self.lock();
        if state.last_block()?.hash() != job.previous_hash {
            warn!("Discarding proof {} mined on stale tip {}", proof, job.previous_hash);
            return Err(Error::StaleTip {
                expected: job.previous_hash.clone(),
            });
        }
        if let Some(reward) = reward {
            state.pending.push(reward);
        }
        let block = state.commit(proof, Some(job.previous_hash.clone()))?;
        info!(
            "Forged block {} (proof {}, {} transactions)",
            block.index,
            block.proof,
            block.transactions.len()
        );
        Ok(block)
    }

    pub fn last_block(&self) -> Result<Block> {
        self.lock().last_block().cloned()
    }

    pub fn chain(&self) -> Vec<Block> {
        self.lock().chain.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().chain.is_empty()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.lock().pending.clone()
    }

    /// Swaps the whole chain and cancels any mining job started on the old one.
    pub fn replace_chain(&self, new_chain: Vec<Block>) -> Result<()> {
        if new_chain.is_empty() {
            return Err(Error::EmptyChain);
        }
        let len = new_chain.len();
        self.lock().swap_chain(new_chain);
        info!("Chain replaced, new length {}", len);
        Ok(())
    }

    /// Swaps in `new_chain` only if it is strictly longer than the chain held
    /// at the moment of the swap.
    pub fn adopt_if_longer(&self, new_chain: Vec<Block>) -> bool {
        let len = new_chain.len();
        let mut state = self.lock();
        if len <= state.chain.len() {
            return false;
        }
        state.swap_chain(new_chain);
        drop(state);
        info!("Adopted longer chain of length {}", len);
        true
    }
}
