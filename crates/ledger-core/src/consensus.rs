//! Longest-valid-chain conflict resolution.
//!
//! Peers are polled through a [`ChainFetcher`], every candidate longer than
//! the local chain is validated, and the longest valid one wins. Ties keep
//! the local chain. Length alone decides; accumulated work is not weighed.

use crate::constants::DEFAULT_FETCH_CONCURRENCY;
use crate::validate::{verify_chain, ChainFault};
use crate::{Block, Error, Ledger, Result};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};

/// What a peer's chain endpoint returns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl ChainResponse {
    pub fn from_chain(chain: Vec<Block>) -> Self {
        Self {
            length: chain.len(),
            chain,
        }
    }
}

/// Transport used to pull a peer's chain. Implementations should report
/// any failure as [`Error::PeerUnreachable`].
pub trait ChainFetcher: Send + Sync {
    fn fetch_chain(&self, peer: &str) -> impl Future<Output = Result<ChainResponse>> + Send;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub replaced: bool,
    pub chain: Vec<Block>,
    /// Peers skipped this round and why.
    pub rejected: Vec<Error>,
}

/// Picks the winner among already fetched candidates, in the order given.
pub fn select_longest(
    local_chain: &[Block],
    candidates: impl IntoIterator<Item = (String, Result<ChainResponse>)>,
) -> Resolution {
    let mut max_length = local_chain.len();
    let mut winner: Option<Vec<Block>> = None;
    let mut rejected = Vec::new();

    for (peer, fetched) in candidates {
        let response = match fetched {
            Ok(response) => response,
            Err(err) => {
                let err = if err.is_peer_fault() {
                    err
                } else {
                    Error::PeerUnreachable {
                        peer: peer.clone(),
                        reason: err.to_string(),
                    }
                };
                warn!("Skipping peer {}: {}", peer, err);
                rejected.push(err);
                continue;
            }
        };

        if response.length <= max_length {
            debug!(
                "Peer {} chain length {} does not beat {}",
                peer, response.length, max_length
            );
            continue;
        }

        let checked = if response.length != response.chain.len() {
            Err(ChainFault::LengthMismatch {
                reported: response.length,
                actual: response.chain.len(),
            })
        } else {
            verify_chain(&response.chain)
        };

        match checked {
            Ok(()) => {
                max_length = response.length;
                winner = Some(response.chain);
            }
            Err(fault) => {
                warn!("Discarding chain from {}: {}", peer, fault);
                rejected.push(Error::InvalidPeerChain { peer, fault });
            }
        }
    }

    match winner {
        Some(chain) => Resolution {
            replaced: true,
            chain,
            rejected,
        },
        None => Resolution {
            replaced: false,
            chain: local_chain.to_vec(),
            rejected,
        },
    }
}

/// Fetches every peer's chain (at most `concurrency` requests in flight,
/// results kept in peer order) and selects the longest valid one. Does not
/// touch any ledger.
pub async fn resolve<F: ChainFetcher>(
    local_chain: &[Block],
    peers: &[String],
    fetcher: &F,
    concurrency: usize,
) -> Resolution {
    let fetched: Vec<(String, Result<ChainResponse>)> = stream::iter(peers.iter().cloned())
        .map(|peer| async move {
            let response = fetcher.fetch_chain(&peer).await;
            (peer, response)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    select_longest(local_chain, fetched)
}

/// Runs [`resolve`] against the ledger's chain and installs the winner. If
/// the ledger grew past the winner while peers were polled, nothing changes.
pub async fn resolve_conflicts<F: ChainFetcher>(
    ledger: &Ledger,
    peers: &[String],
    fetcher: &F,
    concurrency: usize,
) -> Resolution {
    let local = ledger.chain();
    let mut resolution = resolve(&local, peers, fetcher, concurrency).await;

    if resolution.replaced && ledger.adopt_if_longer(resolution.chain.clone()) {
        info!(
            "Replaced local chain of length {} with length {}",
            local.len(),
            resolution.chain.len()
        );
    } else {
        resolution.replaced = false;
        resolution.chain = ledger.chain();
    }
    resolution
}

/// Owns a fetcher and the fan-out limit, for callers that resolve repeatedly.
#[derive(Debug, Clone)]
pub struct Resolver<F> {
    fetcher: F,
    concurrency: usize,
}

impl<F: ChainFetcher> Resolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub async fn resolve(&self, ledger: &Ledger, peers: &[String]) -> Resolution {
        resolve_conflicts(ledger, peers, &self.fetcher, self.concurrency).await
    }
}
