use crate::constants::CHAIN_PATH;
use ledger_core::{ChainFetcher, ChainResponse, Error, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Pulls `GET {peer}/chain` over HTTP. Anything but a 200 carrying a
/// decodable chain counts as the peer being unreachable.
#[derive(Clone, Debug)]
pub(crate) struct HttpChainFetcher {
    client: Client,
}

impl HttpChainFetcher {
    pub(crate) fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl ChainFetcher for HttpChainFetcher {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse> {
        let unreachable = |reason: String| Error::PeerUnreachable {
            peer: peer.to_string(),
            reason,
        };
        let url = format!("{peer}{CHAIN_PATH}");
        debug!("fetching chain from {url}");

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        if res.status() != StatusCode::OK {
            return Err(unreachable(format!("status {}", res.status())));
        }
        let body: ChainResponse = res
            .json()
            .await
            .map_err(|e| unreachable(format!("undecodable chain: {e}")))?;
        debug!("peer {peer} reports length {}", body.length);
        Ok(body)
    }
}
