use crate::{Error, Result};
use std::collections::BTreeSet;
use url::Url;

/// Reduces a peer address to `scheme://host[:port]`.
///
/// Accepts `host:port` as well as full URLs; a missing scheme means `http`.
/// Path, query and fragment are dropped, the host is lowercased and a
/// default port is elided, so equivalent spellings compare equal.
pub fn normalize_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    let invalid = |reason: &str| Error::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid("empty address"));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Known peers, stored normalized. Iteration order is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerSet {
    peers: BTreeSet<String>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the address was new.
    pub fn register(&mut self, address: &str) -> Result<bool> {
        Ok(self.peers.insert(normalize_address(address)?))
    }

    /// Validates the whole batch before inserting any of it.
    pub fn register_all<'a>(
        &mut self,
        addresses: impl IntoIterator<Item = &'a str>,
    ) -> Result<usize> {
        let normalized = addresses
            .into_iter()
            .map(normalize_address)
            .collect::<Result<Vec<_>>>()?;
        Ok(normalized
            .into_iter()
            .filter(|peer| self.peers.insert(peer.clone()))
            .count())
    }

    pub fn contains(&self, address: &str) -> bool {
        normalize_address(address).is_ok_and(|peer| self.peers.contains(&peer))
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }
}
