use crate::validate::ChainFault;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("chain has no blocks")]
    EmptyChain,

    #[error("invalid peer address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("peer {peer} sent an invalid chain: {fault}")]
    InvalidPeerChain { peer: String, fault: ChainFault },

    #[error("mining cancelled")]
    Cancelled,

    #[error("chain tip moved while mining on {expected}")]
    StaleTip { expected: String },

    #[error("no valid proof in the u64 nonce space")]
    NonceSpaceExhausted,
}

impl Error {
    /// Errors the resolver absorbs instead of reporting to the caller.
    pub fn is_peer_fault(&self) -> bool {
        matches!(
            self,
            Error::PeerUnreachable { .. } | Error::InvalidPeerChain { .. }
        )
    }
}
