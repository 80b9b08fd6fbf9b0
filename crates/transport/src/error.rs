//! Transport errors

use contracts::ContractError;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors raised by transport lifecycle operations
///
/// Sending and receiving never fail; only binding the socket does.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Receive socket could not be bound
    #[error("failed to bind UDP socket at {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl TransportError {
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }
}
