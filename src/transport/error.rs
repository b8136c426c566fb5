//! Transport-level error types covering connect, send and receive failures.

use std::io;
use std::time::Duration;

use crate::protocol;

/// Unified error type for link transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Operation requires an established connection.
    #[error("transport is not connected")]
    NotConnected,
    /// The configured address could not be resolved.
    #[error("cannot resolve address {address}: {source}")]
    AddressResolution {
        /// Address as configured.
        address: String,
        /// Underlying resolver failure.
        #[source]
        source: io::Error,
    },
    /// Connecting did not succeed within the timeout.
    #[error("connect to {address} failed: {source}")]
    Connect {
        /// Address being connected to.
        address: String,
        /// Underlying socket failure.
        #[source]
        source: io::Error,
    },
    /// Peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
    /// No complete frame arrived within the configured receive timeout.
    #[error("no reply within {0:?}")]
    ReceiveTimeout(Duration),
    /// Received bytes do not form a valid frame header.
    #[error("invalid frame: {0}")]
    Frame(#[from] protocol::Error),
    /// Underlying socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
