use std::io;

use super::state::{SessionEvent, SessionState};
use crate::protocol;
use crate::transport::TransportError;

/// Errors surfaced by the session client.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `connect` was called before a server address was stored.
    #[error("server address not configured")]
    AddressNotConfigured,
    /// The session worker was already started; sessions are single-use.
    #[error("session already started")]
    AlreadyStarted,
    /// Event not allowed in the current state.
    #[error("invalid transition from {from:?} on {event:?}")]
    InvalidTransition {
        /// State the session was in
        from: SessionState,
        /// Rejected event
        event: SessionEvent,
    },
    /// Encoding or decoding failed.
    #[error(transparent)]
    Protocol(#[from] protocol::Error),
    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The worker thread could not be spawned.
    #[error("failed to spawn session worker: {0}")]
    WorkerSpawn(#[source] io::Error),
}
