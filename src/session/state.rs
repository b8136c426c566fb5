//! Connection lifecycle state machine

use std::fmt;

use super::SessionError;
use crate::protocol::MessageType;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection
    #[default]
    Disconnected,
    /// Transport connect in progress
    Connecting,
    /// Exchanging the opening messages for the given purpose
    Handshaking(MessageType),
    /// Steady-state send/receive loop
    Streaming,
}

/// Input to the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Caller asked to connect
    Connect {
        /// Whether a server address is known
        address_configured: bool,
    },
    /// Transport connected; handshake with the given purpose starts
    Connected {
        /// Purpose of the opening exchange
        purpose: MessageType,
    },
    /// Transport connect failed or timed out
    ConnectFailed,
    /// Opening exchange finished
    HandshakeComplete,
    /// Connection lost, stalled or closed
    Closed,
}

impl SessionState {
    /// Apply `event`, returning the next state.
    ///
    /// A finished store-geometry handshake ends the session instead of
    /// streaming. `Closed` is accepted in every state.
    pub fn transition(self, event: SessionEvent) -> Result<Self, SessionError> {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (S::Disconnected, E::Connect { address_configured }) => {
                if address_configured {
                    Ok(S::Connecting)
                } else {
                    Err(SessionError::AddressNotConfigured)
                }
            }
            (S::Connecting, E::Connected { purpose }) => Ok(S::Handshaking(purpose)),
            (S::Connecting, E::ConnectFailed) => Ok(S::Disconnected),
            (S::Handshaking(MessageType::StoreGeometry), E::HandshakeComplete) => {
                Ok(S::Disconnected)
            }
            (S::Handshaking(_), E::HandshakeComplete) => Ok(S::Streaming),
            (_, E::Closed) => Ok(S::Disconnected),
            (from, event) => Err(SessionError::InvalidTransition { from, event }),
        }
    }

    /// Whether a transport connection is expected to be open.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Handshaking(_) | Self::Streaming)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Handshaking(purpose) => write!(f, "handshaking({purpose})"),
            Self::Streaming => f.write_str("streaming"),
        }
    }
}
