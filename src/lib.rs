//! airlink - client link between an airflow simulation frontend and its physics server
//!
//! The crate keeps a remote physics server in sync with locally observed
//! state (room occupancy, air conditioner settings, graph queries) over a
//! persistent TCP connection, and publishes the decoded velocity and
//! temperature fields it streams back.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use airlink::{GridDims, Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.store_address("192.168.1.7");
//! session.initialize(GridDims::cube(32))?;
//!
//! let handle = session.handle();
//! let worker = session.connect()?;
//!
//! handle.update_occupancy(vec![false; 32 * 32 * 32]);
//! handle.mark_installed();
//! handle.set_vent_speed(3);
//!
//! let temperature = handle.temperature();
//! # drop((worker, temperature));
//! # Ok::<(), airlink::SessionError>(())
//! ```
//!
//! # Features
//!
//! - **Length-prefixed binary frames** - big-endian length, little-endian fields
//! - **Compact physics payload** - nibble-packed directions, 16-bit magnitudes
//! - **Non-blocking producers** - changes are queued to a single session worker
//! - **Explicit lifecycle** - `Disconnected → Connecting → Handshaking → Streaming`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod protocol;
pub mod session;
pub mod transport;

pub use protocol::{
    ActuatorSettings, Error, Frame, GridDims, MessageType, PhysicsFields, Result, RoomGeometry,
    metrics_snapshot,
};
pub use session::{Session, SessionConfig, SessionError, SessionHandle, SessionState};
pub use transport::{TcpTransport, Transport, TransportError};

/// Default physics server port
pub const DEFAULT_PORT: u16 = 1235;
