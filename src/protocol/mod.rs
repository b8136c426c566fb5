//! Wire protocol between the simulation client and the physics server
//!
//! This module provides the frame codec, the message type table, typed
//! messages and the compact physics payload codec.

mod error;
mod frame;
mod message;
pub(crate) mod metrics;
pub mod physics;
mod types;

pub use error::{Error, Result};
pub use frame::{Frame, decode_body_len};
pub use message::{
    ActuatorSettings, GeometryReply, Inbound, Outbound, VENT_LEVEL_RANGE, VENT_SPEED_RANGE,
};
pub use metrics::MetricsSnapshot;
pub use physics::PhysicsFields;
pub use types::{GridDims, LEGACY_TAG, MessageType, RoomGeometry};

/// Length header size in bytes
pub const HEADER_SIZE: usize = 4;

/// Maximum accepted body length (64 MB)
pub const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

/// Snapshot of the process-wide protocol counters
#[must_use]
pub fn metrics_snapshot() -> MetricsSnapshot {
    metrics::Metrics::totals()
}
