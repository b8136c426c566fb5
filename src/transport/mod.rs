//! Byte transport between the session worker and the physics server

mod buffer;
#[cfg(feature = "debug-tools")]
mod debug;
mod error;
mod socket;

use std::time::Duration;

pub use buffer::FrameAssembler;
#[cfg(feature = "debug-tools")]
pub use debug::{CAPTURE_MAGIC, CaptureDirection, FrameRecorder};
pub use error::TransportError;
pub use socket::TcpTransport;

/// Connection-oriented byte stream used by the session worker.
///
/// Implementations block: `send` writes the whole buffer, `read` waits for
/// at most one chunk of data.
pub trait Transport: Send {
    /// Open the connection, giving up after `timeout`.
    fn connect(&mut self, timeout: Duration) -> Result<(), TransportError>;

    /// Write all of `bytes`.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read up to `max_bytes`.
    ///
    /// Returns `Ok(None)` when the read timed out without data and
    /// `Err(TransportError::Closed)` once the peer has closed the stream.
    fn read(&mut self, max_bytes: usize) -> Result<Option<Vec<u8>>, TransportError>;

    /// Whether a connection is currently open.
    fn is_connected(&self) -> bool;

    /// Close the connection, if any.
    fn close(&mut self);
}
