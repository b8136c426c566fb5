//! Receive-side frame assembly.

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::protocol::{Frame, HEADER_SIZE, Result, decode_body_len};

/// Accumulates stream bytes until a complete frame is available.
///
/// The body length is decoded as soon as four bytes have arrived; the frame
/// is complete once `length + 4` bytes are buffered. Bytes past the end of a
/// frame are kept for the next one.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: BytesMut,
    expected: Option<usize>,
}

impl FrameAssembler {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Total size of the frame being assembled, once the header has arrived.
    pub fn expected_len(&mut self) -> Result<Option<usize>> {
        if self.expected.is_none() && self.buf.len() >= HEADER_SIZE {
            let body_len = decode_body_len(&self.buf)?;
            trace!(body_len, "frame header decoded");
            self.expected = Some(HEADER_SIZE + body_len);
        }
        Ok(self.expected)
    }

    /// Take the next complete frame, if all of its bytes have arrived.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(total) = self.expected_len()? else {
            return Ok(None);
        };
        if self.buf.len() < total {
            return Ok(None);
        }

        let frame = Frame::from_bytes(&self.buf[..total])?;
        self.buf.advance(total);
        self.expected = None;
        Ok(Some(frame))
    }

    /// Drop all buffered bytes.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.expected = None;
    }
}
