//! Length-prefixed frame codec
//!
//! # Wire Format
//!
//! ```text
//! +----------------+---------+----------------------------------+
//! | Body length    | Tag     | Body fields                      |
//! | u32 big-endian | 1 byte  | little-endian, kind-specific     |
//! +----------------+---------+----------------------------------+
//! ```
//!
//! The header is the only big-endian field on the wire. Every scalar pushed
//! into the body is little-endian. The header is re-stamped after every
//! write, so the buffer is always a complete, self-describing frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Error, HEADER_SIZE, MAX_BODY_LEN, MessageType, Result};

/// One protocol frame: header plus body, with a read/write cursor.
///
/// Writes append to the end of the body. Reads advance the cursor from the
/// start of the body and fail with [`Error::Truncated`] instead of running past
/// the declared body length.
#[derive(Debug, Clone)]
pub struct Frame {
    buf: BytesMut,
    position: usize,
    body_len: usize,
}

impl Frame {
    /// Create an empty frame
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty frame with room for `body` bytes
    #[must_use]
    pub fn with_capacity(body: usize) -> Self {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body);
        buf.put_bytes(0, HEADER_SIZE);
        Self {
            buf,
            position: HEADER_SIZE,
            body_len: 0,
        }
    }

    /// Create a frame whose body starts with `msg_type`'s tag
    #[must_use]
    pub fn tagged(msg_type: MessageType, body: usize) -> Self {
        let mut frame = Self::with_capacity(1 + body);
        frame.push_u8(msg_type.as_u8());
        frame
    }

    /// Wrap a received buffer and decode its length header
    ///
    /// Bytes beyond the declared body are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let body_len = decode_body_len(bytes)?;
        let available = bytes.len() - HEADER_SIZE;
        if available < body_len {
            return Err(Error::Truncated {
                needed: body_len,
                remaining: available,
            });
        }

        Ok(Self {
            buf: BytesMut::from(&bytes[..HEADER_SIZE + body_len]),
            position: HEADER_SIZE,
            body_len,
        })
    }

    /// Declared body length
    #[must_use]
    pub const fn body_len(&self) -> usize {
        self.body_len
    }

    /// Header plus body length
    #[must_use]
    pub const fn total_len(&self) -> usize {
        HEADER_SIZE + self.body_len
    }

    /// Cursor offset from the start of the frame (header included)
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Body bytes not yet consumed by reads
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total_len().saturating_sub(self.position)
    }

    /// Check whether the body is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.body_len == 0
    }

    /// Body bytes (tag included)
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.buf[HEADER_SIZE..self.total_len()]
    }

    /// Complete frame bytes, ready for the wire
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.total_len()]
    }

    /// Consume the frame into wire bytes
    #[must_use]
    pub fn into_bytes(mut self) -> Bytes {
        self.buf.truncate(self.total_len());
        self.buf.freeze()
    }

    /// Tag byte of the body, without moving the cursor
    #[must_use]
    pub fn tag(&self) -> Option<u8> {
        self.body().first().copied()
    }

    fn record_body_len(&mut self) {
        let len = u32::try_from(self.body_len).unwrap_or(u32::MAX);
        self.buf[..HEADER_SIZE].copy_from_slice(&len.to_be_bytes());
    }

    fn wrote(&mut self, size: usize) {
        self.body_len += size;
        self.position = self.buf.len();
        self.record_body_len();
    }

    fn read(&mut self, size: usize) -> Result<&[u8]> {
        let remaining = self.remaining();
        if size > remaining {
            return Err(Error::Truncated {
                needed: size,
                remaining,
            });
        }
        let start = self.position;
        self.position += size;
        Ok(&self.buf[start..start + size])
    }

    /// Append a single byte
    pub fn push_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
        self.wrote(1);
    }

    /// Append a bool as 0x01 / 0x00
    pub fn push_bool(&mut self, value: bool) {
        self.push_u8(u8::from(value));
    }

    /// Append a little-endian u16
    pub fn push_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
        self.wrote(2);
    }

    /// Append a little-endian i32
    pub fn push_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
        self.wrote(4);
    }

    /// Append a little-endian u32
    pub fn push_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
        self.wrote(4);
    }

    /// Append a little-endian i64
    pub fn push_i64(&mut self, value: i64) {
        self.buf.put_i64_le(value);
        self.wrote(8);
    }

    /// Append a little-endian IEEE-754 f32
    pub fn push_f32(&mut self, value: f32) {
        self.buf.put_f32_le(value);
        self.wrote(4);
    }

    /// Append raw bytes; the reader must know the size out of band
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
        self.wrote(data.len());
    }

    /// Append an i64 length prefix followed by the bytes
    pub fn push_byte_array(&mut self, data: &[u8]) {
        self.push_i64(i64::try_from(data.len()).unwrap_or(i64::MAX));
        self.push_bytes(data);
    }

    /// Read a single byte
    pub fn pop_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    /// Read a bool; any non-zero byte is true
    pub fn pop_bool(&mut self) -> Result<bool> {
        Ok(self.pop_u8()? != 0x00)
    }

    /// Read a little-endian u16
    pub fn pop_u16(&mut self) -> Result<u16> {
        let mut bytes = self.read(2)?;
        Ok(bytes.get_u16_le())
    }

    /// Read a little-endian i32
    pub fn pop_i32(&mut self) -> Result<i32> {
        let mut bytes = self.read(4)?;
        Ok(bytes.get_i32_le())
    }

    /// Read a little-endian u32
    pub fn pop_u32(&mut self) -> Result<u32> {
        let mut bytes = self.read(4)?;
        Ok(bytes.get_u32_le())
    }

    /// Read a little-endian i64
    pub fn pop_i64(&mut self) -> Result<i64> {
        let mut bytes = self.read(8)?;
        Ok(bytes.get_i64_le())
    }

    /// Read a little-endian f32
    pub fn pop_f32(&mut self) -> Result<f32> {
        let mut bytes = self.read(4)?;
        Ok(bytes.get_f32_le())
    }

    /// Read `size` raw bytes
    pub fn pop_bytes(&mut self, size: usize) -> Result<&[u8]> {
        self.read(size)
    }

    /// Read an i64 length prefix and that many bytes
    pub fn pop_byte_array(&mut self) -> Result<&[u8]> {
        let len = self.pop_i64()?;
        let size = usize::try_from(len).map_err(|_| Error::ValueOutOfRange {
            field: "byte array length",
            value: len,
        })?;
        self.read(size)
    }

    /// Read the tag byte and resolve it in the message type table
    pub fn pop_tag(&mut self) -> Result<MessageType> {
        if self.is_empty() {
            return Err(Error::EmptyBody);
        }
        let tag = self.pop_u8()?;
        MessageType::from_u8(tag).ok_or(Error::UnknownMessageType { tag })
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode the big-endian body length from the first four bytes of `bytes`
pub fn decode_body_len(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::InvalidHeader {
            needed: HEADER_SIZE,
            got: bytes.len(),
        });
    }
    let mut header = &bytes[..HEADER_SIZE];
    let body_len = header.get_u32() as usize;
    if body_len > MAX_BODY_LEN {
        return Err(Error::FrameTooLarge {
            size: body_len,
            max: MAX_BODY_LEN,
        });
    }
    Ok(body_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_frame_is_header_only() {
        let frame = Frame::new();
        assert_eq!(frame.as_bytes(), &[0, 0, 0, 0]);
        assert_eq!(frame.position(), HEADER_SIZE);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_header_is_big_endian_body_little_endian() {
        let mut frame = Frame::new();
        frame.push_u16(0x0102);
        frame.push_u32(0x0A0B_0C0D);

        assert_eq!(frame.body_len(), 6);
        assert_eq!(
            frame.as_bytes(),
            &[0, 0, 0, 6, 0x02, 0x01, 0x0D, 0x0C, 0x0B, 0x0A]
        );
    }

    #[test]
    fn test_header_restamped_past_one_byte() {
        let mut frame = Frame::new();
        frame.push_bytes(&[0xAB; 300]);
        assert_eq!(&frame.as_bytes()[..4], &[0, 0, 0x01, 0x2C]);
        assert_eq!(frame.total_len(), 304);
    }

    #[test]
    fn test_tagged_frame() {
        let frame = Frame::tagged(MessageType::RequestGraph, 6);
        assert_eq!(frame.tag(), Some(0x18));
        assert_eq!(frame.body_len(), 1);
    }

    #[test]
    fn test_scalar_roundtrip() {
        let mut frame = Frame::new();
        frame.push_u8(0xFE);
        frame.push_bool(true);
        frame.push_bool(false);
        frame.push_u16(65_000);
        frame.push_i32(-123_456);
        frame.push_u32(4_000_000_000);
        frame.push_i64(-9_000_000_000);
        frame.push_f32(-1.25);

        let mut decoded = Frame::from_bytes(frame.as_bytes()).unwrap();
        assert_eq!(decoded.body_len(), 1 + 1 + 1 + 2 + 4 + 4 + 8 + 4);
        assert_eq!(decoded.pop_u8().unwrap(), 0xFE);
        assert!(decoded.pop_bool().unwrap());
        assert!(!decoded.pop_bool().unwrap());
        assert_eq!(decoded.pop_u16().unwrap(), 65_000);
        assert_eq!(decoded.pop_i32().unwrap(), -123_456);
        assert_eq!(decoded.pop_u32().unwrap(), 4_000_000_000);
        assert_eq!(decoded.pop_i64().unwrap(), -9_000_000_000);
        assert_eq!(decoded.pop_f32().unwrap(), -1.25);
        assert_eq!(decoded.remaining(), 0);
    }

    #[test]
    fn test_byte_array_with_length_prefix() {
        let mut frame = Frame::new();
        frame.push_byte_array(b"occupancy");
        assert_eq!(frame.body_len(), 8 + 9);
        assert_eq!(&frame.body()[..8], &9_i64.to_le_bytes());

        let mut decoded = Frame::from_bytes(frame.as_bytes()).unwrap();
        assert_eq!(decoded.pop_byte_array().unwrap(), b"occupancy");
    }

    #[test]
    fn test_negative_byte_array_length_rejected() {
        let mut frame = Frame::new();
        frame.push_i64(-4);
        let mut decoded = Frame::from_bytes(frame.as_bytes()).unwrap();
        assert!(matches!(
            decoded.pop_byte_array(),
            Err(Error::ValueOutOfRange { value: -4, .. })
        ));
    }

    #[test]
    fn test_read_past_body_is_truncated() {
        let mut frame = Frame::new();
        frame.push_u16(7);
        let mut decoded = Frame::from_bytes(frame.as_bytes()).unwrap();
        assert_eq!(
            decoded.pop_u32(),
            Err(Error::Truncated {
                needed: 4,
                remaining: 2
            })
        );
        // A failed read leaves the cursor untouched.
        assert_eq!(decoded.pop_u16().unwrap(), 7);
    }

    #[test]
    fn test_from_bytes_ignores_trailing_bytes() {
        let mut frame = Frame::new();
        frame.push_u8(1);
        let mut wire = frame.as_bytes().to_vec();
        wire.extend_from_slice(&[9, 9, 9]);

        let decoded = Frame::from_bytes(&wire).unwrap();
        assert_eq!(decoded.body(), &[1]);
    }

    #[test]
    fn test_from_bytes_short_header() {
        assert!(matches!(
            Frame::from_bytes(&[0, 0]),
            Err(Error::InvalidHeader { got: 2, .. })
        ));
    }

    #[test]
    fn test_from_bytes_short_body() {
        let result = Frame::from_bytes(&[0, 0, 0, 5, 1, 2]);
        assert_eq!(
            result.unwrap_err(),
            Error::Truncated {
                needed: 5,
                remaining: 2
            }
        );
    }

    #[test]
    fn test_oversized_header_rejected() {
        let len = u32::try_from(MAX_BODY_LEN + 1).unwrap();
        let result = decode_body_len(&len.to_be_bytes());
        assert!(matches!(result, Err(Error::FrameTooLarge { .. })));
    }

    #[test]
    fn test_pop_tag() {
        let mut frame = Frame::tagged(MessageType::ProvideActuatorInfo, 0);
        frame.push_u8(0x00);
        let mut decoded = Frame::from_bytes(frame.as_bytes()).unwrap();
        assert_eq!(decoded.pop_tag().unwrap(), MessageType::ProvideActuatorInfo);

        let mut written = Frame::new();
        written.push_u8(0x42);
        let mut unknown = Frame::from_bytes(written.as_bytes()).unwrap();
        assert_eq!(
            unknown.pop_tag().unwrap_err(),
            Error::UnknownMessageType { tag: 0x42 }
        );

        assert_eq!(Frame::new().pop_tag().unwrap_err(), Error::EmptyBody);
    }

    // Property-based tests
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Scalar {
            U8(u8),
            Bool(bool),
            U16(u16),
            I32(i32),
            U32(u32),
            I64(i64),
            F32(f32),
        }

        impl Scalar {
            const fn width(&self) -> usize {
                match self {
                    Self::U8(_) | Self::Bool(_) => 1,
                    Self::U16(_) => 2,
                    Self::I32(_) | Self::U32(_) | Self::F32(_) => 4,
                    Self::I64(_) => 8,
                }
            }
        }

        fn scalar_strategy() -> impl Strategy<Value = Scalar> {
            prop_oneof![
                any::<u8>().prop_map(Scalar::U8),
                any::<bool>().prop_map(Scalar::Bool),
                any::<u16>().prop_map(Scalar::U16),
                any::<i32>().prop_map(Scalar::I32),
                any::<u32>().prop_map(Scalar::U32),
                any::<i64>().prop_map(Scalar::I64),
                proptest::num::f32::NORMAL.prop_map(Scalar::F32),
            ]
        }

        proptest! {
            /// Property: any sequence of scalars reads back in order
            #[test]
            fn prop_scalars_roundtrip(values in prop::collection::vec(scalar_strategy(), 0..64)) {
                let mut frame = Frame::new();
                for value in &values {
                    match *value {
                        Scalar::U8(v) => frame.push_u8(v),
                        Scalar::Bool(v) => frame.push_bool(v),
                        Scalar::U16(v) => frame.push_u16(v),
                        Scalar::I32(v) => frame.push_i32(v),
                        Scalar::U32(v) => frame.push_u32(v),
                        Scalar::I64(v) => frame.push_i64(v),
                        Scalar::F32(v) => frame.push_f32(v),
                    }
                }

                let mut decoded = Frame::from_bytes(frame.as_bytes()).unwrap();
                for value in &values {
                    match *value {
                        Scalar::U8(v) => prop_assert_eq!(decoded.pop_u8().unwrap(), v),
                        Scalar::Bool(v) => prop_assert_eq!(decoded.pop_bool().unwrap(), v),
                        Scalar::U16(v) => prop_assert_eq!(decoded.pop_u16().unwrap(), v),
                        Scalar::I32(v) => prop_assert_eq!(decoded.pop_i32().unwrap(), v),
                        Scalar::U32(v) => prop_assert_eq!(decoded.pop_u32().unwrap(), v),
                        Scalar::I64(v) => prop_assert_eq!(decoded.pop_i64().unwrap(), v),
                        Scalar::F32(v) => prop_assert_eq!(decoded.pop_f32().unwrap(), v),
                    }
                }
                prop_assert_eq!(decoded.remaining(), 0);
            }

            /// Property: after writing N body bytes the header decodes to N
            #[test]
            fn prop_header_tracks_body_len(values in prop::collection::vec(scalar_strategy(), 0..64)) {
                let mut frame = Frame::new();
                let mut written = 0usize;
                for value in &values {
                    written += value.width();
                    match *value {
                        Scalar::U8(v) => frame.push_u8(v),
                        Scalar::Bool(v) => frame.push_bool(v),
                        Scalar::U16(v) => frame.push_u16(v),
                        Scalar::I32(v) => frame.push_i32(v),
                        Scalar::U32(v) => frame.push_u32(v),
                        Scalar::I64(v) => frame.push_i64(v),
                        Scalar::F32(v) => frame.push_f32(v),
                    }
                    let header: [u8; 4] = frame.as_bytes()[..4].try_into().unwrap();
                    prop_assert_eq!(u32::from_be_bytes(header) as usize, written);
                }
                prop_assert_eq!(frame.total_len(), written + HEADER_SIZE);
            }
        }
    }
}
