//! Compact physics payload (velocity + temperature field)
//!
//! The reply to a physical-value request carries three sections back to back:
//!
//! ```text
//! [direction: 3 bytes per pair of cells][magnitude: u16 LE per cell][temperature: u8 per cell]
//! ```
//!
//! Each 3-byte direction group holds six 4-bit nibbles, high nibble first:
//! `a.x a.y | a.z b.x | b.y b.z` for the cell pair `(a, b) = (2i, 2i + 1)`.
//! A nibble `n` maps to the direction component `n / 15 * 2 - 1`. With an odd
//! cell count the last cell has no direction group and decodes to zero velocity.

use super::{Error, Frame, Result};

/// Largest nibble value
pub const NIBBLE_MAX: f32 = 15.0;
/// Divisor turning the u16 magnitude into [0, 1]
pub const MAGNITUDE_SCALE: f32 = 30_000.0;
/// Divisor turning the temperature byte into [0, 1)
pub const TEMPERATURE_SCALE: f32 = 256.0;

/// Decoded velocity and temperature fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicsFields {
    /// Per-cell velocity, three components per cell
    pub velocity: Vec<f32>,
    /// Per-cell temperature in [0, 1)
    pub temperature: Vec<f32>,
}

impl PhysicsFields {
    /// Zeroed fields for `cells` cells
    #[must_use]
    pub fn zeroed(cells: usize) -> Self {
        Self {
            velocity: vec![0.0; cells * 3],
            temperature: vec![0.0; cells],
        }
    }

    /// Number of cells covered
    #[must_use]
    pub fn cells(&self) -> usize {
        self.temperature.len()
    }

    /// Resize to `cells` cells, zeroing every value
    pub fn reset(&mut self, cells: usize) {
        self.velocity.clear();
        self.velocity.resize(cells * 3, 0.0);
        self.temperature.clear();
        self.temperature.resize(cells, 0.0);
    }
}

/// Bytes needed by a physics payload for `cells` cells (tag excluded)
#[must_use]
pub const fn payload_len(cells: usize) -> usize {
    (cells / 2) * 3 + cells * 2 + cells
}

/// Map a 4-bit nibble to a direction component in [-1, 1]
#[must_use]
pub fn dequantize_direction(nibble: u8) -> f32 {
    f32::from(nibble & 0x0F) / NIBBLE_MAX * 2.0 - 1.0
}

/// Map a direction component in [-1, 1] to the nearest nibble
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize_direction(component: f32) -> u8 {
    let scaled = (component.clamp(-1.0, 1.0) + 1.0) / 2.0 * NIBBLE_MAX;
    scaled.round() as u8
}

/// Map a wire magnitude to [0, ~2.18]
#[must_use]
pub fn dequantize_magnitude(raw: u16) -> f32 {
    f32::from(raw) / MAGNITUDE_SCALE
}

/// Map a magnitude in [0, 1] to its wire value
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize_magnitude(magnitude: f32) -> u16 {
    (magnitude.clamp(0.0, 1.0) * MAGNITUDE_SCALE).round() as u16
}

/// Map a temperature byte to [0, 1)
#[must_use]
pub fn dequantize_temperature(raw: u8) -> f32 {
    f32::from(raw) / TEMPERATURE_SCALE
}

/// Map a temperature in [0, 1) to its wire byte
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize_temperature(temperature: f32) -> u8 {
    (temperature * TEMPERATURE_SCALE).clamp(0.0, 255.0) as u8
}

/// Decode a physics payload for `cells` cells into `out`.
///
/// The frame cursor must sit just past the tag byte. `out` is resized to the
/// cell count; on error it is left zeroed, never partially filled with a
/// misread field.
pub fn decode_into(frame: &mut Frame, cells: usize, out: &mut PhysicsFields) -> Result<()> {
    let needed = payload_len(cells);
    if frame.remaining() < needed {
        out.reset(cells);
        return Err(Error::Truncated {
            needed,
            remaining: frame.remaining(),
        });
    }

    // Directions land in the velocity buffer first, then get scaled in place.
    out.reset(cells);
    let directions = frame.pop_bytes((cells / 2) * 3)?;
    for (pair, group) in directions.chunks_exact(3).enumerate() {
        let nibbles = [
            group[0] >> 4,
            group[0] & 0x0F,
            group[1] >> 4,
            group[1] & 0x0F,
            group[2] >> 4,
            group[2] & 0x0F,
        ];
        let base = pair * 6;
        for (slot, nibble) in out.velocity[base..base + 6].iter_mut().zip(nibbles) {
            *slot = dequantize_direction(nibble);
        }
    }

    for cell in 0..cells {
        let magnitude = dequantize_magnitude(frame.pop_u16()?);
        for component in &mut out.velocity[cell * 3..cell * 3 + 3] {
            *component *= magnitude;
        }
    }

    let temperatures = frame.pop_bytes(cells)?;
    for (slot, &raw) in out.temperature.iter_mut().zip(temperatures) {
        *slot = dequantize_temperature(raw);
    }

    Ok(())
}

/// Decode a physics payload for `cells` cells
pub fn decode(frame: &mut Frame, cells: usize) -> Result<PhysicsFields> {
    let mut fields = PhysicsFields::zeroed(cells);
    decode_into(frame, cells, &mut fields)?;
    Ok(fields)
}

/// Append the physics payload for the given per-cell inputs to `frame`.
///
/// `directions` holds three components per cell in [-1, 1]; `magnitudes` and
/// `temperatures` one value per cell. Used by server-side tooling and tests.
pub fn encode_into(
    frame: &mut Frame,
    directions: &[f32],
    magnitudes: &[f32],
    temperatures: &[f32],
) -> Result<()> {
    let cells = magnitudes.len();
    if directions.len() != cells * 3 {
        return Err(Error::SizeMismatch {
            what: "directions",
            expected: cells * 3,
            got: directions.len(),
        });
    }
    if temperatures.len() != cells {
        return Err(Error::SizeMismatch {
            what: "temperatures",
            expected: cells,
            got: temperatures.len(),
        });
    }

    for pair in directions.chunks_exact(6) {
        let n: Vec<u8> = pair.iter().map(|&d| quantize_direction(d)).collect();
        frame.push_bytes(&[n[0] << 4 | n[1], n[2] << 4 | n[3], n[4] << 4 | n[5]]);
    }
    for &magnitude in magnitudes {
        frame.push_u16(quantize_magnitude(magnitude));
    }
    let bytes: Vec<u8> = temperatures
        .iter()
        .map(|&t| quantize_temperature(t))
        .collect();
    frame.push_bytes(&bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageType;

    fn reply(directions: &[f32], magnitudes: &[f32], temperatures: &[f32]) -> Frame {
        let mut frame = Frame::tagged(MessageType::RequestPhysicalValue, 0);
        encode_into(&mut frame, directions, magnitudes, temperatures).unwrap();
        let mut received = Frame::from_bytes(frame.as_bytes()).unwrap();
        received.pop_tag().unwrap();
        received
    }

    #[test]
    fn test_nibble_endpoints() {
        assert_eq!(dequantize_direction(0), -1.0);
        assert_eq!(dequantize_direction(15), 1.0);
        assert_eq!(quantize_direction(-1.0), 0);
        assert_eq!(quantize_direction(1.0), 15);
        assert_eq!(quantize_direction(3.0), 15);
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(payload_len(2), 3 + 4 + 2);
        assert_eq!(payload_len(64), 96 + 128 + 64);
        assert_eq!(payload_len(3), 3 + 6 + 3);
    }

    #[test]
    fn test_nibble_order_for_a_cell_pair() {
        // a = (0, 15, 0), b = (15, 0, 15); all magnitudes 30000 -> 1.0
        let mut frame = Frame::new();
        frame.push_bytes(&[0x0F, 0x0F, 0x0F]);
        frame.push_u16(30_000);
        frame.push_u16(30_000);
        frame.push_bytes(&[128, 0]);

        let mut received = Frame::from_bytes(frame.as_bytes()).unwrap();
        let fields = decode(&mut received, 2).unwrap();
        assert_eq!(fields.velocity, vec![-1.0, 1.0, -1.0, 1.0, -1.0, 1.0]);
        assert_eq!(fields.temperature, vec![0.5, 0.0]);
    }

    #[test]
    fn test_velocity_scaled_by_magnitude() {
        let mut frame = Frame::new();
        frame.push_bytes(&[0xFF, 0xFF, 0x00]);
        frame.push_u16(15_000);
        frame.push_u16(0);
        frame.push_bytes(&[0, 255]);

        let mut received = Frame::from_bytes(frame.as_bytes()).unwrap();
        let fields = decode(&mut received, 2).unwrap();
        assert_eq!(&fields.velocity[..3], &[0.5, 0.5, 0.5]);
        assert!(fields.velocity[3..].iter().all(|v| *v == 0.0));
        assert!((fields.temperature[1] - 255.0 / 256.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_odd_cell_count_leaves_last_direction_zero() {
        let mut received = reply(
            &[1.0, 1.0, 1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0],
            &[1.0, 1.0, 1.0],
            &[0.0, 0.0, 0.0],
        );
        let fields = decode(&mut received, 3).unwrap();
        assert_eq!(&fields.velocity[6..], &[0.0, 0.0, 0.0]);
        assert_eq!(&fields.velocity[..3], &[1.0, 1.0, 1.0]);
        assert_eq!(received.remaining(), 0);
    }

    #[test]
    fn test_truncated_payload_is_an_error() {
        let mut frame = Frame::new();
        frame.push_bytes(&[0; 5]);
        let mut received = Frame::from_bytes(frame.as_bytes()).unwrap();
        let mut out = PhysicsFields::zeroed(0);
        let err = decode_into(&mut received, 2, &mut out).unwrap_err();
        assert_eq!(
            err,
            Error::Truncated {
                needed: 9,
                remaining: 5
            }
        );
        assert_eq!(out.cells(), 2);
        assert!(out.velocity.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_encode_rejects_mismatched_inputs() {
        let mut frame = Frame::new();
        let err = encode_into(&mut frame, &[0.0; 5], &[0.0; 2], &[0.0; 2]).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { what: "directions", .. }));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: magnitude quantization error stays within one step
            #[test]
            fn prop_magnitude_error_bounded(m in 0.0f32..=1.0) {
                let decoded = dequantize_magnitude(quantize_magnitude(m));
                prop_assert!((decoded - m).abs() <= 1.0 / MAGNITUDE_SCALE);
            }

            /// Property: direction quantization error stays within 2/15
            #[test]
            fn prop_direction_error_bounded(d in -1.0f32..=1.0) {
                let decoded = dequantize_direction(quantize_direction(d));
                prop_assert!((decoded - d).abs() <= 2.0 / NIBBLE_MAX);
            }

            /// Property: decoded velocity follows direction * magnitude per cell
            #[test]
            fn prop_decoded_field_tracks_inputs(
                cells in prop::collection::vec(
                    ((-1.0f32..=1.0, -1.0f32..=1.0, -1.0f32..=1.0), 0.0f32..=1.0, 0.0f32..1.0),
                    0..40,
                ).prop_filter("even cell count", |c| c.len() % 2 == 0)
            ) {
                let directions: Vec<f32> = cells.iter().flat_map(|((x, y, z), _, _)| [*x, *y, *z]).collect();
                let magnitudes: Vec<f32> = cells.iter().map(|(_, m, _)| *m).collect();
                let temperatures: Vec<f32> = cells.iter().map(|(_, _, t)| *t).collect();

                let mut received = reply(&directions, &magnitudes, &temperatures);
                let fields = decode(&mut received, cells.len()).unwrap();

                for (i, (dir, mag, temp)) in cells.iter().enumerate() {
                    let expected = [dir.0 * mag, dir.1 * mag, dir.2 * mag];
                    for axis in 0..3 {
                        let got = fields.velocity[i * 3 + axis];
                        prop_assert!((got - expected[axis]).abs() <= 2.0 / NIBBLE_MAX + 1e-3);
                    }
                    prop_assert!((fields.temperature[i] - temp).abs() <= 1.0 / TEMPERATURE_SCALE);
                }
            }
        }
    }
}
