//! Typed messages on top of the frame codec

use super::physics::{self, PhysicsFields};
use super::{Error, Frame, GridDims, MessageType, Result, RoomGeometry};

/// Valid vent levels
pub const VENT_LEVEL_RANGE: std::ops::RangeInclusive<i32> = 1..=7;
/// Valid vent speeds
pub const VENT_SPEED_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

/// Actuator (air conditioner) settings as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorSettings {
    /// Actuator model identifier
    pub kind: i32,
    /// Mounting orientation
    pub direction: i32,
    /// Grid cell the actuator sits in
    pub position: [i32; 3],
    /// Vent angle level, 1..=7
    pub vent_level: i32,
    /// Fan speed, 1..=5
    pub vent_speed: i32,
    /// Ask the server to restart the simulation from this actuator state
    pub reset: bool,
    /// Current room temperature (normalized)
    pub current_temp: f32,
    /// Target temperature (normalized)
    pub target_temp: f32,
}

impl ActuatorSettings {
    /// Default settings for an actuator placed in `dims`
    #[must_use]
    pub fn for_grid(dims: GridDims) -> Self {
        Self {
            kind: 0,
            direction: 0,
            position: dims.actuator_home(),
            vent_level: 1,
            vent_speed: 1,
            reset: false,
            current_temp: 0.0,
            target_temp: 1.0,
        }
    }
}

/// Outbound message, borrowing large arrays from the session state.
#[derive(Debug, Clone, Copy)]
pub enum Outbound<'a> {
    /// Grid dimensions
    SpaceInfo(GridDims),
    /// Actuator settings
    ActuatorInfo(&'a ActuatorSettings),
    /// Full occupancy snapshot
    OccupancyFull(&'a [bool]),
    /// Indices of cells changed since the last sent snapshot
    OccupancyDiff(&'a [u32]),
    /// Poll for the next physics frame, optionally jumping ahead
    RequestPhysics {
        /// Minutes to advance the simulation before replying (0 = none)
        time_hint: u8,
    },
    /// Store room geometry and occupancy on the server
    StoreGeometry {
        /// Grid dimensions
        dims: GridDims,
        /// Room description
        geometry: &'a RoomGeometry,
        /// Occupancy snapshot
        occupancy: &'a [bool],
    },
    /// Load a stored room
    RequestGeometry {
        /// Room to load
        room_id: u16,
    },
    /// Sample series at a target cell
    RequestGraph {
        /// Target cell (x, y, z)
        target: [u16; 3],
    },
}

fn dim_i32(field: &'static str, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::ValueOutOfRange {
        field,
        value: i64::try_from(value).unwrap_or(i64::MAX),
    })
}

fn dim_u16(field: &'static str, value: usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::ValueOutOfRange {
        field,
        value: i64::try_from(value).unwrap_or(i64::MAX),
    })
}

fn occupancy_bytes(occupancy: &[bool]) -> Vec<u8> {
    occupancy.iter().map(|&cell| u8::from(cell)).collect()
}

impl Outbound<'_> {
    /// Message kind of this outbound message
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::SpaceInfo(_) => MessageType::ProvideSpaceInfo,
            Self::ActuatorInfo(_) => MessageType::ProvideActuatorInfo,
            Self::OccupancyFull(_) | Self::OccupancyDiff(_) => MessageType::ProvideOccupancy,
            Self::RequestPhysics { .. } => MessageType::RequestPhysicalValue,
            Self::StoreGeometry { .. } => MessageType::StoreGeometry,
            Self::RequestGeometry { .. } => MessageType::RequestGeometry,
            Self::RequestGraph { .. } => MessageType::RequestGraph,
        }
    }

    /// Encode into a frame
    pub fn encode(&self) -> Result<Frame> {
        let msg_type = self.message_type();
        let frame = match *self {
            Self::SpaceInfo(dims) => {
                let mut frame = Frame::tagged(msg_type, 12);
                frame.push_i32(dim_i32("grid x", dims.x)?);
                frame.push_i32(dim_i32("grid y", dims.y)?);
                frame.push_i32(dim_i32("grid z", dims.z)?);
                frame
            }
            Self::ActuatorInfo(settings) => {
                let mut frame = Frame::tagged(msg_type, 37);
                frame.push_i32(settings.kind);
                frame.push_i32(settings.direction);
                for axis in settings.position {
                    frame.push_i32(axis);
                }
                frame.push_i32(settings.vent_level);
                frame.push_i32(settings.vent_speed);
                frame.push_bool(settings.reset);
                frame.push_f32(settings.current_temp);
                frame.push_f32(settings.target_temp);
                frame
            }
            Self::OccupancyFull(occupancy) => {
                let mut frame = Frame::tagged(msg_type, occupancy.len());
                frame.push_bytes(&occupancy_bytes(occupancy));
                frame
            }
            Self::OccupancyDiff(indices) => {
                let mut frame = Frame::tagged(msg_type, indices.len() * 4);
                for &index in indices {
                    frame.push_u32(index);
                }
                frame
            }
            Self::RequestPhysics { time_hint } => {
                let mut frame = Frame::tagged(msg_type, 1);
                frame.push_u8(time_hint);
                frame
            }
            Self::StoreGeometry {
                dims,
                geometry,
                occupancy,
            } => {
                if occupancy.len() != dims.size3() {
                    return Err(Error::SizeMismatch {
                        what: "occupancy",
                        expected: dims.size3(),
                        got: occupancy.len(),
                    });
                }
                let mut frame = Frame::tagged(msg_type, 6 + 28 + 2 + occupancy.len());
                frame.push_u16(dim_u16("grid x", dims.x)?);
                frame.push_u16(dim_u16("grid y", dims.y)?);
                frame.push_u16(dim_u16("grid z", dims.z)?);
                for distance in geometry.boundaries() {
                    frame.push_f32(distance);
                }
                for size in geometry.room_size {
                    frame.push_f32(size);
                }
                frame.push_u16(geometry.room_id);
                frame.push_bytes(&occupancy_bytes(occupancy));
                frame
            }
            Self::RequestGeometry { room_id } => {
                let mut frame = Frame::tagged(msg_type, 2);
                frame.push_u16(room_id);
                frame
            }
            Self::RequestGraph { target } => {
                let mut frame = Frame::tagged(msg_type, 6);
                for axis in target {
                    frame.push_u16(axis);
                }
                frame
            }
        };
        Ok(frame)
    }
}

/// Authoritative room description returned for a geometry request.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryReply {
    /// Grid dimensions of the stored room
    pub dims: GridDims,
    /// Boundary distances (x-left, x-right, y-up, y-down)
    pub boundaries: [f32; 4],
    /// Physical room size
    pub room_size: [f32; 3],
    /// Occupancy bitmap, one entry per cell
    pub occupancy: Vec<bool>,
}

/// Decoded server reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Acknowledgement; the body is informational only
    Ack {
        /// Kind being acknowledged
        msg_type: MessageType,
        /// Body bytes after the tag
        body: Vec<u8>,
    },
    /// Room geometry and occupancy
    Geometry(GeometryReply),
    /// Graph samples
    Graph(Vec<f32>),
    /// Physics fields, decoded into the caller's staging buffer
    Physics,
}

impl Inbound {
    /// Decode a received frame.
    ///
    /// `cells` is the current grid size, used for physics payloads, which are
    /// decoded into `staging`.
    pub fn decode(frame: &mut Frame, cells: usize, staging: &mut PhysicsFields) -> Result<Self> {
        let msg_type = frame.pop_tag()?;
        match msg_type {
            MessageType::RequestGeometry => Self::decode_geometry(frame).map(Self::Geometry),
            MessageType::RequestGraph => {
                let count = frame.remaining() / 4;
                let mut samples = Vec::with_capacity(count);
                for _ in 0..count {
                    samples.push(frame.pop_f32()?);
                }
                Ok(Self::Graph(samples))
            }
            MessageType::RequestPhysicalValue => {
                physics::decode_into(frame, cells, staging)?;
                Ok(Self::Physics)
            }
            MessageType::ProvideSpaceInfo
            | MessageType::ProvideOccupancy
            | MessageType::ProvideActuatorInfo
            | MessageType::StoreGeometry
            | MessageType::CharData
            | MessageType::InitData => {
                let remaining = frame.remaining();
                let body = frame.pop_bytes(remaining)?.to_vec();
                Ok(Self::Ack { msg_type, body })
            }
        }
    }

    fn decode_geometry(frame: &mut Frame) -> Result<GeometryReply> {
        let x = usize::from(frame.pop_u16()?);
        let y = usize::from(frame.pop_u16()?);
        let z = usize::from(frame.pop_u16()?);
        let dims = GridDims::new(x, y, z);

        let mut boundaries = [0.0; 4];
        for slot in &mut boundaries {
            *slot = frame.pop_f32()?;
        }
        let mut room_size = [0.0; 3];
        for slot in &mut room_size {
            *slot = frame.pop_f32()?;
        }

        let occupancy = frame
            .pop_bytes(dims.size3())?
            .iter()
            .map(|&cell| cell == 0x01)
            .collect();

        Ok(GeometryReply {
            dims,
            boundaries,
            room_size,
            occupancy,
        })
    }
}
