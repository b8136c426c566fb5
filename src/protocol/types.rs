//! Message type table and grid geometry primitives

use std::fmt;

/// Tag byte shared by every legacy message kind.
pub const LEGACY_TAG: u8 = 0x15;

/// Message kinds exchanged with the physics server.
///
/// The tag byte is always the first byte of a frame body and is the only key
/// used to dispatch received frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Grid dimensions of the simulation space
    ProvideSpaceInfo,
    /// Full occupancy snapshot or changed-cell indices
    ProvideOccupancy,
    /// Poll for the next velocity/temperature frame
    RequestPhysicalValue,
    /// Actuator (air conditioner) settings
    ProvideActuatorInfo,
    /// Persist room geometry and occupancy on the server
    StoreGeometry,
    /// Load stored room geometry by room id
    RequestGeometry,
    /// Sample series at a target cell
    RequestGraph,
    /// Free-form text payload (legacy)
    CharData,
    /// Unconfigured session purpose (legacy)
    InitData,
}

impl MessageType {
    /// Convert from tag byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x10 => Some(Self::ProvideSpaceInfo),
            0x11 => Some(Self::ProvideOccupancy),
            0x12 => Some(Self::RequestPhysicalValue),
            0x14 => Some(Self::ProvideActuatorInfo),
            0x16 => Some(Self::StoreGeometry),
            0x17 => Some(Self::RequestGeometry),
            0x18 => Some(Self::RequestGraph),
            LEGACY_TAG => Some(Self::CharData),
            _ => None,
        }
    }

    /// Convert to tag byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::ProvideSpaceInfo => 0x10,
            Self::ProvideOccupancy => 0x11,
            Self::RequestPhysicalValue => 0x12,
            Self::ProvideActuatorInfo => 0x14,
            Self::StoreGeometry => 0x16,
            Self::RequestGeometry => 0x17,
            Self::RequestGraph => 0x18,
            Self::CharData | Self::InitData => LEGACY_TAG,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProvideSpaceInfo => "ProvideSpaceInfo",
            Self::ProvideOccupancy => "ProvideOccupancy",
            Self::RequestPhysicalValue => "RequestPhysicalValue",
            Self::ProvideActuatorInfo => "ProvideActuatorInfo",
            Self::StoreGeometry => "StoreGeometry",
            Self::RequestGeometry => "RequestGeometry",
            Self::RequestGraph => "RequestGraph",
            Self::CharData => "CharData",
            Self::InitData => "InitData",
        };
        write!(f, "{name}")
    }
}

/// Simulation grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridDims {
    /// Cells along x
    pub x: usize,
    /// Cells along y
    pub y: usize,
    /// Cells along z
    pub z: usize,
}

impl GridDims {
    /// Create grid dimensions
    #[must_use]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Cube grid with the same size on every axis
    #[must_use]
    pub const fn cube(size: usize) -> Self {
        Self::new(size, size, size)
    }

    /// Total number of cells
    #[must_use]
    pub const fn size3(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Row-major flat index of a cell
    #[must_use]
    pub const fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x * self.y * self.z + y * self.z + z
    }

    /// Default actuator position for this grid: centered, just below the ceiling
    #[must_use]
    pub fn actuator_home(&self) -> [i32; 3] {
        let clamp = |v: usize| i32::try_from(v).unwrap_or(i32::MAX);
        [
            clamp(self.x / 2),
            clamp(self.y.saturating_sub(1)),
            clamp(self.z / 2),
        ]
    }
}

impl fmt::Display for GridDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// Room boundary and size description, exchanged once per session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoomGeometry {
    /// Distance to the left x boundary
    pub dist_x_left: f32,
    /// Distance to the right x boundary
    pub dist_x_right: f32,
    /// Distance to the upper y boundary
    pub dist_y_up: f32,
    /// Distance to the lower y boundary
    pub dist_y_down: f32,
    /// Physical room size (x, y, z)
    pub room_size: [f32; 3],
    /// Server-side room identifier
    pub room_id: u16,
}

impl RoomGeometry {
    /// Boundary distances in wire order
    #[must_use]
    pub const fn boundaries(&self) -> [f32; 4] {
        [
            self.dist_x_left,
            self.dist_x_right,
            self.dist_y_up,
            self.dist_y_down,
        ]
    }
}
