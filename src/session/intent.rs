use std::sync::{Mutex, PoisonError};

/// Producer-side change queued for the session worker.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Intent {
    Occupancy(Vec<bool>),
    /// A grid is waiting in the [`OccupancySlot`].
    OccupancyPending,
    ActuatorPosition([i32; 3]),
    ActuatorDirection(i32),
    VentLevel(i32),
    VentSpeed(i32),
    ActuatorInfo { kind: i32, position: [i32; 3] },
    Temperatures { current: f32, target: f32 },
    Reset,
    Install,
    GraphTarget { target: [u16; 3], ticket: u64 },
    JumpForward(u8),
}

/// Latest occupancy grid not yet taken by the worker.
///
/// Grids are too large to queue: a newer grid replaces an untaken one.
#[derive(Debug, Default)]
pub(crate) struct OccupancySlot {
    grid: Mutex<Option<Vec<bool>>>,
}

impl OccupancySlot {
    /// Store `grid`, dropping any untaken one. Returns true if the slot was empty.
    pub(crate) fn put(&self, grid: Vec<bool>) -> bool {
        self.grid
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(grid)
            .is_none()
    }

    pub(crate) fn take(&self) -> Option<Vec<bool>> {
        self.grid.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}
