//! Results published by the session worker for readers on other threads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::SessionState;
use crate::protocol::{GridDims, PhysicsFields, RoomGeometry};

/// Grid dimensions and room description, replaced together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Layout {
    pub(crate) dims: GridDims,
    pub(crate) geometry: RoomGeometry,
}

/// Shared output slots.
///
/// Each group sits behind its own lock, held only for a swap or a copy.
#[derive(Debug)]
pub(crate) struct SessionOutputs {
    fields: RwLock<PhysicsFields>,
    occupancy: RwLock<Vec<bool>>,
    graph: RwLock<Vec<f32>>,
    layout: RwLock<Layout>,
    state: RwLock<SessionState>,
    jump_done: AtomicBool,
    jump_set: AtomicBool,
    graph_requested: AtomicU64,
    graph_answered: AtomicU64,
    load_done: AtomicBool,
    connect_done: AtomicBool,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl SessionOutputs {
    pub(crate) fn new(dims: GridDims, geometry: RoomGeometry) -> Self {
        Self {
            fields: RwLock::new(PhysicsFields::zeroed(dims.size3())),
            occupancy: RwLock::new(vec![false; dims.size3()]),
            graph: RwLock::new(Vec::new()),
            layout: RwLock::new(Layout { dims, geometry }),
            state: RwLock::new(SessionState::Disconnected),
            jump_done: AtomicBool::new(true),
            jump_set: AtomicBool::new(false),
            graph_requested: AtomicU64::new(0),
            graph_answered: AtomicU64::new(0),
            load_done: AtomicBool::new(false),
            connect_done: AtomicBool::new(false),
        }
    }

    /// Swap freshly decoded fields in; `staging` gets the previous buffers back.
    pub(crate) fn swap_fields(&self, staging: &mut PhysicsFields) {
        std::mem::swap(&mut *write(&self.fields), staging);
    }

    pub(crate) fn with_fields<R>(&self, f: impl FnOnce(&PhysicsFields) -> R) -> R {
        f(&read(&self.fields))
    }

    pub(crate) fn publish_occupancy(&self, grid: &[bool]) {
        let mut slot = write(&self.occupancy);
        slot.clear();
        slot.extend_from_slice(grid);
    }

    pub(crate) fn occupancy(&self) -> Vec<bool> {
        read(&self.occupancy).clone()
    }

    pub(crate) fn publish_graph(&self, samples: Vec<f32>) {
        *write(&self.graph) = samples;
    }

    pub(crate) fn graph(&self) -> Vec<f32> {
        read(&self.graph).clone()
    }

    /// Replace the layout and reallocate the field arrays for it.
    pub(crate) fn publish_layout(&self, layout: Layout) {
        write(&self.fields).reset(layout.dims.size3());
        *write(&self.layout) = layout;
    }

    pub(crate) fn layout(&self) -> Layout {
        *read(&self.layout)
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        *write(&self.state) = state;
    }

    pub(crate) fn state(&self) -> SessionState {
        *read(&self.state)
    }

    pub(crate) fn jump_done(&self) -> bool {
        self.jump_done.load(Ordering::Acquire)
    }

    pub(crate) fn set_jump_done(&self, done: bool) {
        self.jump_done.store(done, Ordering::Release);
    }

    pub(crate) fn jump_set(&self) -> bool {
        self.jump_set.load(Ordering::Acquire)
    }

    pub(crate) fn set_jump_set(&self, set: bool) {
        self.jump_set.store(set, Ordering::Release);
    }

    /// Open a graph query and return its ticket.
    pub(crate) fn request_graph(&self) -> u64 {
        self.graph_requested.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Samples for the query holding `ticket` have been published.
    pub(crate) fn answer_graph(&self, ticket: u64) {
        self.graph_answered.fetch_max(ticket, Ordering::AcqRel);
    }

    /// The newest graph query has been answered.
    pub(crate) fn graph_done(&self) -> bool {
        self.graph_answered.load(Ordering::Acquire) >= self.graph_requested.load(Ordering::Acquire)
    }

    pub(crate) fn load_done(&self) -> bool {
        self.load_done.load(Ordering::Acquire)
    }

    pub(crate) fn set_load_done(&self, done: bool) {
        self.load_done.store(done, Ordering::Release);
    }

    pub(crate) fn connect_done(&self) -> bool {
        self.connect_done.load(Ordering::Acquire)
    }

    pub(crate) fn set_connect_done(&self, done: bool) {
        self.connect_done.store(done, Ordering::Release);
    }
}
