//! Session state owned by the worker: what to send next and what replies mean.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::actuator::ActuatorState;
use super::intent::Intent;
use super::occupancy::OccupancyTracker;
use super::outputs::{Layout, SessionOutputs};
use crate::protocol::{
    Frame, GeometryReply, GridDims, Inbound, MessageType, Outbound, PhysicsFields, Result,
    RoomGeometry,
};

/// Grid used until the host initializes the session.
pub(crate) const DEFAULT_DIMS: GridDims = GridDims::cube(64);

/// One streaming send, picked in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    OccupancyFull,
    OccupancyChanges,
    ActuatorInfo,
    Graph([u16; 3]),
    PhysicsPoll { time_hint: u8 },
}

#[derive(Debug)]
pub(crate) struct SessionCore {
    dims: GridDims,
    geometry: RoomGeometry,
    purpose: MessageType,
    actuator: ActuatorState,
    occupancy: OccupancyTracker,
    occupancy_unpublished: bool,
    graph_target: Option<([u16; 3], u64)>,
    graph_in_flight: Option<u64>,
    time_hint: u8,
    jump_requested: bool,
    jump_in_flight: bool,
    staging: PhysicsFields,
    poll_interval: Duration,
    last_poll: Option<Instant>,
    outputs: Arc<SessionOutputs>,
}

impl SessionCore {
    pub(crate) fn new(outputs: Arc<SessionOutputs>, poll_interval: Duration) -> Self {
        let layout = outputs.layout();
        Self {
            dims: layout.dims,
            geometry: layout.geometry,
            purpose: MessageType::InitData,
            actuator: ActuatorState::new(layout.dims),
            occupancy: OccupancyTracker::new(layout.dims.size3()),
            occupancy_unpublished: false,
            graph_target: None,
            graph_in_flight: None,
            time_hint: 0,
            jump_requested: false,
            jump_in_flight: false,
            staging: PhysicsFields::zeroed(layout.dims.size3()),
            poll_interval,
            last_poll: None,
            outputs,
        }
    }

    pub(crate) const fn purpose(&self) -> MessageType {
        self.purpose
    }

    /// Open with the grid dimensions and stream.
    pub(crate) fn initialize(&mut self, dims: GridDims) {
        self.purpose = MessageType::ProvideSpaceInfo;
        self.reallocate(dims, vec![false; dims.size3()]);
        self.actuator.rehome(dims);
    }

    /// Store a room on the server and close.
    pub(crate) fn initialize_for_geometry(&mut self, dims: GridDims, geometry: RoomGeometry) {
        self.purpose = MessageType::StoreGeometry;
        self.geometry = geometry;
        self.reallocate(dims, vec![false; dims.size3()]);
    }

    /// Load a stored room, then stream with its dimensions.
    pub(crate) fn request_geometry(&mut self, room_id: u16) {
        self.purpose = MessageType::RequestGeometry;
        self.geometry.room_id = room_id;
        self.outputs.publish_layout(Layout {
            dims: self.dims,
            geometry: self.geometry,
        });
    }

    fn reallocate(&mut self, dims: GridDims, grid: Vec<bool>) {
        debug!(%dims, cells = dims.size3(), "allocating grid");
        self.dims = dims;
        self.occupancy = OccupancyTracker::with_grid(grid);
        self.occupancy_unpublished = false;
        self.staging.reset(dims.size3());
        self.outputs.publish_layout(Layout {
            dims,
            geometry: self.geometry,
        });
        self.outputs.publish_occupancy(self.occupancy.current());
    }

    pub(crate) fn apply(&mut self, intent: Intent) {
        trace!(?intent, "applying intent");
        let changed = match intent {
            Intent::Occupancy(grid) => match self.occupancy.update(grid) {
                Ok(()) => {
                    self.occupancy_unpublished = true;
                    true
                }
                Err(err) => {
                    warn!(error = %err, "occupancy update ignored");
                    false
                }
            },
            Intent::OccupancyPending => false,
            Intent::ActuatorPosition(position) => self.actuator.set_position(position),
            Intent::ActuatorDirection(direction) => self.actuator.set_direction(direction),
            Intent::VentLevel(level) => self.actuator.set_vent_level(level),
            Intent::VentSpeed(speed) => self.actuator.set_vent_speed(speed),
            Intent::ActuatorInfo { kind, position } => self.actuator.set_info(kind, position),
            Intent::Temperatures { current, target } => {
                self.actuator.set_temperatures(current, target)
            }
            Intent::Reset => {
                self.actuator.request_reset();
                true
            }
            Intent::Install => {
                self.actuator.install();
                true
            }
            Intent::GraphTarget { target, ticket } => {
                self.graph_target = Some((target, ticket));
                true
            }
            Intent::JumpForward(minutes) => {
                self.time_hint = minutes;
                self.jump_requested = true;
                self.outputs.set_jump_set(true);
                true
            }
        };
        if !changed {
            trace!("intent left state unchanged");
        }
    }

    /// Copy the occupancy grid to the outputs once per batch of updates.
    pub(crate) fn publish_occupancy(&mut self) {
        if self.occupancy_unpublished {
            self.outputs.publish_occupancy(self.occupancy.current());
            self.occupancy_unpublished = false;
        }
    }

    fn poll_due(&self, now: Instant) -> bool {
        self.last_poll
            .is_none_or(|last| now.saturating_duration_since(last) >= self.poll_interval)
    }

    /// Pick the next streaming send.
    pub(crate) fn select(&mut self, now: Instant) -> Option<Selection> {
        if !self.occupancy.full_sent() {
            return Some(Selection::OccupancyFull);
        }
        if !self.occupancy.changed().is_empty() {
            return Some(Selection::OccupancyChanges);
        }
        if self.actuator.is_dirty() {
            return Some(Selection::ActuatorInfo);
        }
        if let Some((target, _)) = self.graph_target {
            return Some(Selection::Graph(target));
        }
        if self.actuator.is_installed() && self.poll_due(now) {
            return Some(Selection::PhysicsPoll {
                time_hint: self.time_hint,
            });
        }
        None
    }

    /// Time until the next physics poll is due, if polling at all.
    pub(crate) fn next_poll_in(&self, now: Instant) -> Option<Duration> {
        if !self.actuator.is_installed() {
            return None;
        }
        let elapsed = self
            .last_poll
            .map_or(self.poll_interval, |last| now.saturating_duration_since(last));
        Some(self.poll_interval.saturating_sub(elapsed))
    }

    pub(crate) fn outbound(&self, selection: Selection) -> Outbound<'_> {
        match selection {
            Selection::OccupancyFull => Outbound::OccupancyFull(self.occupancy.current()),
            Selection::OccupancyChanges => Outbound::OccupancyDiff(self.occupancy.pending_changes()),
            Selection::ActuatorInfo => Outbound::ActuatorInfo(self.actuator.settings()),
            Selection::Graph(target) => Outbound::RequestGraph { target },
            Selection::PhysicsPoll { time_hint } => Outbound::RequestPhysics { time_hint },
        }
    }

    /// Clear the state behind `selection` once its frame was sent.
    pub(crate) fn commit(&mut self, selection: Selection, now: Instant) {
        match selection {
            Selection::OccupancyFull => self.occupancy.commit_full(),
            Selection::OccupancyChanges => self.occupancy.commit_changes(),
            Selection::ActuatorInfo => self.actuator.commit(),
            Selection::Graph(_) => {
                self.graph_in_flight = self.graph_target.take().map(|(_, ticket)| ticket);
            }
            Selection::PhysicsPoll { .. } => {
                if self.jump_requested {
                    self.jump_requested = false;
                    self.jump_in_flight = true;
                    self.outputs.set_jump_done(false);
                }
                self.time_hint = 0;
                self.last_poll = Some(now);
            }
        }
    }

    pub(crate) fn space_info(&self) -> Outbound<'_> {
        Outbound::SpaceInfo(self.dims)
    }

    pub(crate) fn store_geometry(&self) -> Outbound<'_> {
        Outbound::StoreGeometry {
            dims: self.dims,
            geometry: &self.geometry,
            occupancy: self.occupancy.current(),
        }
    }

    pub(crate) fn geometry_request(&self) -> Outbound<'_> {
        Outbound::RequestGeometry {
            room_id: self.geometry.room_id,
        }
    }

    /// Decode one reply and fold it into the session state.
    pub(crate) fn dispatch(&mut self, frame: &mut Frame) -> Result<MessageType> {
        let cells = self.dims.size3();
        let inbound = Inbound::decode(frame, cells, &mut self.staging)?;
        let msg_type = match inbound {
            Inbound::Ack { msg_type, body } => {
                match msg_type {
                    MessageType::ProvideActuatorInfo => self.actuator.clear_reset(),
                    MessageType::CharData | MessageType::StoreGeometry => {
                        info!(%msg_type, message = %String::from_utf8_lossy(&body), "server message");
                    }
                    _ => debug!(%msg_type, len = body.len(), "acknowledged"),
                }
                msg_type
            }
            Inbound::Geometry(reply) => {
                self.apply_geometry(reply);
                MessageType::RequestGeometry
            }
            Inbound::Graph(samples) => {
                debug!(samples = samples.len(), "graph received");
                self.outputs.publish_graph(samples);
                if let Some(ticket) = self.graph_in_flight.take() {
                    self.outputs.answer_graph(ticket);
                }
                MessageType::RequestGraph
            }
            Inbound::Physics => {
                self.outputs.swap_fields(&mut self.staging);
                if self.jump_in_flight {
                    self.jump_in_flight = false;
                    self.outputs.set_jump_done(true);
                    self.outputs.set_jump_set(false);
                    info!("jump forward done");
                }
                MessageType::RequestPhysicalValue
            }
        };
        Ok(msg_type)
    }

    fn apply_geometry(&mut self, reply: GeometryReply) {
        let [dist_x_left, dist_x_right, dist_y_up, dist_y_down] = reply.boundaries;
        self.geometry = RoomGeometry {
            dist_x_left,
            dist_x_right,
            dist_y_up,
            dist_y_down,
            room_size: reply.room_size,
            room_id: self.geometry.room_id,
        };
        self.reallocate(reply.dims, reply.occupancy);
        self.actuator.rehome(reply.dims);
        self.outputs.set_load_done(true);
        info!(dims = %reply.dims, room_id = self.geometry.room_id, "room loaded");
    }
}
