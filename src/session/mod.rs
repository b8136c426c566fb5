//! Session client: owns the connection to the physics server and decides
//! what to send from the changes producers report.
//!
//! A [`Session`] is configured, then started with [`Session::connect`], which
//! moves the session state onto a dedicated worker thread. Producers and
//! readers talk to the worker through cloneable [`SessionHandle`]s: mutators
//! queue an intent and return immediately, getters read the latest published
//! results. Occupancy grids bypass the queue: only the newest untaken grid is
//! kept.

mod actuator;
mod config;
mod engine;
mod error;
mod intent;
mod occupancy;
mod outputs;
mod state;
mod worker;

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

pub use config::SessionConfig;
pub use error::SessionError;
pub use state::{SessionEvent, SessionState};

use self::engine::{DEFAULT_DIMS, SessionCore};
use self::intent::{Intent, OccupancySlot};
use self::outputs::SessionOutputs;
use self::worker::Worker;
use crate::protocol::{GridDims, PhysicsFields, RoomGeometry};
use crate::transport::{TcpTransport, Transport};

/// Result of a session worker thread.
pub type SessionJoinHandle = JoinHandle<Result<(), SessionError>>;

/// Session client before it is started.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    address: Option<String>,
    core: Option<SessionCore>,
    intents: Option<Receiver<Intent>>,
    sender: Sender<Intent>,
    pending: Arc<OccupancySlot>,
    outputs: Arc<SessionOutputs>,
}

impl Session {
    /// Create an unconnected session for a 64×64×64 grid.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        let outputs = Arc::new(SessionOutputs::new(DEFAULT_DIMS, RoomGeometry::default()));
        let core = SessionCore::new(Arc::clone(&outputs), config.physics_poll_interval);
        Self {
            config,
            address: None,
            core: Some(core),
            intents: Some(receiver),
            sender,
            pending: Arc::default(),
            outputs,
        }
    }

    /// New handle for producers and readers.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            sender: self.sender.clone(),
            pending: Arc::clone(&self.pending),
            outputs: Arc::clone(&self.outputs),
        }
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.outputs.state()
    }

    /// Set the server host name or IP address.
    pub fn store_address(&mut self, host: impl Into<String>) {
        let host = host.into();
        debug!(%host, "server address stored");
        self.address = Some(host);
    }

    fn core_mut(&mut self) -> Result<&mut SessionCore, SessionError> {
        self.core.as_mut().ok_or(SessionError::AlreadyStarted)
    }

    /// Stream against a grid of `dims`, announcing it on connect.
    pub fn initialize(&mut self, dims: GridDims) -> Result<(), SessionError> {
        self.core_mut()?.initialize(dims);
        Ok(())
    }

    /// Store `geometry` and the occupancy grid on the server, then close.
    pub fn initialize_for_geometry(
        &mut self,
        dims: GridDims,
        geometry: RoomGeometry,
    ) -> Result<(), SessionError> {
        self.core_mut()?.initialize_for_geometry(dims, geometry);
        Ok(())
    }

    /// Load stored room `room_id` on connect and stream with its grid.
    pub fn request_geometry(&mut self, room_id: u16) -> Result<(), SessionError> {
        self.core_mut()?.request_geometry(room_id);
        Ok(())
    }

    /// Connect over TCP to the stored address and start the worker.
    ///
    /// Returns immediately; progress is visible through
    /// [`SessionHandle::state`] and [`SessionHandle::connect_done`].
    pub fn connect(&mut self) -> Result<SessionJoinHandle, SessionError> {
        SessionState::Disconnected.transition(SessionEvent::Connect {
            address_configured: self.address.is_some(),
        })?;
        let host = self.address.clone().ok_or(SessionError::AddressNotConfigured)?;
        let transport = TcpTransport::new(host, self.config.port)
            .with_read_timeout(self.config.receive_timeout);
        self.connect_with(transport)
    }

    /// Start the worker over a caller-supplied transport.
    pub fn connect_with<T>(&mut self, transport: T) -> Result<SessionJoinHandle, SessionError>
    where
        T: Transport + 'static,
    {
        let (Some(core), Some(intents)) = (self.core.take(), self.intents.take()) else {
            return Err(SessionError::AlreadyStarted);
        };
        let worker = Worker::new(
            core,
            transport,
            intents,
            Arc::clone(&self.pending),
            self.config.clone(),
            Arc::clone(&self.outputs),
        );

        thread::Builder::new()
            .name("airlink-session".into())
            .spawn(move || worker.run())
            .map_err(SessionError::WorkerSpawn)
    }
}

/// Cloneable access to a running session.
///
/// Mutators never block: they queue the change for the worker, which
/// validates it. Values outside their valid range are dropped there.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: Sender<Intent>,
    pending: Arc<OccupancySlot>,
    outputs: Arc<SessionOutputs>,
}

impl SessionHandle {
    fn submit(&self, intent: Intent) {
        if self.sender.send(intent).is_err() {
            trace!("session worker gone, intent dropped");
        }
    }

    /// Report the current occupancy grid, one entry per cell.
    ///
    /// Replaces any grid the worker has not picked up yet.
    pub fn update_occupancy(&self, grid: Vec<bool>) {
        if self.pending.put(grid) {
            self.submit(Intent::OccupancyPending);
        }
    }

    /// Move the actuator to a grid cell.
    pub fn set_actuator_position(&self, position: [i32; 3]) {
        self.submit(Intent::ActuatorPosition(position));
    }

    /// Change the actuator mounting orientation.
    pub fn set_actuator_direction(&self, direction: i32) {
        self.submit(Intent::ActuatorDirection(direction));
    }

    /// Set the vent angle level, 1 to 7.
    pub fn set_vent_level(&self, level: i32) {
        self.submit(Intent::VentLevel(level));
    }

    /// Set the fan speed, 1 to 5.
    pub fn set_vent_speed(&self, speed: i32) {
        self.submit(Intent::VentSpeed(speed));
    }

    /// Set actuator model and position together.
    pub fn set_actuator_info(&self, kind: i32, position: [i32; 3]) {
        self.submit(Intent::ActuatorInfo { kind, position });
    }

    /// Set current and target room temperature (normalized).
    pub fn set_temperatures(&self, current: f32, target: f32) {
        self.submit(Intent::Temperatures { current, target });
    }

    /// Ask the server to restart the simulation.
    pub fn request_reset(&self) {
        self.submit(Intent::Reset);
    }

    /// The actuator has been placed: send its settings and start polling physics.
    pub fn mark_installed(&self) {
        self.submit(Intent::Install);
    }

    /// Request the sample series at `target`; [`Self::graph_done`] turns true with the reply.
    pub fn request_graph(&self, target: [u16; 3]) {
        let ticket = self.outputs.request_graph();
        self.submit(Intent::GraphTarget { target, ticket });
    }

    /// Advance the simulation by `minutes` with the next physics poll.
    pub fn jump_forward(&self, minutes: u8) {
        self.outputs.set_jump_set(true);
        self.submit(Intent::JumpForward(minutes));
    }

    /// Copy of the latest velocity field, three components per cell.
    #[must_use]
    pub fn velocity(&self) -> Vec<f32> {
        self.outputs.with_fields(|fields| fields.velocity.clone())
    }

    /// Copy of the latest temperature field.
    #[must_use]
    pub fn temperature(&self) -> Vec<f32> {
        self.outputs.with_fields(|fields| fields.temperature.clone())
    }

    /// Read the latest fields without copying them.
    pub fn with_fields<R>(&self, f: impl FnOnce(&PhysicsFields) -> R) -> R {
        self.outputs.with_fields(f)
    }

    /// Latest occupancy grid known to the session.
    #[must_use]
    pub fn occupancy(&self) -> Vec<bool> {
        self.outputs.occupancy()
    }

    /// Samples of the last completed graph query.
    #[must_use]
    pub fn graph(&self) -> Vec<f32> {
        self.outputs.graph()
    }

    /// Current grid dimensions.
    #[must_use]
    pub fn dims(&self) -> GridDims {
        self.outputs.layout().dims
    }

    /// Current room description.
    #[must_use]
    pub fn geometry(&self) -> RoomGeometry {
        self.outputs.layout().geometry
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.outputs.state()
    }

    /// No jump forward is outstanding.
    #[must_use]
    pub fn jump_done(&self) -> bool {
        self.outputs.jump_done()
    }

    /// A jump forward was requested and has not completed.
    #[must_use]
    pub fn jump_set(&self) -> bool {
        self.outputs.jump_set()
    }

    /// No graph query is outstanding.
    #[must_use]
    pub fn graph_done(&self) -> bool {
        self.outputs.graph_done()
    }

    /// A stored room has been loaded.
    #[must_use]
    pub fn load_done(&self) -> bool {
        self.outputs.load_done()
    }

    /// The transport connection is open.
    #[must_use]
    pub fn connect_done(&self) -> bool {
        self.outputs.connect_done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_without_address_fails_without_io() {
        let mut session = Session::new(SessionConfig::default());
        let err = session.connect().unwrap_err();
        assert!(matches!(err, SessionError::AddressNotConfigured));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.initialize(GridDims::cube(2)).is_ok());
    }

    #[test]
    fn test_handle_flags_flip_immediately() {
        let session = Session::new(SessionConfig::default());
        let handle = session.handle();
        handle.request_graph([1, 2, 3]);
        handle.jump_forward(15);
        assert!(!handle.graph_done());
        assert!(handle.jump_set());
        assert!(handle.jump_done());
    }

    #[test]
    fn test_initialize_publishes_layout() {
        let mut session = Session::new(SessionConfig::default());
        let handle = session.handle();
        assert_eq!(handle.dims(), GridDims::cube(64));

        session.initialize(GridDims::new(4, 3, 2)).unwrap();
        assert_eq!(handle.dims().size3(), 24);
        assert_eq!(handle.occupancy().len(), 24);
        assert_eq!(handle.temperature().len(), 24);
        assert_eq!(handle.velocity().len(), 72);
    }

    #[test]
    fn test_occupancy_updates_do_not_accumulate() {
        let mut session = Session::new(SessionConfig::default());
        session.initialize(GridDims::cube(16)).unwrap();
        let handle = session.handle();
        let cells = GridDims::cube(16).size3();

        for round in 0..400 {
            let mut grid = vec![false; cells];
            grid[round % cells] = true;
            handle.update_occupancy(grid);
        }

        let intents = session.intents.take().unwrap();
        assert_eq!(intents.try_iter().collect::<Vec<_>>(), vec![Intent::OccupancyPending]);
        let latest = session.pending.take().unwrap();
        assert!(latest[399]);
        assert_eq!(latest.iter().filter(|&&cell| cell).count(), 1);
        assert_eq!(session.pending.take(), None);
    }
}
