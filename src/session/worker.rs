use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use super::engine::{Selection, SessionCore};
use super::intent::{Intent, OccupancySlot};
use super::outputs::SessionOutputs;
use super::{SessionConfig, SessionError, SessionEvent, SessionState};
use crate::protocol::metrics::{FrameDirection, Metrics};
use crate::protocol::{Error as ProtocolError, Frame, MessageType, Outbound};
#[cfg(feature = "debug-tools")]
use crate::transport::{CaptureDirection, FrameRecorder};
use crate::transport::{FrameAssembler, Transport, TransportError};

/// Single owner of the session state and the transport.
pub(crate) struct Worker<T> {
    id: Uuid,
    core: SessionCore,
    transport: T,
    intents: Receiver<Intent>,
    pending: Arc<OccupancySlot>,
    orphaned: bool,
    assembler: FrameAssembler,
    config: SessionConfig,
    state: SessionState,
    outputs: Arc<SessionOutputs>,
    #[cfg(feature = "debug-tools")]
    recorder: Option<FrameRecorder>,
}

impl<T: Transport> Worker<T> {
    pub(crate) fn new(
        core: SessionCore,
        transport: T,
        intents: Receiver<Intent>,
        pending: Arc<OccupancySlot>,
        config: SessionConfig,
        outputs: Arc<SessionOutputs>,
    ) -> Self {
        #[cfg(feature = "debug-tools")]
        let recorder = config.capture_path.as_deref().and_then(|path| {
            FrameRecorder::create(path)
                .map_err(|err| warn!(path = %path.display(), error = %err, "capture disabled"))
                .ok()
        });

        Self {
            id: Uuid::new_v4(),
            core,
            transport,
            intents,
            pending,
            orphaned: false,
            assembler: FrameAssembler::new(),
            config,
            state: SessionState::Disconnected,
            outputs,
            #[cfg(feature = "debug-tools")]
            recorder,
        }
    }

    fn advance(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        let next = self.state.transition(event)?;
        if next != self.state {
            debug!(from = %self.state, to = %next, "state change");
        }
        self.state = next;
        self.outputs.set_state(next);
        Ok(())
    }

    /// Run the session to completion.
    #[instrument(name = "session", level = "info", skip(self), fields(id = %self.id))]
    pub(crate) fn run(mut self) -> Result<(), SessionError> {
        self.advance(SessionEvent::Connect {
            address_configured: true,
        })?;

        if let Err(err) = self.transport.connect(self.config.connect_timeout) {
            warn!(error = %err, "connect failed");
            Metrics::record_error();
            self.outputs.set_connect_done(false);
            self.advance(SessionEvent::ConnectFailed)?;
            return Err(err.into());
        }
        self.outputs.set_connect_done(true);
        let purpose = self.core.purpose();
        self.advance(SessionEvent::Connected { purpose })?;
        info!(%purpose, "connected");

        let result = self.handshake().and_then(|()| self.stream());
        self.shutdown();
        result
    }

    fn shutdown(&mut self) {
        self.transport.close();
        self.assembler.reset();
        self.outputs.set_connect_done(false);
        if let Err(err) = self.advance(SessionEvent::Closed) {
            error!(error = %err, "failed to close session");
        }
        info!("session closed");
    }

    fn handshake(&mut self) -> Result<(), SessionError> {
        self.drain_intents();

        match self.core.purpose() {
            MessageType::ProvideSpaceInfo => {
                self.exchange(SessionCore::space_info)?;
            }
            MessageType::StoreGeometry => {
                self.exchange(SessionCore::store_geometry)?;
            }
            MessageType::RequestGeometry => {
                self.exchange(SessionCore::geometry_request)?;
                self.exchange(SessionCore::space_info)?;
            }
            other => error!(purpose = %other, "unsupported handshake purpose, nothing sent"),
        }

        let next = self.state.transition(SessionEvent::HandshakeComplete)?;
        if next == SessionState::Streaming && !self.config.handshake_pause.is_zero() {
            thread::sleep(self.config.handshake_pause);
        }
        self.advance(SessionEvent::HandshakeComplete)
    }

    /// Send one opening message and wait for its reply.
    fn exchange(
        &mut self,
        message: impl for<'a> Fn(&'a SessionCore) -> Outbound<'a>,
    ) -> Result<(), SessionError> {
        let frame = message(&self.core).encode()?;
        if self.send(&frame) {
            self.receive_and_dispatch(Instant::now())?;
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn stream(&mut self) -> Result<(), SessionError> {
        while self.state == SessionState::Streaming {
            self.drain_intents();

            let now = Instant::now();
            let selection = self.core.select(now);
            if self.orphaned && matches!(selection, None | Some(Selection::PhysicsPoll { .. })) {
                debug!("all handles dropped");
                return Ok(());
            }

            let Some(selection) = selection else {
                let wait = self
                    .core
                    .next_poll_in(now)
                    .unwrap_or(self.config.idle_wait);
                self.wait_for_intent(wait);
                continue;
            };

            let frame = self.core.outbound(selection).encode()?;
            if self.send(&frame) {
                self.core.commit(selection, now);
                self.receive_and_dispatch(now)?;
            } else if !self.transport.is_connected() {
                return Err(TransportError::Closed.into());
            } else {
                self.wait_for_intent(self.config.idle_wait);
            }
        }
        Ok(())
    }

    fn drain_intents(&mut self) {
        loop {
            match self.intents.try_recv() {
                Ok(intent) => self.accept(intent),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.orphaned = true;
                    break;
                }
            }
        }
        self.take_occupancy();
        self.core.publish_occupancy();
    }

    fn accept(&mut self, intent: Intent) {
        match intent {
            Intent::OccupancyPending => self.take_occupancy(),
            intent => self.core.apply(intent),
        }
    }

    fn take_occupancy(&mut self) {
        if let Some(grid) = self.pending.take() {
            self.core.apply(Intent::Occupancy(grid));
        }
    }

    fn wait_for_intent(&mut self, wait: Duration) {
        if self.orphaned {
            thread::sleep(wait);
            return;
        }
        match self.intents.recv_timeout(wait) {
            Ok(intent) => self.accept(intent),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.orphaned = true,
        }
    }

    /// Returns whether the frame went out. Failures are logged, never retried here.
    fn send(&mut self, frame: &Frame) -> bool {
        if !self.transport.is_connected() {
            return false;
        }

        let bytes = frame.as_bytes();
        match self.transport.send(bytes) {
            Ok(()) => {
                if let Some(msg_type) = frame.tag().and_then(MessageType::from_u8) {
                    Metrics::record_frame(FrameDirection::Sent, msg_type, bytes.len());
                    trace!(%msg_type, len = bytes.len(), "frame sent");
                }
                #[cfg(feature = "debug-tools")]
                self.capture(CaptureDirection::Outbound, bytes);
                true
            }
            Err(err) => {
                warn!(error = %err, "send failed");
                Metrics::record_error();
                false
            }
        }
    }

    fn receive_and_dispatch(&mut self, sent_at: Instant) -> Result<(), SessionError> {
        let mut frame = self.receive()?;
        Metrics::record_round_trip(sent_at.elapsed());
        #[cfg(feature = "debug-tools")]
        self.capture(CaptureDirection::Inbound, frame.as_bytes());

        match self.core.dispatch(&mut frame) {
            Ok(msg_type) => {
                Metrics::record_frame(FrameDirection::Received, msg_type, frame.total_len());
                trace!(%msg_type, len = frame.total_len(), "frame dispatched");
            }
            Err(ProtocolError::UnknownMessageType { tag }) => {
                warn!(tag, "unknown message type, ignored");
                Metrics::record_dropped_frame();
            }
            Err(err) => {
                warn!(error = %err, "malformed reply dropped");
                Metrics::record_error();
                Metrics::record_dropped_frame();
            }
        }
        Ok(())
    }

    /// Block until one complete frame has arrived.
    fn receive(&mut self) -> Result<Frame, SessionError> {
        let started = Instant::now();
        loop {
            let assembled = self.assembler.next_frame().map_err(TransportError::Frame)?;
            if let Some(frame) = assembled {
                return Ok(frame);
            }

            match self.transport.read(self.config.read_chunk) {
                Ok(Some(bytes)) => self.assembler.extend(&bytes),
                Ok(None) => {
                    if let Some(timeout) = self.config.receive_timeout {
                        if started.elapsed() >= timeout {
                            warn!(?timeout, "peer stalled");
                            Metrics::record_error();
                            return Err(TransportError::ReceiveTimeout(timeout).into());
                        }
                    }
                }
                Err(err) => {
                    debug!(error = %err, "receive failed");
                    return Err(err.into());
                }
            }
        }
    }

    #[cfg(feature = "debug-tools")]
    fn capture(&self, direction: CaptureDirection, bytes: &[u8]) {
        if let Some(recorder) = &self.recorder {
            if let Err(err) = recorder.record(direction, bytes) {
                warn!(error = %err, "frame capture failed");
            }
        }
    }
}
