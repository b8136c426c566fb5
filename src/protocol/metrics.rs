use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::MessageType;

/// Track link metrics without external dependencies.
pub(crate) struct Metrics;

static TOTAL_FRAMES: AtomicU64 = AtomicU64::new(0);
static SENT_FRAMES: AtomicU64 = AtomicU64::new(0);
static RECEIVED_FRAMES: AtomicU64 = AtomicU64::new(0);
static SENT_BYTES: AtomicU64 = AtomicU64::new(0);
static RECEIVED_BYTES: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNT: AtomicU64 = AtomicU64::new(0);
static DROPPED_FRAMES: AtomicU64 = AtomicU64::new(0);
static ACTIVE_CONNECTIONS: AtomicU64 = AtomicU64::new(0);
static ROUND_TRIP_TOTAL_NS: AtomicU64 = AtomicU64::new(0);
static ROUND_TRIP_MAX_NS: AtomicU64 = AtomicU64::new(0);
static ROUND_TRIPS: AtomicU64 = AtomicU64::new(0);

const NANOSECONDS_PER_MICROSECOND: u128 = 1_000;

struct MessageTypeCounters {
    space_info: AtomicU64,
    occupancy: AtomicU64,
    physical_value: AtomicU64,
    actuator_info: AtomicU64,
    store_geometry: AtomicU64,
    request_geometry: AtomicU64,
    graph: AtomicU64,
    legacy: AtomicU64,
}

static MESSAGE_COUNTERS: MessageTypeCounters = MessageTypeCounters::new();

impl MessageTypeCounters {
    const fn new() -> Self {
        Self {
            space_info: AtomicU64::new(0),
            occupancy: AtomicU64::new(0),
            physical_value: AtomicU64::new(0),
            actuator_info: AtomicU64::new(0),
            store_geometry: AtomicU64::new(0),
            request_geometry: AtomicU64::new(0),
            graph: AtomicU64::new(0),
            legacy: AtomicU64::new(0),
        }
    }

    fn counter(&self, msg_type: MessageType) -> &AtomicU64 {
        use MessageType::*;

        match msg_type {
            ProvideSpaceInfo => &self.space_info,
            ProvideOccupancy => &self.occupancy,
            RequestPhysicalValue => &self.physical_value,
            ProvideActuatorInfo => &self.actuator_info,
            StoreGeometry => &self.store_geometry,
            RequestGeometry => &self.request_geometry,
            RequestGraph => &self.graph,
            CharData | InitData => &self.legacy,
        }
    }

    fn increment(&self, msg_type: MessageType) {
        self.counter(msg_type).fetch_add(1, Ordering::Relaxed);
    }

    fn load(&self, msg_type: MessageType) -> u64 {
        self.counter(msg_type).load(Ordering::Relaxed)
    }
}

/// Direction of frame flow for counting.
#[derive(Clone, Copy)]
pub(crate) enum FrameDirection {
    Sent,
    Received,
}

impl Metrics {
    #[inline]
    pub(crate) fn record_frame(direction: FrameDirection, msg_type: MessageType, len: usize) {
        TOTAL_FRAMES.fetch_add(1, Ordering::Relaxed);
        let len = len as u64;
        match direction {
            FrameDirection::Sent => {
                SENT_FRAMES.fetch_add(1, Ordering::Relaxed);
                SENT_BYTES.fetch_add(len, Ordering::Relaxed);
            }
            FrameDirection::Received => {
                RECEIVED_FRAMES.fetch_add(1, Ordering::Relaxed);
                RECEIVED_BYTES.fetch_add(len, Ordering::Relaxed);
            }
        }
        MESSAGE_COUNTERS.increment(msg_type);
    }

    #[inline]
    pub(crate) fn record_error() {
        ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped_frame() {
        DROPPED_FRAMES.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_connection_open() {
        ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_connection_close() {
        ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_round_trip(duration: Duration) {
        let nanos = duration
            .as_nanos()
            .min(u64::MAX as u128)
            .try_into()
            .unwrap_or(u64::MAX);

        ROUND_TRIPS.fetch_add(1, Ordering::Relaxed);
        ROUND_TRIP_TOTAL_NS.fetch_add(nanos, Ordering::Relaxed);
        update_max(&ROUND_TRIP_MAX_NS, nanos);
    }

    #[inline]
    pub(crate) fn totals() -> MetricsSnapshot {
        MetricsSnapshot {
            total_frames: TOTAL_FRAMES.load(Ordering::Relaxed),
            sent_frames: SENT_FRAMES.load(Ordering::Relaxed),
            received_frames: RECEIVED_FRAMES.load(Ordering::Relaxed),
            sent_bytes: SENT_BYTES.load(Ordering::Relaxed),
            received_bytes: RECEIVED_BYTES.load(Ordering::Relaxed),
            total_errors: ERROR_COUNT.load(Ordering::Relaxed),
            dropped_frames: DROPPED_FRAMES.load(Ordering::Relaxed),
            active_connections: ACTIVE_CONNECTIONS.load(Ordering::Relaxed),
            space_info_frames: MESSAGE_COUNTERS.load(MessageType::ProvideSpaceInfo),
            occupancy_frames: MESSAGE_COUNTERS.load(MessageType::ProvideOccupancy),
            physics_frames: MESSAGE_COUNTERS.load(MessageType::RequestPhysicalValue),
            actuator_frames: MESSAGE_COUNTERS.load(MessageType::ProvideActuatorInfo),
            store_geometry_frames: MESSAGE_COUNTERS.load(MessageType::StoreGeometry),
            request_geometry_frames: MESSAGE_COUNTERS.load(MessageType::RequestGeometry),
            graph_frames: MESSAGE_COUNTERS.load(MessageType::RequestGraph),
            legacy_frames: MESSAGE_COUNTERS.load(MessageType::CharData),
            round_trips: ROUND_TRIPS.load(Ordering::Relaxed),
            round_trip_total_ns: ROUND_TRIP_TOTAL_NS.load(Ordering::Relaxed),
            round_trip_max_ns: ROUND_TRIP_MAX_NS.load(Ordering::Relaxed),
        }
    }
}

fn update_max(target: &AtomicU64, candidate: u64) {
    let mut current = target.load(Ordering::Relaxed);
    while candidate > current {
        match target.compare_exchange_weak(
            current,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(old) => current = old,
        }
    }
}

/// Lightweight snapshot of critical counters.
#[derive(Default, Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub total_frames: u64,
    pub sent_frames: u64,
    pub received_frames: u64,
    pub sent_bytes: u64,
    pub received_bytes: u64,
    pub total_errors: u64,
    pub dropped_frames: u64,
    pub active_connections: u64,
    /// Per message type counts below combine sent requests and received replies
    pub space_info_frames: u64,
    pub occupancy_frames: u64,
    pub physics_frames: u64,
    pub actuator_frames: u64,
    pub store_geometry_frames: u64,
    pub request_geometry_frames: u64,
    pub graph_frames: u64,
    /// Frames under the legacy `0x15` tag
    pub legacy_frames: u64,
    pub round_trips: u64,
    pub round_trip_total_ns: u64,
    pub round_trip_max_ns: u64,
}

impl MetricsSnapshot {
    /// Average request/reply latency in microseconds.
    #[must_use]
    pub fn avg_round_trip_us(&self) -> Option<u64> {
        if self.round_trips == 0 {
            return None;
        }

        let total_ns = u128::from(self.round_trip_total_ns);
        Some((total_ns / (u128::from(self.round_trips) * NANOSECONDS_PER_MICROSECOND)) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_advance() {
        let before = Metrics::totals();
        Metrics::record_frame(FrameDirection::Sent, MessageType::RequestPhysicalValue, 6);
        Metrics::record_frame(FrameDirection::Received, MessageType::RequestPhysicalValue, 10);
        let after = Metrics::totals();

        assert!(after.sent_frames > before.sent_frames);
        assert!(after.received_frames > before.received_frames);
        assert!(after.physics_frames >= before.physics_frames + 2);
        assert!(after.sent_bytes >= before.sent_bytes + 6);
    }

    #[test]
    fn test_counters_split_by_message_type() {
        let before = Metrics::totals();
        Metrics::record_frame(FrameDirection::Sent, MessageType::ProvideOccupancy, 65);
        Metrics::record_frame(FrameDirection::Sent, MessageType::RequestGraph, 7);
        Metrics::record_frame(FrameDirection::Received, MessageType::CharData, 3);
        Metrics::record_frame(FrameDirection::Received, MessageType::InitData, 3);
        let after = Metrics::totals();

        assert!(after.occupancy_frames > before.occupancy_frames);
        assert!(after.graph_frames > before.graph_frames);
        assert!(after.legacy_frames >= before.legacy_frames + 2);
    }

    #[test]
    fn test_round_trip_average() {
        let snapshot = MetricsSnapshot {
            round_trips: 4,
            round_trip_total_ns: 8_000,
            ..MetricsSnapshot::default()
        };
        assert_eq!(snapshot.avg_round_trip_us(), Some(2));
        assert_eq!(MetricsSnapshot::default().avg_round_trip_us(), None);
    }

    #[test]
    fn test_update_max_keeps_largest() {
        let target = AtomicU64::new(5);
        update_max(&target, 3);
        assert_eq!(target.load(Ordering::Relaxed), 5);
        update_max(&target, 9);
        assert_eq!(target.load(Ordering::Relaxed), 9);
    }
}
