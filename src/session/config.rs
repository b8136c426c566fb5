#[cfg(feature = "debug-tools")]
use std::path::PathBuf;
use std::time::Duration;

use crate::DEFAULT_PORT;

/// Configuration for a session client.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Server TCP port.
    pub port: u16,
    /// Upper bound for the transport connect.
    pub connect_timeout: Duration,
    /// Pause between the opening exchange and streaming.
    pub handshake_pause: Duration,
    /// Minimum spacing between physics polls; zero polls back-to-back.
    pub physics_poll_interval: Duration,
    /// How long the worker sleeps waiting for work before the actuator is installed.
    pub idle_wait: Duration,
    /// Give up on a reply after this long; `None` waits forever.
    pub receive_timeout: Option<Duration>,
    /// Maximum bytes taken from the transport per read.
    pub read_chunk: usize,
    /// Optional capture file receiving every sent and received frame.
    #[cfg(feature = "debug-tools")]
    pub capture_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(2),
            handshake_pause: Duration::from_secs(2),
            physics_poll_interval: Duration::ZERO,
            idle_wait: Duration::from_millis(100),
            receive_timeout: None,
            read_chunk: 1024 * 1024,
            #[cfg(feature = "debug-tools")]
            capture_path: None,
        }
    }
}
