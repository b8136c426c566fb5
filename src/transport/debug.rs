use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Direction byte written before each captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureDirection {
    /// Frame sent to the server
    Outbound = 0x00,
    /// Frame received from the server
    Inbound = 0x01,
}

/// Thread-safe writer of a frame capture file.
///
/// File layout: an 8-byte magic, then one record per frame:
/// `[u64 LE unix micros][u8 direction][u32 LE length][frame bytes]`.
#[derive(Clone)]
pub struct FrameRecorder {
    inner: Arc<Mutex<BufWriter<File>>>,
}

/// Leading bytes of every capture file.
pub const CAPTURE_MAGIC: &[u8; 8] = b"AIRLNK01";

impl FrameRecorder {
    /// Create a recorder that writes to the provided path, truncating any existing file.
    pub fn create(path: &Path) -> io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(CAPTURE_MAGIC)?;
        writer.flush()?;
        Ok(Self {
            inner: Arc::new(Mutex::new(writer)),
        })
    }

    /// Record a frame with the current system timestamp.
    pub fn record(&self, direction: CaptureDirection, frame: &[u8]) -> io::Result<()> {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        let length = u32::try_from(frame.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;

        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("frame recorder poisoned"))?;
        guard.write_all(&micros.to_le_bytes())?;
        guard.write_all(&[direction as u8])?;
        guard.write_all(&length.to_le_bytes())?;
        guard.write_all(frame)?;
        guard.flush()
    }
}

impl std::fmt::Debug for FrameRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRecorder").finish_non_exhaustive()
    }
}
