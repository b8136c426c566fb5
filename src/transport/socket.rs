//! Blocking TCP transport.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use super::{Transport, TransportError};
use crate::protocol::metrics::Metrics;

/// TCP connection to the physics server.
#[derive(Debug)]
pub struct TcpTransport {
    host: String,
    port: u16,
    read_timeout: Option<Duration>,
    stream: Option<TcpStream>,
    read_buf: Vec<u8>,
}

impl TcpTransport {
    /// Create an unconnected transport for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            read_timeout: None,
            stream: None,
            read_buf: Vec::new(),
        }
    }

    /// Bound each read; `None` blocks until data arrives.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Address as configured, `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>, TransportError> {
        let resolved = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::AddressResolution {
                address: self.address(),
                source,
            })?;
        Ok(resolved.collect())
    }

    fn drop_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            Metrics::record_connection_close();
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.drop_stream();

        let mut last_error =
            io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing");
        for addr in self.resolve()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(self.read_timeout)?;
                    debug!(%addr, "connected");
                    Metrics::record_connection_open();
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(err) => {
                    trace!(%addr, error = %err, "connect attempt failed");
                    last_error = err;
                }
            }
        }

        Err(TransportError::Connect {
            address: self.address(),
            source: last_error,
        })
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        stream.write_all(bytes)?;
        stream.flush()?;
        trace!(len = bytes.len(), "sent");
        Ok(())
    }

    fn read(&mut self, max_bytes: usize) -> Result<Option<Vec<u8>>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        self.read_buf.resize(max_bytes.max(1), 0);

        match stream.read(&mut self.read_buf) {
            Ok(0) => {
                self.drop_stream();
                Err(TransportError::Closed)
            }
            Ok(read) => {
                trace!(len = read, "received");
                Ok(Some(self.read_buf[..read].to_vec()))
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(Some(Vec::new())),
            Err(err) => Err(err.into()),
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        self.drop_stream();
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.drop_stream();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_send_requires_connection() {
        let mut transport = TcpTransport::new("127.0.0.1", 1);
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send(&[1, 2, 3]),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.read(16),
            Err(TransportError::NotConnected)
        ));
    }

    #[test]
    fn test_refused_connection_reports_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = TcpTransport::new("127.0.0.1", port);
        let err = transport.connect(Duration::from_millis(500)).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_echo_round_trip_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        transport.connect(Duration::from_secs(2)).unwrap();
        assert!(transport.is_connected());
        transport.send(&[9, 8, 7, 6]).unwrap();

        let mut echoed = Vec::new();
        while echoed.len() < 4 {
            if let Some(chunk) = transport.read(64).unwrap() {
                echoed.extend(chunk);
            }
        }
        assert_eq!(echoed, vec![9, 8, 7, 6]);

        server.join().unwrap();
        let mut closed = false;
        for _ in 0..10 {
            match transport.read(64) {
                Err(TransportError::Closed) => {
                    closed = true;
                    break;
                }
                Ok(_) => {}
                Err(err) => panic!("unexpected error {err}"),
            }
        }
        assert!(closed);
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_read_timeout_yields_none() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        let mut transport =
            TcpTransport::new("localhost", port).with_read_timeout(Some(Duration::from_millis(50)));
        transport.connect(Duration::from_secs(2)).unwrap();
        assert!(transport.read(64).unwrap().is_none());

        server.join().unwrap();
    }
}
