//! UDP implementation of the datagram transport.

use std::net::UdpSocket;
use std::time::Duration;

use tracing::debug;

use super::traits::{Connector, Datagram, TransportError};

/// A connected UDP socket with a fixed receive timeout.
pub struct UdpTransport {
    socket: UdpSocket,
    timeout: Duration,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to `addr:port`.
    pub fn connect(addr: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(TransportError::Bind)?;
        socket
            .connect((addr, port))
            .map_err(|source| TransportError::Connect {
                addr: format!("{addr}:{port}"),
                source,
            })?;
        socket
            .set_read_timeout(Some(timeout))
            .map_err(TransportError::Bind)?;

        debug!(remote = %format!("{addr}:{port}"), "UDP channel connected");
        Ok(Self { socket, timeout })
    }
}

impl Datagram for UdpTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.socket.send(data).map_err(TransportError::Send)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.socket.recv(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Err(TransportError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Err(e) => Err(TransportError::Recv(e)),
        }
    }
}

/// Production connector handing out `UdpTransport` channels.
pub struct UdpConnector {
    timeout: Duration,
}

impl UdpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Connector for UdpConnector {
    fn connect(&self, addr: &str, port: u16) -> Result<Box<dyn Datagram>, TransportError> {
        Ok(Box::new(UdpTransport::connect(addr, port, self.timeout)?))
    }
}
