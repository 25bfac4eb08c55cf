//! Datagram transport abstraction.
//!
//! Defines the `Datagram` trait for request/response command channels,
//! allowing different implementations (UDP, scripted mocks).

use thiserror::Error;

/// Largest datagram any transport implementation may deliver.
pub const MTU: usize = 1500;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to bind local socket: {0}")]
    Bind(std::io::Error),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("send failed: {0}")]
    Send(std::io::Error),

    #[error("receive failed: {0}")]
    Recv(std::io::Error),

    #[error("timed out after {timeout_ms}ms waiting for a response")]
    Timeout { timeout_ms: u64 },
}

/// One connected datagram endpoint.
///
/// The burn protocol performs exactly one `send` followed by one `recv` per
/// logical command; timeout and loss handling below that exchange belong to
/// the implementation.
pub trait Datagram: Send {
    /// Send one datagram.
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Receive one datagram into `buf`, returning the number of bytes read.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Opens connected command channels to a device address.
///
/// This trait enables:
/// - Production channels over UDP
/// - Scripted channels for unit testing session logic
pub trait Connector {
    fn connect(&self, addr: &str, port: u16) -> Result<Box<dyn Datagram>, TransportError>;
}
