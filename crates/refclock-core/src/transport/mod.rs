//! Transport layer module.

pub mod channel;
pub mod mock;
pub mod traits;
pub mod udp;

pub use channel::CommandChannel;
pub use mock::{MockConnector, MockTransport};
pub use traits::{Connector, Datagram, MTU, TransportError};
pub use udp::{UdpConnector, UdpTransport};
