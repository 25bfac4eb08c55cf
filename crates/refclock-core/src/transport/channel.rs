//! Request/response command channel over a datagram transport.

use tracing::trace;

use crate::protocol::constants::code_tag;
use crate::protocol::packet::{Packet, Response};

use super::traits::{Datagram, MTU, TransportError};

/// One command channel bound to a single remote port.
///
/// Owns its transport exclusively and reuses a fixed receive buffer sized to
/// the transport MTU. At most one request is ever in flight.
pub struct CommandChannel {
    xport: Box<dyn Datagram>,
    buf: [u8; MTU],
}

impl CommandChannel {
    pub fn new(xport: Box<dyn Datagram>) -> Self {
        Self {
            xport,
            buf: [0u8; MTU],
        }
    }

    /// Perform one request/response exchange: exactly one send, one receive.
    pub fn exchange(&mut self, request: &Packet) -> Result<Response, TransportError> {
        self.xport.send(&request.to_bytes())?;
        let n = self.xport.recv(&mut self.buf)?;
        let response = Response::decode(&self.buf[..n]);
        trace!(
            cmd = %code_tag(request.code),
            ack = %code_tag(response.packet.code),
            sequence = request.sequence,
            wire_len = n,
            "exchange"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{RESET_ACK, RESET_CMD};
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_exchange_sends_encoded_request() {
        let mock = MockTransport::new();
        let mut ack = Packet::new(RESET_ACK);
        ack.sequence = 7;
        mock.queue_reply(&ack.to_bytes());

        let mut channel = CommandChannel::new(Box::new(mock.clone()));
        let mut request = Packet::new(RESET_CMD);
        request.sequence = 7;

        let response = channel.exchange(&request).unwrap();
        assert!(response.matches(RESET_ACK, &request));

        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], request.to_bytes());
    }

    #[test]
    fn test_exchange_surfaces_timeout() {
        let mock = MockTransport::new();
        let mut channel = CommandChannel::new(Box::new(mock));
        let request = Packet::new(RESET_CMD);
        assert!(matches!(
            channel.exchange(&request),
            Err(TransportError::Timeout { .. })
        ));
    }
}
