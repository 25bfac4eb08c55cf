//! Mock datagram transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::traits::{Connector, Datagram, TransportError};

/// Mock transport for unit testing channel and protocol logic.
///
/// Clones share state, so a test can keep one handle while the session owns
/// the boxed other.
#[derive(Clone)]
pub struct MockTransport {
    /// Queued datagrams to return on recv.
    reply_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    /// Captured sends.
    send_log: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            reply_queue: Arc::new(Mutex::new(VecDeque::new())),
            send_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a datagram to be returned on the next recv.
    pub fn queue_reply(&self, bytes: &[u8]) {
        self.reply_queue.lock().unwrap().push_back(bytes.to_vec());
    }

    /// Get all captured sends.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.send_log.lock().unwrap().clone()
    }

    /// Clear captured sends.
    pub fn clear_sent(&self) {
        self.send_log.lock().unwrap().clear();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Datagram for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.send_log.lock().unwrap().push(data.to_vec());
        Ok(data.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let reply = self
            .reply_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(TransportError::Timeout { timeout_ms: 2000 })?;
        let n = reply.len().min(buf.len());
        buf[..n].copy_from_slice(&reply[..n]);
        Ok(n)
    }
}

/// Connector that hands out clones of prepared mock transports, in order,
/// and counts how many channels were ever opened.
pub struct MockConnector {
    channels: Mutex<VecDeque<MockTransport>>,
    opened: Arc<Mutex<usize>>,
}

impl MockConnector {
    pub fn new(channels: Vec<MockTransport>) -> Self {
        Self {
            channels: Mutex::new(channels.into()),
            opened: Arc::new(Mutex::new(0)),
        }
    }

    pub fn opened(&self) -> usize {
        *self.opened.lock().unwrap()
    }
}

impl Connector for MockConnector {
    fn connect(&self, _addr: &str, _port: u16) -> Result<Box<dyn Datagram>, TransportError> {
        *self.opened.lock().unwrap() += 1;
        let xport = self
            .channels
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(TransportError::Timeout { timeout_ms: 0 })?;
        Ok(Box::new(xport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_reply_queue() {
        let mut mock = MockTransport::new();
        mock.queue_reply(b"first");
        mock.queue_reply(b"second");

        let mut buf = [0u8; 16];
        let n = mock.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"first");

        let n = mock.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"second");

        // Queue is empty now.
        assert!(matches!(
            mock.recv(&mut buf),
            Err(TransportError::Timeout { .. })
        ));
    }

    #[test]
    fn test_mock_send_capture() {
        let mut mock = MockTransport::new();
        mock.send(b"hello").unwrap();
        mock.send(b"world").unwrap();

        let sent = mock.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], b"hello");
        assert_eq!(sent[1], b"world");
    }

    #[test]
    fn test_clones_share_state() {
        let mock = MockTransport::new();
        let mut boxed: Box<dyn Datagram> = Box::new(mock.clone());
        boxed.send(b"via box").unwrap();
        assert_eq!(mock.sent().len(), 1);
    }
}
