//! Fixed-layout request/response packet and the acknowledgment-matching rule.
//!
//! Every protocol exchange is one request packet followed by one response
//! packet. All multi-byte fields are network byte order.
//!
//! Wire layout (272 bytes, 16-byte header):
//!
//! | field    | size | meaning                                       |
//! |----------|------|-----------------------------------------------|
//! | sequence | 4    | client-assigned, incremented per exchange     |
//! | code     | 4    | command / acknowledgment tag                  |
//! | len      | 2    | payload length for this exchange              |
//! | crc      | 2    | image CRC-16, prepare-burn only               |
//! | addr     | 4    | byte offset into the image, block commands    |
//! | data     | 256  | block payload, zero-padded on the final block |

use byteorder::{ByteOrder, NetworkEndian};

use crate::protocol::constants::{BLOCK_SIZE, code_tag};

/// Size of the fixed header preceding the data payload.
pub const HEADER_LEN: usize = 16;

/// Full encoded packet size.
pub const PACKET_LEN: usize = HEADER_LEN + BLOCK_SIZE;

/// One protocol packet, host representation.
#[derive(Clone, Copy)]
pub struct Packet {
    pub sequence: u32,
    pub code: u32,
    pub len: u16,
    pub crc: u16,
    pub addr: u32,
    pub data: [u8; BLOCK_SIZE],
}

impl Packet {
    /// New packet with the given command code and all other fields zeroed.
    pub fn new(code: u32) -> Self {
        Self {
            sequence: 0,
            code,
            len: 0,
            crc: 0,
            addr: 0,
            data: [0u8; BLOCK_SIZE],
        }
    }

    /// Encode into a wire buffer.
    pub fn encode(&self, buf: &mut [u8; PACKET_LEN]) {
        NetworkEndian::write_u32(&mut buf[0..4], self.sequence);
        NetworkEndian::write_u32(&mut buf[4..8], self.code);
        NetworkEndian::write_u16(&mut buf[8..10], self.len);
        NetworkEndian::write_u16(&mut buf[10..12], self.crc);
        NetworkEndian::write_u32(&mut buf[12..16], self.addr);
        buf[HEADER_LEN..].copy_from_slice(&self.data);
    }

    /// Encoded wire form as an owned buffer.
    pub fn to_bytes(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        self.encode(&mut buf);
        buf
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("sequence", &self.sequence)
            .field("code", &code_tag(self.code))
            .field("len", &self.len)
            .field("crc", &format_args!("0x{:04X}", self.crc))
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

/// A decoded response datagram.
///
/// Keeps the length actually received alongside the decoded fields: a
/// datagram that does not extend past the header can never match an
/// acknowledgment, whatever its header bytes claim.
#[derive(Debug, Clone, Copy)]
pub struct Response {
    pub packet: Packet,
    pub wire_len: usize,
}

impl Response {
    /// Decode a received datagram. Short or oversize input is tolerated;
    /// missing bytes read as zero and the true length is retained.
    pub fn decode(raw: &[u8]) -> Self {
        let mut buf = [0u8; PACKET_LEN];
        let n = raw.len().min(PACKET_LEN);
        buf[..n].copy_from_slice(&raw[..n]);

        let mut data = [0u8; BLOCK_SIZE];
        data.copy_from_slice(&buf[HEADER_LEN..]);

        Self {
            packet: Packet {
                sequence: NetworkEndian::read_u32(&buf[0..4]),
                code: NetworkEndian::read_u32(&buf[4..8]),
                len: NetworkEndian::read_u16(&buf[8..10]),
                crc: NetworkEndian::read_u16(&buf[10..12]),
                addr: NetworkEndian::read_u32(&buf[12..16]),
                data,
            },
            wire_len: raw.len(),
        }
    }

    /// The acknowledgment-matching rule.
    ///
    /// A response acknowledges `request` iff the datagram extended past the
    /// header, the sequence number echoes the request's, and the code equals
    /// `expected`. Any other code, including a valid code for a different
    /// operation, is a protocol failure for the caller to handle; it is not
    /// retried.
    pub fn matches(&self, expected: u32, request: &Packet) -> bool {
        self.wire_len > HEADER_LEN
            && self.packet.sequence == request.sequence
            && self.packet.code == expected
    }
}
