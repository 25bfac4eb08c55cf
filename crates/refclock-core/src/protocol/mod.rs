//! Protocol module - refclock wire protocol definitions.

pub mod constants;
pub mod packet;

pub use constants::*;
pub use packet::{HEADER_LEN, PACKET_LEN, Packet, Response};
