//! Minimal UDP probe backing the loader's discovery needs.

use std::time::Duration;

use refclock_core::discovery::{DeviceAddr, DeviceFinder};
use refclock_core::protocol::constants::{
    BOOTLOADER_TYPE, CTRL_PORT, DEVICE_TYPE, QUERY_ACK, QUERY_CMD, QUERY_MODE_BYTE,
    QUERY_REVISION_BYTE,
};
use refclock_core::protocol::Packet;
use refclock_core::transport::{CommandChannel, Connector, UdpConnector};
use tracing::{debug, warn};

/// Resolves filters by querying the unit the filter's `addr` names.
///
/// Full subnet enumeration belongs to the site tooling; this probe answers
/// the loader's two needs: resolving an explicit address to a descriptor,
/// and re-finding the same address after a reset into the bootloader.
pub struct ProbeFinder {
    timeout: Duration,
}

impl ProbeFinder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn query(&self, addr: &str) -> Option<DeviceAddr> {
        let connector = UdpConnector::new(self.timeout);
        let xport = match connector.connect(addr, CTRL_PORT) {
            Ok(x) => x,
            Err(e) => {
                warn!(addr, error = %e, "could not open probe channel");
                return None;
            }
        };
        let mut channel = CommandChannel::new(xport);

        let mut pkt = Packet::new(QUERY_CMD);
        pkt.sequence = rand::random();
        let response = match channel.exchange(&pkt) {
            Ok(r) => r,
            Err(e) => {
                debug!(addr, error = %e, "no answer to status query");
                return None;
            }
        };
        if !response.matches(QUERY_ACK, &pkt) {
            return None;
        }

        let mut dev = DeviceAddr::new();
        dev.set("addr", addr);
        dev.set(
            "type",
            if response.packet.data[QUERY_MODE_BYTE] != 0 {
                BOOTLOADER_TYPE
            } else {
                DEVICE_TYPE
            },
        );
        dev.set(
            "revision",
            &response.packet.data[QUERY_REVISION_BYTE].to_string(),
        );
        Some(dev)
    }
}

impl DeviceFinder for ProbeFinder {
    fn find(&self, filter: &DeviceAddr) -> Vec<DeviceAddr> {
        let Some(addr) = filter.addr() else {
            warn!("probe discovery needs addr=<ip> in the device filters");
            return Vec::new();
        };
        match self.query(addr) {
            Some(dev) if dev.satisfies(filter) => vec![dev],
            _ => Vec::new(),
        }
    }
}
