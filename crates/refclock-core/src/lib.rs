//! refclock-core: firmware-update client for refclock units.
//!
//! A refclock is a network-attached reference-clock distribution unit,
//! reachable only over UDP. This crate locates a unit, prepares a firmware
//! image, and drives the multi-stage burn protocol: reset into the
//! bootloader, stream the image in 256-byte blocks, verify by read-back,
//! finalize.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: packet layout, command codes, acknowledgment matching
//! - **Transport**: datagram channel abstraction (UDP, mocks)
//! - **Image**: Intel-HEX conversion, CRC, block slicing
//! - **Discovery**: device descriptors and the finder boundary
//! - **State**: burn state machine
//! - **Events**: observer pattern for UI decoupling
//! - **Session**: high-level orchestrator
//! - **Loader**: process-wide loader registry
//!
//! # Example
//!
//! ```no_run
//! use refclock_core::discovery::{DeviceAddr, StaticFinder};
//! use refclock_core::session::{BurnSession, SessionConfig};
//! use refclock_core::transport::UdpConnector;
//! use std::time::Duration;
//!
//! let mut device = DeviceAddr::new();
//! device.set("addr", "192.168.10.3");
//! device.set("type", "refclock-bootloader");
//!
//! let finder = StaticFinder::new(vec![device]);
//! let connector = UdpConnector::new(Duration::from_millis(2000));
//! let config = SessionConfig::default();
//!
//! let mut session = BurnSession::setup(
//!     &finder,
//!     &connector,
//!     &DeviceAddr::new(),
//!     Some("refclock_r4_fw.hex".into()),
//!     &config,
//! )
//! .expect("setup failed")
//! .expect("no unit found");
//! session.run(&finder).expect("burn failed");
//! ```

pub mod discovery;
pub mod error;
pub mod events;
pub mod image;
pub mod loader;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use discovery::{DeviceAddr, DeviceFinder, DeviceListing, StaticFinder, ambiguous_listing};
pub use error::BurnError;
pub use events::{BurnEvent, BurnObserver, LogLevel, NullObserver, TracingObserver};
pub use image::{FirmwareImage, block_count, firmware_crc};
pub use loader::{LoaderArgs, load_firmware, register_loader, register_refclock_loader};
pub use protocol::{Packet, Response};
pub use session::{BurnSession, ConfigError, SessionConfig};
pub use state::{BurnStage, BurnState};
pub use transport::{
    CommandChannel, Connector, Datagram, MockTransport, TransportError, UdpConnector, UdpTransport,
};
