//! Burn session - orchestrates one firmware update attempt.
//!
//! A session resolves device filters to exactly one unit, prepares the
//! firmware image, and drives the protocol stages in strict order:
//! bootloader transition, prepare, block transfer, read-back verification,
//! finalize. Any stage failure aborts the remaining stages; the temporary
//! converted image (if any) is deleted exactly once, at the session's first
//! terminal outcome.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::discovery::{DeviceAddr, DeviceFinder, ambiguous_listing};
use crate::error::BurnError;
use crate::events::{BurnEvent, BurnObserver, LogLevel, TracingObserver};
use crate::image::FirmwareImage;
use crate::protocol::constants::{
    BLOCK_SIZE, BURN_READY_ACK, CTRL_PORT, DEVICE_TYPE, FILE_TRANSFER_ACK, FILE_TRANSFER_CMD,
    FINALIZE_ACK, FINALIZE_BURN_CMD, FW_PORT, PREPARE_BURN_CMD, READ_FW_ACK, READ_FW_CMD,
    RESET_ACK, RESET_CMD, RESPONSE_TIMEOUT_MS, SETTLE_DELAY_MS,
};
use crate::protocol::packet::Packet;
use crate::state::{BurnStage, BurnState};
use crate::transport::{CommandChannel, Connector, Datagram, TransportError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration for a burn session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding default firmware images, searched when no explicit
    /// path is given.
    pub images_dir: Option<PathBuf>,
    /// Per-exchange response timeout.
    pub response_timeout_ms: u64,
    /// Wait between the reset acknowledgment and re-discovery.
    pub settle_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            images_dir: None,
            response_timeout_ms: RESPONSE_TIMEOUT_MS,
            settle_delay_ms: SETTLE_DELAY_MS,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Default firmware image path for a hardware revision.
    pub fn default_image_path(&self, revision: &str) -> Result<PathBuf, BurnError> {
        let filename = format!("{DEVICE_TYPE}_r{revision}_fw.hex");
        match &self.images_dir {
            Some(dir) => Ok(dir.join(filename)),
            None => Err(BurnError::FileNotFound(PathBuf::from(filename))),
        }
    }
}

/// One firmware update attempt against one resolved unit.
pub struct BurnSession<O: BurnObserver> {
    device: DeviceAddr,
    given_filepath: PathBuf,
    image: FirmwareImage,
    ctrl: CommandChannel,
    fw: CommandChannel,
    state: BurnState,
    settle_delay: Duration,
    observer: Arc<O>,
}

impl BurnSession<TracingObserver> {
    /// Set up a session with the default tracing observer.
    pub fn setup(
        finder: &dyn DeviceFinder,
        connector: &dyn Connector,
        filters: &DeviceAddr,
        firmware_path: Option<PathBuf>,
        config: &SessionConfig,
    ) -> Result<Option<Self>, BurnError> {
        Self::setup_with_observer(
            finder,
            connector,
            filters,
            firmware_path,
            config,
            Arc::new(TracingObserver),
        )
    }
}

impl<O: BurnObserver> BurnSession<O> {
    /// Resolve filters, prepare the image and open both command channels.
    ///
    /// `Ok(None)` means no unit matched; that is a legitimate nothing-to-do
    /// outcome, not an error. More than one match fails with
    /// [`BurnError::AmbiguousDevice`] before any channel is opened.
    pub fn setup_with_observer(
        finder: &dyn DeviceFinder,
        connector: &dyn Connector,
        filters: &DeviceAddr,
        firmware_path: Option<PathBuf>,
        config: &SessionConfig,
        observer: Arc<O>,
    ) -> Result<Option<Self>, BurnError> {
        let mut devices = finder.find(filters);
        if devices.len() > 1 {
            return Err(BurnError::AmbiguousDevice(ambiguous_listing(&devices)));
        }
        let Some(device) = devices.pop() else {
            return Ok(None);
        };

        let given_filepath = match firmware_path {
            Some(path) => path,
            None => config.default_image_path(device.revision())?,
        };

        let mut image = FirmwareImage::prepare(&given_filepath)?;

        let addr = device.addr().unwrap_or_default().to_string();
        let (ctrl, fw) = match open_channels(connector, &addr) {
            Ok(pair) => pair,
            Err(e) => {
                image.discard();
                return Err(e.into());
            }
        };

        observer.on_event(&BurnEvent::DeviceResolved {
            name: device.display_name(),
            addr: addr.clone(),
        });

        Ok(Some(Self {
            device,
            given_filepath,
            image,
            ctrl: CommandChannel::new(ctrl),
            fw: CommandChannel::new(fw),
            state: BurnState::Idle,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            observer,
        }))
    }

    pub fn device(&self) -> &DeviceAddr {
        &self.device
    }

    pub fn given_filepath(&self) -> &Path {
        &self.given_filepath
    }

    pub fn image(&self) -> &FirmwareImage {
        &self.image
    }

    pub fn state(&self) -> BurnState {
        self.state
    }

    /// Run the complete burn: bootloader transition, prepare, transfer,
    /// verify, finalize.
    #[instrument(skip_all)]
    pub fn run(&mut self, finder: &dyn DeviceFinder) -> Result<(), BurnError> {
        self.ensure_bootloader(finder)?;
        self.prepare_burn()?;
        self.transfer()?;
        self.verify()?;
        self.finalize()
    }

    /// Make sure the unit runs its bootloader before burning.
    ///
    /// Already in the bootloader is a no-op. Otherwise: reset over the
    /// control channel, wait for the unit to settle, re-find it by address
    /// and adopt the rediscovered descriptor.
    pub fn ensure_bootloader(&mut self, finder: &dyn DeviceFinder) -> Result<(), BurnError> {
        if self.device.is_bootloader() {
            self.goto_state(BurnState::BootloaderEnsured);
            return Ok(());
        }

        self.log(LogLevel::Info, "resetting into bootloader");
        let mut pkt = Packet::new(RESET_CMD);
        pkt.sequence = rand::random();
        let response = match self.ctrl.exchange(&pkt) {
            Ok(r) => r,
            Err(e) => return self.abort(BurnStage::BootloaderReset, e.into()),
        };
        if !response.matches(RESET_ACK, &pkt) {
            return self.abort(
                BurnStage::BootloaderReset,
                BurnError::BootloaderTransitionFailed("reset was not acknowledged".into()),
            );
        }

        // Give the unit time to come back up in its bootloader.
        thread::sleep(self.settle_delay);

        let mut filter = DeviceAddr::new();
        filter.set("addr", self.device.addr().unwrap_or_default());
        let Some(device) = finder.find(&filter).into_iter().next() else {
            return self.abort(
                BurnStage::BootloaderReset,
                BurnError::BootloaderTransitionFailed(
                    "no device answered at the same address after reset".into(),
                ),
            );
        };
        if !device.is_bootloader() {
            return self.abort(
                BurnStage::BootloaderReset,
                BurnError::BootloaderTransitionFailed(
                    "device did not come back in bootloader mode".into(),
                ),
            );
        }

        self.device = device;
        self.goto_state(BurnState::BootloaderEnsured);
        Ok(())
    }

    /// Announce the burn, carrying image size and CRC.
    fn prepare_burn(&mut self) -> Result<(), BurnError> {
        self.log(LogLevel::Info, "preparing device for firmware load");
        let mut pkt = Packet::new(PREPARE_BURN_CMD);
        pkt.sequence = rand::random();
        pkt.len = self.image.size as u16;
        pkt.crc = self.image.crc;

        let response = match self.fw.exchange(&pkt) {
            Ok(r) => r,
            Err(e) => return self.abort(BurnStage::Prepare, e.into()),
        };
        if !response.matches(BURN_READY_ACK, &pkt) {
            return self.abort(BurnStage::Prepare, BurnError::PrepareFailed);
        }

        self.goto_state(BurnState::Prepared);
        Ok(())
    }

    /// Stream every block to the device, in address order.
    ///
    /// The first non-matching acknowledgment is fatal to the whole session;
    /// no block is retried.
    fn transfer(&mut self) -> Result<(), BurnError> {
        self.goto_state(BurnState::Transferring);
        let mut pkt = Packet::new(FILE_TRANSFER_CMD);
        pkt.sequence = rand::random();

        for block in 0..self.image.num_blocks {
            pkt.sequence = pkt.sequence.wrapping_add(1);
            pkt.addr = u32::from(block) * BLOCK_SIZE as u32;
            pkt.len = self.image.block_len(block) as u16;
            pkt.data = self.image.block(block);

            let response = match self.fw.exchange(&pkt) {
                Ok(r) => r,
                Err(e) => return self.abort(BurnStage::Transfer, e.into()),
            };
            if !response.matches(FILE_TRANSFER_ACK, &pkt) {
                return self.abort(BurnStage::Transfer, BurnError::TransferFailed { block });
            }

            self.observer.on_event(&BurnEvent::Progress {
                state: BurnState::Transferring,
                blocks_done: block + 1,
                num_blocks: self.image.num_blocks,
            });
        }

        Ok(())
    }

    /// Read every block back and compare it against the image.
    fn verify(&mut self) -> Result<(), BurnError> {
        self.goto_state(BurnState::Verifying);
        let mut pkt = Packet::new(READ_FW_CMD);
        pkt.sequence = rand::random();

        for block in 0..self.image.num_blocks {
            pkt.sequence = pkt.sequence.wrapping_add(1);
            pkt.addr = u32::from(block) * BLOCK_SIZE as u32;
            pkt.len = self.image.block_len(block) as u16;
            pkt.data = [0u8; BLOCK_SIZE];

            let response = match self.fw.exchange(&pkt) {
                Ok(r) => r,
                Err(e) => return self.abort(BurnStage::Verify, e.into()),
            };

            // Only the bytes actually present in this block take part in the
            // comparison; the final block's padding is not read back.
            let cmp_len = self.image.block_len(block);
            let start = usize::from(block) * BLOCK_SIZE;
            if !response.matches(READ_FW_ACK, &pkt)
                || response.packet.data[..cmp_len] != self.image.data[start..start + cmp_len]
            {
                return self.abort(BurnStage::Verify, BurnError::VerifyFailed { block });
            }

            self.observer.on_event(&BurnEvent::Progress {
                state: BurnState::Verifying,
                blocks_done: block + 1,
                num_blocks: self.image.num_blocks,
            });
        }

        // The converted image has served its purpose once read-back checks
        // out; the finalize exchange no longer needs it.
        self.image.discard();
        Ok(())
    }

    /// Commit the burned image.
    fn finalize(&mut self) -> Result<(), BurnError> {
        self.log(LogLevel::Info, "finalizing firmware load");
        let mut pkt = Packet::new(FINALIZE_BURN_CMD);
        pkt.sequence = rand::random();

        let response = match self.fw.exchange(&pkt) {
            Ok(r) => r,
            Err(e) => return self.abort(BurnStage::Finalize, e.into()),
        };
        if !response.matches(FINALIZE_ACK, &pkt) {
            return self.abort(BurnStage::Finalize, BurnError::FinalizeFailed);
        }

        self.goto_state(BurnState::Finalized);
        self.observer.on_event(&BurnEvent::Complete);
        Ok(())
    }

    fn goto_state(&mut self, to: BurnState) {
        let from = self.state;
        self.state = to;
        self.observer.on_event(&BurnEvent::StateChanged { from, to });
    }

    /// Terminal failure: delete the temporary image, record the aborting
    /// stage, and hand the error back.
    fn abort<T>(&mut self, stage: BurnStage, err: BurnError) -> Result<T, BurnError> {
        self.image.discard();
        self.goto_state(BurnState::Aborted(stage));
        Err(err)
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.observer.on_event(&BurnEvent::Log {
            level,
            message: message.into(),
        });
    }
}

fn open_channels(
    connector: &dyn Connector,
    addr: &str,
) -> Result<(Box<dyn Datagram>, Box<dyn Datagram>), TransportError> {
    let ctrl = connector.connect(addr, CTRL_PORT)?;
    let fw = connector.connect(addr, FW_PORT)?;
    Ok((ctrl, fw))
}
