//! Burn-session error taxonomy.
//!
//! Every variant is terminal to the session it came from; nothing here is
//! retried internally. Zero devices found is not an error and is reported
//! as an `Ok(None)` setup outcome instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::discovery::DeviceListing;
use crate::image::hex::HexError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum BurnError {
    #[error("could not find image at path \"{0}\"")]
    FileNotFound(PathBuf),

    #[error("invalid extension \"{0}\"; extension must be .hex or .bin")]
    UnsupportedImageFormat(String),

    #[error("firmware image too large: {actual} vs. {max} bytes")]
    ImageTooLarge { actual: u64, max: u64 },

    #[error("malformed Intel HEX record at line {line}: {source}")]
    MalformedHexRecord {
        line: usize,
        #[source]
        source: HexError,
    },

    #[error("could not resolve given filters to a single device ({} candidates)", .0.len())]
    AmbiguousDevice(Vec<DeviceListing>),

    #[error("failed to reset device into its bootloader: {0}")]
    BootloaderTransitionFailed(String),

    #[error("device rejected burn preparation")]
    PrepareFailed,

    #[error("firmware transfer failed at block {block}")]
    TransferFailed { block: u16 },

    #[error("firmware verification failed at block {block}")]
    VerifyFailed { block: u16 },

    #[error("device failed to finalize the firmware burn")]
    FinalizeFailed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
