//! Firmware image preparation.
//!
//! Turns a caller-supplied `.bin` or `.hex` file into the normalized image
//! the burn protocol consumes: flat bytes, size, block count and CRC-16.
//! A `.hex` input is first converted into a temporary `.bin` whose lifetime
//! the owning session controls.

pub mod hex;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crc::{CRC_16_MODBUS, Crc};
use tracing::{debug, warn};

use crate::error::BurnError;
use crate::protocol::constants::{BLOCK_SIZE, FIRMWARE_MAX_SIZE_BYTES};

/// Firmware checksum: 16-bit CRC, initial register 0xFFFF, reflected
/// polynomial 0xA001, no final XOR.
const FIRMWARE_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// CRC-16 over a whole image.
pub fn firmware_crc(data: &[u8]) -> u16 {
    FIRMWARE_CRC.checksum(data)
}

/// Number of 256-byte blocks needed to hold `size` bytes.
pub fn block_count(size: usize) -> u16 {
    (size.div_ceil(BLOCK_SIZE)) as u16
}

/// A normalized firmware image, constructed once and consumed read-only by
/// the burn and verify stages.
#[derive(Debug)]
pub struct FirmwareImage {
    /// Resolved on-disk path: the given `.bin`, or the converted temporary.
    pub path: PathBuf,
    /// Whether `path` is a temporary file this image owns.
    pub temporary: bool,
    /// Flat image bytes.
    pub data: Vec<u8>,
    /// Image size in bytes.
    pub size: u32,
    /// CRC-16 over the whole image.
    pub crc: u16,
    /// `ceil(size / 256)`.
    pub num_blocks: u16,
}

impl FirmwareImage {
    /// Normalize the file at `given_path` into a burnable image.
    ///
    /// `.bin` files are used in place; `.hex` files are decoded into a
    /// freshly named temporary file which the returned image owns. On any
    /// failure past that conversion the temporary is removed before the
    /// error returns.
    pub fn prepare(given_path: &Path) -> Result<Self, BurnError> {
        if !given_path.exists() {
            return Err(BurnError::FileNotFound(given_path.to_path_buf()));
        }

        let extension = given_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let (path, temporary) = match extension {
            "bin" => (given_path.to_path_buf(), false),
            "hex" => {
                let converted = temp_image_path();
                hex::convert_file(given_path, &converted).map_err(|e| match e {
                    hex::HexError::MalformedRecord { line, .. } => {
                        BurnError::MalformedHexRecord { line, source: e }
                    }
                    hex::HexError::RegionOverflow { end } => BurnError::ImageTooLarge {
                        actual: end as u64,
                        max: FIRMWARE_MAX_SIZE_BYTES as u64,
                    },
                    hex::HexError::Io(io) => BurnError::Io(io),
                })?;
                (converted, true)
            }
            other => {
                return Err(BurnError::UnsupportedImageFormat(format!(".{other}")));
            }
        };

        let mut image = Self {
            path,
            temporary,
            data: Vec::new(),
            size: 0,
            crc: 0,
            num_blocks: 0,
        };

        match fs::read(&image.path) {
            Ok(data) => image.data = data,
            Err(e) => {
                image.discard();
                return Err(e.into());
            }
        }

        if image.data.len() > FIRMWARE_MAX_SIZE_BYTES {
            let actual = image.data.len() as u64;
            image.discard();
            return Err(BurnError::ImageTooLarge {
                actual,
                max: FIRMWARE_MAX_SIZE_BYTES as u64,
            });
        }

        image.size = image.data.len() as u32;
        image.num_blocks = block_count(image.data.len());
        image.crc = firmware_crc(&image.data);

        debug!(
            path = %image.path.display(),
            size = image.size,
            blocks = image.num_blocks,
            crc = %format!("0x{:04X}", image.crc),
            "firmware image prepared"
        );
        Ok(image)
    }

    /// One block's payload, zero-padded to the full block size.
    pub fn block(&self, index: u16) -> [u8; BLOCK_SIZE] {
        let mut payload = [0u8; BLOCK_SIZE];
        let start = usize::from(index) * BLOCK_SIZE;
        let end = (start + BLOCK_SIZE).min(self.data.len());
        if start < end {
            payload[..end - start].copy_from_slice(&self.data[start..end]);
        }
        payload
    }

    /// Bytes actually present in one block: the full block size everywhere
    /// except possibly the last block.
    pub fn block_len(&self, index: u16) -> usize {
        let start = usize::from(index) * BLOCK_SIZE;
        self.data.len().saturating_sub(start).min(BLOCK_SIZE)
    }

    /// Delete the temporary converted file, if this image owns one.
    ///
    /// Idempotent: the file is removed at most once, on the first call.
    pub fn discard(&mut self) {
        if !self.temporary {
            return;
        }
        self.temporary = false;
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "could not remove converted image");
        }
    }
}

impl Drop for FirmwareImage {
    fn drop(&mut self) {
        self.discard();
    }
}

/// Freshly named temporary path for a converted image. The time-based
/// component keeps concurrent sessions from colliding.
fn temp_image_path() -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("refclock_fw_{stamp}.bin"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ihex::{Record, create_object_file_representation};

    #[test]
    fn test_crc_reference_vectors() {
        assert_eq!(firmware_crc(&[]), 0xFFFF);
        assert_eq!(firmware_crc(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_block_count_table() {
        for (size, blocks) in [(0, 0), (1, 1), (256, 1), (257, 2), (512, 2)] {
            assert_eq!(block_count(size), blocks, "size {size}");
        }
    }

    #[test]
    fn test_prepare_missing_file() {
        let missing = Path::new("/nonexistent/fw.bin");
        assert!(matches!(
            FirmwareImage::prepare(missing),
            Err(BurnError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_prepare_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.elf");
        fs::write(&path, b"whatever").unwrap();
        match FirmwareImage::prepare(&path) {
            Err(BurnError::UnsupportedImageFormat(ext)) => assert_eq!(ext, ".elf"),
            other => panic!("expected UnsupportedImageFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_prepare_rejects_oversize_bin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");
        fs::write(&path, vec![0u8; FIRMWARE_MAX_SIZE_BYTES + 1]).unwrap();
        assert!(matches!(
            FirmwareImage::prepare(&path),
            Err(BurnError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn test_prepare_bin_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");
        let payload: Vec<u8> = (0u16..300).map(|i| i as u8).collect();
        fs::write(&path, &payload).unwrap();

        let image = FirmwareImage::prepare(&path).unwrap();
        assert_eq!(image.path, path);
        assert!(!image.temporary);
        assert_eq!(image.size, 300);
        assert_eq!(image.num_blocks, 2);
        assert_eq!(image.crc, firmware_crc(&payload));

        drop(image);
        assert!(path.exists(), "a given .bin must never be deleted");
    }

    #[test]
    fn test_prepare_hex_owns_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.hex");
        let payload = vec![0x5Au8; 300];
        let text = create_object_file_representation(&[
            Record::Data {
                offset: 0,
                value: payload[..256].to_vec(),
            },
            Record::Data {
                offset: 256,
                value: payload[256..].to_vec(),
            },
            Record::EndOfFile,
        ])
        .unwrap();
        fs::write(&path, text).unwrap();

        let mut image = FirmwareImage::prepare(&path).unwrap();
        assert!(image.temporary);
        assert_ne!(image.path, path);
        assert!(image.path.exists());
        assert_eq!(image.data, payload);

        let converted = image.path.clone();
        image.discard();
        assert!(!converted.exists());
        assert!(!image.temporary);
        // Safe to call again.
        image.discard();
        assert!(path.exists(), "the given .hex must survive");
    }

    #[test]
    fn test_final_block_is_zero_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");
        fs::write(&path, vec![0xFFu8; 300]).unwrap();

        let image = FirmwareImage::prepare(&path).unwrap();
        let last = image.block(1);
        assert_eq!(image.block_len(1), 44);
        assert_eq!(&last[..44], &[0xFFu8; 44][..]);
        assert!(last[44..].iter().all(|&b| b == 0));
        assert_eq!(image.block_len(0), 256);
    }
}
