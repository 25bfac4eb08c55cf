//! Protocol constants for the refclock firmware-update protocol.
//!
//! The device listens on two UDP ports: a control port for management
//! commands (query, reset) and a firmware port for the burn protocol.
//! Command and acknowledgment codes are 4-byte ASCII tags.

// ============================================================================
// Device Identification
// ============================================================================

/// `type` value reported by a unit running its application firmware.
pub const DEVICE_TYPE: &str = "refclock";

/// `type` value reported by a unit running its bootloader.
pub const BOOTLOADER_TYPE: &str = "refclock-bootloader";

/// Hardware revision assumed when a descriptor omits `revision`.
pub const DEFAULT_REVISION: &str = "4";

// ============================================================================
// Transport
// ============================================================================

/// UDP port for control-plane commands.
pub const CTRL_PORT: u16 = 50000;

/// UDP port for firmware-plane commands.
pub const FW_PORT: u16 = 50002;

// ============================================================================
// Size Constants
// ============================================================================

/// Firmware block size for transfer and read-back.
pub const BLOCK_SIZE: usize = 256;

/// Maximum firmware image size. The tail of flash belongs to the bootloader.
pub const FIRMWARE_MAX_SIZE_BYTES: usize = 1024 * 120;

// ============================================================================
// Timing
// ============================================================================

/// Delay after a reset before the bootloader answers discovery.
pub const SETTLE_DELAY_MS: u64 = 500;

/// Default time to wait for a command response.
pub const RESPONSE_TIMEOUT_MS: u64 = 2000;

// ============================================================================
// Command Codes (Host -> Device)
// ============================================================================

/// Status query.
pub const QUERY_CMD: u32 = 0x5152_593F; // 'QRY?'

/// Reset into the bootloader (or restart it).
pub const RESET_CMD: u32 = 0x5253_5421; // 'RST!'

/// Announce an impending burn, carrying image size and CRC.
pub const PREPARE_BURN_CMD: u32 = 0x5052_4550; // 'PREP'

/// Transfer one firmware block at `addr`.
pub const FILE_TRANSFER_CMD: u32 = 0x5846_4552; // 'XFER'

/// Read back one firmware block at `addr`.
pub const READ_FW_CMD: u32 = 0x5245_4144; // 'READ'

/// Commit the burned image and leave burn mode.
pub const FINALIZE_BURN_CMD: u32 = 0x4649_4E49; // 'FINI'

// ============================================================================
// Acknowledgment Codes (Device -> Host)
// ============================================================================

pub const QUERY_ACK: u32 = 0x5152_5921; // 'QRY!'
pub const RESET_ACK: u32 = 0x5253_5441; // 'RSTA'
pub const BURN_READY_ACK: u32 = 0x4252_4459; // 'BRDY'
pub const FILE_TRANSFER_ACK: u32 = 0x5846_5241; // 'XFRA'
pub const READ_FW_ACK: u32 = 0x5244_4154; // 'RDAT'
pub const FINALIZE_ACK: u32 = 0x4649_4E41; // 'FINA'

// ============================================================================
// Query ACK payload layout
// ============================================================================

/// `data` byte that is nonzero when the unit is running its bootloader.
pub const QUERY_MODE_BYTE: usize = 0;

/// `data` byte carrying the hardware revision.
pub const QUERY_REVISION_BYTE: usize = 1;

/// Render a command code as its ASCII tag for logging.
pub fn code_tag(code: u32) -> String {
    code.to_be_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_tags() {
        assert_eq!(code_tag(RESET_CMD), "RST!");
        assert_eq!(code_tag(BURN_READY_ACK), "BRDY");
        assert_eq!(code_tag(0x0001_0203), "....");
    }
}
