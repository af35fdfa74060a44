//! Centralized configuration for EDID Vault.
//!
//! Constants for the dump store layout, removable-media discovery, and the
//! DDC transport.

use std::time::Duration;

/// Shared directory and path configuration.
pub struct PathsConfig;

impl PathsConfig {
    /// Directory under the vault root holding saved dumps.
    pub const DUMP_DIR_NAME: &'static str = "edid_files";
    /// Canonical suffix for binary dump files.
    pub const DUMP_SUFFIX: &'static str = ".bin";
    /// Where removable media lands when auto-mounted.
    pub const MEDIA_ROOT: &'static str = "/media";
    /// DRM sysfs tree used by the secondary verification path.
    pub const DRM_SYSFS_ROOT: &'static str = "/sys/class/drm";
}

/// DDC/I2C transport configuration.
pub struct TransportConfig;

impl TransportConfig {
    /// I2C address of the DDC EEPROM.
    pub const EDID_I2C_ADDR: u8 = 0x50;
    /// Inter-byte settle delay for EEPROM byte writes.
    pub const WRITE_BYTE_DELAY: Duration = Duration::from_millis(10);
}

/// EDID structure constants.
pub struct EdidLayout;

impl EdidLayout {
    /// Fixed magic pattern at the start of every base block.
    pub const MAGIC: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
    /// Length of one EDID block.
    pub const BLOCK_LEN: usize = 128;
    /// Bytes per line in the formatted hex dump.
    pub const HEX_LINE_WIDTH: usize = 16;
}
