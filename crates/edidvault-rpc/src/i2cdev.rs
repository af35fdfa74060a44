//! Byte-level DDC EEPROM transport over the Linux i2c-dev interface.
//!
//! This is deliberately dumb plumbing: set the slave address, stream bytes.
//! All sequencing, verification, and safety gating live in
//! `edidvault_core::hardware::workflow`.

// This module owns an intentional OS boundary (i2c-dev ioctl); each unsafe
// block is documented with SAFETY.
#![allow(unsafe_code)]

use async_trait::async_trait;
use edidvault_core::config::{PathsConfig, TransportConfig};
use edidvault_core::{EdidError, EdidTransport, Result};
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use tracing::debug;

/// `ioctl` request selecting the target slave address on an i2c-dev fd.
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// EDID EEPROMs use single-byte offsets; nothing past 256 is addressable.
const EEPROM_ADDRESS_SPACE: usize = 256;

/// DDC EEPROM transport over `/dev/i2c-N`.
pub struct I2cDevTransport {
    drm_root: PathBuf,
    dev_root: PathBuf,
}

impl I2cDevTransport {
    pub fn new() -> Self {
        Self {
            drm_root: PathBuf::from(PathsConfig::DRM_SYSFS_ROOT),
            dev_root: PathBuf::from("/dev"),
        }
    }

    fn open_bus(&self, bus: &str) -> Result<std::fs::File> {
        let path = self.dev_root.join(bus);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| match e.raw_os_error() {
                Some(libc::EBUSY) => EdidError::BusBusy {
                    bus: bus.to_string(),
                },
                _ => EdidError::Unreachable {
                    bus: bus.to_string(),
                    message: e.to_string(),
                },
            })?;

        // SAFETY: fd is a valid, open i2c-dev descriptor owned by `file`;
        // I2C_SLAVE only stores the 7-bit address in the driver and reads
        // no user memory beyond the integer argument.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                I2C_SLAVE,
                TransportConfig::EDID_I2C_ADDR as libc::c_ulong,
            )
        };
        if rc < 0 {
            return Err(EdidError::Unreachable {
                bus: bus.to_string(),
                message: format!(
                    "I2C_SLAVE ioctl failed: {}",
                    std::io::Error::last_os_error()
                ),
            });
        }
        Ok(file)
    }
}

impl Default for I2cDevTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EdidTransport for I2cDevTransport {
    async fn resolve_bus(&self, connector: &str) -> Result<String> {
        if connector.is_empty() || connector.contains('/') || connector.contains("..") {
            return Err(EdidError::ConnectorNotFound {
                connector: connector.to_string(),
            });
        }
        let dir = self.drm_root.join(connector);

        // Preferred: the `ddc` symlink points at the i2c adapter
        let ddc = dir.join("ddc");
        if let Ok(target) = std::fs::read_link(&ddc) {
            if let Some(name) = target.file_name().and_then(|n| n.to_str()) {
                if name.starts_with("i2c-") {
                    return Ok(name.to_string());
                }
            }
        }

        // Fallback: an i2c-N child directory
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with("i2c-") {
                    return Ok(name);
                }
            }
        }

        Err(EdidError::ConnectorNotFound {
            connector: connector.to_string(),
        })
    }

    async fn read_edid(&self, bus: &str, len: usize) -> Result<Vec<u8>> {
        let this = self.clone_paths();
        let bus = bus.to_string();
        tokio::task::spawn_blocking(move || {
            let mut file = this.open_bus(&bus)?;

            // Reset the EEPROM's internal offset, then stream
            file.write_all(&[0u8]).map_err(|e| EdidError::Unreachable {
                bus: bus.clone(),
                message: format!("offset reset failed: {}", e),
            })?;

            let mut buf = vec![0u8; len.min(EEPROM_ADDRESS_SPACE)];
            file.read_exact(&mut buf)
                .map_err(|e| EdidError::Unreachable {
                    bus: bus.clone(),
                    message: format!("EDID read failed: {}", e),
                })?;
            debug!(bus = %bus, len = buf.len(), "read EDID from EEPROM");
            Ok(buf)
        })
        .await
        .map_err(|e| EdidError::Other(format!("I2C read task failed: {}", e)))?
    }

    async fn write_edid(&self, bus: &str, bytes: &[u8]) -> Result<()> {
        if bytes.len() > EEPROM_ADDRESS_SPACE {
            return Err(EdidError::ShortWrite {
                bus: bus.to_string(),
                written: 0,
                expected: bytes.len(),
            });
        }
        let this = self.clone_paths();
        let bus = bus.to_string();
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut file = this.open_bus(&bus)?;

            // Presence check: an absent EEPROM fails here, not halfway in
            let mut probe = [0u8; 1];
            file.read_exact(&mut probe)
                .map_err(|e| EdidError::Unreachable {
                    bus: bus.clone(),
                    message: format!("EEPROM presence check failed: {}", e),
                })?;

            // Byte-at-a-time writes with a settle delay; EEPROM pages are
            // too small to trust bulk writes across vendors
            for (offset, value) in bytes.iter().enumerate() {
                let frame = [offset as u8, *value];
                let written = file.write(&frame).map_err(|e| EdidError::Unreachable {
                    bus: bus.clone(),
                    message: format!("write at offset {} failed: {}", offset, e),
                })?;
                if written != frame.len() {
                    return Err(EdidError::ShortWrite {
                        bus: bus.clone(),
                        written: offset,
                        expected: bytes.len(),
                    });
                }
                std::thread::sleep(TransportConfig::WRITE_BYTE_DELAY);
            }
            debug!(bus = %bus, len = bytes.len(), "wrote EDID to EEPROM");
            Ok(())
        })
        .await
        .map_err(|e| EdidError::Other(format!("I2C write task failed: {}", e)))?
    }
}

impl I2cDevTransport {
    fn clone_paths(&self) -> Self {
        Self {
            drm_root: self.drm_root.clone(),
            dev_root: self.dev_root.clone(),
        }
    }
}
