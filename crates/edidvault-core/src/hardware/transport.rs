//! Hardware seams: the DDC/I2C byte-level transport and the kernel's DRM
//! view of connector EDIDs.
//!
//! The raw ioctl layer lives outside this crate; production wiring supplies
//! an `EdidTransport` built on it, while the DRM side is plain sysfs reads
//! and is implemented here.

use crate::config::PathsConfig;
use crate::error::{EdidError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Byte-level access to a display's DDC EEPROM, addressed by I2C bus.
///
/// This is the same path used for writing and for the primary verification
/// read, which is exactly why a second, independent view exists.
#[async_trait]
pub trait EdidTransport: Send + Sync {
    /// Map a DRM connector name to the I2C bus identifier behind it.
    async fn resolve_bus(&self, connector: &str) -> Result<String>;

    /// Read `len` bytes of EDID from the EEPROM on `bus`.
    async fn read_edid(&self, bus: &str, len: usize) -> Result<Vec<u8>>;

    /// Write raw EDID bytes to the EEPROM on `bus`.
    async fn write_edid(&self, bus: &str, bytes: &[u8]) -> Result<()>;
}

/// The display subsystem's live view of connector EDIDs, independent of the
/// I2C path. Used for secondary verification and for read/enumerate
/// operations.
#[async_trait]
pub trait KernelEdidView: Send + Sync {
    /// Read the kernel's cached EDID for a connector.
    async fn read_edid(&self, connector: &str) -> Result<Vec<u8>>;

    /// Connectors currently exposing an EDID.
    async fn list_connectors(&self) -> Result<Vec<String>>;

    /// Whether the connector reports `connected`.
    async fn is_connected(&self, connector: &str) -> Result<bool>;
}

/// `KernelEdidView` over the DRM sysfs tree (`/sys/class/drm`).
#[derive(Debug)]
pub struct SysfsDrmView {
    root: PathBuf,
}

impl SysfsDrmView {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from(PathsConfig::DRM_SYSFS_ROOT),
        }
    }

    /// Use an alternate sysfs root (tests point this at a temp dir).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn connector_dir(&self, connector: &str) -> Result<PathBuf> {
        // A connector id is a single sysfs entry name such as
        // "card0-HDMI-A-1", never a path.
        if connector.is_empty() || connector.contains('/') || connector.contains("..") {
            return Err(EdidError::ConnectorNotFound {
                connector: connector.to_string(),
            });
        }
        let dir = self.root.join(connector);
        if !dir.is_dir() {
            return Err(EdidError::ConnectorNotFound {
                connector: connector.to_string(),
            });
        }
        Ok(dir)
    }
}

impl Default for SysfsDrmView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KernelEdidView for SysfsDrmView {
    async fn read_edid(&self, connector: &str) -> Result<Vec<u8>> {
        let path = self.connector_dir(connector)?.join("edid");
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| EdidError::io_with_path(e, &path))?;
        if bytes.is_empty() {
            // The node exists even with nothing attached; it reads empty
            return Err(EdidError::ConnectorNotFound {
                connector: connector.to_string(),
            });
        }
        Ok(bytes)
    }

    async fn list_connectors(&self) -> Result<Vec<String>> {
        let mut connectors = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| EdidError::io_with_path(e, &self.root))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EdidError::io_with_path(e, &self.root))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            // Connector entries look like card0-HDMI-A-1; bare card0 is the
            // device node itself
            if !name.starts_with("card") || !name.contains('-') {
                continue;
            }
            if entry.path().join("edid").is_file() {
                connectors.push(name);
            }
        }
        connectors.sort();
        Ok(connectors)
    }

    async fn is_connected(&self, connector: &str) -> Result<bool> {
        let path = self.connector_dir(connector)?.join("status");
        let status = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| EdidError::io_with_path(e, &path))?;
        Ok(status.trim() == "connected")
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory fakes for workflow tests.

    use super::*;
    use crate::cancel::CancellationToken;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scriptable transport: holds per-bus EEPROM contents and optional
    /// injected failures.
    #[derive(Default)]
    pub struct MockTransport {
        pub eeprom: Mutex<HashMap<String, Vec<u8>>>,
        pub fail_write: Mutex<Option<EdidError>>,
        pub fail_read: Mutex<bool>,
        /// When set, `read_edid` cancels this token mid-read, emulating an
        /// operator abort that lands while verification is in flight.
        pub cancel_on_read: Mutex<Option<CancellationToken>>,
        /// Bytes actually handed to `write_edid`, for assertions.
        pub writes: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl EdidTransport for MockTransport {
        async fn resolve_bus(&self, connector: &str) -> Result<String> {
            Ok(format!("i2c-{}", connector.len() % 10))
        }

        async fn read_edid(&self, bus: &str, len: usize) -> Result<Vec<u8>> {
            if let Some(token) = self.cancel_on_read.lock().unwrap().take() {
                token.cancel();
            }
            if *self.fail_read.lock().unwrap() {
                return Err(EdidError::Unreachable {
                    bus: bus.to_string(),
                    message: "injected read failure".to_string(),
                });
            }
            let eeprom = self.eeprom.lock().unwrap();
            let bytes = eeprom.get(bus).cloned().unwrap_or_default();
            Ok(bytes.into_iter().take(len).collect())
        }

        async fn write_edid(&self, bus: &str, bytes: &[u8]) -> Result<()> {
            if let Some(err) = self.fail_write.lock().unwrap().take() {
                return Err(err);
            }
            self.writes
                .lock()
                .unwrap()
                .push((bus.to_string(), bytes.to_vec()));
            self.eeprom
                .lock()
                .unwrap()
                .insert(bus.to_string(), bytes.to_vec());
            Ok(())
        }
    }

    /// Kernel view returning canned bytes per connector.
    #[derive(Default)]
    pub struct MockKernelView {
        pub edids: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl KernelEdidView for MockKernelView {
        async fn read_edid(&self, connector: &str) -> Result<Vec<u8>> {
            self.edids
                .lock()
                .unwrap()
                .get(connector)
                .cloned()
                .ok_or_else(|| EdidError::ConnectorNotFound {
                    connector: connector.to_string(),
                })
        }

        async fn list_connectors(&self) -> Result<Vec<String>> {
            let mut names: Vec<_> = self.edids.lock().unwrap().keys().cloned().collect();
            names.sort();
            Ok(names)
        }

        async fn is_connected(&self, connector: &str) -> Result<bool> {
            Ok(self.edids.lock().unwrap().contains_key(connector))
        }
    }
}
