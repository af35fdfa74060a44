//! EDID Vault Core - headless library for EDID capture and management.
//!
//! This crate owns the part of the system with real engineering substance:
//! the EDID binary codec, the content-addressed dump library and matcher,
//! the transactional USB import/export protocol, and the write-then-verify
//! EEPROM workflow. The HTTP presentation layer lives in `edidvault-rpc`.
//!
//! # Example
//!
//! ```rust,ignore
//! use edidvault_core::{EdidVault, SysfsDrmView};
//! use std::sync::Arc;
//!
//! # async fn demo(transport: Arc<dyn edidvault_core::EdidTransport>) -> edidvault_core::Result<()> {
//! let vault = EdidVault::new("/var/lib/edidvault", transport, Arc::new(SysfsDrmView::new()))?;
//! let raw = vault.read_edid("card0-HDMI-A-1").await?;
//! let decoded = vault.decode(&raw)?;
//! println!("{} {:04X}", decoded.manufacturer, decoded.product_code);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod codec;
pub mod config;
pub mod error;
pub mod hardware;
pub mod library;
pub mod transfer;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use codec::{content_key, format_hex, ContentKey, DecodedEdid, EdidBlock};
pub use error::{EdidError, Result};
pub use hardware::{
    EdidTransport, KernelEdidView, SysfsDrmView, WriteOutcome, WriteReport, WriteRequest,
    WriteVerifyWorkflow,
};
pub use library::{DumpLibrary, DumpRecord};
pub use transfer::{Direction, MediaEntry, MountInfo, TransferOutcome, TransferPlan};

use crate::config::PathsConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

/// Main entry point: owns the dump library, the hardware seams, and the
/// per-connector / per-mount exclusive sections.
///
/// One logical operation runs per connector and per mount at a time;
/// operations on distinct connectors or mounts proceed independently.
pub struct EdidVault {
    library: DumpLibrary,
    media_root: PathBuf,
    kernel: Arc<dyn KernelEdidView>,
    workflow: WriteVerifyWorkflow,
    connector_locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    mount_locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl EdidVault {
    /// Open the vault rooted at `root` (dumps land in `root/edid_files`).
    pub fn new(
        root: impl Into<PathBuf>,
        transport: Arc<dyn EdidTransport>,
        kernel: Arc<dyn KernelEdidView>,
    ) -> Result<Self> {
        let root = root.into();
        let library = DumpLibrary::open(root.join(PathsConfig::DUMP_DIR_NAME))?;
        info!(root = %root.display(), "opened EDID vault");

        Ok(Self {
            library,
            media_root: PathBuf::from(PathsConfig::MEDIA_ROOT),
            workflow: WriteVerifyWorkflow::new(transport, kernel.clone()),
            kernel,
            connector_locks: StdMutex::new(HashMap::new()),
            mount_locks: StdMutex::new(HashMap::new()),
        })
    }

    /// Use an alternate removable-media root (tests point this at a temp
    /// dir).
    pub fn with_media_root(mut self, media_root: impl Into<PathBuf>) -> Self {
        self.media_root = media_root.into();
        self
    }

    pub fn library(&self) -> &DumpLibrary {
        &self.library
    }

    // ========================================
    // Read / decode / match / save
    // ========================================

    /// Read the attached display's EDID via the kernel view.
    pub async fn read_edid(&self, connector: &str) -> Result<Vec<u8>> {
        self.kernel.read_edid(connector).await
    }

    /// Connectors currently exposing an EDID.
    pub async fn list_connectors(&self) -> Result<Vec<String>> {
        self.kernel.list_connectors().await
    }

    /// Decode raw bytes into the structured record.
    pub fn decode(&self, raw: &[u8]) -> Result<DecodedEdid> {
        Ok(EdidBlock::parse(raw.to_vec())?.decoded())
    }

    /// Every library entry byte-identical to `raw`, in library order.
    pub fn match_edid(&self, raw: &[u8]) -> Result<Vec<DumpRecord>> {
        library::find_matches(raw, &self.library)
    }

    /// Save raw bytes under an operator-supplied name.
    pub fn save_dump(&self, name: &str, raw: &[u8]) -> Result<DumpRecord> {
        self.library.save(name, raw)
    }

    /// Stored dump filenames, sorted.
    pub fn list_dumps(&self) -> Result<Vec<String>> {
        self.library.list()
    }

    // ========================================
    // Removable media transfer
    // ========================================

    /// Mounted removable destinations under the media root.
    pub fn list_mounts(&self) -> Result<Vec<MountInfo>> {
        transfer::list_mounts(&self.media_root)
    }

    /// Scan a mount for dump files, flagging content already in the
    /// library (regardless of the name it is stored under).
    pub fn scan_mount(&self, mount: &str) -> Result<Vec<MediaEntry>> {
        let dir = transfer::resolve_mount(&self.media_root, mount)?;
        let library_keys: std::collections::HashSet<ContentKey> = self
            .library
            .content_keys()?
            .into_iter()
            .map(|(_, key)| key)
            .collect();

        Ok(transfer::scan_dump_files(&dir)?
            .into_iter()
            .map(|(name, key)| MediaEntry {
                name,
                already_exists: library_keys.contains(&key),
            })
            .collect())
    }

    /// Dry run: classify what a transfer in `direction` would do.
    ///
    /// Recomputed from current state on every call; callers must preview
    /// again right before committing, since nothing is locked in between.
    pub fn transfer_preview(&self, mount: &str, direction: Direction) -> Result<TransferPlan> {
        let dir = transfer::resolve_mount(&self.media_root, mount)?;
        let (candidates, destination) = match direction {
            Direction::Import => (transfer::scan_dump_files(&dir)?, self.library.content_keys()?),
            Direction::Export => (self.library.content_keys()?, transfer::scan_dump_files(&dir)?),
        };
        Ok(transfer::plan(&candidates, &destination))
    }

    /// Commit a transfer. Destructive for the destination set, so it
    /// requires the operator's explicit confirmation of the previewed
    /// counts.
    ///
    /// Internally re-plans against current state before copying, and each
    /// item is re-checked again at copy time.
    pub async fn transfer_commit(
        &self,
        mount: &str,
        direction: Direction,
        confirmed: bool,
        cancel: &CancellationToken,
    ) -> Result<TransferOutcome> {
        if !confirmed {
            return Err(EdidError::PreconditionUnmet {
                message: format!("{} from {} requires explicit confirmation", direction.as_str(), mount),
            });
        }
        // A token cancelled before any copying starts aborts the whole
        // commit; mid-run cancellation is reported in the outcome instead
        cancel.check()?;

        let lock = self.mount_lock(mount);
        let _guard = lock.lock().await;

        let dir = transfer::resolve_mount(&self.media_root, mount)?;
        let plan = self.transfer_preview(mount, direction)?;
        let (source, destination): (&Path, &Path) = match direction {
            Direction::Import => (&dir, self.library.root()),
            Direction::Export => (self.library.root(), &dir),
        };

        info!(
            mount,
            direction = direction.as_str(),
            new = plan.new_items.len(),
            skipped = plan.existing_items.len(),
            "committing transfer"
        );
        Ok(transfer::commit(&plan, source, destination, cancel))
    }

    // ========================================
    // Device write
    // ========================================

    /// Write a stored dump to the device behind `connector` and verify via
    /// both paths. Exclusive per connector from write to terminal state.
    pub async fn write_edid(&self, request: &WriteRequest) -> Result<WriteReport> {
        let lock = self.connector_lock(&request.connector);
        let _guard = lock.lock().await;
        self.workflow.run(&self.library, request).await
    }

    fn connector_lock(&self, connector: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.connector_locks.lock().expect("connector lock map poisoned");
        map.entry(connector.to_string()).or_default().clone()
    }

    fn mount_lock(&self, mount: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.mount_locks.lock().expect("mount lock map poisoned");
        map.entry(mount.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testutil::test_block;
    use crate::hardware::transport::mock::{MockKernelView, MockTransport};
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        _media: TempDir,
        media_root: PathBuf,
        vault: EdidVault,
        kernel: Arc<MockKernelView>,
    }

    fn setup() -> Fixture {
        let root = TempDir::new().unwrap();
        let media = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::default());
        let kernel = Arc::new(MockKernelView::default());
        let vault = EdidVault::new(root.path(), transport, kernel.clone())
            .unwrap()
            .with_media_root(media.path());
        let media_root = media.path().to_path_buf();
        Fixture {
            _root: root,
            _media: media,
            media_root,
            vault,
            kernel,
        }
    }

    #[tokio::test]
    async fn test_read_decode_save_match_flow() {
        let fx = setup();
        let edid = test_block(|raw| {
            raw[8] = 0x10;
            raw[9] = 0xAC;
        });
        fx.kernel
            .edids
            .lock()
            .unwrap()
            .insert("card0-DP-1".to_string(), edid.clone());

        let raw = fx.vault.read_edid("card0-DP-1").await.unwrap();
        assert_eq!(fx.vault.decode(&raw).unwrap().manufacturer, "DEL");

        assert!(fx.vault.match_edid(&raw).unwrap().is_empty());
        fx.vault.save_dump("bench", &raw).unwrap();

        let matches = fx.vault.match_edid(&raw).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].filename, "bench.bin");
        assert_eq!(fx.vault.list_dumps().unwrap(), vec!["bench.bin"]);
    }

    #[tokio::test]
    async fn test_scan_mount_flags_known_content() {
        let fx = setup();
        let known = test_block(|raw| raw[12] = 1);
        let fresh = test_block(|raw| raw[12] = 2);
        fx.vault.save_dump("known", &known).unwrap();

        let mount_dir = fx.media_root.join("usb1");
        std::fs::create_dir(&mount_dir).unwrap();
        // Same content under a different name still counts as known
        std::fs::write(mount_dir.join("other_name.bin"), &known).unwrap();
        std::fs::write(mount_dir.join("fresh.bin"), &fresh).unwrap();

        let entries = fx.vault.scan_mount("usb1").unwrap();
        let flags: Vec<_> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.already_exists))
            .collect();
        assert_eq!(flags, [("fresh.bin", false), ("other_name.bin", true)]);
    }

    #[tokio::test]
    async fn test_import_preview_commit_repreview() {
        let fx = setup();
        let shared = test_block(|raw| raw[12] = 1);
        let new_a = test_block(|raw| raw[12] = 2);
        let new_b = test_block(|raw| raw[12] = 3);
        fx.vault.save_dump("shared", &shared).unwrap();

        let mount_dir = fx.media_root.join("usb1");
        std::fs::create_dir(&mount_dir).unwrap();
        std::fs::write(mount_dir.join("shared.bin"), &shared).unwrap();
        std::fs::write(mount_dir.join("a.bin"), &new_a).unwrap();
        std::fs::write(mount_dir.join("b.bin"), &new_b).unwrap();

        let plan = fx.vault.transfer_preview("usb1", Direction::Import).unwrap();
        assert_eq!(plan.new_items.len(), 2);
        assert_eq!(plan.existing_items.len(), 1);

        let outcome = fx
            .vault
            .transfer_commit("usb1", Direction::Import, true, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.transferred.len(), 2);
        assert_eq!(outcome.skipped.len(), 1);

        let plan = fx.vault.transfer_preview("usb1", Direction::Import).unwrap();
        assert!(plan.new_items.is_empty());
        assert_eq!(plan.existing_items.len(), 3);
    }

    #[tokio::test]
    async fn test_export_commit() {
        let fx = setup();
        let a = test_block(|raw| raw[12] = 1);
        fx.vault.save_dump("a", &a).unwrap();
        std::fs::create_dir(fx.media_root.join("usb1")).unwrap();

        let outcome = fx
            .vault
            .transfer_commit("usb1", Direction::Export, true, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.transferred, vec!["a.bin"]);
        assert!(fx.media_root.join("usb1").join("a.bin").exists());
    }

    #[tokio::test]
    async fn test_commit_requires_confirmation() {
        let fx = setup();
        std::fs::create_dir(fx.media_root.join("usb1")).unwrap();
        let err = fx
            .vault
            .transfer_commit("usb1", Direction::Import, false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EdidError::PreconditionUnmet { .. }));
    }

    #[tokio::test]
    async fn test_commit_with_cancelled_token_is_an_error() {
        let fx = setup();
        std::fs::create_dir(fx.media_root.join("usb1")).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fx
            .vault
            .transfer_commit("usb1", Direction::Import, true, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EdidError::Cancelled));
        assert_eq!(err.to_rpc_error_code(), -32004);
    }

    #[tokio::test]
    async fn test_unknown_mount_is_an_error() {
        let fx = setup();
        assert!(matches!(
            fx.vault.scan_mount("nope").unwrap_err(),
            EdidError::MountNotFound { .. }
        ));
        assert!(matches!(
            fx.vault
                .transfer_preview("nope", Direction::Import)
                .unwrap_err(),
            EdidError::MountNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_write_edid_through_facade() {
        let fx = setup();
        let edid = test_block(|_| {});
        fx.vault.save_dump("target", &edid).unwrap();
        fx.kernel
            .edids
            .lock()
            .unwrap()
            .insert("card0-DP-1".to_string(), edid.clone());

        let report = fx
            .vault
            .write_edid(&WriteRequest {
                connector: "card0-DP-1".to_string(),
                filename: "target.bin".to_string(),
                confirmed: true,
                cancel: CancellationToken::new(),
            })
            .await
            .unwrap();
        assert_eq!(report.outcome, WriteOutcome::Success);
        assert_eq!(report.connector, "card0-DP-1");
    }
}
