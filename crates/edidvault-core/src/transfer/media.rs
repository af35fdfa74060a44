//! Removable-media discovery and mount scanning.
//!
//! Mount enumeration is a flat listing of the auto-mount root; everything
//! deeper (udev, partition tables) belongs to the platform, not this crate.

use crate::codec::{content_key, ContentKey};
use crate::config::PathsConfig;
use crate::error::{EdidError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One mounted removable destination.
#[derive(Debug, Clone, Serialize)]
pub struct MountInfo {
    pub path: PathBuf,
    pub name: String,
    pub read_only: bool,
}

/// Entry on a mount, flagged against the library during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct MediaEntry {
    pub name: String,
    pub already_exists: bool,
}

/// List directories under the media root as candidate mounts.
///
/// A missing media root is an empty listing, not an error: no media has
/// ever been attached on a fresh device.
pub fn list_mounts(media_root: &Path) -> Result<Vec<MountInfo>> {
    if !media_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut mounts = Vec::new();
    for entry in fs::read_dir(media_root).map_err(|e| EdidError::io_with_path(e, media_root))? {
        let entry = entry.map_err(|e| EdidError::io_with_path(e, media_root))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let read_only = !dir_is_writable(&path);
        mounts.push(MountInfo {
            path,
            name,
            read_only,
        });
    }
    mounts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(mounts)
}

/// Resolve a mount identifier to its directory, refusing anything that is
/// not a direct child of the media root (a mount id is a name, not a path).
pub fn resolve_mount(media_root: &Path, mount: &str) -> Result<PathBuf> {
    if mount.contains('/') || mount.contains("..") || mount.is_empty() {
        return Err(EdidError::MountNotFound {
            mount: mount.to_string(),
        });
    }
    let path = media_root.join(mount);
    if !path.is_dir() {
        return Err(EdidError::MountNotFound {
            mount: mount.to_string(),
        });
    }
    Ok(path)
}

/// Collect `.bin` files (case-insensitive) directly inside `dir` with their
/// content keys, sorted by name.
///
/// Keys are over the raw file bytes; a scan must see a truncated or
/// non-EDID `.bin` file too, so nothing is parsed here.
pub fn scan_dump_files(dir: &Path) -> Result<Vec<(String, ContentKey)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| EdidError::Other(format!("scan failed: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.to_lowercase().ends_with(PathsConfig::DUMP_SUFFIX) {
            continue;
        }
        let bytes =
            fs::read(entry.path()).map_err(|e| EdidError::io_with_path(e, entry.path()))?;
        files.push((name, content_key(&bytes)));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn dir_is_writable(dir: &Path) -> bool {
    // Probe with an actual temp file: permission bits alone lie on vfat
    // mounts, which is what USB sticks usually carry.
    tempfile::NamedTempFile::new_in(dir).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_mounts_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let mounts = list_mounts(&dir.path().join("nothing_here")).unwrap();
        assert!(mounts.is_empty());
    }

    #[test]
    fn test_list_mounts_sorted_dirs_only() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("usb1")).unwrap();
        fs::create_dir(root.path().join("stick")).unwrap();
        fs::write(root.path().join("loose.bin"), b"x").unwrap();

        let mounts = list_mounts(root.path()).unwrap();
        let names: Vec<_> = mounts.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["stick", "usb1"]);
        assert!(mounts.iter().all(|m| !m.read_only));
    }

    #[test]
    fn test_resolve_mount_rejects_traversal() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("usb1")).unwrap();

        assert!(resolve_mount(root.path(), "usb1").is_ok());
        assert!(matches!(
            resolve_mount(root.path(), "../etc").unwrap_err(),
            EdidError::MountNotFound { .. }
        ));
        assert!(matches!(
            resolve_mount(root.path(), "gone").unwrap_err(),
            EdidError::MountNotFound { .. }
        ));
    }

    #[test]
    fn test_scan_dump_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("B.BIN"), b"beta").unwrap();
        fs::write(dir.path().join("a.bin"), b"alpha").unwrap();
        fs::write(dir.path().join("notes.txt"), b"no").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.bin"), b"deep").unwrap();

        let files = scan_dump_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["B.BIN", "a.bin"]);
        assert_eq!(files[1].1, content_key(b"alpha"));
    }
}
