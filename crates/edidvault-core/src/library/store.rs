//! File-backed dump store.
//!
//! Each dump is one binary file of raw EDID bytes under a canonical name.
//! All derived fields are recomputed by the codec on demand, so there is no
//! sidecar metadata to keep consistent. Replacement writes go through a temp
//! file in the same directory followed by an atomic rename, so a concurrent
//! reader sees either the old or the fully-written new content.

use crate::codec::{ContentKey, EdidBlock};
use crate::config::PathsConfig;
use crate::error::{EdidError, Result};
use crate::library::naming;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A named dump held by the library. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    /// Canonical filename, unique within the library.
    pub filename: String,
    /// Parsed content.
    pub content: EdidBlock,
}

/// Persistent store of named EDID dumps.
#[derive(Debug)]
pub struct DumpLibrary {
    root: PathBuf,
}

impl DumpLibrary {
    /// Open (creating if needed) the dump directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| EdidError::io_with_path(e, &root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a dump file (which may not exist yet).
    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Save raw EDID bytes under an operator-supplied name.
    ///
    /// The name is sanitized and the `.bin` suffix appended when absent.
    /// Saving identical content under an existing name is an idempotent
    /// no-op returning the existing record; same name with different content
    /// fails with `AlreadyExists`. The bytes must parse as a well-formed
    /// EDID block sequence.
    pub fn save(&self, name: &str, raw: &[u8]) -> Result<DumpRecord> {
        let filename = naming::normalize(name)?;
        let content = EdidBlock::parse(raw.to_vec())?;
        let path = self.path_of(&filename);

        if path.exists() {
            let existing = self.get(&filename)?;
            if existing.as_bytes() == raw {
                debug!(filename, "save is a no-op: identical content already stored");
                return Ok(DumpRecord {
                    filename,
                    content: existing,
                });
            }
            return Err(EdidError::AlreadyExists { filename });
        }

        self.write_atomic(&path, raw)?;
        info!(filename, bytes = raw.len(), "saved EDID dump");

        Ok(DumpRecord { filename, content })
    }

    /// Load a dump by canonical filename.
    pub fn get(&self, filename: &str) -> Result<EdidBlock> {
        let path = self.path_of(filename);
        if !path.exists() {
            return Err(EdidError::DumpNotFound {
                filename: filename.to_string(),
            });
        }
        let raw = fs::read(&path).map_err(|e| EdidError::io_with_path(e, &path))?;
        EdidBlock::parse(raw)
    }

    /// Canonical filenames in the library, lexicographically sorted.
    ///
    /// Sorted order is stable across restarts, which matching and transfer
    /// previews rely on for reproducible output.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| EdidError::io_with_path(e, &self.root))?
        {
            let entry = entry.map_err(|e| EdidError::io_with_path(e, &self.root))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.to_lowercase().ends_with(PathsConfig::DUMP_SUFFIX) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Content key of every stored dump, in `list()` order.
    ///
    /// Files that fail to read or parse are skipped rather than failing the
    /// whole listing; a half-copied stray file must not wedge matching.
    pub fn content_keys(&self) -> Result<Vec<(String, ContentKey)>> {
        let mut keys = Vec::new();
        for name in self.list()? {
            match self.get(&name) {
                Ok(block) => keys.push((name, block.content_key())),
                Err(e) => {
                    tracing::warn!(filename = %name, error = %e, "skipping unreadable dump");
                }
            }
        }
        Ok(keys)
    }

    /// Write bytes to `path` via a same-directory temp file and rename.
    fn write_atomic(&self, path: &Path, raw: &[u8]) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| EdidError::io_with_path(e, &self.root))?;
        tmp.write_all(raw)
            .map_err(|e| EdidError::io_with_path(e, tmp.path()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| EdidError::io_with_path(e, tmp.path()))?;
        tmp.persist(path)
            .map_err(|e| EdidError::io_with_path(e.error, path))?;
        Ok(())
    }
}
