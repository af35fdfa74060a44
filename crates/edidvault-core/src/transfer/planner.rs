//! Two-phase transfer planning between the dump library and removable media.
//!
//! `plan` is a pure dry run over (filename, content key) sets; `commit`
//! copies item by item with per-item failure recording and a pre-copy
//! re-check of the destination, because nothing is locked across the
//! preview-confirm gap.

use crate::cancel::CancellationToken;
use crate::codec::content_key;
use crate::error::{EdidError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::codec::ContentKey;

/// Which way dumps flow between the library and a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Removable media into the library.
    Import,
    /// Library onto removable media.
    Export,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Import => "import",
            Direction::Export => "export",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "import" => Some(Direction::Import),
            "export" => Some(Direction::Export),
            _ => None,
        }
    }
}

/// Dry-run classification of candidate files against a destination.
///
/// Ephemeral by design: the destination may change between calls, so every
/// preview recomputes from current state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferPlan {
    /// Candidates absent from the destination, or present under the same
    /// name with different content (surfaced as new, never silently
    /// dropped).
    pub new_items: Vec<String>,
    /// Candidates already present with the same name and same content.
    pub existing_items: Vec<String>,
}

/// One failed item during `commit`.
#[derive(Debug, Clone, Serialize)]
pub struct TransferFailure {
    pub filename: String,
    pub error: String,
}

/// Result of a `commit` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferOutcome {
    pub transferred: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<TransferFailure>,
    /// True when the run stopped early on operator cancellation.
    /// Already-copied items stay in place; re-running is safe because a
    /// fresh plan reclassifies them as existing.
    pub cancelled: bool,
}

/// Classify candidates against the destination.
///
/// A candidate is existing iff the destination holds an entry with the same
/// filename AND the same content key. A same-named entry with different
/// content is a collision the operator must see, so it stays new.
pub fn plan(
    candidates: &[(String, ContentKey)],
    destination: &[(String, ContentKey)],
) -> TransferPlan {
    let dest_keys: HashMap<&str, &ContentKey> = destination
        .iter()
        .map(|(name, key)| (name.as_str(), key))
        .collect();

    let mut result = TransferPlan::default();
    for (name, key) in candidates {
        match dest_keys.get(name.as_str()) {
            Some(existing) if *existing == key => result.existing_items.push(name.clone()),
            _ => result.new_items.push(name.clone()),
        }
    }
    result
}

/// Copy the plan's new items from `source_dir` to `dest_dir`.
///
/// Each item is independent: a failure is recorded and the batch continues;
/// nothing already copied is ever rolled back. The destination is re-checked
/// per item immediately before the copy, so a file that appeared in the gap
/// is skipped when identical and reported as a conflict when different.
pub fn commit(
    plan: &TransferPlan,
    source_dir: &Path,
    dest_dir: &Path,
    cancel: &CancellationToken,
) -> TransferOutcome {
    let mut outcome = TransferOutcome {
        skipped: plan.existing_items.clone(),
        ..Default::default()
    };

    for name in &plan.new_items {
        if cancel.is_cancelled() {
            warn!(remaining = plan.new_items.len() - outcome.transferred.len(),
                  "transfer commit cancelled; partial progress kept");
            outcome.cancelled = true;
            break;
        }

        match copy_one(name, source_dir, dest_dir) {
            Ok(CopyResult::Copied) => outcome.transferred.push(name.clone()),
            Ok(CopyResult::AlreadyIdentical) => {
                debug!(filename = %name, "destination gained identical file since plan; skipping");
                outcome.skipped.push(name.clone());
            }
            Err(e) => {
                warn!(filename = %name, error = %e, "transfer item failed");
                outcome.failures.push(TransferFailure {
                    filename: name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        transferred = outcome.transferred.len(),
        skipped = outcome.skipped.len(),
        failed = outcome.failures.len(),
        "transfer commit finished"
    );
    outcome
}

enum CopyResult {
    Copied,
    AlreadyIdentical,
}

fn copy_one(name: &str, source_dir: &Path, dest_dir: &Path) -> Result<CopyResult> {
    let src = source_dir.join(name);
    let dst = dest_dir.join(name);

    let bytes = fs::read(&src).map_err(|e| EdidError::io_with_path(e, &src))?;

    // Re-check the destination now, not at plan time
    if dst.exists() {
        let existing = fs::read(&dst).map_err(|e| EdidError::io_with_path(e, &dst))?;
        if content_key(&existing) == content_key(&bytes) {
            return Ok(CopyResult::AlreadyIdentical);
        }
        return Err(EdidError::AlreadyExists {
            filename: name.to_string(),
        });
    }

    // Same-directory temp then rename, so a reader of the destination never
    // observes a partial copy
    let mut tmp =
        tempfile::NamedTempFile::new_in(dest_dir).map_err(|e| EdidError::io_with_path(e, dest_dir))?;
    tmp.write_all(&bytes)
        .map_err(|e| EdidError::io_with_path(e, tmp.path()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| EdidError::io_with_path(e, tmp.path()))?;
    tmp.persist(&dst)
        .map_err(|e| EdidError::io_with_path(e.error, &dst))?;

    Ok(CopyResult::Copied)
}
