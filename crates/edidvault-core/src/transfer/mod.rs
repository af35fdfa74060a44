//! USB import/export: mount discovery, dry-run planning, and the
//! preview-then-commit copy protocol.

pub mod media;
pub mod planner;

pub use media::{list_mounts, resolve_mount, scan_dump_files, MediaEntry, MountInfo};
pub use planner::{commit, plan, Direction, TransferFailure, TransferOutcome, TransferPlan};
