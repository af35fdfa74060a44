//! Persistent dump library: naming rules, the file-backed store, and the
//! content-exact matcher.

pub mod matcher;
pub mod naming;
pub mod store;

pub use matcher::find_matches;
pub use store::{DumpLibrary, DumpRecord};
