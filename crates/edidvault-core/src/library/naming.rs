//! Dump filename sanitization and validation.
//!
//! Names are operator input destined for the filesystem and for removable
//! media, so they get flattened to a conservative character set before the
//! suffix rules are enforced.

use crate::config::PathsConfig;
use crate::error::{EdidError, Result};

/// Flatten operator input into a safe filename stem.
///
/// Lowercases, maps spaces to underscores, and drops anything outside
/// `[a-z0-9._-]`. A name that sanitizes to nothing becomes `"edid"`.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    if cleaned.is_empty() {
        "edid".to_string()
    } else {
        cleaned
    }
}

/// Validate a sanitized name and append the canonical suffix when absent.
///
/// At most one `.` is allowed, and a `.` may only introduce the `.bin`
/// suffix at the end of the name.
pub fn canonicalize(name: &str) -> Result<String> {
    let dots = name.matches('.').count();
    if dots > 1 {
        return Err(EdidError::InvalidName {
            name: name.to_string(),
            reason: "more than one '.'".to_string(),
        });
    }

    if let Some(pos) = name.find('.') {
        if &name[pos..] != PathsConfig::DUMP_SUFFIX {
            return Err(EdidError::InvalidName {
                name: name.to_string(),
                reason: format!("'.' must introduce the {} suffix", PathsConfig::DUMP_SUFFIX),
            });
        }
        if pos == 0 {
            return Err(EdidError::InvalidName {
                name: name.to_string(),
                reason: "empty name before the suffix".to_string(),
            });
        }
        Ok(name.to_string())
    } else {
        Ok(format!("{}{}", name, PathsConfig::DUMP_SUFFIX))
    }
}

/// Sanitize then canonicalize in one step; the store boundary entry point.
pub fn normalize(name: &str) -> Result<String> {
    canonicalize(&sanitize(name))
}
