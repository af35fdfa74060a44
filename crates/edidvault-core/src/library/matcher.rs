//! Content-exact matching of raw EDID bytes against the dump library.

use crate::codec::content_key;
use crate::error::Result;
use crate::library::store::{DumpLibrary, DumpRecord};

/// Return every library entry whose content is byte-identical to `raw`.
///
/// Matching is exact-byte via the content key, never fuzzy: dumps from
/// identical hardware are expected to be byte-identical, and field-level
/// matching would false-positive on displays that share manufacturer data
/// while differing elsewhere. Read-only against the library; results come
/// back in library order.
pub fn find_matches(raw: &[u8], library: &DumpLibrary) -> Result<Vec<DumpRecord>> {
    let needle = content_key(raw);
    let mut matches = Vec::new();

    for name in library.list()? {
        let block = match library.get(&name) {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!(filename = %name, error = %e, "skipping unreadable dump during match");
                continue;
            }
        };
        if block.content_key() == needle {
            matches.push(DumpRecord {
                filename: name,
                content: block,
            });
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testutil::test_block;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DumpLibrary) {
        let dir = TempDir::new().unwrap();
        let lib = DumpLibrary::open(dir.path()).unwrap();
        (dir, lib)
    }

    #[test]
    fn test_matches_identical_content_only() {
        let (_dir, lib) = setup();
        let a = test_block(|raw| raw[12] = 1);
        let b = test_block(|raw| raw[12] = 2);

        lib.save("one", &a).unwrap();
        lib.save("two", &b).unwrap();

        let matches = find_matches(&a, &lib).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].filename, "one.bin");
    }

    #[test]
    fn test_single_bit_difference_does_not_match() {
        let (_dir, lib) = setup();
        let a = test_block(|_| {});
        lib.save("one", &a).unwrap();

        let mut flipped = a.clone();
        flipped[40] ^= 0x01;
        assert!(find_matches(&flipped, &lib).unwrap().is_empty());

        // Truncation must not match either
        assert!(find_matches(&a[..127], &lib).unwrap().is_empty());
    }

    #[test]
    fn test_multiple_names_same_content() {
        let (_dir, lib) = setup();
        let a = test_block(|_| {});
        lib.save("bench_left", &a).unwrap();
        lib.save("bench_right", &a).unwrap();

        let matches = find_matches(&a, &lib).unwrap();
        let names: Vec<_> = matches.iter().map(|m| m.filename.as_str()).collect();
        assert_eq!(names, ["bench_left.bin", "bench_right.bin"]);
    }

    #[test]
    fn test_empty_library_matches_nothing() {
        let (_dir, lib) = setup();
        let a = test_block(|_| {});
        assert!(find_matches(&a, &lib).unwrap().is_empty());
    }
}
