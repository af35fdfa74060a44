//! EDID binary codec: raw bytes to structured fields, hex dump formatting,
//! and content-identity hashing.
//!
//! Everything here is pure. Decoding never mutates the input and derived
//! fields are always recomputed from the raw bytes, so a dump on disk needs
//! no sidecar metadata.

use crate::config::EdidLayout;
use crate::error::{EdidError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A validated EDID block sequence: one 128-byte base block, optionally
/// followed by `extension_count()` further 128-byte blocks.
///
/// Identity for matching is the exact byte sequence, never the decoded
/// fields. Two displays with byte-identical EDID are indistinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdidBlock {
    raw: Vec<u8>,
}

impl EdidBlock {
    /// Parse and validate raw EDID bytes.
    ///
    /// Fails with `TooShort` below 128 bytes, `NotBlockAligned` when the
    /// length is not a multiple of 128, and `MalformedHeader` when the base
    /// block does not start with the fixed magic pattern. Malformed input is
    /// an error, never a panic.
    pub fn parse(raw: impl Into<Vec<u8>>) -> Result<Self> {
        let raw = raw.into();

        if raw.len() < EdidLayout::BLOCK_LEN {
            return Err(EdidError::TooShort { len: raw.len() });
        }
        if raw.len() % EdidLayout::BLOCK_LEN != 0 {
            return Err(EdidError::NotBlockAligned { len: raw.len() });
        }
        if raw[..8] != EdidLayout::MAGIC {
            return Err(EdidError::MalformedHeader);
        }

        Ok(Self { raw })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }

    /// PNP vendor code: bytes 8-9 form a big-endian word, three 5-bit groups
    /// (bits 14-10, 9-5, 4-0), each group + 64 is an uppercase ASCII letter.
    pub fn manufacturer_id(&self) -> String {
        let word = u16::from_be_bytes([self.raw[8], self.raw[9]]);
        [10u16, 5, 0]
            .iter()
            .map(|shift| (((word >> shift) & 0x1F) as u8 + 64) as char)
            .collect()
    }

    /// Product code, little-endian u16 at bytes 10-11.
    pub fn product_code(&self) -> u16 {
        u16::from_le_bytes([self.raw[10], self.raw[11]])
    }

    /// Serial number, little-endian u32 at bytes 12-15.
    pub fn serial_number(&self) -> u32 {
        u32::from_le_bytes([self.raw[12], self.raw[13], self.raw[14], self.raw[15]])
    }

    /// Week of manufacture, byte 16 (0 means unspecified).
    pub fn week_of_manufacture(&self) -> u8 {
        self.raw[16]
    }

    /// Year of manufacture, 1990 + byte 17.
    pub fn year_of_manufacture(&self) -> u16 {
        1990 + self.raw[17] as u16
    }

    /// EDID version and revision, bytes 18 and 19.
    pub fn version(&self) -> (u8, u8) {
        (self.raw[18], self.raw[19])
    }

    /// Physical size in centimeters, bytes 21 and 22.
    ///
    /// Zero means "not specified" and is passed through unmodified.
    pub fn physical_size_cm(&self) -> (u8, u8) {
        (self.raw[21], self.raw[22])
    }

    /// Number of extension blocks following the base block, byte 126.
    pub fn extension_count(&self) -> u8 {
        self.raw[126]
    }

    /// Whether every 128-byte block sums to 0 mod 256.
    ///
    /// Checksum validity is informational: a dump with a bad checksum still
    /// decodes, matches, and round-trips byte-exactly.
    pub fn checksum_is_valid(&self) -> bool {
        self.raw
            .chunks(EdidLayout::BLOCK_LEN)
            .all(block_checksum_is_valid)
    }

    /// Content identity of this block sequence.
    pub fn content_key(&self) -> ContentKey {
        content_key(&self.raw)
    }

    /// Decode into the boundary-crossing record.
    pub fn decoded(&self) -> DecodedEdid {
        let (major, minor) = self.version();
        let (width_cm, height_cm) = self.physical_size_cm();
        DecodedEdid {
            manufacturer: self.manufacturer_id(),
            product_code: self.product_code(),
            serial: self.serial_number(),
            week: self.week_of_manufacture(),
            year: self.year_of_manufacture(),
            version: format!("{}.{}", major, minor),
            width_cm,
            height_cm,
            extensions: self.extension_count(),
            checksum_valid: self.checksum_is_valid(),
        }
    }
}

/// Stable byte-exact identity of an EDID dump: SHA-256, lowercase hex.
///
/// Equal iff the inputs are byte-identical; no normalization, no truncation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the content identity of arbitrary bytes.
pub fn content_key(raw: &[u8]) -> ContentKey {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    ContentKey(hex::encode(hasher.finalize()))
}

/// Decoded EDID fields, recomputed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEdid {
    pub manufacturer: String,
    pub product_code: u16,
    pub serial: u32,
    pub week: u8,
    pub year: u16,
    pub version: String,
    pub width_cm: u8,
    pub height_cm: u8,
    pub extensions: u8,
    pub checksum_valid: bool,
}

/// Format raw bytes as an offset-prefixed hex dump.
///
/// Each line is `"<4-hex offset>: <space-separated 2-hex bytes>"`, 16 bytes
/// per line. Empty input yields an empty vec.
pub fn format_hex(raw: &[u8]) -> Vec<String> {
    raw.chunks(EdidLayout::HEX_LINE_WIDTH)
        .enumerate()
        .map(|(i, chunk)| {
            let bytes = chunk
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{:04X}: {}", i * EdidLayout::HEX_LINE_WIDTH, bytes)
        })
        .collect()
}

/// A single byte divergence between two buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteDiff {
    pub offset: usize,
    pub left: u8,
    pub right: u8,
}

impl fmt::Display for ByteDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04X}: {:02X} != {:02X}",
            self.offset, self.left, self.right
        )
    }
}

/// Byte-for-byte diff over the common prefix of two buffers.
///
/// A length mismatch is itself a divergence; callers comparing for identity
/// must check `bytes_equal` rather than `diff(..).is_empty()`.
pub fn diff(a: &[u8], b: &[u8]) -> Vec<ByteDiff> {
    a.iter()
        .zip(b.iter())
        .enumerate()
        .filter(|(_, (x, y))| x != y)
        .map(|(offset, (&left, &right))| ByteDiff {
            offset,
            left,
            right,
        })
        .collect()
}

/// Exact-byte equality, including length.
pub fn bytes_equal(a: &[u8], b: &[u8]) -> bool {
    a == b
}

fn block_checksum_is_valid(block: &[u8]) -> bool {
    block.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) == 0
}

/// Fixture builders shared by unit tests across the crate.
#[cfg(test)]
pub(crate) mod testutil {
    use crate::config::EdidLayout;

    /// Build a valid 128-byte base block with a correct checksum.
    ///
    /// The closure may poke any bytes (including the header, to build
    /// malformed fixtures); the checksum byte is recomputed afterwards.
    pub(crate) fn test_block(mut fill: impl FnMut(&mut [u8])) -> Vec<u8> {
        let mut raw = vec![0u8; EdidLayout::BLOCK_LEN];
        raw[..8].copy_from_slice(&EdidLayout::MAGIC);
        raw[18] = 1;
        raw[19] = 4;
        fill(&mut raw);
        raw[127] = 0;
        let sum: u8 = raw.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        raw[127] = 0u8.wrapping_sub(sum);
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::test_block;
    use super::*;

    #[test]
    fn test_parse_rejects_short_input() {
        let err = EdidBlock::parse(vec![0u8; 64]).unwrap_err();
        assert!(matches!(err, EdidError::TooShort { len: 64 }));
    }

    #[test]
    fn test_parse_rejects_unaligned_input() {
        let mut raw = test_block(|_| {});
        raw.extend_from_slice(&[0u8; 2]);
        let err = EdidBlock::parse(raw).unwrap_err();
        assert!(matches!(err, EdidError::NotBlockAligned { len: 130 }));
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut raw = test_block(|_| {});
        raw[0] = 0xFF;
        let err = EdidBlock::parse(raw).unwrap_err();
        assert!(matches!(err, EdidError::MalformedHeader));
    }

    #[test]
    fn test_manufacturer_id_dell() {
        // 'D'=4, 'E'=5, 'L'=12 -> (4<<10)|(5<<5)|12 = 0x10AC
        let raw = test_block(|raw| {
            raw[8] = 0x10;
            raw[9] = 0xAC;
        });
        let block = EdidBlock::parse(raw).unwrap();
        assert_eq!(block.manufacturer_id(), "DEL");
    }

    #[test]
    fn test_manufacturer_id_known_vendors() {
        // (word, vendor): SAM, GSM, AUS alongside DEL above
        for (word, expected) in [(0x4C2Du16, "SAM"), (0x1E6Du16, "GSM"), (0x06B3u16, "AUS")] {
            let raw = test_block(|raw| {
                raw[8] = (word >> 8) as u8;
                raw[9] = (word & 0xFF) as u8;
            });
            let id = EdidBlock::parse(raw).unwrap().manufacturer_id();
            assert_eq!(id, expected);
            assert!(id.chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_product_serial_little_endian() {
        let raw = test_block(|raw| {
            raw[10] = 0x34;
            raw[11] = 0x12;
            raw[12] = 0x78;
            raw[13] = 0x56;
            raw[14] = 0x34;
            raw[15] = 0x12;
        });
        let block = EdidBlock::parse(raw).unwrap();
        assert_eq!(block.product_code(), 0x1234);
        assert_eq!(block.serial_number(), 0x1234_5678);
    }

    #[test]
    fn test_physical_size_passthrough() {
        let raw = test_block(|raw| {
            raw[21] = 34;
            raw[22] = 19;
        });
        let block = EdidBlock::parse(raw).unwrap();
        assert_eq!(block.physical_size_cm(), (34, 19));

        // Zero means unspecified and is not substituted
        let raw = test_block(|_| {});
        let block = EdidBlock::parse(raw).unwrap();
        assert_eq!(block.physical_size_cm(), (0, 0));
    }

    #[test]
    fn test_decoded_record() {
        let raw = test_block(|raw| {
            raw[8] = 0x10;
            raw[9] = 0xAC;
            raw[16] = 12;
            raw[17] = 30; // 2020
            raw[21] = 60;
            raw[22] = 34;
            raw[126] = 1;
        });
        // Appending an extension block keeps byte 126 consistent
        let mut full = raw;
        let mut ext = vec![0u8; 128];
        ext[0] = 0x02;
        let sum: u8 = ext.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        ext[127] = 0u8.wrapping_sub(sum);
        full.extend_from_slice(&ext);

        let block = EdidBlock::parse(full).unwrap();
        let decoded = block.decoded();
        assert_eq!(decoded.manufacturer, "DEL");
        assert_eq!(decoded.week, 12);
        assert_eq!(decoded.year, 2020);
        assert_eq!(decoded.version, "1.4");
        assert_eq!(decoded.width_cm, 60);
        assert_eq!(decoded.height_cm, 34);
        assert_eq!(decoded.extensions, 1);
        assert!(decoded.checksum_valid);
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let raw = test_block(|_| {});
        let block = EdidBlock::parse(raw.clone()).unwrap();
        assert!(block.checksum_is_valid());

        let mut corrupt = raw;
        corrupt[20] ^= 0x01;
        let block = EdidBlock::parse(corrupt).unwrap();
        assert!(!block.checksum_is_valid());
    }

    #[test]
    fn test_content_key_byte_exact() {
        let a = test_block(|_| {});
        let mut b = a.clone();
        assert_eq!(content_key(&a), content_key(&b));

        // Single-bit difference must produce a different key
        b[40] ^= 0x01;
        assert_ne!(content_key(&a), content_key(&b));

        // Truncation must produce a different key
        assert_ne!(content_key(&a), content_key(&a[..127]));
    }

    #[test]
    fn test_format_hex_layout() {
        let lines = format_hex(&[]);
        assert!(lines.is_empty());

        let raw: Vec<u8> = (0u8..20).collect();
        let lines = format_hex(&raw);
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "0000: 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F"
        );
        assert_eq!(lines[1], "0010: 10 11 12 13");
    }

    #[test]
    fn test_format_hex_roundtrip() {
        let raw = test_block(|raw| raw[30] = 0xAB);
        let joined: String = format_hex(&raw)
            .iter()
            .map(|line| line.split_once(": ").unwrap().1.replace(' ', ""))
            .collect();
        assert_eq!(joined, hex::encode_upper(&raw));
    }

    #[test]
    fn test_diff_reports_offsets() {
        let a = test_block(|_| {});
        let mut b = a.clone();
        b[9] = 0xAC;
        b[64] ^= 0xFF;

        let diffs = diff(&a, &b);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].offset, 9);
        assert_eq!(diffs[1].offset, 64);
        assert_eq!(diffs[0].to_string(), "0x0009: 00 != AC");

        assert!(diff(&a, &a).is_empty());
        assert!(bytes_equal(&a, &a));
        assert!(!bytes_equal(&a, &a[..127]));
    }
}
