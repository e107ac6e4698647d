//! Tolerant text decoding
//!
//! Config files written on Japanese and Chinese Windows installs are not
//! always UTF-8. Encodings are tried in a fixed order and the first clean
//! decode wins.

use encoding_rs::{Encoding, GBK, SHIFT_JIS};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Legacy encodings tried after UTF-8, in order
const LEGACY_ENCODINGS: &[&Encoding] = &[SHIFT_JIS, GBK];

/// Widest encoded character among the supported encodings
const MAX_BYTES_PER_CHAR: usize = 4;

/// Read `path` and decode it, keeping at most `max_chars` characters
///
/// Only the bytes that can hold `max_chars` characters are read. Returns
/// `None` when the file can't be opened or no encoding fits.
pub fn read_text(path: &Path, max_chars: usize) -> Option<String> {
    let (bytes, truncated) = File::open(path)
        .and_then(|file| read_bounded(file, max_chars))
        .inspect_err(|e| debug!(path = %path.display(), error = %e, "Unreadable file"))
        .ok()?;
    let text = decode_prefix(&bytes, max_chars, truncated);
    if text.is_none() {
        debug!(path = %path.display(), "No encoding could decode file");
    }
    text
}

/// Read at most the byte budget for `max_chars` characters; the flag is set
/// when the source had more
pub fn read_bounded(reader: impl Read, max_chars: usize) -> io::Result<(Vec<u8>, bool)> {
    let budget = max_chars.saturating_mul(MAX_BYTES_PER_CHAR);
    let mut bytes = Vec::new();
    reader
        .take(budget as u64 + 1)
        .read_to_end(&mut bytes)?;
    let truncated = bytes.len() > budget;
    bytes.truncate(budget);
    Ok((bytes, truncated))
}

/// Decode bytes produced by [`read_bounded`]
///
/// A truncated read may end inside a character; that partial character is
/// dropped instead of failing the whole decode.
pub fn decode_prefix(bytes: &[u8], max_chars: usize, truncated: bool) -> Option<String> {
    if !truncated {
        return decode_bytes(bytes, max_chars);
    }

    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Err(e) = std::str::from_utf8(body)
        && e.error_len().is_none()
    {
        let text = std::str::from_utf8(&body[..e.valid_up_to()]).ok()?;
        return Some(truncate_chars(text, max_chars));
    }

    decode_bytes(bytes, max_chars).or_else(|| {
        let (_, head) = bytes.split_last()?;
        decode_bytes(head, max_chars)
    })
}

/// Decode a byte blob: UTF-8 (BOM stripped), then Shift_JIS, then GBK
pub fn decode_bytes(bytes: &[u8], max_chars: usize) -> Option<String> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM)
        && let Ok(text) = std::str::from_utf8(rest)
    {
        return Some(truncate_chars(text, max_chars));
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(truncate_chars(text, max_chars));
    }

    LEGACY_ENCODINGS.iter().find_map(|encoding| {
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| {
                debug!(encoding = encoding.name(), "Decoded with legacy encoding");
                truncate_chars(&text, max_chars)
            })
    })
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"{\"a\": 1}");
        assert_eq!(decode_bytes(&bytes, 100).as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_plain_utf8_passes_through() {
        assert_eq!(decode_bytes("フィラメント".as_bytes(), 100).as_deref(), Some("フィラメント"));
    }

    #[test]
    fn test_shift_jis_fallback() {
        let (encoded, _, _) = SHIFT_JIS.encode("赤いPLA");
        assert!(std::str::from_utf8(&encoded).is_err());
        assert_eq!(decode_bytes(&encoded, 100).as_deref(), Some("赤いPLA"));
    }

    #[test]
    fn test_gbk_fallback_when_shift_jis_rejects() {
        // 0xFE is never valid in Shift_JIS, but B0 FE is a GB2312 hanzi
        let bytes = [b'P', b'L', b'A', b' ', 0xB0, 0xFE];
        assert!(
            SHIFT_JIS
                .decode_without_bom_handling_and_without_replacement(&bytes)
                .is_none()
        );
        let expected = GBK
            .decode_without_bom_handling_and_without_replacement(&bytes)
            .unwrap();
        assert_eq!(expected.chars().count(), 5);

        let decoded = decode_bytes(&bytes, 100).unwrap();
        assert_eq!(decoded, expected);
        assert!(decoded.starts_with("PLA "));
    }

    #[test]
    fn test_read_bounded_stops_at_budget() {
        let source = vec![b'x'; 100];
        let (bytes, truncated) = read_bounded(source.as_slice(), 5).unwrap();
        assert_eq!(bytes.len(), 20);
        assert!(truncated);

        let (bytes, truncated) = read_bounded(&source[..20], 5).unwrap();
        assert_eq!(bytes.len(), 20);
        assert!(!truncated);
    }

    #[test]
    fn test_read_text_drops_character_cut_at_budget() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.conf");
        std::fs::write(&path, format!("a{}", "ä".repeat(50))).unwrap();

        // budget of 4 bytes ends halfway through the second 'ä'
        assert_eq!(read_text(&path, 1).as_deref(), Some("a"));
        assert_eq!(read_text(&path, 3).as_deref(), Some("aää"));
    }

    #[test]
    fn test_truncation_counts_characters() {
        assert_eq!(decode_bytes("ääää".as_bytes(), 2).as_deref(), Some("ää"));
        assert_eq!(decode_bytes(b"abc", 10).as_deref(), Some("abc"));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_text(&dir.path().join("nope.conf"), 100), None);
    }

    #[test]
    fn test_read_text_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.conf");
        std::fs::write(&path, "key = value\n").unwrap();
        assert_eq!(read_text(&path, 100).as_deref(), Some("key = value\n"));
    }
}
