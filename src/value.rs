//! Registry value decoding.
//!
//! `decode` turns a value's raw bytes into the text form emitted in the XML
//! output.  The declared type is never trusted blindly: string and integer
//! types are checked for size consistency first, and anything inconsistent is
//! reclassified as binary and hex-dumped.  Decoding is a pure function of
//! (bytes, type code); the same inputs always produce the same text.
//!
//! String data in a hive is UTF-16LE.  Consistency rules:
//!
//! | Type | Rule |
//! |------|------|
//! | `REG_SZ` / `REG_EXPAND_SZ` | a NUL terminator must land exactly at the declared end |
//! | `REG_MULTI_SZ` | NUL-terminated segments ending in an empty segment (one extra trailing NUL tolerated) |
//! | `REG_DWORD` / `REG_DWORD_BIG_ENDIAN` | declared size exactly 4 |
//! | `REG_QWORD` | declared size exactly 8 |

use byteorder::{BigEndian, ByteOrder, LittleEndian};

// ── Registry type codes ──────────────────────────────────────────────────────

pub const REG_NONE: u32 = 0;
pub const REG_SZ: u32 = 1;
pub const REG_EXPAND_SZ: u32 = 2;
pub const REG_BINARY: u32 = 3;
pub const REG_DWORD: u32 = 4;
pub const REG_DWORD_BIG_ENDIAN: u32 = 5;
pub const REG_LINK: u32 = 6;
pub const REG_MULTI_SZ: u32 = 7;
pub const REG_RESOURCE_LIST: u32 = 8;
pub const REG_FULL_RESOURCE_DESCRIPTOR: u32 = 9;
pub const REG_RESOURCE_REQUIREMENTS_LIST: u32 = 10;
pub const REG_QWORD: u32 = 11;

/// Placeholder emitted when a value carries no data at all.
pub const NULL_PLACEHOLDER: &str = "(NULL!)";

const WCHAR_SIZE: usize = 2;

/// Map a registry type code to its canonical label.
pub fn type_label(code: u32) -> &'static str {
    match code {
        REG_NONE => "REG_NONE",
        REG_SZ => "REG_SZ",
        REG_EXPAND_SZ => "REG_EXPAND_SZ",
        REG_BINARY => "REG_BINARY",
        REG_DWORD => "REG_DWORD",
        REG_DWORD_BIG_ENDIAN => "REG_DWORD_BIG_ENDIAN",
        REG_LINK => "REG_LINK",
        REG_MULTI_SZ => "REG_MULTI_SZ",
        REG_RESOURCE_LIST => "REG_RESOURCE_LIST",
        REG_FULL_RESOURCE_DESCRIPTOR => "REG_FULL_RESOURCE_DESCRIPTOR",
        REG_RESOURCE_REQUIREMENTS_LIST => "REG_RESOURCE_REQUIREMENTS_LIST",
        REG_QWORD => "REG_QWORD",
        _ => "REG_UNKNOWN",
    }
}

// ── Decode entry point ───────────────────────────────────────────────────────

/// Decode value data under its declared type code.
///
/// `None` data yields the [`NULL_PLACEHOLDER`] regardless of type.  A declared
/// type whose size rules fail reclassifies the bytes as binary.  The input is
/// never mutated.
pub fn decode(data: Option<&[u8]>, type_code: u32) -> String {
    let bytes = match data {
        None => return transform(None, REG_BINARY),
        Some(b) => b,
    };

    match type_code {
        REG_SZ | REG_EXPAND_SZ | REG_MULTI_SZ => {
            if string_size_consistent(bytes, type_code) {
                transform(Some(bytes), type_code)
            } else {
                transform(Some(bytes), REG_BINARY)
            }
        }
        REG_DWORD | REG_DWORD_BIG_ENDIAN => {
            if bytes.len() == 4 {
                transform(Some(bytes), type_code)
            } else {
                transform(Some(bytes), REG_BINARY)
            }
        }
        REG_QWORD => {
            if bytes.len() == 8 {
                transform(Some(bytes), type_code)
            } else {
                transform(Some(bytes), REG_BINARY)
            }
        }
        _ => transform(Some(bytes), REG_BINARY),
    }
}

// ── Consistency checks ───────────────────────────────────────────────────────

/// Check that a string-typed value's terminator structure accounts for every
/// declared byte.  Hidden bytes after the terminator, missing terminators and
/// odd byte counts all fail the check.
fn string_size_consistent(bytes: &[u8], type_code: u32) -> bool {
    let chars = wide_chars(bytes);
    if type_code == REG_MULTI_SZ {
        match multi_consumed(&chars) {
            Some(consumed) => {
                consumed * WCHAR_SIZE == bytes.len()
                    || ((consumed + 1) * WCHAR_SIZE == bytes.len()
                        && chars.last() == Some(&0))
            }
            None => false,
        }
    } else {
        match chars.iter().position(|&c| c == 0) {
            Some(pos) => (pos + 1) * WCHAR_SIZE == bytes.len(),
            None => false,
        }
    }
}

/// Walk a multi-string's segments and return the number of wide chars the
/// list structure consumes, terminator included.  The list ends at an empty
/// segment (the double-NUL sentinel) or when the data runs out right after a
/// segment terminator.  An unterminated final segment returns `None`.
fn multi_consumed(chars: &[u16]) -> Option<usize> {
    let n = chars.len();
    let mut i = 0;
    loop {
        if i >= n {
            return Some(i);
        }
        if chars[i] == 0 {
            return Some(i + 1);
        }
        while i < n && chars[i] != 0 {
            i += 1;
        }
        if i >= n {
            return None;
        }
        i += 1;
    }
}

// ── Rendering ────────────────────────────────────────────────────────────────

/// Render bytes under an already-validated conversion type.
fn transform(data: Option<&[u8]>, conversion: u32) -> String {
    let bytes = match data {
        None => return NULL_PLACEHOLDER.to_string(),
        Some(b) => b,
    };

    match conversion {
        REG_SZ | REG_EXPAND_SZ => {
            let chars = wide_chars(bytes);
            let end = chars.iter().position(|&c| c == 0).unwrap_or(chars.len());
            format!("\"{}\"", String::from_utf16_lossy(&chars[..end]))
        }
        REG_MULTI_SZ => {
            let chars = wide_chars(bytes);
            let segments: Vec<String> = chars
                .split(|&c| c == 0)
                .take_while(|seg| !seg.is_empty())
                .map(String::from_utf16_lossy)
                .collect();
            format!("\"{}\"", segments.join("\", \""))
        }
        REG_DWORD => format!("0x{:08X}", LittleEndian::read_u32(bytes)),
        REG_DWORD_BIG_ENDIAN => format!("0x{:08X}", BigEndian::read_u32(bytes)),
        REG_QWORD => format!("0x{:016X}", LittleEndian::read_u64(bytes)),
        _ => hex_dump(bytes),
    }
}

fn wide_chars(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(WCHAR_SIZE)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Space-delimited uppercase hex pairs, one per input byte, in file order.
fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn test_sz_terminated_exactly() {
        let bytes = utf16le("ABC\0");
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode(Some(&bytes), REG_SZ), "\"ABC\"");
    }

    #[test]
    fn test_sz_unterminated_falls_back_to_hex() {
        let bytes = utf16le("ABC");
        assert_eq!(bytes.len(), 6);
        assert_eq!(decode(Some(&bytes), REG_SZ), "41 00 42 00 43 00");
    }

    #[test]
    fn test_sz_hidden_trailing_bytes_fall_back_to_hex() {
        let mut bytes = utf16le("AB\0");
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        let decoded = decode(Some(&bytes), REG_SZ);
        assert_eq!(decoded, "41 00 42 00 00 00 DE AD");
    }

    #[test]
    fn test_expand_sz_same_rules_as_sz() {
        let bytes = utf16le("%PATH%\0");
        assert_eq!(decode(Some(&bytes), REG_EXPAND_SZ), "\"%PATH%\"");
    }

    #[test]
    fn test_multi_sz_with_sentinel() {
        let bytes = utf16le("red\0green\0\0");
        assert_eq!(bytes.len(), 22);
        assert_eq!(decode(Some(&bytes), REG_MULTI_SZ), "\"red\", \"green\"");
    }

    #[test]
    fn test_multi_sz_trailing_nul_tolerated() {
        // "A\0B\0\0" as a wide literal: A NUL B NUL NUL NUL, 12 bytes.
        let bytes = utf16le("A\0B\0\0\0");
        assert_eq!(bytes.len(), 12);
        let decoded = decode(Some(&bytes), REG_MULTI_SZ);
        assert_eq!(decoded, "\"A\", \"B\"");
    }

    #[test]
    fn test_multi_sz_ends_after_terminator() {
        let bytes = utf16le("A\0B\0");
        assert_eq!(decode(Some(&bytes), REG_MULTI_SZ), "\"A\", \"B\"");
    }

    #[test]
    fn test_multi_sz_unterminated_falls_back_to_hex() {
        let bytes = utf16le("A\0BC");
        assert_eq!(decode(Some(&bytes), REG_MULTI_SZ), "41 00 00 00 42 00 43 00");
    }

    #[test]
    fn test_dword_little_endian() {
        let bytes = [0x78, 0x56, 0x34, 0x12];
        assert_eq!(decode(Some(&bytes), REG_DWORD), "0x12345678");
    }

    #[test]
    fn test_dword_big_endian() {
        let bytes = [0x78, 0x56, 0x34, 0x12];
        assert_eq!(decode(Some(&bytes), REG_DWORD_BIG_ENDIAN), "0x78563412");
    }

    #[test]
    fn test_dword_size_mismatch_falls_back_to_hex() {
        let bytes = [0x78, 0x56, 0x34];
        assert_eq!(decode(Some(&bytes), REG_DWORD), "78 56 34");
    }

    #[test]
    fn test_qword() {
        let bytes = 0x1122334455667788u64.to_le_bytes();
        assert_eq!(decode(Some(&bytes), REG_QWORD), "0x1122334455667788");
    }

    #[test]
    fn test_qword_size_mismatch_falls_back_to_hex() {
        let bytes = [0u8; 4];
        assert_eq!(decode(Some(&bytes), REG_QWORD), "00 00 00 00");
    }

    #[test]
    fn test_null_data_always_placeholder() {
        for code in 0..13 {
            assert_eq!(decode(None, code), NULL_PLACEHOLDER);
        }
    }

    #[test]
    fn test_binary_and_unknown_types_hex_dump() {
        let bytes = [0x01, 0x00, 0x04, 0x80];
        assert_eq!(decode(Some(&bytes), REG_BINARY), "01 00 04 80");
        assert_eq!(decode(Some(&bytes), 0xFFFF), "01 00 04 80");
    }

    #[test]
    fn test_empty_data() {
        assert_eq!(decode(Some(&[]), REG_BINARY), "");
        assert_eq!(decode(Some(&[]), REG_SZ), "");
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(type_label(REG_SZ), "REG_SZ");
        assert_eq!(type_label(REG_QWORD), "REG_QWORD");
        assert_eq!(type_label(0xDEAD), "REG_UNKNOWN");
    }

    proptest! {
        #[test]
        fn decode_is_deterministic(
            bytes in proptest::collection::vec(any::<u8>(), 0..64),
            code in 0u32..13,
        ) {
            prop_assert_eq!(
                decode(Some(&bytes), code),
                decode(Some(&bytes), code)
            );
        }

        #[test]
        fn hex_dump_covers_every_byte(
            bytes in proptest::collection::vec(any::<u8>(), 1..64),
        ) {
            let dumped = decode(Some(&bytes), REG_BINARY);
            prop_assert_eq!(dumped.split(' ').count(), bytes.len());
        }
    }
}
