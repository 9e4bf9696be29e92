//! XML record emission.
//!
//! One `cellobject` fragment per key or value, streamed as produced — the
//! tree is never buffered.  Text content is escaped on the way out; the
//! structural metacharacters `&`, `<` and `>` never pass through raw.

use chrono::DateTime;
use std::borrow::Cow;
use std::io::{self, Write};

/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01 (Unix epoch).
const FILETIME_UNIX_DIFF_SECS: i64 = 11_644_473_600;

/// One key record, already formatted for output.
pub struct KeyRecord<'a> {
    pub path:  &'a str,
    pub mtime: &'a str,
}

/// One value record, already formatted for output.
pub struct ValueRecord<'a> {
    pub path:      &'a str,
    pub name:      &'a str,
    pub mtime:     &'a str,
    pub data_type: &'a str,
    pub data:      &'a str,
    pub raw_data:  &'a str,
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct XmlWriter<W: Write> {
    out: W,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// XML declaration plus the opening wrapper element.
    pub fn open_document(&mut self) -> io::Result<()> {
        writeln!(self.out, "<?xml version='1.0' encoding='UTF-8'?>")?;
        writeln!(self.out, "<hive>")
    }

    /// Closing wrapper element.
    pub fn close_document(&mut self) -> io::Result<()> {
        writeln!(self.out, "</hive>")?;
        self.out.flush()
    }

    pub fn key_record(&mut self, rec: &KeyRecord) -> io::Result<()> {
        writeln!(self.out, "  <cellobject>")?;
        writeln!(self.out, "    <cellpath>{}</cellpath>", escape_text(rec.path))?;
        writeln!(self.out, "    <name_type>k</name_type>")?;
        writeln!(self.out, "    <mtime>{}</mtime>", escape_text(rec.mtime))?;
        writeln!(self.out, "    <alloc>1</alloc>")?;
        writeln!(self.out, "  </cellobject>")
    }

    pub fn value_record(&mut self, rec: &ValueRecord) -> io::Result<()> {
        writeln!(self.out, "  <cellobject>")?;
        writeln!(self.out, "    <cellpath>{}</cellpath>", escape_text(rec.path))?;
        writeln!(self.out, "    <basename>{}</basename>", escape_text(rec.name))?;
        writeln!(self.out, "    <name_type>v</name_type>")?;
        writeln!(self.out, "    <mtime>{}</mtime>", escape_text(rec.mtime))?;
        writeln!(self.out, "    <alloc>1</alloc>")?;
        writeln!(self.out, "    <data_type>{}</data_type>", escape_text(rec.data_type))?;
        writeln!(self.out, "    <data>{}</data>", escape_text(rec.data))?;
        writeln!(self.out, "    <raw_data>{}</raw_data>", escape_text(rec.raw_data))?;
        writeln!(self.out, "  </cellobject>")
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Escape XML text content.  Borrows when nothing needs escaping.
pub fn escape_text(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Convert a Windows FILETIME (100 ns ticks since 1601-01-01) to an ISO 8601
/// timestamp with one-second precision, e.g. `2009-07-14T04:37:08Z`.
pub fn filetime_to_iso(filetime: u64) -> String {
    let secs = (filetime / 10_000_000) as i64 - FILETIME_UNIX_DIFF_SECS;
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => String::from("0000-00-00T00:00:00Z"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_passthrough_borrows() {
        assert!(matches!(escape_text("Software\\Classes"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_metacharacters() {
        assert_eq!(escape_text("a<b>&c"), "a&lt;b&gt;&amp;c");
    }

    #[test]
    fn test_filetime_unix_epoch() {
        assert_eq!(filetime_to_iso(116_444_736_000_000_000), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_filetime_zero_is_1601() {
        assert_eq!(filetime_to_iso(0), "1601-01-01T00:00:00Z");
    }

    #[test]
    fn test_key_record_fragment() {
        let mut buf = Vec::new();
        {
            let mut xml = XmlWriter::new(&mut buf);
            xml.key_record(&KeyRecord {
                path:  "SAM\\Domains",
                mtime: "1970-01-01T00:00:00Z",
            })
            .unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("<cellpath>SAM\\Domains</cellpath>"));
        assert!(text.contains("<name_type>k</name_type>"));
        assert!(text.contains("<alloc>1</alloc>"));
    }

    #[test]
    fn test_value_record_escapes_name() {
        let mut buf = Vec::new();
        {
            let mut xml = XmlWriter::new(&mut buf);
            xml.value_record(&ValueRecord {
                path:      "ROOT\\a<b",
                name:      "a<b",
                mtime:     "1970-01-01T00:00:00Z",
                data_type: "REG_SZ",
                data:      "\"x\"",
                raw_data:  "78 00 00 00",
            })
            .unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("<basename>a&lt;b</basename>"));
        assert!(text.contains("<data_type>REG_SZ</data_type>"));
        assert!(text.contains("<raw_data>78 00 00 00</raw_data>"));
    }

    #[test]
    fn test_document_wrapper_balanced() {
        let mut buf = Vec::new();
        {
            let mut xml = XmlWriter::new(&mut buf);
            xml.open_document().unwrap();
            xml.close_document().unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<hive>"));
        assert!(text.trim_end().ends_with("</hive>"));
    }
}
