//! Text and data tag types
//!
//! - text: plain NUL-terminated ASCII (ICC.1:2022 Section 10.24)
//! - desc: v2 textDescriptionType, an ASCII, Unicode and ScriptCode trio
//!   (ICC.1:2001-04 Section 6.5.17)
//! - mluc: multiLocalizedUnicodeType (ICC.1:2022 Section 10.15)
//! - data: ASCII or binary blob (ICC.1:2022 Section 10.8)
//! - crdi: v2 PostScript CRD information (ICC.1:2001-04 Section 6.5.2)

use std::io;

use crate::error::{Error, FormatCode, Result};
use crate::icc::buffer::SnBuffer;
use crate::icc::tag::TagBody;
use crate::icc::types::TypeSignature;

use super::dump_limit;

/// Size of the ScriptCode string field in a `desc` tag
const SCRIPT_FIELD: usize = 67;

/// `u32` byte count (terminator included) followed by NUL-terminated ASCII.
///
/// A zero count reads as an empty string; `empty_sub` is raised for it when given.
fn counted_ascii(
    b: &mut SnBuffer<'_, '_>,
    s: &mut String,
    empty_sub: Option<FormatCode>,
) -> Result<()> {
    if !b.op().serialises() {
        return Ok(());
    }
    let mut count = s.len() + 1;
    b.count32(&mut count)?;
    if b.op().is_read() {
        if count == 0 {
            if let Some(sub) = empty_sub {
                b.warn(sub, "ASCII string has a zero count")?;
            }
            s.clear();
            return Ok(());
        }
        let block = b.take(count)?;
        let end = match block.iter().position(|&c| c == 0) {
            Some(end) if end + 1 < count => {
                b.warn(
                    FormatCode::TEXT_ASHORT,
                    format!("ASCII string of {end} bytes is shorter than its count {count}"),
                )?;
                end
            }
            Some(end) => end,
            None => {
                b.warn(FormatCode::TEXT_ANOTTERM, "ASCII string is not NUL terminated")?;
                count
            }
        };
        *s = String::from_utf8_lossy(&block[..end]).into_owned();
    } else {
        let mut block = Vec::with_capacity(count);
        block.extend_from_slice(s.as_bytes());
        block.push(0);
        b.raw(&mut block)?;
    }
    Ok(())
}

/// Decode big-endian UTF-16, dropping trailing NULs
fn decode_utf16(b: &mut SnBuffer<'_, '_>, block: &[u8]) -> Result<String> {
    if block.len() % 2 != 0 {
        b.warn(FormatCode::TEXT_UERR, "Unicode string has an odd byte length")?;
    }
    let mut units: Vec<u16> = block
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    while units.last() == Some(&0) {
        units.pop();
    }
    match String::from_utf16(&units) {
        Ok(s) => Ok(s),
        Err(e) => {
            b.warn(FormatCode::TEXT_UERR, format!("Unicode string does not decode: {e}"))?;
            Ok(String::from_utf16_lossy(&units))
        }
    }
}

fn encode_utf16(s: &str, terminate: bool) -> Vec<u8> {
    let mut out: Vec<u8> = s.encode_utf16().flat_map(u16::to_be_bytes).collect();
    if terminate {
        out.extend_from_slice(&[0, 0]);
    }
    out
}

/// Text tag data (text type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Text {
    pub text: String,
}

impl TagBody for Text {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::TEXT
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.ascii_to_end(&mut self.text, FormatCode::TEXT_ANOTTERM)
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "Text: \"{}\"", self.text)
    }
}

/// Data tag (data type); ASCII data is expected to carry its NUL
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Data {
    /// 0 for ASCII, 1 for binary
    pub flag: u32,
    pub count: usize,
    pub data: Vec<u8>,
}

impl Data {
    pub const ASCII: u32 = 0;
    pub const BINARY: u32 = 1;
}

impl TagBody for Data {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::DATA
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.u32(&mut self.flag)?;
        if b.op().is_read() {
            self.count = b.space();
        }
        b.resize_checked(&mut self.count, &mut self.data, 1, 0, "data")?;
        b.bytes(&mut self.data)?;
        if b.op().serialises() {
            if self.flag > Self::BINARY {
                b.warn(FormatCode::DATA_FLAG, format!("unknown data flag {}", self.flag))?;
            }
            if self.flag == Self::ASCII && self.data.last().is_some_and(|c| *c != 0) {
                b.warn(FormatCode::DATA_TERM, "ASCII data is not NUL terminated")?;
            }
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        let kind = if self.flag == Self::ASCII { "ASCII" } else { "binary" };
        writeln!(out, "Data, {kind}, {} bytes", self.count)?;
        if verbose > 0 && self.flag == Self::ASCII {
            writeln!(out, "    \"{}\"", String::from_utf8_lossy(&self.data).trim_end_matches('\0'))?;
        }
        Ok(())
    }
}

/// Legacy v2 text description (desc type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextDescription {
    pub ascii: String,
    /// Unicode language code
    pub uc_lang: u32,
    pub unicode: String,
    /// Macintosh ScriptCode code
    pub sc_code: u16,
    pub sc_count: usize,
    /// ScriptCode bytes, at most 67
    pub script: Vec<u8>,
}

impl TextDescription {
    /// Description holding only an ASCII string
    pub fn ascii(text: impl Into<String>) -> Self {
        Self {
            ascii: text.into(),
            ..Self::default()
        }
    }
}

impl TagBody for TextDescription {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::DESC
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        counted_ascii(b, &mut self.ascii, Some(FormatCode::TEXT_ANOTTERM))?;

        if b.op().serialises() {
            b.u32(&mut self.uc_lang)?;
            let mut encoded = Vec::new();
            let mut units = 0usize;
            if !b.op().is_read() && !self.unicode.is_empty() {
                encoded = encode_utf16(&self.unicode, true);
                units = encoded.len() / 2;
            }
            b.count32(&mut units)?;
            if b.op().is_read() {
                let n = units
                    .checked_mul(2)
                    .ok_or_else(|| Error::BufferBound(format!("{units} Unicode characters")))?;
                let block = b.take(n)?;
                self.unicode = decode_utf16(b, &block)?;
            } else {
                b.raw(&mut encoded)?;
            }
        }

        if b.op().is_read() && b.space() < 3 + SCRIPT_FIELD {
            // Seen in the wild: descriptions that stop after the Unicode part
            b.quirk(FormatCode::TEXT_ASHORT, "description is missing its ScriptCode record")?;
            b.advance(b.space())?;
            return b.resize_checked(&mut 0, &mut self.script, 1, 0, "ScriptCode");
        }
        b.u16(&mut self.sc_code)?;
        b.count8(&mut self.sc_count)?;
        if self.sc_count > SCRIPT_FIELD {
            if b.op().is_read() {
                b.warn(
                    FormatCode::TEXT_SCRTERM,
                    format!("ScriptCode count {} exceeds {SCRIPT_FIELD}", self.sc_count),
                )?;
                self.sc_count = SCRIPT_FIELD;
            } else if b.op().serialises() {
                b.warn(
                    FormatCode::RANGE,
                    format!("ScriptCode count {} exceeds {SCRIPT_FIELD}", self.sc_count),
                )?;
            }
        }
        let fixed = SCRIPT_FIELD.saturating_sub(self.sc_count);
        b.resize_checked(&mut self.sc_count, &mut self.script, 1, fixed, "ScriptCode")?;
        b.bytes(&mut self.script)?;
        if b.op().serialises() {
            b.pad(fixed)?;
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        writeln!(out, "Description: \"{}\"", self.ascii)?;
        if verbose > 0 {
            if !self.unicode.is_empty() {
                writeln!(out, "    Unicode (lang 0x{:x}): \"{}\"", self.uc_lang, self.unicode)?;
            }
            if self.sc_count > 0 {
                writeln!(out, "    ScriptCode {}, {} bytes", self.sc_code, self.sc_count)?;
            }
        }
        Ok(())
    }
}

/// One language/country string of a `mluc` tag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MlucRecord {
    /// ISO 639-1 language code, e.g. `b"en"`
    pub language: u16,
    /// ISO 3166-1 country code, e.g. `b"US"`
    pub country: u16,
    pub text: String,
}

impl MlucRecord {
    pub fn new(language: [u8; 2], country: [u8; 2], text: impl Into<String>) -> Self {
        Self {
            language: u16::from_be_bytes(language),
            country: u16::from_be_bytes(country),
            text: text.into(),
        }
    }
}

/// Multi-localized Unicode text (mluc type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mluc {
    pub count: usize,
    pub records: Vec<MlucRecord>,
}

impl Mluc {
    const RECORD_SIZE: usize = 12;

    /// Text of the first record, the usual display choice
    pub fn first_text(&self) -> Option<&str> {
        self.records.first().map(|r| r.text.as_str())
    }
}

impl TagBody for Mluc {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::MLUC
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        let start = b.offset() - 8;
        b.count32(&mut self.count)?;
        let mut record_size = Self::RECORD_SIZE as u32;
        b.u32(&mut record_size)?;
        let record_size = record_size as usize;
        if b.op().is_read() && record_size < Self::RECORD_SIZE {
            return Err(Error::Encoding(format!("mluc record size {record_size} is below 12")));
        }
        if record_size != Self::RECORD_SIZE {
            b.warn(
                FormatCode::PARTIALEL,
                format!("mluc record size is {record_size}, expected 12"),
            )?;
        }

        // Offsets are relative to the start of the tag
        let mut next = b.offset() - start + self.count.saturating_mul(record_size);
        let mut spans = Vec::new();
        b.array_of(&mut self.count, &mut self.records, record_size, 0, "mluc records", |b, r| {
            if !b.op().serialises() {
                return Ok(());
            }
            b.u16(&mut r.language)?;
            b.u16(&mut r.country)?;
            let mut len = r.text.encode_utf16().count() * 2;
            let mut offset = next;
            b.count32(&mut len)?;
            b.count32(&mut offset)?;
            b.advance(record_size - Self::RECORD_SIZE)?;
            next += len;
            spans.push((offset, len));
            Ok(())
        })?;

        if !b.op().serialises() {
            return Ok(());
        }
        let mut end = b.offset();
        for (r, (offset, len)) in self.records.iter_mut().zip(spans) {
            b.seek(start + offset)?;
            if b.op().is_read() {
                let block = b.take(len)?;
                r.text = decode_utf16(b, &block)?;
            } else {
                b.raw(&mut encode_utf16(&r.text, false))?;
            }
            end = end.max(b.offset());
        }
        b.seek(end)
    }

    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        writeln!(out, "Multi-localized Unicode, {} records", self.count)?;
        for r in self.records.iter().take(dump_limit(verbose).max(1)) {
            let lang = r.language.to_be_bytes();
            let country = r.country.to_be_bytes();
            writeln!(
                out,
                "    {}_{}: \"{}\"",
                String::from_utf8_lossy(&lang),
                String::from_utf8_lossy(&country),
                r.text
            )?;
        }
        Ok(())
    }
}

/// PostScript CRD names (crdi type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CrdInfo {
    pub product: String,
    /// CRD names for the four rendering intents
    pub crd_names: [String; 4],
}

impl TagBody for CrdInfo {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::CRD_INFO
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        counted_ascii(b, &mut self.product, None)?;
        for name in self.crd_names.iter_mut() {
            counted_ascii(b, name, None)?;
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "CRD info, product \"{}\"", self.product)?;
        for (i, name) in self.crd_names.iter().enumerate() {
            writeln!(out, "    intent {i}: \"{name}\"")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::TagData;
    use super::super::test_util::*;
    use super::*;
    use crate::icc::compat::CompatOptions;

    #[test]
    fn test_text_layout() {
        let mut data = TagData::new(TypeSignature::TEXT);
        data.as_text_mut().unwrap().text = "Copyright".into();
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(&bytes[8..], b"Copyright\0");
        assert_eq!(back, data);

        let unterminated = b"text\0\0\0\0abc".to_vec();
        assert_eq!(read(&unterminated, CompatOptions::strict()).unwrap_err().code(), 0x23b);
        let lenient = read(&unterminated, CompatOptions::lenient()).unwrap();
        assert_eq!(lenient.as_text().unwrap().text, "abc");
    }

    #[test]
    fn test_description_round_trip() {
        let mut data = TagData::new(TypeSignature::DESC);
        let d = data.as_text_description_mut().unwrap();
        d.ascii = "sRGB".into();
        d.uc_lang = 0x656e;
        d.unicode = "sRGB \u{00e9}".into();
        d.sc_count = 3;
        allocate(&mut data);
        data.as_text_description_mut().unwrap().script.copy_from_slice(b"abc");
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 8 + 4 + 5 + 8 + 14 + 3 + 67);
        assert_eq!(back, data);
    }

    #[test]
    fn test_description_without_scriptcode() {
        let mut bytes = b"desc\0\0\0\0".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 3, b'h', b'i', 0]);
        bytes.extend_from_slice(&[0; 8]);
        assert_eq!(read(&bytes, CompatOptions::strict()).unwrap_err().code(), 0x23c);
        let back = read(&bytes, CompatOptions::lenient()).unwrap();
        assert_eq!(back.as_text_description().unwrap().ascii, "hi");
    }

    #[test]
    fn test_description_count_past_end() {
        let mut bytes = b"desc\0\0\0\0".to_vec();
        bytes.extend_from_slice(&[0x7f, 0xff, 0xff, 0xff, b'h']);
        assert_eq!(read(&bytes, CompatOptions::lenient()).unwrap_err().code(), 0x105);
    }

    #[test]
    fn test_mluc_offsets() {
        let mut data = TagData::new(TypeSignature::MLUC);
        data.as_mluc_mut().unwrap().count = 2;
        allocate(&mut data);
        let m = data.as_mluc_mut().unwrap();
        m.records[0] = MlucRecord::new(*b"en", *b"US", "Display");
        m.records[1] = MlucRecord::new(*b"de", *b"DE", "Bildschirm");
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        // First string starts after the 16-byte head and two records
        assert_eq!(&bytes[20..24], &[0, 0, 0, 14]);
        assert_eq!(&bytes[24..28], &[0, 0, 0, 40]);
        assert_eq!(&bytes[40..42], &[0, b'D']);
        assert_eq!(bytes.len(), 40 + 14 + 20);
        assert_eq!(back, data);
        assert_eq!(back.as_mluc().unwrap().first_text(), Some("Display"));
    }

    #[test]
    fn test_mluc_offset_out_of_range() {
        let mut bytes = b"mluc\0\0\0\0".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 12]);
        bytes.extend_from_slice(b"enUS");
        bytes.extend_from_slice(&[0, 0, 0, 2, 0, 0, 0x10, 0]);
        assert_eq!(read(&bytes, CompatOptions::lenient()).unwrap_err().code(), 0x105);
    }

    #[test]
    fn test_data_and_crdi() {
        let mut data = TagData::new(TypeSignature::DATA);
        let d = data.as_data_mut().unwrap();
        d.count = 4;
        allocate(&mut data);
        data.as_data_mut().unwrap().data.copy_from_slice(b"abc\0");
        let (_, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(back, data);

        data.as_data_mut().unwrap().data[3] = b'd';
        assert_eq!(write_read(&mut data, CompatOptions::strict()).unwrap_err().code(), 0x33a);

        let mut crdi = TagData::new(TypeSignature::CRD_INFO);
        let c = crdi.as_crd_info_mut().unwrap();
        c.product = "Printer".into();
        c.crd_names[1] = "Relative".into();
        let (bytes, back) = write_read(&mut crdi, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 8 + 4 + 8 + 4 + 1 + 4 + 9 + 2 * (4 + 1));
        assert_eq!(back, crdi);
    }
}
