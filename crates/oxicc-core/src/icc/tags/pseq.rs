//! Profile sequence description (pseq type)
//!
//! Each description embeds two complete text tags, type header included:
//! a v2 `desc` or a v4 `mluc`. The embedded tags carry no size of their
//! own, so each is parsed in an unbounded sub-buffer and the parent moves
//! on by what it consumed.

use std::io;

use crate::error::{Error, FormatCode, Result};
use crate::icc::buffer::SnBuffer;
use crate::icc::tag::TagBody;
use crate::icc::types::TypeSignature;

use super::text::{Mluc, TextDescription};

/// Smallest serialized description: fixed fields and two empty `mluc` tags
const MIN_DESC_SIZE: usize = 20 + 2 * 16;

/// Text embedded in a profile sequence entry
#[derive(Debug, Clone, PartialEq)]
pub enum DescText {
    Desc(TextDescription),
    Mluc(Mluc),
}

impl Default for DescText {
    fn default() -> Self {
        Self::Desc(TextDescription::default())
    }
}

impl DescText {
    pub fn type_sig(&self) -> TypeSignature {
        match self {
            Self::Desc(_) => TypeSignature::DESC,
            Self::Mluc(_) => TypeSignature::MLUC,
        }
    }

    /// Displayable text, ASCII for `desc` and the first record for `mluc`
    pub fn text(&self) -> &str {
        match self {
            Self::Desc(d) => &d.ascii,
            Self::Mluc(m) => m.first_text().unwrap_or(""),
        }
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.sub_buffer(None, |b| {
            let mut ttype = self.type_sig().0;
            b.u32(&mut ttype)?;
            b.pad(4)?;
            if b.op().is_read() {
                *self = match TypeSignature(ttype) {
                    TypeSignature::DESC => Self::Desc(TextDescription::default()),
                    TypeSignature::MLUC => Self::Mluc(Mluc::default()),
                    other => {
                        return Err(Error::format(
                            b.op().direction(),
                            FormatCode::SIG2TYPE,
                            format!("sequence text has type '{other}', expected 'desc' or 'mluc'"),
                        ));
                    }
                };
            }
            match self {
                Self::Desc(d) => d.serialize(b),
                Self::Mluc(m) => m.serialize(b),
            }
        })
    }
}

/// One profile of the sequence
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DescStruct {
    pub manufacturer: u32,
    pub model: u32,
    pub attributes: u64,
    pub technology: u32,
    pub device: DescText,
    pub model_desc: DescText,
}

/// Profile sequence description (pseq type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileSequenceDesc {
    pub count: usize,
    pub descs: Vec<DescStruct>,
}

impl TagBody for ProfileSequenceDesc {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::PROFILE_SEQUENCE_DESC
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.count32(&mut self.count)?;
        b.array_of(&mut self.count, &mut self.descs, MIN_DESC_SIZE, 0, "sequence", |b, d| {
            if b.op().serialises() {
                b.u32(&mut d.manufacturer)?;
                b.u32(&mut d.model)?;
                b.u64(&mut d.attributes)?;
                b.u32(&mut d.technology)?;
            }
            d.device.serialize(b)?;
            d.model_desc.serialize(b)
        })
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "Profile sequence, {} entries", self.count)?;
        for (i, d) in self.descs.iter().enumerate() {
            writeln!(
                out,
                "    {i}: mfg '{}' model '{}' attributes {:#x} technology '{}'",
                TypeSignature(d.manufacturer),
                TypeSignature(d.model),
                d.attributes,
                TypeSignature(d.technology)
            )?;
            writeln!(out, "        device \"{}\"", d.device.text())?;
            writeln!(out, "        model \"{}\"", d.model_desc.text())?;
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
    use crate::icc::tags::MlucRecord;

    #[test]
    fn test_mixed_sequence() {
        let mut data = TagData::new(TypeSignature::PROFILE_SEQUENCE_DESC);
        data.as_profile_sequence_desc_mut().unwrap().count = 2;
        allocate(&mut data);
        let p = data.as_profile_sequence_desc_mut().unwrap();
        p.descs[0].manufacturer = u32::from_be_bytes(*b"APPL");
        p.descs[0].device = DescText::Desc(TextDescription::ascii("Camera"));
        p.descs[0].model_desc = DescText::Desc(TextDescription::ascii("X100"));
        let mut mluc = Mluc { count: 1, records: vec![MlucRecord::new(*b"en", *b"US", "Scanner")] };
        p.descs[1].device = DescText::Mluc(mluc.clone());
        mluc.records[0].text = "S2".into();
        p.descs[1].model_desc = DescText::Mluc(mluc);

        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        let desc_size = |s: &str| 8 + 4 + s.len() + 1 + 8 + 3 + 67;
        let mluc_size = |s: &str| 16 + 12 + 2 * s.len();
        assert_eq!(
            bytes.len(),
            12 + 2 * 20 + desc_size("Camera") + desc_size("X100") + mluc_size("Scanner") + mluc_size("S2")
        );
        assert_eq!(back, data);
        let p = back.as_profile_sequence_desc().unwrap();
        assert_eq!(p.descs[1].device.text(), "Scanner");
        assert_eq!(p.descs[0].model_desc.type_sig(), TypeSignature::DESC);
    }

    #[test]
    fn test_foreign_embedded_type() {
        let mut bytes = b"pseq\0\0\0\0\0\0\0\x01".to_vec();
        bytes.extend_from_slice(&[0; 20]);
        bytes.extend_from_slice(b"text\0\0\0\0hello\0");
        bytes.extend_from_slice(&[0; 26]);
        assert_eq!(read(&bytes, CompatOptions::lenient()).unwrap_err().code(), 0x203);
    }
}
