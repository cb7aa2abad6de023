//! Opaque payload for types this library does not interpret

use std::io;

use crate::error::Result;
use crate::icc::buffer::SnBuffer;
use crate::icc::tag::TagBody;
use crate::icc::types::TypeSignature;

use super::dump_limit;

/// Raw bytes of a tag whose type is not understood
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnknownTag {
    /// Type signature found in (or written to) the type header
    pub uttype: TypeSignature,
    pub count: usize,
    pub data: Vec<u8>,
}

impl UnknownTag {
    pub fn new(uttype: TypeSignature) -> Self {
        Self {
            uttype,
            ..Self::default()
        }
    }
}

impl TagBody for UnknownTag {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::UNKNOWN
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        if b.op().is_read() {
            self.count = b.space();
        }
        b.resize_checked(&mut self.count, &mut self.data, 1, 0, "unknown data")?;
        b.bytes(&mut self.data)
    }

    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        writeln!(out, "Unknown type '{}', {} bytes", self.uttype, self.count)?;
        for chunk in self.data.chunks(16).take(dump_limit(verbose)) {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            writeln!(out, "    {}", hex.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::TagData;
    use super::super::test_util::*;
    use crate::icc::compat::CompatOptions;
    use crate::icc::types::TypeSignature;

    #[test]
    fn test_keeps_real_type_and_bytes() {
        let bytes = b"zork\0\0\0\0\x01\x02\x03".to_vec();
        let data = read(&bytes, CompatOptions::strict()).unwrap();
        let unknown = data.as_unknown().unwrap();
        assert_eq!(unknown.uttype, TypeSignature::from_bytes(*b"zork"));
        assert_eq!(unknown.data, vec![1, 2, 3]);

        let mut data = data;
        let (written, _) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(written, bytes);
        assert!(matches!(data, TagData::Unknown(_)));
    }
}
