//! Numeric array types
//!
//! `uInt8ArrayType`, `uInt16ArrayType`, `uInt32ArrayType`, `uInt64ArrayType`,
//! `u16Fixed16ArrayType`, `s15Fixed16ArrayType` and `XYZType`. All carry no
//! explicit count; the element count follows from the tag size.
//!
//! See ICC.1:2022 Sections 10.22 to 10.27 and 10.31.

use std::io;

use crate::error::Result;
use crate::icc::buffer::SnBuffer;
use crate::icc::tag::TagBody;
use crate::icc::types::{TypeSignature, XyzNumber};

use super::dump_limit;

macro_rules! numeric_array {
    ($(#[$doc:meta])* $name:ident, $elem:ty, $size:expr, $sig:ident, $prim:ident, $label:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Default)]
        pub struct $name {
            pub count: usize,
            pub data: Vec<$elem>,
        }

        impl TagBody for $name {
            fn type_sig(&self) -> TypeSignature {
                TypeSignature::$sig
            }

            fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
                if b.op().is_read() {
                    self.count = b.count_from_space($size, 0)?;
                }
                b.resize_checked(&mut self.count, &mut self.data, $size, 0, $label)?;
                if b.op().serialises() {
                    for v in self.data.iter_mut() {
                        b.$prim(v)?;
                    }
                }
                Ok(())
            }

            fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
                writeln!(out, "{}, {} entries", $label, self.count)?;
                for (i, v) in self.data.iter().enumerate().take(dump_limit(verbose)) {
                    writeln!(out, "    {i}: {v}")?;
                }
                Ok(())
            }
        }
    };
}

numeric_array!(
    /// Array of unsigned bytes
    UInt8Array, u8, 1, UINT8_ARRAY, u8, "uInt8 array"
);
numeric_array!(UInt16Array, u16, 2, UINT16_ARRAY, u16, "uInt16 array");
numeric_array!(UInt32Array, u32, 4, UINT32_ARRAY, u32, "uInt32 array");
numeric_array!(UInt64Array, u64, 8, UINT64_ARRAY, u64, "uInt64 array");
numeric_array!(
    /// Array of unsigned 16.16 fixed-point values
    U16Fixed16Array, f64, 4, U16F16_ARRAY, u16f16, "u16Fixed16 array"
);
numeric_array!(
    /// Array of signed 15.16 fixed-point values; the `chad` matrix uses nine of these
    S15Fixed16Array, f64, 4, S15F16_ARRAY, s15f16, "s15Fixed16 array"
);

impl S15Fixed16Array {
    /// First nine values as a row-major 3x3 matrix
    pub fn as_matrix(&self) -> Option<[[f64; 3]; 3]> {
        if self.data.len() < 9 {
            return None;
        }
        let d = &self.data;
        Some([[d[0], d[1], d[2]], [d[3], d[4], d[5]], [d[6], d[7], d[8]]])
    }
}

/// Array of XYZ numbers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XyzArray {
    pub count: usize,
    pub data: Vec<XyzNumber>,
}

impl XyzArray {
    /// The first value, which is all most XYZ tags hold
    pub fn first(&self) -> Option<XyzNumber> {
        self.data.first().copied()
    }
}

impl TagBody for XyzArray {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::XYZ
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        if b.op().is_read() {
            self.count = b.count_from_space(12, 0)?;
        }
        b.resize_checked(&mut self.count, &mut self.data, 12, 0, "XYZ array")?;
        if b.op().serialises() {
            for v in self.data.iter_mut() {
                b.xyz(v)?;
            }
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        writeln!(out, "XYZ, {} entries", self.count)?;
        for v in self.data.iter().take(dump_limit(verbose).max(1)) {
            writeln!(out, "    X={:.6} Y={:.6} Z={:.6}", v.x, v.y, v.z)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::TagData;
    use super::super::test_util::*;
    use crate::icc::compat::CompatOptions;
    use crate::icc::types::{D50, TypeSignature};

    #[test]
    fn test_xyz_encoding() {
        let mut data = TagData::new(TypeSignature::XYZ);
        data.as_xyz_mut().unwrap().count = 1;
        allocate(&mut data);
        data.as_xyz_mut().unwrap().data[0] = D50;
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0xf6, 0xd6]);
        assert_eq!(back.as_xyz().unwrap().first(), Some(D50));
    }

    #[test]
    fn test_count_follows_tag_size() {
        let bytes = b"ui16\0\0\0\0\x00\x01\x00\x02\xff\xff".to_vec();
        let back = read(&bytes, CompatOptions::strict()).unwrap();
        assert_eq!(back.as_uint16_array().unwrap().data, vec![1, 2, 0xffff]);

        let odd = b"ui16\0\0\0\0\x00\x01\x00".to_vec();
        assert_eq!(read(&odd, CompatOptions::strict()).unwrap_err().code(), 0x223);
    }

    #[test]
    fn test_chad_matrix() {
        let mut data = TagData::new(TypeSignature::S15F16_ARRAY);
        let arr = data.as_s15f16_array_mut().unwrap();
        arr.count = 9;
        allocate(&mut data);
        let arr = data.as_s15f16_array_mut().unwrap();
        arr.data.copy_from_slice(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let (_, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        let m = back.as_s15f16_array().unwrap().as_matrix().unwrap();
        assert_eq!(m[1][1], 1.0);
        assert_eq!(m[0][1], 0.0);
    }
}
