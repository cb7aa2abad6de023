//! Colorant description types
//!
//! - chrm: phosphor or colorant chromaticities (ICC.1:2022 Section 10.2)
//! - clro: colorant laydown order (ICC.1:2022 Section 10.3)
//! - clrt: colorant names and PCS values (ICC.1:2022 Section 10.4)
//! - ncl2: named color list (ICC.1:2022 Section 10.17)

use std::io;

use crate::error::{Direction, FormatCode, Result};
use crate::icc::buffer::{SnBuffer, SnContext};
use crate::icc::tag::TagBody;
use crate::icc::types::{TagSignature, TypeSignature};

use super::dump_limit;

/// Size of the fixed name fields in clrt and ncl2
const NAME_FIELD: usize = 32;

/// Maximum device coordinates of a named color
pub const MAX_DEVICE_COORDS: usize = 15;

/// Chromaticity tag data (chrm type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chromaticity {
    pub channels: usize,
    /// Phosphor or colorant encoding, 0 for unknown
    pub encoding: u16,
    /// CIE xy per channel
    pub data: Vec<[f64; 2]>,
}

impl Chromaticity {
    pub const ITU_R_BT709: u16 = 1;
    pub const SMPTE_RP145: u16 = 2;
    pub const EBU_TECH_3213: u16 = 3;
    pub const P22: u16 = 4;

    /// Standard xy values of a known encoding
    pub fn standard(encoding: u16) -> Option<[[f64; 2]; 3]> {
        match encoding {
            Self::ITU_R_BT709 => Some([[0.640, 0.330], [0.300, 0.600], [0.150, 0.060]]),
            Self::SMPTE_RP145 => Some([[0.630, 0.340], [0.310, 0.595], [0.155, 0.070]]),
            Self::EBU_TECH_3213 => Some([[0.640, 0.330], [0.290, 0.600], [0.150, 0.060]]),
            Self::P22 => Some([[0.625, 0.340], [0.280, 0.605], [0.155, 0.070]]),
            _ => None,
        }
    }
}

impl TagBody for Chromaticity {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::CHROMATICITY
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.count16(&mut self.channels)?;
        b.u16(&mut self.encoding)?;
        if b.op().serialises() && self.encoding > Self::P22 {
            b.warn(
                FormatCode::CHRMENC,
                format!("unknown colorant encoding {}", self.encoding),
            )?;
        }
        b.resize_checked(&mut self.channels, &mut self.data, 8, 0, "chromaticities")?;
        if b.op().serialises() {
            for [x, y] in self.data.iter_mut() {
                b.u16f16(x)?;
                b.u16f16(y)?;
            }
        }
        Ok(())
    }

    fn check(&self, ctx: &mut SnContext<'_>, _sig: TagSignature, dir: Direction) -> Result<()> {
        let Some(standard) = Self::standard(self.encoding) else {
            return Ok(());
        };
        if self.channels != 3 {
            return ctx.format_warning(
                dir,
                FormatCode::CHRMCHAN,
                format!("encoding {} needs 3 channels, not {}", self.encoding, self.channels),
            );
        }
        let matches = self
            .data
            .iter()
            .zip(standard.iter())
            .all(|(v, s)| (v[0] - s[0]).abs() < 1e-3 && (v[1] - s[1]).abs() < 1e-3);
        if !matches {
            ctx.format_warning(
                dir,
                FormatCode::CHRMVALS,
                format!("values disagree with encoding {}", self.encoding),
            )?;
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "Chromaticity, {} channels, encoding {}", self.channels, self.encoding)?;
        for (i, [x, y]) in self.data.iter().enumerate() {
            writeln!(out, "    {i}: x={x:.6} y={y:.6}")?;
        }
        Ok(())
    }
}

/// Colorant order tag data (clro type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorantOrder {
    pub count: usize,
    /// Channel numbers in laydown order
    pub data: Vec<u8>,
}

impl TagBody for ColorantOrder {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::COLORANT_ORDER
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.count32(&mut self.count)?;
        b.resize_checked(&mut self.count, &mut self.data, 1, 0, "colorant order")?;
        b.bytes(&mut self.data)
    }

    fn check(&self, ctx: &mut SnContext<'_>, _sig: TagSignature, dir: Direction) -> Result<()> {
        let channels = ctx.header.color_space.channels();
        if channels != 0 && self.count != channels {
            ctx.format_warning(
                dir,
                FormatCode::CORDCHAN,
                format!("{} colorants for a {channels}-channel space", self.count),
            )?;
        }
        let mut seen = [false; 256];
        for &v in &self.data {
            if v as usize >= self.count || seen[v as usize] {
                return ctx.format_warning(
                    dir,
                    FormatCode::CORDVALS,
                    format!("colorant order entry {v} is out of range or repeated"),
                );
            }
            seen[v as usize] = true;
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "Colorant order: {:?}", self.data)
    }
}

/// One colorant of a clrt tag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Colorant {
    pub name: String,
    /// PCS value in the header PCS encoding
    pub pcs: [u16; 3],
}

/// Colorant table tag data (clrt type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorantTable {
    pub count: usize,
    pub colorants: Vec<Colorant>,
}

impl TagBody for ColorantTable {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::COLORANT_TABLE
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.count32(&mut self.count)?;
        b.array_of(
            &mut self.count,
            &mut self.colorants,
            NAME_FIELD + 6,
            0,
            "colorant table",
            |b, c| {
                b.fixed_ascii(&mut c.name, NAME_FIELD)?;
                if b.op().serialises() {
                    for v in c.pcs.iter_mut() {
                        b.u16(v)?;
                    }
                }
                Ok(())
            },
        )
    }

    fn check(&self, ctx: &mut SnContext<'_>, sig: TagSignature, dir: Direction) -> Result<()> {
        let space = if sig == TagSignature::COLORANT_TABLE_OUT {
            ctx.header.pcs
        } else {
            ctx.header.color_space
        };
        let channels = space.channels();
        if channels != 0 && !space.is_pcs() && self.count != channels {
            ctx.format_warning(
                dir,
                FormatCode::CORDCHAN,
                format!("'{sig}' lists {} colorants for a {channels}-channel space", self.count),
            )?;
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "Colorant table, {} colorants", self.count)?;
        for c in &self.colorants {
            writeln!(out, "    \"{}\": {:?}", c.name, c.pcs)?;
        }
        Ok(())
    }
}

/// One entry of a named color list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamedColor {
    /// Name between the list prefix and suffix
    pub root: String,
    /// PCS value in the header PCS encoding
    pub pcs: [u16; 3],
    /// Device coordinates, `device_coords` of them
    pub device: Vec<u16>,
}

/// Named color list (ncl2 type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamedColor2 {
    pub vendor_flag: u32,
    pub count: usize,
    pub device_coords: usize,
    pub prefix: String,
    pub suffix: String,
    pub colors: Vec<NamedColor>,
}

impl NamedColor2 {
    /// Full name of a color
    pub fn full_name(&self, color: &NamedColor) -> String {
        format!("{}{}{}", self.prefix, color.root, self.suffix)
    }
}

impl TagBody for NamedColor2 {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::NAMED_COLOR2
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.u32(&mut self.vendor_flag)?;
        b.count32(&mut self.count)?;
        b.count32(&mut self.device_coords)?;
        if b.op().serialises() && self.device_coords > MAX_DEVICE_COORDS {
            b.warn(
                FormatCode::DEVICE,
                format!("{} device coordinates, at most 15 allowed", self.device_coords),
            )?;
        }
        b.fixed_ascii(&mut self.prefix, NAME_FIELD)?;
        b.fixed_ascii(&mut self.suffix, NAME_FIELD)?;
        let coords = self.device_coords;
        let item = coords.saturating_mul(2).saturating_add(NAME_FIELD + 6);
        b.array_of(&mut self.count, &mut self.colors, item, 0, "named colors", |b, c| {
            b.fixed_ascii(&mut c.root, NAME_FIELD)?;
            if b.op().serialises() {
                for v in c.pcs.iter_mut() {
                    b.u16(v)?;
                }
            }
            let mut n = coords;
            b.resize_checked(&mut n, &mut c.device, 2, 0, "device coordinates")?;
            if b.op().serialises() {
                for v in c.device.iter_mut() {
                    b.u16(v)?;
                }
            }
            Ok(())
        })
    }

    fn check(&self, ctx: &mut SnContext<'_>, _sig: TagSignature, dir: Direction) -> Result<()> {
        let channels = ctx.header.color_space.channels();
        if self.device_coords != 0 && channels != 0 && self.device_coords != channels {
            ctx.format_warning(
                dir,
                FormatCode::DEVICE,
                format!(
                    "{} device coordinates for a {channels}-channel space",
                    self.device_coords
                ),
            )?;
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        writeln!(
            out,
            "Named colors: {} entries, {} device coordinates",
            self.count, self.device_coords
        )?;
        for c in self.colors.iter().take(dump_limit(verbose)) {
            writeln!(out, "    \"{}\": PCS {:?} device {:?}", self.full_name(c), c.pcs, c.device)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::TagData;
    use super::super::test_util::*;
    use super::*;
    use crate::alloc::StdHeap;
    use crate::icc::compat::CompatOptions;
    use crate::icc::header::ColorSpace;

    #[test]
    fn test_chromaticity_check() {
        let mut data = TagData::new(TypeSignature::CHROMATICITY);
        let c = data.as_chromaticity_mut().unwrap();
        c.channels = 3;
        c.encoding = Chromaticity::ITU_R_BT709;
        allocate(&mut data);
        let c = data.as_chromaticity_mut().unwrap();
        c.data.copy_from_slice(&Chromaticity::standard(1).unwrap());
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 12 + 24);

        let heap = StdHeap::new();
        let mut cx = ctx(&heap, CompatOptions::strict());
        let c = back.as_chromaticity().unwrap();
        assert!(c.check(&mut cx, TagSignature::CHROMATICITY, Direction::Read).is_ok());
        let mut off = c.clone();
        off.data[0][0] = 0.5;
        assert_eq!(
            off.check(&mut cx, TagSignature::CHROMATICITY, Direction::Read).unwrap_err().code(),
            0x233
        );
    }

    #[test]
    fn test_colorant_order_values() {
        let heap = StdHeap::new();
        let mut cx = ctx(&heap, CompatOptions::strict());
        cx.header.color_space = ColorSpace::Cmyk;
        let good = ColorantOrder { count: 4, data: vec![3, 2, 1, 0] };
        assert!(good.check(&mut cx, TagSignature::COLORANT_ORDER, Direction::Write).is_ok());
        let repeated = ColorantOrder { count: 4, data: vec![0, 0, 1, 2] };
        assert_eq!(
            repeated.check(&mut cx, TagSignature::COLORANT_ORDER, Direction::Write).unwrap_err().code(),
            0x335
        );
    }

    #[test]
    fn test_named_colors() {
        let mut data = TagData::new(TypeSignature::NAMED_COLOR2);
        let n = data.as_named_color2_mut().unwrap();
        n.count = 2;
        n.device_coords = 4;
        n.prefix = "PANTONE ".into();
        n.suffix = " C".into();
        allocate(&mut data);
        let n = data.as_named_color2_mut().unwrap();
        n.colors[0].root = "185".into();
        n.colors[0].pcs = [0x8000, 0x1000, 0x2000];
        n.colors[1].device.copy_from_slice(&[1, 2, 3, 4]);
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 8 + 12 + 64 + 2 * (32 + 6 + 8));
        assert_eq!(back, data);
        let n = back.as_named_color2().unwrap();
        assert_eq!(n.full_name(&n.colors[0]), "PANTONE 185 C");
    }

    #[test]
    fn test_colorant_table_count_past_end() {
        let mut bytes = b"clrt\0\0\0\0".to_vec();
        bytes.extend_from_slice(&[0x00, 0x10, 0x00, 0x00]);
        bytes.extend_from_slice(&[0; 38]);
        assert_eq!(read(&bytes, CompatOptions::lenient()).unwrap_err().code(), 0x105);
    }
}
