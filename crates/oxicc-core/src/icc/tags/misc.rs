//! Small fixed-layout types
//!
//! dtim, sig, meas, view, scrn, bfd and cicp. The enumerated fields are
//! kept as raw numbers and validated against the ICC encodings on both
//! read and write.

use std::io;

use crate::error::{Direction, FormatCode, Result};
use crate::icc::buffer::{SnBuffer, SnContext};
use crate::icc::tag::TagBody;
use crate::icc::types::{DateTimeNumber, TagSignature, TypeSignature, XyzNumber};

use super::dump_limit;

/// Raise `sub` when an enumerated field is outside `valid`
fn encoding(
    b: &mut SnBuffer<'_, '_>,
    v: u32,
    valid: impl FnOnce(u32) -> bool,
    sub: FormatCode,
    what: &str,
) -> Result<()> {
    if b.op().serialises() && !valid(v) {
        b.warn(sub, format!("unknown {what} encoding {v:#x}"))?;
    }
    Ok(())
}

fn illuminant_valid(v: u32) -> bool {
    v <= Measurement::ILLUMINANT_E
}

/// Date-time tag data (dtim type)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DateTimeTag {
    pub value: DateTimeNumber,
}

impl TagBody for DateTimeTag {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::DATE_TIME
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.date_time(&mut self.value)
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "Date: {}", self.value)
    }
}

/// Signature tag data (sig type), e.g. the `tech` tag
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignatureTag {
    pub sig: u32,
}

impl TagBody for SignatureTag {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::SIGNATURE
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.u32(&mut self.sig)
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "Signature: '{}'", TypeSignature(self.sig))
    }
}

/// Measurement conditions (meas type)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    /// 0 unknown, 1 CIE 1931, 2 CIE 1964
    pub observer: u32,
    pub backing: XyzNumber,
    /// 0 unknown, 1 0/45 or 45/0, 2 0/d or d/0
    pub geometry: u32,
    /// 0.0 to 1.0
    pub flare: f64,
    /// Standard illuminant, 0 unknown to 8 E
    pub illuminant: u32,
}

impl Measurement {
    pub const OBSERVER_1931: u32 = 1;
    pub const OBSERVER_1964: u32 = 2;
    pub const ILLUMINANT_D50: u32 = 1;
    pub const ILLUMINANT_D65: u32 = 2;
    pub const ILLUMINANT_E: u32 = 8;
}

impl TagBody for Measurement {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::MEASUREMENT
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.u32(&mut self.observer)?;
        encoding(b, self.observer, |v| v <= 2, FormatCode::STOBS, "standard observer")?;
        b.xyz(&mut self.backing)?;
        b.u32(&mut self.geometry)?;
        encoding(b, self.geometry, |v| v <= 2, FormatCode::MESGEOM, "measurement geometry")?;
        b.u16f16(&mut self.flare)?;
        b.u32(&mut self.illuminant)?;
        encoding(b, self.illuminant, illuminant_valid, FormatCode::PRILL, "illuminant")
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "Measurement:")?;
        writeln!(out, "  Observer = {}", self.observer)?;
        writeln!(
            out,
            "  Backing = X {:.6} Y {:.6} Z {:.6}",
            self.backing.x, self.backing.y, self.backing.z
        )?;
        writeln!(out, "  Geometry = {}", self.geometry)?;
        writeln!(out, "  Flare = {:.2}%", self.flare * 100.0)?;
        writeln!(out, "  Illuminant = {}", self.illuminant)
    }
}

/// Viewing conditions (view type)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewingConditions {
    /// Absolute illuminant in cd/m^2
    pub illuminant: XyzNumber,
    /// Absolute surround in cd/m^2
    pub surround: XyzNumber,
    pub std_illuminant: u32,
}

impl TagBody for ViewingConditions {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::VIEWING_CONDITIONS
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.xyz(&mut self.illuminant)?;
        b.xyz(&mut self.surround)?;
        b.u32(&mut self.std_illuminant)?;
        encoding(b, self.std_illuminant, illuminant_valid, FormatCode::PRILL, "illuminant")
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        let (i, s) = (self.illuminant, self.surround);
        writeln!(out, "Viewing conditions:")?;
        writeln!(out, "  Illuminant = X {:.6} Y {:.6} Z {:.6}", i.x, i.y, i.z)?;
        writeln!(out, "  Surround = X {:.6} Y {:.6} Z {:.6}", s.x, s.y, s.z)?;
        writeln!(out, "  Standard illuminant = {}", self.std_illuminant)
    }
}

/// Screening parameters of one channel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenEntry {
    /// Lines per inch or centimeter, per the screening flag
    pub frequency: f64,
    /// Degrees
    pub angle: f64,
    /// 1 printer default, 2 round, 3 diamond, 4 ellipse, 5 line, 6 square, 7 cross
    pub spot_shape: u32,
}

/// Screening tag data (scrn type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Screening {
    pub flag: u32,
    pub channels: usize,
    pub data: Vec<ScreenEntry>,
}

impl Screening {
    pub const DEFAULT_SCREENS: u32 = 0x1;
    pub const LINES_PER_INCH: u32 = 0x2;
}

impl TagBody for Screening {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::SCREENING
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.u32(&mut self.flag)?;
        b.count32(&mut self.channels)?;
        b.resize_checked(&mut self.channels, &mut self.data, 12, 0, "screening")?;
        if !b.op().serialises() {
            return Ok(());
        }
        for e in self.data.iter_mut() {
            b.s15f16(&mut e.frequency)?;
            b.s15f16(&mut e.angle)?;
            b.u32(&mut e.spot_shape)?;
            encoding(b, e.spot_shape, |v| (1..=7).contains(&v), FormatCode::SPSHAPE, "spot shape")?;
        }
        Ok(())
    }

    fn check(&self, ctx: &mut SnContext<'_>, _sig: TagSignature, dir: Direction) -> Result<()> {
        let channels = ctx.header.color_space.channels();
        if channels != 0 && self.channels > channels {
            ctx.format_warning(
                dir,
                FormatCode::SCREEN,
                format!("{} screens for a {channels}-channel space", self.channels),
            )?;
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "Screening, flag {:#x}, {} channels", self.flag, self.channels)?;
        for (i, e) in self.data.iter().enumerate() {
            writeln!(
                out,
                "    {i}: frequency {:.2} angle {:.2} spot {}",
                e.frequency, e.angle, e.spot_shape
            )?;
        }
        Ok(())
    }
}

/// Under color removal and black generation (bfd type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UcrBg {
    pub ucr_count: usize,
    /// Single value in percent when the count is 1, otherwise a curve
    pub ucr: Vec<u16>,
    pub bg_count: usize,
    pub bg: Vec<u16>,
    pub description: String,
}

impl TagBody for UcrBg {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::UCR_BG
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.count32(&mut self.ucr_count)?;
        b.resize_checked(&mut self.ucr_count, &mut self.ucr, 2, 4, "UCR curve")?;
        if b.op().serialises() {
            for v in self.ucr.iter_mut() {
                b.u16(v)?;
            }
        }
        b.count32(&mut self.bg_count)?;
        b.resize_checked(&mut self.bg_count, &mut self.bg, 2, 0, "BG curve")?;
        if b.op().serialises() {
            for v in self.bg.iter_mut() {
                b.u16(v)?;
            }
        }
        b.ascii_to_end(&mut self.description, FormatCode::VZ8STRING)
    }

    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        writeln!(out, "UCR/BG: \"{}\"", self.description)?;
        writeln!(out, "  UCR, {} entries", self.ucr_count)?;
        for (i, v) in self.ucr.iter().enumerate().take(dump_limit(verbose)) {
            writeln!(out, "    {i}: {v}")?;
        }
        writeln!(out, "  BG, {} entries", self.bg_count)?;
        for (i, v) in self.bg.iter().enumerate().take(dump_limit(verbose)) {
            writeln!(out, "    {i}: {v}")?;
        }
        Ok(())
    }
}

/// Coding-independent code points (cicp type), ITU-T H.273
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cicp {
    pub primaries: u8,
    pub transfer: u8,
    pub matrix: u8,
    pub full_range: u8,
}

impl TagBody for Cicp {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::CICP
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.u8(&mut self.primaries)?;
        b.u8(&mut self.transfer)?;
        b.u8(&mut self.matrix)?;
        b.u8(&mut self.full_range)
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(
            out,
            "CICP: primaries {} transfer {} matrix {} full range {}",
            self.primaries, self.transfer, self.matrix, self.full_range
        )
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
    use crate::icc::types::D50;

    #[test]
    fn test_measurement() {
        let mut data = TagData::Measurement(Measurement {
            observer: Measurement::OBSERVER_1931,
            backing: XyzNumber::new(0.0, 0.0, 0.0),
            geometry: 1,
            flare: 0.01,
            illuminant: Measurement::ILLUMINANT_D50,
        });
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 8 + 36);
        let m = back.as_measurement().unwrap();
        assert_eq!(m.geometry, 1);
        assert!((m.flare - 0.01).abs() < 1e-4);

        let mut bad = bytes.clone();
        bad[8..12].copy_from_slice(&[0, 0, 0, 7]);
        assert_eq!(read(&bad, CompatOptions::strict()).unwrap_err().code(), 0x216);
        assert!(read(&bad, CompatOptions::lenient()).is_ok());
    }

    #[test]
    fn test_viewing_conditions_illuminant() {
        let mut data = TagData::ViewingConditions(ViewingConditions {
            illuminant: D50,
            surround: XyzNumber::new(0.2, 0.2, 0.2),
            std_illuminant: 9,
        });
        assert_eq!(write_read(&mut data, CompatOptions::strict()).unwrap_err().code(), 0x317);
    }

    #[test]
    fn test_screening() {
        let mut data = TagData::new(TypeSignature::SCREENING);
        let s = data.as_screening_mut().unwrap();
        s.flag = Screening::LINES_PER_INCH;
        s.channels = 2;
        allocate(&mut data);
        let s = data.as_screening_mut().unwrap();
        for e in s.data.iter_mut() {
            *e = ScreenEntry { frequency: 150.0, angle: 45.0, spot_shape: 2 };
        }
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 16 + 24);
        assert_eq!(back, data);

        let heap = StdHeap::new();
        let mut cx = ctx(&heap, CompatOptions::strict());
        cx.header.color_space = ColorSpace::Gray;
        let s = back.as_screening().unwrap();
        assert_eq!(
            s.check(&mut cx, TagSignature::SCREENING, Direction::Read).unwrap_err().code(),
            0x208
        );
    }

    #[test]
    fn test_ucr_bg() {
        let mut data = TagData::new(TypeSignature::UCR_BG);
        let u = data.as_ucr_bg_mut().unwrap();
        u.ucr_count = 1;
        u.bg_count = 3;
        u.description = "GCR medium".into();
        allocate(&mut data);
        let u = data.as_ucr_bg_mut().unwrap();
        u.ucr[0] = 80;
        u.bg.copy_from_slice(&[0, 0x8000, 0xffff]);
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 8 + 4 + 2 + 4 + 6 + 11);
        assert_eq!(back, data);
    }

    #[test]
    fn test_cicp_and_signature() {
        let mut data = TagData::Cicp(Cicp { primaries: 1, transfer: 13, matrix: 0, full_range: 1 });
        let (bytes, _) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(&bytes[8..], &[1, 13, 0, 1]);

        let mut data = TagData::Signature(SignatureTag { sig: u32::from_be_bytes(*b"fscn") });
        let (_, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(back, data);
    }
}
