//! ICC Profile Header
//!
//! The ICC profile header is exactly 128 bytes and contains basic profile information.
//! See ICC.1:2022 Section 7.2.
//!
//! Enumerated fields keep unrecognized values in an `Other` variant, so a
//! profile read under lenient options writes back unchanged.

use super::buffer::SnBuffer;
use super::types::{DateTimeNumber, Tv, XyzNumber, D50, sig_to_string};
use crate::error::{Error, FormatCode, Result};

/// Profile file signature - must be 'acsp' (0x61637370)
pub const PROFILE_SIGNATURE: u32 = 0x61637370;

/// Size of the fixed header
pub const HEADER_SIZE: usize = 128;

/// Offset of the profile id within the header
pub const PROFILE_ID_OFFSET: usize = 84;

/// Offset of the profile flags within the header
pub const PROFILE_FLAGS_OFFSET: usize = 44;

/// Offset of the rendering intent within the header
pub const RENDERING_INTENT_OFFSET: usize = 64;

/// ICC Profile Header (128 bytes)
#[derive(Debug, Clone, PartialEq)]
pub struct IccHeader {
    /// Profile size in bytes, filled in on write
    pub size: u32,
    /// Preferred CMM type signature
    pub cmm_type: u32,
    pub version: ProfileVersion,
    pub device_class: ProfileClass,
    /// Color space of data (RGB, CMYK, etc.)
    pub color_space: ColorSpace,
    /// Profile connection space (XYZ or Lab)
    pub pcs: ColorSpace,
    pub creation_date: DateTimeNumber,
    /// Primary platform signature
    pub platform: u32,
    pub flags: u32,
    /// Device manufacturer signature
    pub manufacturer: u32,
    /// Device model signature
    pub model: u32,
    pub attributes: u64,
    pub rendering_intent: RenderingIntent,
    /// PCS illuminant (should be D50)
    pub illuminant: XyzNumber,
    pub creator: u32,
    /// Profile ID (MD5 hash, or zero)
    pub profile_id: [u8; 16],
}

impl Default for IccHeader {
    fn default() -> Self {
        Self {
            size: 0,
            cmm_type: 0,
            version: ProfileVersion::from_tv(super::types::TV_DEFAULT).unwrap_or_default(),
            device_class: ProfileClass::Other(0),
            color_space: ColorSpace::Other(0),
            pcs: ColorSpace::Other(0),
            creation_date: DateTimeNumber::default(),
            platform: 0,
            flags: 0,
            manufacturer: 0,
            model: 0,
            attributes: 0,
            rendering_intent: RenderingIntent::Perceptual,
            illuminant: D50,
            creator: 0,
            profile_id: [0; 16],
        }
    }
}

/// Platform signatures recognized in the header
const KNOWN_PLATFORMS: [&[u8; 4]; 5] = [b"APPL", b"MSFT", b"SGI ", b"SUNW", b"TGNT"];

impl IccHeader {
    /// Serialize the header in the buffer's mode.
    ///
    /// A wrong magic number or unsupported major version fails outright;
    /// unknown enumerated values are format warnings.
    pub(crate) fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        if b.op().is_read() && b.space() < HEADER_SIZE {
            return Err(Error::HeaderLength(format!(
                "{} bytes available, header needs {HEADER_SIZE}",
                b.space()
            )));
        }
        b.u32(&mut self.size)?;
        b.u32(&mut self.cmm_type)?;
        self.version.serialize(b)?;

        let mut class = self.device_class.to_u32();
        b.u32(&mut class)?;
        let mut cs = self.color_space.to_u32();
        b.u32(&mut cs)?;
        let mut pcs = self.pcs.to_u32();
        b.u32(&mut pcs)?;
        if b.op().is_read() {
            self.device_class = ProfileClass::from_u32(class);
            self.color_space = ColorSpace::from_u32(cs);
            self.pcs = ColorSpace::from_u32(pcs);
        }
        b.date_time(&mut self.creation_date)?;

        let mut magic = PROFILE_SIGNATURE;
        b.u32(&mut magic)?;
        if magic != PROFILE_SIGNATURE {
            return Err(Error::MagicNumber(magic));
        }

        b.u32(&mut self.platform)?;
        b.u32(&mut self.flags)?;
        b.u32(&mut self.manufacturer)?;
        b.u32(&mut self.model)?;
        b.u64(&mut self.attributes)?;
        let mut intent = self.rendering_intent.to_u32();
        b.u32(&mut intent)?;
        if b.op().is_read() {
            self.rendering_intent = RenderingIntent::from_u32(intent);
        }
        b.xyz(&mut self.illuminant)?;
        b.u32(&mut self.creator)?;
        b.bytes(&mut self.profile_id)?;
        b.pad(28)?;

        if b.op().serialises() {
            self.check(b)?;
        }
        Ok(())
    }

    fn check(&self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        if let ProfileClass::Other(v) = self.device_class {
            b.warn(FormatCode::PROF, format!("unknown profile class {}", sig_to_string(v)))?;
        }
        if let ColorSpace::Other(v) = self.color_space {
            b.warn(FormatCode::COLSP, format!("unknown color space {}", sig_to_string(v)))?;
        }
        if let ColorSpace::Other(v) = self.pcs {
            b.warn(FormatCode::COLSP, format!("unknown PCS {}", sig_to_string(v)))?;
        }
        if self.platform != 0 && !KNOWN_PLATFORMS.iter().any(|p| u32::from_be_bytes(**p) == self.platform) {
            b.warn(
                FormatCode::PLAT,
                format!("unknown platform {}", sig_to_string(self.platform)),
            )?;
        }
        if let RenderingIntent::Other(v) = self.rendering_intent {
            b.warn(FormatCode::INTENT, format!("unknown rendering intent {v}"))?;
        }
        Ok(())
    }

    /// Class and color spaces, as needed by tag consistency checks
    pub fn summary(&self) -> HeaderSummary {
        HeaderSummary {
            class: self.device_class,
            color_space: self.color_space,
            pcs: self.pcs,
        }
    }

    /// Check if this is a matrix/TRC profile
    pub fn is_matrix_shaper(&self) -> bool {
        matches!(
            self.device_class,
            ProfileClass::Display | ProfileClass::Input | ProfileClass::Output
        ) && matches!(self.color_space, ColorSpace::Rgb)
    }

    pub fn dump(&self, out: &mut dyn std::io::Write, verbose: u32) -> std::io::Result<()> {
        let v = self.version;
        writeln!(out, "Header:")?;
        writeln!(out, "  Size         = {} bytes", self.size)?;
        writeln!(out, "  CMM          = {}", sig_to_string(self.cmm_type))?;
        writeln!(out, "  Version      = {}.{}.{}", v.major, v.minor, v.patch)?;
        writeln!(out, "  Device Class = {:?}", self.device_class)?;
        writeln!(out, "  Color Space  = {:?}", self.color_space)?;
        writeln!(out, "  PCS          = {:?}", self.pcs)?;
        writeln!(out, "  Intent       = {:?}", self.rendering_intent)?;
        if verbose == 0 {
            return Ok(());
        }
        let d = self.creation_date;
        writeln!(
            out,
            "  Date         = {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            d.year, d.month, d.day, d.hour, d.minute, d.second
        )?;
        writeln!(out, "  Platform     = {}", sig_to_string(self.platform))?;
        writeln!(out, "  Flags        = 0x{:08x}", self.flags)?;
        writeln!(out, "  Manufacturer = {}", sig_to_string(self.manufacturer))?;
        writeln!(out, "  Model        = {}", sig_to_string(self.model))?;
        writeln!(out, "  Attributes   = 0x{:016x}", self.attributes)?;
        let i = self.illuminant;
        writeln!(out, "  Illuminant   = {:.6}, {:.6}, {:.6}", i.x, i.y, i.z)?;
        writeln!(out, "  Creator      = {}", sig_to_string(self.creator))?;
        let id: String = self.profile_id.iter().map(|b| format!("{b:02x}")).collect();
        writeln!(out, "  ID           = {id}")
    }
}

/// Header fields tag checks depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSummary {
    pub class: ProfileClass,
    pub color_space: ColorSpace,
    pub pcs: ColorSpace,
}

impl Default for HeaderSummary {
    fn default() -> Self {
        Self {
            class: ProfileClass::Other(0),
            color_space: ColorSpace::Other(0),
            pcs: ColorSpace::Other(0),
        }
    }
}

/// ICC Profile Version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl ProfileVersion {
    /// Split a version number into header fields
    pub fn from_tv(tv: Tv) -> Result<Self> {
        let major = tv / 10000;
        let minor = (tv / 100) % 100;
        let patch = tv % 100;
        if major > 255 || minor > 15 || patch > 15 {
            return Err(Error::UnknownVersion(tv));
        }
        Ok(Self {
            major: major as u8,
            minor: minor as u8,
            patch: patch as u8,
        })
    }

    pub fn to_tv(self) -> Tv {
        self.major as Tv * 10000 + self.minor as Tv * 100 + self.patch as Tv
    }

    /// Check if version is at least the specified version
    pub fn at_least(&self, major: u8, minor: u8) -> bool {
        self.major > major || (self.major == major && self.minor >= minor)
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        let mut major = self.major;
        let mut minor = (self.minor << 4) | (self.patch & 0x0f);
        b.u8(&mut major)?;
        b.u8(&mut minor)?;
        b.pad(2)?;
        if b.op().is_read() {
            if !(2..=5).contains(&major) {
                return Err(Error::HeaderVersion(major));
            }
            self.major = major;
            self.minor = minor >> 4;
            self.patch = minor & 0x0f;
        }
        Ok(())
    }
}

/// ICC Profile Class (Device Class)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileClass {
    /// Input device (scanner, camera)
    Input,
    /// Display device (monitor)
    Display,
    /// Output device (printer)
    Output,
    DeviceLink,
    /// Color space conversion
    ColorSpace,
    Abstract,
    NamedColor,
    /// Unrecognized or unset (0)
    Other(u32),
}

impl ProfileClass {
    pub fn from_u32(val: u32) -> Self {
        match &val.to_be_bytes() {
            b"scnr" => Self::Input,
            b"mntr" => Self::Display,
            b"prtr" => Self::Output,
            b"link" => Self::DeviceLink,
            b"spac" => Self::ColorSpace,
            b"abst" => Self::Abstract,
            b"nmcl" => Self::NamedColor,
            _ => Self::Other(val),
        }
    }

    pub fn to_u32(&self) -> u32 {
        match self {
            Self::Input => u32::from_be_bytes(*b"scnr"),
            Self::Display => u32::from_be_bytes(*b"mntr"),
            Self::Output => u32::from_be_bytes(*b"prtr"),
            Self::DeviceLink => u32::from_be_bytes(*b"link"),
            Self::ColorSpace => u32::from_be_bytes(*b"spac"),
            Self::Abstract => u32::from_be_bytes(*b"abst"),
            Self::NamedColor => u32::from_be_bytes(*b"nmcl"),
            Self::Other(v) => *v,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// ICC Color Space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Xyz,
    Lab,
    Luv,
    YCbCr,
    Yxy,
    Rgb,
    Gray,
    Hsv,
    Hls,
    Cmyk,
    Cmy,
    /// N-color spaces, 2 to 15 channels
    Color(u8),
    /// Unrecognized or unset (0)
    Other(u32),
}

const COLOR_N_SIGS: [&[u8; 4]; 14] = [
    b"2CLR", b"3CLR", b"4CLR", b"5CLR", b"6CLR", b"7CLR", b"8CLR", b"9CLR", b"ACLR", b"BCLR",
    b"CCLR", b"DCLR", b"ECLR", b"FCLR",
];

impl ColorSpace {
    pub fn from_u32(val: u32) -> Self {
        match &val.to_be_bytes() {
            b"XYZ " => Self::Xyz,
            b"Lab " => Self::Lab,
            b"Luv " => Self::Luv,
            b"YCbr" => Self::YCbCr,
            b"Yxy " => Self::Yxy,
            b"RGB " => Self::Rgb,
            b"GRAY" => Self::Gray,
            b"HSV " => Self::Hsv,
            b"HLS " => Self::Hls,
            b"CMYK" => Self::Cmyk,
            b"CMY " => Self::Cmy,
            bytes => match COLOR_N_SIGS.iter().position(|s| *s == bytes) {
                Some(i) => Self::Color(i as u8 + 2),
                None => Self::Other(val),
            },
        }
    }

    pub fn to_u32(&self) -> u32 {
        match self {
            Self::Xyz => u32::from_be_bytes(*b"XYZ "),
            Self::Lab => u32::from_be_bytes(*b"Lab "),
            Self::Luv => u32::from_be_bytes(*b"Luv "),
            Self::YCbCr => u32::from_be_bytes(*b"YCbr"),
            Self::Yxy => u32::from_be_bytes(*b"Yxy "),
            Self::Rgb => u32::from_be_bytes(*b"RGB "),
            Self::Gray => u32::from_be_bytes(*b"GRAY"),
            Self::Hsv => u32::from_be_bytes(*b"HSV "),
            Self::Hls => u32::from_be_bytes(*b"HLS "),
            Self::Cmyk => u32::from_be_bytes(*b"CMYK"),
            Self::Cmy => u32::from_be_bytes(*b"CMY "),
            Self::Color(n) => match COLOR_N_SIGS.get((*n as usize).wrapping_sub(2)) {
                Some(sig) => u32::from_be_bytes(**sig),
                None => 0,
            },
            Self::Other(v) => *v,
        }
    }

    /// Number of channels, 0 when unknown
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Xyz
            | Self::Lab
            | Self::Luv
            | Self::YCbCr
            | Self::Yxy
            | Self::Rgb
            | Self::Hsv
            | Self::Hls
            | Self::Cmy => 3,
            Self::Cmyk => 4,
            Self::Color(n) => *n as usize,
            Self::Other(_) => 0,
        }
    }

    /// XYZ or Lab
    pub fn is_pcs(&self) -> bool {
        matches!(self, Self::Xyz | Self::Lab)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// ICC Rendering Intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderingIntent {
    #[default]
    Perceptual,
    RelativeColorimetric,
    Saturation,
    AbsoluteColorimetric,
    Other(u32),
}

impl RenderingIntent {
    pub fn from_u32(val: u32) -> Self {
        match val {
            0 => Self::Perceptual,
            1 => Self::RelativeColorimetric,
            2 => Self::Saturation,
            3 => Self::AbsoluteColorimetric,
            _ => Self::Other(val),
        }
    }

    pub fn to_u32(&self) -> u32 {
        match self {
            Self::Perceptual => 0,
            Self::RelativeColorimetric => 1,
            Self::Saturation => 2,
            Self::AbsoluteColorimetric => 3,
            Self::Other(v) => *v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::StdHeap;
    use crate::icc::buffer::{SnContext, SnOp};
    use crate::icc::compat::CompatOptions;
    use crate::icc::types::{TV_22, TV_43};

    fn write_header(h: &mut IccHeader) -> Vec<u8> {
        let heap = StdHeap::new();
        let mut ctx = SnContext::new(CompatOptions::strict(), TV_22, h.summary(), &heap);
        let mut out = vec![0u8; HEADER_SIZE];
        let mut b = SnBuffer::writer(&mut ctx, &mut out);
        h.serialize(&mut b).unwrap();
        out
    }

    fn read_header(data: &[u8], options: CompatOptions) -> Result<IccHeader> {
        let heap = StdHeap::new();
        let mut ctx = SnContext::new(options, TV_22, HeaderSummary::default(), &heap);
        let mut b = SnBuffer::reader(&mut ctx, data);
        let mut h = IccHeader::default();
        h.serialize(&mut b)?;
        Ok(h)
    }

    fn sample() -> IccHeader {
        IccHeader {
            size: 1024,
            device_class: ProfileClass::Display,
            color_space: ColorSpace::Rgb,
            pcs: ColorSpace::Xyz,
            platform: u32::from_be_bytes(*b"APPL"),
            rendering_intent: RenderingIntent::RelativeColorimetric,
            version: ProfileVersion::from_tv(TV_43).unwrap(),
            profile_id: [7; 16],
            ..IccHeader::default()
        }
    }

    #[test]
    fn test_header_layout() {
        let mut h = sample();
        let bytes = write_header(&mut h);
        assert_eq!(&bytes[0..4], &1024u32.to_be_bytes());
        assert_eq!(&bytes[8..12], &[4, 0x30, 0, 0]);
        assert_eq!(&bytes[12..16], b"mntr");
        assert_eq!(&bytes[36..40], b"acsp");
        assert_eq!(&bytes[64..68], &[0, 0, 0, 1]);
        assert_eq!(&bytes[84..100], &[7; 16]);
        assert!(bytes[100..].iter().all(|&b| b == 0));
        assert_eq!(read_header(&bytes, CompatOptions::strict()).unwrap(), h);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = write_header(&mut sample());
        bytes[36] = b'x';
        assert_eq!(read_header(&bytes, CompatOptions::lenient()).unwrap_err().code(), 0x601);
    }

    #[test]
    fn test_short_header() {
        let bytes = write_header(&mut sample());
        assert_eq!(
            read_header(&bytes[..100], CompatOptions::lenient()).unwrap_err().code(),
            0x603
        );
    }

    #[test]
    fn test_bad_major_version() {
        let mut bytes = write_header(&mut sample());
        bytes[8] = 9;
        assert_eq!(read_header(&bytes, CompatOptions::lenient()).unwrap_err().code(), 0x602);
    }

    #[test]
    fn test_unknown_class_is_warning() {
        let mut bytes = write_header(&mut sample());
        bytes[12..16].copy_from_slice(b"zzzz");
        assert_eq!(read_header(&bytes, CompatOptions::strict()).unwrap_err().code(), 0x210);
        let h = read_header(&bytes, CompatOptions::lenient()).unwrap();
        assert_eq!(h.device_class, ProfileClass::Other(u32::from_be_bytes(*b"zzzz")));
    }

    #[test]
    fn test_color_space_channels() {
        assert_eq!(ColorSpace::Gray.channels(), 1);
        assert_eq!(ColorSpace::Rgb.channels(), 3);
        assert_eq!(ColorSpace::Cmyk.channels(), 4);
        assert_eq!(ColorSpace::from_u32(u32::from_be_bytes(*b"FCLR")), ColorSpace::Color(15));
        assert_eq!(ColorSpace::Color(6).to_u32(), u32::from_be_bytes(*b"6CLR"));
    }

    #[test]
    fn test_version_numbers() {
        let v = ProfileVersion::from_tv(TV_22).unwrap();
        assert_eq!((v.major, v.minor, v.patch), (2, 2, 0));
        assert_eq!(v.to_tv(), TV_22);
        assert!(v.at_least(2, 1));
        assert!(!v.at_least(4, 0));
        assert_eq!(ProfileVersion::from_tv(21600).unwrap_err().code(), 0x604);
    }
}
