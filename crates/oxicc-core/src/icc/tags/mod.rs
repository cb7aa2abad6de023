//! ICC Tag Types
//!
//! Every tag starts with an 8-byte type header:
//! - A 4-byte type signature identifying the data format
//! - 4 reserved bytes
//!
//! followed by type-specific data. Each payload type implements
//! [`TagBody`], describing its layout once for all serialization modes.
//!
//! See ICC.1:2022 Section 10, and ICC.1:2001-04 for the v2 only types.

mod arrays;
mod color;
mod curves;
mod devs;
mod lut;
mod misc;
mod pseq;
mod text;
mod unknown;
mod vcgt;

pub use arrays::{
    S15Fixed16Array, U16Fixed16Array, UInt8Array, UInt16Array, UInt32Array, UInt64Array, XyzArray,
};
pub use color::{Chromaticity, Colorant, ColorantOrder, ColorantTable, NamedColor, NamedColor2};
pub use curves::{Curve, CurveStyle, ParametricCurve};
pub use devs::{DeviceSettings, PlatformEntry, SettingCombination, SettingStruct, SettingValues};
pub use lut::{LutPrecision, LutTag};
pub use misc::{Cicp, DateTimeTag, Measurement, Screening, ScreenEntry, SignatureTag, UcrBg, ViewingConditions};
pub use pseq::{DescStruct, DescText, ProfileSequenceDesc};
pub use text::{CrdInfo, Data, Mluc, MlucRecord, Text, TextDescription};
pub use unknown::UnknownTag;
pub use vcgt::{VcgtKind, VideoCardGamma};

use std::io;

use super::buffer::{SnBuffer, SnContext};
use super::tag::TagBody;
use super::types::{TagSignature, TypeSignature};
use crate::error::{Direction, FormatCode, Result};

macro_rules! tag_data {
    ($($(#[$doc:meta])* $variant:ident($body:ty), $as_ref:ident, $as_mut:ident;)*) => {
        /// Tag payload, one variant per supported type
        #[derive(Debug, Clone, PartialEq)]
        pub enum TagData {
            $($(#[$doc])* $variant($body),)*
        }

        impl TagData {
            fn body(&self) -> &dyn TagBody {
                match self {
                    $(Self::$variant(t) => t,)*
                }
            }

            fn body_mut(&mut self) -> &mut dyn TagBody {
                match self {
                    $(Self::$variant(t) => t,)*
                }
            }

            $(
                pub fn $as_ref(&self) -> Option<&$body> {
                    match self {
                        Self::$variant(t) => Some(t),
                        _ => None,
                    }
                }

                pub fn $as_mut(&mut self) -> Option<&mut $body> {
                    match self {
                        Self::$variant(t) => Some(t),
                        _ => None,
                    }
                }
            )*
        }
    };
}

tag_data! {
    /// Type not understood by this library, kept as opaque bytes
    Unknown(UnknownTag), as_unknown, as_unknown_mut;
    UInt8Array(UInt8Array), as_uint8_array, as_uint8_array_mut;
    UInt16Array(UInt16Array), as_uint16_array, as_uint16_array_mut;
    UInt32Array(UInt32Array), as_uint32_array, as_uint32_array_mut;
    UInt64Array(UInt64Array), as_uint64_array, as_uint64_array_mut;
    U16Fixed16Array(U16Fixed16Array), as_u16f16_array, as_u16f16_array_mut;
    S15Fixed16Array(S15Fixed16Array), as_s15f16_array, as_s15f16_array_mut;
    Xyz(XyzArray), as_xyz, as_xyz_mut;
    Chromaticity(Chromaticity), as_chromaticity, as_chromaticity_mut;
    ColorantOrder(ColorantOrder), as_colorant_order, as_colorant_order_mut;
    ColorantTable(ColorantTable), as_colorant_table, as_colorant_table_mut;
    Curve(Curve), as_curve, as_curve_mut;
    ParametricCurve(ParametricCurve), as_parametric_curve, as_parametric_curve_mut;
    Data(Data), as_data, as_data_mut;
    Text(Text), as_text, as_text_mut;
    DateTime(DateTimeTag), as_date_time, as_date_time_mut;
    /// `mft1` or `mft2`, by precision
    Lut(LutTag), as_lut, as_lut_mut;
    Measurement(Measurement), as_measurement, as_measurement_mut;
    NamedColor2(NamedColor2), as_named_color2, as_named_color2_mut;
    TextDescription(TextDescription), as_text_description, as_text_description_mut;
    Mluc(Mluc), as_mluc, as_mluc_mut;
    ProfileSequenceDesc(ProfileSequenceDesc), as_profile_sequence_desc, as_profile_sequence_desc_mut;
    Signature(SignatureTag), as_signature, as_signature_mut;
    Screening(Screening), as_screening, as_screening_mut;
    UcrBg(UcrBg), as_ucr_bg, as_ucr_bg_mut;
    ViewingConditions(ViewingConditions), as_viewing_conditions, as_viewing_conditions_mut;
    CrdInfo(CrdInfo), as_crd_info, as_crd_info_mut;
    VideoCardGamma(VideoCardGamma), as_video_card_gamma, as_video_card_gamma_mut;
    DeviceSettings(DeviceSettings), as_device_settings, as_device_settings_mut;
    Cicp(Cicp), as_cicp, as_cicp_mut;
}

impl TagData {
    /// Empty payload for a type signature; unsupported types give [`TagData::Unknown`]
    pub fn new(ttype: TypeSignature) -> Self {
        match ttype {
            TypeSignature::UINT8_ARRAY => Self::UInt8Array(UInt8Array::default()),
            TypeSignature::UINT16_ARRAY => Self::UInt16Array(UInt16Array::default()),
            TypeSignature::UINT32_ARRAY => Self::UInt32Array(UInt32Array::default()),
            TypeSignature::UINT64_ARRAY => Self::UInt64Array(UInt64Array::default()),
            TypeSignature::U16F16_ARRAY => Self::U16Fixed16Array(U16Fixed16Array::default()),
            TypeSignature::S15F16_ARRAY => Self::S15Fixed16Array(S15Fixed16Array::default()),
            TypeSignature::XYZ => Self::Xyz(XyzArray::default()),
            TypeSignature::CHROMATICITY => Self::Chromaticity(Chromaticity::default()),
            TypeSignature::COLORANT_ORDER => Self::ColorantOrder(ColorantOrder::default()),
            TypeSignature::COLORANT_TABLE => Self::ColorantTable(ColorantTable::default()),
            TypeSignature::CURVE => Self::Curve(Curve::default()),
            TypeSignature::PARA => Self::ParametricCurve(ParametricCurve::default()),
            TypeSignature::DATA => Self::Data(Data::default()),
            TypeSignature::TEXT => Self::Text(Text::default()),
            TypeSignature::DATE_TIME => Self::DateTime(DateTimeTag::default()),
            TypeSignature::LUT8 => Self::Lut(LutTag::new(LutPrecision::Lut8)),
            TypeSignature::LUT16 => Self::Lut(LutTag::new(LutPrecision::Lut16)),
            TypeSignature::MEASUREMENT => Self::Measurement(Measurement::default()),
            TypeSignature::NAMED_COLOR2 => Self::NamedColor2(NamedColor2::default()),
            TypeSignature::DESC => Self::TextDescription(TextDescription::default()),
            TypeSignature::MLUC => Self::Mluc(Mluc::default()),
            TypeSignature::PROFILE_SEQUENCE_DESC => {
                Self::ProfileSequenceDesc(ProfileSequenceDesc::default())
            }
            TypeSignature::SIGNATURE => Self::Signature(SignatureTag::default()),
            TypeSignature::SCREENING => Self::Screening(Screening::default()),
            TypeSignature::UCR_BG => Self::UcrBg(UcrBg::default()),
            TypeSignature::VIEWING_CONDITIONS => Self::ViewingConditions(ViewingConditions::default()),
            TypeSignature::CRD_INFO => Self::CrdInfo(CrdInfo::default()),
            TypeSignature::VIDEO_CARD_GAMMA => Self::VideoCardGamma(VideoCardGamma::default()),
            TypeSignature::DEVICE_SETTINGS => Self::DeviceSettings(DeviceSettings::default()),
            TypeSignature::CICP => Self::Cicp(Cicp::default()),
            other => Self::Unknown(UnknownTag::new(other)),
        }
    }

    /// Whether `ttype` has a dedicated payload
    pub fn is_supported(ttype: TypeSignature) -> bool {
        !matches!(Self::new(ttype), Self::Unknown(_))
    }

    /// Type of the payload; [`TypeSignature::UNKNOWN`] for opaque tags
    pub fn type_sig(&self) -> TypeSignature {
        self.body().type_sig()
    }

    /// Type signature written in the type header
    pub fn stored_type(&self) -> TypeSignature {
        match self {
            Self::Unknown(u) => u.uttype,
            _ => self.type_sig(),
        }
    }

    /// Serialize the type header and the payload
    pub fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        let mut ttype = self.stored_type().0;
        b.u32(&mut ttype)?;
        b.pad(4)?;
        if b.op().is_read() {
            let found = TypeSignature(ttype);
            let expected = self.type_sig();
            match self {
                Self::Unknown(u) => u.uttype = found,
                Self::Lut(l) if found == TypeSignature::LUT8 => l.precision = LutPrecision::Lut8,
                Self::Lut(l) if found == TypeSignature::LUT16 => l.precision = LutPrecision::Lut16,
                _ if found != expected => {
                    b.warn(
                        FormatCode::SIG2TYPE,
                        format!("expected type '{expected}', found '{found}'"),
                    )?;
                }
                _ => {}
            }
        }
        self.body_mut().serialize(b)
    }

    pub fn check(&self, ctx: &mut SnContext<'_>, sig: TagSignature, dir: Direction) -> Result<()> {
        self.body().check(ctx, sig, dir)
    }

    pub fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        writeln!(out, "  Type: '{}'", self.stored_type())?;
        self.body().dump(out, verbose)
    }
}

/// Number of values a dump prints at the given verbosity
pub(crate) fn dump_limit(verbose: u32) -> usize {
    match verbose {
        0 => 0,
        1 => 16,
        _ => usize::MAX,
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::alloc::StdHeap;
    use crate::icc::buffer::{SnBuffer, SnContext, SnOp};
    use crate::icc::compat::CompatOptions;
    use crate::icc::header::HeaderSummary;
    use crate::icc::types::TV_DEFAULT;
    use crate::error::Result;

    use super::TagData;

    pub fn ctx(heap: &StdHeap, options: CompatOptions) -> SnContext<'_> {
        SnContext::new(options, TV_DEFAULT, HeaderSummary::default(), heap)
    }

    /// Size, write and read `data` back, checking the size matches
    pub fn write_read(data: &mut TagData, options: CompatOptions) -> Result<(Vec<u8>, TagData)> {
        let heap = StdHeap::new();
        let mut c = ctx(&heap, options);
        let size = {
            let mut b = SnBuffer::dummy(&mut c, SnOp::SIZE);
            data.serialize(&mut b)?;
            b.finish()?
        };
        let mut bytes = vec![0u8; size];
        {
            let mut b = SnBuffer::writer(&mut c, &mut bytes);
            data.serialize(&mut b)?;
            assert_eq!(b.finish()?, size);
        }
        let back = read(&bytes, options)?;
        Ok((bytes, back))
    }

    pub fn read(bytes: &[u8], options: CompatOptions) -> Result<TagData> {
        let heap = StdHeap::new();
        let mut c = ctx(&heap, options);
        let ttype = crate::icc::types::TypeSignature(u32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]));
        let mut data = TagData::new(ttype);
        let mut b = SnBuffer::reader(&mut c, bytes);
        data.serialize(&mut b)?;
        b.finish()?;
        Ok(data)
    }

    /// Run the resize pass so storage matches the counts
    pub fn allocate(data: &mut TagData) {
        let heap = StdHeap::new();
        let mut c = ctx(&heap, CompatOptions::strict());
        let mut b = SnBuffer::dummy(&mut c, SnOp::RESIZE);
        data.serialize(&mut b).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::icc::compat::CompatOptions;

    #[test]
    fn test_new_covers_every_supported_type() {
        for ttype in [
            TypeSignature::XYZ,
            TypeSignature::CURVE,
            TypeSignature::LUT8,
            TypeSignature::LUT16,
            TypeSignature::MLUC,
            TypeSignature::DEVICE_SETTINGS,
            TypeSignature::CICP,
        ] {
            assert_eq!(TagData::new(ttype).stored_type(), ttype);
        }
        let odd = TypeSignature::from_bytes(*b"zzzz");
        assert!(!TagData::is_supported(odd));
        assert_eq!(TagData::new(odd).type_sig(), TypeSignature::UNKNOWN);
        assert_eq!(TagData::new(odd).stored_type(), odd);
    }

    #[test]
    fn test_type_mismatch_is_sig2type() {
        let bytes = b"text\0\0\0\0hi\0".to_vec();
        let heap = crate::alloc::StdHeap::new();
        let mut c = ctx(&heap, CompatOptions::strict());
        let mut data = TagData::new(TypeSignature::DATA);
        let mut b = SnBuffer::reader(&mut c, &bytes);
        let err = data.serialize(&mut b).unwrap_err();
        assert_eq!(err.code(), 0x200 | 0x03);
    }
}
