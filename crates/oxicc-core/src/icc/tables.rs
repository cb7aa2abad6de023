//! Version and compatibility governance tables
//!
//! Three tables drive validation:
//! - tag types, with the profile versions each type is legal in
//! - tag signatures, with their legal versions, lut class, and the types
//!   (and per-type versions) they may hold
//! - profile classes, with color space rules and required/optional tags
//!
//! See ICC.1:2022 Sections 8 and 9, and ICC.1:2001-04 for v2 only items.

use super::buffer::SnContext;
use super::header::{ColorSpace, ProfileClass};
use super::types::{
    TV_20, TV_23, TV_24, TV_2X_LAST, TV_40, TV_44, TV_MAX, TagSignature as Sig, Tv,
    TypeSignature as Ty, VersionRange, tv_to_string,
};
use super::compat::CompatFlags;
use crate::error::{Direction, FormatCode, Result, VersionCode};

/// Role of a tag in the color transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LutClass {
    /// Not a transform table
    #[default]
    None,
    /// Device to PCS
    Fwd,
    /// PCS to device
    Bwd,
    /// PCS to out-of-gamut flag
    Gamut,
    /// PCS to PCS preview
    Preview,
}

#[derive(Debug)]
pub struct TagTypeInfo {
    pub ttype: Ty,
    pub vrange: VersionRange,
    /// Private extension, accepted silently under [`CompatFlags::ALLOW_EXTENSIONS`]
    pub extension: bool,
}

#[derive(Debug)]
pub struct TagSigInfo {
    pub sig: Sig,
    pub vrange: VersionRange,
    pub lut_class: LutClass,
    /// Permitted types with the versions each is legal for this tag
    pub types: &'static [(Ty, VersionRange)],
    pub extension: bool,
}

/// Data/PCS color space rule of a class table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsMatch {
    Any,
    Xyz,
    Lab,
    /// XYZ or Lab
    Pcs,
    /// Device space with a channel count in the range
    Dev { min: usize, max: usize },
}

impl CsMatch {
    pub fn matches(self, cs: ColorSpace) -> bool {
        match self {
            Self::Any => cs.is_known(),
            Self::Xyz => cs == ColorSpace::Xyz,
            Self::Lab => cs == ColorSpace::Lab,
            Self::Pcs => cs.is_pcs(),
            Self::Dev { min, max } => {
                let n = cs.channels();
                cs.is_known() && (min..=max).contains(&n)
            }
        }
    }
}

#[derive(Debug)]
pub struct ClassRule {
    pub class: ProfileClass,
    pub color_space: CsMatch,
    pub pcs: CsMatch,
    pub vrange: VersionRange,
    /// Tags that must be present, for the versions given
    pub required: &'static [(Sig, VersionRange)],
    /// Transform tags that may appear in addition to the required ones
    pub optional: &'static [Sig],
}

const ALL: VersionRange = VersionRange::ALL;
const V2: VersionRange = VersionRange::new(TV_20, TV_2X_LAST);
const V23: VersionRange = VersionRange::new(TV_23, TV_MAX);
const V24: VersionRange = VersionRange::new(TV_24, TV_MAX);
const V4: VersionRange = VersionRange::new(TV_40, TV_MAX);
const V44: VersionRange = VersionRange::new(TV_44, TV_MAX);

const fn ty(ttype: Ty, vrange: VersionRange) -> TagTypeInfo {
    TagTypeInfo {
        ttype,
        vrange,
        extension: false,
    }
}

pub static TAG_TYPES: &[TagTypeInfo] = &[
    ty(Ty::CHROMATICITY, V23),
    ty(Ty::CICP, V44),
    ty(Ty::COLORANT_ORDER, V4),
    ty(Ty::COLORANT_TABLE, V4),
    ty(Ty::CRD_INFO, V2),
    ty(Ty::CURVE, ALL),
    ty(Ty::DATA, ALL),
    ty(Ty::DATE_TIME, ALL),
    ty(Ty::DEVICE_SETTINGS, V2),
    ty(Ty::LUT8, ALL),
    ty(Ty::LUT16, ALL),
    ty(Ty::MEASUREMENT, ALL),
    ty(Ty::MLUC, V4),
    ty(Ty::NAMED_COLOR2, ALL),
    ty(Ty::PARA, V4),
    ty(Ty::PROFILE_SEQUENCE_DESC, ALL),
    ty(Ty::S15F16_ARRAY, ALL),
    ty(Ty::SCREENING, V2),
    ty(Ty::SIGNATURE, ALL),
    ty(Ty::TEXT, ALL),
    ty(Ty::DESC, V2),
    ty(Ty::U16F16_ARRAY, ALL),
    ty(Ty::UCR_BG, V2),
    ty(Ty::UINT16_ARRAY, ALL),
    ty(Ty::UINT32_ARRAY, ALL),
    ty(Ty::UINT64_ARRAY, ALL),
    ty(Ty::UINT8_ARRAY, ALL),
    TagTypeInfo {
        ttype: Ty::VIDEO_CARD_GAMMA,
        vrange: ALL,
        extension: true,
    },
    ty(Ty::VIEWING_CONDITIONS, ALL),
    ty(Ty::XYZ, ALL),
];

const LUT_T: &[(Ty, VersionRange)] = &[(Ty::LUT8, ALL), (Ty::LUT16, ALL)];
const XYZ_T: &[(Ty, VersionRange)] = &[(Ty::XYZ, ALL)];
const TRC_T: &[(Ty, VersionRange)] = &[(Ty::CURVE, ALL), (Ty::PARA, V4)];
const DESC_T: &[(Ty, VersionRange)] = &[(Ty::DESC, V2), (Ty::MLUC, V4)];
const CPRT_T: &[(Ty, VersionRange)] = &[(Ty::TEXT, V2), (Ty::MLUC, V4)];
const TEXT_T: &[(Ty, VersionRange)] = &[(Ty::TEXT, ALL)];
const DATA_T: &[(Ty, VersionRange)] = &[(Ty::DATA, V2)];
const SIG_T: &[(Ty, VersionRange)] = &[(Ty::SIGNATURE, ALL)];

const fn tag(sig: Sig, vrange: VersionRange, types: &'static [(Ty, VersionRange)]) -> TagSigInfo {
    TagSigInfo {
        sig,
        vrange,
        lut_class: LutClass::None,
        types,
        extension: false,
    }
}

const fn lut(sig: Sig, lut_class: LutClass) -> TagSigInfo {
    TagSigInfo {
        sig,
        vrange: ALL,
        lut_class,
        types: LUT_T,
        extension: false,
    }
}

pub static TAG_SIGS: &[TagSigInfo] = &[
    lut(Sig::A2B0, LutClass::Fwd),
    lut(Sig::A2B1, LutClass::Fwd),
    lut(Sig::A2B2, LutClass::Fwd),
    lut(Sig::B2A0, LutClass::Bwd),
    lut(Sig::B2A1, LutClass::Bwd),
    lut(Sig::B2A2, LutClass::Bwd),
    lut(Sig::GAMUT, LutClass::Gamut),
    lut(Sig::PREVIEW0, LutClass::Preview),
    lut(Sig::PREVIEW1, LutClass::Preview),
    lut(Sig::PREVIEW2, LutClass::Preview),
    tag(Sig::RED_COLORANT, ALL, XYZ_T),
    tag(Sig::GREEN_COLORANT, ALL, XYZ_T),
    tag(Sig::BLUE_COLORANT, ALL, XYZ_T),
    tag(Sig::RED_TRC, ALL, TRC_T),
    tag(Sig::GREEN_TRC, ALL, TRC_T),
    tag(Sig::BLUE_TRC, ALL, TRC_T),
    tag(Sig::GRAY_TRC, ALL, TRC_T),
    tag(Sig::CALIBRATION_DATE_TIME, ALL, &[(Ty::DATE_TIME, ALL)]),
    tag(Sig::CHAR_TARGET, ALL, TEXT_T),
    tag(Sig::CHAD, V24, &[(Ty::S15F16_ARRAY, ALL)]),
    tag(Sig::CHROMATICITY, V23, &[(Ty::CHROMATICITY, V23)]),
    tag(Sig::CICP, V44, &[(Ty::CICP, V44)]),
    tag(Sig::COLORANT_ORDER, V4, &[(Ty::COLORANT_ORDER, V4)]),
    tag(Sig::COLORANT_TABLE, V4, &[(Ty::COLORANT_TABLE, V4)]),
    tag(Sig::COLORANT_TABLE_OUT, V4, &[(Ty::COLORANT_TABLE, V4)]),
    tag(Sig::COLORIMETRIC_INTENT_IMAGE_STATE, V4, SIG_T),
    tag(Sig::COPYRIGHT, ALL, CPRT_T),
    tag(Sig::CRD_INFO, V2, &[(Ty::CRD_INFO, V2)]),
    tag(Sig::DEVICE_MFG_DESC, ALL, DESC_T),
    tag(Sig::DEVICE_MODEL_DESC, ALL, DESC_T),
    tag(Sig::DEVICE_SETTINGS, V2, &[(Ty::DEVICE_SETTINGS, V2)]),
    tag(Sig::LUMINANCE, ALL, XYZ_T),
    tag(Sig::MEASUREMENT, ALL, &[(Ty::MEASUREMENT, ALL)]),
    tag(Sig::MEDIA_BLACK, ALL, XYZ_T),
    tag(Sig::MEDIA_WHITE, ALL, XYZ_T),
    tag(Sig::NAMED_COLOR2, ALL, &[(Ty::NAMED_COLOR2, ALL)]),
    tag(Sig::PROFILE_DESC, ALL, DESC_T),
    tag(Sig::PROFILE_SEQUENCE_DESC, ALL, &[(Ty::PROFILE_SEQUENCE_DESC, ALL)]),
    tag(Sig::PS2_CRD0, V2, DATA_T),
    tag(Sig::PS2_CRD1, V2, DATA_T),
    tag(Sig::PS2_CRD2, V2, DATA_T),
    tag(Sig::PS2_CRD3, V2, DATA_T),
    tag(Sig::PS2_CSA, V2, DATA_T),
    tag(Sig::PS2_RENDERING_INTENT, V2, DATA_T),
    tag(Sig::SCREENING_DESC, V2, &[(Ty::DESC, V2)]),
    tag(Sig::SCREENING, V2, &[(Ty::SCREENING, V2)]),
    tag(Sig::TECHNOLOGY, ALL, SIG_T),
    tag(Sig::UCR_BG, V2, &[(Ty::UCR_BG, V2)]),
    tag(Sig::VIEW_COND_DESC, ALL, DESC_T),
    tag(Sig::VIEW_COND, ALL, &[(Ty::VIEWING_CONDITIONS, ALL)]),
    TagSigInfo {
        sig: Sig::VIDEO_CARD_GAMMA,
        vrange: ALL,
        lut_class: LutClass::None,
        types: &[(Ty::VIDEO_CARD_GAMMA, ALL)],
        extension: true,
    },
    TagSigInfo {
        sig: Sig::ABS_TO_REL_TRANS,
        vrange: ALL,
        lut_class: LutClass::None,
        types: &[(Ty::S15F16_ARRAY, ALL)],
        extension: true,
    },
];

const DESC: (Sig, VersionRange) = (Sig::PROFILE_DESC, ALL);
const CPRT: (Sig, VersionRange) = (Sig::COPYRIGHT, ALL);
const WTPT: (Sig, VersionRange) = (Sig::MEDIA_WHITE, ALL);

const MONO_REQ: &[(Sig, VersionRange)] = &[DESC, (Sig::GRAY_TRC, ALL), WTPT, CPRT];
const MATRIX_REQ: &[(Sig, VersionRange)] = &[
    DESC,
    (Sig::RED_COLORANT, ALL),
    (Sig::GREEN_COLORANT, ALL),
    (Sig::BLUE_COLORANT, ALL),
    (Sig::RED_TRC, ALL),
    (Sig::GREEN_TRC, ALL),
    (Sig::BLUE_TRC, ALL),
    WTPT,
    CPRT,
];
const LUT_REQ: &[(Sig, VersionRange)] = &[DESC, (Sig::A2B0, ALL), WTPT, CPRT];
const OUTPUT_LUT_REQ: &[(Sig, VersionRange)] = &[
    DESC,
    (Sig::A2B0, ALL),
    (Sig::A2B1, ALL),
    (Sig::A2B2, ALL),
    (Sig::B2A0, ALL),
    (Sig::B2A1, ALL),
    (Sig::B2A2, ALL),
    (Sig::GAMUT, V2),
    WTPT,
    CPRT,
];

const DEVICE_OPT: &[Sig] = &[Sig::A2B0, Sig::A2B1, Sig::A2B2, Sig::B2A0, Sig::B2A1, Sig::B2A2];
const OUTPUT_OPT: &[Sig] = &[
    Sig::A2B0,
    Sig::A2B1,
    Sig::A2B2,
    Sig::B2A0,
    Sig::B2A1,
    Sig::B2A2,
    Sig::GAMUT,
    Sig::PREVIEW0,
    Sig::PREVIEW1,
    Sig::PREVIEW2,
];

const MONO: CsMatch = CsMatch::Dev { min: 1, max: 1 };
const TRI: CsMatch = CsMatch::Dev { min: 3, max: 3 };
const DEVN: CsMatch = CsMatch::Dev { min: 1, max: 15 };

const fn rule(
    class: ProfileClass,
    color_space: CsMatch,
    pcs: CsMatch,
    required: &'static [(Sig, VersionRange)],
    optional: &'static [Sig],
) -> ClassRule {
    ClassRule {
        class,
        color_space,
        pcs,
        vrange: ALL,
        required,
        optional,
    }
}

pub static CLASS_RULES: &[ClassRule] = &[
    rule(ProfileClass::Input, MONO, CsMatch::Pcs, MONO_REQ, DEVICE_OPT),
    rule(ProfileClass::Input, TRI, CsMatch::Xyz, MATRIX_REQ, DEVICE_OPT),
    rule(ProfileClass::Input, DEVN, CsMatch::Pcs, LUT_REQ, DEVICE_OPT),
    rule(ProfileClass::Display, MONO, CsMatch::Pcs, MONO_REQ, DEVICE_OPT),
    rule(ProfileClass::Display, TRI, CsMatch::Xyz, MATRIX_REQ, DEVICE_OPT),
    rule(ProfileClass::Display, DEVN, CsMatch::Pcs, LUT_REQ, DEVICE_OPT),
    rule(ProfileClass::Output, MONO, CsMatch::Pcs, MONO_REQ, OUTPUT_OPT),
    rule(ProfileClass::Output, DEVN, CsMatch::Pcs, OUTPUT_LUT_REQ, OUTPUT_OPT),
    rule(
        ProfileClass::DeviceLink,
        CsMatch::Any,
        CsMatch::Any,
        &[DESC, (Sig::A2B0, ALL), (Sig::PROFILE_SEQUENCE_DESC, ALL), CPRT],
        &[],
    ),
    rule(ProfileClass::Abstract, CsMatch::Pcs, CsMatch::Pcs, LUT_REQ, &[]),
    rule(
        ProfileClass::ColorSpace,
        CsMatch::Any,
        CsMatch::Pcs,
        &[DESC, (Sig::B2A0, ALL), (Sig::A2B0, ALL), WTPT, CPRT],
        &[Sig::A2B1, Sig::A2B2, Sig::B2A1, Sig::B2A2],
    ),
    rule(
        ProfileClass::NamedColor,
        CsMatch::Any,
        CsMatch::Pcs,
        &[DESC, (Sig::NAMED_COLOR2, ALL), WTPT, CPRT],
        &[],
    ),
];

pub fn tag_type_info(ttype: Ty) -> Option<&'static TagTypeInfo> {
    TAG_TYPES.iter().find(|t| t.ttype == ttype)
}

pub fn tag_sig_info(sig: Sig) -> Option<&'static TagSigInfo> {
    TAG_SIGS.iter().find(|t| t.sig == sig)
}

/// Lut class of a tag signature, [`LutClass::None`] for non-transform tags
pub fn lut_class(sig: Sig) -> LutClass {
    tag_sig_info(sig).map_or(LutClass::None, |i| i.lut_class)
}

/// Class table entries applicable to a class, color spaces and version
pub fn matching_rules(
    class: ProfileClass,
    color_space: ColorSpace,
    pcs: ColorSpace,
    version: Tv,
) -> impl Iterator<Item = &'static ClassRule> {
    CLASS_RULES.iter().filter(move |r| {
        r.class == class
            && r.color_space.matches(color_space)
            && r.pcs.matches(pcs)
            && r.vrange.contains(version)
    })
}

/// Whether an unrecognized or private item is let through silently
fn tolerated(ctx: &SnContext<'_>, extension: bool) -> bool {
    ctx.options.has(CompatFlags::ALLOW_UNKNOWN)
        || (extension && ctx.options.has(CompatFlags::ALLOW_EXTENSIONS))
}

/// Check that `sig` may hold `ttype` in `version`.
///
/// Unknown signatures and types are format deviations unless
/// [`CompatFlags::ALLOW_UNKNOWN`] is set; items outside their legal version
/// range are version deviations.
pub fn check_sig_type(
    ctx: &mut SnContext<'_>,
    dir: Direction,
    sig: Sig,
    ttype: Ty,
    version: Tv,
) -> Result<()> {
    let sig_info = tag_sig_info(sig);
    match sig_info {
        Some(info) if info.extension && !tolerated(ctx, true) => {
            ctx.format_warning(dir, FormatCode::SIG2TYPE, format!("private tag '{sig}'"))?;
        }
        None if !tolerated(ctx, false) => {
            ctx.format_warning(dir, FormatCode::SIG2TYPE, format!("unknown tag '{sig}'"))?;
        }
        Some(info) if !info.vrange.contains(version) => {
            ctx.version_warning(
                dir,
                VersionCode::SIGVERS,
                info.vrange,
                format!("tag '{sig}' is not valid in version {}", tv_to_string(version)),
            )?;
        }
        _ => {}
    }

    let type_info = tag_type_info(ttype);
    match type_info {
        Some(info) if info.extension && !tolerated(ctx, true) => {
            ctx.format_warning(dir, FormatCode::SIG2TYPE, format!("private type '{ttype}'"))?;
        }
        None if !tolerated(ctx, false) => {
            ctx.format_warning(dir, FormatCode::SIG2TYPE, format!("unknown type '{ttype}'"))?;
        }
        Some(info) if !info.vrange.contains(version) => {
            ctx.version_warning(
                dir,
                VersionCode::TYPEVERS,
                info.vrange,
                format!("type '{ttype}' is not valid in version {}", tv_to_string(version)),
            )?;
        }
        _ => {}
    }

    if let (Some(sig_info), Some(_)) = (sig_info, type_info) {
        match sig_info.types.iter().find(|(t, _)| *t == ttype) {
            None => {
                ctx.format_warning(
                    dir,
                    FormatCode::SIG2TYPE,
                    format!("tag '{sig}' cannot hold type '{ttype}'"),
                )?;
            }
            Some((_, vrange)) if !vrange.contains(version) => {
                ctx.version_warning(
                    dir,
                    VersionCode::SIG2TYPEVERS,
                    *vrange,
                    format!(
                        "tag '{sig}' cannot hold type '{ttype}' in version {}",
                        tv_to_string(version)
                    ),
                )?;
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Check the tags present against the class requirements.
///
/// Passes when at least one applicable class entry has all its required
/// tags; transform tags outside that entry raise `UNEXPECTED_TAG`.
pub fn check_class_tags(
    ctx: &mut SnContext<'_>,
    dir: Direction,
    present: &[Sig],
    version: Tv,
) -> Result<()> {
    let header = ctx.header;
    if !header.class.is_known() {
        return ctx.format_warning(
            dir,
            FormatCode::UNKNOWN_CLASS,
            format!("unknown profile class 0x{:08x}", header.class.to_u32()),
        );
    }
    let mut best: Option<(&ClassRule, Vec<Sig>)> = None;
    for rule in matching_rules(header.class, header.color_space, header.pcs, version) {
        let missing: Vec<Sig> = rule
            .required
            .iter()
            .filter(|(s, r)| r.contains(version) && !present.contains(s))
            .map(|(s, _)| *s)
            .collect();
        if best.as_ref().is_none_or(|(_, m)| missing.len() < m.len()) {
            best = Some((rule, missing));
        }
    }
    let Some((rule, missing)) = best else {
        return ctx.format_warning(
            dir,
            FormatCode::REQUIRED_TAG,
            format!(
                "no tag requirements for class {:?} with {:?} -> {:?}",
                header.class, header.color_space, header.pcs
            ),
        );
    };
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
        ctx.format_warning(
            dir,
            FormatCode::REQUIRED_TAG,
            format!("{:?} profile is missing required tags {}", header.class, names.join(", ")),
        )?;
    }
    for sig in present {
        if lut_class(*sig) == LutClass::None {
            continue;
        }
        let expected =
            rule.required.iter().any(|(s, _)| s == sig) || rule.optional.contains(sig);
        if !expected {
            ctx.format_warning(
                dir,
                FormatCode::UNEXPECTED_TAG,
                format!("tag '{sig}' is not expected in a {:?} profile", header.class),
            )?;
        }
    }
    Ok(())
}
