//! Deterministic profiles and stream helpers

use anyhow::{Context, Result, anyhow};
use oxicc_core::icc::tags::{CurveStyle, MlucRecord, TextDescription};
use oxicc_core::icc::types::{TV_40, Tv};
use oxicc_core::icc::{
    ColorSpace, CompatOptions, Profile, ProfileClass, TagRef, TagSignature, TypeSignature, XyzNumber,
};
use oxicc_core::stream::MemStream;

/// sRGB primaries adapted to D50
pub const SRGB_COLORANTS: [XyzNumber; 3] = [
    XyzNumber::new(0.4360747, 0.2225045, 0.0139322),
    XyzNumber::new(0.3850649, 0.7168786, 0.0971045),
    XyzNumber::new(0.1430804, 0.0606169, 0.7141733),
];

pub fn new_profile(class: ProfileClass, cs: ColorSpace, pcs: ColorSpace, version: Tv) -> Result<Profile> {
    let mut p = Profile::new();
    p.header.device_class = class;
    p.header.color_space = cs;
    p.header.pcs = pcs;
    p.set_version(version)?;
    Ok(p)
}

/// Write the whole profile into a fresh buffer
pub fn write_vec(p: &mut Profile) -> Result<Vec<u8>> {
    let mut out = MemStream::new();
    p.write(&mut out, 0)?;
    Ok(out.into_inner())
}

/// Write the profile after `offset` bytes of `fill`
pub fn write_embedded(p: &mut Profile, offset: usize, fill: u8) -> Result<Vec<u8>> {
    let mut out = MemStream::from_vec(vec![fill; offset]);
    p.write(&mut out, offset as u64)?;
    Ok(out.into_inner())
}

pub fn read_at(bytes: Vec<u8>, offset: u64, options: CompatOptions) -> Result<Profile> {
    let mut p = Profile::new().with_options(options);
    p.read(MemStream::from_vec(bytes).shared(), offset)
        .with_context(|| format!("reading profile at offset {offset}"))?;
    Ok(p)
}

pub fn read_vec(bytes: Vec<u8>, options: CompatOptions) -> Result<Profile> {
    read_at(bytes, 0, options)
}

pub fn set_xyz(p: &mut Profile, sig: TagSignature, v: XyzNumber) -> Result<TagRef> {
    let tag = p.add_tag(sig, TypeSignature::XYZ)?;
    {
        let mut t = tag.borrow_mut();
        t.data_mut().as_xyz_mut().ok_or_else(|| anyhow!("not XYZ"))?.count = 1;
        t.allocate()?;
        t.data_mut().as_xyz_mut().ok_or_else(|| anyhow!("not XYZ"))?.data[0] = v;
    }
    Ok(tag)
}

/// Description-style text: `desc` before v4, `mluc` from v4 on
pub fn set_description(p: &mut Profile, sig: TagSignature, text: &str) -> Result<TagRef> {
    if p.version() >= TV_40 {
        return set_mluc(p, sig, text);
    }
    let tag = p.add_tag(sig, TypeSignature::DESC)?;
    *tag.borrow_mut()
        .data_mut()
        .as_text_description_mut()
        .ok_or_else(|| anyhow!("not desc"))? = TextDescription::ascii(text);
    Ok(tag)
}

/// Copyright-style text: `text` before v4, `mluc` from v4 on
pub fn set_copyright(p: &mut Profile, text: &str) -> Result<TagRef> {
    if p.version() >= TV_40 {
        return set_mluc(p, TagSignature::COPYRIGHT, text);
    }
    let tag = p.add_tag(TagSignature::COPYRIGHT, TypeSignature::TEXT)?;
    tag.borrow_mut()
        .data_mut()
        .as_text_mut()
        .ok_or_else(|| anyhow!("not text"))?
        .text = text.to_string();
    Ok(tag)
}

pub fn set_mluc(p: &mut Profile, sig: TagSignature, text: &str) -> Result<TagRef> {
    let tag = p.add_tag(sig, TypeSignature::MLUC)?;
    {
        let mut t = tag.borrow_mut();
        t.data_mut().as_mluc_mut().ok_or_else(|| anyhow!("not mluc"))?.count = 1;
        t.allocate()?;
        t.data_mut().as_mluc_mut().ok_or_else(|| anyhow!("not mluc"))?.records[0] =
            MlucRecord::new(*b"en", *b"US", text);
    }
    Ok(tag)
}

/// `curv` tag with a single gamma exponent
pub fn set_gamma(p: &mut Profile, sig: TagSignature, gamma: f64) -> Result<TagRef> {
    let tag = p.add_tag(sig, TypeSignature::CURVE)?;
    {
        let mut t = tag.borrow_mut();
        let c = t.data_mut().as_curve_mut().ok_or_else(|| anyhow!("not curv"))?;
        c.style = CurveStyle::Gamma;
        c.count = 1;
        t.allocate()?;
        t.data_mut().as_curve_mut().ok_or_else(|| anyhow!("not curv"))?.data[0] = gamma;
    }
    Ok(tag)
}

/// `curv` tag holding `table`
pub fn set_table(p: &mut Profile, sig: TagSignature, table: &[f64]) -> Result<TagRef> {
    let tag = p.add_tag(sig, TypeSignature::CURVE)?;
    {
        let mut t = tag.borrow_mut();
        let c = t.data_mut().as_curve_mut().ok_or_else(|| anyhow!("not curv"))?;
        c.style = CurveStyle::Table;
        c.count = table.len();
        t.allocate()?;
        t.data_mut()
            .as_curve_mut()
            .ok_or_else(|| anyhow!("not curv"))?
            .data
            .copy_from_slice(table);
    }
    Ok(tag)
}

/// Complete RGB matrix/TRC display profile; green and blue TRCs link to red
pub fn display_rgb(version: Tv) -> Result<Profile> {
    let mut p = new_profile(ProfileClass::Display, ColorSpace::Rgb, ColorSpace::Xyz, version)?;
    set_description(&mut p, TagSignature::PROFILE_DESC, "Test RGB display")?;
    set_copyright(&mut p, "No copyright, use freely")?;
    set_xyz(&mut p, TagSignature::MEDIA_WHITE, oxicc_core::icc::D50)?;
    let sigs = [
        TagSignature::RED_COLORANT,
        TagSignature::GREEN_COLORANT,
        TagSignature::BLUE_COLORANT,
    ];
    for (sig, v) in sigs.into_iter().zip(SRGB_COLORANTS) {
        set_xyz(&mut p, sig, v)?;
    }
    set_gamma(&mut p, TagSignature::RED_TRC, 2.2)?;
    p.link_tag(TagSignature::GREEN_TRC, TagSignature::RED_TRC)?;
    p.link_tag(TagSignature::BLUE_TRC, TagSignature::RED_TRC)?;
    Ok(p)
}

/// Complete gray display profile
pub fn gray_display(version: Tv) -> Result<Profile> {
    let mut p = new_profile(ProfileClass::Display, ColorSpace::Gray, ColorSpace::Xyz, version)?;
    set_description(&mut p, TagSignature::PROFILE_DESC, "Test gray display")?;
    set_copyright(&mut p, "No copyright, use freely")?;
    set_xyz(&mut p, TagSignature::MEDIA_WHITE, oxicc_core::icc::D50)?;
    set_gamma(&mut p, TagSignature::GRAY_TRC, 1.8)?;
    Ok(p)
}

/// Big-endian u32 at `pos`
pub fn be32(bytes: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
}

pub fn put_be32(bytes: &mut [u8], pos: usize, v: u32) {
    bytes[pos..pos + 4].copy_from_slice(&v.to_be_bytes());
}

/// Directory entries (signature, offset, size) of serialized profile bytes
pub fn directory(bytes: &[u8]) -> Vec<(u32, u32, u32)> {
    let count = be32(bytes, 128) as usize;
    (0..count)
        .map(|i| {
            let at = 132 + 12 * i;
            (be32(bytes, at), be32(bytes, at + 4), be32(bytes, at + 8))
        })
        .collect()
}
