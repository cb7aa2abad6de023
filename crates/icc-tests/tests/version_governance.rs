//! Version legality of tags and types, and the compatibility flags that
//! relax it

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use icc_tests::builders::{set_xyz, write_vec};
use icc_tests::{display_rgb, read_vec};
use oxicc_core::icc::tags::ColorantOrder;
use oxicc_core::icc::types::{TV_22, TV_24, TV_40, TV_43, VersionRange};
use oxicc_core::icc::{
    CompatFlags, CompatOptions, D50, Profile, TagSignature, TypeSignature, Warning, WarningKind,
};
use oxicc_core::stream::MemStream;

fn strict_code(version: u32, sig: TagSignature, ttype: TypeSignature) -> Result<u32> {
    let mut p = display_rgb(version)?;
    Ok(p.add_tag(sig, ttype).map_or_else(|e| e.code(), |_| 0))
}

#[test]
fn v4_tag_in_v2_profile() -> Result<()> {
    assert_eq!(
        strict_code(TV_24, TagSignature::COLORANT_ORDER, TypeSignature::COLORANT_ORDER)?,
        0x501
    );
    assert_eq!(
        strict_code(TV_43, TagSignature::COLORANT_ORDER, TypeSignature::COLORANT_ORDER)?,
        0
    );
    Ok(())
}

#[test]
fn v2_tag_in_v4_profile() -> Result<()> {
    assert_eq!(strict_code(TV_43, TagSignature::CRD_INFO, TypeSignature::CRD_INFO)?, 0x501);
    assert_eq!(strict_code(TV_43, TagSignature::PS2_CSA, TypeSignature::DATA)?, 0x501);
    assert_eq!(strict_code(TV_24, TagSignature::CRD_INFO, TypeSignature::CRD_INFO)?, 0);
    Ok(())
}

#[test]
fn v4_type_under_a_timeless_tag() -> Result<()> {
    let mut p = display_rgb(TV_24)?;
    p.delete_tag(TagSignature::BLUE_TRC)?;
    assert_eq!(p.add_tag(TagSignature::BLUE_TRC, TypeSignature::PARA).unwrap_err().code(), 0x502);
    Ok(())
}

#[test]
fn tag_type_pairing_by_version() -> Result<()> {
    // 'text' is a valid type in v4, but not for the copyright tag
    let mut p = display_rgb(TV_43)?;
    p.delete_tag(TagSignature::COPYRIGHT)?;
    assert_eq!(p.add_tag(TagSignature::COPYRIGHT, TypeSignature::TEXT).unwrap_err().code(), 0x503);
    Ok(())
}

#[test]
fn chromaticity_starts_at_2_3() -> Result<()> {
    assert_eq!(
        strict_code(TV_22, TagSignature::CHROMATICITY, TypeSignature::CHROMATICITY)?,
        0x501
    );
    assert_eq!(strict_code(TV_24, TagSignature::CHROMATICITY, TypeSignature::CHROMATICITY)?, 0);
    Ok(())
}

#[test]
fn write_version_warnings_are_collected() -> Result<()> {
    let mut p = display_rgb(TV_24)?;
    p.set_cflags(CompatFlags::WR_VERSION_WARN);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    p.set_warning_handler(Some(Box::new(move |w: &Warning| sink.borrow_mut().push(w.code))));

    p.add_tag(TagSignature::COLORANT_ORDER, TypeSignature::COLORANT_ORDER)?;
    assert!(p.diagnostics().write_warning());
    assert_eq!(p.diagnostics().status(), CompatFlags::WR_WARNING);
    assert_eq!(p.diagnostics().warnings[0].kind, WarningKind::Version);
    // Tag, type and pairing are all out of range
    assert_eq!(*seen.borrow(), vec![0x501, 0x502, 0x503]);
    Ok(())
}

#[test]
fn allowed_version_range_is_silent() -> Result<()> {
    let mut p = display_rgb(TV_24)?;
    p.set_cflags(CompatFlags::ALLOW_WR_VERSION);
    p.set_vcrange(VersionRange::new(TV_40, TV_43));
    p.add_tag(TagSignature::COLORANT_ORDER, TypeSignature::COLORANT_ORDER)?;
    assert!(p.diagnostics().is_empty());

    // The range has to reach the item's legal versions
    p.set_vcrange(VersionRange::new(TV_22, TV_24));
    assert_eq!(
        p.add_tag(TagSignature::COLORANT_TABLE, TypeSignature::COLORANT_TABLE)
            .unwrap_err()
            .code(),
        0x501
    );
    Ok(())
}

/// v2 profile carrying a v4-only colorant order tag
fn mixed_version_bytes() -> Result<Vec<u8>> {
    let mut p = display_rgb(TV_24)?;
    p.set_cflags(CompatFlags::WR_VERSION_WARN);
    let tag = p.add_tag(TagSignature::COLORANT_ORDER, TypeSignature::COLORANT_ORDER)?;
    {
        let mut t = tag.borrow_mut();
        if let Some(c) = t.data_mut().as_colorant_order_mut() {
            c.count = 3;
        }
        t.allocate()?;
        if let Some(c) = t.data_mut().as_colorant_order_mut() {
            c.data.copy_from_slice(&[2, 1, 0]);
        }
    }
    let mut out = MemStream::new();
    let diags = p.write(&mut out, 0)?;
    assert!(diags.write_warning());
    Ok(out.into_inner())
}

#[test]
fn reading_out_of_version_tags() -> Result<()> {
    let bytes = mixed_version_bytes()?;

    let err = read_vec(bytes.clone(), CompatOptions::strict()).unwrap_err();
    let code = err.downcast_ref::<oxicc_core::Error>().map(|e| e.code());
    assert_eq!(code, Some(0x401));

    let options = CompatOptions::strict().with_flags(CompatFlags::RD_VERSION_WARN);
    let mut p = Profile::new().with_options(options);
    let diags = p.read(MemStream::from_vec(bytes).shared(), 0)?;
    assert_eq!(diags.status(), CompatFlags::RD_WARNING);
    let tag = p.read_tag(TagSignature::COLORANT_ORDER)?;
    let order = tag.borrow().data().as_colorant_order().map(|c: &ColorantOrder| c.data.clone());
    assert_eq!(order, Some(vec![2, 1, 0]));
    Ok(())
}

#[test]
fn unknown_and_private_tags() -> Result<()> {
    let private = TagSignature::from_bytes(*b"zzzz");
    assert_eq!(strict_code(TV_43, private, TypeSignature::XYZ)?, 0x303);
    assert_eq!(
        strict_code(TV_43, TagSignature::VIDEO_CARD_GAMMA, TypeSignature::VIDEO_CARD_GAMMA)?,
        0x303
    );

    let mut p = display_rgb(TV_43)?;
    p.set_cflags(CompatFlags::ALLOW_EXTENSIONS);
    p.add_tag(TagSignature::VIDEO_CARD_GAMMA, TypeSignature::VIDEO_CARD_GAMMA)?;
    assert_eq!(p.add_tag(private, TypeSignature::XYZ).unwrap_err().code(), 0x303);
    p.clear_err();

    p.set_cflags(CompatFlags::ALLOW_UNKNOWN);
    set_xyz(&mut p, private, D50)?;
    p.delete_tag(TagSignature::VIDEO_CARD_GAMMA)?;
    let bytes = write_vec(&mut p)?;

    // Strict readers refuse the private signature
    assert!(read_vec(bytes.clone(), CompatOptions::strict()).is_err());
    let back = read_vec(bytes, CompatOptions::lenient())?;
    assert!(back.tag_signatures().contains(&private));
    Ok(())
}

#[test]
fn set_version_range() -> Result<()> {
    let mut p = Profile::new();
    assert_eq!(p.set_version(60000).unwrap_err().code(), 0x604);
    p.clear_err();
    assert_eq!(p.set_version(10000).unwrap_err().code(), 0x604);
    p.clear_err();
    p.set_version(TV_43)?;
    assert_eq!(p.version(), TV_43);
    Ok(())
}
