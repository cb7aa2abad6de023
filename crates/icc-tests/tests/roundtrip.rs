//! Write/read/write round trips
//!
//! Serialization quantizes floating point values once; a profile read back
//! from its own output must therefore serialize to the same bytes.

use std::rc::Rc;

use anyhow::Result;
use icc_tests::builders::directory;
use icc_tests::{ProfileGen, display_rgb, gray_display, read_at, read_vec, write_embedded, write_vec};
use oxicc_core::icc::types::{TV_22, TV_40, TV_43};
use oxicc_core::icc::{CompatOptions, IdStatus, TagLookup, TagSignature};
use oxicc_core::stream::MemStream;

const SEEDS: u64 = 128;

#[test]
fn random_profiles_rewrite_identically() -> Result<()> {
    for seed in 0..SEEDS {
        let mut p = ProfileGen::new(seed).profile()?;
        let first = write_vec(&mut p)?;
        assert_eq!(p.get_size()? as usize, first.len(), "seed {seed}");
        assert_eq!(p.header.size as usize, first.len(), "seed {seed}");

        let mut back = read_vec(first.clone(), CompatOptions::strict())?;
        assert_eq!(back.tag_signatures(), p.tag_signatures(), "seed {seed}");
        let second = write_vec(&mut back)?;
        assert_eq!(first, second, "seed {seed}");
    }
    Ok(())
}

#[test]
fn random_profiles_read_at_an_offset() -> Result<()> {
    for seed in 0..SEEDS / 4 {
        let mut generator = ProfileGen::new(seed ^ 0x5eed);
        let mut p = generator.profile()?;
        let offset = generator.offset();
        let plain = write_vec(&mut p)?;
        let embedded = write_embedded(&mut p, offset, 0xa5)?;
        assert_eq!(&embedded[offset..], &plain[..], "seed {seed}");
        assert!(embedded[..offset].iter().all(|b| *b == 0xa5));

        let mut back = read_at(embedded, offset as u64, CompatOptions::strict())?;
        back.read_all_tags()?;
        assert_eq!(write_vec(&mut back)?, plain, "seed {seed}");
    }
    Ok(())
}

#[test]
fn v4_profiles_carry_a_matching_id() -> Result<()> {
    let mut checked = 0;
    for seed in 0..SEEDS {
        let mut p = ProfileGen::new(seed).profile()?;
        let bytes = write_vec(&mut p)?;
        let mut back = read_vec(bytes, CompatOptions::strict())?;
        let expected = if back.version() >= TV_40 {
            checked += 1;
            IdStatus::Match
        } else {
            IdStatus::Absent
        };
        assert_eq!(back.check_id()?, expected, "seed {seed}");
    }
    assert!(checked > 0, "no v4 profile among {SEEDS} seeds");
    Ok(())
}

#[test]
fn linked_tags_stay_linked() -> Result<()> {
    let mut p = display_rgb(TV_43)?;
    let bytes = write_vec(&mut p)?;

    let dir = directory(&bytes);
    let find = |sig: TagSignature| {
        dir.iter()
            .find(|(s, _, _)| *s == sig.0)
            .map(|(_, off, size)| (*off, *size))
    };
    let red = find(TagSignature::RED_TRC);
    assert!(red.is_some());
    assert_eq!(find(TagSignature::GREEN_TRC), red);
    assert_eq!(find(TagSignature::BLUE_TRC), red);

    let mut back = read_vec(bytes, CompatOptions::strict())?;
    let r = back.read_tag(TagSignature::RED_TRC)?;
    let g = back.read_tag(TagSignature::GREEN_TRC)?;
    let b = back.read_tag(TagSignature::BLUE_TRC)?;
    assert!(Rc::ptr_eq(&r, &g));
    assert!(Rc::ptr_eq(&r, &b));
    Ok(())
}

#[test]
fn tags_are_four_byte_aligned() -> Result<()> {
    for seed in 0..SEEDS / 4 {
        let mut p = ProfileGen::new(seed).profile()?;
        let bytes = write_vec(&mut p)?;
        assert_eq!(bytes.len() % 4, 0);
        for (sig, off, size) in directory(&bytes) {
            assert_eq!(off % 4, 0, "tag {sig:08x} at {off}");
            assert!((off + size) as usize <= bytes.len());
        }
    }
    Ok(())
}

#[test]
fn gray_profile_round_trip() -> Result<()> {
    for version in [TV_22, TV_43] {
        let mut p = gray_display(version)?;
        let bytes = write_vec(&mut p)?;
        let mut back = read_vec(bytes.clone(), CompatOptions::strict())?;
        assert_eq!(back.find_tag(TagSignature::GRAY_TRC), TagLookup::Found);
        let trc = back.read_tag(TagSignature::GRAY_TRC)?;
        let gamma = trc.borrow().data().as_curve().map(|c| c.data[0]);
        assert!(gamma.is_some_and(|g| (g - 1.8).abs() < 1.0 / 256.0));
        assert_eq!(write_vec(&mut back)?, bytes);
    }
    Ok(())
}

#[test]
fn unread_tags_are_copied_on_write() -> Result<()> {
    let mut p = display_rgb(TV_43)?;
    let bytes = write_vec(&mut p)?;

    // Only the directory is read; writing must still bring every tag along
    let mut back = read_vec(bytes.clone(), CompatOptions::strict())?;
    assert!(back.entries().iter().all(|e| !e.is_loaded()));
    let mut out = MemStream::new();
    back.write(&mut out, 0)?;
    assert_eq!(out.into_inner(), bytes);
    Ok(())
}
