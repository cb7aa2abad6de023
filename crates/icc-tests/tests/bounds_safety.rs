//! Malformed input handling
//!
//! Truncated, corrupted and hostile profiles must fail with an error code
//! (or be read with warnings), never panic or over-allocate.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use icc_tests::builders::{be32, directory, put_be32, set_table};
use icc_tests::{ProfileGen, display_rgb, write_vec};
use oxicc_core::alloc::{Heap, StdHeap};
use oxicc_core::icc::types::{TV_24, TV_43};
use oxicc_core::icc::{CompatOptions, Profile, TagLookup, TagSignature};
use oxicc_core::stream::MemStream;
use rand::Rng;

fn read_code(bytes: Vec<u8>, options: CompatOptions) -> u32 {
    let mut p = Profile::new().with_options(options);
    match p.read(MemStream::from_vec(bytes).shared(), 0) {
        Ok(_) => 0,
        Err(err) => {
            assert_eq!(p.error().map(|e| e.code()), Some(err.code()));
            err.code()
        }
    }
}

fn sample() -> Result<Vec<u8>> {
    write_vec(&mut display_rgb(TV_43)?)
}

#[test]
fn every_truncation_is_a_length_error() -> Result<()> {
    let bytes = sample()?;
    for len in 0..bytes.len() {
        let code = read_code(bytes[..len].to_vec(), CompatOptions::lenient());
        assert_eq!(code, 0x603, "truncated to {len} bytes");
    }
    Ok(())
}

#[test]
fn declared_size_below_minimum() -> Result<()> {
    let mut bytes = sample()?;
    put_be32(&mut bytes, 0, 100);
    assert_eq!(read_code(bytes, CompatOptions::lenient()), 0x603);
    Ok(())
}

#[test]
fn bad_magic_number() -> Result<()> {
    let mut bytes = sample()?;
    bytes[36..40].copy_from_slice(b"psca");
    assert_eq!(read_code(bytes, CompatOptions::lenient()), 0x601);
    Ok(())
}

#[test]
fn huge_tag_count() -> Result<()> {
    let mut bytes = sample()?;
    put_be32(&mut bytes, 128, u32::MAX);
    assert_eq!(read_code(bytes, CompatOptions::lenient()), 0x105);
    Ok(())
}

#[test]
fn tag_inside_the_directory() -> Result<()> {
    let mut bytes = sample()?;
    put_be32(&mut bytes, 132 + 4, 128);
    assert_eq!(read_code(bytes, CompatOptions::lenient()), 0x105);
    Ok(())
}

#[test]
fn tag_offset_overflow() -> Result<()> {
    let mut bytes = sample()?;
    put_be32(&mut bytes, 132 + 4, u32::MAX - 4);
    put_be32(&mut bytes, 132 + 8, 16);
    assert_eq!(read_code(bytes, CompatOptions::lenient()), 0x105);
    Ok(())
}

#[test]
fn tag_shorter_than_its_type_header() -> Result<()> {
    let mut bytes = sample()?;
    put_be32(&mut bytes, 132 + 8, 4);
    assert_eq!(read_code(bytes, CompatOptions::lenient()), 0x105);
    Ok(())
}

#[test]
fn duplicate_directory_entry() -> Result<()> {
    let mut bytes = sample()?;
    let first = be32(&bytes, 132);
    put_be32(&mut bytes, 132 + 12, first);
    assert_eq!(read_code(bytes, CompatOptions::lenient()), 0x108);
    Ok(())
}

#[test]
fn corrupt_tag_body_is_reported_on_access() -> Result<()> {
    let mut p = display_rgb(TV_24)?;
    let mut bytes = write_vec(&mut p)?;

    // The 'desc' ASCII count claims far more bytes than the tag holds
    let off = directory(&bytes)
        .into_iter()
        .find(|(sig, _, _)| *sig == TagSignature::PROFILE_DESC.0)
        .map(|(_, off, _)| off as usize)
        .ok_or_else(|| anyhow!("no desc tag"))?;
    put_be32(&mut bytes, off + 8, 0x00ff_ffff);

    let mut back = Profile::new().with_options(CompatOptions::lenient());
    back.read(MemStream::from_vec(bytes).shared(), 0)?;
    assert_eq!(back.find_tag(TagSignature::PROFILE_DESC), TagLookup::Found);
    let err = back.read_tag(TagSignature::PROFILE_DESC).unwrap_err();
    assert_eq!(err.code(), 0x105);
    assert_eq!(back.find_tag(TagSignature::PROFILE_DESC), TagLookup::FoundUnreadable);

    // Other tags stay readable once the error is acknowledged
    back.clear_err();
    back.read_tag(TagSignature::MEDIA_WHITE)?;
    Ok(())
}

#[test]
fn heap_limit_refuses_large_tables() -> Result<()> {
    let mut p = display_rgb(TV_43)?;
    p.delete_tag(TagSignature::RED_TRC)?;
    let table: Vec<f64> = (0..4096).map(|i| i as f64 / 4095.0).collect();
    set_table(&mut p, TagSignature::RED_TRC, &table)?;
    let bytes = write_vec(&mut p)?;

    let heap = Arc::new(StdHeap::with_limit(4096));
    let mut back = Profile::with_heap(heap.clone());
    back.read(MemStream::from_vec(bytes).shared(), 0)?;
    back.read_tag(TagSignature::MEDIA_WHITE)?;
    let err = back.read_tag(TagSignature::RED_TRC).unwrap_err();
    assert_eq!(err.code(), 0x001);
    assert!(heap.stats().peak_bytes <= 4096);
    Ok(())
}

#[test]
fn random_corruption_never_panics() -> Result<()> {
    let bytes = sample()?;
    let mut generator = ProfileGen::new(0xbad);
    for _ in 0..500 {
        let mut corrupt = bytes.clone();
        let flips = generator.rng().gen_range(1..8);
        for _ in 0..flips {
            let at = generator.rng().gen_range(0..corrupt.len());
            corrupt[at] = generator.rng().r#gen();
        }

        let heap = Arc::new(StdHeap::with_limit(1 << 20));
        let mut p = Profile::with_heap(heap).with_options(CompatOptions::lenient());
        if p.read(MemStream::from_vec(corrupt).shared(), 0).is_err() {
            continue;
        }
        for sig in p.tag_signatures() {
            let _ = p.read_tag_any(sig);
            p.clear_err();
        }
        let mut out = MemStream::new();
        let _ = p.write(&mut out, 0);
    }
    Ok(())
}
