//! Compatibility options as configuration, and the diagnostics they produce

use anyhow::{Result, anyhow};
use icc_tests::builders::{be32, put_be32};
use icc_tests::{display_rgb, read_vec, write_vec};
use oxicc_core::error::Direction;
use oxicc_core::icc::types::{TV_40, TV_43, VersionRange};
use oxicc_core::icc::{CompatFlags, CompatOptions, Diagnostics, Profile, Warning, WarningKind};
use oxicc_core::stream::MemStream;
use serde_json::json;

#[test]
fn options_load_from_json() -> Result<()> {
    let config = json!({
        "flags": "RD_VERSION_WARN | ALLOW_WR_VERSION",
        "vcrange": { "min": TV_40, "max": TV_43 },
    });
    let options: CompatOptions = serde_json::from_value(config)?;
    assert!(options.has(CompatFlags::RD_VERSION_WARN));
    assert!(options.has(CompatFlags::ALLOW_WR_VERSION));
    assert!(!options.has(CompatFlags::RD_FORMAT_WARN));
    assert_eq!(options.vcrange, VersionRange::new(TV_40, TV_43));

    let p = Profile::new().with_options(options);
    assert_eq!(p.options(), options);
    Ok(())
}

#[test]
fn lenient_options_survive_a_config_file() -> Result<()> {
    let options = CompatOptions::lenient()
        .without_flags(CompatFlags::ALLOW_QUIRKS)
        .with_vcrange(VersionRange::new(TV_40, TV_43));
    let text = serde_json::to_string_pretty(&options)?;
    let back: CompatOptions = serde_json::from_str(&text)?;
    assert_eq!(back, options);
    assert!(!back.has(CompatFlags::ALLOW_QUIRKS));
    Ok(())
}

#[test]
fn malformed_config_is_rejected() {
    assert!(serde_json::from_str::<CompatOptions>(r#"{"flags": "strict"}"#).is_err());
    assert!(serde_json::from_str::<CompatOptions>(r#"{"flags": 0}"#).is_err());
    let unknown = json!({
        "flags": "RD_FORMAT_WARN | ALLOW_EVERYTHING",
        "vcrange": { "min": TV_40, "max": TV_43 },
    });
    assert!(serde_json::from_value::<CompatOptions>(unknown).is_err());
}

#[test]
fn flags_are_written_by_name() -> Result<()> {
    let options = CompatOptions::strict().with_flags(CompatFlags::NO_REQUIRED_CHECK);
    let value = serde_json::to_value(options)?;
    assert_eq!(value["flags"], "NO_REQUIRED_CHECK");
    Ok(())
}

/// Profile whose second tag starts four bytes into the first
fn overlapping_bytes() -> Result<Vec<u8>> {
    let mut bytes = write_vec(&mut display_rgb(TV_43)?)?;
    let first = be32(&bytes, 132 + 4);
    put_be32(&mut bytes, 132 + 12 + 4, first + 4);
    Ok(bytes)
}

#[test]
fn read_warnings_are_reported_as_json() -> Result<()> {
    let bytes = overlapping_bytes()?;
    let err = read_vec(bytes.clone(), CompatOptions::strict()).unwrap_err();
    let code = err.downcast_ref::<oxicc_core::Error>().map(|e| e.code());
    assert_eq!(code, Some(0x244));

    let mut p = Profile::new().with_options(CompatOptions::lenient());
    let diags = p.read(MemStream::from_vec(bytes).shared(), 0)?;
    assert_eq!(diags.status(), CompatFlags::RD_WARNING);
    let overlap = diags
        .warnings
        .iter()
        .find(|w| w.code == 0x244)
        .ok_or_else(|| anyhow!("no overlap warning"))?;
    assert_eq!(overlap.kind, WarningKind::Format);
    assert_eq!(overlap.direction, Direction::Read);

    let report = serde_json::to_value(&diags)?;
    let codes: Vec<u64> = report["warnings"]
        .as_array()
        .ok_or_else(|| anyhow!("warnings is not an array"))?
        .iter()
        .filter_map(|w| w["code"].as_u64())
        .collect();
    assert!(codes.contains(&0x244));
    let back: Diagnostics = serde_json::from_value(report)?;
    assert_eq!(&back, p.diagnostics());
    Ok(())
}

#[test]
fn diagnostics_merge_keeps_both_directions() -> Result<()> {
    let mut p = Profile::new().with_options(CompatOptions::lenient());
    let mut all = p.read(MemStream::from_vec(overlapping_bytes()?).shared(), 0)?;
    assert!(!all.write_warning());

    let write = Diagnostics {
        warnings: vec![Warning {
            code: 0x501,
            kind: WarningKind::Version,
            direction: Direction::Write,
            message: "tag 'clro' is not defined for version 2.4.0".into(),
        }],
    };
    all.merge(write);
    assert_eq!(all.status(), CompatFlags::RD_WARNING | CompatFlags::WR_WARNING);
    assert!(all.warnings.last().is_some_and(|w| w.to_string().starts_with("write warning 0x501")));
    Ok(())
}

#[test]
fn flags_change_between_operations() -> Result<()> {
    let mut p = display_rgb(TV_43)?;
    p.set_cflags(CompatFlags::WR_FORMAT_WARN);
    p.set_cflags(CompatFlags::NO_REQUIRED_CHECK);
    assert!(p.cflags().contains(CompatFlags::WR_FORMAT_WARN | CompatFlags::NO_REQUIRED_CHECK));
    p.unset_cflags(CompatFlags::WR_FORMAT_WARN);
    assert_eq!(p.cflags(), CompatFlags::NO_REQUIRED_CHECK);
    p.set_options(CompatOptions::strict());
    assert_eq!(p.cflags(), CompatFlags::empty());
    Ok(())
}
