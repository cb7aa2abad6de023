//! Device settings (devs type, ICC.1:2001-04 Section 6.5.5)
//!
//! A three level tree: platform entries hold setting combinations, which
//! hold setting structures, which hold the values of one setting. Platform
//! entries and combinations store their own byte size, patched in after
//! the contents are laid out.
//!
//! Settings of the Microsoft platform are decoded into typed values; every
//! other platform keeps raw value bytes.

use std::io;

use crate::error::{Error, FormatCode, Result};
use crate::icc::buffer::SnBuffer;
use crate::icc::tag::TagBody;
use crate::icc::types::TypeSignature;

/// Microsoft platform signature
pub const PLATFORM_MSFT: u32 = u32::from_be_bytes(*b"MSFT");
/// Resolution setting, x and y dpi packed in a `u64`
pub const MSFT_RESOLUTION: u32 = u32::from_be_bytes(*b"rsln");
pub const MSFT_MEDIA: u32 = u32::from_be_bytes(*b"mtyp");
pub const MSFT_HALFTONE: u32 = u32::from_be_bytes(*b"hftn");

const PLATFORM_HEADER: usize = 12;
const COMBINATION_HEADER: usize = 8;
const SETTING_HEADER: usize = 12;

/// Values of one setting
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValues {
    Resolution(Vec<u64>),
    /// 1 standard, 2 transparency, 3 glossy, 256 and up user defined
    Media(Vec<u32>),
    /// 1 to 10 standard dither modes, 256 and up user defined
    Halftone(Vec<u32>),
    Raw { value_size: usize, data: Vec<u8> },
}

impl Default for SettingValues {
    fn default() -> Self {
        Self::Raw {
            value_size: 4,
            data: Vec::new(),
        }
    }
}

impl SettingValues {
    /// Empty values of the kind a platform and setting id decode to
    pub fn for_setting(platform: u32, setting: u32, value_size: usize) -> Self {
        match (platform, setting, value_size) {
            (PLATFORM_MSFT, MSFT_RESOLUTION, 8) => Self::Resolution(Vec::new()),
            (PLATFORM_MSFT, MSFT_MEDIA, 4) => Self::Media(Vec::new()),
            (PLATFORM_MSFT, MSFT_HALFTONE, 4) => Self::Halftone(Vec::new()),
            _ => Self::Raw {
                value_size,
                data: Vec::new(),
            },
        }
    }

    /// Serialized size of one value
    pub fn value_size(&self) -> usize {
        match self {
            Self::Resolution(_) => 8,
            Self::Media(_) | Self::Halftone(_) => 4,
            Self::Raw { value_size, .. } => *value_size,
        }
    }
}

/// One setting and its values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingStruct {
    pub setting: u32,
    /// Number of values
    pub count: usize,
    pub values: SettingValues,
}

/// Settings that apply together
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingCombination {
    pub count: usize,
    pub settings: Vec<SettingStruct>,
}

/// Setting combinations of one platform
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlatformEntry {
    pub platform: u32,
    pub count: usize,
    pub combinations: Vec<SettingCombination>,
}

/// Device settings tag data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceSettings {
    pub count: usize,
    pub platforms: Vec<PlatformEntry>,
}

/// Settle a self-sized block once its contents are laid out.
///
/// On write the size field at `size_at` is patched with the block length;
/// on read a disagreement with the stored size raises `DSSIZE` and the
/// cursor moves to where the stored size says the block ends.
fn close_block(b: &mut SnBuffer<'_, '_>, start: usize, size_at: usize, stored: u32, what: &str) -> Result<()> {
    if !b.op().serialises() {
        return Ok(());
    }
    let end = b.offset();
    let used = end - start;
    if b.op().is_read() {
        if used != stored as usize {
            b.warn(
                FormatCode::DSSIZE,
                format!("{what} is {used} bytes but records a size of {stored}"),
            )?;
            b.seek(start + stored as usize)?;
        }
        return Ok(());
    }
    let mut size = u32::try_from(used)
        .map_err(|_| Error::format(b.op().direction(), FormatCode::RANGE, format!("{what} of {used} bytes")))?;
    b.seek(size_at)?;
    b.u32(&mut size)?;
    b.seek(end)
}

fn check_value(
    b: &mut SnBuffer<'_, '_>,
    v: u32,
    standard: std::ops::RangeInclusive<u32>,
    sub: FormatCode,
    what: &str,
) -> Result<()> {
    if b.op().serialises() && !standard.contains(&v) && v < 256 {
        b.warn(sub, format!("unknown Microsoft {what} {v}"))?;
    }
    Ok(())
}

fn serialize_setting(b: &mut SnBuffer<'_, '_>, platform: u32, s: &mut SettingStruct) -> Result<()> {
    b.u32(&mut s.setting)?;
    let mut value_size = s.values.value_size();
    b.count32(&mut value_size)?;
    b.count32(&mut s.count)?;
    if b.op().is_read() {
        s.values = SettingValues::for_setting(platform, s.setting, value_size);
        if platform == PLATFORM_MSFT && matches!(s.values, SettingValues::Raw { .. }) {
            b.warn(
                FormatCode::MSDEVID,
                format!(
                    "unknown Microsoft setting '{}' of {value_size}-byte values",
                    TypeSignature(s.setting)
                ),
            )?;
        }
    }
    match &mut s.values {
        SettingValues::Resolution(v) => {
            b.resize_checked(&mut s.count, v, 8, 0, "resolutions")?;
            if b.op().serialises() {
                for r in v.iter_mut() {
                    b.u64(r)?;
                }
            }
        }
        SettingValues::Media(v) => {
            b.resize_checked(&mut s.count, v, 4, 0, "media types")?;
            for m in v.iter_mut() {
                b.u32(m)?;
                check_value(b, *m, 1..=3, FormatCode::MSMETYP, "media type")?;
            }
        }
        SettingValues::Halftone(v) => {
            b.resize_checked(&mut s.count, v, 4, 0, "halftones")?;
            for h in v.iter_mut() {
                b.u32(h)?;
                check_value(b, *h, 1..=10, FormatCode::MSHALFTN, "halftone")?;
            }
        }
        SettingValues::Raw { value_size, data } => {
            let mut n = s.count.checked_mul(*value_size).ok_or_else(|| {
                Error::BufferBound(format!("{} setting values of {value_size} bytes", s.count))
            })?;
            b.resize_checked(&mut n, data, 1, 0, "setting values")?;
            b.bytes(data)?;
        }
    }
    Ok(())
}

fn serialize_combination(b: &mut SnBuffer<'_, '_>, platform: u32, c: &mut SettingCombination) -> Result<()> {
    let start = b.offset();
    let mut stored = 0u32;
    b.u32(&mut stored)?;
    b.count32(&mut c.count)?;
    b.array_of(&mut c.count, &mut c.settings, SETTING_HEADER, 0, "settings", |b, s| {
        serialize_setting(b, platform, s)
    })?;
    close_block(b, start, start, stored, "setting combination")
}

impl TagBody for DeviceSettings {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::DEVICE_SETTINGS
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.count32(&mut self.count)?;
        b.array_of(&mut self.count, &mut self.platforms, PLATFORM_HEADER, 0, "platforms", |b, p| {
            let start = b.offset();
            b.u32(&mut p.platform)?;
            let mut stored = 0u32;
            b.u32(&mut stored)?;
            b.count32(&mut p.count)?;
            let platform = p.platform;
            b.array_of(
                &mut p.count,
                &mut p.combinations,
                COMBINATION_HEADER,
                0,
                "setting combinations",
                |b, c| serialize_combination(b, platform, c),
            )?;
            close_block(b, start, start + 4, stored, "platform entry")
        })
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        writeln!(out, "Device settings, {} platforms", self.count)?;
        for p in &self.platforms {
            writeln!(out, "  Platform '{}', {} combinations", TypeSignature(p.platform), p.count)?;
            for (i, c) in p.combinations.iter().enumerate() {
                writeln!(out, "    Combination {i}:")?;
                for s in &c.settings {
                    let values = match &s.values {
                        SettingValues::Resolution(v) => format!("resolution {v:?}"),
                        SettingValues::Media(v) => format!("media {v:?}"),
                        SettingValues::Halftone(v) => format!("halftone {v:?}"),
                        SettingValues::Raw { value_size, data } => {
                            format!("{} values of {value_size} bytes, {} bytes", s.count, data.len())
                        }
                    };
                    writeln!(out, "      '{}': {values}", TypeSignature(s.setting))?;
                }
            }
        }
        Ok(())
    }
}
