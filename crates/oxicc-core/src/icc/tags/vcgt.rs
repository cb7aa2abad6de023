//! Video card gamma (vcgt type)
//!
//! Apple ColorSync extension holding the display calibration ramps loaded
//! into the video card, either as sampled tables or as a gamma formula per
//! channel.

use std::io;

use crate::error::{Error, FormatCode, Result};
use crate::icc::buffer::SnBuffer;
use crate::icc::tag::TagBody;
use crate::icc::types::TypeSignature;

use super::dump_limit;

const FORM_TABLE: u32 = 0;
const FORM_FORMULA: u32 = 1;

/// Calibration data of a `vcgt` tag
#[derive(Debug, Clone, PartialEq)]
pub enum VcgtKind {
    /// Sampled ramps, channel after channel
    Table {
        channels: usize,
        entry_count: usize,
        /// Bytes per entry, 1 or 2
        entry_size: usize,
        data: Vec<u16>,
    },
    /// `min + (max - min) * x^gamma` for red, green and blue
    Formula {
        gamma: [f64; 3],
        min: [f64; 3],
        max: [f64; 3],
    },
    /// Unrecognized form, kept as bytes
    Other { form: u32, count: usize, data: Vec<u8> },
}

/// Video card gamma tag data
#[derive(Debug, Clone, PartialEq)]
pub struct VideoCardGamma {
    pub kind: VcgtKind,
}

impl Default for VideoCardGamma {
    fn default() -> Self {
        Self {
            kind: VcgtKind::Formula {
                gamma: [1.0; 3],
                min: [0.0; 3],
                max: [1.0; 3],
            },
        }
    }
}

impl VideoCardGamma {
    /// Empty table; set the counts then run a resize pass to size the data
    pub fn table(channels: usize, entry_count: usize, entry_size: usize) -> Self {
        Self {
            kind: VcgtKind::Table {
                channels,
                entry_count,
                entry_size,
                data: Vec::new(),
            },
        }
    }

    /// Ramp output for `channel` at input `x` in 0..=1
    pub fn eval(&self, channel: usize, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match &self.kind {
            VcgtKind::Table {
                channels,
                entry_count,
                entry_size,
                data,
            } => {
                let covered = channels
                    .checked_mul(*entry_count)
                    .is_some_and(|n| data.len() >= n);
                if *channels == 0 || *entry_count == 0 || !covered {
                    return x;
                }
                let ch = channel.min(channels.saturating_sub(1));
                let max = if *entry_size == 1 { 255.0 } else { 65535.0 };
                let ramp = &data[ch * entry_count..(ch + 1) * entry_count];
                let pos = x * (entry_count - 1) as f64;
                let i = (pos.floor() as usize).min(entry_count - 1);
                let next = (i + 1).min(entry_count - 1);
                let t = pos - i as f64;
                (ramp[i] as f64 * (1.0 - t) + ramp[next] as f64 * t) / max
            }
            VcgtKind::Formula { gamma, min, max } => {
                let ch = channel.min(2);
                min[ch] + (max[ch] - min[ch]) * x.powf(gamma[ch])
            }
            VcgtKind::Other { .. } => x,
        }
    }
}

impl TagBody for VideoCardGamma {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::VIDEO_CARD_GAMMA
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        let mut form = match &self.kind {
            VcgtKind::Table { .. } => FORM_TABLE,
            VcgtKind::Formula { .. } => FORM_FORMULA,
            VcgtKind::Other { form, .. } => *form,
        };
        b.u32(&mut form)?;
        if b.op().is_read() {
            self.kind = match form {
                FORM_TABLE => VcgtKind::Table {
                    channels: 0,
                    entry_count: 0,
                    entry_size: 2,
                    data: Vec::new(),
                },
                FORM_FORMULA => VcgtKind::Formula {
                    gamma: [0.0; 3],
                    min: [0.0; 3],
                    max: [0.0; 3],
                },
                _ => VcgtKind::Other {
                    form,
                    count: 0,
                    data: Vec::new(),
                },
            };
        }
        match &mut self.kind {
            VcgtKind::Table {
                channels,
                entry_count,
                entry_size,
                data,
            } => {
                b.count16(channels)?;
                b.count16(entry_count)?;
                b.count16(entry_size)?;
                if !matches!(*entry_size, 1 | 2) {
                    return Err(Error::format(
                        b.op().direction(),
                        FormatCode::LUT_WIDTH,
                        format!("vcgt entry size {entry_size} is not 1 or 2"),
                    ));
                }
                let dir = b.op().direction();
                let mut n = channels.checked_mul(*entry_count).ok_or_else(|| {
                    Error::format(dir, FormatCode::CLUT_OVERFLOW, "vcgt table size overflows")
                })?;
                b.resize_checked(&mut n, data, *entry_size, 0, "vcgt table")?;
                if b.op().serialises() {
                    for v in data.iter_mut() {
                        if *entry_size == 1 {
                            if b.op().is_write() && *v > 0xff {
                                b.warn(FormatCode::RANGE, format!("vcgt entry {v} does not fit a byte"))?;
                            }
                            let mut byte = *v as u8;
                            b.u8(&mut byte)?;
                            *v = byte as u16;
                        } else {
                            b.u16(v)?;
                        }
                    }
                }
            }
            VcgtKind::Formula { gamma, min, max } => {
                if b.op().serialises() {
                    for ch in 0..3 {
                        b.s15f16(&mut gamma[ch])?;
                        b.s15f16(&mut min[ch])?;
                        b.s15f16(&mut max[ch])?;
                    }
                }
            }
            VcgtKind::Other { form, count, data } => {
                if b.op().serialises() {
                    b.warn(FormatCode::GAMMA, format!("unknown vcgt form {form}"))?;
                }
                if b.op().is_read() {
                    *count = b.space();
                }
                b.resize_checked(count, data, 1, 0, "vcgt data")?;
                b.bytes(data)?;
            }
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        match &self.kind {
            VcgtKind::Table {
                channels,
                entry_count,
                entry_size,
                data,
            } => {
                writeln!(
                    out,
                    "Video card gamma table, {channels} channels, {entry_count} entries of {entry_size} bytes"
                )?;
                for i in (0..*entry_count).take(dump_limit(verbose)) {
                    let row: Vec<u16> = (0..*channels)
                        .filter_map(|c| data.get(c * entry_count + i).copied())
                        .collect();
                    writeln!(out, "    {i:3}: {row:?}")?;
                }
                Ok(())
            }
            VcgtKind::Formula { gamma, min, max } => {
                writeln!(out, "Video card gamma formula")?;
                for (ch, name) in ["red", "green", "blue"].iter().enumerate() {
                    writeln!(
                        out,
                        "    {name}: gamma {:.6} min {:.6} max {:.6}",
                        gamma[ch], min[ch], max[ch]
                    )?;
                }
                Ok(())
            }
            VcgtKind::Other { form, count, .. } => {
                writeln!(out, "Video card gamma, unknown form {form}, {count} bytes")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::TagData;
    use super::super::test_util::*;
    use super::*;
    use crate::icc::compat::CompatOptions;

    #[test]
    fn test_table_form() {
        let mut data = TagData::VideoCardGamma(VideoCardGamma::table(3, 4, 2));
        allocate(&mut data);
        let VcgtKind::Table { data: ramp, .. } = &mut data.as_video_card_gamma_mut().unwrap().kind else {
            panic!("expected a table");
        };
        for (i, v) in ramp.iter_mut().enumerate() {
            *v = (i % 4) as u16 * 0x5555;
        }
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 8 + 4 + 6 + 24);
        assert_eq!(back, data);
        let g = back.as_video_card_gamma().unwrap();
        assert!((g.eval(1, 1.0) - 1.0).abs() < 1e-9);
        assert!((g.eval(2, 0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_table_passes_input_through() {
        let g = VideoCardGamma::table(0, 5, 2);
        assert_eq!(g.eval(0, 0.5), 0.5);
        assert_eq!(g.eval(3, 2.0), 1.0);
        let huge = VideoCardGamma::table(usize::MAX, 2, 2);
        assert_eq!(huge.eval(1, 0.25), 0.25);
    }

    #[test]
    fn test_byte_entries() {
        let mut data = TagData::VideoCardGamma(VideoCardGamma::table(1, 2, 1));
        allocate(&mut data);
        if let VcgtKind::Table { data: ramp, .. } = &mut data.as_video_card_gamma_mut().unwrap().kind {
            ramp.copy_from_slice(&[0, 255]);
        }
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(&bytes[18..], &[0, 255]);
        assert_eq!(back, data);
    }

    #[test]
    fn test_formula_form() {
        let mut data = TagData::VideoCardGamma(VideoCardGamma {
            kind: VcgtKind::Formula {
                gamma: [2.2, 2.2, 2.2],
                min: [0.0; 3],
                max: [1.0; 3],
            },
        });
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 12 + 36);
        let g = back.as_video_card_gamma().unwrap();
        assert!((g.eval(0, 0.5) - 0.5f64.powf(2.2)).abs() < 1e-4);
    }

    #[test]
    fn test_entry_size_is_always_fatal() {
        let mut bytes = b"vcgt\0\0\0\0\0\0\0\0".to_vec();
        bytes.extend_from_slice(&[0, 1, 0, 1, 0, 4, 0, 0, 0, 0]);
        assert_eq!(read(&bytes, CompatOptions::lenient()).unwrap_err().code(), 0x263);
    }

    #[test]
    fn test_unknown_form() {
        let bytes = b"vcgt\0\0\0\0\0\0\0\x07\x01\x02".to_vec();
        assert_eq!(read(&bytes, CompatOptions::strict()).unwrap_err().code(), 0x20d);
        let back = read(&bytes, CompatOptions::lenient()).unwrap();
        let VcgtKind::Other { form, data, .. } = &back.as_video_card_gamma().unwrap().kind else {
            panic!("expected opaque data");
        };
        assert_eq!(*form, 7);
        assert_eq!(data, &vec![1, 2]);
    }
}
