//! LUT Tag Types
//!
//! LUT (Look-Up Table) tags define complex color transformations as a
//! pipeline: 3x3 matrix (XYZ input only), per-channel input curves, a
//! multi-dimensional color lookup table, then per-channel output curves.
//!
//! Types:
//! - mft1 (Lut8Type): 8-bit precision, 256-entry curves
//! - mft2 (Lut16Type): 16-bit precision, curve sizes given in the tag
//!
//! See ICC.1:2022 Sections 10.10 and 10.11

use std::io;

use crate::error::{Direction, Error, FormatCode, Result};
use crate::icc::buffer::{SnBuffer, SnContext};
use crate::icc::tables::{LutClass, lut_class};
use crate::icc::tag::TagBody;
use crate::icc::types::{TagSignature, TypeSignature};

/// Maximum channels on either side of a Lut
pub const MAX_CHANNELS: usize = 15;

/// Curve size of an 8-bit Lut
const LUT8_ENTRIES: usize = 256;

/// Table precision, which selects the type signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LutPrecision {
    /// mft1
    Lut8,
    /// mft2
    #[default]
    Lut16,
}

/// mft1/mft2 tag data; table values are normalized to 0..=1
#[derive(Debug, Clone, PartialEq)]
pub struct LutTag {
    pub precision: LutPrecision,
    pub input_chan: usize,
    pub output_chan: usize,
    /// Grid points along each CLUT dimension
    pub clut_points: usize,
    /// Entries in each input curve
    pub input_ent: usize,
    /// Entries in each output curve
    pub output_ent: usize,
    /// Matrix, row-major
    pub e: [[f64; 3]; 3],
    /// `input_chan` curves of `input_ent` entries, channel-major
    pub input_table: Vec<f64>,
    /// `clut_points ^ input_chan` grid points of `output_chan` values; the
    /// first input channel varies slowest
    pub clut_table: Vec<f64>,
    /// `output_chan` curves of `output_ent` entries, channel-major
    pub output_table: Vec<f64>,
}

impl Default for LutTag {
    fn default() -> Self {
        Self::new(LutPrecision::default())
    }
}

impl LutTag {
    pub fn new(precision: LutPrecision) -> Self {
        let (input_ent, output_ent) = match precision {
            LutPrecision::Lut8 => (LUT8_ENTRIES, LUT8_ENTRIES),
            LutPrecision::Lut16 => (0, 0),
        };
        Self {
            precision,
            input_chan: 0,
            output_chan: 0,
            clut_points: 0,
            input_ent,
            output_ent,
            e: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            input_table: Vec::new(),
            clut_table: Vec::new(),
            output_table: Vec::new(),
        }
    }

    /// Number of CLUT values, `None` on overflow
    pub fn clut_size(&self) -> Option<usize> {
        u32::try_from(self.input_chan)
            .ok()
            .and_then(|n| self.clut_points.checked_pow(n))
            .and_then(|grid| grid.checked_mul(self.output_chan))
    }

    fn table_sizes(&self, dir: Direction) -> Result<(usize, usize, usize)> {
        let overflow = || {
            Error::format(
                dir,
                FormatCode::CLUT_OVERFLOW,
                format!(
                    "{} grid points over {} inputs overflow",
                    self.clut_points, self.input_chan
                ),
            )
        };
        let input = self.input_chan.checked_mul(self.input_ent).ok_or_else(overflow)?;
        let clut = self.clut_size().ok_or_else(overflow)?;
        let output = self.output_chan.checked_mul(self.output_ent).ok_or_else(overflow)?;
        Ok((input, clut, output))
    }

    /// Fill the tables from per-sample callbacks. Storage must already match
    /// the counts.
    ///
    /// `input(ch, x)` and `output(ch, x)` map a normalized curve position to
    /// a value; `clut(inputs, outputs)` fills one grid point. Results are
    /// clamped to 0..=1.
    pub fn set_tables(
        &mut self,
        mut input: impl FnMut(usize, f64) -> f64,
        mut clut: impl FnMut(&[f64], &mut [f64]),
        mut output: impl FnMut(usize, f64) -> f64,
    ) -> Result<()> {
        let (n_in, n_clut, n_out) = self.table_sizes(Direction::Write)?;
        if self.input_table.len() != n_in
            || self.clut_table.len() != n_clut
            || self.output_table.len() != n_out
        {
            return Err(Error::Internal("Lut storage does not match its counts".into()));
        }
        fill_curves(&mut self.input_table, self.input_ent, &mut input);
        fill_curves(&mut self.output_table, self.output_ent, &mut output);

        let mut coords = vec![0.0; self.input_chan];
        let mut values = vec![0.0; self.output_chan];
        let last = self.clut_points.saturating_sub(1).max(1) as f64;
        if self.output_chan == 0 {
            return Ok(());
        }
        for (idx, point) in self.clut_table.chunks_exact_mut(self.output_chan).enumerate() {
            let mut rem = idx;
            for c in coords.iter_mut().rev() {
                *c = (rem % self.clut_points) as f64 / last;
                rem /= self.clut_points;
            }
            clut(&coords, &mut values);
            for (dst, v) in point.iter_mut().zip(&values) {
                *dst = v.clamp(0.0, 1.0);
            }
        }
        Ok(())
    }

    fn value(&self, b: &mut SnBuffer<'_, '_>, v: &mut f64) -> Result<()> {
        match self.precision {
            LutPrecision::Lut8 => b.n8(v),
            LutPrecision::Lut16 => b.n16(v),
        }
    }

    fn values(&self, b: &mut SnBuffer<'_, '_>, table: &mut [f64]) -> Result<()> {
        for v in table.iter_mut() {
            self.value(b, v)?;
        }
        Ok(())
    }
}

fn fill_curves(table: &mut [f64], entries: usize, f: &mut impl FnMut(usize, f64) -> f64) {
    if entries == 0 {
        return;
    }
    let last = entries.saturating_sub(1).max(1) as f64;
    for (ch, curve) in table.chunks_exact_mut(entries).enumerate() {
        for (i, v) in curve.iter_mut().enumerate() {
            *v = f(ch, i as f64 / last).clamp(0.0, 1.0);
        }
    }
}

impl TagBody for LutTag {
    fn type_sig(&self) -> TypeSignature {
        match self.precision {
            LutPrecision::Lut8 => TypeSignature::LUT8,
            LutPrecision::Lut16 => TypeSignature::LUT16,
        }
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        let dir = b.op().direction();
        b.count8(&mut self.input_chan)?;
        b.count8(&mut self.output_chan)?;
        b.count8(&mut self.clut_points)?;
        b.pad(1)?;
        for row in self.e.iter_mut() {
            for v in row.iter_mut() {
                b.s15f16(v)?;
            }
        }
        match self.precision {
            LutPrecision::Lut8 => {
                if b.op().is_read() {
                    self.input_ent = LUT8_ENTRIES;
                    self.output_ent = LUT8_ENTRIES;
                } else if b.op().serialises()
                    && (self.input_ent != LUT8_ENTRIES || self.output_ent != LUT8_ENTRIES)
                {
                    b.warn(
                        FormatCode::LUT_WIDTH,
                        format!(
                            "Lut8 curves must have 256 entries, not {} and {}",
                            self.input_ent, self.output_ent
                        ),
                    )?;
                }
            }
            LutPrecision::Lut16 => {
                b.count16(&mut self.input_ent)?;
                b.count16(&mut self.output_ent)?;
            }
        }

        if b.op().serialises() {
            if !(1..=MAX_CHANNELS).contains(&self.input_chan) {
                b.warn(
                    FormatCode::LUICHAN,
                    format!("Lut has {} input channels", self.input_chan),
                )?;
            }
            if !(1..=MAX_CHANNELS).contains(&self.output_chan) {
                b.warn(
                    FormatCode::LUOCHAN,
                    format!("Lut has {} output channels", self.output_chan),
                )?;
            }
        }

        let (mut n_in, mut n_clut, mut n_out) = self.table_sizes(dir)?;
        let item = match self.precision {
            LutPrecision::Lut8 => 1,
            LutPrecision::Lut16 => 2,
        };
        let after_input = n_clut.saturating_add(n_out).saturating_mul(item);
        b.resize_checked(&mut n_in, &mut self.input_table, item, after_input, "Lut input tables")?;
        b.resize_checked(
            &mut n_clut,
            &mut self.clut_table,
            item,
            n_out.saturating_mul(item),
            "Lut CLUT",
        )?;
        b.resize_checked(&mut n_out, &mut self.output_table, item, 0, "Lut output tables")?;

        if b.op().serialises() {
            let mut input = std::mem::take(&mut self.input_table);
            let mut clut = std::mem::take(&mut self.clut_table);
            let mut output = std::mem::take(&mut self.output_table);
            let res = self
                .values(b, &mut input)
                .and_then(|()| self.values(b, &mut clut))
                .and_then(|()| self.values(b, &mut output));
            self.input_table = input;
            self.clut_table = clut;
            self.output_table = output;
            res?;
        }
        Ok(())
    }

    fn check(&self, ctx: &mut SnContext<'_>, sig: TagSignature, dir: Direction) -> Result<()> {
        let header = ctx.header;
        let (data, pcs) = (header.color_space.channels(), header.pcs.channels());
        let (want_in, want_out) = match lut_class(sig) {
            LutClass::Fwd => (data, pcs),
            LutClass::Bwd => (pcs, data),
            LutClass::Gamut => (pcs, 1),
            LutClass::Preview => (pcs, pcs),
            LutClass::None => return Ok(()),
        };
        if want_in != 0 && self.input_chan != want_in {
            ctx.format_warning(
                dir,
                FormatCode::LUICHAN,
                format!(
                    "'{sig}' has {} input channels, the profile needs {want_in}",
                    self.input_chan
                ),
            )?;
        }
        if want_out != 0 && self.output_chan != want_out {
            ctx.format_warning(
                dir,
                FormatCode::LUOCHAN,
                format!(
                    "'{sig}' has {} output channels, the profile needs {want_out}",
                    self.output_chan
                ),
            )?;
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        let bits = match self.precision {
            LutPrecision::Lut8 => 8,
            LutPrecision::Lut16 => 16,
        };
        writeln!(
            out,
            "Lut{bits}: {} inputs, {} outputs, {} grid points",
            self.input_chan, self.output_chan, self.clut_points
        )?;
        if verbose > 0 {
            for row in &self.e {
                writeln!(out, "    [{:.6} {:.6} {:.6}]", row[0], row[1], row[2])?;
            }
            writeln!(
                out,
                "    curves: {} input entries, {} output entries; {} CLUT values",
                self.input_ent,
                self.output_ent,
                self.clut_table.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::TagData;
    use super::super::test_util::*;
    use super::*;
    use crate::alloc::StdHeap;
    use crate::icc::compat::CompatOptions;
    use crate::icc::header::{ColorSpace, HeaderSummary, ProfileClass};

    fn lut16(input: usize, output: usize, points: usize, entries: usize) -> TagData {
        let mut data = TagData::new(TypeSignature::LUT16);
        let l = data.as_lut_mut().unwrap();
        l.input_chan = input;
        l.output_chan = output;
        l.clut_points = points;
        l.input_ent = entries;
        l.output_ent = entries;
        allocate(&mut data);
        data
    }

    #[test]
    fn test_lut16_layout_and_round_trip() {
        let mut data = lut16(3, 3, 2, 2);
        data.as_lut_mut()
            .unwrap()
            .set_tables(|_, x| x, |i, o| o.copy_from_slice(i), |_, x| 1.0 - x)
            .unwrap();
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 8 + 4 + 36 + 4 + 12 + 48 + 12);
        assert_eq!(back, data);
        let l = back.as_lut().unwrap();
        // Last grid point is (1, 1, 1)
        assert_eq!(&l.clut_table[21..24], &[1.0, 1.0, 1.0]);
        assert_eq!(&l.clut_table[3..6], &[0.0, 0.0, 1.0]);
        assert_eq!(l.output_table[0], 1.0);
    }

    #[test]
    fn test_lut8_fixed_entries() {
        let mut data = TagData::new(TypeSignature::LUT8);
        let l = data.as_lut_mut().unwrap();
        l.input_chan = 1;
        l.output_chan = 1;
        l.clut_points = 2;
        allocate(&mut data);
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 8 + 4 + 36 + 256 + 2 + 256);
        assert_eq!(back.type_sig(), TypeSignature::LUT8);

        data.as_lut_mut().unwrap().input_ent = 16;
        assert!(write_read(&mut data, CompatOptions::lenient()).is_err());
    }

    #[test]
    fn test_clut_overflow_is_always_fatal() {
        let mut bytes = b"mft2\0\0\0\0".to_vec();
        bytes.extend_from_slice(&[15, 3, 255, 0]);
        bytes.extend_from_slice(&[0; 36]);
        bytes.extend_from_slice(&[0, 2, 0, 2]);
        let err = read(&bytes, CompatOptions::lenient()).unwrap_err();
        assert_eq!(err.code(), 0x200 | 0x61);
    }

    #[test]
    fn test_oversized_table_is_bound_error() {
        let mut bytes = b"mft2\0\0\0\0".to_vec();
        bytes.extend_from_slice(&[3, 3, 33, 0]);
        bytes.extend_from_slice(&[0; 36]);
        bytes.extend_from_slice(&[0x10, 0, 0x10, 0]);
        bytes.extend_from_slice(&[0; 64]);
        let err = read(&bytes, CompatOptions::lenient()).unwrap_err();
        assert_eq!(err.code(), 0x105);
    }

    #[test]
    fn test_channels_against_header() {
        let heap = StdHeap::new();
        let mut c = ctx(&heap, CompatOptions::strict());
        c.header = HeaderSummary {
            class: ProfileClass::Output,
            color_space: ColorSpace::Cmyk,
            pcs: ColorSpace::Lab,
        };
        let data = lut16(3, 3, 2, 2);
        let l = data.as_lut().unwrap();
        assert_eq!(
            l.check(&mut c, TagSignature::A2B0, Direction::Read).unwrap_err().code(),
            0x237
        );
        assert!(l.check(&mut c, TagSignature::B2A0, Direction::Read).is_err());
        assert!(l.check(&mut c, TagSignature::PREVIEW0, Direction::Read).is_ok());
        assert!(l.check(&mut c, TagSignature::COPYRIGHT, Direction::Read).is_ok());
    }
}
