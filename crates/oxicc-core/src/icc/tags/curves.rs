//! Curve Tag Types
//!
//! ICC profiles use curves for tone reproduction (TRC).
//! Two main types:
//! - curv: identity, simple gamma or lookup table
//! - para: parametric curves with formula
//!
//! See ICC.1:2022 Sections 10.6 (curv) and 10.18 (para)

use std::io;

use crate::error::{FormatCode, Result};
use crate::icc::buffer::SnBuffer;
use crate::icc::tag::TagBody;
use crate::icc::types::TypeSignature;

use super::dump_limit;

/// Shape of a `curv` tag, which must agree with its count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurveStyle {
    /// Identity, count 0
    #[default]
    Linear,
    /// Single u8Fixed8 exponent, count 1
    Gamma,
    /// Table of normalized 16-bit values, count >= 2
    Table,
}

/// Curve tag data (curv type)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Curve {
    pub style: CurveStyle,
    pub count: usize,
    /// Gamma exponent for [`CurveStyle::Gamma`], values in 0..=1 for
    /// [`CurveStyle::Table`]
    pub data: Vec<f64>,
}

impl Curve {
    fn style_for(count: usize) -> CurveStyle {
        match count {
            0 => CurveStyle::Linear,
            1 => CurveStyle::Gamma,
            _ => CurveStyle::Table,
        }
    }

    /// Evaluate the curve at a given input (0.0 to 1.0)
    pub fn eval(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self.style {
            CurveStyle::Linear => x,
            CurveStyle::Gamma => self.data.first().map_or(x, |g| x.powf(*g)),
            CurveStyle::Table => {
                let table = &self.data;
                if table.len() < 2 {
                    return table.first().copied().unwrap_or(x);
                }
                // Linear interpolation in the table
                let pos = x * (table.len() - 1) as f64;
                let idx = pos.floor() as usize;
                if idx >= table.len() - 1 {
                    return table[table.len() - 1];
                }
                let frac = pos - idx as f64;
                table[idx] + frac * (table[idx + 1] - table[idx])
            }
        }
    }

    /// Evaluate the inverse of a monotonically increasing curve
    pub fn eval_inverse(&self, y: f64) -> f64 {
        let y = y.clamp(0.0, 1.0);
        match self.style {
            CurveStyle::Linear => y,
            CurveStyle::Gamma => match self.data.first() {
                Some(g) if *g != 0.0 => y.powf(1.0 / g),
                _ => y,
            },
            CurveStyle::Table => {
                let table = &self.data;
                if table.len() < 2 {
                    return y;
                }
                let lo = table.partition_point(|v| *v < y);
                if lo == 0 {
                    return 0.0;
                }
                if lo >= table.len() {
                    return 1.0;
                }
                let (v0, v1) = (table[lo - 1], table[lo]);
                let t = if v1 > v0 { (y - v0) / (v1 - v0) } else { 0.0 };
                ((lo - 1) as f64 + t) / (table.len() - 1) as f64
            }
        }
    }

    /// Check if this is a linear (identity) curve
    pub fn is_linear(&self) -> bool {
        match self.style {
            CurveStyle::Linear => true,
            CurveStyle::Gamma => self.data.first().is_some_and(|g| (g - 1.0).abs() < 1e-6),
            CurveStyle::Table => {
                let n = (self.data.len().max(2) - 1) as f64;
                self.data
                    .iter()
                    .enumerate()
                    .all(|(i, v)| (v - i as f64 / n).abs() <= 1.0 / 65535.0)
            }
        }
    }
}

impl TagBody for Curve {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::CURVE
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        if b.op().serialises() && !b.op().is_read() && Self::style_for(self.count) != self.style {
            b.warn(
                FormatCode::CURVE,
                format!("{:?} curve cannot have {} entries", self.style, self.count),
            )?;
        }
        b.count32(&mut self.count)?;
        if b.op().is_read() {
            self.style = Self::style_for(self.count);
        }
        b.resize_checked(&mut self.count, &mut self.data, 2, 0, "curve")?;
        if !b.op().serialises() {
            return Ok(());
        }
        match self.style {
            CurveStyle::Linear => {}
            CurveStyle::Gamma => b.u8f8(&mut self.data[0])?,
            CurveStyle::Table => {
                for v in self.data.iter_mut() {
                    b.n16(v)?;
                }
            }
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        match self.style {
            CurveStyle::Linear => writeln!(out, "Curve is linear"),
            CurveStyle::Gamma => {
                writeln!(out, "Curve is gamma of {:.6}", self.data.first().copied().unwrap_or(0.0))
            }
            CurveStyle::Table => {
                writeln!(out, "Curve, {} entries", self.count)?;
                for (i, v) in self.data.iter().enumerate().take(dump_limit(verbose)) {
                    writeln!(out, "    {i:3}: {v:.6}")?;
                }
                Ok(())
            }
        }
    }
}

/// Parametric curve data (para type)
///
/// `params` holds g, a, b, c, d, e, f in that order; only as many as the
/// function type uses are serialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParametricCurve {
    pub function: u16,
    pub params: [f64; 7],
}

impl ParametricCurve {
    /// Number of parameters for a function type
    pub fn param_count(function: u16) -> Option<usize> {
        match function {
            0 => Some(1),
            1 => Some(3),
            2 => Some(4),
            3 => Some(5),
            4 => Some(7),
            _ => None,
        }
    }

    /// Evaluate the curve at a given input
    pub fn eval(&self, x: f64) -> f64 {
        let [g, a, b, c, d, e, f] = self.params;
        let y = match self.function {
            0 => x.max(0.0).powf(g),
            1 => {
                if a != 0.0 && x >= -b / a {
                    (a * x + b).max(0.0).powf(g)
                } else {
                    0.0
                }
            }
            2 => {
                if a != 0.0 && x >= -b / a {
                    (a * x + b).max(0.0).powf(g) + c
                } else {
                    c
                }
            }
            3 => {
                if x >= d {
                    (a * x + b).max(0.0).powf(g)
                } else {
                    c * x
                }
            }
            4 => {
                if x >= d {
                    (a * x + b).max(0.0).powf(g) + e
                } else {
                    c * x + f
                }
            }
            _ => x,
        };
        y.clamp(0.0, 1.0)
    }
}

impl TagBody for ParametricCurve {
    fn type_sig(&self) -> TypeSignature {
        TypeSignature::PARA
    }

    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()> {
        b.u16(&mut self.function)?;
        b.pad(2)?;
        let n = match Self::param_count(self.function) {
            Some(n) => n,
            None => {
                if b.op().serialises() {
                    b.warn(
                        FormatCode::PARCVTYP,
                        format!("unknown parametric function type {}", self.function),
                    )?;
                }
                if b.op().is_read() {
                    b.count_from_space(4, 0)?.min(7)
                } else {
                    7
                }
            }
        };
        if b.op().serialises() {
            for p in self.params.iter_mut().take(n) {
                b.s15f16(p)?;
            }
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn io::Write, _verbose: u32) -> io::Result<()> {
        let n = Self::param_count(self.function).unwrap_or(7);
        writeln!(out, "Parametric curve, function {}", self.function)?;
        for (name, v) in ["g", "a", "b", "c", "d", "e", "f"].iter().zip(&self.params).take(n) {
            writeln!(out, "    {name} = {v:.6}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::TagData;
    use super::super::test_util::*;
    use super::*;
    use crate::icc::compat::CompatOptions;

    fn curve(style: CurveStyle, values: &[f64]) -> TagData {
        let mut data = TagData::new(TypeSignature::CURVE);
        let c = data.as_curve_mut().unwrap();
        c.style = style;
        c.count = values.len();
        allocate(&mut data);
        data.as_curve_mut().unwrap().data.copy_from_slice(values);
        data
    }

    #[test]
    fn test_curve_styles() {
        let (bytes, back) = write_read(&mut curve(CurveStyle::Linear, &[]), CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 12);
        assert!(back.as_curve().unwrap().is_linear());

        let (bytes, back) =
            write_read(&mut curve(CurveStyle::Gamma, &[2.2]), CompatOptions::strict()).unwrap();
        assert_eq!(&bytes[8..14], &[0, 0, 0, 1, 0x02, 0x33]);
        let c = back.as_curve().unwrap();
        assert_eq!(c.style, CurveStyle::Gamma);
        assert!((c.eval(0.5) - 0.5f64.powf(2.2)).abs() < 1e-3);

        let (_, back) =
            write_read(&mut curve(CurveStyle::Table, &[0.0, 0.25, 1.0]), CompatOptions::strict()).unwrap();
        let c = back.as_curve().unwrap();
        assert_eq!(c.data, vec![0.0, 16384.0 / 65535.0, 1.0]);
        assert!((c.eval(0.25) - c.data[1] / 2.0).abs() < 1e-9);
        assert!((c.eval_inverse(c.eval(0.75)) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_style_count_mismatch_is_always_fatal() {
        let mut data = curve(CurveStyle::Table, &[0.5]);
        let err = write_read(&mut data, CompatOptions::lenient().with_flags(crate::icc::compat::CompatFlags::WR_FORMAT_WARN))
            .unwrap_err();
        assert_eq!(err.code(), 0x300 | 0x62);
    }

    #[test]
    fn test_parametric_round_trip_and_eval() {
        let mut data = TagData::new(TypeSignature::PARA);
        let p = data.as_parametric_curve_mut().unwrap();
        p.function = 3;
        p.params[..5].copy_from_slice(&[2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045]);
        let (bytes, back) = write_read(&mut data, CompatOptions::strict()).unwrap();
        assert_eq!(bytes.len(), 12 + 5 * 4);
        let p = back.as_parametric_curve().unwrap();
        assert_eq!(p.params[5], 0.0);
        assert!((p.eval(0.5) - 0.214).abs() < 1e-3);
        assert!((p.eval(0.01) - 0.01 / 12.92).abs() < 1e-4);
    }

    #[test]
    fn test_unknown_parametric_function() {
        let bytes = b"para\0\0\0\0\x00\x09\x00\x00\x00\x01\x00\x00".to_vec();
        assert_eq!(read(&bytes, CompatOptions::strict()).unwrap_err().code(), 0x21f);
        let back = read(&bytes, CompatOptions::lenient()).unwrap();
        assert_eq!(back.as_parametric_curve().unwrap().params[0], 1.0);
    }
}
