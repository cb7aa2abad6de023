//! Building transform tags from sampled callbacks
//!
//! A color engine describes a profile's transforms as functions; these
//! helpers sample them into TRC, colorant and Lut tags of the container.
//! Values returned by the callbacks are normalized to 0..=1 and clamped.

use super::header::ColorSpace;
use super::profile::Profile;
use super::tables::{self, LutClass};
use super::tag::{TagRef, borrow_tag_mut};
use super::tags::{CurveStyle, LutPrecision};
use super::types::{TagSignature, TypeSignature, XyzNumber};
use crate::error::{Error, Result};

/// Shape of a Lut built by [`Profile::create_lut_xforms`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutLayout {
    pub precision: LutPrecision,
    /// Grid points along each CLUT dimension
    pub clut_points: usize,
    /// Input curve entries; always 256 for [`LutPrecision::Lut8`]
    pub input_ent: usize,
    /// Output curve entries; always 256 for [`LutPrecision::Lut8`]
    pub output_ent: usize,
}

impl LutLayout {
    pub fn lut8(clut_points: usize) -> Self {
        Self {
            precision: LutPrecision::Lut8,
            clut_points,
            input_ent: 256,
            output_ent: 256,
        }
    }

    pub fn lut16(clut_points: usize, input_ent: usize, output_ent: usize) -> Self {
        Self {
            precision: LutPrecision::Lut16,
            clut_points,
            input_ent,
            output_ent,
        }
    }
}

const TRC_SIGS: [TagSignature; 3] = [TagSignature::RED_TRC, TagSignature::GREEN_TRC, TagSignature::BLUE_TRC];

const COLORANT_SIGS: [TagSignature; 3] = [
    TagSignature::RED_COLORANT,
    TagSignature::GREEN_COLORANT,
    TagSignature::BLUE_COLORANT,
];

/// Sample `f` at `entries` evenly spaced inputs
fn sample(entries: usize, mut f: impl FnMut(f64) -> f64) -> Vec<f64> {
    let last = entries.saturating_sub(1).max(1) as f64;
    (0..entries).map(|i| f(i as f64 / last).clamp(0.0, 1.0)).collect()
}

impl Profile {
    fn add_table_curve(&mut self, sig: TagSignature, table: &[f64]) -> Result<TagRef> {
        let tag = self.add_tag_inner(sig, TypeSignature::CURVE)?;
        {
            let mut t = borrow_tag_mut(&tag)?;
            if let Some(c) = t.data_mut().as_curve_mut() {
                c.style = CurveStyle::Table;
                c.count = table.len();
            }
            t.allocate()?;
            if let Some(c) = t.data_mut().as_curve_mut() {
                c.data.copy_from_slice(table);
            }
        }
        Ok(tag)
    }

    fn add_xyz(&mut self, sig: TagSignature, v: XyzNumber) -> Result<()> {
        let tag = self.add_tag_inner(sig, TypeSignature::XYZ)?;
        let mut t = borrow_tag_mut(&tag)?;
        if let Some(x) = t.data_mut().as_xyz_mut() {
            x.count = 1;
        }
        t.allocate()?;
        if let Some(x) = t.data_mut().as_xyz_mut() {
            x.data[0] = v;
        }
        Ok(())
    }

    /// Add the `kTRC` tag of a gray profile, sampled from `transfer`
    pub fn create_mono_xforms(
        &mut self,
        entries: usize,
        transfer: impl FnMut(f64) -> f64,
    ) -> Result<TagRef> {
        self.guarded(|p| {
            if p.header.color_space != ColorSpace::Gray {
                return Err(Error::BadColorSpace(format!(
                    "gray TRC needs a GRAY profile, not {:?}",
                    p.header.color_space
                )));
            }
            if entries < 2 {
                return Err(Error::BadCurve(format!("a sampled TRC needs 2 or more entries, got {entries}")));
            }
            p.add_table_curve(TagSignature::GRAY_TRC, &sample(entries, transfer))
        })
    }

    /// Add the colorant and TRC tags of an RGB matrix/TRC profile.
    ///
    /// `transfer(ch, x)` gives channel `ch`'s curve. Channels with identical
    /// curves share one tag.
    pub fn create_matrix_xforms(
        &mut self,
        colorants: [XyzNumber; 3],
        entries: usize,
        mut transfer: impl FnMut(usize, f64) -> f64,
    ) -> Result<()> {
        self.guarded(|p| {
            if p.header.color_space != ColorSpace::Rgb || p.header.pcs != ColorSpace::Xyz {
                return Err(Error::BadColorSpace(format!(
                    "matrix/TRC tags need RGB data and an XYZ PCS, not {:?} -> {:?}",
                    p.header.color_space, p.header.pcs
                )));
            }
            if entries < 2 {
                return Err(Error::BadCurve(format!("a sampled TRC needs 2 or more entries, got {entries}")));
            }
            for (sig, xyz) in COLORANT_SIGS.into_iter().zip(colorants) {
                p.add_xyz(sig, xyz)?;
            }
            let tables: Vec<Vec<f64>> = (0..3).map(|ch| sample(entries, |x| transfer(ch, x))).collect();
            for (ch, sig) in TRC_SIGS.into_iter().enumerate() {
                match tables[..ch].iter().position(|t| *t == tables[ch]) {
                    Some(same) => {
                        p.link_tag_inner(sig, TRC_SIGS[same])?;
                    }
                    None => {
                        p.add_table_curve(sig, &tables[ch])?;
                    }
                }
            }
            tracing::debug!(entries, "created matrix/TRC tags");
            Ok(())
        })
    }

    /// Add a Lut tag for the transform tag `sig`.
    ///
    /// Channel counts follow from the tag's direction and the header color
    /// spaces. `input(ch, x)` and `output(ch, x)` sample the curves;
    /// `clut(inputs, outputs)` fills one grid point.
    pub fn create_lut_xforms(
        &mut self,
        sig: TagSignature,
        layout: LutLayout,
        input: impl FnMut(usize, f64) -> f64,
        clut: impl FnMut(&[f64], &mut [f64]),
        output: impl FnMut(usize, f64) -> f64,
    ) -> Result<TagRef> {
        self.guarded(|p| {
            let (data, pcs) = (p.header.color_space.channels(), p.header.pcs.channels());
            if data == 0 || pcs == 0 {
                return Err(Error::BadColorSpace(format!(
                    "channel counts unknown for {:?} -> {:?}",
                    p.header.color_space, p.header.pcs
                )));
            }
            let (input_chan, output_chan) = match tables::lut_class(sig) {
                LutClass::Fwd => (data, pcs),
                LutClass::Bwd => (pcs, data),
                LutClass::Gamut => (pcs, 1),
                LutClass::Preview => (pcs, pcs),
                LutClass::None => {
                    return Err(Error::ClassMismatch(format!("'{sig}' is not a transform tag")));
                }
            };
            let ttype = match layout.precision {
                LutPrecision::Lut8 => TypeSignature::LUT8,
                LutPrecision::Lut16 => TypeSignature::LUT16,
            };
            let tag = p.add_tag_inner(sig, ttype)?;
            let filled = fill_lut(&tag, layout, input_chan, output_chan, input, clut, output);
            if let Err(err) = filled {
                p.delete_tag_quiet(sig)?;
                return Err(err);
            }
            Ok(tag)
        })
    }
}

fn fill_lut(
    tag: &TagRef,
    layout: LutLayout,
    input_chan: usize,
    output_chan: usize,
    input: impl FnMut(usize, f64) -> f64,
    clut: impl FnMut(&[f64], &mut [f64]),
    output: impl FnMut(usize, f64) -> f64,
) -> Result<()> {
    let mut t = borrow_tag_mut(tag)?;
    let lut = t
        .data_mut()
        .as_lut_mut()
        .ok_or_else(|| Error::Internal("Lut tag holds other data".into()))?;
    lut.input_chan = input_chan;
    lut.output_chan = output_chan;
    lut.clut_points = layout.clut_points;
    if layout.precision == LutPrecision::Lut16 {
        lut.input_ent = layout.input_ent;
        lut.output_ent = layout.output_ent;
    }
    t.allocate()?;
    match t.data_mut().as_lut_mut() {
        Some(lut) => lut.set_tables(input, clut, output),
        None => Err(Error::Internal("Lut tag holds other data".into())),
    }
}
