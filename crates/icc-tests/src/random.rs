//! Seeded random profiles
//!
//! Every profile is a complete RGB display profile in a random version,
//! with random TRC shapes and a random selection of optional tags that are
//! legal in that version.

use anyhow::{Result, anyhow};
use oxicc_core::icc::tags::Chromaticity;
use oxicc_core::icc::types::{TV_22, TV_23, TV_24, TV_40, TV_42, TV_43, Tv};
use oxicc_core::icc::{
    ColorSpace, DateTimeNumber, LutLayout, Profile, ProfileClass, TagSignature, TypeSignature,
    XyzNumber,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::builders::{new_profile, set_copyright, set_description, set_gamma, set_table, set_xyz};

pub const VERSIONS: [Tv; 6] = [TV_22, TV_23, TV_24, TV_40, TV_42, TV_43];

const TECHNOLOGIES: [&[u8; 4]; 5] = [b"CRT ", b"AMD ", b"vidm", b"dcam", b"fscn"];

/// Random profile generator
pub struct ProfileGen {
    rng: ChaCha8Rng,
}

impl ProfileGen {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    fn xyz(&mut self) -> XyzNumber {
        XyzNumber::new(
            self.rng.gen_range(0.0..1.0),
            self.rng.gen_range(0.0..1.0),
            self.rng.gen_range(0.0..1.0),
        )
    }

    fn date(&mut self) -> DateTimeNumber {
        DateTimeNumber {
            year: self.rng.gen_range(1990..2040),
            month: self.rng.gen_range(1..=12),
            day: self.rng.gen_range(1..=28),
            hour: self.rng.gen_range(0..24),
            minute: self.rng.gen_range(0..60),
            second: self.rng.gen_range(0..60),
        }
    }

    fn text(&mut self) -> String {
        let len = self.rng.gen_range(1..40);
        (0..len)
            .map(|_| char::from(self.rng.gen_range(b' '..=b'~')))
            .collect()
    }

    /// Monotone table of `n` entries
    fn table(&mut self, n: usize) -> Vec<f64> {
        let mut steps: Vec<f64> = (0..n).map(|_| self.rng.gen_range(0.0..1.0)).collect();
        let total: f64 = steps.iter().sum::<f64>().max(f64::EPSILON);
        let mut acc = 0.0;
        for v in steps.iter_mut() {
            acc += *v / total;
            *v = acc.min(1.0);
        }
        steps
    }

    fn trc(&mut self, p: &mut Profile, sig: TagSignature) -> Result<()> {
        let choices = if p.version() >= TV_40 { 3 } else { 2 };
        match self.rng.gen_range(0..choices) {
            0 => {
                let gamma = self.rng.gen_range(1.0..3.0);
                set_gamma(p, sig, gamma)?;
            }
            1 => {
                let n = self.rng.gen_range(2..300);
                let table = self.table(n);
                set_table(p, sig, &table)?;
            }
            _ => {
                let tag = p.add_tag(sig, TypeSignature::PARA)?;
                let mut t = tag.borrow_mut();
                let c = t
                    .data_mut()
                    .as_parametric_curve_mut()
                    .ok_or_else(|| anyhow!("not para"))?;
                c.function = self.rng.gen_range(0..=4);
                for v in c.params.iter_mut() {
                    *v = self.rng.gen_range(0.0..2.5);
                }
            }
        }
        Ok(())
    }

    /// Complete RGB display profile with random content
    pub fn profile(&mut self) -> Result<Profile> {
        let version = VERSIONS[self.rng.gen_range(0..VERSIONS.len())];
        let mut p = new_profile(ProfileClass::Display, ColorSpace::Rgb, ColorSpace::Xyz, version)?;
        p.header.creation_date = self.date();
        p.header.manufacturer = self.rng.r#gen();
        p.header.model = self.rng.r#gen();
        p.header.attributes = self.rng.r#gen();

        let desc = self.text();
        set_description(&mut p, TagSignature::PROFILE_DESC, &desc)?;
        let cprt = self.text();
        set_copyright(&mut p, &cprt)?;
        let white = self.xyz();
        set_xyz(&mut p, TagSignature::MEDIA_WHITE, white)?;
        for sig in [
            TagSignature::RED_COLORANT,
            TagSignature::GREEN_COLORANT,
            TagSignature::BLUE_COLORANT,
        ] {
            let v = self.xyz();
            set_xyz(&mut p, sig, v)?;
        }
        self.trc(&mut p, TagSignature::RED_TRC)?;
        for sig in [TagSignature::GREEN_TRC, TagSignature::BLUE_TRC] {
            if self.rng.gen_bool(0.5) {
                p.link_tag(sig, TagSignature::RED_TRC)?;
            } else {
                self.trc(&mut p, sig)?;
            }
        }
        self.extras(&mut p)?;
        Ok(p)
    }

    fn extras(&mut self, p: &mut Profile) -> Result<()> {
        if self.rng.gen_bool(0.5) {
            let v = self.xyz();
            set_xyz(p, TagSignature::LUMINANCE, v)?;
        }
        if self.rng.gen_bool(0.5) {
            let v = self.xyz();
            set_xyz(p, TagSignature::MEDIA_BLACK, v)?;
        }
        if self.rng.gen_bool(0.5) {
            let tag = p.add_tag(TagSignature::CALIBRATION_DATE_TIME, TypeSignature::DATE_TIME)?;
            let date = self.date();
            tag.borrow_mut()
                .data_mut()
                .as_date_time_mut()
                .ok_or_else(|| anyhow!("not dtim"))?
                .value = date;
        }
        if self.rng.gen_bool(0.5) {
            let tag = p.add_tag(TagSignature::TECHNOLOGY, TypeSignature::SIGNATURE)?;
            let tech = TECHNOLOGIES[self.rng.gen_range(0..TECHNOLOGIES.len())];
            tag.borrow_mut()
                .data_mut()
                .as_signature_mut()
                .ok_or_else(|| anyhow!("not sig"))?
                .sig = u32::from_be_bytes(*tech);
        }
        if self.rng.gen_bool(0.5) {
            let tag = p.add_tag(TagSignature::MEASUREMENT, TypeSignature::MEASUREMENT)?;
            let backing = self.xyz();
            let mut t = tag.borrow_mut();
            let m = t
                .data_mut()
                .as_measurement_mut()
                .ok_or_else(|| anyhow!("not meas"))?;
            m.observer = self.rng.gen_range(0..=2);
            m.backing = backing;
            m.geometry = self.rng.gen_range(0..=2);
            m.flare = self.rng.gen_range(0.0..1.0);
            m.illuminant = self.rng.gen_range(0..=8);
        }
        if self.rng.gen_bool(0.5) {
            let tag = p.add_tag(TagSignature::CHAR_TARGET, TypeSignature::TEXT)?;
            let text = self.text();
            tag.borrow_mut()
                .data_mut()
                .as_text_mut()
                .ok_or_else(|| anyhow!("not text"))?
                .text = text;
        }
        if self.rng.gen_bool(0.5) {
            let text = self.text();
            set_description(p, TagSignature::DEVICE_MFG_DESC, &text)?;
        }
        if p.version() >= TV_23 && self.rng.gen_bool(0.5) {
            let tag = p.add_tag(TagSignature::CHROMATICITY, TypeSignature::CHROMATICITY)?;
            let mut t = tag.borrow_mut();
            t.data_mut()
                .as_chromaticity_mut()
                .ok_or_else(|| anyhow!("not chrm"))?
                .channels = 3;
            t.allocate()?;
            let c = t
                .data_mut()
                .as_chromaticity_mut()
                .ok_or_else(|| anyhow!("not chrm"))?;
            c.encoding = Chromaticity::ITU_R_BT709;
            let standard = Chromaticity::standard(Chromaticity::ITU_R_BT709)
                .ok_or_else(|| anyhow!("no BT.709 primaries"))?;
            c.data.copy_from_slice(&standard);
        }
        if self.rng.gen_bool(0.3) {
            let points = self.rng.gen_range(2..6);
            let entries = self.rng.gen_range(2..32);
            let k: f64 = self.rng.gen_range(0.5..1.5);
            let layout = if self.rng.gen_bool(0.5) {
                LutLayout::lut8(points)
            } else {
                LutLayout::lut16(points, entries, entries)
            };
            p.create_lut_xforms(
                TagSignature::A2B0,
                layout,
                |_, x| x.powf(k),
                |i, o| {
                    for (dst, src) in o.iter_mut().zip(i) {
                        *dst = src * k;
                    }
                },
                |ch, x| x * (1.0 - ch as f64 * 0.1),
            )?;
        }
        Ok(())
    }

    /// Random embedding offset
    pub fn offset(&mut self) -> usize {
        self.rng.gen_range(1..4096)
    }
}
