//! ICC Profile Basic Types
//!
//! Signatures, fixed-point encodings and versions as laid out in ICC.1:2022
//! Section 4.

use std::fmt;

/// Render a signature as its four ASCII characters, or hex when unprintable
pub(crate) fn sig_to_string(sig: u32) -> String {
    let bytes = sig.to_be_bytes();
    if bytes.iter().all(|b| (0x20..0x7f).contains(b)) {
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        format!("0x{sig:08x}")
    }
}

/// ICC Tag Signature (4-byte ASCII code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TagSignature(pub u32);

impl TagSignature {
    /// Create from 4 ASCII characters
    pub const fn from_bytes(b: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(b))
    }

    pub const A2B0: Self = Self::from_bytes(*b"A2B0");
    pub const A2B1: Self = Self::from_bytes(*b"A2B1");
    pub const A2B2: Self = Self::from_bytes(*b"A2B2");
    pub const B2A0: Self = Self::from_bytes(*b"B2A0");
    pub const B2A1: Self = Self::from_bytes(*b"B2A1");
    pub const B2A2: Self = Self::from_bytes(*b"B2A2");
    pub const BLUE_COLORANT: Self = Self::from_bytes(*b"bXYZ");
    pub const BLUE_TRC: Self = Self::from_bytes(*b"bTRC");
    pub const CALIBRATION_DATE_TIME: Self = Self::from_bytes(*b"calt");
    pub const CHAR_TARGET: Self = Self::from_bytes(*b"targ");
    pub const CHAD: Self = Self::from_bytes(*b"chad");
    pub const CHROMATICITY: Self = Self::from_bytes(*b"chrm");
    pub const CICP: Self = Self::from_bytes(*b"cicp");
    pub const COLORANT_ORDER: Self = Self::from_bytes(*b"clro");
    pub const COLORANT_TABLE: Self = Self::from_bytes(*b"clrt");
    pub const COLORANT_TABLE_OUT: Self = Self::from_bytes(*b"clot");
    pub const COLORIMETRIC_INTENT_IMAGE_STATE: Self = Self::from_bytes(*b"ciis");
    pub const COPYRIGHT: Self = Self::from_bytes(*b"cprt");
    pub const CRD_INFO: Self = Self::from_bytes(*b"crdi");
    pub const DEVICE_MFG_DESC: Self = Self::from_bytes(*b"dmnd");
    pub const DEVICE_MODEL_DESC: Self = Self::from_bytes(*b"dmdd");
    pub const DEVICE_SETTINGS: Self = Self::from_bytes(*b"devs");
    pub const GAMUT: Self = Self::from_bytes(*b"gamt");
    pub const GRAY_TRC: Self = Self::from_bytes(*b"kTRC");
    pub const GREEN_COLORANT: Self = Self::from_bytes(*b"gXYZ");
    pub const GREEN_TRC: Self = Self::from_bytes(*b"gTRC");
    pub const LUMINANCE: Self = Self::from_bytes(*b"lumi");
    pub const MEASUREMENT: Self = Self::from_bytes(*b"meas");
    pub const MEDIA_BLACK: Self = Self::from_bytes(*b"bkpt");
    pub const MEDIA_WHITE: Self = Self::from_bytes(*b"wtpt");
    pub const NAMED_COLOR2: Self = Self::from_bytes(*b"ncl2");
    pub const PREVIEW0: Self = Self::from_bytes(*b"pre0");
    pub const PREVIEW1: Self = Self::from_bytes(*b"pre1");
    pub const PREVIEW2: Self = Self::from_bytes(*b"pre2");
    pub const PROFILE_DESC: Self = Self::from_bytes(*b"desc");
    pub const PROFILE_SEQUENCE_DESC: Self = Self::from_bytes(*b"pseq");
    pub const PS2_CRD0: Self = Self::from_bytes(*b"psd0");
    pub const PS2_CRD1: Self = Self::from_bytes(*b"psd1");
    pub const PS2_CRD2: Self = Self::from_bytes(*b"psd2");
    pub const PS2_CRD3: Self = Self::from_bytes(*b"psd3");
    pub const PS2_CSA: Self = Self::from_bytes(*b"ps2s");
    pub const PS2_RENDERING_INTENT: Self = Self::from_bytes(*b"ps2i");
    pub const RED_COLORANT: Self = Self::from_bytes(*b"rXYZ");
    pub const RED_TRC: Self = Self::from_bytes(*b"rTRC");
    pub const SCREENING_DESC: Self = Self::from_bytes(*b"scrd");
    pub const SCREENING: Self = Self::from_bytes(*b"scrn");
    pub const TECHNOLOGY: Self = Self::from_bytes(*b"tech");
    pub const UCR_BG: Self = Self::from_bytes(*b"bfd ");
    pub const VIDEO_CARD_GAMMA: Self = Self::from_bytes(*b"vcgt");
    pub const VIEW_COND_DESC: Self = Self::from_bytes(*b"vued");
    pub const VIEW_COND: Self = Self::from_bytes(*b"view");
    /// Absolute-to-media-relative transform (private extension)
    pub const ABS_TO_REL_TRANS: Self = Self::from_bytes(*b"arts");
}

impl fmt::Display for TagSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&sig_to_string(self.0))
    }
}

/// Type signatures for ICC tag data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TypeSignature(pub u32);

impl TypeSignature {
    pub const fn from_bytes(b: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(b))
    }

    /// Placeholder for tags whose stored type is not understood
    pub const UNKNOWN: Self = Self(0);

    pub const CHROMATICITY: Self = Self::from_bytes(*b"chrm");
    pub const CICP: Self = Self::from_bytes(*b"cicp");
    pub const COLORANT_ORDER: Self = Self::from_bytes(*b"clro");
    pub const COLORANT_TABLE: Self = Self::from_bytes(*b"clrt");
    pub const CRD_INFO: Self = Self::from_bytes(*b"crdi");
    pub const CURVE: Self = Self::from_bytes(*b"curv");
    pub const DATA: Self = Self::from_bytes(*b"data");
    pub const DATE_TIME: Self = Self::from_bytes(*b"dtim");
    pub const DEVICE_SETTINGS: Self = Self::from_bytes(*b"devs");
    pub const LUT8: Self = Self::from_bytes(*b"mft1");
    pub const LUT16: Self = Self::from_bytes(*b"mft2");
    pub const MEASUREMENT: Self = Self::from_bytes(*b"meas");
    pub const MLUC: Self = Self::from_bytes(*b"mluc");
    pub const NAMED_COLOR2: Self = Self::from_bytes(*b"ncl2");
    pub const PARA: Self = Self::from_bytes(*b"para");
    pub const PROFILE_SEQUENCE_DESC: Self = Self::from_bytes(*b"pseq");
    pub const S15F16_ARRAY: Self = Self::from_bytes(*b"sf32");
    pub const SCREENING: Self = Self::from_bytes(*b"scrn");
    pub const SIGNATURE: Self = Self::from_bytes(*b"sig ");
    pub const TEXT: Self = Self::from_bytes(*b"text");
    pub const DESC: Self = Self::from_bytes(*b"desc");
    pub const U16F16_ARRAY: Self = Self::from_bytes(*b"uf32");
    pub const UCR_BG: Self = Self::from_bytes(*b"bfd ");
    pub const UINT16_ARRAY: Self = Self::from_bytes(*b"ui16");
    pub const UINT32_ARRAY: Self = Self::from_bytes(*b"ui32");
    pub const UINT64_ARRAY: Self = Self::from_bytes(*b"ui64");
    pub const UINT8_ARRAY: Self = Self::from_bytes(*b"ui08");
    pub const VIDEO_CARD_GAMMA: Self = Self::from_bytes(*b"vcgt");
    pub const VIEWING_CONDITIONS: Self = Self::from_bytes(*b"view");
    pub const XYZ: Self = Self::from_bytes(*b"XYZ ");
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::UNKNOWN {
            f.write_str("Unknown")
        } else {
            f.write_str(&sig_to_string(self.0))
        }
    }
}

/// Profile version number: `major * 10000 + minor * 100 + bugfix`
pub type Tv = u32;

pub const TV_20: Tv = 20000;
pub const TV_21: Tv = 20100;
pub const TV_22: Tv = 20200;
pub const TV_23: Tv = 20300;
pub const TV_24: Tv = 20400;
pub const TV_40: Tv = 40000;
pub const TV_41: Tv = 40100;
pub const TV_42: Tv = 40200;
pub const TV_43: Tv = 40300;
pub const TV_44: Tv = 40400;
pub const TV_MIN: Tv = 0;
pub const TV_MAX: Tv = 999_999;
/// Version new profiles start out with
pub const TV_DEFAULT: Tv = TV_22;

/// Last version of the v2/v3 family
pub(crate) const TV_2X_LAST: Tv = 39_999;

/// Inclusive range of profile versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct VersionRange {
    pub min: Tv,
    pub max: Tv,
}

impl VersionRange {
    pub const ALL: Self = Self {
        min: TV_MIN,
        max: TV_MAX,
    };
    /// Empty range
    pub const NONE: Self = Self {
        min: TV_MAX,
        max: TV_MIN,
    };

    pub const fn new(min: Tv, max: Tv) -> Self {
        Self { min, max }
    }

    pub const fn contains(&self, tv: Tv) -> bool {
        self.min <= tv && tv <= self.max
    }

    pub const fn overlaps(&self, other: &Self) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    pub const fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::NONE
    }
}

/// Format a version number as `major.minor.bugfix`
pub fn tv_to_string(tv: Tv) -> String {
    format!("{}.{}.{}", tv / 10000, (tv / 100) % 100, tv % 100)
}

/// XYZNumber, held as floating point
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XyzNumber {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl XyzNumber {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.z - other.z).abs() <= epsilon
    }
}

/// D50 PCS illuminant, exactly as encoded in s15Fixed16 (0xf6d6, 0x10000, 0xd32d)
pub const D50: XyzNumber = XyzNumber::new(0.964202880859375, 1.0, 0.8249053955078125);

/// dateTimeNumber - ICC date/time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTimeNumber {
    pub year: u16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

impl DateTimeNumber {
    /// Whether each field lies in its calendar range
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour <= 23
            && self.minute <= 59
            && self.second <= 59
    }

    /// Current UTC time
    pub fn now() -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::from_unix(secs)
    }

    /// Convert seconds since the Unix epoch (UTC)
    pub fn from_unix(secs: u64) -> Self {
        let days = (secs / 86_400) as i64;
        let rem = secs % 86_400;
        // Civil-from-days, proleptic Gregorian calendar
        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z - era * 146_097;
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + i64::from(month <= 2);
        Self {
            year: year as u16,
            month: month as u16,
            day: day as u16,
            hour: (rem / 3600) as u16,
            minute: ((rem / 60) % 60) as u16,
            second: (rem % 60) as u16,
        }
    }
}

impl fmt::Display for DateTimeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
