//! Error types for oxicc
//!
//! Every failure carries a numeric code compatible with the classic ICC
//! library error numbering (see [`Error::code`]). Format and version errors
//! are split by direction (read or write) and carry a sub-code identifying
//! the offending field.

use std::fmt;

use thiserror::Error;

/// Result type for oxicc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Direction of a serialization operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Which stream primitive failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Open,
    Seek,
    Read,
    Write,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Seek => f.write_str("seek"),
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Sub-code of a format error or warning.
///
/// Codes at or above [`FormatCode::RANGE`] are always fatal, regardless of
/// the warning flags in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FormatCode(pub u8);

impl FormatCode {
    pub const SIG2TYPE: Self = Self(0x03);
    pub const MAJV: Self = Self(0x05);
    pub const MINV: Self = Self(0x06);
    pub const BFV: Self = Self(0x07);
    pub const SCREEN: Self = Self(0x08);
    pub const DEVICE: Self = Self(0x09);
    pub const PROFFLGS: Self = Self(0x0a);
    pub const ASCBIN: Self = Self(0x0b);
    pub const PHCOL: Self = Self(0x0c);
    pub const GAMMA: Self = Self(0x0d);
    pub const TECH: Self = Self(0x0e);
    pub const COLSP: Self = Self(0x0f);
    pub const PROF: Self = Self(0x10);
    pub const PLAT: Self = Self(0x11);
    pub const RMGAM: Self = Self(0x12);
    pub const MESGEOM: Self = Self(0x13);
    pub const INTENT: Self = Self(0x14);
    pub const SPSHAPE: Self = Self(0x15);
    pub const STOBS: Self = Self(0x16);
    pub const PRILL: Self = Self(0x17);
    pub const LANG: Self = Self(0x18);
    pub const REGION: Self = Self(0x19);
    pub const MSDEVID: Self = Self(0x1a);
    pub const MSMETYP: Self = Self(0x1b);
    pub const MSHALFTN: Self = Self(0x1c);
    pub const RESCVUNITS: Self = Self(0x1d);
    pub const COLPHOS: Self = Self(0x1e);
    pub const PARCVTYP: Self = Self(0x1f);
    pub const DATETIME: Self = Self(0x20);
    pub const FZ8STRING: Self = Self(0x21);
    pub const VZ8STRING: Self = Self(0x22);
    pub const PARTIALEL: Self = Self(0x23);
    pub const SHORTTAG: Self = Self(0x24);
    pub const CHRMCHAN: Self = Self(0x30);
    pub const CHRMENC: Self = Self(0x31);
    pub const CHRMVALS: Self = Self(0x33);
    pub const CORDCHAN: Self = Self(0x34);
    pub const CORDVALS: Self = Self(0x35);
    pub const DSSIZE: Self = Self(0x36);
    pub const LUICHAN: Self = Self(0x37);
    pub const LUOCHAN: Self = Self(0x38);
    pub const DATA_FLAG: Self = Self(0x39);
    pub const DATA_TERM: Self = Self(0x3a);
    pub const TEXT_ANOTTERM: Self = Self(0x3b);
    pub const TEXT_ASHORT: Self = Self(0x3c);
    pub const TEXT_UERR: Self = Self(0x3d);
    pub const TEXT_SCRTERM: Self = Self(0x3f);
    pub const MATRIX_SCALE: Self = Self(0x40);
    pub const REQUIRED_TAG: Self = Self(0x41);
    pub const UNEXPECTED_TAG: Self = Self(0x42);
    pub const UNKNOWN_CLASS: Self = Self(0x43);
    pub const TAG_OVERLAP: Self = Self(0x44);

    /// Value out of the encodable range
    pub const RANGE: Self = Self(0x60);
    /// Grid dimensions overflow the addressable table size
    pub const CLUT_OVERFLOW: Self = Self(0x61);
    /// Curve style inconsistent with its point count
    pub const CURVE: Self = Self(0x62);
    /// Unsupported table entry width
    pub const LUT_WIDTH: Self = Self(0x63);

    /// Whether this sub-code ignores the warning flags
    pub const fn is_always_fatal(self) -> bool {
        self.0 >= Self::RANGE.0
    }
}

/// Sub-code of a version error or warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct VersionCode(pub u8);

impl VersionCode {
    /// Tag signature not legal in this profile version
    pub const SIGVERS: Self = Self(0x01);
    /// Tag type not legal in this profile version
    pub const TYPEVERS: Self = Self(0x02);
    /// Tag signature/type combination not legal in this profile version
    pub const SIG2TYPEVERS: Self = Self(0x03);
}

/// Errors that can occur in oxicc operations
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The heap refused or could not satisfy an allocation
    #[error("Allocation of {bytes} bytes failed")]
    Alloc { bytes: usize },

    /// A stream primitive failed
    #[error("I/O {op} failed: {message}")]
    Io { op: IoOp, message: String },

    /// A read or write ran past the end of the available data
    #[error("Buffer bound exceeded: {0}")]
    BufferBound(String),

    /// Text could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Tag, type or table entry not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tag already present
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Internal inconsistency, such as a count that disagrees with its storage
    #[error("Internal error: {0}")]
    Internal(String),

    /// Color space is not appropriate for the operation
    #[error("Unsuitable color space: {0}")]
    BadColorSpace(String),

    /// Curve creation failed
    #[error("Bad curve: {0}")]
    BadCurve(String),

    /// Profile class is not appropriate for the operation
    #[error("Profile class mismatch: {0}")]
    ClassMismatch(String),

    /// Structural violation of the ICC format
    #[error("Format error ({dir}, 0x{:02x}): {message}", .sub.0)]
    Format {
        dir: Direction,
        sub: FormatCode,
        message: String,
    },

    /// Item not legal in the profile version
    #[error("Version error ({dir}, 0x{:02x}): {message}", .sub.0)]
    Version {
        dir: Direction,
        sub: VersionCode,
        message: String,
    },

    /// Header magic number is not 'acsp'
    #[error("Bad magic number 0x{0:08x}")]
    MagicNumber(u32),

    /// Header major version out of the supported range
    #[error("Unsupported header version {0}")]
    HeaderVersion(u8),

    /// Stream too short for the header and tag table
    #[error("Header length error: {0}")]
    HeaderLength(String),

    /// Version number that cannot be represented
    #[error("Unknown version {0}")]
    UnknownVersion(u32),

    /// Colorant encoding not known
    #[error("Unknown colorant: {0}")]
    UnknownColorant(String),
}

impl Error {
    /// Numeric error code
    pub fn code(&self) -> u32 {
        match self {
            Self::Alloc { .. } => 0x001,
            Self::Io { op, .. } => match op {
                IoOp::Open => 0x101,
                IoOp::Seek => 0x102,
                IoOp::Read => 0x103,
                IoOp::Write => 0x104,
            },
            Self::BufferBound(_) => 0x105,
            Self::Encoding(_) => 0x106,
            Self::NotFound(_) => 0x107,
            Self::Duplicate(_) => 0x108,
            Self::Internal(_) => 0x109,
            Self::BadColorSpace(_) => 0x10a,
            Self::BadCurve(_) => 0x10b,
            Self::ClassMismatch(_) => 0x10c,
            Self::Format { dir, sub, .. } => match dir {
                Direction::Read => 0x200 | sub.0 as u32,
                Direction::Write => 0x300 | sub.0 as u32,
            },
            Self::Version { dir, sub, .. } => match dir {
                Direction::Read => 0x400 | sub.0 as u32,
                Direction::Write => 0x500 | sub.0 as u32,
            },
            Self::MagicNumber(_) => 0x601,
            Self::HeaderVersion(_) => 0x602,
            Self::HeaderLength(_) => 0x603,
            Self::UnknownVersion(_) => 0x604,
            Self::UnknownColorant(_) => 0x605,
        }
    }

    pub(crate) fn io(op: IoOp, err: impl fmt::Display) -> Self {
        Self::Io {
            op,
            message: err.to_string(),
        }
    }

    pub(crate) fn format(dir: Direction, sub: FormatCode, message: impl Into<String>) -> Self {
        Self::Format {
            dir,
            sub,
            message: message.into(),
        }
    }
}

/// Sticky error record.
///
/// The first error recorded stays until [`ErrorContext::clear`]; operations
/// that consult [`ErrorContext::ensure_clear`] refuse to run while it is set.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    error: Option<Error>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` unless an earlier error is pending, and return it for propagation
    pub fn set(&mut self, err: Error) -> Error {
        if self.error.is_none() {
            self.error = Some(err.clone());
        }
        err
    }

    pub fn clear(&mut self) {
        self.error = None;
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Numeric code of the pending error, 0 when clear
    pub fn code(&self) -> u32 {
        self.error.as_ref().map_or(0, Error::code)
    }

    pub fn message(&self) -> String {
        self.error.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    pub fn ensure_clear(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Record the failure carried by `res`, if any
    pub fn track<T>(&mut self, res: Result<T>) -> Result<T> {
        res.map_err(|err| self.set(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Error::Alloc { bytes: 4 }.code(), 0x001);
        assert_eq!(Error::io(IoOp::Seek, "x").code(), 0x102);
        assert_eq!(
            Error::format(Direction::Read, FormatCode::SHORTTAG, "short").code(),
            0x224
        );
        assert_eq!(
            Error::format(Direction::Write, FormatCode::REQUIRED_TAG, "missing").code(),
            0x341
        );
        let e = Error::Version {
            dir: Direction::Write,
            sub: VersionCode::SIG2TYPEVERS,
            message: String::new(),
        };
        assert_eq!(e.code(), 0x503);
        assert_eq!(Error::MagicNumber(0).code(), 0x601);
    }

    #[test]
    fn test_always_fatal() {
        assert!(FormatCode::RANGE.is_always_fatal());
        assert!(FormatCode::LUT_WIDTH.is_always_fatal());
        assert!(!FormatCode::SHORTTAG.is_always_fatal());
        assert!(!FormatCode::TAG_OVERLAP.is_always_fatal());
    }

    #[test]
    fn test_sticky_first_error() {
        let mut ctx = ErrorContext::new();
        assert!(ctx.ensure_clear().is_ok());
        ctx.set(Error::NotFound("a".into()));
        ctx.set(Error::Duplicate("b".into()));
        assert_eq!(ctx.code(), 0x107);
        assert!(ctx.message().contains('a'));
        assert_eq!(ctx.ensure_clear(), Err(Error::NotFound("a".into())));
        ctx.clear();
        assert_eq!(ctx.code(), 0);
        assert!(ctx.message().is_empty());
    }
}
