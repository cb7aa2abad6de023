//! Compatibility policy and diagnostics
//!
//! A [`CompatOptions`] value decides which deviations from the ICC format
//! are tolerated. Tolerated deviations are reported as [`Warning`]s, which
//! are collected into [`Diagnostics`], logged through `tracing`, and passed
//! to an optional caller-supplied handler.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::types::VersionRange;
use crate::error::{Direction, Error};

bitflags! {
    /// Compatibility flag set
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CompatFlags: u32 {
        /// Downgrade read format errors to warnings
        const RD_FORMAT_WARN = 0x0001;
        /// Downgrade write format errors to warnings
        const WR_FORMAT_WARN = 0x0002;
        /// Downgrade read version errors to warnings
        const RD_VERSION_WARN = 0x0004;
        /// Downgrade write version errors to warnings
        const WR_VERSION_WARN = 0x0008;
        /// Accept unknown tag signatures and types
        const ALLOW_UNKNOWN = 0x0010;
        /// Accept private extension tags and types
        const ALLOW_EXTENSIONS = 0x0020;
        /// Accept known real-world deviations silently
        const ALLOW_QUIRKS = 0x0040;
        /// Accept writes of items legal somewhere in the configured version range
        const ALLOW_WR_VERSION = 0x0080;
        /// Skip the per-class required tag check on write
        const NO_REQUIRED_CHECK = 0x0100;

        /// Status: a read warning fired
        const RD_WARNING = 0x1000;
        /// Status: a write warning fired
        const WR_WARNING = 0x2000;
    }
}

/// Compatibility configuration of a profile container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatOptions {
    pub flags: CompatFlags,
    /// Versions considered acceptable under [`CompatFlags::ALLOW_WR_VERSION`]
    pub vcrange: VersionRange,
}

impl Default for CompatOptions {
    fn default() -> Self {
        Self::strict()
    }
}

impl CompatOptions {
    /// Every deviation is an error
    pub const fn strict() -> Self {
        Self {
            flags: CompatFlags::empty(),
            vcrange: VersionRange::NONE,
        }
    }

    /// Read anything that can be parsed, warn about the rest
    pub fn lenient() -> Self {
        Self {
            flags: CompatFlags::RD_FORMAT_WARN
                | CompatFlags::RD_VERSION_WARN
                | CompatFlags::ALLOW_UNKNOWN
                | CompatFlags::ALLOW_EXTENSIONS
                | CompatFlags::ALLOW_QUIRKS,
            vcrange: VersionRange::NONE,
        }
    }

    pub fn with_flags(mut self, flags: CompatFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn without_flags(mut self, flags: CompatFlags) -> Self {
        self.flags.remove(flags);
        self
    }

    pub fn with_vcrange(mut self, vcrange: VersionRange) -> Self {
        self.vcrange = vcrange;
        self
    }

    pub const fn has(&self, flag: CompatFlags) -> bool {
        self.flags.contains(flag)
    }
}

/// Category of a tolerated deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    Format,
    Version,
    Quirk,
}

/// A tolerated deviation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Numeric code the deviation would have failed with
    pub code: u32,
    pub kind: WarningKind,
    pub direction: Direction,
    pub message: String,
}

impl Warning {
    pub(crate) fn from_error(kind: WarningKind, err: &Error) -> Self {
        let direction = match err {
            Error::Format { dir, .. } | Error::Version { dir, .. } => *dir,
            _ => Direction::Read,
        };
        Self {
            code: err.code(),
            kind,
            direction,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} warning 0x{:x}: {}", self.direction, self.code, self.message)
    }
}

/// Warnings collected during one read or write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn read_warning(&self) -> bool {
        self.warnings.iter().any(|w| w.direction == Direction::Read)
    }

    pub fn write_warning(&self) -> bool {
        self.warnings.iter().any(|w| w.direction == Direction::Write)
    }

    /// Status bits ([`CompatFlags::RD_WARNING`], [`CompatFlags::WR_WARNING`])
    pub fn status(&self) -> CompatFlags {
        let mut flags = CompatFlags::empty();
        if self.read_warning() {
            flags |= CompatFlags::RD_WARNING;
        }
        if self.write_warning() {
            flags |= CompatFlags::WR_WARNING;
        }
        flags
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }
}

/// Caller hook invoked for every warning
pub type WarningHandler = Box<dyn FnMut(&Warning)>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatCode;

    #[test]
    fn test_flags() {
        let mut f = CompatFlags::RD_FORMAT_WARN | CompatFlags::ALLOW_UNKNOWN;
        assert!(f.contains(CompatFlags::ALLOW_UNKNOWN));
        assert!(!f.contains(CompatFlags::WR_FORMAT_WARN));
        f.remove(CompatFlags::ALLOW_UNKNOWN);
        assert_eq!(f, CompatFlags::RD_FORMAT_WARN);
        let both = CompatFlags::RD_FORMAT_WARN | CompatFlags::NO_REQUIRED_CHECK;
        assert_eq!(CompatFlags::from_bits(0x0101), Some(both));
        assert_eq!(CompatFlags::from_bits(0x8000), None);
    }

    #[test]
    fn test_default_is_strict() {
        let o = CompatOptions::default();
        assert_eq!(o.flags, CompatFlags::empty());
        assert!(CompatOptions::lenient().has(CompatFlags::RD_FORMAT_WARN));
        assert!(!CompatOptions::lenient().has(CompatFlags::WR_FORMAT_WARN));
    }

    #[test]
    fn test_diagnostics_status() {
        let mut d = Diagnostics::default();
        assert_eq!(d.status(), CompatFlags::empty());
        let err = Error::format(Direction::Write, FormatCode::PHCOL, "bad");
        d.push(Warning::from_error(WarningKind::Format, &err));
        assert!(d.write_warning());
        assert!(!d.read_warning());
        assert_eq!(d.status(), CompatFlags::WR_WARNING);
        assert_eq!(d.warnings[0].code, 0x30c);
    }
}
