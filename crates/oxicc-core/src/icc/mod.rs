//! ICC Profile Container
//!
//! Native reading, validation, editing and writing of ICC profiles
//! according to ICC.1:2022 (v4.4) and ICC.1:2001-04 (v2).
//!
//! # Structure
//!
//! An ICC profile consists of:
//! 1. A 128-byte header
//! 2. A tag table listing all tags
//! 3. Tag data (entries may share data)
//!
//! Every tag payload describes its layout once through [`tag::TagBody`];
//! the same description sizes, allocates, reads and writes it.
//!
//! # Example
//!
//! ```no_run
//! use oxicc_core::icc::{Profile, TagSignature};
//! use oxicc_core::stream::FileStream;
//!
//! # fn main() -> oxicc_core::Result<()> {
//! let mut profile = Profile::new();
//! profile.read(FileStream::open("display.icc")?.shared(), 0)?;
//! let white = profile.read_tag(TagSignature::MEDIA_WHITE)?;
//! println!("{:?}", white.borrow().data().as_xyz());
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod compat;
pub mod header;
pub mod tables;
pub mod tag;
pub mod tags;
pub mod types;

mod profile;
mod xforms;

pub use compat::{CompatFlags, CompatOptions, Diagnostics, Warning, WarningHandler, WarningKind};
pub use header::{ColorSpace, IccHeader, ProfileClass, ProfileVersion, RenderingIntent};
pub use profile::{IdStatus, Profile, TagEntry, TagLookup};
pub use tables::LutClass;
pub use tag::{Tag, TagRef};
pub use tags::TagData;
pub use types::{
    D50, DateTimeNumber, TagSignature, Tv, TypeSignature, VersionRange, XyzNumber, tv_to_string,
};
pub use xforms::LutLayout;
