//! # oxicc - ICC profile container
//!
//! Read, validate, edit and write ICC color profiles, v2 through v4.4.
//!
//! ## Goals
//!
//! - **Safe**: every byte range is bounds checked, every allocation is
//!   charged to a [`alloc::Heap`] that can refuse it
//! - **Faithful**: profiles read under lenient options write back unchanged
//! - **Governed**: tag, type and class rules per profile version, with
//!   configurable tolerance ([`icc::CompatOptions`])
//!
//! Color transforms are out of scope; the container only builds and
//! serves the tags a color engine consumes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use oxicc_core::icc::{CompatOptions, Profile};
//! use oxicc_core::stream::{FileStream, MemStream};
//!
//! # fn main() -> oxicc_core::Result<()> {
//! let mut profile = Profile::new().with_options(CompatOptions::lenient());
//! let warnings = profile.read(FileStream::open("printer.icc")?.shared(), 0)?;
//! for w in &warnings.warnings {
//!     eprintln!("{w}");
//! }
//! profile.read_all_tags()?;
//!
//! let mut out = MemStream::new();
//! profile.write(&mut out, 0)?;
//! # Ok(())
//! # }
//! ```

pub mod alloc;
pub mod checksum;
pub mod error;
pub mod icc;
pub mod math;
pub mod stream;

pub use error::{Error, ErrorContext, Result};
pub use icc::{CompatFlags, CompatOptions, Diagnostics, Profile, TagSignature, TypeSignature};

/// Version of oxicc
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
