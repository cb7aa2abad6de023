//! # icc-tests
//!
//! Integration testing framework for oxicc.
//!
//! This crate provides:
//! - Deterministic builders for complete display and input profiles
//! - A seeded random profile generator for round-trip coverage
//! - Byte-level helpers for inspecting and corrupting serialized profiles
//!
//! ## Test Categories
//!
//! 1. **Round trip**: write, read back, write again, compare bytes
//! 2. **Checksums**: MD5 vectors and profile ID behavior
//! 3. **Bounds**: truncated and corrupted input never panics
//! 4. **Tag lifecycle**: linking, deletion and heap accounting
//! 5. **Versions**: tag and type version ranges, compatibility flags
//! 6. **Scenarios**: building real profile classes end to end
//! 7. **Options**: configuration and diagnostics serialization

pub mod builders;
pub mod random;

pub use builders::{display_rgb, gray_display, read_at, read_vec, write_embedded, write_vec};
pub use random::ProfileGen;
