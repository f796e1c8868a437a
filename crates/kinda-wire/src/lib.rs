//! Kinda Wire - Record log format
//!
//! A record log is a single binary blob:
//! - Fixed header (24 bytes) + personality name
//! - Decision records (34 bytes each)
//! - Digest trailer (8 bytes, truncated SHA-256)
//!
//! All integers are little-endian; probabilities and float outcomes are
//! stored as raw IEEE-754 bits so decoding is bit-exact.

pub mod flags;
pub mod header;
pub mod log;
pub mod record;

pub use flags::*;
pub use header::*;
pub use log::*;
pub use record::*;
