//! Kinda Core - Fundamental types of the probabilistic runtime
//!
//! This crate defines the vocabulary shared by every other kinda crate:
//! - Identifiers (CallSiteId, sub-stream seeds)
//! - Constructs, their argument shapes and outcomes
//! - Personality profiles and the registry that validates them
//! - Chaos levels, the effective-probability formula and instability
//! - Decisions, the unit of record and replay

pub mod chaos;
pub mod construct;
pub mod decision;
pub mod error;
pub mod id;
pub mod personality;

pub use chaos::*;
pub use construct::*;
pub use decision::*;
pub use error::*;
pub use id::*;
pub use personality::*;
