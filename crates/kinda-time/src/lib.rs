//! Kinda Time - Clocks and the drift model
//!
//! This crate implements the time side of drift-aware variables:
//! - `Clock`: monotonic time source (system or hand-driven)
//! - `DriftState`: per-variable aging bookkeeping
//! - Deterministic drift as a function of age, use and recency

pub mod clock;
pub mod drift;

pub use clock::*;
pub use drift::*;
