//! Kinda Test - Statistical assertions and scenario testing
//!
//! This crate provides:
//! - Statistical assertions over probabilistic predicates
//! - Normal-approximation statistics
//! - Calibration of the assertion engine
//! - Session-isolated and parallel trial runners
//! - Scenario harness (determinism, replay fidelity, log integrity)

pub mod assertion;
pub mod calibration;
pub mod harness;
pub mod runner;
pub mod stats;

pub use assertion::*;
pub use calibration::*;
pub use harness::*;
pub use runner::*;
