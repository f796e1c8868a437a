//! Kinda Runtime - sessions, construct dispatch and record/replay
//!
//! Every construct invocation in a transpiled kinda program goes through
//! a [`RuntimeSession`]:
//! - Configuration (personality, chaos level, seed)
//! - Dispatcher (one decision per invocation, strict PRNG order)
//! - Construct semantics and typed helpers
//! - Fuzzy and time-drifting values
//! - Record/replay of decision sequences
//! - Composed constructs
//! - Logging setup

pub mod compose;
pub mod config;
pub mod dispatcher;
pub mod fuzzy;
pub mod output;
pub mod semantics;
pub mod session;
pub mod telemetry;

pub use compose::*;
pub use config::*;
pub use fuzzy::*;
pub use output::*;
pub use session::*;
pub use telemetry::{init_logging, LogFormat};
