//! Hysteresis evaluation.
//!
//! Responsibilities:
//!
//! - individual reduction steps as pure column transforms
//! - orchestration of the full P–E reconstruction
//! - remanence / coercive-field metrics

pub mod metrics;
pub mod reconstruct;
pub mod steps;

pub use metrics::*;
pub use reconstruct::*;
