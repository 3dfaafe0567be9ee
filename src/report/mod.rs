//! Reporting utilities: formatted run summaries and batch tables.

pub mod format;

pub use format::*;
