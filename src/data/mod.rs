//! Trace sources other than measured files.

pub mod average;
pub mod synthetic;
