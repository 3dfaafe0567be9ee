//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw and evaluated sample rows (`RawSample`, `HysteresisRow`, `HysteresisTable`)
//! - measurement settings and evaluation options
//! - the scalar results record and its saved JSON form

pub mod types;

pub use types::*;
