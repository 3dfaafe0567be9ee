//! `hesm` library crate.
//!
//! The binary (`hesm`) is a thin wrapper around this library so that:
//!
//! - the reconstruction is testable without spawning processes
//! - modules are reusable (e.g., acquisition front-ends, notebooks, etc.)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod eval;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod tui;
