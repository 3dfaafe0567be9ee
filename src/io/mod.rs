//! Input/output helpers.
//!
//! - trace / data CSV ingest (`ingest`)
//! - lab settings files (`settings`)
//! - data, results and run-bundle exports (`export`)
//! - results JSON read/write (`results`)

pub mod export;
pub mod ingest;
pub mod results;
pub mod settings;

pub use export::*;
pub use ingest::*;
pub use results::*;
pub use settings::*;
