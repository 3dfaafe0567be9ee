//! Mathematical utilities: nearest-neighbour selection, integration, statistics.

pub mod integrate;
pub mod nearest;
pub mod stats;

pub use integrate::*;
pub use nearest::*;
pub use stats::*;
