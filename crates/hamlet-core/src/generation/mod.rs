//! Generation - procedural creation of the starting settlement and names

mod names;
mod settlement;

pub use names::*;
pub use settlement::*;
