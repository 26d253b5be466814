//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod buildings;
mod common;
mod people;
mod resources;

pub use buildings::*;
pub use common::*;
pub use people::*;
pub use resources::*;
