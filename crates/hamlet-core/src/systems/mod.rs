//! Systems - logic that operates on components

mod behavior;
mod claims;
mod construction;
mod events;
mod jobs;
mod ledger;
mod movement;
mod needs;
mod ports;
mod production;
mod spawning;
mod wandering;

pub use behavior::*;
pub use claims::*;
pub use construction::*;
pub use events::*;
pub use jobs::*;
pub use ledger::*;
pub use movement::*;
pub use needs::*;
pub use ports::*;
pub use production::*;
pub use spawning::*;
pub use wandering::*;
