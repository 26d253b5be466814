//! Hamlet Core - Settlement Simulation Engine
//!
//! An ECS-based simulation of a small settlement: villagers gather raw
//! resources, take jobs in production buildings, haul goods between
//! storage and workshops, and keep their needs up or die. A tech tree and
//! a sequence of ages gate which buildings can be raised.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Villagers, buildings, resource nodes
//! - **Components**: Pure data attached to entities (Position, Needs, Inventory, etc.)
//! - **Systems**: Logic that queries and updates components
//!
//! Settlement-wide services (ledger, job board, node claims, tech tree,
//! event queue) are owned by [`engine::SimulationEngine`] and passed to the
//! systems that need them.
//!
//! # Example
//!
//! ```rust,no_run
//! use hamlet_core::prelude::*;
//! use hamlet_core::generation::SettlementConfig;
//!
//! let mut engine = SimulationEngine::new();
//!
//! // Generate the starting settlement
//! engine.generate(SettlementConfig::default());
//!
//! // Run simulation
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//!     for event in engine.drain_events() {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod progression;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::engine::{SimulationEngine, StorageInfo, VillagerInfo};
    pub use crate::error::SimError;
    pub use crate::progression::{Age, TechTree};
    pub use crate::systems::{LedgerSnapshot, RefundReport, SimEvent};
}
