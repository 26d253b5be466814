//! Error types for the settlement simulation.
//!
//! Nothing here is fatal: storage and ledger operations report amounts
//! instead of failing, and the engine's commands return [`SimError`] so the
//! shell can show a reason and try again later.

use crate::components::ResourceType;
use crate::progression::Age;

/// Errors surfaced by simulation commands.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// A building, inventory or storage site has no room left.
    #[error("{what} is at capacity")]
    CapacityExceeded {
        /// What was full.
        what: String,
    },

    /// A spend precondition failed.
    #[error("not enough {resource}: need {required}, have {available}")]
    InsufficientResources {
        /// The first resource found short.
        resource: ResourceType,
        /// Amount requested.
        required: u32,
        /// Amount held across the settlement.
        available: u32,
    },

    /// Hiring or admitting a villager that cannot take the slot.
    #[error("invalid assignment: {reason}")]
    InvalidAssignment {
        /// Why the assignment was refused.
        reason: String,
    },

    /// No reachable node, storage site or facility.
    #[error("no valid target")]
    NoValidTarget,

    /// The tech tree loops back on itself through this node.
    #[error("cyclic prerequisite through '{0}'")]
    CyclicPrerequisite(String),

    /// The building's age or tech requirement is not met.
    #[error("{building} is locked: requires {requirement}")]
    BuildingLocked {
        /// Display name of the building.
        building: &'static str,
        /// Missing age or tech, human readable.
        requirement: String,
    },

    /// The entity handle no longer refers to a live entity of the right kind.
    #[error("unknown entity")]
    UnknownEntity,

    /// No building kind with this name.
    #[error("unknown building '{0}'")]
    UnknownBuilding(String),

    /// No resource with this name.
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// No tech node with this id.
    #[error("unknown tech '{0}'")]
    UnknownTech(String),

    /// A prerequisite is still locked.
    #[error("tech '{tech}' requires '{missing}'")]
    TechLocked {
        /// The tech being unlocked.
        tech: String,
        /// The first locked prerequisite.
        missing: String,
    },

    /// The tech is already unlocked.
    #[error("tech '{0}' is already unlocked")]
    AlreadyUnlocked(String),

    /// There is no age after this one.
    #[error("already in the final age ({0:?})")]
    FinalAge(Age),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse config JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        #[from]
        source: serde_json::Error,
    },

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
