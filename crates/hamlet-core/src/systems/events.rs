//! Event queue - what happened this tick, for the presentation layer
//!
//! Systems push [`SimEvent`]s as they mutate the world. The shell either
//! drains the queue once per frame or subscribes callbacks that see each
//! event as it is pushed.

use hecs::Entity;

use crate::components::{BuildingKind, Job, NeedType, ResourceType};
use crate::progression::Age;

/// Something observable changed in the settlement
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    VillagerSpawned {
        villager: Entity,
    },
    /// `cause` is the need that ran out
    VillagerDied {
        villager: Entity,
        cause: NeedType,
    },
    WorkerHired {
        villager: Entity,
        facility: Entity,
        job: Job,
    },
    WorkerReleased {
        villager: Entity,
        facility: Entity,
    },
    /// Some stockpile or inventory changed; poll the ledger for totals
    ResourcesChanged,
    PopulationChanged {
        population: u32,
    },
    BuildingConstructed {
        building: Entity,
        kind: BuildingKind,
    },
    BuildingDemolished {
        kind: BuildingKind,
        /// Refund units that found no storage
        lost: u32,
    },
    TechUnlocked {
        id: String,
    },
    AgeAdvanced {
        age: Age,
    },
    ToolDistributed {
        villager: Entity,
    },
    ProductionBlocked {
        facility: Entity,
        villager: Entity,
        missing: ResourceType,
    },
}

type Subscriber = Box<dyn FnMut(&SimEvent) + Send>;

/// Pending events plus observer callbacks
#[derive(Default)]
pub struct EventQueue {
    pending: Vec<SimEvent>,
    subscribers: Vec<Subscriber>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: SimEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
        self.pending.push(event);
    }

    /// Take every event pushed since the last drain
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[SimEvent] {
        &self.pending
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&SimEvent) + Send + 'static) {
        self.subscribers.push(Box::new(callback));
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.pending)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
