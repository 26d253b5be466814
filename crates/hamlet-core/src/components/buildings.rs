//! Building components: the building catalog, production facilities,
//! regeneration buildings, docks and spawners.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::people::{Job, NeedType};
use super::resources::{Cost, ResourceType};
use crate::progression::Age;

/// Kinds of buildings the settlement can construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingKind {
    Warehouse,
    House,
    Well,
    Canteen,
    Farm,
    Bakery,
    Sawmill,
    Quarry,
    Forge,
    School,
    Dock,
}

/// Which kind of stockpile a building carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageShape {
    /// Settlement storehouse, counted by the ledger
    Shared,
    /// Workshop input buffer
    Private,
}

/// One job-type to output mapping run by a production facility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionRule {
    pub job: Job,
    pub output: ResourceType,
    /// Base seconds per cycle before age and tool bonuses
    pub duration: f32,
    /// Resource and quantity consumed at the start of each cycle
    pub input: Option<(ResourceType, u32)>,
    pub output_quantity: u32,
    /// Each unit produced also equips one tool-less villager
    pub distributes_tool: bool,
}

/// Static description of a building kind
#[derive(Debug, Clone, Copy)]
pub struct BuildingSpec {
    pub name: &'static str,
    pub cost: &'static [(ResourceType, u32)],
    pub unlock_age: Age,
    /// Tech node that must be unlocked before construction
    pub tech: Option<&'static str>,
    /// Footprint radius, also the obstacle radius for steering
    pub radius: f32,
    /// Workers for facilities, occupants for regeneration, passengers for docks
    pub capacity: u32,
    pub job: Job,
    pub rules: &'static [ProductionRule],
    pub storage: Option<StorageShape>,
    pub regenerates: Option<NeedType>,
    /// Crossing time for docks
    pub transit_seconds: Option<f32>,
    /// Villagers housed, drives respawning
    pub housing: u32,
}

const NO_RULES: &[ProductionRule] = &[];

const FARM_RULES: &[ProductionRule] = &[ProductionRule {
    job: Job::Farmer,
    output: ResourceType::Wheat,
    duration: 20.0,
    input: None,
    output_quantity: 1,
    distributes_tool: false,
}];

const BAKERY_RULES: &[ProductionRule] = &[ProductionRule {
    job: Job::Baker,
    output: ResourceType::Bread,
    duration: 30.0,
    input: Some((ResourceType::Wheat, 5)),
    output_quantity: 5,
    distributes_tool: false,
}];

const SAWMILL_RULES: &[ProductionRule] = &[ProductionRule {
    job: Job::Carpenter,
    output: ResourceType::Plank,
    duration: 20.0,
    input: Some((ResourceType::Wood, 2)),
    output_quantity: 2,
    distributes_tool: false,
}];

const QUARRY_RULES: &[ProductionRule] = &[ProductionRule {
    job: Job::Mason,
    output: ResourceType::Stone,
    duration: 15.0,
    input: None,
    output_quantity: 1,
    distributes_tool: false,
}];

const FORGE_RULES: &[ProductionRule] = &[ProductionRule {
    job: Job::Blacksmith,
    output: ResourceType::Tool,
    duration: 60.0,
    input: Some((ResourceType::Plank, 2)),
    output_quantity: 1,
    distributes_tool: true,
}];

const SCHOOL_RULES: &[ProductionRule] = &[ProductionRule {
    job: Job::Scholar,
    output: ResourceType::ResearchPoints,
    duration: 30.0,
    input: None,
    output_quantity: 1,
    distributes_tool: false,
}];

const BASE: BuildingSpec = BuildingSpec {
    name: "",
    cost: &[],
    unlock_age: Age::Stone,
    tech: None,
    radius: 1.5,
    capacity: 0,
    job: Job::None,
    rules: NO_RULES,
    storage: None,
    regenerates: None,
    transit_seconds: None,
    housing: 0,
};

impl BuildingKind {
    pub const ALL: [BuildingKind; 11] = [
        BuildingKind::Warehouse,
        BuildingKind::House,
        BuildingKind::Well,
        BuildingKind::Canteen,
        BuildingKind::Farm,
        BuildingKind::Bakery,
        BuildingKind::Sawmill,
        BuildingKind::Quarry,
        BuildingKind::Forge,
        BuildingKind::School,
        BuildingKind::Dock,
    ];

    pub fn spec(&self) -> BuildingSpec {
        use ResourceType::*;
        match self {
            BuildingKind::Warehouse => BuildingSpec {
                name: "Warehouse",
                cost: &[(Wood, 20)],
                radius: 2.0,
                storage: Some(StorageShape::Shared),
                ..BASE
            },
            BuildingKind::House => BuildingSpec {
                name: "House",
                cost: &[(Wood, 15)],
                capacity: 4,
                regenerates: Some(NeedType::Fatigue),
                housing: 4,
                ..BASE
            },
            BuildingKind::Well => BuildingSpec {
                name: "Well",
                cost: &[(Stone, 10)],
                radius: 1.0,
                capacity: 3,
                regenerates: Some(NeedType::Thirst),
                ..BASE
            },
            BuildingKind::Canteen => BuildingSpec {
                name: "Canteen",
                cost: &[(Wood, 20), (Stone, 5)],
                radius: 2.0,
                capacity: 4,
                regenerates: Some(NeedType::Hunger),
                ..BASE
            },
            BuildingKind::Farm => BuildingSpec {
                name: "Farm",
                cost: &[(Wood, 10)],
                radius: 2.5,
                capacity: 2,
                job: Job::Farmer,
                rules: FARM_RULES,
                ..BASE
            },
            BuildingKind::Bakery => BuildingSpec {
                name: "Bakery",
                cost: &[(Wood, 20), (Stone, 10)],
                capacity: 2,
                job: Job::Baker,
                rules: BAKERY_RULES,
                storage: Some(StorageShape::Private),
                ..BASE
            },
            BuildingKind::Sawmill => BuildingSpec {
                name: "Sawmill",
                cost: &[(Wood, 25)],
                tech: Some("carpentry"),
                capacity: 2,
                job: Job::Carpenter,
                rules: SAWMILL_RULES,
                storage: Some(StorageShape::Private),
                ..BASE
            },
            BuildingKind::Quarry => BuildingSpec {
                name: "Quarry",
                cost: &[(Wood, 15)],
                radius: 2.0,
                capacity: 3,
                job: Job::Mason,
                rules: QUARRY_RULES,
                ..BASE
            },
            BuildingKind::Forge => BuildingSpec {
                name: "Forge",
                cost: &[(Stone, 20), (Plank, 10)],
                unlock_age: Age::Bronze,
                tech: Some("metallurgy"),
                capacity: 1,
                job: Job::Blacksmith,
                rules: FORGE_RULES,
                storage: Some(StorageShape::Private),
                ..BASE
            },
            BuildingKind::School => BuildingSpec {
                name: "School",
                cost: &[(Wood, 20), (Stone, 20)],
                tech: Some("writing"),
                capacity: 2,
                job: Job::Scholar,
                rules: SCHOOL_RULES,
                ..BASE
            },
            BuildingKind::Dock => BuildingSpec {
                name: "Dock",
                cost: &[(Wood, 30)],
                tech: Some("navigation"),
                capacity: 6,
                transit_seconds: Some(20.0),
                ..BASE
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn cost(&self) -> Cost {
        Cost::new(self.spec().cost)
    }
}

/// Building component - attached to every constructed building
#[derive(Debug, Clone)]
pub struct Building {
    pub kind: BuildingKind,
    /// What was paid, used for the demolition refund
    pub cost: Cost,
    pub radius: f32,
}

impl Building {
    pub fn new(kind: BuildingKind) -> Self {
        Self {
            kind,
            cost: kind.cost(),
            radius: kind.spec().radius,
        }
    }
}

/// Production state of one occupant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotState {
    Idle,
    Producing { rule: usize, remaining: f32 },
    /// The rule's input could not be drawn; `waited` counts seconds since
    Blocked { rule: usize, waited: f32 },
}

/// A villager currently working inside a facility
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occupant {
    pub villager: Entity,
    pub slot: SlotState,
}

/// Production facility component - workers, occupants and rules
#[derive(Debug, Clone)]
pub struct ProductionFacility {
    /// Job this facility recruits for
    pub job: Job,
    pub capacity: u32,
    pub rules: Vec<ProductionRule>,
    /// Duration multiplier from the building's age tier
    pub speed_multiplier: f32,
    workers: Vec<Entity>,
    occupants: Vec<Occupant>,
}

impl ProductionFacility {
    pub fn new(job: Job, capacity: u32, rules: &[ProductionRule], speed_multiplier: f32) -> Self {
        Self {
            job,
            capacity,
            rules: rules.to_vec(),
            speed_multiplier,
            workers: Vec::new(),
            occupants: Vec::new(),
        }
    }

    /// Index of the rule run for `job`
    pub fn rule_for(&self, job: Job) -> Option<usize> {
        self.rules.iter().position(|rule| rule.job == job)
    }

    /// Seconds per cycle for a rule, after age and tool bonuses
    pub fn cycle_duration(&self, rule: usize, has_tool: bool) -> f32 {
        let base = self.rules.get(rule).map(|r| r.duration).unwrap_or(0.0);
        let tool_divisor = if has_tool { 2.0 } else { 1.0 };
        base * self.speed_multiplier / tool_divisor
    }

    pub fn workers(&self) -> &[Entity] {
        &self.workers
    }

    pub fn has_opening(&self) -> bool {
        self.job != Job::None && (self.workers.len() as u32) < self.capacity
    }

    pub fn is_worker(&self, villager: Entity) -> bool {
        self.workers.contains(&villager)
    }

    /// Returns false when full or already hired here
    pub fn add_worker(&mut self, villager: Entity) -> bool {
        if !self.has_opening() || self.is_worker(villager) {
            return false;
        }
        self.workers.push(villager);
        true
    }

    pub fn remove_worker(&mut self, villager: Entity) -> bool {
        let before = self.workers.len();
        self.workers.retain(|&w| w != villager);
        self.remove_occupant(villager);
        before != self.workers.len()
    }

    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    pub fn occupant_mut(&mut self, villager: Entity) -> Option<&mut Occupant> {
        self.occupants.iter_mut().find(|o| o.villager == villager)
    }

    pub fn is_occupant(&self, villager: Entity) -> bool {
        self.occupants.iter().any(|o| o.villager == villager)
    }

    pub fn has_room_inside(&self) -> bool {
        (self.occupants.len() as u32) < self.capacity
    }

    pub fn add_occupant(&mut self, villager: Entity, slot: SlotState) -> bool {
        if !self.has_room_inside() || self.is_occupant(villager) {
            return false;
        }
        self.occupants.push(Occupant { villager, slot });
        true
    }

    /// Drops the occupant along with its production timer
    pub fn remove_occupant(&mut self, villager: Entity) -> bool {
        let before = self.occupants.len();
        self.occupants.retain(|o| o.villager != villager);
        before != self.occupants.len()
    }

    /// Release everyone, returning the former workers
    pub fn clear(&mut self) -> Vec<Entity> {
        self.occupants.clear();
        std::mem::take(&mut self.workers)
    }
}

/// Regeneration building component - restores one need for its occupants
#[derive(Debug, Clone)]
pub struct Regenerator {
    pub need: NeedType,
    pub capacity: u32,
    pub occupants: Vec<Entity>,
}

impl Regenerator {
    pub fn new(need: NeedType, capacity: u32) -> Self {
        Self {
            need,
            capacity,
            occupants: Vec::new(),
        }
    }

    pub fn has_room(&self) -> bool {
        (self.occupants.len() as u32) < self.capacity
    }

    pub fn admit(&mut self, villager: Entity) -> bool {
        if !self.has_room() || self.occupants.contains(&villager) {
            return false;
        }
        self.occupants.push(villager);
        true
    }

    pub fn release(&mut self, villager: Entity) -> bool {
        let before = self.occupants.len();
        self.occupants.retain(|&v| v != villager);
        before != self.occupants.len()
    }
}

/// A villager crossing by boat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Passenger {
    pub villager: Entity,
    pub remaining: f32,
}

/// Dock component - ferries villagers to its paired dock
#[derive(Debug, Clone)]
pub struct Port {
    pub transit_seconds: f32,
    pub capacity: u32,
    /// Paired destination dock, re-evaluated every tick
    pub destination: Option<Entity>,
    pub passengers: Vec<Passenger>,
}

impl Port {
    pub fn new(transit_seconds: f32, capacity: u32) -> Self {
        Self {
            transit_seconds,
            capacity,
            destination: None,
            passengers: Vec::new(),
        }
    }

    pub fn has_room(&self) -> bool {
        (self.passengers.len() as u32) < self.capacity
    }

    pub fn remove_passenger(&mut self, villager: Entity) -> bool {
        let before = self.passengers.len();
        self.passengers.retain(|p| p.villager != villager);
        before != self.passengers.len()
    }
}

/// Spawner component - houses bring new villagers while there is room
#[derive(Debug, Clone)]
pub struct Spawner {
    pub housing: u32,
    pub respawn_timer: f32,
}

/// Resource node component - a tree or rock gatherable by hand
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub resource: ResourceType,
}
