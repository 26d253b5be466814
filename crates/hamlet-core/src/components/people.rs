//! Villager components: Villager, Needs, Job, Behavior.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::resources::ResourceType;
use crate::config::NeedsConfig;

/// Upper bound of every need value
pub const NEED_MAX: f32 = 100.0;

/// Villager component - employment and equipment
#[derive(Debug, Clone, Default)]
pub struct Villager {
    pub job: Job,
    /// Facility this villager works for, set together with `job`
    pub workplace: Option<Entity>,
    /// Halves production time
    pub has_tool: bool,
}

impl Villager {
    pub fn is_employed(&self) -> bool {
        self.job != Job::None
    }
}

/// Survival stats - all values 0.0 (dead) to 100.0 (fully satisfied)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Needs {
    pub health: f32,
    pub hunger: f32,
    pub thirst: f32,
    pub fatigue: f32,
}

impl Default for Needs {
    fn default() -> Self {
        Self {
            health: NEED_MAX,
            hunger: NEED_MAX,
            thirst: NEED_MAX,
            fatigue: NEED_MAX,
        }
    }
}

impl Needs {
    pub fn get(&self, need: NeedType) -> f32 {
        match need {
            NeedType::Health => self.health,
            NeedType::Hunger => self.hunger,
            NeedType::Thirst => self.thirst,
            NeedType::Fatigue => self.fatigue,
        }
    }

    fn get_mut(&mut self, need: NeedType) -> &mut f32 {
        match need {
            NeedType::Health => &mut self.health,
            NeedType::Hunger => &mut self.hunger,
            NeedType::Thirst => &mut self.thirst,
            NeedType::Fatigue => &mut self.fatigue,
        }
    }

    /// Apply decay over `seconds`. Paused entirely while inside a regeneration building.
    pub fn decay(&mut self, seconds: f32, rates: &NeedsConfig, regenerating: Option<NeedType>) {
        if regenerating.is_some() {
            return;
        }
        self.hunger = (self.hunger - rates.hunger_decay * seconds).max(0.0);
        self.thirst = (self.thirst - rates.thirst_decay * seconds).max(0.0);
        self.fatigue = (self.fatigue - rates.fatigue_decay * seconds).max(0.0);

        // Health erodes while malnourished or exhausted, recovers otherwise
        if self.most_urgent(rates.interrupt_threshold).is_some() {
            self.health = (self.health - rates.health_decay * seconds).max(0.0);
        } else if self.health > 0.0 {
            self.health = (self.health + rates.health_recovery * seconds).min(NEED_MAX);
        }
    }

    /// Raise a need, clamped to the maximum
    pub fn regenerate(&mut self, need: NeedType, amount: f32) {
        let value = self.get_mut(need);
        *value = (*value + amount).clamp(0.0, NEED_MAX);
    }

    /// Returns the lowest interruptible need strictly below `threshold`
    pub fn most_urgent(&self, threshold: f32) -> Option<NeedType> {
        NeedType::INTERRUPTIBLE
            .iter()
            .map(|&need| (need, self.get(need)))
            .filter(|(_, value)| *value < threshold)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(need, _)| need)
    }

    /// The first need that has run out, if any
    pub fn depleted(&self) -> Option<NeedType> {
        NeedType::ALL
            .iter()
            .copied()
            .find(|&need| self.get(need) <= 0.0)
    }
}

/// Types of needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeedType {
    Health,
    Hunger,
    Thirst,
    Fatigue,
}

impl NeedType {
    pub const ALL: [NeedType; 4] = [
        NeedType::Health,
        NeedType::Hunger,
        NeedType::Thirst,
        NeedType::Fatigue,
    ];

    /// Needs that send a villager to a regeneration building
    pub const INTERRUPTIBLE: [NeedType; 3] = [NeedType::Hunger, NeedType::Thirst, NeedType::Fatigue];
}

/// Production roles a facility can recruit for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Job {
    #[default]
    None,
    Farmer,
    Baker,
    Carpenter,
    Mason,
    Blacksmith,
    Scholar,
}

/// What a trip to a storage site is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errand {
    /// Empty the inventory into the site
    Deposit,
    /// Pick up a workplace input
    Fetch { resource: ResourceType, amount: u32 },
}

/// Per-villager decision state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BehaviorState {
    /// Choosing what to do next
    Normal,
    /// Walking to a claimed resource node
    Gathering { node: Entity },
    /// Standing at a node while the collection timer runs
    AwaitingGatherCompletion { node: Entity, remaining: f32 },
    GoingToStorage { storage: Entity, errand: Errand },
    DepositingResource { storage: Entity },
    /// Employed villager walking to the workplace
    Commuting { workplace: Entity },
    /// Walking to a building that restores `need`
    SeekingNeed { need: NeedType, building: Entity },
    /// Hidden inside a building: working, regenerating or crossing by boat
    Inside { building: Entity },
}

impl BehaviorState {
    pub fn label(&self) -> &'static str {
        match self {
            BehaviorState::Normal => "Normal",
            BehaviorState::Gathering { .. } => "Gathering",
            BehaviorState::AwaitingGatherCompletion { .. } => "AwaitingGatherCompletion",
            BehaviorState::GoingToStorage { .. } => "GoingToStorage",
            BehaviorState::DepositingResource { .. } => "DepositingResource",
            BehaviorState::Commuting { .. } => "Commuting",
            BehaviorState::SeekingNeed { .. } => "SeekingNeed",
            BehaviorState::Inside { .. } => "Inside",
        }
    }
}

/// Behavior component wrapping the state machine
#[derive(Debug, Clone)]
pub struct Behavior {
    pub state: BehaviorState,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            state: BehaviorState::Normal,
        }
    }
}

impl Behavior {
    pub fn is_inside(&self) -> bool {
        matches!(self.state, BehaviorState::Inside { .. })
    }

    /// The resource node this villager currently holds a claim on
    pub fn claimed_node(&self) -> Option<Entity> {
        match self.state {
            BehaviorState::Gathering { node }
            | BehaviorState::AwaitingGatherCompletion { node, .. } => Some(node),
            _ => None,
        }
    }
}
