//! Resource components: ResourceType, Cost, Inventory, StorageSite.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Every quantity tracked by the settlement.
///
/// Physical resources exist in storage sites and villager inventories.
/// Virtual counters (population, research) only live in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Wood,
    Stone,
    Wheat,
    Bread,
    Plank,
    Tool,
    Population,
    ResearchPoints,
}

impl ResourceType {
    pub const ALL: [ResourceType; 8] = [
        ResourceType::Wood,
        ResourceType::Stone,
        ResourceType::Wheat,
        ResourceType::Bread,
        ResourceType::Plank,
        ResourceType::Tool,
        ResourceType::Population,
        ResourceType::ResearchPoints,
    ];

    pub const PHYSICAL: [ResourceType; 6] = [
        ResourceType::Wood,
        ResourceType::Stone,
        ResourceType::Wheat,
        ResourceType::Bread,
        ResourceType::Plank,
        ResourceType::Tool,
    ];

    pub fn is_virtual(self) -> bool {
        matches!(self, ResourceType::Population | ResourceType::ResearchPoints)
    }

    /// Raw resources are gathered from nodes on the map by unemployed villagers
    pub fn is_raw(self) -> bool {
        matches!(self, ResourceType::Wood | ResourceType::Stone)
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Wood => "Wood",
            ResourceType::Stone => "Stone",
            ResourceType::Wheat => "Wheat",
            ResourceType::Bread => "Bread",
            ResourceType::Plank => "Plank",
            ResourceType::Tool => "Tool",
            ResourceType::Population => "Population",
            ResourceType::ResearchPoints => "ResearchPoints",
        }
    }

    /// Name used by older save files and map data
    pub fn legacy_name(self) -> &'static str {
        match self {
            ResourceType::Wood => "Bois",
            ResourceType::Stone => "Pierre",
            ResourceType::Wheat => "Ble",
            ResourceType::Bread => "Pain",
            ResourceType::Plank => "Planche",
            ResourceType::Tool => "Outil",
            ResourceType::Population => "Population",
            ResourceType::ResearchPoints => "Recherche",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceType {
    type Err = SimError;

    /// Accepts both current and legacy names, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('é', "e");
        ResourceType::ALL
            .into_iter()
            .find(|r| {
                r.name().to_lowercase() == wanted || r.legacy_name().to_lowercase() == wanted
            })
            .ok_or_else(|| SimError::UnknownResource(s.to_string()))
    }
}

/// A bundle of resource amounts, e.g. a building's construction cost
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    items: Vec<(ResourceType, u32)>,
}

impl Cost {
    pub fn new(items: &[(ResourceType, u32)]) -> Self {
        let mut cost = Self::default();
        for &(resource, amount) in items {
            cost.add(resource, amount);
        }
        cost
    }

    /// Add to an existing line item or append a new one
    pub fn add(&mut self, resource: ResourceType, amount: u32) {
        if amount == 0 {
            return;
        }
        match self.items.iter_mut().find(|(r, _)| *r == resource) {
            Some((_, existing)) => *existing += amount,
            None => self.items.push((resource, amount)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceType, u32)> + '_ {
        self.items.iter().copied()
    }

    pub fn amount_of(&self, resource: ResourceType) -> u32 {
        self.items
            .iter()
            .find(|(r, _)| *r == resource)
            .map(|(_, a)| *a)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Each line item scaled by `ratio` and floored
    pub fn scaled(&self, ratio: f32) -> Self {
        let mut scaled = Self::default();
        for &(resource, amount) in &self.items {
            scaled.add(resource, (amount as f32 * ratio).floor() as u32);
        }
        scaled
    }
}

/// Per-villager carry slot: one resource type at a time, limited capacity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    resource: Option<ResourceType>,
    quantity: u32,
    capacity: u32,
    #[serde(skip)]
    changed: bool,
}

impl Inventory {
    pub fn new(capacity: u32) -> Self {
        Self {
            resource: None,
            quantity: 0,
            capacity,
            changed: false,
        }
    }

    pub fn resource(&self) -> Option<ResourceType> {
        self.resource
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Quantity held of `resource`, 0 if holding something else
    pub fn quantity_of(&self, resource: ResourceType) -> u32 {
        if self.resource == Some(resource) {
            self.quantity
        } else {
            0
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn free_space(&self) -> u32 {
        self.capacity - self.quantity
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    pub fn is_full(&self) -> bool {
        self.quantity >= self.capacity
    }

    pub fn can_accept(&self, resource: ResourceType) -> bool {
        !resource.is_virtual() && (self.resource.is_none() || self.resource == Some(resource))
    }

    /// Returns the amount actually added
    pub fn deposit(&mut self, resource: ResourceType, amount: u32) -> u32 {
        if !self.can_accept(resource) {
            return 0;
        }
        let added = amount.min(self.free_space());
        if added > 0 {
            self.resource = Some(resource);
            self.quantity += added;
            self.changed = true;
        }
        added
    }

    /// Returns the amount actually removed
    pub fn withdraw(&mut self, amount: u32) -> u32 {
        let removed = amount.min(self.quantity);
        if removed > 0 {
            self.quantity -= removed;
            if self.quantity == 0 {
                self.resource = None;
            }
            self.changed = true;
        }
        removed
    }

    pub fn clear(&mut self) {
        if self.quantity > 0 {
            self.changed = true;
        }
        self.quantity = 0;
        self.resource = None;
    }

    /// Returns whether the contents changed since the last call
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

/// Per-building stockpile holding several resource types.
///
/// Shared sites are the settlement's storehouses: they count toward the
/// ledger and villagers deposit into them. Private sites are a workshop's
/// own input buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSite {
    contents: BTreeMap<ResourceType, u32>,
    max_types: usize,
    max_per_type: u32,
    shared: bool,
    #[serde(skip)]
    changed: bool,
}

impl StorageSite {
    pub fn new(max_types: usize, max_per_type: u32, shared: bool) -> Self {
        Self {
            contents: BTreeMap::new(),
            max_types,
            max_per_type,
            shared,
            changed: false,
        }
    }

    pub fn shared(max_types: usize, max_per_type: u32) -> Self {
        Self::new(max_types, max_per_type, true)
    }

    pub fn private(max_types: usize, max_per_type: u32) -> Self {
        Self::new(max_types, max_per_type, false)
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn max_types(&self) -> usize {
        self.max_types
    }

    pub fn max_per_type(&self) -> u32 {
        self.max_per_type
    }

    pub fn quantity_of(&self, resource: ResourceType) -> u32 {
        self.contents.get(&resource).copied().unwrap_or(0)
    }

    pub fn distinct_types(&self) -> usize {
        self.contents.len()
    }

    pub fn contents(&self) -> impl Iterator<Item = (ResourceType, u32)> + '_ {
        self.contents.iter().map(|(r, q)| (*r, *q))
    }

    pub fn free_space_for(&self, resource: ResourceType) -> u32 {
        if resource.is_virtual() {
            return 0;
        }
        match self.contents.get(&resource) {
            Some(current) => self.max_per_type - current,
            None if self.contents.len() < self.max_types => self.max_per_type,
            None => 0,
        }
    }

    pub fn can_accept(&self, resource: ResourceType, amount: u32) -> bool {
        self.free_space_for(resource) >= amount
    }

    /// Stores up to the free space; the caller keeps any remainder
    pub fn deposit(&mut self, resource: ResourceType, amount: u32) -> u32 {
        let added = amount.min(self.free_space_for(resource));
        if added > 0 {
            *self.contents.entry(resource).or_insert(0) += added;
            self.changed = true;
        }
        added
    }

    /// Removes up to the stored quantity, dropping the entry at zero
    pub fn withdraw(&mut self, resource: ResourceType, amount: u32) -> u32 {
        let Some(current) = self.contents.get_mut(&resource) else {
            return 0;
        };
        let removed = amount.min(*current);
        if removed == 0 {
            return 0;
        }
        *current -= removed;
        if *current == 0 {
            self.contents.remove(&resource);
        }
        self.changed = true;
        removed
    }

    /// Returns whether the contents changed since the last call
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_inventory_deposit_and_withdraw() {
        let mut inv = Inventory::new(5);
        assert!(inv.can_accept(ResourceType::Wood));
        assert_eq!(inv.deposit(ResourceType::Wood, 3), 3);
        assert!(!inv.can_accept(ResourceType::Stone));
        assert_eq!(inv.deposit(ResourceType::Stone, 1), 0);
        assert_eq!(inv.deposit(ResourceType::Wood, 4), 2);
        assert!(inv.is_full());

        assert_eq!(inv.withdraw(10), 5);
        assert!(inv.is_empty());
        assert_eq!(inv.resource(), None);
        assert!(inv.can_accept(ResourceType::Stone));
    }

    #[test]
    fn test_inventory_rejects_virtual_resources() {
        let mut inv = Inventory::new(5);
        assert_eq!(inv.deposit(ResourceType::ResearchPoints, 1), 0);
        assert!(!inv.take_changed());
    }

    #[test]
    fn test_inventory_clear_on_empty_is_silent() {
        let mut inv = Inventory::new(5);
        inv.clear();
        assert!(!inv.take_changed());

        inv.deposit(ResourceType::Bread, 2);
        assert!(inv.take_changed());
        inv.clear();
        assert!(inv.take_changed());
        assert_eq!(inv.resource(), None);
        inv.clear();
        assert!(!inv.take_changed());
    }

    #[test]
    fn test_storage_free_space() {
        let mut site = StorageSite::shared(2, 20);
        assert_eq!(site.free_space_for(ResourceType::Wood), 20);
        site.deposit(ResourceType::Wood, 15);
        assert_eq!(site.free_space_for(ResourceType::Wood), 5);
        site.deposit(ResourceType::Stone, 1);
        assert_eq!(site.free_space_for(ResourceType::Bread), 0);
        assert!(!site.can_accept(ResourceType::Bread, 1));
        assert!(site.can_accept(ResourceType::Wood, 5));
        assert!(!site.can_accept(ResourceType::Wood, 6));
    }

    #[test]
    fn test_storage_partial_deposit() {
        let mut site = StorageSite::shared(4, 20);
        assert_eq!(site.deposit(ResourceType::Wood, 18), 18);
        assert_eq!(site.deposit(ResourceType::Wood, 5), 2);
        assert_eq!(site.quantity_of(ResourceType::Wood), 20);
        assert_eq!(site.deposit(ResourceType::Wood, 1), 0);
    }

    #[test]
    fn test_storage_fifth_type_rejected_until_slot_frees() {
        let mut site = StorageSite::shared(4, 20);
        for resource in [
            ResourceType::Wood,
            ResourceType::Stone,
            ResourceType::Wheat,
            ResourceType::Bread,
        ] {
            assert_eq!(site.deposit(resource, 1), 1);
        }
        assert_eq!(site.deposit(ResourceType::Plank, 3), 0);
        assert_eq!(site.distinct_types(), 4);

        assert_eq!(site.withdraw(ResourceType::Stone, 1), 1);
        assert_eq!(site.distinct_types(), 3);
        assert_eq!(site.deposit(ResourceType::Plank, 3), 3);
    }

    #[test]
    fn test_storage_round_trip_restores_state() {
        let mut site = StorageSite::shared(4, 20);
        site.deposit(ResourceType::Wood, 7);
        let before = site.clone();

        site.deposit(ResourceType::Stone, 6);
        site.withdraw(ResourceType::Stone, 6);
        assert_eq!(site.quantity_of(ResourceType::Stone), 0);
        assert_eq!(site.distinct_types(), before.distinct_types());
        assert_eq!(
            site.contents().collect::<Vec<_>>(),
            before.contents().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_storage_withdraw_missing_type() {
        let mut site = StorageSite::shared(4, 20);
        assert_eq!(site.withdraw(ResourceType::Wood, 3), 0);
        assert!(!site.take_changed());
    }

    #[test]
    fn test_random_sequences_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut inv = Inventory::new(5);
        let mut site = StorageSite::shared(4, 20);

        for _ in 0..5000 {
            let resource = ResourceType::PHYSICAL[rng.gen_range(0..ResourceType::PHYSICAL.len())];
            let amount = rng.gen_range(0..12);
            match rng.gen_range(0..5) {
                0 => {
                    inv.deposit(resource, amount);
                }
                1 => {
                    inv.withdraw(amount);
                }
                2 => {
                    site.deposit(resource, amount);
                }
                3 => {
                    site.withdraw(resource, amount);
                }
                _ => inv.clear(),
            }

            assert!(inv.quantity() <= inv.capacity());
            assert_eq!(inv.resource().is_none(), inv.quantity() == 0);
            assert!(site.distinct_types() <= 4);
            for (_, quantity) in site.contents() {
                assert!(quantity > 0 && quantity <= 20);
            }
        }
    }

    #[test]
    fn test_resource_names_parse() {
        assert_eq!("Bois".parse::<ResourceType>().unwrap(), ResourceType::Wood);
        assert_eq!("pierre".parse::<ResourceType>().unwrap(), ResourceType::Stone);
        assert_eq!("Blé".parse::<ResourceType>().unwrap(), ResourceType::Wheat);
        assert_eq!("BREAD".parse::<ResourceType>().unwrap(), ResourceType::Bread);
        assert!("Gold".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_cost_scaled_floors() {
        let cost = Cost::new(&[(ResourceType::Wood, 20), (ResourceType::Stone, 5)]);
        let refund = cost.scaled(0.5);
        assert_eq!(refund.amount_of(ResourceType::Wood), 10);
        assert_eq!(refund.amount_of(ResourceType::Stone), 2);
    }
}
