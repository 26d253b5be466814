//! Resource ledger - settlement-wide resource totals
//!
//! Physical totals are never cached: they are recomputed from every shared
//! storage site and every villager inventory on each query. Virtual counters
//! (population, research) live only here.

use std::collections::BTreeMap;

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};

use crate::components::{Cost, Inventory, ResourceType, StorageSite};
use crate::error::SimError;

/// Read-only totals for HUD polling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub totals: BTreeMap<ResourceType, u32>,
}

impl LedgerSnapshot {
    pub fn get(&self, resource: ResourceType) -> u32 {
        self.totals.get(&resource).copied().unwrap_or(0)
    }
}

/// Settlement resource ledger (one per simulation, stored in engine)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLedger {
    virtuals: BTreeMap<ResourceType, u32>,
}

impl ResourceLedger {
    pub fn new(starting_research: u32) -> Self {
        let mut virtuals = BTreeMap::new();
        virtuals.insert(ResourceType::Population, 0);
        virtuals.insert(ResourceType::ResearchPoints, starting_research);
        Self { virtuals }
    }

    pub fn get(&self, world: &World, resource: ResourceType) -> u32 {
        if resource.is_virtual() {
            self.virtuals.get(&resource).copied().unwrap_or(0)
        } else {
            physical_total(world, resource)
        }
    }

    /// Credit a virtual counter. Physical resources must go through
    /// an inventory or storage site, so this is a logged no-op for them.
    pub fn add(&mut self, resource: ResourceType, amount: u32) -> bool {
        if !resource.is_virtual() {
            log::warn!("ledger add({}, {}) ignored: physical resource", resource, amount);
            return false;
        }
        let counter = self.virtuals.entry(resource).or_insert(0);
        *counter = counter.saturating_add(amount);
        true
    }

    pub fn has_enough(&self, world: &World, resource: ResourceType, amount: u32) -> bool {
        self.get(world, resource) >= amount
    }

    pub fn has_enough_for(&self, world: &World, cost: &Cost) -> bool {
        self.first_shortfall(world, cost).is_none()
    }

    /// The first line item of `cost` the settlement cannot cover
    pub fn first_shortfall(&self, world: &World, cost: &Cost) -> Option<SimError> {
        cost.iter().find_map(|(resource, required)| {
            let available = self.get(world, resource);
            (available < required).then_some(SimError::InsufficientResources {
                resource,
                required,
                available,
            })
        })
    }

    /// Spend `amount` of one resource, all or nothing.
    ///
    /// Physical resources are checked against the live total before anything
    /// is withdrawn, then taken from shared storage sites first and villager
    /// inventories after, each in entity order.
    pub fn spend(&mut self, world: &mut World, resource: ResourceType, amount: u32) -> bool {
        if resource.is_virtual() {
            return match self.virtuals.get_mut(&resource) {
                Some(counter) if *counter >= amount => {
                    *counter -= amount;
                    true
                }
                _ => amount == 0,
            };
        }

        if physical_total(world, resource) < amount {
            return false;
        }
        let taken = withdraw_physical(world, resource, amount);
        debug_assert_eq!(taken, amount);
        taken == amount
    }

    /// Spend a whole bundle, pre-checking every line item first
    pub fn spend_cost(&mut self, world: &mut World, cost: &Cost) -> Result<(), SimError> {
        if let Some(shortfall) = self.first_shortfall(world, cost) {
            return Err(shortfall);
        }
        for (resource, amount) in cost.iter() {
            self.spend(world, resource, amount);
        }
        Ok(())
    }

    /// Set the population counter, returning whether it changed
    pub fn sync_population(&mut self, count: u32) -> bool {
        let previous = self.virtuals.insert(ResourceType::Population, count);
        previous != Some(count)
    }

    pub fn snapshot(&self, world: &World) -> LedgerSnapshot {
        let totals = ResourceType::ALL
            .iter()
            .map(|&resource| (resource, self.get(world, resource)))
            .collect();
        LedgerSnapshot { totals }
    }
}

/// Live sum over shared storage sites and villager inventories
pub fn physical_total(world: &World, resource: ResourceType) -> u32 {
    let stored: u32 = world
        .query::<&StorageSite>()
        .iter()
        .filter(|(_, site)| site.is_shared())
        .map(|(_, site)| site.quantity_of(resource))
        .sum();
    let carried: u32 = world
        .query::<&Inventory>()
        .iter()
        .map(|(_, inv)| inv.quantity_of(resource))
        .sum();
    stored + carried
}

fn withdraw_physical(world: &mut World, resource: ResourceType, amount: u32) -> u32 {
    let mut sites: Vec<Entity> = world
        .query::<&StorageSite>()
        .iter()
        .filter(|(_, site)| site.is_shared() && site.quantity_of(resource) > 0)
        .map(|(entity, _)| entity)
        .collect();
    sites.sort();
    let mut holders: Vec<Entity> = world
        .query::<&Inventory>()
        .iter()
        .filter(|(_, inv)| inv.quantity_of(resource) > 0)
        .map(|(entity, _)| entity)
        .collect();
    holders.sort();

    let mut taken = 0;
    for entity in sites {
        if taken == amount {
            break;
        }
        if let Ok(mut site) = world.get::<&mut StorageSite>(entity) {
            taken += site.withdraw(resource, amount - taken);
        }
    }
    for entity in holders {
        if taken == amount {
            break;
        }
        if let Ok(mut inv) = world.get::<&mut Inventory>(entity) {
            taken += inv.withdraw(amount - taken);
        }
    }
    taken
}

/// Consume change flags on every stockpile and inventory.
///
/// Returns true if anything changed since the previous sweep.
pub fn sweep_resource_changes(world: &mut World) -> bool {
    let mut changed = false;
    for (_, site) in world.query_mut::<&mut StorageSite>() {
        changed |= site.take_changed();
    }
    for (_, inv) in world.query_mut::<&mut Inventory>() {
        changed |= inv.take_changed();
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warehouse(world: &mut World, items: &[(ResourceType, u32)]) -> Entity {
        let mut site = StorageSite::shared(4, 20);
        for &(resource, amount) in items {
            site.deposit(resource, amount);
        }
        world.spawn((site,))
    }

    fn carrier(world: &mut World, resource: ResourceType, amount: u32) -> Entity {
        let mut inv = Inventory::new(5);
        inv.deposit(resource, amount);
        world.spawn((inv,))
    }

    #[test]
    fn test_total_spans_storage_and_inventories() {
        let mut world = World::new();
        warehouse(&mut world, &[(ResourceType::Wood, 12)]);
        warehouse(&mut world, &[(ResourceType::Wood, 3), (ResourceType::Stone, 4)]);
        carrier(&mut world, ResourceType::Wood, 2);
        let ledger = ResourceLedger::new(0);

        assert_eq!(ledger.get(&world, ResourceType::Wood), 17);
        assert_eq!(ledger.get(&world, ResourceType::Stone), 4);
        assert_eq!(ledger.get(&world, ResourceType::Bread), 0);
    }

    #[test]
    fn test_private_buffers_not_counted() {
        let mut world = World::new();
        let mut buffer = StorageSite::private(1, 20);
        buffer.deposit(ResourceType::Wheat, 5);
        world.spawn((buffer,));
        let ledger = ResourceLedger::new(0);
        assert_eq!(ledger.get(&world, ResourceType::Wheat), 0);
    }

    #[test]
    fn test_add_only_for_virtual() {
        let mut ledger = ResourceLedger::new(3);
        let world = World::new();
        assert!(!ledger.add(ResourceType::Wood, 10));
        assert_eq!(ledger.get(&world, ResourceType::Wood), 0);
        assert!(ledger.add(ResourceType::ResearchPoints, 2));
        assert_eq!(ledger.get(&world, ResourceType::ResearchPoints), 5);
    }

    #[test]
    fn test_spend_virtual() {
        let mut world = World::new();
        let mut ledger = ResourceLedger::new(10);
        assert!(ledger.spend(&mut world, ResourceType::ResearchPoints, 4));
        assert!(!ledger.spend(&mut world, ResourceType::ResearchPoints, 7));
        assert_eq!(ledger.get(&world, ResourceType::ResearchPoints), 6);
    }

    #[test]
    fn test_spend_storage_before_inventory() {
        let mut world = World::new();
        let site = warehouse(&mut world, &[(ResourceType::Wood, 4)]);
        let villager = carrier(&mut world, ResourceType::Wood, 3);
        let mut ledger = ResourceLedger::new(0);

        assert!(ledger.spend(&mut world, ResourceType::Wood, 6));
        assert_eq!(world.get::<&StorageSite>(site).unwrap().quantity_of(ResourceType::Wood), 0);
        assert_eq!(world.get::<&Inventory>(villager).unwrap().quantity(), 1);
    }

    #[test]
    fn test_failed_spend_withdraws_nothing() {
        let mut world = World::new();
        warehouse(&mut world, &[(ResourceType::Wood, 20)]);
        warehouse(&mut world, &[(ResourceType::Wood, 10)]);
        let mut ledger = ResourceLedger::new(0);

        assert!(!ledger.spend(&mut world, ResourceType::Wood, 31));
        assert_eq!(ledger.get(&world, ResourceType::Wood), 30);

        // exact boundary drains everything without going negative
        assert!(ledger.spend(&mut world, ResourceType::Wood, 30));
        assert_eq!(ledger.get(&world, ResourceType::Wood), 0);
        assert!(!ledger.spend(&mut world, ResourceType::Wood, 1));
    }

    #[test]
    fn test_spend_cost_is_all_or_nothing() {
        let mut world = World::new();
        warehouse(&mut world, &[(ResourceType::Wood, 20), (ResourceType::Stone, 2)]);
        warehouse(&mut world, &[(ResourceType::Wood, 10)]);
        let mut ledger = ResourceLedger::new(0);
        let cost = Cost::new(&[(ResourceType::Wood, 20), (ResourceType::Stone, 5)]);

        let err = ledger.spend_cost(&mut world, &cost).unwrap_err();
        assert_eq!(
            err,
            SimError::InsufficientResources {
                resource: ResourceType::Stone,
                required: 5,
                available: 2,
            }
        );
        assert_eq!(ledger.get(&world, ResourceType::Wood), 30);
        assert!(!ledger.has_enough_for(&world, &cost));
    }

    #[test]
    fn test_sync_population_reports_change() {
        let mut ledger = ResourceLedger::new(0);
        assert!(ledger.sync_population(3));
        assert!(!ledger.sync_population(3));
        assert!(ledger.sync_population(2));
    }

    #[test]
    fn test_sweep_consumes_flags() {
        let mut world = World::new();
        warehouse(&mut world, &[(ResourceType::Wood, 1)]);
        assert!(sweep_resource_changes(&mut world));
        assert!(!sweep_resource_changes(&mut world));
    }

    #[test]
    fn test_snapshot_lists_every_resource() {
        let mut world = World::new();
        warehouse(&mut world, &[(ResourceType::Stone, 7)]);
        let ledger = ResourceLedger::new(2);
        let snapshot = ledger.snapshot(&world);
        assert_eq!(snapshot.totals.len(), ResourceType::ALL.len());
        assert_eq!(snapshot.get(ResourceType::Stone), 7);
        assert_eq!(snapshot.get(ResourceType::ResearchPoints), 2);
    }
}
