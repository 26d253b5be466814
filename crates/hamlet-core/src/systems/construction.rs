//! Construction and demolition of buildings

use hecs::{Entity, EntityBuilder, World};

use super::jobs::JobBoard;
use super::production::step_outside;
use crate::components::{
    Behavior, BehaviorState, Building, BuildingKind, Cost, Port, Position, ProductionFacility,
    Regenerator, Spawner, StorageShape, StorageSite,
};
use crate::config::SimConfig;
use crate::error::SimError;

/// Spawn a building entity with the components its kind calls for
pub fn spawn_building(world: &mut World, kind: BuildingKind, position: Position, config: &SimConfig) -> Entity {
    let spec = kind.spec();
    let mut builder = EntityBuilder::new();
    builder.add(Building::new(kind)).add(position);

    if spec.job != crate::components::Job::None && !spec.rules.is_empty() {
        let speed = spec.unlock_age.speed_multiplier(&config.ages);
        builder.add(ProductionFacility::new(spec.job, spec.capacity, spec.rules, speed));
    }
    match spec.storage {
        Some(StorageShape::Shared) => {
            builder.add(StorageSite::shared(config.storage.max_types, config.storage.max_per_type));
        }
        Some(StorageShape::Private) => {
            builder.add(StorageSite::private(
                config.storage.workshop_max_types,
                config.storage.workshop_max_per_type,
            ));
        }
        None => {}
    }
    if let Some(need) = spec.regenerates {
        builder.add(Regenerator::new(need, spec.capacity));
    }
    if let Some(transit) = spec.transit_seconds {
        builder.add(Port::new(transit, spec.capacity));
    }
    if spec.housing > 0 {
        builder.add(Spawner {
            housing: spec.housing,
            respawn_timer: config.spawning.respawn_delay,
        });
    }

    let entity = world.spawn(builder.build());
    log::info!("{} built at ({:.1}, {:.1})", spec.name, position.pos.x, position.pos.y);
    entity
}

/// Outcome of a demolition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefundReport {
    pub kind: Option<BuildingKind>,
    /// Refund placed into remaining storage
    pub refunded: Cost,
    /// Refund that found no room
    pub lost: Cost,
    /// Whatever the building itself was holding, gone with it
    pub dropped_stock: Cost,
    /// Workers who lost their job
    pub released_workers: Vec<Entity>,
}

impl RefundReport {
    pub fn lost_units(&self) -> u32 {
        self.lost.iter().map(|(_, amount)| amount).sum()
    }
}

/// Remove a building: evict everyone inside, fire its workers, then spread
/// `refund_ratio` of its cost over the remaining shared storage, first-fit.
pub fn demolish(
    world: &mut World,
    board: &JobBoard,
    building: Entity,
    refund_ratio: f32,
) -> Result<RefundReport, SimError> {
    let (kind, cost) = {
        let b = world
            .get::<&Building>(building)
            .map_err(|_| SimError::UnknownEntity)?;
        (b.kind, b.cost.clone())
    };

    let mut report = RefundReport {
        kind: Some(kind),
        ..Default::default()
    };

    // everyone hidden inside walks out first
    let inside: Vec<Entity> = world
        .query::<&Behavior>()
        .iter()
        .filter(|(_, behavior)| behavior.state == BehaviorState::Inside { building })
        .map(|(entity, _)| entity)
        .collect();
    for villager in inside {
        step_outside(world, villager, building);
    }

    let workers = world
        .get::<&mut ProductionFacility>(building)
        .map(|mut facility| facility.clear())
        .unwrap_or_default();
    for &worker in &workers {
        board.fire(world, worker);
    }
    report.released_workers = workers;

    if let Ok(site) = world.get::<&StorageSite>(building) {
        for (resource, amount) in site.contents() {
            report.dropped_stock.add(resource, amount);
        }
    }
    for (resource, amount) in report.dropped_stock.iter() {
        log::warn!("{} demolished holding {} {}, dropped", kind.name(), amount, resource);
    }

    world.despawn(building).map_err(|_| SimError::UnknownEntity)?;

    let mut sites: Vec<Entity> = world
        .query::<&StorageSite>()
        .iter()
        .filter(|(_, site)| site.is_shared())
        .map(|(entity, _)| entity)
        .collect();
    sites.sort();

    for (resource, amount) in cost.scaled(refund_ratio).iter() {
        let mut remaining = amount;
        for &site in &sites {
            if remaining == 0 {
                break;
            }
            if let Ok(mut storage) = world.get::<&mut StorageSite>(site) {
                remaining -= storage.deposit(resource, remaining);
            }
        }
        report.refunded.add(resource, amount - remaining);
        report.lost.add(resource, remaining);
        if remaining > 0 {
            log::warn!(
                "{} refund: {} {} lost, no storage room",
                kind.name(),
                remaining,
                resource
            );
        }
    }

    log::info!("{} demolished", kind.name());
    Ok(report)
}
