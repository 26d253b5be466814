//! Needs system - decay, death and regeneration inside buildings

use std::collections::HashMap;

use hecs::{Entity, World};

use super::claims::ResourceClaims;
use super::events::{EventQueue, SimEvent};
use super::jobs::JobBoard;
use super::production::step_outside;
use crate::components::{NeedType, Needs, Regenerator, Villager, NEED_MAX};
use crate::config::NeedsConfig;

/// Villager -> need currently being restored, for everyone inside a regenerator
fn regenerating(world: &World) -> HashMap<Entity, NeedType> {
    let mut inside = HashMap::new();
    for (_, regen) in world.query::<&Regenerator>().iter() {
        for &villager in &regen.occupants {
            inside.insert(villager, regen.need);
        }
    }
    inside
}

/// Decay needs over time; paused for villagers inside a regeneration building
pub fn needs_system(world: &mut World, rates: &NeedsConfig, delta_seconds: f32) {
    let inside = regenerating(world);
    for (entity, (_, needs)) in world.query_mut::<(&Villager, &mut Needs)>() {
        needs.decay(delta_seconds, rates, inside.get(&entity).copied());
    }
}

/// Villagers with a depleted need, paired with the need that ran out
pub fn find_dead(world: &World) -> Vec<(Entity, NeedType)> {
    world
        .query::<(&Villager, &Needs)>()
        .iter()
        .filter_map(|(entity, (_, needs))| needs.depleted().map(|need| (entity, need)))
        .collect()
}

/// Remove dead villagers, releasing their claims and job slots first
pub fn death_system(
    world: &mut World,
    board: &mut JobBoard,
    claims: &mut ResourceClaims,
    events: &mut EventQueue,
) -> usize {
    let dead = find_dead(world);
    for &(villager, cause) in &dead {
        claims.release_all(villager);
        if let Some(workplace) = board.unregister(world, villager) {
            events.push(SimEvent::WorkerReleased {
                villager,
                facility: workplace,
            });
        }
        log::info!("{:?} died ({:?} ran out)", villager, cause);
        events.push(SimEvent::VillagerDied { villager, cause });
        let _ = world.despawn(villager);
    }
    dead.len()
}

/// Restore the need of every regenerator occupant, releasing those at the cap
pub fn regen_system(world: &mut World, rates: &NeedsConfig, delta_seconds: f32) {
    let amount = rates.regen_rate * delta_seconds;
    let mut finished: Vec<(Entity, Entity)> = Vec::new();

    for (building, regen) in world.query::<&Regenerator>().iter() {
        for &villager in &regen.occupants {
            if let Ok(mut needs) = world.get::<&mut Needs>(villager) {
                needs.regenerate(regen.need, amount);
                if needs.get(regen.need) >= NEED_MAX {
                    finished.push((building, villager));
                }
            }
        }
    }

    for (building, villager) in finished {
        if let Ok(mut regen) = world.get::<&mut Regenerator>(building) {
            regen.release(villager);
        }
        step_outside(world, villager, building);
        log::debug!("{:?} left regenerator {:?}", villager, building);
    }
}
