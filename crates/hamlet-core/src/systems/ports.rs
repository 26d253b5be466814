//! Docks - pairing, boarding and crossing between regions

use std::collections::HashSet;

use hecs::{Entity, World};
use rand::Rng;

use super::production::{door_position, step_outside};
use crate::components::{
    Behavior, BehaviorState, Building, Movement, Passenger, Port, Position, Vec2,
};
use crate::error::SimError;

/// Re-pair docks whose destination is gone or claimed by another dock.
///
/// Each dock sails to the nearest dock in another region that no other dock
/// has already claimed as its destination. Docks are processed in entity
/// order so the pairing is stable from tick to tick.
pub fn pair_ports_system(world: &mut World) {
    let mut ports: Vec<(Entity, Position, Option<Entity>)> = world
        .query::<(&Port, &Position)>()
        .iter()
        .map(|(entity, (port, pos))| (entity, *pos, port.destination))
        .collect();
    ports.sort_by_key(|(entity, _, _)| *entity);

    let mut claimed: HashSet<Entity> = HashSet::new();
    let mut changes: Vec<(Entity, Option<Entity>)> = Vec::new();

    for &(entity, pos, current) in &ports {
        let still_valid = current
            .filter(|dest| !claimed.contains(dest))
            .and_then(|dest| ports.iter().find(|(e, _, _)| *e == dest))
            .filter(|(_, dest_pos, _)| dest_pos.region != pos.region)
            .map(|(e, _, _)| *e);

        let chosen = still_valid.or_else(|| {
            ports
                .iter()
                .filter(|(other, other_pos, _)| {
                    *other != entity && other_pos.region != pos.region && !claimed.contains(other)
                })
                .min_by(|a, b| {
                    let da = a.1.pos.distance_squared(&pos.pos);
                    let db = b.1.pos.distance_squared(&pos.pos);
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(other, _, _)| *other)
        });

        if let Some(dest) = chosen {
            claimed.insert(dest);
        }
        if chosen != current {
            changes.push((entity, chosen));
        }
    }

    for (entity, destination) in changes {
        if let Ok(mut port) = world.get::<&mut Port>(entity) {
            log::debug!("dock {:?} now sails to {:?}", entity, destination);
            port.destination = destination;
        }
    }
}

/// Dock in `from_region` whose paired destination lies in `to_region`,
/// nearest to `near`
pub fn port_towards(world: &World, near: &Position, to_region: u16) -> Option<Entity> {
    world
        .query::<(&Port, &Position)>()
        .iter()
        .filter(|(_, (port, pos))| {
            pos.region == near.region
                && port
                    .destination
                    .and_then(|dest| world.get::<&Position>(dest).ok().map(|p| p.region))
                    == Some(to_region)
        })
        .min_by(|a, b| {
            let da = a.1 .1.pos.distance_squared(&near.pos);
            let db = b.1 .1.pos.distance_squared(&near.pos);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(entity, _)| entity)
}

/// Board a boat: the villager is hidden until the crossing ends
pub fn embark(world: &mut World, villager: Entity, port: Entity) -> Result<(), SimError> {
    let center = {
        let mut dock = world
            .get::<&mut Port>(port)
            .map_err(|_| SimError::UnknownEntity)?;
        if dock.destination.is_none() {
            return Err(SimError::NoValidTarget);
        }
        if !dock.has_room() {
            return Err(SimError::CapacityExceeded {
                what: format!("dock {:?}", port),
            });
        }
        let remaining = dock.transit_seconds;
        dock.passengers.push(Passenger { villager, remaining });
        *world
            .get::<&Position>(port)
            .map_err(|_| SimError::UnknownEntity)?
    };

    if let Ok(mut behavior) = world.get::<&mut Behavior>(villager) {
        behavior.state = BehaviorState::Inside { building: port };
    }
    if let Ok(mut pos) = world.get::<&mut Position>(villager) {
        *pos = center;
    }
    let _ = world.remove_one::<Movement>(villager);
    log::debug!("{:?} boarded at dock {:?}", villager, port);
    Ok(())
}

/// Advance crossings and land arrivals near their destination dock
pub fn transit_system(world: &mut World, rng: &mut impl Rng, delta_seconds: f32) {
    let mut arrivals: Vec<(Entity, Entity, Option<Entity>)> = Vec::new();

    for (entity, port) in world.query_mut::<&mut Port>() {
        for passenger in &mut port.passengers {
            passenger.remaining -= delta_seconds;
            if passenger.remaining <= 0.0 {
                arrivals.push((entity, passenger.villager, port.destination));
            }
        }
        port.passengers.retain(|p| p.remaining > 0.0);
    }

    for (origin, villager, destination) in arrivals {
        let landing = destination
            .filter(|dest| world.get::<&Port>(*dest).is_ok())
            .and_then(|dest| landing_spot(world, dest, rng));
        match landing {
            Some(spot) => {
                if let Ok(mut pos) = world.get::<&mut Position>(villager) {
                    *pos = spot;
                }
                if let Ok(mut behavior) = world.get::<&mut Behavior>(villager) {
                    behavior.state = BehaviorState::Normal;
                }
                log::debug!("{:?} landed at {:?}", villager, destination);
            }
            // the far dock is gone, sail back
            None => step_outside(world, villager, origin),
        }
    }
}

/// Free ground position around a dock, away from building footprints
fn landing_spot(world: &World, port: Entity, rng: &mut impl Rng) -> Option<Position> {
    let door = door_position(world, port)?;
    let center = *world.get::<&Position>(port).ok()?;
    let radius = world.get::<&Building>(port).map(|b| b.radius).unwrap_or(1.5) + 1.0;

    let footprints: Vec<(Vec2, f32)> = world
        .query::<(&Building, &Position)>()
        .iter()
        .filter(|(_, (_, pos))| pos.region == center.region)
        .map(|(_, (building, pos))| (pos.pos, building.radius))
        .collect();

    let start = rng.gen_range(0.0..std::f32::consts::TAU);
    (0..8)
        .map(|i| start + i as f32 * std::f32::consts::FRAC_PI_4)
        .map(|angle| center.pos + Vec2::from_angle(angle) * radius)
        .find(|spot| footprints.iter().all(|(c, r)| spot.distance(c) > *r))
        .map(|spot| Position::at(spot, center.region))
        .or(Some(door))
}
