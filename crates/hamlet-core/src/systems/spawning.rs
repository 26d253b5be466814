//! Spawning - new villagers appear at houses while there is housing

use hecs::{Entity, World};
use rand::Rng;

use super::events::{EventQueue, SimEvent};
use super::jobs::JobBoard;
use super::production::door_position;
use crate::components::{Behavior, Inventory, Needs, Position, Spawner, Villager};
use crate::generation::generate_name;

/// Create a villager at `position` and register it with the job board
pub fn spawn_villager(
    world: &mut World,
    board: &mut JobBoard,
    position: Position,
    inventory_capacity: u32,
    rng: &mut impl Rng,
) -> Entity {
    let name = generate_name(rng);
    log::info!("{} arrived", name.full_name());
    let villager = world.spawn((
        Villager::default(),
        name,
        Needs::default(),
        Behavior::default(),
        Inventory::new(inventory_capacity),
        position,
    ));
    board.register(villager);
    villager
}

/// Total housing across all houses
pub fn housing_capacity(world: &World) -> u32 {
    world.query::<&Spawner>().iter().map(|(_, s)| s.housing).sum()
}

pub fn population(world: &World) -> u32 {
    world.query::<&Villager>().iter().count() as u32
}

/// Count down house timers and spawn at the door while below housing
pub fn spawning_system(
    world: &mut World,
    board: &mut JobBoard,
    events: &mut EventQueue,
    respawn_delay: f32,
    inventory_capacity: u32,
    rng: &mut impl Rng,
    delta_seconds: f32,
) {
    let housing = housing_capacity(world);
    let mut population = population(world);

    let mut ready: Vec<Entity> = Vec::new();
    for (entity, spawner) in world.query_mut::<&mut Spawner>() {
        spawner.respawn_timer = (spawner.respawn_timer - delta_seconds).max(0.0);
        if spawner.respawn_timer <= 0.0 {
            ready.push(entity);
        }
    }
    ready.sort();

    for house in ready {
        if population >= housing {
            break;
        }
        let Some(door) = door_position(world, house) else {
            continue;
        };
        let villager = spawn_villager(world, board, door, inventory_capacity, rng);
        events.push(SimEvent::VillagerSpawned { villager });
        population += 1;
        if let Ok(mut spawner) = world.get::<&mut Spawner>(house) {
            spawner.respawn_timer = respawn_delay;
        }
    }
}
