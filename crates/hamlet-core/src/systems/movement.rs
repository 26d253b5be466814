//! Movement system - straight-line steering with local obstacle avoidance
//!
//! Walkers head directly for their destination. A short probe ahead detects
//! building footprints in the way; while one is detected a perpendicular
//! offset is blended into the heading and fades out over the avoidance
//! window. A walker that stops making progress takes a random detour.

use hecs::{Entity, World};
use rand::Rng;

use super::wandering::random_point_near;
use crate::components::{Avoidance, Building, Movement, Position, Vec2};
use crate::config::{MovementConfig, WorldConfig};

/// Extra clearance around a footprint when probing
const PROBE_CLEARANCE: f32 = 0.3;
/// Below this share of the expected step, a tick counts as no progress
const PROGRESS_RATIO: f32 = 0.1;

/// A building footprint that walkers steer around
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub entity: Entity,
    pub center: Vec2,
    pub radius: f32,
    pub region: u16,
}

pub fn collect_obstacles(world: &World) -> Vec<Obstacle> {
    world
        .query::<(&Building, &Position)>()
        .iter()
        .map(|(entity, (building, pos))| Obstacle {
            entity,
            center: pos.pos,
            radius: building.radius,
            region: pos.region,
        })
        .collect()
}

/// Nearest obstacle touched by the probe segment from `from` along `heading`
fn probe(
    obstacles: &[Obstacle],
    from: Vec2,
    heading: Vec2,
    length: f32,
    region: u16,
    ignore: Option<Entity>,
) -> Option<Obstacle> {
    obstacles
        .iter()
        .filter(|o| o.region == region && Some(o.entity) != ignore)
        .filter_map(|o| {
            // closest point on the probe segment to the obstacle center
            let along = (o.center - from).dot(&heading).clamp(0.0, length);
            let closest = from + heading * along;
            let hit = closest.distance(&o.center) < o.radius + PROBE_CLEARANCE;
            // walkers already inside a footprint are let out
            let inside = from.distance(&o.center) < o.radius;
            (hit && !inside).then_some((along, *o))
        })
        .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, o)| o)
}

/// Move entities toward their destinations
pub fn movement_system(
    world: &mut World,
    config: &MovementConfig,
    bounds: &WorldConfig,
    rng: &mut impl Rng,
    delta_seconds: f32,
) {
    let obstacles = collect_obstacles(world);
    let mut updates: Vec<(Entity, Position, Option<Movement>)> = Vec::with_capacity(256);

    for (entity, (pos, movement)) in world.query::<(&Position, &Movement)>().iter() {
        let result = process_movement(pos, movement, &obstacles, config, bounds, rng, delta_seconds);
        updates.push((entity, result.0, result.1));
    }

    for (entity, new_pos, new_movement) in updates {
        if let Ok(mut pos) = world.get::<&mut Position>(entity) {
            *pos = new_pos;
        }
        match new_movement {
            Some(mov) => {
                if let Ok(mut m) = world.get::<&mut Movement>(entity) {
                    *m = mov;
                }
            }
            None => {
                // arrived or gave up
                let _ = world.remove_one::<Movement>(entity);
            }
        }
    }
}

/// Process movement for a single entity, returns new position and optionally updated movement
fn process_movement(
    pos: &Position,
    movement: &Movement,
    obstacles: &[Obstacle],
    config: &MovementConfig,
    bounds: &WorldConfig,
    rng: &mut impl Rng,
    delta_seconds: f32,
) -> (Position, Option<Movement>) {
    let mut movement = movement.clone();
    movement.expires_in -= delta_seconds;
    if movement.expires_in <= 0.0 {
        return (*pos, None);
    }

    let goal = movement.detour.unwrap_or(movement.destination);
    let current = pos.pos;
    let distance = current.distance(&goal);
    let step = movement.speed * delta_seconds;

    if distance < 0.05 || step >= distance {
        let arrived = Position::at(goal, pos.region);
        if movement.detour.take().is_some() {
            movement.stuck_for = 0.0;
            return (arrived, Some(movement));
        }
        return (arrived, None);
    }

    let heading = (goal - current).normalize();
    let blocking = probe(
        obstacles,
        current,
        heading,
        config.probe_length,
        pos.region,
        movement.target_building,
    );

    movement.avoidance = match (movement.avoidance, blocking) {
        (Some(avoid), Some(hit)) if avoid.obstacle == hit.entity => {
            let remaining = avoid.remaining - delta_seconds;
            (remaining > 0.0).then_some(Avoidance { remaining, ..avoid })
        }
        (_, Some(hit)) => {
            // sidestep away from the obstacle center
            let to_obstacle = hit.center - current;
            let left = heading.perp_left();
            let direction = if to_obstacle.dot(&left) > 0.0 {
                heading.perp_right()
            } else {
                left
            };
            Some(Avoidance {
                direction,
                remaining: config.avoidance_window,
                obstacle: hit.entity,
            })
        }
        // probe is clear
        (_, None) => None,
    };

    let direction = match movement.avoidance {
        Some(avoid) => {
            let weight = avoid.remaining / config.avoidance_window.max(f32::EPSILON);
            (heading + avoid.direction * (weight * 1.5)).normalize()
        }
        None => heading,
    };

    let (x, y) = bounds.clamp(
        current.x + direction.x * step,
        current.y + direction.y * step,
    );
    let next = Vec2::new(x, y);

    let progress = distance - next.distance(&goal);
    if progress < step * PROGRESS_RATIO {
        movement.stuck_for += delta_seconds;
    } else {
        movement.stuck_for = 0.0;
    }
    if movement.stuck_for >= config.stuck_timeout && movement.detour.is_none() {
        movement.detour = Some(random_point_near(next, config.wander_radius, bounds, rng));
        movement.stuck_for = 0.0;
        movement.avoidance = None;
    }

    (Position::at(next, pos.region), Some(movement))
}
