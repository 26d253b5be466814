//! Wandering - random targets for idle villagers and stuck walkers

use hecs::{Entity, World};
use rand::Rng;

use crate::components::{Movement, Position, Vec2};
use crate::config::{MovementConfig, WorldConfig};

/// Random point within `radius` of `center`, clamped to the map
pub fn random_point_near(center: Vec2, radius: f32, bounds: &WorldConfig, rng: &mut impl Rng) -> Vec2 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let distance = rng.gen_range(radius * 0.3..=radius.max(0.1));
    let target = center + Vec2::from_angle(angle) * distance;
    let (x, y) = bounds.clamp(target.x, target.y);
    Vec2::new(x, y)
}

/// Give an idle villager a short random walk, unless it is already moving.
///
/// Returns true if a new wander target was set.
pub fn start_wander(
    world: &mut World,
    villager: Entity,
    config: &MovementConfig,
    bounds: &WorldConfig,
    rng: &mut impl Rng,
) -> bool {
    if world.get::<&Movement>(villager).is_ok() {
        return false;
    }
    let Ok(pos) = world.get::<&Position>(villager).map(|p| *p) else {
        return false;
    };
    let target = random_point_near(pos.pos, config.wander_radius, bounds, rng);
    let movement = Movement::new(target, config.speed * 0.5, config.target_expiry);
    world.insert_one(villager, movement).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_point_stays_in_bounds() {
        let bounds = WorldConfig::default();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..500 {
            let p = random_point_near(Vec2::new(1.0, 1.0), 6.0, &bounds, &mut rng);
            assert!(p.x >= 0.0 && p.x <= bounds.width);
            assert!(p.y >= 0.0 && p.y <= bounds.height);
            assert!(p.distance(&Vec2::new(1.0, 1.0)) <= 6.01);
        }
    }

    #[test]
    fn test_wander_only_when_idle() {
        let mut world = World::new();
        let config = MovementConfig::default();
        let bounds = WorldConfig::default();
        let mut rng = StdRng::seed_from_u64(9);
        let v = world.spawn((Position::new(20.0, 20.0, 0),));

        assert!(start_wander(&mut world, v, &config, &bounds, &mut rng));
        let first = world.get::<&Movement>(v).unwrap().destination;
        assert!(!start_wander(&mut world, v, &config, &bounds, &mut rng));
        assert_eq!(world.get::<&Movement>(v).unwrap().destination, first);
    }
}
