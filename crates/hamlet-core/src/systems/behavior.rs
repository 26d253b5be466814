//! Behavior system - the per-villager decision loop
//!
//! Each tick, in priority order: urgent needs send a villager to the nearest
//! regeneration building; otherwise the current [`BehaviorState`] advances.
//! Unemployed villagers gather wood and stone by hand and haul it to a
//! warehouse. Employed villagers fetch their workplace's input, commute and
//! produce, hauling the output away when they come back out.

use hecs::{Entity, World};
use rand::Rng;

use super::claims::ResourceClaims;
use super::ports::{embark, port_towards};
use super::production::{admit, release_occupant};
use super::wandering::start_wander;
use crate::components::{
    Behavior, BehaviorState, Building, Errand, Inventory, Movement, NeedType, Needs, Position,
    ProductionFacility, Regenerator, ResourceNode, ResourceType, StorageSite, Villager,
};
use crate::config::SimConfig;
use crate::error::SimError;

/// Services the decision loop reads and mutates
pub struct BehaviorContext<'a, R: Rng> {
    pub config: &'a SimConfig,
    pub claims: &'a mut ResourceClaims,
    pub rng: &'a mut R,
}

/// Advance every villager's state machine by `delta_seconds`
pub fn behavior_system<R: Rng>(world: &mut World, ctx: &mut BehaviorContext<'_, R>, delta_seconds: f32) {
    let mut villagers: Vec<Entity> = world
        .query::<(&Villager, &Behavior)>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();
    villagers.sort();

    for villager in villagers {
        update_villager(world, ctx, villager, delta_seconds);
    }
}

fn set_state(world: &mut World, villager: Entity, state: BehaviorState) {
    if let Ok(mut behavior) = world.get::<&mut Behavior>(villager) {
        if behavior.state != state {
            log::debug!("{:?}: {:?} -> {:?}", villager, behavior.state, state);
            behavior.state = state;
        }
    }
}

fn update_villager<R: Rng>(world: &mut World, ctx: &mut BehaviorContext<'_, R>, villager: Entity, dt: f32) {
    let Ok(state) = world.get::<&Behavior>(villager).map(|b| b.state) else {
        return;
    };
    let urgent = world
        .get::<&Needs>(villager)
        .ok()
        .and_then(|needs| needs.most_urgent(ctx.config.needs.interrupt_threshold));

    if let BehaviorState::Inside { building } = state {
        // regenerators and boats release villagers themselves
        let working = world
            .get::<&ProductionFacility>(building)
            .map(|f| f.is_occupant(villager))
            .unwrap_or(false);
        if let (true, Some(need)) = (working, urgent) {
            if let Some(target) = nearest_regenerator(world, villager, need) {
                release_occupant(world, villager, building);
                seek_need(world, ctx, villager, need, target);
            }
        }
        return;
    }

    if let Some(need) = urgent {
        let already = matches!(state, BehaviorState::SeekingNeed { need: n, .. } if n == need);
        if !already {
            if let Some(target) = nearest_regenerator(world, villager, need) {
                seek_need(world, ctx, villager, need, target);
                return;
            }
        }
    }

    match state {
        BehaviorState::Normal => decide(world, ctx, villager),
        BehaviorState::Gathering { node } => {
            if !world.contains(node) {
                ctx.claims.release(node, villager);
                set_state(world, villager, BehaviorState::Normal);
                return;
            }
            match walk(world, villager, node, ctx.config) {
                Walk::Arrived => set_state(
                    world,
                    villager,
                    BehaviorState::AwaitingGatherCompletion {
                        node,
                        remaining: ctx.config.gathering.duration,
                    },
                ),
                Walk::Walking => {}
                Walk::Embark(port) => {
                    ctx.claims.release(node, villager);
                    board_boat(world, villager, port);
                }
                Walk::Lost => {
                    log::debug!("{:?} abandoned node {:?}", villager, node);
                    ctx.claims.release(node, villager);
                    set_state(world, villager, BehaviorState::Normal);
                }
            }
        }
        BehaviorState::AwaitingGatherCompletion { node, remaining } => {
            let remaining = remaining - dt;
            if remaining > 0.0 {
                set_state(
                    world,
                    villager,
                    BehaviorState::AwaitingGatherCompletion { node, remaining },
                );
            } else {
                complete_gather(world, ctx.claims, villager, node);
            }
        }
        BehaviorState::GoingToStorage { storage, errand } => match walk(world, villager, storage, ctx.config) {
            Walk::Arrived => match errand {
                Errand::Deposit => {
                    set_state(world, villager, BehaviorState::DepositingResource { storage })
                }
                Errand::Fetch { resource, amount } => {
                    fetch(world, villager, storage, resource, amount);
                    set_state(world, villager, BehaviorState::Normal);
                }
            },
            Walk::Walking => {}
            Walk::Embark(port) => board_boat(world, villager, port),
            Walk::Lost => set_state(world, villager, BehaviorState::Normal),
        },
        BehaviorState::DepositingResource { storage } => {
            deposit_all(world, villager, storage);
            set_state(world, villager, BehaviorState::Normal);
        }
        BehaviorState::Commuting { workplace } => {
            let still_employed = world
                .get::<&Villager>(villager)
                .map(|v| v.workplace == Some(workplace))
                .unwrap_or(false);
            if !still_employed {
                let _ = world.remove_one::<Movement>(villager);
                set_state(world, villager, BehaviorState::Normal);
                return;
            }
            match walk(world, villager, workplace, ctx.config) {
                Walk::Arrived => {
                    if let Err(err) = admit(world, villager, workplace) {
                        log::warn!("{:?} could not start work: {}", villager, err);
                        set_state(world, villager, BehaviorState::Normal);
                    }
                }
                Walk::Walking => {}
                Walk::Embark(port) => board_boat(world, villager, port),
                Walk::Lost => set_state(world, villager, BehaviorState::Normal),
            }
        }
        BehaviorState::SeekingNeed { building, .. } => match walk(world, villager, building, ctx.config) {
            Walk::Arrived => enter_regenerator(world, villager, building),
            Walk::Walking => {}
            Walk::Embark(port) => board_boat(world, villager, port),
            Walk::Lost => set_state(world, villager, BehaviorState::Normal),
        },
        BehaviorState::Inside { .. } => {}
    }
}

/// Progress toward a target entity
#[derive(Debug, Clone, Copy, PartialEq)]
enum Walk {
    Arrived,
    Walking,
    /// Standing at a dock that sails toward the target's region
    Embark(Entity),
    /// Target gone, movement expired or no route
    Lost,
}

/// Distance at which a walker counts as having reached `target`
fn reach(world: &World, target: Entity, config: &SimConfig) -> f32 {
    let radius = world.get::<&Building>(target).map(|b| b.radius).unwrap_or(0.0);
    radius + config.gathering.arrival_radius
}

fn walk(world: &World, villager: Entity, target: Entity, config: &SimConfig) -> Walk {
    let (Ok(pos), Ok(target_pos)) = (
        world.get::<&Position>(villager).map(|p| *p),
        world.get::<&Position>(target).map(|p| *p),
    ) else {
        return Walk::Lost;
    };
    if world.get::<&Movement>(villager).is_ok() {
        return Walk::Walking;
    }

    if pos.region == target_pos.region {
        if pos.pos.distance(&target_pos.pos) <= reach(world, target, config) {
            Walk::Arrived
        } else {
            Walk::Lost
        }
    } else {
        match port_towards(world, &pos, target_pos.region) {
            Some(port) => {
                let at_port = world
                    .get::<&Position>(port)
                    .map(|p| p.pos.distance(&pos.pos) <= reach(world, port, config))
                    .unwrap_or(false);
                if at_port {
                    Walk::Embark(port)
                } else {
                    Walk::Lost
                }
            }
            None => Walk::Lost,
        }
    }
}

/// Movement toward `target`, through a dock when it lies in another region
fn route(world: &World, villager: Entity, target: Entity, config: &SimConfig) -> Result<Movement, SimError> {
    let pos = *world
        .get::<&Position>(villager)
        .map_err(|_| SimError::UnknownEntity)?;
    let target_pos = *world
        .get::<&Position>(target)
        .map_err(|_| SimError::NoValidTarget)?;
    let speed = config.movement.speed;
    let expiry = config.movement.target_expiry;

    if pos.region == target_pos.region {
        let movement = Movement::new(target_pos.pos, speed, expiry);
        return Ok(if world.get::<&Building>(target).is_ok() {
            movement.into_building(target)
        } else {
            movement
        });
    }

    let port = port_towards(world, &pos, target_pos.region).ok_or(SimError::NoValidTarget)?;
    let port_pos = *world
        .get::<&Position>(port)
        .map_err(|_| SimError::NoValidTarget)?;
    Ok(Movement::new(port_pos.pos, speed, expiry)
        .into_building(port)
        .via_port(Some(port)))
}

fn reachable(world: &World, from: &Position, to: &Position) -> bool {
    from.region == to.region || port_towards(world, from, to.region).is_some()
}

/// Closest reachable candidate, preferring the villager's own region
fn nearest(world: &World, villager: Entity, candidates: Vec<(Entity, Position)>) -> Option<Entity> {
    let from = *world.get::<&Position>(villager).ok()?;
    candidates
        .into_iter()
        .filter(|(_, pos)| reachable(world, &from, pos))
        .map(|(entity, pos)| {
            let crossing = pos.region != from.region;
            (crossing, pos.pos.distance_squared(&from.pos), entity)
        })
        .min_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.2.cmp(&b.2))
        })
        .map(|(_, _, entity)| entity)
}

/// Start walking to `target` in `state`
fn go(world: &mut World, villager: Entity, target: Entity, state: BehaviorState, config: &SimConfig) -> Result<(), SimError> {
    let movement = route(world, villager, target, config)?;
    world
        .insert_one(villager, movement)
        .map_err(|_| SimError::UnknownEntity)?;
    set_state(world, villager, state);
    Ok(())
}

fn board_boat(world: &mut World, villager: Entity, port: Entity) {
    if let Err(err) = embark(world, villager, port) {
        log::debug!("{:?} could not board {:?}: {}", villager, port, err);
        set_state(world, villager, BehaviorState::Normal);
    }
}

fn nearest_regenerator(world: &World, villager: Entity, need: NeedType) -> Option<Entity> {
    let candidates = world
        .query::<(&Regenerator, &Position)>()
        .iter()
        .filter(|(_, (regen, _))| regen.need == need && regen.has_room())
        .map(|(entity, (_, pos))| (entity, *pos))
        .collect();
    nearest(world, villager, candidates)
}

fn seek_need<R: Rng>(world: &mut World, ctx: &mut BehaviorContext<'_, R>, villager: Entity, need: NeedType, building: Entity) {
    ctx.claims.release_all(villager);
    log::debug!("{:?} interrupted by {:?}", villager, need);
    if let Err(err) = go(
        world,
        villager,
        building,
        BehaviorState::SeekingNeed { need, building },
        ctx.config,
    ) {
        log::debug!("{:?} cannot reach {:?}: {}", villager, building, err);
        set_state(world, villager, BehaviorState::Normal);
    }
}

fn enter_regenerator(world: &mut World, villager: Entity, building: Entity) {
    let admitted = world
        .get::<&mut Regenerator>(building)
        .map(|mut regen| regen.admit(villager))
        .unwrap_or(false);
    if !admitted {
        // full; the interrupt picks another one next tick
        set_state(world, villager, BehaviorState::Normal);
        return;
    }
    if let Ok(center) = world.get::<&Position>(building).map(|p| *p) {
        if let Ok(mut pos) = world.get::<&mut Position>(villager) {
            *pos = center;
        }
    }
    let _ = world.remove_one::<Movement>(villager);
    set_state(world, villager, BehaviorState::Inside { building });
}

fn complete_gather(world: &mut World, claims: &mut ResourceClaims, villager: Entity, node: Entity) {
    let resource = world.get::<&ResourceNode>(node).map(|n| n.resource).ok();
    if let (Some(resource), Ok(mut inv)) = (resource, world.get::<&mut Inventory>(villager)) {
        if inv.deposit(resource, 1) == 0 {
            log::debug!("{:?} could not carry {}", villager, resource);
        }
    }
    claims.release(node, villager);
    claims.forget_node(node);
    let _ = world.despawn(node);
    set_state(world, villager, BehaviorState::Normal);
}

/// Move as much of the inventory as fits into `storage`; the rest stays carried
fn deposit_all(world: &mut World, villager: Entity, storage: Entity) {
    let (Ok(mut inv), Ok(mut site)) = (
        world.get::<&mut Inventory>(villager),
        world.get::<&mut StorageSite>(storage),
    ) else {
        return;
    };
    let Some(resource) = inv.resource() else {
        return;
    };
    let stored = site.deposit(resource, inv.quantity());
    inv.withdraw(stored);
    if !inv.is_empty() {
        log::debug!("{:?} kept {} {} (storage full)", villager, inv.quantity(), resource);
    }
}

/// Pick up `amount` of `resource` from `storage`, bounded by inventory room
fn fetch(world: &mut World, villager: Entity, storage: Entity, resource: ResourceType, amount: u32) {
    let (Ok(mut inv), Ok(mut site)) = (
        world.get::<&mut Inventory>(villager),
        world.get::<&mut StorageSite>(storage),
    ) else {
        return;
    };
    if !inv.can_accept(resource) {
        return;
    }
    let taken = site.withdraw(resource, amount.min(inv.free_space()));
    inv.deposit(resource, taken);
}

/// Choose the next errand for a villager in `Normal`
fn decide<R: Rng>(world: &mut World, ctx: &mut BehaviorContext<'_, R>, villager: Entity) {
    let workplace = world
        .get::<&Villager>(villager)
        .ok()
        .filter(|v| v.is_employed())
        .and_then(|v| v.workplace)
        .filter(|&w| world.get::<&ProductionFacility>(w).is_ok());

    let planned = match workplace {
        Some(workplace) => plan_work(world, ctx, villager, workplace),
        None => plan_gather(world, ctx, villager),
    };

    if let Err(err) = planned {
        log::trace!("{:?} idle: {}", villager, err);
        start_wander(
            world,
            villager,
            &ctx.config.movement,
            &ctx.config.world,
            &mut *ctx.rng,
        );
    }
}

/// Nearest reachable shared storage with room for `resource`
fn deposit_target(world: &World, villager: Entity, resource: ResourceType) -> Option<Entity> {
    let candidates = world
        .query::<(&StorageSite, &Position)>()
        .iter()
        .filter(|(_, (site, _))| site.is_shared() && site.free_space_for(resource) > 0)
        .map(|(entity, (_, pos))| (entity, *pos))
        .collect();
    nearest(world, villager, candidates)
}

fn go_deposit(world: &mut World, villager: Entity, resource: ResourceType, config: &SimConfig) -> Result<(), SimError> {
    let storage = deposit_target(world, villager, resource).ok_or(SimError::NoValidTarget)?;
    go(
        world,
        villager,
        storage,
        BehaviorState::GoingToStorage {
            storage,
            errand: Errand::Deposit,
        },
        config,
    )
}

/// Unemployed loop: haul when full, otherwise gather from the nearest free node
fn plan_gather<R: Rng>(world: &mut World, ctx: &mut BehaviorContext<'_, R>, villager: Entity) -> Result<(), SimError> {
    let (carried, full, empty) = {
        let inv = world
            .get::<&Inventory>(villager)
            .map_err(|_| SimError::UnknownEntity)?;
        (inv.resource(), inv.is_full(), inv.is_empty())
    };

    let holding_goods = carried.map(|r| !r.is_raw()).unwrap_or(false);
    if let (Some(resource), true) = (carried, full || holding_goods) {
        return go_deposit(world, villager, resource, ctx.config);
    }

    let candidates = world
        .query::<(&ResourceNode, &Position)>()
        .iter()
        .filter(|(entity, (node, _))| {
            carried.map(|r| r == node.resource).unwrap_or(true)
                && !ctx.claims.is_claimed_by_other(*entity, villager)
        })
        .map(|(entity, (_, pos))| (entity, *pos))
        .collect();

    match nearest(world, villager, candidates) {
        Some(node) => {
            if !ctx.claims.claim(node, villager) {
                return Err(SimError::NoValidTarget);
            }
            let gathering = go(world, villager, node, BehaviorState::Gathering { node }, ctx.config);
            if gathering.is_err() {
                ctx.claims.release(node, villager);
            }
            gathering
        }
        None => match carried {
            Some(resource) if !empty => go_deposit(world, villager, resource, ctx.config),
            _ => Err(SimError::NoValidTarget),
        },
    }
}

/// Employed loop: clear the inventory, fetch missing input, then commute
fn plan_work<R: Rng>(
    world: &mut World,
    ctx: &mut BehaviorContext<'_, R>,
    villager: Entity,
    workplace: Entity,
) -> Result<(), SimError> {
    let job = world
        .get::<&Villager>(villager)
        .map(|v| v.job)
        .map_err(|_| SimError::UnknownEntity)?;
    let (input, output) = {
        let facility = world
            .get::<&ProductionFacility>(workplace)
            .map_err(|_| SimError::UnknownEntity)?;
        let rule = facility
            .rule_for(job)
            .and_then(|i| facility.rules.get(i))
            .ok_or_else(|| SimError::InvalidAssignment {
                reason: format!("{:?} has no rule for {:?}", workplace, job),
            })?;
        (rule.input, rule.output)
    };
    let (carried, quantity, full, free) = {
        let inv = world
            .get::<&Inventory>(villager)
            .map_err(|_| SimError::UnknownEntity)?;
        (inv.resource(), inv.quantity(), inv.is_full(), inv.free_space())
    };

    // output or leftovers go to storage first
    if let Some(resource) = carried {
        let is_input = input.map(|(r, _)| r) == Some(resource);
        if !is_input {
            match go_deposit(world, villager, resource, ctx.config) {
                Ok(()) => return Ok(()),
                // no room anywhere: keep producing until the hands are full
                Err(_) if resource == output && !full => {}
                Err(err) => return Err(err),
            }
        }
    }

    if let Some((resource, needed)) = input {
        let carried_input = if carried == Some(resource) { quantity } else { 0 };
        let buffered = world
            .get::<&StorageSite>(workplace)
            .map(|site| site.quantity_of(resource))
            .unwrap_or(0);
        let have = carried_input + buffered;
        if have < needed {
            let amount = (needed - have).min(free);
            if amount == 0 {
                // carry what fits; the rest accumulates in the workshop buffer
                return go(
                    world,
                    villager,
                    workplace,
                    BehaviorState::Commuting { workplace },
                    ctx.config,
                );
            }
            let candidates = world
                .query::<(&StorageSite, &Position)>()
                .iter()
                .filter(|(_, (site, _))| site.is_shared() && site.quantity_of(resource) >= amount)
                .map(|(entity, (_, pos))| (entity, *pos))
                .collect();
            let storage = nearest(world, villager, candidates).ok_or(SimError::NoValidTarget)?;
            return go(
                world,
                villager,
                storage,
                BehaviorState::GoingToStorage {
                    storage,
                    errand: Errand::Fetch { resource, amount },
                },
                ctx.config,
            );
        }
    }

    go(
        world,
        villager,
        workplace,
        BehaviorState::Commuting { workplace },
        ctx.config,
    )
}
