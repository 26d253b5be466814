//! Production system - occupancy and per-occupant production timers
//!
//! A hired villager that reaches its workplace is admitted as an occupant
//! and disappears inside. Each occupant runs its own cycle: draw the rule's
//! input, count down, deliver the output into the occupant's inventory and
//! start again. An occupant leaves when a finished output does not fit its
//! inventory (the cycle's input goes back to the buffer) or the input stays
//! missing for too long.

use hecs::{Entity, World};
use rand::Rng;

use super::events::{EventQueue, SimEvent};
use super::ledger::ResourceLedger;
use crate::components::{
    Behavior, BehaviorState, Building, Inventory, Movement, Position, ProductionFacility,
    ProductionRule, SlotState, StorageSite, Vec2, Villager,
};
use crate::error::SimError;

/// Distance outside the footprint where released villagers are placed
const DOOR_MARGIN: f32 = 0.5;

/// Put `villager` back on the ground at the building's door, ready to decide again
pub fn step_outside(world: &mut World, villager: Entity, building: Entity) {
    let door = door_position(world, building);
    if let (Some(door), Ok(mut pos)) = (door, world.get::<&mut Position>(villager)) {
        *pos = door;
    }
    if let Ok(mut behavior) = world.get::<&mut Behavior>(villager) {
        behavior.state = BehaviorState::Normal;
    }
    let _ = world.remove_one::<Movement>(villager);
}

/// Ground position just outside a building's footprint
pub fn door_position(world: &World, building: Entity) -> Option<Position> {
    let pos = *world.get::<&Position>(building).ok()?;
    let radius = world
        .get::<&Building>(building)
        .map(|b| b.radius)
        .unwrap_or(1.5);
    Some(Position::at(pos.pos + Vec2::new(radius + DOOR_MARGIN, 0.0), pos.region))
}

/// Take a hired worker inside its facility and start its first cycle
pub fn admit(world: &mut World, villager: Entity, facility: Entity) -> Result<(), SimError> {
    let (job, center) = {
        let person = world
            .get::<&Villager>(villager)
            .map_err(|_| SimError::UnknownEntity)?;
        let center = *world
            .get::<&Position>(facility)
            .map_err(|_| SimError::UnknownEntity)?;
        (person.job, center)
    };

    {
        let mut workplace = world
            .get::<&mut ProductionFacility>(facility)
            .map_err(|_| SimError::UnknownEntity)?;
        if !workplace.is_worker(villager) {
            return Err(SimError::InvalidAssignment {
                reason: format!("{:?} does not work at {:?}", villager, facility),
            });
        }
        if workplace.rule_for(job).is_none() {
            return Err(SimError::InvalidAssignment {
                reason: format!("{:?} has no rule for {:?}", facility, job),
            });
        }
        if !workplace.add_occupant(villager, SlotState::Idle) {
            return Err(SimError::CapacityExceeded {
                what: format!("facility {:?}", facility),
            });
        }
    }

    if let Ok(mut behavior) = world.get::<&mut Behavior>(villager) {
        behavior.state = BehaviorState::Inside { building: facility };
    }
    if let Ok(mut pos) = world.get::<&mut Position>(villager) {
        *pos = center;
    }
    let _ = world.remove_one::<Movement>(villager);
    log::debug!("{:?} entered {:?}", villager, facility);
    Ok(())
}

/// Remove an occupant and put it outside
pub fn release_occupant(world: &mut World, villager: Entity, facility: Entity) {
    if let Ok(mut workplace) = world.get::<&mut ProductionFacility>(facility) {
        workplace.remove_occupant(villager);
    }
    step_outside(world, villager, facility);
}

/// Try to begin a cycle of `rule` for `villager`.
///
/// Carried input is first moved into the facility's own buffer, then the
/// rule's quantity is drawn from the buffer or, failing that, straight from
/// the inventory. With `require_room` set, returns `None` when the emptied
/// inventory still could not take the output, meaning the villager should
/// leave.
fn start_cycle(
    world: &mut World,
    facility: Entity,
    villager: Entity,
    rule_index: usize,
    require_room: bool,
) -> Option<SlotState> {
    let (rule, duration) = {
        let workplace = world.get::<&ProductionFacility>(facility).ok()?;
        let rule: ProductionRule = *workplace.rules.get(rule_index)?;
        let has_tool = world
            .get::<&Villager>(villager)
            .map(|v| v.has_tool)
            .unwrap_or(false);
        (rule, workplace.cycle_duration(rule_index, has_tool))
    };

    let mut inv = world.get::<&mut Inventory>(villager).ok()?;
    let mut buffer = world.get::<&mut StorageSite>(facility).ok();

    if let (Some((input, _)), Some(buffer)) = (rule.input, buffer.as_mut()) {
        let carried = inv.quantity_of(input);
        if carried > 0 {
            let stored = buffer.deposit(input, carried);
            inv.withdraw(stored);
        }
    }
    if require_room && !output_fits(&inv, &rule) {
        return None;
    }

    let Some((input, quantity)) = rule.input else {
        return Some(SlotState::Producing {
            rule: rule_index,
            remaining: duration,
        });
    };

    let drawn = match buffer.as_mut() {
        Some(buffer) if buffer.quantity_of(input) >= quantity => {
            buffer.withdraw(input, quantity) == quantity
        }
        _ => false,
    };
    let drawn = drawn || (inv.quantity_of(input) >= quantity && inv.withdraw(quantity) == quantity);

    if drawn {
        Some(SlotState::Producing {
            rule: rule_index,
            remaining: duration,
        })
    } else {
        Some(SlotState::Blocked {
            rule: rule_index,
            waited: 0.0,
        })
    }
}

/// Put a rejected cycle's input back into the workshop buffer
fn return_input(world: &mut World, facility: Entity, rule_index: usize) {
    let input = world
        .get::<&ProductionFacility>(facility)
        .ok()
        .and_then(|w| w.rules.get(rule_index).and_then(|r| r.input));
    let Some((resource, quantity)) = input else {
        return;
    };
    let returned = world
        .get::<&mut StorageSite>(facility)
        .map(|mut buffer| buffer.deposit(resource, quantity))
        .unwrap_or(0);
    if returned < quantity {
        log::warn!(
            "{:?} lost {} {} from a rejected cycle",
            facility,
            quantity - returned,
            resource
        );
    }
}

fn output_fits(inv: &Inventory, rule: &ProductionRule) -> bool {
    rule.output.is_virtual()
        || (inv.can_accept(rule.output) && inv.free_space() >= rule.output_quantity)
}

/// What to do with one occupant after this tick
enum SlotUpdate {
    Keep(SlotState),
    Leave,
}

/// Advance every occupant's production timer by `delta_seconds`
pub fn production_system(
    world: &mut World,
    ledger: &mut ResourceLedger,
    events: &mut EventQueue,
    rng: &mut impl Rng,
    blocked_patience: f32,
    delta_seconds: f32,
) {
    let mut occupants: Vec<(Entity, Entity, SlotState)> = Vec::new();
    for (facility, workplace) in world.query::<&ProductionFacility>().iter() {
        for occupant in workplace.occupants() {
            occupants.push((facility, occupant.villager, occupant.slot));
        }
    }
    occupants.sort_by_key(|(facility, villager, _)| (*facility, *villager));

    for (facility, villager, slot) in occupants {
        let rule_index = {
            let job = world.get::<&Villager>(villager).map(|v| v.job);
            let workplace = world.get::<&ProductionFacility>(facility);
            match (job, workplace) {
                (Ok(job), Ok(workplace)) => workplace.rule_for(job),
                _ => None,
            }
        };
        let Some(rule_index) = rule_index else {
            release_occupant(world, villager, facility);
            continue;
        };

        let update = match slot {
            SlotState::Idle => match start_cycle(world, facility, villager, rule_index, true) {
                Some(next) => {
                    report_blocked(world, events, facility, villager, rule_index, &next);
                    SlotUpdate::Keep(next)
                }
                None => SlotUpdate::Leave,
            },
            SlotState::Producing { rule, remaining } => {
                let remaining = remaining - delta_seconds;
                if remaining > 0.0 {
                    SlotUpdate::Keep(SlotState::Producing { rule, remaining })
                } else if deliver(world, ledger, events, rng, facility, villager, rule) {
                    match start_cycle(world, facility, villager, rule, false) {
                        Some(next) => SlotUpdate::Keep(next),
                        None => SlotUpdate::Leave,
                    }
                } else {
                    log::debug!("{:?} has no room for the output of {:?}", villager, facility);
                    return_input(world, facility, rule);
                    SlotUpdate::Leave
                }
            }
            SlotState::Blocked { rule, waited } => match start_cycle(world, facility, villager, rule, true) {
                Some(SlotState::Blocked { .. }) => {
                    let waited = waited + delta_seconds;
                    if waited >= blocked_patience {
                        SlotUpdate::Leave
                    } else {
                        SlotUpdate::Keep(SlotState::Blocked { rule, waited })
                    }
                }
                Some(next) => SlotUpdate::Keep(next),
                None => SlotUpdate::Leave,
            },
        };

        match update {
            SlotUpdate::Keep(next) => {
                if let Ok(mut workplace) = world.get::<&mut ProductionFacility>(facility) {
                    if let Some(occupant) = workplace.occupant_mut(villager) {
                        occupant.slot = next;
                    }
                }
            }
            SlotUpdate::Leave => release_occupant(world, villager, facility),
        }
    }
}

fn report_blocked(
    world: &World,
    events: &mut EventQueue,
    facility: Entity,
    villager: Entity,
    rule_index: usize,
    slot: &SlotState,
) {
    if !matches!(slot, SlotState::Blocked { .. }) {
        return;
    }
    let missing = world
        .get::<&ProductionFacility>(facility)
        .ok()
        .and_then(|w| w.rules.get(rule_index).and_then(|r| r.input))
        .map(|(resource, _)| resource);
    if let Some(missing) = missing {
        log::warn!("{:?} blocked at {:?}: no {}", villager, facility, missing);
        events.push(SimEvent::ProductionBlocked {
            facility,
            villager,
            missing,
        });
    }
}

/// Hand a finished cycle's output to the villager (or the ledger for
/// virtual outputs). Returns false if the inventory could not take it.
fn deliver(
    world: &mut World,
    ledger: &mut ResourceLedger,
    events: &mut EventQueue,
    rng: &mut impl Rng,
    facility: Entity,
    villager: Entity,
    rule_index: usize,
) -> bool {
    let rule = match world
        .get::<&ProductionFacility>(facility)
        .ok()
        .and_then(|w| w.rules.get(rule_index).copied())
    {
        Some(rule) => rule,
        None => return false,
    };

    if rule.output.is_virtual() {
        ledger.add(rule.output, rule.output_quantity);
    } else {
        let Ok(mut inv) = world.get::<&mut Inventory>(villager) else {
            return false;
        };
        if !output_fits(&inv, &rule) {
            return false;
        }
        inv.deposit(rule.output, rule.output_quantity);
    }
    log::debug!(
        "{:?} produced {} {} at {:?}",
        villager,
        rule.output_quantity,
        rule.output,
        facility
    );

    if rule.distributes_tool {
        for _ in 0..rule.output_quantity {
            if let Some(recipient) = distribute_tool(world, rng) {
                events.push(SimEvent::ToolDistributed { villager: recipient });
            }
        }
    }
    true
}

/// Equip one random tool-less villager
fn distribute_tool(world: &mut World, rng: &mut impl Rng) -> Option<Entity> {
    let mut candidates: Vec<Entity> = world
        .query::<&Villager>()
        .iter()
        .filter(|(_, v)| !v.has_tool)
        .map(|(entity, _)| entity)
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort();
    let chosen = candidates[rng.gen_range(0..candidates.len())];
    if let Ok(mut person) = world.get::<&mut Villager>(chosen) {
        person.has_tool = true;
    }
    log::info!("{:?} received a tool", chosen);
    Some(chosen)
}
