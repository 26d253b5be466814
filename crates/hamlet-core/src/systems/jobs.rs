//! Job board - registry of villagers and facility-initiated hiring

use hecs::{Entity, World};

use super::events::{EventQueue, SimEvent};
use crate::components::{Job, Port, ProductionFacility, Regenerator, Villager};
use crate::error::SimError;

/// Live villager registry plus the hiring rate limit (stored in engine)
#[derive(Debug, Clone, Default)]
pub struct JobBoard {
    villagers: Vec<Entity>,
    hire_cooldown: f32,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a villager; registering twice is a no-op
    pub fn register(&mut self, villager: Entity) {
        if !self.villagers.contains(&villager) {
            self.villagers.push(villager);
        }
    }

    /// Remove a villager and drop it from every building that references it.
    ///
    /// Returns the facility it worked for, which now has an opening.
    pub fn unregister(&mut self, world: &mut World, villager: Entity) -> Option<Entity> {
        self.villagers.retain(|&v| v != villager);

        let mut workplace = None;
        for (entity, facility) in world.query_mut::<&mut ProductionFacility>() {
            if facility.remove_worker(villager) {
                workplace = Some(entity);
            }
            facility.remove_occupant(villager);
        }
        for (_, regen) in world.query_mut::<&mut Regenerator>() {
            regen.release(villager);
        }
        for (_, port) in world.query_mut::<&mut Port>() {
            port.remove_passenger(villager);
        }
        workplace
    }

    pub fn is_registered(&self, villager: Entity) -> bool {
        self.villagers.contains(&villager)
    }

    pub fn villagers(&self) -> &[Entity] {
        &self.villagers
    }

    pub fn len(&self) -> usize {
        self.villagers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.villagers.is_empty()
    }

    /// First registered villager without a job, in registration order
    pub fn find_unassigned(&self, world: &World) -> Option<Entity> {
        self.villagers.iter().copied().find(|&v| {
            world
                .get::<&Villager>(v)
                .map(|villager| !villager.is_employed())
                .unwrap_or(false)
        })
    }

    /// Give `villager` the facility's job, atomically on both sides
    pub fn hire(&self, world: &mut World, villager: Entity, facility: Entity) -> Result<Job, SimError> {
        if !self.is_registered(villager) {
            return Err(SimError::UnknownEntity);
        }
        {
            let person = world
                .get::<&Villager>(villager)
                .map_err(|_| SimError::UnknownEntity)?;
            if person.is_employed() {
                return Err(SimError::InvalidAssignment {
                    reason: format!("{:?} already works as {:?}", villager, person.job),
                });
            }
        }

        let job = {
            let mut workplace = world
                .get::<&mut ProductionFacility>(facility)
                .map_err(|_| SimError::UnknownEntity)?;
            if !workplace.add_worker(villager) {
                return Err(SimError::InvalidAssignment {
                    reason: format!("{:?} has no opening", facility),
                });
            }
            workplace.job
        };

        if let Ok(mut person) = world.get::<&mut Villager>(villager) {
            person.job = job;
            person.workplace = Some(facility);
        }
        log::info!("{:?} hired as {:?} at {:?}", villager, job, facility);
        Ok(job)
    }

    /// Make `villager` unemployed again, releasing its facility slot
    pub fn fire(&self, world: &mut World, villager: Entity) -> Option<Entity> {
        let workplace = {
            let mut person = world.get::<&mut Villager>(villager).ok()?;
            person.job = Job::None;
            person.workplace.take()
        }?;
        if let Ok(mut facility) = world.get::<&mut ProductionFacility>(workplace) {
            facility.remove_worker(villager);
        }
        Some(workplace)
    }
}

/// Let one facility with an opening hire per interval.
///
/// Facilities are polled in entity order; the rate limit keeps a burst of
/// openings (startup, a new building) from hiring everyone in one tick.
pub fn hiring_system(
    world: &mut World,
    board: &mut JobBoard,
    events: &mut EventQueue,
    interval: f32,
    delta_seconds: f32,
) {
    board.hire_cooldown = (board.hire_cooldown - delta_seconds).max(0.0);
    if board.hire_cooldown > 0.0 {
        return;
    }

    let mut openings: Vec<Entity> = world
        .query::<&ProductionFacility>()
        .iter()
        .filter(|(_, facility)| facility.has_opening())
        .map(|(entity, _)| entity)
        .collect();
    if openings.is_empty() {
        return;
    }
    openings.sort();

    let Some(villager) = board.find_unassigned(world) else {
        return;
    };
    match board.hire(world, villager, openings[0]) {
        Ok(job) => {
            events.push(SimEvent::WorkerHired {
                villager,
                facility: openings[0],
                job,
            });
            board.hire_cooldown = interval;
        }
        Err(err) => log::warn!("hire skipped: {}", err),
    }
}
