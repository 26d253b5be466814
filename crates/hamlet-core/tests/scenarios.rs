//! End-to-end settlement scenarios driven through the engine API.
//!
//! Each test builds a tiny settlement by hand, steps the full tick pipeline
//! and checks the observable outcome: inventories, storage, ledger totals,
//! behavior states and events.

use hamlet_core::components::{
    Behavior, BehaviorState, BuildingKind, Inventory, Job, NeedType, Needs, Position,
    ProductionFacility, ResourceType, SlotState, StorageSite, Villager,
};
use hamlet_core::engine::SimulationEngine;
use hamlet_core::error::SimError;
use hamlet_core::systems::{spawn_building, SimEvent};
use hecs::Entity;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Helpers ────────────────────────────────────────────────────────────

fn run(engine: &mut SimulationEngine, seconds: f32, step: f32) {
    let ticks = (seconds / step).round() as usize;
    for _ in 0..ticks {
        engine.update(step);
    }
}

/// Place a building without paying for it
fn place(engine: &mut SimulationEngine, kind: BuildingKind, x: f32, y: f32) -> Entity {
    spawn_building(&mut engine.world, kind, Position::new(x, y, 0), &engine.config)
}

fn stock(engine: &mut SimulationEngine, site: Entity, resource: ResourceType, amount: u32) {
    let stored = engine
        .world
        .get::<&mut StorageSite>(site)
        .unwrap()
        .deposit(resource, amount);
    assert_eq!(stored, amount);
}

fn state(engine: &SimulationEngine, villager: Entity) -> BehaviorState {
    engine.world.get::<&Behavior>(villager).unwrap().state
}

// ── Scenario A: gathering ──────────────────────────────────────────────

#[test]
fn unemployed_villager_gathers_one_wood() {
    let mut engine = SimulationEngine::new();
    let villager = engine.spawn_agent(Position::new(10.0, 10.0, 0));
    let tree = engine.spawn_resource_node(ResourceType::Wood, Position::new(11.0, 10.0, 0));

    engine.update(0.1);
    assert_eq!(state(&engine, villager), BehaviorState::Gathering { node: tree });
    assert_eq!(engine.claims.holder(tree), Some(villager));

    run(&mut engine, 8.0, 0.1);

    let info = engine.agent_info(villager).unwrap();
    assert_eq!(info.inventory, Some((ResourceType::Wood, 1)));
    assert!(!engine.world.contains(tree));
    assert!(engine.claims.is_empty());
}

#[test]
fn gathered_wood_reaches_the_warehouse() {
    let mut engine = SimulationEngine::new();
    let warehouse = place(&mut engine, BuildingKind::Warehouse, 20.0, 10.0);
    let villager = engine.spawn_agent(Position::new(10.0, 10.0, 0));
    for i in 0..5 {
        engine.spawn_resource_node(ResourceType::Wood, Position::new(8.0, 8.0 + i as f32, 0));
    }

    run(&mut engine, 60.0, 0.1);

    let stored = engine
        .storage_info(warehouse)
        .unwrap()
        .contents
        .get(&ResourceType::Wood)
        .copied()
        .unwrap_or(0);
    assert_eq!(stored, 5);
    assert!(engine.world.get::<&Inventory>(villager).unwrap().is_empty());
    assert_eq!(engine.ledger_snapshot().get(ResourceType::Wood), 5);
}

// ── Scenario B: production from the facility buffer ────────────────────

fn bakery_with_worker(has_tool: bool) -> (SimulationEngine, Entity, Entity) {
    let mut engine = SimulationEngine::new();

    let bakery = place(&mut engine, BuildingKind::Bakery, 20.0, 20.0);
    stock(&mut engine, bakery, ResourceType::Wheat, 10);
    let baker = engine.spawn_agent(Position::new(20.0, 20.0, 0));
    engine.world.get::<&mut Villager>(baker).unwrap().has_tool = has_tool;
    assert_eq!(engine.hire(baker, bakery), Ok(Job::Baker));
    (engine, bakery, baker)
}

fn first_slot(engine: &SimulationEngine, facility: Entity) -> SlotState {
    engine
        .world
        .get::<&ProductionFacility>(facility)
        .unwrap()
        .occupants()[0]
        .slot
}

#[test]
fn baker_draws_input_from_buffer_and_restarts() {
    let (mut engine, bakery, baker) = bakery_with_worker(false);

    run(&mut engine, 1.0, 0.5);
    assert_eq!(state(&engine, baker), BehaviorState::Inside { building: bakery });
    assert_eq!(
        engine.world.get::<&StorageSite>(bakery).unwrap().quantity_of(ResourceType::Wheat),
        5
    );

    // one tick short of the 30 s cycle
    run(&mut engine, 29.5, 0.5);
    assert!(engine.world.get::<&Inventory>(baker).unwrap().is_empty());

    run(&mut engine, 1.5, 0.5);
    let info = engine.agent_info(baker).unwrap();
    assert_eq!(info.inventory, Some((ResourceType::Bread, 5)));
    assert_eq!(
        engine.world.get::<&StorageSite>(bakery).unwrap().quantity_of(ResourceType::Wheat),
        0
    );
    match first_slot(&engine, bakery) {
        SlotState::Producing { remaining, .. } => assert!(remaining > 25.0),
        other => panic!("expected a restarted cycle, got {:?}", other),
    }
}

#[test]
fn full_baker_leaves_to_deposit() {
    let (mut engine, bakery, baker) = bakery_with_worker(false);

    // first batch fills the inventory, the second has nowhere to go
    run(&mut engine, 65.0, 0.5);
    assert_ne!(state(&engine, baker), BehaviorState::Inside { building: bakery });
    assert!(engine
        .world
        .get::<&ProductionFacility>(bakery)
        .unwrap()
        .occupants()
        .is_empty());
    assert_eq!(
        engine.agent_info(baker).unwrap().inventory,
        Some((ResourceType::Bread, 5))
    );
    // the rejected batch's wheat is back in the buffer
    assert_eq!(
        engine.world.get::<&StorageSite>(bakery).unwrap().quantity_of(ResourceType::Wheat),
        5
    );
}

#[test]
fn tool_halves_the_cycle() {
    let (mut engine, bakery, baker) = bakery_with_worker(true);

    run(&mut engine, 15.5, 0.5);
    assert!(engine.world.get::<&Inventory>(baker).unwrap().is_empty());
    run(&mut engine, 2.0, 0.5);
    assert_eq!(
        engine.agent_info(baker).unwrap().inventory,
        Some((ResourceType::Bread, 5))
    );
    assert!(matches!(first_slot(&engine, bakery), SlotState::Producing { .. }));
}

// ── Employed loop: fetch, produce, deliver ─────────────────────────────

fn stored(engine: &SimulationEngine, site: Entity, resource: ResourceType) -> u32 {
    engine
        .storage_info(site)
        .unwrap()
        .contents
        .get(&resource)
        .copied()
        .unwrap_or(0)
}

/// Workshop at (10, 10), warehouse east of its door holding `input`, and
/// one hired worker standing between the two
fn workshop_loop(
    kind: BuildingKind,
    input: (ResourceType, u32),
) -> (SimulationEngine, Entity, Entity, Entity) {
    let mut engine = SimulationEngine::new();
    let workshop = place(&mut engine, kind, 10.0, 10.0);
    let warehouse = place(&mut engine, BuildingKind::Warehouse, 25.0, 10.0);
    stock(&mut engine, warehouse, input.0, input.1);
    let worker = engine.spawn_agent(Position::new(19.0, 10.0, 0));
    engine.hire(worker, workshop).unwrap();
    (engine, workshop, warehouse, worker)
}

#[test]
fn baker_turns_warehouse_wheat_into_stored_bread() {
    let (mut engine, bakery, warehouse, baker) =
        workshop_loop(BuildingKind::Bakery, (ResourceType::Wheat, 20));

    let mut inside_ticks = 0;
    for _ in 0..900 {
        engine.update(0.1);
        if state(&engine, baker) == (BehaviorState::Inside { building: bakery }) {
            inside_ticks += 1;
        }
    }

    assert!(inside_ticks >= 300, "only {} ticks inside", inside_ticks);
    assert!(stored(&engine, warehouse, ResourceType::Bread) >= 5);
    assert!(stored(&engine, warehouse, ResourceType::Wheat) <= 15);
}

#[test]
fn carpenter_turns_warehouse_wood_into_stored_planks() {
    let (mut engine, _, warehouse, _) =
        workshop_loop(BuildingKind::Sawmill, (ResourceType::Wood, 20));

    run(&mut engine, 60.0, 0.1);

    assert!(stored(&engine, warehouse, ResourceType::Plank) >= 2);
    assert!(stored(&engine, warehouse, ResourceType::Wood) <= 18);
    // wood only disappears into planks, with at most one batch in the saw
    let snapshot = engine.ledger_snapshot();
    let buffered = engine
        .world
        .query::<&StorageSite>()
        .iter()
        .filter(|(_, site)| !site.is_shared())
        .map(|(_, site)| site.quantity_of(ResourceType::Wood))
        .sum::<u32>();
    let planks = snapshot.get(ResourceType::Plank);
    let total = snapshot.get(ResourceType::Wood) + buffered + planks;
    assert!(total == 20 || total == 18, "wood accounting off: {}", total);
}

// ── Scenario C: transactional spend ────────────────────────────────────

#[test]
fn short_spend_withdraws_nothing() {
    let mut engine = SimulationEngine::new();
    let a = place(&mut engine, BuildingKind::Warehouse, 10.0, 10.0);
    let b = place(&mut engine, BuildingKind::Warehouse, 20.0, 10.0);
    stock(&mut engine, a, ResourceType::Wood, 20);
    stock(&mut engine, b, ResourceType::Wood, 7);
    let carrier = engine.spawn_agent(Position::new(30.0, 30.0, 0));
    engine
        .world
        .get::<&mut Inventory>(carrier)
        .unwrap()
        .deposit(ResourceType::Wood, 3);

    assert_eq!(engine.ledger_snapshot().get(ResourceType::Wood), 30);
    assert!(!engine.ledger.spend(&mut engine.world, ResourceType::Wood, 50));
    assert_eq!(engine.ledger_snapshot().get(ResourceType::Wood), 30);
    assert_eq!(engine.world.get::<&Inventory>(carrier).unwrap().quantity(), 3);

    // exactly the total drains every source
    assert!(engine.ledger.spend(&mut engine.world, ResourceType::Wood, 30));
    assert_eq!(engine.ledger_snapshot().get(ResourceType::Wood), 0);
    assert!(engine.world.get::<&Inventory>(carrier).unwrap().is_empty());
}

#[test]
fn unaffordable_build_leaves_stock_untouched() {
    let mut engine = SimulationEngine::new();
    let a = place(&mut engine, BuildingKind::Warehouse, 10.0, 10.0);
    stock(&mut engine, a, ResourceType::Wood, 20);
    stock(&mut engine, a, ResourceType::Stone, 4);

    let result = engine.request_build(BuildingKind::Canteen, Position::new(30.0, 10.0, 0));
    assert_eq!(
        result,
        Err(SimError::InsufficientResources {
            resource: ResourceType::Stone,
            required: 5,
            available: 4
        })
    );
    let snapshot = engine.ledger_snapshot();
    assert_eq!(snapshot.get(ResourceType::Wood), 20);
    assert_eq!(snapshot.get(ResourceType::Stone), 4);
}

// ── Scenario D: needs interrupt ────────────────────────────────────────

#[test]
fn hunger_interrupts_gathering_and_resumes() {
    let mut engine = SimulationEngine::new();
    let canteen = place(&mut engine, BuildingKind::Canteen, 14.0, 30.0);
    let villager = engine.spawn_agent(Position::new(20.0, 30.0, 0));
    let tree = engine.spawn_resource_node(ResourceType::Wood, Position::new(70.0, 30.0, 0));
    engine.world.get::<&mut Needs>(villager).unwrap().hunger = 22.0;

    engine.update(0.1);
    assert_eq!(state(&engine, villager), BehaviorState::Gathering { node: tree });

    let mut interrupted = false;
    let mut regenerated = false;
    let mut resumed = false;
    for _ in 0..600 {
        engine.update(0.1);
        match state(&engine, villager) {
            BehaviorState::SeekingNeed { need, building } => {
                assert_eq!(need, NeedType::Hunger);
                assert_eq!(building, canteen);
                assert!(engine.claims.holder(tree).is_none());
                interrupted = true;
            }
            BehaviorState::Inside { building } => {
                assert_eq!(building, canteen);
                regenerated = true;
            }
            BehaviorState::Gathering { node } if regenerated => {
                assert_eq!(node, tree);
                assert!(engine.world.get::<&Needs>(villager).unwrap().hunger > 90.0);
                resumed = true;
                break;
            }
            _ => {}
        }
    }
    assert!(interrupted && regenerated && resumed);
}

#[test]
fn starvation_kills_and_releases_claim() {
    let mut engine = SimulationEngine::new();
    let villager = engine.spawn_agent(Position::new(10.0, 10.0, 0));
    let rock = engine.spawn_resource_node(ResourceType::Stone, Position::new(40.0, 10.0, 0));
    engine.update(0.1);
    assert_eq!(engine.claims.holder(rock), Some(villager));

    engine.world.get::<&mut Needs>(villager).unwrap().health = 0.0;
    engine.update(0.1);

    assert!(!engine.world.contains(villager));
    assert!(engine.claims.is_empty());
    assert_eq!(engine.population(), 0);
    assert!(engine
        .drain_events()
        .iter()
        .any(|e| matches!(e, SimEvent::VillagerDied { .. })));
}

// ── Scenario E: demolition refund ──────────────────────────────────────

#[test]
fn demolition_refund_is_capped_by_free_space() {
    let mut engine = SimulationEngine::new();
    let keep = place(&mut engine, BuildingKind::Warehouse, 10.0, 10.0);
    stock(&mut engine, keep, ResourceType::Wood, 20);

    // the new warehouse uses up all the wood
    let doomed = engine
        .request_build(BuildingKind::Warehouse, Position::new(20.0, 10.0, 0))
        .unwrap();
    assert_eq!(engine.ledger_snapshot().get(ResourceType::Wood), 0);
    stock(&mut engine, keep, ResourceType::Wood, 15);
    engine.drain_events();

    let report = engine.request_demolish(doomed).unwrap();
    assert_eq!(report.refunded.amount_of(ResourceType::Wood), 5);
    assert_eq!(report.lost.amount_of(ResourceType::Wood), 5);
    assert_eq!(engine.ledger_snapshot().get(ResourceType::Wood), 20);
    assert_eq!(
        engine.drain_events(),
        vec![SimEvent::BuildingDemolished {
            kind: BuildingKind::Warehouse,
            lost: 5
        }]
    );
}

#[test]
fn demolition_refund_fits_entirely() {
    let mut engine = SimulationEngine::new();
    let keep = place(&mut engine, BuildingKind::Warehouse, 10.0, 10.0);
    stock(&mut engine, keep, ResourceType::Wood, 20);
    let doomed = engine
        .request_build(BuildingKind::Warehouse, Position::new(20.0, 10.0, 0))
        .unwrap();

    let report = engine.request_demolish(doomed).unwrap();
    assert_eq!(report.refunded.amount_of(ResourceType::Wood), 10);
    assert_eq!(report.lost_units(), 0);
    assert_eq!(engine.ledger_snapshot().get(ResourceType::Wood), 10);
}

// ── Job board invariants ───────────────────────────────────────────────

#[test]
fn job_board_never_double_books() {
    let mut engine = SimulationEngine::new();
    let mut rng = StdRng::seed_from_u64(77);
    let facilities = [
        place(&mut engine, BuildingKind::Farm, 10.0, 10.0),
        place(&mut engine, BuildingKind::Quarry, 30.0, 10.0),
        place(&mut engine, BuildingKind::Bakery, 50.0, 10.0),
    ];

    for step in 0..400 {
        match rng.gen_range(0..3) {
            0 => {
                let x = rng.gen_range(5.0..70.0);
                engine.spawn_agent(Position::new(x, 40.0, 0));
            }
            1 => {
                let villagers = engine.villagers();
                if !villagers.is_empty() {
                    let v = villagers[rng.gen_range(0..villagers.len())];
                    let f = facilities[rng.gen_range(0..facilities.len())];
                    // refusals are expected; only the invariant matters
                    let _ = engine.hire(v, f);
                }
            }
            _ => {
                let villagers = engine.villagers();
                if !villagers.is_empty() {
                    let v = villagers[rng.gen_range(0..villagers.len())];
                    engine.world.get::<&mut Needs>(v).unwrap().health = 0.0;
                }
            }
        }
        engine.update(0.25);

        let mut seen = std::collections::HashSet::new();
        for &f in &facilities {
            let facility = engine.world.get::<&ProductionFacility>(f).unwrap();
            assert!(facility.workers().len() as u32 <= facility.capacity, "step {}", step);
            assert!(facility.occupants().len() <= facility.workers().len());
            for &w in facility.workers() {
                assert!(seen.insert(w), "step {}: {:?} booked twice", step, w);
                assert!(engine.world.contains(w));
                let person = engine.world.get::<&Villager>(w).unwrap();
                assert_eq!(person.workplace, Some(f));
            }
        }
        assert_eq!(engine.job_board.len() as u32, engine.population());
    }
}
