//! Hamlet Headless Simulation Harness
//!
//! Validates the settlement simulation without a renderer.
//! Runs entirely in-process: generates a settlement, steps it for a few
//! simulated minutes and checks the core invariants along the way.
//!
//! Usage:
//!   cargo run -p hamlet-simtest
//!   cargo run -p hamlet-simtest -- --verbose
//!   cargo run -p hamlet-simtest -- --config settings.json

use std::collections::HashSet;
use std::path::PathBuf;

use hamlet_core::components::{
    Behavior, BuildingKind, Inventory, Position, ProductionFacility, Regenerator, ResourceType,
    StorageSite, Villager,
};
use hamlet_core::config::SimConfig;
use hamlet_core::engine::{SimulationEngine, VillagerInfo};
use hamlet_core::generation::SettlementConfig;
use hamlet_core::progression::{Age, TechTree};
use hamlet_core::systems::{LedgerSnapshot, SimEvent};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Simulated seconds per tick
const STEP: f32 = 0.25;
/// Simulated run length
const RUN_SECONDS: f32 = 300.0;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

/// State dump printed with --verbose
#[derive(Serialize)]
struct Snapshot {
    sim_time: f64,
    age: Age,
    ledger: LedgerSnapshot,
    villagers: Vec<VillagerInfo>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    println!("=== Hamlet Simulation Harness ===\n");

    let config = match config_path {
        Some(path) => match SimConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => SimConfig::default(),
    };

    let mut results = Vec::new();

    // 1. Configuration
    results.extend(validate_config(&config));

    // 2. Building catalog
    results.extend(validate_catalog(verbose));

    // 3. Tech tree
    results.extend(validate_tech_tree(verbose));

    // 4. Settlement run
    results.extend(validate_settlement_run(&config, verbose));

    // 5. Build / demolish economy
    results.extend(validate_economy(&config));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_config(config: &SimConfig) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    let valid = config.validate();
    results.push(TestResult {
        name: "config_valid".into(),
        passed: valid.is_ok(),
        detail: match valid {
            Ok(()) => "active configuration validates".into(),
            Err(e) => e.to_string(),
        },
    });

    let round_trip = serde_json::to_string(config)
        .map_err(|e| e.to_string())
        .and_then(|json| SimConfig::from_json_str(&json).map_err(|e| e.to_string()));
    results.push(TestResult {
        name: "config_json_round_trip".into(),
        passed: round_trip.as_ref().map(|c| c == config).unwrap_or(false),
        detail: match round_trip {
            Ok(_) => "serialized config parses back identically".into(),
            Err(e) => e,
        },
    });

    let rising = SimConfig::from_json_str(r#"{"ages": {"speed_multipliers": [1.0, 0.8, 0.9, 0.5]}}"#);
    results.push(TestResult {
        name: "config_rejects_rising_age_table".into(),
        passed: rising.is_err(),
        detail: "non-decreasing speed table is refused".into(),
    });

    results
}

// ── 2. Building Catalog ─────────────────────────────────────────────────

fn validate_catalog(verbose: bool) -> Vec<TestResult> {
    println!("--- Building Catalog ---");
    let mut results = Vec::new();

    let free: Vec<_> = BuildingKind::ALL
        .iter()
        .filter(|k| k.cost().is_empty())
        .collect();
    results.push(TestResult {
        name: "catalog_costs".into(),
        passed: free.is_empty(),
        detail: if free.is_empty() {
            "every building has a cost".into()
        } else {
            format!("{} buildings are free: {:?}", free.len(), free)
        },
    });

    // every workplace rule recruits for the building's own job
    let mismatched: Vec<_> = BuildingKind::ALL
        .iter()
        .filter(|k| {
            let spec = k.spec();
            spec.rules.iter().any(|r| r.job != spec.job)
        })
        .collect();
    results.push(TestResult {
        name: "catalog_rule_jobs".into(),
        passed: mismatched.is_empty(),
        detail: format!("{} buildings with mismatched rules", mismatched.len()),
    });

    // input-consuming workshops need somewhere to buffer input
    let unbuffered: Vec<_> = BuildingKind::ALL
        .iter()
        .filter(|k| {
            let spec = k.spec();
            spec.rules.iter().any(|r| r.input.is_some()) && spec.storage.is_none()
        })
        .collect();
    results.push(TestResult {
        name: "catalog_input_buffers".into(),
        passed: unbuffered.is_empty(),
        detail: format!("{} workshops without an input buffer", unbuffered.len()),
    });

    let names_ok = BuildingKind::ALL
        .iter()
        .all(|k| BuildingKind::from_name(k.name()) == Some(*k));
    results.push(TestResult {
        name: "catalog_names".into(),
        passed: names_ok,
        detail: "names resolve back to their kind".into(),
    });

    if verbose {
        for kind in BuildingKind::ALL {
            let spec = kind.spec();
            let cost: Vec<String> = kind
                .cost()
                .iter()
                .map(|(r, n)| format!("{} {}", n, r))
                .collect();
            println!(
                "    {:<10} {:<20} age {:?}{}",
                spec.name,
                cost.join(", "),
                spec.unlock_age,
                spec.tech.map(|t| format!(", tech {}", t)).unwrap_or_default()
            );
        }
    }

    results
}

// ── 3. Tech Tree ────────────────────────────────────────────────────────

fn validate_tech_tree(verbose: bool) -> Vec<TestResult> {
    println!("--- Tech Tree ---");
    let mut results = Vec::new();
    let tree = TechTree::standard();

    let cycles = tree.cyclic_nodes();
    results.push(TestResult {
        name: "tech_acyclic".into(),
        passed: cycles.is_empty(),
        detail: if cycles.is_empty() {
            "no prerequisite cycles".into()
        } else {
            format!("cycles through {}", cycles.join(", "))
        },
    });

    let dangling: Vec<String> = tree
        .nodes()
        .flat_map(|n| n.prerequisites.iter())
        .filter(|p| tree.get(p).is_none())
        .cloned()
        .collect();
    results.push(TestResult {
        name: "tech_prerequisites_exist".into(),
        passed: dangling.is_empty(),
        detail: format!("{} unknown prerequisites", dangling.len()),
    });

    let gated: HashSet<&str> = BuildingKind::ALL.iter().filter_map(|k| k.spec().tech).collect();
    let missing: Vec<&&str> = gated.iter().filter(|t| tree.get(t).is_none()).collect();
    results.push(TestResult {
        name: "tech_gates_exist".into(),
        passed: missing.is_empty(),
        detail: format!("{} building techs not in the tree", missing.len()),
    });

    if verbose {
        let mut nodes: Vec<_> = tree.nodes().collect();
        nodes.sort_by_key(|n| (tree.depth(&n.id), n.id.clone()));
        for node in nodes {
            println!("    {:<12} depth {} cost {}", node.id, tree.depth(&node.id), node.cost);
        }
    }

    results
}

// ── 4. Settlement Run ───────────────────────────────────────────────────

fn validate_settlement_run(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Settlement Run ---");
    let mut results = Vec::new();

    let mut engine = SimulationEngine::with_config(config.clone());
    engine.generate(SettlementConfig::default());
    let start_population = engine.population();

    let mut hires = 0;
    let mut deaths = 0;
    let mut double_booked = Vec::new();
    let mut overfull = Vec::new();
    let mut orphaned_claims = 0;

    let ticks = (RUN_SECONDS / STEP) as usize;
    for tick in 0..ticks {
        engine.update(STEP);
        for event in engine.drain_events() {
            match event {
                SimEvent::WorkerHired { .. } => hires += 1,
                SimEvent::VillagerDied { .. } => deaths += 1,
                _ => {}
            }
        }

        let mut booked = HashSet::new();
        for (entity, facility) in engine.world.query::<&ProductionFacility>().iter() {
            if facility.workers().len() as u32 > facility.capacity {
                overfull.push((tick, entity));
            }
            for &w in facility.workers() {
                if !booked.insert(w) {
                    double_booked.push((tick, w));
                }
            }
        }
        for (entity, regen) in engine.world.query::<&Regenerator>().iter() {
            if regen.occupants.len() as u32 > regen.capacity {
                overfull.push((tick, entity));
            }
        }
        orphaned_claims += engine
            .world
            .query::<&Behavior>()
            .iter()
            .filter_map(|(_, b)| b.claimed_node())
            .filter(|node| !engine.world.contains(*node))
            .count();
    }

    results.push(TestResult {
        name: "run_population".into(),
        passed: engine.population() > 0,
        detail: format!(
            "{} villagers at start, {} after {}s ({} deaths)",
            start_population,
            engine.population(),
            RUN_SECONDS,
            deaths
        ),
    });

    results.push(TestResult {
        name: "run_hiring".into(),
        passed: hires > 0,
        detail: format!("{} hires", hires),
    });

    results.push(TestResult {
        name: "run_no_double_booking".into(),
        passed: double_booked.is_empty(),
        detail: format!("{} double bookings", double_booked.len()),
    });

    results.push(TestResult {
        name: "run_capacity_respected".into(),
        passed: overfull.is_empty(),
        detail: format!("{} over-capacity observations", overfull.len()),
    });

    results.push(TestResult {
        name: "run_no_orphaned_claims".into(),
        passed: orphaned_claims == 0,
        detail: format!("{} claims on vanished nodes", orphaned_claims),
    });

    let inventories_ok = engine
        .world
        .query::<&Inventory>()
        .iter()
        .all(|(_, inv)| inv.quantity() <= inv.capacity());
    let storage_ok = engine.world.query::<&StorageSite>().iter().all(|(_, site)| {
        site.distinct_types() <= site.max_types()
            && site.contents().all(|(_, n)| n <= site.max_per_type())
    });
    results.push(TestResult {
        name: "run_containers_bounded".into(),
        passed: inventories_ok && storage_ok,
        detail: format!("inventories {} storage {}", inventories_ok, storage_ok),
    });

    let snapshot = engine.ledger_snapshot();
    results.push(TestResult {
        name: "run_population_counter".into(),
        passed: snapshot.get(ResourceType::Population) == engine.population(),
        detail: format!(
            "ledger {} vs live {}",
            snapshot.get(ResourceType::Population),
            engine.population()
        ),
    });

    let produced = snapshot.get(ResourceType::Wheat) + snapshot.get(ResourceType::Bread);
    results.push(TestResult {
        name: "run_food_economy".into(),
        passed: produced > 0,
        detail: format!(
            "wheat {} bread {}",
            snapshot.get(ResourceType::Wheat),
            snapshot.get(ResourceType::Bread)
        ),
    });

    if verbose {
        let villagers = engine
            .villagers()
            .into_iter()
            .filter_map(|v| engine.agent_info(v))
            .collect();
        let dump = Snapshot {
            sim_time: engine.sim_time(),
            age: engine.age(),
            ledger: snapshot,
            villagers,
        };
        match serde_json::to_string_pretty(&dump) {
            Ok(json) => println!("{}", json),
            Err(e) => log::warn!("snapshot failed: {}", e),
        }
        let employed = engine
            .world
            .query::<&Villager>()
            .iter()
            .filter(|(_, v)| v.is_employed())
            .count();
        println!("    employed: {}/{}", employed, engine.population());
    }

    results
}

// ── 5. Economy ──────────────────────────────────────────────────────────

fn validate_economy(config: &SimConfig) -> Vec<TestResult> {
    println!("--- Economy ---");
    let mut results = Vec::new();

    let mut engine = SimulationEngine::with_config(config.clone());
    engine.generate(SettlementConfig {
        villagers: 0,
        trees: 0,
        rocks: 0,
        ..Default::default()
    });
    let before = engine.ledger_snapshot();

    let built = engine.request_build(BuildingKind::Farm, Position::new(10.0, 10.0, 0));
    let after_build = engine.ledger_snapshot();
    let spent = before.get(ResourceType::Wood) - after_build.get(ResourceType::Wood);
    results.push(TestResult {
        name: "economy_build_spends".into(),
        passed: built.is_ok() && spent == BuildingKind::Farm.cost().amount_of(ResourceType::Wood),
        detail: format!("farm cost {} wood", spent),
    });

    let locked = engine.request_build(BuildingKind::Sawmill, Position::new(20.0, 10.0, 0));
    results.push(TestResult {
        name: "economy_tech_gate".into(),
        passed: locked.is_err() && engine.ledger_snapshot() == after_build,
        detail: match locked {
            Err(e) => e.to_string(),
            Ok(_) => "sawmill built without carpentry".into(),
        },
    });

    let refund = built.and_then(|farm| engine.request_demolish(farm));
    let after_refund = engine.ledger_snapshot();
    results.push(TestResult {
        name: "economy_refund".into(),
        passed: refund
            .as_ref()
            .map(|r| {
                r.refunded.amount_of(ResourceType::Wood) + r.lost.amount_of(ResourceType::Wood)
                    == (spent as f32 * config.economy.refund_ratio).floor() as u32
            })
            .unwrap_or(false),
        detail: format!(
            "wood {} -> {}",
            after_build.get(ResourceType::Wood),
            after_refund.get(ResourceType::Wood)
        ),
    });

    let short = engine.advance_age();
    results.push(TestResult {
        name: "economy_age_costs_research".into(),
        passed: short.is_err() && engine.age() == Age::Stone,
        detail: match short {
            Err(e) => e.to_string(),
            Ok(age) => format!("advanced to {:?} for free", age),
        },
    });

    results
}
