//! Settlement generation - the starting map
//!
//! The main island (region 0) holds the starter buildings, villagers and
//! most raw resources. With `islands` enabled, a smaller second island
//! (region 1) east of a strait carries extra trees and rocks, and a pair of
//! docks joins the two.

use hecs::{Entity, World};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::{BuildingKind, Position, ResourceNode, ResourceType, StorageSite, Vec2};
use crate::config::SimConfig;
use crate::systems::{pair_ports_system, spawn_building, spawn_villager, JobBoard};

/// Configuration for settlement generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub name: String,
    pub villagers: u32,
    pub trees: u32,
    pub rocks: u32,
    /// Add a second island reachable by boat
    pub islands: bool,
    /// Stock placed in the starting warehouses
    pub starting_stock: Vec<(ResourceType, u32)>,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            name: "Hamlet".to_string(),
            villagers: 6,
            trees: 24,
            rocks: 12,
            islands: true,
            starting_stock: vec![
                (ResourceType::Wood, 40),
                (ResourceType::Stone, 20),
                (ResourceType::Wheat, 10),
            ],
        }
    }
}

/// Handles to everything the generator created
#[derive(Debug, Clone, Default)]
pub struct SettlementLayout {
    pub name: String,
    pub buildings: Vec<Entity>,
    pub villagers: Vec<Entity>,
    pub nodes: Vec<Entity>,
    pub regions: u16,
}

/// Share of the map width taken by the main island
const MAIN_ISLAND_SHARE: f32 = 0.62;
/// Water between the islands
const STRAIT_WIDTH: f32 = 6.0;
const EDGE_MARGIN: f32 = 2.0;

/// Horizontal extent of a region
fn region_span(region: u16, width: f32) -> (f32, f32) {
    let split = width * MAIN_ISLAND_SHARE;
    if region == 0 {
        (EDGE_MARGIN, split - EDGE_MARGIN)
    } else {
        (split + STRAIT_WIDTH, width - EDGE_MARGIN)
    }
}

/// Generate the starting settlement in `world`
pub fn generate_settlement(
    world: &mut World,
    board: &mut JobBoard,
    config: &SettlementConfig,
    sim: &SimConfig,
    rng: &mut impl Rng,
) -> SettlementLayout {
    let mut layout = SettlementLayout {
        name: config.name.clone(),
        regions: if config.islands { 2 } else { 1 },
        ..Default::default()
    };

    let width = sim.world.width;
    let height = sim.world.height;
    let (west, east) = region_span(0, width);
    let center = Vec2::new((west + east) / 2.0, height / 2.0);

    let starters: [(BuildingKind, f32, f32); 9] = [
        (BuildingKind::Warehouse, 0.0, 0.0),
        (BuildingKind::Warehouse, 0.0, -7.0),
        (BuildingKind::House, -7.0, -6.0),
        (BuildingKind::House, 7.0, -6.0),
        (BuildingKind::Well, -6.0, 5.0),
        (BuildingKind::Canteen, 6.0, 5.0),
        (BuildingKind::Farm, -13.0, 0.0),
        (BuildingKind::Quarry, 13.0, 0.0),
        (BuildingKind::Bakery, 0.0, 9.0),
    ];
    for (kind, dx, dy) in starters {
        let (x, y) = sim.world.clamp(center.x + dx, center.y + dy);
        layout
            .buildings
            .push(spawn_building(world, kind, Position::new(x, y, 0), sim));
    }

    if config.islands {
        let (island_west, _) = region_span(1, width);
        let home = spawn_building(
            world,
            BuildingKind::Dock,
            Position::new(east - 1.0, center.y, 0),
            sim,
        );
        let away = spawn_building(
            world,
            BuildingKind::Dock,
            Position::new(island_west + 1.0, center.y, 1),
            sim,
        );
        layout.buildings.extend([home, away]);
        pair_ports_system(world);
    }

    stock_warehouses(world, &layout.buildings, &config.starting_stock);

    let footprints: Vec<(Vec2, f32)> = layout
        .buildings
        .iter()
        .filter_map(|&b| {
            let pos = world.get::<&Position>(b).ok()?.pos;
            let radius = world.get::<&crate::components::Building>(b).ok()?.radius;
            Some((pos, radius))
        })
        .collect();

    // a third of the raw resources go to the far island
    for (resource, count) in [
        (ResourceType::Wood, config.trees),
        (ResourceType::Stone, config.rocks),
    ] {
        for i in 0..count {
            let region = if config.islands && i % 3 == 2 { 1 } else { 0 };
            let Some(spot) = free_spot(&footprints, region, sim, rng) else {
                log::debug!("no room for a {} node", resource);
                continue;
            };
            layout
                .nodes
                .push(world.spawn((ResourceNode { resource }, Position::at(spot, region))));
        }
    }

    for _ in 0..config.villagers {
        let offset = Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU)) * 3.5;
        let (x, y) = sim.world.clamp(center.x + offset.x, center.y + offset.y);
        let villager = spawn_villager(
            world,
            board,
            Position::new(x, y, 0),
            sim.inventory.capacity,
            rng,
        );
        layout.villagers.push(villager);
    }

    log::info!(
        "Generated {}: {} buildings, {} villagers, {} resource nodes",
        layout.name,
        layout.buildings.len(),
        layout.villagers.len(),
        layout.nodes.len()
    );
    layout
}

/// Spread the starting stock first-fit over the shared warehouses
fn stock_warehouses(world: &mut World, buildings: &[Entity], stock: &[(ResourceType, u32)]) {
    for &(resource, amount) in stock {
        let mut remaining = amount;
        for &building in buildings {
            if let Ok(mut site) = world.get::<&mut StorageSite>(building) {
                if site.is_shared() {
                    remaining -= site.deposit(resource, remaining);
                }
            }
        }
        if remaining > 0 {
            log::warn!("starting stock: {} {} did not fit", remaining, resource);
        }
    }
}

/// Random point in `region`, clear of building footprints
fn free_spot(
    footprints: &[(Vec2, f32)],
    region: u16,
    sim: &SimConfig,
    rng: &mut impl Rng,
) -> Option<Vec2> {
    let (west, east) = region_span(region, sim.world.width);
    if east <= west {
        return None;
    }
    (0..16)
        .map(|_| {
            Vec2::new(
                rng.gen_range(west..east),
                rng.gen_range(EDGE_MARGIN..(sim.world.height - EDGE_MARGIN).max(EDGE_MARGIN + 1.0)),
            )
        })
        .find(|spot| {
            footprints
                .iter()
                .all(|(center, radius)| spot.distance(center) > radius + 1.0)
        })
}
