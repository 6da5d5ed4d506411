// Headless demo: site a few houses on generated terrain, build them through
// the placement pipeline, then connect them with paved roads.
//
// Usage: `hamlet_demo [config.json] [seed]`. Logging goes through
// env_logger; set `RUST_LOG=debug` to see siting, queue, and mask records.

use hamlet_core::block::{BlockEntry, BlockExtra, Facing, Material};
use hamlet_core::config::EngineConfig;
use hamlet_core::mask_index::{MaskIndex, MaskRegistry};
use hamlet_core::pathfinding::{PathPlanner, pave};
use hamlet_core::pipeline::PlacementPipeline;
use hamlet_core::placement::{Footprint, PlacementHelper, SitePlan};
use hamlet_core::prng::SiteRng;
use hamlet_core::surface::SurfaceSolver;
use hamlet_core::types::{Bounds, StructureId, VillageId, VoxelCoord};
use hamlet_core::walkable::WalkableGraph;
use hamlet_core::world::{VoxelWorld, WorldQuery};
use std::process::ExitCode;
use std::sync::Arc;

const WORLD_SIZE: u32 = 160;
const HOUSES: usize = 4;

fn main() -> ExitCode {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(message) => {
                eprintln!("{message}");
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(7);

    match run(&config, seed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &str) -> Result<EngineConfig, String> {
    let json = std::fs::read_to_string(path).map_err(|e| format!("cannot read {path}: {e}"))?;
    let config = EngineConfig::from_json(&json).map_err(|e| format!("cannot parse {path}: {e}"))?;
    config.validate().map_err(|e| format!("invalid config {path}: {e}"))?;
    Ok(config)
}

/// Rolling terrain with a pond and a few trees.
fn generate_world(seed: u64) -> VoxelWorld {
    let mut world = VoxelWorld::new(WORLD_SIZE, 96, WORLD_SIZE, -16);
    let mut rng = SiteRng::fork(seed, 1);
    let phase = rng.next_f64() * std::f64::consts::TAU;
    for x in 0..WORLD_SIZE as i32 {
        for z in 0..WORLD_SIZE as i32 {
            let h = 3.0 * ((x as f64 / 23.0 + phase).sin() + (z as f64 / 31.0).cos());
            world.fill_column(x, z, 40 + h.round() as i32, Material::GrassBlock);
        }
    }
    for x in 70..80 {
        for z in 20..34 {
            let top = world.highest_occupied_y(x, z);
            world.fill_column(x, z, top - 2, Material::Sand);
            world.set(VoxelCoord::new(x, top - 1, z), Material::Water);
        }
    }
    for _ in 0..40 {
        let x = rng.range_u64(0, WORLD_SIZE as u64) as i32;
        let z = rng.range_u64(0, WORLD_SIZE as u64) as i32;
        let base = world.highest_occupied_y(x, z);
        for y in base + 1..base + 5 {
            world.set(VoxelCoord::new(x, y, z), Material::Log);
        }
        for (dx, dz) in [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)] {
            world.set(VoxelCoord::new(x + dx, base + 5, z + dz), Material::Leaves);
        }
    }
    world
}

/// Floor, walls with a door on the low-Z side, a flat roof, and a torch.
fn house_blocks(bounds: &Bounds) -> Vec<BlockEntry> {
    let (lo, hi) = (bounds.min(), bounds.max());
    let door_x = (lo.x + hi.x) / 2;
    let mut entries = Vec::new();
    for x in lo.x..=hi.x {
        for z in lo.z..=hi.z {
            entries.push(BlockEntry::new(VoxelCoord::new(x, lo.y, z), Material::Planks));
            entries.push(BlockEntry::new(VoxelCoord::new(x, hi.y, z), Material::Planks));
            let edge_x = x == lo.x || x == hi.x;
            let edge_z = z == lo.z || z == hi.z;
            if !(edge_x || edge_z) {
                continue;
            }
            for y in lo.y + 1..hi.y {
                let pos = VoxelCoord::new(x, y, z);
                if z == lo.z && x == door_x && y <= lo.y + 2 {
                    if y == lo.y + 1 {
                        entries.push(BlockEntry::with_extra(pos, Material::Door, BlockExtra::Facing(Facing::North)));
                    }
                    continue;
                }
                let material = if edge_x && edge_z { Material::Log } else { Material::Planks };
                entries.push(BlockEntry::new(pos, material));
            }
        }
    }
    entries.push(BlockEntry::with_extra(
        VoxelCoord::new(lo.x + 1, lo.y + 2, hi.z - 1),
        Material::Torch,
        BlockExtra::Facing(Facing::North),
    ));
    entries
}

/// Commit until every active queue has finished.
fn commit_all(pipeline: &mut PlacementPipeline, world: &mut VoxelWorld) {
    while pipeline.active_queue_count() > 0 {
        let report = pipeline.commit_step(world);
        for (structure, bounds) in &report.published {
            log::info!("published mask for {structure} over {bounds}");
        }
    }
}

fn run(config: &EngineConfig, seed: u64) -> hamlet_core::Result<()> {
    let mut world = generate_world(seed);
    let registry = Arc::new(MaskRegistry::new(MaskIndex::new(config.chunk_size)?));
    let mut pipeline = PlacementPipeline::new(&config.placement, Arc::clone(&registry))?;
    let mut rng = SiteRng::fork(seed, 2);
    let village = VillageId::new(&mut rng);

    // Candidate origins sit on a coarse grid clear of the world edge.
    let inner = 20..WORLD_SIZE as i32 - 20;
    let grid: Vec<(i32, i32)> = inner
        .clone()
        .step_by(6)
        .flat_map(|x| inner.clone().step_by(6).map(move |z| (x, z)))
        .collect();

    // Site and build houses one at a time so each sees the previous masks.
    let mut plans: Vec<SitePlan> = Vec::new();
    for house in 0..HOUSES {
        let structure = StructureId::new(&mut rng);
        let candidates: Vec<(i32, i32)> = (0..24).filter_map(|_| rng.choose(&grid).copied()).collect();
        let footprint = Footprint::new(7, 9, 5)?;
        let (plan, entries, mask) = {
            let solver = SurfaceSolver::new(&world, registry.snapshot());
            let helper = PlacementHelper::new(&solver, &config.placement)?;
            let Some(plan) = helper.find_site(footprint, &candidates, rng.next_u64()) else {
                log::warn!("house {house}: no site among {} candidates", candidates.len());
                continue;
            };
            let mut entries = helper.leveling_entries(&plan, Material::Dirt);
            entries.extend(house_blocks(&plan.bounds));
            let mask = helper.footprint_mask(&plan, structure, village, pipeline.tick());
            (plan, entries, mask)
        };
        pipeline.prepare_async(structure, entries, seed)?;
        for queue in pipeline.wait_prepared() {
            pipeline.submit_with_mask(queue, mask.clone())?;
        }
        commit_all(&mut pipeline, &mut world);
        println!("house {house} at {} rotated {}°", plan.origin, plan.rotation.degrees());
        plans.push(plan);
    }

    // Roads between consecutive houses, from just past the clearance at
    // each house's low corner.
    let reach = config.path.clearance_buffer + 1;
    for (i, pair) in plans.windows(2).enumerate() {
        let corner = |p: &SitePlan| VoxelCoord::new(p.bounds.min().x - reach, 0, p.bounds.min().z - reach);
        let (from, to) = (corner(&pair[0]), corner(&pair[1]));
        let entries = {
            let solver = SurfaceSolver::new(&world, registry.snapshot());
            let graph = WalkableGraph::from_config(&solver, &config.path)?;
            let planner = PathPlanner::from_config(&graph, &config.path)?;
            let (path, stats) = planner.plan_with_stats(from, to, seed.wrapping_add(i as u64));
            let Some(path) = path else {
                println!("road {i}: no route ({} nodes explored)", stats.explored);
                continue;
            };
            println!(
                "road {i}: {} blocks, cost {:.1}, {} ramps",
                path.len(),
                path.total_cost,
                path.elevation_adjusted.len()
            );
            pave(&path, &config.path)
        };
        let road = StructureId::new(&mut rng);
        let queue = pipeline.prepare_queue(road, entries, seed)?;
        pipeline.submit(queue)?;
        commit_all(&mut pipeline, &mut world);
    }

    println!(
        "done after {} ticks, {} masks registered",
        pipeline.tick(),
        registry.len()
    );
    Ok(())
}
