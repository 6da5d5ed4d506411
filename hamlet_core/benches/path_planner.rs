// Path planner throughput on open, obstructed, and hilly terrain.
//
// Run with `cargo bench -p hamlet_core --bench path_planner`.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use hamlet_core::block::Material;
use hamlet_core::config::PathConfig;
use hamlet_core::mask::VolumeMask;
use hamlet_core::mask_index::MaskIndex;
use hamlet_core::pathfinding::PathPlanner;
use hamlet_core::prng::SiteRng;
use hamlet_core::surface::SurfaceSolver;
use hamlet_core::types::{StructureId, VillageId, VoxelCoord};
use hamlet_core::walkable::WalkableGraph;
use hamlet_core::world::VoxelWorld;
use std::sync::Arc;

fn hilly_world(size: u32) -> VoxelWorld {
    let mut world = VoxelWorld::new(size, 64, size, 0);
    for x in 0..size as i32 {
        for z in 0..size as i32 {
            let h = ((x / 6) + (z / 9)) % 4;
            world.fill_column(x, z, 20 + h, Material::GrassBlock);
        }
    }
    world
}

fn scattered_masks(count: usize, size: i32) -> Arc<MaskIndex> {
    let mut rng = SiteRng::new(99);
    let mut index = MaskIndex::new(16).expect("chunk size");
    for _ in 0..count {
        let x = rng.range_u64(10, (size - 20) as u64) as i32;
        let z = rng.range_u64(10, (size - 20) as u64) as i32;
        let mask = VolumeMask::from_corners(
            StructureId::new(&mut rng),
            VillageId::new(&mut rng),
            VoxelCoord::new(x, 18, z),
            VoxelCoord::new(x + 6, 30, z + 8),
            0,
        )
        .expect("mask corners");
        index.insert(Arc::new(mask));
    }
    Arc::new(index)
}

fn bench_plan(c: &mut Criterion, name: &str, world: &VoxelWorld, masks: Arc<MaskIndex>) {
    let config = PathConfig::default();
    let start = VoxelCoord::new(2, 0, 2);
    let end = VoxelCoord::new(120, 0, 110);
    c.bench_function(name, |b| {
        b.iter(|| {
            // Fresh solver per run so the surface cache starts cold.
            let solver = SurfaceSolver::new(world, Arc::clone(&masks));
            let graph = WalkableGraph::from_config(&solver, &config).expect("graph");
            let planner = PathPlanner::from_config(&graph, &config).expect("planner");
            black_box(planner.plan_with_stats(start, end, 7))
        })
    });
}

fn path_benches(c: &mut Criterion) {
    let flat = VoxelWorld::flat(128, 64, 128, 0, 20, Material::GrassBlock);
    bench_plan(c, "plan_flat_open", &flat, Arc::new(MaskIndex::new(16).expect("chunk size")));
    bench_plan(c, "plan_flat_obstructed", &flat, scattered_masks(40, 128));
    let hills = hilly_world(128);
    bench_plan(c, "plan_hilly_obstructed", &hills, scattered_masks(40, 128));
}

criterion_group!(benches, path_benches);
criterion_main!(benches);
