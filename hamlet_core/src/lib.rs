// hamlet_core: structure siting, road pathing, and bounded block placement.
//
// This crate decides where village structures go on a voxel terrain, plans
// roads between them, and feeds every resulting block write through a
// queue that commits a bounded batch per tick. It never owns the world:
// hosts plug in through the `WorldQuery` and `WorldMutate` traits.
//
// Module overview:
// - `types.rs`:           VoxelCoord, Bounds, ChunkCoord, entity and queue IDs.
// - `block.rs`:           Material classification, block extras, BlockEntry.
// - `error.rs`:           HamletError (InvalidArgument / InvalidState).
// - `config.rs`:          EngineConfig and its path/placement sections.
// - `world.rs`:           Host world traits + dense in-memory VoxelWorld.
// - `mask.rs`:            VolumeMask (structure occupancy) and MaskReceipt.
// - `mask_index.rs`:      Chunk-bucketed MaskIndex + atomically published MaskRegistry.
// - `surface.rs`:         SurfaceSolver: cached ground height G(x, z) that sees through masks.
// - `walkable.rs`:        WalkableGraph: walkability predicate and neighbor generation.
// - `pathfinding.rs`:     A* PathPlanner, terrain cost model, ramp smoothing, paving.
// - `placement.rs`:       Rotated footprints, collision, PlacementHelper siting and leveling.
// - `placement_queue.rs`: PlacementQueue: ordered, resumable block-write jobs.
// - `pipeline.rs`:        PlacementPipeline: async prepare, per-tick bounded commit.
// - `prng`:               Re-exported from `hamlet_prng`: xoshiro256++ PRNG with SplitMix64 seeding.
//
// Data flow: `PlacementHelper::find_site` picks a footprint clear of the
// registered masks → `leveling_entries` plus the structure's own blocks go
// through `PlacementPipeline::prepare_*` and `submit_with_mask` →
// `commit_step` writes them a batch per tick and publishes the mask on
// completion → a `PathPlanner` over the refreshed masks routes a road,
// and `pave`'s entries take the same pipeline.
//
// **Critical constraint: determinism.** For a fixed seed and input, siting,
// path output, and commit order are identical across runs and machines.
// All randomness comes from `SiteRng`. Authoritative collections are
// `BTreeMap` or `Vec`; hash maps are lookup accelerators only and are
// never iterated to produce output.

pub mod block;
pub mod config;
pub mod error;
pub mod mask;
pub mod mask_index;
pub mod pathfinding;
pub mod pipeline;
pub mod placement;
pub mod placement_queue;
pub use hamlet_prng as prng;
pub mod surface;
pub mod types;
pub mod walkable;
pub mod world;

pub use error::{HamletError, Result};
