// A* road planner over the walkable surface.
//
// Searches the implicit graph from `walkable.rs` between two standing
// positions. The search is bounded: after `max_nodes_explored` expansions
// it gives up and reports no path, logging how far it got and how much
// terrain cost it had accumulated. A capped search is not an error; the
// caller decides whether to retry with a different endpoint.
//
// ## Cost model
//
// `TerrainCost` prices each step:
//   base * (diagonal_multiplier if the step is diagonal)
//   + elevation_change_penalty * |dy|
//   + water_penalty if the destination cell holds liquid
//   + rough_terrain_penalty if the destination stands on sand or gravel
//
// The heuristic is the octile planar distance at base cost plus the
// elevation penalty for the remaining height difference. Both are lower
// bounds on the real cost, so the heuristic is admissible.
//
// ## Determinism
//
// The open set orders by f, then by insertion sequence. Node records live
// in an arena `Vec`; the `FxHashMap` from coordinate to arena slot is only
// a lookup accelerator and never iterated. Neighbor directions are
// shuffled once per search from the caller's seed, so two searches with
// the same seed over the same world and masks return identical paths,
// while different seeds may break cost ties differently.
//
// ## Smoothing
//
// `smooth` is a separate pass over a finished path. Every point where the
// Y changes gets one cosmetic ramp block (stairs or a bottom slab, per
// `RampStyle`); path coordinates are never moved. `pave` adds the road
// surface under every flat point on top of that.
//
// See also: `walkable.rs` for neighbor generation, `surface.rs` for G(x, z),
// `config.rs` for `PathConfig` and `TerrainCostConfig`.

use crate::block::{BlockEntry, BlockExtra, Facing, Material, SlabHalf};
use crate::config::{PathConfig, RampStyle, TerrainCostConfig};
use crate::error::{HamletError, Result};
use crate::prng::SiteRng;
use crate::types::VoxelCoord;
use crate::walkable::{PLANAR_DIRECTIONS, WalkableGraph};
use crate::world::WorldQuery;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Prices a single step between adjacent standing positions.
pub trait StepCost {
    fn step_cost(&self, from: VoxelCoord, to: VoxelCoord) -> f32;

    /// Admissible estimate of the remaining cost from `from` to `goal`.
    fn estimate(&self, from: VoxelCoord, goal: VoxelCoord) -> f32;
}

/// The default cost model: distance, climbing, liquid and rough ground.
pub struct TerrainCost<'w, W: WorldQuery + ?Sized> {
    world: &'w W,
    config: TerrainCostConfig,
}

impl<'w, W: WorldQuery + ?Sized> TerrainCost<'w, W> {
    pub fn new(world: &'w W, config: &TerrainCostConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            world,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &TerrainCostConfig {
        &self.config
    }
}

impl<W: WorldQuery + ?Sized> StepCost for TerrainCost<'_, W> {
    fn step_cost(&self, from: VoxelCoord, to: VoxelCoord) -> f32 {
        let c = &self.config;
        let diagonal = from.x != to.x && from.z != to.z;
        let mut cost = if diagonal {
            c.base_step_cost * c.diagonal_multiplier
        } else {
            c.base_step_cost
        };
        cost += c.elevation_change_penalty * (to.y - from.y).abs() as f32;
        if self.world.material_at(to).is_liquid() {
            cost += c.water_penalty;
        }
        if self.world.material_at(to.offset(0, -1, 0)).is_rough() {
            cost += c.rough_terrain_penalty;
        }
        cost
    }

    fn estimate(&self, from: VoxelCoord, goal: VoxelCoord) -> f32 {
        let c = &self.config;
        let dx = (goal.x - from.x).unsigned_abs();
        let dz = (goal.z - from.z).unsigned_abs();
        let (long, short) = if dx >= dz { (dx, dz) } else { (dz, dx) };
        // Diagonals never beat two cardinals in the estimate.
        let diagonal = c.diagonal_multiplier.min(2.0);
        let planar = c.base_step_cost * ((long - short) as f32 + diagonal * short as f32);
        planar + c.elevation_change_penalty * (goal.y - from.y).abs() as f32
    }
}

/// A planned road: every standing position from start to end inclusive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathDescriptor {
    pub start: VoxelCoord,
    pub end: VoxelCoord,
    /// Seed the search's tie-breaking was drawn from.
    pub seed: u64,
    pub points: Vec<VoxelCoord>,
    pub total_cost: f32,
    /// Nodes expanded before the goal was reached.
    pub explored: usize,
    /// Indices `i` where `points[i].y != points[i - 1].y`.
    pub elevation_adjusted: Vec<usize>,
}

impl PathDescriptor {
    fn new(seed: u64, points: Vec<VoxelCoord>, total_cost: f32, explored: usize) -> Self {
        let elevation_adjusted = points
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0].y != pair[1].y)
            .map(|(i, _)| i + 1)
            .collect();
        Self {
            start: points[0],
            end: points[points.len() - 1],
            seed,
            points,
            total_cost,
            explored,
            elevation_adjusted,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// What a search did, whether or not it found a path.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SearchStats {
    pub explored: usize,
    pub cap_hit: bool,
    /// Sum of every step cost evaluated during the search.
    pub accumulated_cost: f32,
}

/// Min-heap entry, ordered by f then insertion sequence.
#[derive(Clone, Copy, Debug)]
struct OpenEntry {
    f_score: f32,
    seq: u64,
    slot: u32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct NodeRecord {
    pos: VoxelCoord,
    g_score: f32,
    parent: Option<u32>,
    closed: bool,
}

pub struct PathPlanner<'g, 's, 'w, W: WorldQuery + ?Sized, C: StepCost> {
    graph: &'g WalkableGraph<'s, 'w, W>,
    cost: C,
    max_nodes_explored: usize,
}

impl<'g, 's, 'w, W: WorldQuery + ?Sized, C: StepCost> PathPlanner<'g, 's, 'w, W, C> {
    pub fn new(graph: &'g WalkableGraph<'s, 'w, W>, cost: C, max_nodes_explored: usize) -> Result<Self> {
        if max_nodes_explored == 0 {
            return Err(HamletError::InvalidArgument(
                "max_nodes_explored must be positive".into(),
            ));
        }
        Ok(Self {
            graph,
            cost,
            max_nodes_explored,
        })
    }

    pub fn graph(&self) -> &'g WalkableGraph<'s, 'w, W> {
        self.graph
    }

    pub fn max_nodes_explored(&self) -> usize {
        self.max_nodes_explored
    }

    /// Plan a road between the columns of `start` and `end`. Only X and Z
    /// of the endpoints are used; each is snapped to its walkable standing
    /// height. `None` when either endpoint is blocked, the goal is
    /// unreachable, or the node cap was hit.
    pub fn plan(&self, start: VoxelCoord, end: VoxelCoord, seed: u64) -> Option<PathDescriptor> {
        self.plan_with_stats(start, end, seed).0
    }

    pub fn plan_with_stats(
        &self,
        start: VoxelCoord,
        end: VoxelCoord,
        seed: u64,
    ) -> (Option<PathDescriptor>, SearchStats) {
        let mut stats = SearchStats::default();
        let (Some(start), Some(goal)) = (self.graph.snap(start.x, start.z), self.graph.snap(end.x, end.z)) else {
            log::debug!("path {start} -> {end}: endpoint is not walkable");
            return (None, stats);
        };
        if start == goal {
            return (Some(PathDescriptor::new(seed, vec![start], 0.0, 0)), stats);
        }

        let mut directions = PLANAR_DIRECTIONS;
        SiteRng::new(seed).shuffle(&mut directions);

        let mut nodes: Vec<NodeRecord> = Vec::new();
        let mut slots: FxHashMap<VoxelCoord, u32> = FxHashMap::default();
        let mut open = BinaryHeap::new();
        let mut seq: u64 = 0;

        nodes.push(NodeRecord {
            pos: start,
            g_score: 0.0,
            parent: None,
            closed: false,
        });
        slots.insert(start, 0);
        open.push(OpenEntry {
            f_score: self.cost.estimate(start, goal),
            seq,
            slot: 0,
        });

        while let Some(current) = open.pop() {
            let ci = current.slot as usize;
            if nodes[ci].closed {
                continue;
            }
            let pos = nodes[ci].pos;
            if pos == goal {
                let descriptor = PathDescriptor::new(
                    seed,
                    reconstruct(&nodes, current.slot),
                    nodes[ci].g_score,
                    stats.explored,
                );
                return (Some(descriptor), stats);
            }
            if stats.explored >= self.max_nodes_explored {
                stats.cap_hit = true;
                log::warn!(
                    "path {start} -> {goal}: node cap hit after {}/{} expansions, {:.1} terrain cost accumulated",
                    stats.explored,
                    self.max_nodes_explored,
                    stats.accumulated_cost
                );
                return (None, stats);
            }
            nodes[ci].closed = true;
            stats.explored += 1;

            let current_g = nodes[ci].g_score;
            for next in self.graph.neighbors_with(pos, &directions) {
                let step = self.cost.step_cost(pos, next);
                stats.accumulated_cost += step;
                let tentative_g = current_g + step;

                let slot = match slots.get(&next) {
                    Some(&slot) => {
                        let record = &mut nodes[slot as usize];
                        if record.closed || tentative_g >= record.g_score {
                            continue;
                        }
                        record.g_score = tentative_g;
                        record.parent = Some(current.slot);
                        slot
                    }
                    None => {
                        let slot = nodes.len() as u32;
                        nodes.push(NodeRecord {
                            pos: next,
                            g_score: tentative_g,
                            parent: Some(current.slot),
                            closed: false,
                        });
                        slots.insert(next, slot);
                        slot
                    }
                };
                seq += 1;
                open.push(OpenEntry {
                    f_score: tentative_g + self.cost.estimate(next, goal),
                    seq,
                    slot,
                });
            }
        }

        log::debug!(
            "path {start} -> {goal}: unreachable after {} expansions",
            stats.explored
        );
        (None, stats)
    }
}

impl<'g, 's, 'w, W: WorldQuery + ?Sized> PathPlanner<'g, 's, 'w, W, TerrainCost<'w, W>> {
    /// Planner with the default terrain cost model over the graph's world.
    pub fn from_config(graph: &'g WalkableGraph<'s, 'w, W>, config: &PathConfig) -> Result<Self> {
        let cost = TerrainCost::new(graph.surface().world(), &config.cost)?;
        Self::new(graph, cost, config.max_nodes_explored)
    }
}

fn reconstruct(nodes: &[NodeRecord], goal_slot: u32) -> Vec<VoxelCoord> {
    let mut points = Vec::new();
    let mut cursor = Some(goal_slot);
    while let Some(slot) = cursor {
        let record = &nodes[slot as usize];
        points.push(record.pos);
        cursor = record.parent;
    }
    points.reverse();
    points
}

/// Ramp blocks for every elevation change along the path, one per change.
///
/// Stairs replace the ground block of the higher of the two points and face
/// uphill. Slabs sit in the standing cell of the lower point. If two
/// changes want the same position the first one wins.
pub fn smooth(path: &PathDescriptor, style: RampStyle) -> Vec<BlockEntry> {
    let mut taken = FxHashSet::default();
    let mut ramps = Vec::with_capacity(path.elevation_adjusted.len());
    for &i in &path.elevation_adjusted {
        let (prev, cur) = (path.points[i - 1], path.points[i]);
        let travel = Facing::of_step(cur.x - prev.x, cur.z - prev.z);
        let ascending = cur.y > prev.y;
        let entry = match style {
            RampStyle::Stairs => {
                let (high, uphill) = if ascending { (cur, travel) } else { (prev, travel.opposite()) };
                BlockEntry::with_extra(high.offset(0, -1, 0), Material::Stairs, BlockExtra::Facing(uphill))
            }
            RampStyle::Slab => {
                let low = if ascending { prev } else { cur };
                BlockEntry::with_extra(low, Material::Slab, BlockExtra::Slab(SlabHalf::Bottom))
            }
        };
        if taken.insert(entry.pos) {
            ramps.push(entry);
        }
    }
    ramps
}

/// Full block list for building a road: the configured surface material
/// under every point, with ramps from `smooth` taking precedence.
pub fn pave(path: &PathDescriptor, config: &PathConfig) -> Vec<BlockEntry> {
    let ramps = smooth(path, config.ramp_style);
    let ramp_positions: FxHashSet<VoxelCoord> = ramps.iter().map(|e| e.pos).collect();
    let mut seen = FxHashSet::default();
    let mut entries: Vec<BlockEntry> = path
        .points
        .iter()
        .map(|p| p.offset(0, -1, 0))
        .filter(|ground| !ramp_positions.contains(ground) && seen.insert(*ground))
        .map(|ground| BlockEntry::new(ground, config.road_material))
        .collect();
    entries.extend(ramps);
    entries
}
