// Walkability predicate and neighbor generator over the ground surface.
//
// The walkable graph is implicit: nodes are standing positions one above
// G(x, z), edges are the eight planar steps to adjacent columns. Nothing
// is materialized up front except the obstacle set, which is every
// registered mask grown by the clearance buffer, built once when the graph
// is constructed. Later mask publications need a new graph.
//
// A neighbor of (x, y, z) in direction (dx, dz) exists when:
// - the surface solver returns a standing height ny for the neighbor
//   column (the candidate is not inside a mask),
// - (x+dx, ny, z+dz) is not inside a buffered obstacle, and
// - |ny - y| is within the step tolerance, so a road never jumps a cliff.
//
// Out-degree is therefore 0..=8 and varies with terrain and obstacles.
//
// See also: `surface.rs` for G(x, z), `pathfinding.rs` for the A* search
// that walks this graph.

use crate::config::PathConfig;
use crate::error::{HamletError, Result};
use crate::mask_index::MaskIndex;
use crate::surface::SurfaceSolver;
use crate::types::VoxelCoord;
use crate::world::WorldQuery;
use smallvec::SmallVec;

/// The eight planar steps, cardinals first so unshuffled searches prefer
/// straight roads on ties.
pub const PLANAR_DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

pub type Neighbors = SmallVec<[VoxelCoord; 8]>;

pub struct WalkableGraph<'s, 'w, W: WorldQuery + ?Sized> {
    surface: &'s SurfaceSolver<'w, W>,
    obstacles: MaskIndex,
    step_tolerance: i32,
}

impl<'s, 'w, W: WorldQuery + ?Sized> WalkableGraph<'s, 'w, W> {
    /// Build the obstacle set from the solver's current masks, each grown
    /// by `clearance_buffer`.
    pub fn new(
        surface: &'s SurfaceSolver<'w, W>,
        clearance_buffer: i32,
        step_tolerance: i32,
    ) -> Result<Self> {
        if step_tolerance < 0 || clearance_buffer < 0 {
            return Err(HamletError::InvalidArgument(format!(
                "step tolerance and clearance must be non-negative, got {step_tolerance} and {clearance_buffer}"
            )));
        }
        let obstacles = surface.masks().expanded(clearance_buffer)?;
        Ok(Self {
            surface,
            obstacles,
            step_tolerance,
        })
    }

    pub fn from_config(surface: &'s SurfaceSolver<'w, W>, config: &PathConfig) -> Result<Self> {
        Self::new(surface, config.clearance_buffer, config.step_tolerance)
    }

    pub fn surface(&self) -> &'s SurfaceSolver<'w, W> {
        self.surface
    }

    pub fn step_tolerance(&self) -> i32 {
        self.step_tolerance
    }

    /// Inside some mask after clearance buffering.
    pub fn is_obstacle(&self, pos: VoxelCoord) -> bool {
        self.obstacles.contains_point(pos)
    }

    /// Not an obstacle, and within the step tolerance of G(x, z).
    pub fn is_walkable(&self, pos: VoxelCoord) -> bool {
        if self.is_obstacle(pos) {
            return false;
        }
        let ground = self.surface.surface_height(pos.x, pos.z);
        (pos.y - ground).abs() <= self.step_tolerance
    }

    /// Resolve a column to its walkable standing node, if it has one.
    pub fn snap(&self, x: i32, z: i32) -> Option<VoxelCoord> {
        let y = self.surface.nearest_walkable(x, z)?;
        let pos = VoxelCoord::new(x, y, z);
        self.is_walkable(pos).then_some(pos)
    }

    /// Walkable neighbors in `PLANAR_DIRECTIONS` order.
    pub fn neighbors(&self, pos: VoxelCoord) -> Neighbors {
        self.neighbors_with(pos, &PLANAR_DIRECTIONS)
    }

    /// Walkable neighbors, visiting directions in the given order.
    pub fn neighbors_with(&self, pos: VoxelCoord, directions: &[(i32, i32)]) -> Neighbors {
        let mut out = Neighbors::new();
        for &(dx, dz) in directions {
            let (nx, nz) = (pos.x + dx, pos.z + dz);
            let Some(ny) = self.surface.nearest_walkable(nx, nz) else {
                continue;
            };
            if (ny - pos.y).abs() > self.step_tolerance {
                continue;
            }
            let next = VoxelCoord::new(nx, ny, nz);
            if !self.is_obstacle(next) {
                out.push(next);
            }
        }
        out
    }
}
