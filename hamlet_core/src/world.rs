// Host world capabilities and a dense in-memory world.
//
// The engine consumes the host through two traits:
// - `WorldQuery`: read-only material and column-height queries. `Sync` so
//   surface scans and path searches can run on worker threads.
// - `WorldMutate`: block writes. Only `PlacementPipeline::commit_step` calls
//   it, and it needs `&mut`, so the borrow checker enforces the
//   single-writer rule: whoever holds `&mut W` is the world thread.
//
// `VoxelWorld` implements both over a flat `Vec<Material>` indexed by
// `x + z * size_x + (y - min_y) * size_x * size_z`. Out-of-bounds reads
// return `Air`. Out-of-bounds writes are ignored by `set` and rejected by
// `set_block`, which is how tests exercise a failing commit. Tests and the
// demo binary use it as the host.
//
// See also: `surface.rs` for the ground scan over `WorldQuery`,
// `pipeline.rs` for the commit step over `WorldMutate`.

use crate::block::{BlockExtra, Material};
use crate::error::{HamletError, Result};
use crate::types::VoxelCoord;
use rustc_hash::FxHashMap;

/// Read-only view of the host world.
pub trait WorldQuery: Sync {
    fn material_at(&self, pos: VoxelCoord) -> Material;

    /// Y of the highest non-air block in the column, or `min_height() - 1`
    /// for an empty column.
    fn highest_occupied_y(&self, x: i32, z: i32) -> i32;

    /// Lowest valid Y in the world.
    fn min_height(&self) -> i32;
}

/// Block-write capability. Held only by the world thread.
pub trait WorldMutate {
    /// Write one block. An `Err` cancels the queue being committed.
    fn set_block(&mut self, pos: VoxelCoord, material: Material, extra: Option<&BlockExtra>) -> Result<()>;
}

/// Dense 3D block grid with a signed Y origin.
#[derive(Clone, Debug, Default)]
pub struct VoxelWorld {
    /// Flat storage: index = x + z * size_x + (y - min_y) * size_x * size_z.
    blocks: Vec<Material>,
    /// Extra state for the few blocks that carry any.
    extras: FxHashMap<VoxelCoord, BlockExtra>,
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
    pub min_y: i32,
}

impl VoxelWorld {
    /// Create a world of `Air` spanning `x in 0..size_x`, `z in 0..size_z`,
    /// `y in min_y..min_y + size_y`.
    pub fn new(size_x: u32, size_y: u32, size_z: u32, min_y: i32) -> Self {
        let total = (size_x as usize) * (size_y as usize) * (size_z as usize);
        Self {
            blocks: vec![Material::Air; total],
            extras: FxHashMap::default(),
            size_x,
            size_y,
            size_z,
            min_y,
        }
    }

    /// A world with every column filled with `material` from `min_y` up to
    /// and including `ground_y`.
    pub fn flat(size_x: u32, size_y: u32, size_z: u32, min_y: i32, ground_y: i32, material: Material) -> Self {
        let mut world = Self::new(size_x, size_y, size_z, min_y);
        for x in 0..size_x as i32 {
            for z in 0..size_z as i32 {
                world.fill_column(x, z, ground_y, material);
            }
        }
        world
    }

    pub fn in_bounds(&self, coord: VoxelCoord) -> bool {
        let local_y = coord.y - self.min_y;
        coord.x >= 0
            && local_y >= 0
            && coord.z >= 0
            && (coord.x as u32) < self.size_x
            && (local_y as u32) < self.size_y
            && (coord.z as u32) < self.size_z
    }

    fn index(&self, coord: VoxelCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            let x = coord.x as usize;
            let y = (coord.y - self.min_y) as usize;
            let z = coord.z as usize;
            let sx = self.size_x as usize;
            let sz = self.size_z as usize;
            Some(x + z * sx + y * sx * sz)
        } else {
            None
        }
    }

    pub fn get(&self, coord: VoxelCoord) -> Material {
        self.index(coord)
            .map(|i| self.blocks[i])
            .unwrap_or(Material::Air)
    }

    pub fn set(&mut self, coord: VoxelCoord, material: Material) {
        if let Some(i) = self.index(coord) {
            self.blocks[i] = material;
            self.extras.remove(&coord);
        }
    }

    pub fn extra_at(&self, coord: VoxelCoord) -> Option<&BlockExtra> {
        self.extras.get(&coord)
    }

    /// Replace the column at (x, z) with `material` from the floor up to
    /// `top_y` inclusive, and air above.
    pub fn fill_column(&mut self, x: i32, z: i32, top_y: i32, material: Material) {
        let max_y = self.min_y + self.size_y as i32;
        for y in self.min_y..max_y {
            let m = if y <= top_y { material } else { Material::Air };
            self.set(VoxelCoord::new(x, y, z), m);
        }
    }
}

impl WorldQuery for VoxelWorld {
    fn material_at(&self, pos: VoxelCoord) -> Material {
        self.get(pos)
    }

    fn highest_occupied_y(&self, x: i32, z: i32) -> i32 {
        let top = self.min_y + self.size_y as i32 - 1;
        (self.min_y..=top)
            .rev()
            .find(|&y| self.get(VoxelCoord::new(x, y, z)) != Material::Air)
            .unwrap_or(self.min_y - 1)
    }

    fn min_height(&self) -> i32 {
        self.min_y
    }
}

impl WorldMutate for VoxelWorld {
    fn set_block(&mut self, pos: VoxelCoord, material: Material, extra: Option<&BlockExtra>) -> Result<()> {
        if !self.in_bounds(pos) {
            return Err(HamletError::InvalidArgument(format!("block write at {pos} is outside the world")));
        }
        self.set(pos, material);
        if let Some(extra) = extra {
            self.extras.insert(pos, extra.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Facing;

    #[test]
    fn new_world_is_all_air() {
        let world = VoxelWorld::new(4, 4, 4, -2);
        for x in 0..4 {
            for y in -2..2 {
                for z in 0..4 {
                    assert_eq!(world.get(VoxelCoord::new(x, y, z)), Material::Air);
                }
            }
        }
    }

    #[test]
    fn negative_origin_indexing() {
        let mut world = VoxelWorld::new(8, 8, 8, -4);
        world.set(VoxelCoord::new(3, -4, 2), Material::Stone);
        world.set(VoxelCoord::new(3, 3, 2), Material::Dirt);
        assert_eq!(world.get(VoxelCoord::new(3, -4, 2)), Material::Stone);
        assert_eq!(world.get(VoxelCoord::new(3, 3, 2)), Material::Dirt);
        assert_eq!(world.get(VoxelCoord::new(3, -3, 2)), Material::Air);
        // Past the top and below the floor.
        assert_eq!(world.get(VoxelCoord::new(3, 4, 2)), Material::Air);
        assert_eq!(world.get(VoxelCoord::new(3, -5, 2)), Material::Air);
    }

    #[test]
    fn out_of_bounds_write_is_rejected() {
        let mut world = VoxelWorld::new(4, 4, 4, 0);
        world.set(VoxelCoord::new(-1, 0, 0), Material::Stone);
        let result =
            world.set_block(VoxelCoord::new(100, 0, 0), Material::Stairs, Some(&BlockExtra::Facing(Facing::East)));
        assert!(matches!(result, Err(HamletError::InvalidArgument(_))));
        assert!(world.extra_at(VoxelCoord::new(100, 0, 0)).is_none());
    }

    #[test]
    fn highest_occupied_ignores_nothing_but_air() {
        let mut world = VoxelWorld::flat(4, 16, 4, 0, 5, Material::Stone);
        assert_eq!(world.highest_occupied_y(1, 1), 5);
        world.set(VoxelCoord::new(1, 9, 1), Material::Leaves);
        assert_eq!(world.highest_occupied_y(1, 1), 9);
        let empty = VoxelWorld::new(4, 16, 4, -8);
        assert_eq!(empty.highest_occupied_y(0, 0), -9);
    }

    #[test]
    fn set_block_stores_extra_and_plain_set_clears_it() {
        let mut world = VoxelWorld::new(4, 4, 4, 0);
        let pos = VoxelCoord::new(1, 1, 1);
        world
            .set_block(pos, Material::Stairs, Some(&BlockExtra::Facing(Facing::North)))
            .unwrap();
        assert_eq!(world.extra_at(pos), Some(&BlockExtra::Facing(Facing::North)));
        world.set(pos, Material::Stone);
        assert!(world.extra_at(pos).is_none());
    }
}
