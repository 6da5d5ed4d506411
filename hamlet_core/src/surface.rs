// Ground-surface solver: G(x, z).
//
// G(x, z) is the Y of the highest block in the column that is solid, not
// vegetation, and not inside any registered volume mask. Masked cells are
// invisible to the scan, so a structure that has been placed (or is being
// placed) never raises the ground under itself: siting and pathing see the
// terrain as it was before anything was built there.
//
// ## Scan
//
// 1. Start one above `highest_occupied_y(x, z)` and walk down to
//    `min_height()`.
// 2. Masks that could touch the column are gathered once via the chunk
//    bucket and the coarse `contains_2d` test; each Y is then checked
//    per-cell against only those. A full-box mask lets the scan jump
//    straight below it.
// 3. The first solid, non-vegetation block wins. Leaves, tall grass,
//    ferns, vines and flowers never count as ground.
// 4. Reaching the floor without a hit returns `min_height()`. G is
//    always defined.
//
// ## Cache
//
// Results are cached per packed (x, z). Nothing invalidates an entry on
// its own: the terrain is assumed static. When a new mask is committed the
// owner calls `refresh_masks` (or `invalidate_bounds`) with the new
// footprint so columns under and around it are rescanned.
//
// The cache is a `RefCell`, so a solver is `Send` but not `Sync`. Each
// worker thread builds its own solver over a shared `Arc<MaskIndex>`
// snapshot; building one is cheap.
//
// See also: `walkable.rs` for the walkability predicate built on G,
// `placement.rs` for footprint leveling, `mask_index.rs` for snapshots.

use crate::mask_index::MaskIndex;
use crate::types::{Bounds, VoxelCoord, column_key};
use crate::world::WorldQuery;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::sync::Arc;

pub struct SurfaceSolver<'w, W: WorldQuery + ?Sized> {
    world: &'w W,
    masks: Arc<MaskIndex>,
    cache: RefCell<FxHashMap<u64, i32>>,
}

impl<'w, W: WorldQuery + ?Sized> SurfaceSolver<'w, W> {
    pub fn new(world: &'w W, masks: Arc<MaskIndex>) -> Self {
        Self {
            world,
            masks,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn world(&self) -> &'w W {
        self.world
    }

    pub fn masks(&self) -> &Arc<MaskIndex> {
        &self.masks
    }

    /// G(x, z): Y of the highest unmasked, non-vegetation solid block, or
    /// the world floor if the column has none.
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let key = column_key(x, z);
        if let Some(&y) = self.cache.borrow().get(&key) {
            return y;
        }
        let y = self.scan_column(x, z);
        self.cache.borrow_mut().insert(key, y);
        y
    }

    fn scan_column(&self, x: i32, z: i32) -> i32 {
        let floor = self.world.min_height();
        let top = self.world.highest_occupied_y(x, z) + 1;
        let candidates = self.masks.column_candidates(x, z, floor, top);

        let mut y = top;
        while y >= floor {
            let pos = VoxelCoord::new(x, y, z);
            if let Some(mask) = candidates.iter().find(|m| m.contains(pos)) {
                y = if mask.is_full_box() {
                    mask.bounds().min().y - 1
                } else {
                    y - 1
                };
                continue;
            }
            let material = self.world.material_at(pos);
            if material.is_solid() && !material.is_vegetation() {
                return y;
            }
            y -= 1;
        }
        floor
    }

    /// Standing height above the ground at (x, z): G + 1, or `None` when
    /// that cell is itself inside a mask. `None` means blocked, not
    /// "ground level".
    pub fn nearest_walkable(&self, x: i32, z: i32) -> Option<i32> {
        let candidate = self.surface_height(x, z) + 1;
        if self.masks.contains_point(VoxelCoord::new(x, candidate, z)) {
            None
        } else {
            Some(candidate)
        }
    }

    /// Drop the cached height of one column.
    pub fn invalidate_column(&self, x: i32, z: i32) {
        self.cache.borrow_mut().remove(&column_key(x, z));
    }

    /// Drop cached heights for every column under `bounds` grown by
    /// `margin` on the X/Z plane.
    pub fn invalidate_bounds(&self, bounds: &Bounds, margin: i32) {
        let margin = margin.max(0);
        let mut cache = self.cache.borrow_mut();
        for x in bounds.min().x - margin..=bounds.max().x + margin {
            for z in bounds.min().z - margin..=bounds.max().z + margin {
                cache.remove(&column_key(x, z));
            }
        }
    }

    /// Swap in a newer mask snapshot. Columns under `changed` (plus
    /// `margin`) are rescanned on next use.
    pub fn refresh_masks(&mut self, masks: Arc<MaskIndex>, changed: Option<&Bounds>, margin: i32) {
        self.masks = masks;
        if let Some(bounds) = changed {
            self.invalidate_bounds(bounds, margin);
        }
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn cached_columns(&self) -> usize {
        self.cache.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Material;
    use crate::mask::VolumeMask;
    use crate::prng::SiteRng;
    use crate::types::{StructureId, VillageId};
    use crate::world::VoxelWorld;

    fn index_with(boxes: &[(VoxelCoord, VoxelCoord)]) -> Arc<MaskIndex> {
        let mut rng = SiteRng::new(11);
        let mut index = MaskIndex::new(16).unwrap();
        for &(min, max) in boxes {
            index.insert(Arc::new(
                VolumeMask::from_corners(
                    StructureId::new(&mut rng),
                    VillageId::new(&mut rng),
                    min,
                    max,
                    0,
                )
                .unwrap(),
            ));
        }
        Arc::new(index)
    }

    #[test]
    fn open_ground_gives_one_above_surface() {
        let world = VoxelWorld::flat(8, 128, 8, 0, 50, Material::GrassBlock);
        let solver = SurfaceSolver::new(&world, index_with(&[]));
        assert_eq!(solver.surface_height(3, 3), 50);
        assert_eq!(solver.nearest_walkable(3, 3), Some(51));
    }

    #[test]
    fn embedded_block_inside_mask_is_ignored() {
        let mut world = VoxelWorld::flat(8, 128, 8, 0, 50, Material::Stone);
        // A structure block at Y=65 inside a mask spanning 60..=70.
        world.set(VoxelCoord::new(2, 65, 2), Material::Planks);
        let masks = index_with(&[(VoxelCoord::new(0, 60, 0), VoxelCoord::new(4, 70, 4))]);
        let solver = SurfaceSolver::new(&world, masks);
        assert_eq!(solver.surface_height(2, 2), 50);
        assert_eq!(solver.nearest_walkable(2, 2), Some(51));
    }

    #[test]
    fn candidate_inside_mask_is_blocked() {
        let world = VoxelWorld::flat(8, 128, 8, 0, 59, Material::Dirt);
        let masks = index_with(&[(VoxelCoord::new(0, 60, 0), VoxelCoord::new(4, 70, 4))]);
        let solver = SurfaceSolver::new(&world, masks);
        assert_eq!(solver.surface_height(1, 1), 59);
        assert_eq!(solver.nearest_walkable(1, 1), None);
        // Just outside the footprint the same ground is walkable.
        assert_eq!(solver.nearest_walkable(5, 1), Some(60));
    }

    #[test]
    fn canopy_is_not_ground() {
        let mut world = VoxelWorld::flat(8, 128, 8, 0, 40, Material::GrassBlock);
        for y in 50..55 {
            world.set(VoxelCoord::new(4, y, 4), Material::Leaves);
        }
        world.set(VoxelCoord::new(4, 41, 4), Material::TallGrass);
        world.set(VoxelCoord::new(5, 41, 4), Material::Flower);
        let solver = SurfaceSolver::new(&world, index_with(&[]));
        assert_eq!(solver.surface_height(4, 4), 40);
        assert_eq!(solver.surface_height(5, 4), 40);
    }

    #[test]
    fn water_is_not_ground() {
        let mut world = VoxelWorld::flat(8, 128, 8, 0, 30, Material::Sand);
        for y in 31..=34 {
            world.set(VoxelCoord::new(1, y, 1), Material::Water);
        }
        let solver = SurfaceSolver::new(&world, index_with(&[]));
        assert_eq!(solver.surface_height(1, 1), 30);
    }

    #[test]
    fn empty_column_falls_back_to_world_floor() {
        let world = VoxelWorld::new(4, 64, 4, -32);
        let solver = SurfaceSolver::new(&world, index_with(&[]));
        assert_eq!(solver.surface_height(0, 0), -32);
        // Outside the world entirely.
        assert_eq!(solver.surface_height(-100, 500), -32);
    }

    #[test]
    fn per_cell_mask_only_hides_its_cells() {
        let mut world = VoxelWorld::flat(8, 128, 8, 0, 50, Material::Stone);
        world.set(VoxelCoord::new(2, 60, 2), Material::Planks);
        world.set(VoxelCoord::new(3, 60, 2), Material::Planks);
        let mut rng = SiteRng::new(3);
        let mut index = MaskIndex::new(16).unwrap();
        // Only (2, 60, 2) and a far corner are masked.
        index.insert(Arc::new(
            VolumeMask::with_cells(
                StructureId::new(&mut rng),
                VillageId::new(&mut rng),
                &[VoxelCoord::new(2, 60, 2), VoxelCoord::new(4, 62, 4)],
                0,
            )
            .unwrap(),
        ));
        let solver = SurfaceSolver::new(&world, Arc::new(index));
        assert_eq!(solver.surface_height(2, 2), 50);
        assert_eq!(solver.surface_height(3, 2), 60);
    }

    #[test]
    fn invalidate_column_drops_only_that_entry() {
        let world = VoxelWorld::flat(8, 128, 8, 0, 20, Material::Dirt);
        let solver = SurfaceSolver::new(&world, index_with(&[]));
        assert_eq!(solver.surface_height(1, 1), 20);
        assert_eq!(solver.surface_height(2, 1), 20);
        assert_eq!(solver.cached_columns(), 2);
        solver.invalidate_column(1, 1);
        assert_eq!(solver.cached_columns(), 1);
        assert_eq!(solver.surface_height(1, 1), 20);
        solver.clear_cache();
        assert_eq!(solver.cached_columns(), 0);
    }

    #[test]
    fn refresh_masks_rescans_changed_footprint() {
        let world = VoxelWorld::flat(16, 128, 16, 0, 40, Material::Stone);
        let mut solver = SurfaceSolver::new(&world, index_with(&[]));
        assert_eq!(solver.nearest_walkable(5, 5), Some(41));
        assert_eq!(solver.nearest_walkable(12, 12), Some(41));
        let footprint = Bounds::from_extents(4, 6, 41, 45, 4, 6).unwrap();
        let masks = index_with(&[(footprint.min(), footprint.max())]);
        solver.refresh_masks(masks, Some(&footprint), 1);
        // Far column kept its cache entry.
        assert_eq!(solver.cached_columns(), 1);
        assert_eq!(solver.nearest_walkable(5, 5), None);
        assert_eq!(solver.nearest_walkable(12, 12), Some(41));
    }
}
