// Block materials and optional block state.
//
// The engine never talks to a concrete voxel engine; hosts translate their
// own block registry into `Material` at the `WorldQuery` boundary. The
// classification methods here are the only place that decides what counts
// as ground (`is_solid && !is_vegetation`), what slows a road down
// (`is_liquid`, `is_rough`), and what must be placed after its support
// (`needs_support`).
//
// `BlockEntry` is the unit of work everywhere downstream: siting emits
// leveling entries, road paving emits surface and ramp entries, and the
// placement pipeline orders and commits them.
//
// See also: `surface.rs` for the ground scan that uses `is_vegetation`,
// `pathfinding.rs` for the terrain cost model, `placement_queue.rs` for
// the attachment-aware commit order.

use crate::types::VoxelCoord;
use serde::{Deserialize, Serialize};

/// Material of a single block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Material {
    #[default]
    Air,
    Stone,
    Dirt,
    GrassBlock,
    Sand,
    Gravel,
    Cobblestone,
    Planks,
    Log,
    Glass,
    DirtPath,
    Water,
    Lava,
    Leaves,
    TallGrass,
    Fern,
    Vine,
    Flower,
    Stairs,
    Slab,
    Torch,
    Ladder,
    Door,
}

impl Material {
    /// Blocks something can stand on. Plants and liquids are not solid in
    /// this sense even when the host engine gives them collision.
    pub fn is_solid(self) -> bool {
        !matches!(
            self,
            Material::Air
                | Material::Water
                | Material::Lava
                | Material::TallGrass
                | Material::Fern
                | Material::Vine
                | Material::Flower
                | Material::Torch
                | Material::Ladder
                | Material::Door
        )
    }

    /// Canopy and ground cover: never counted as ground, even when solid
    /// (leaves).
    pub fn is_vegetation(self) -> bool {
        matches!(
            self,
            Material::Leaves
                | Material::TallGrass
                | Material::Fern
                | Material::Vine
                | Material::Flower
        )
    }

    pub fn is_liquid(self) -> bool {
        matches!(self, Material::Water | Material::Lava)
    }

    /// Loose or uneven ground that roads route around when they can.
    pub fn is_rough(self) -> bool {
        matches!(self, Material::Sand | Material::Gravel)
    }

    /// Blocks that hang on a neighbor and break if placed first.
    pub fn needs_support(self) -> bool {
        matches!(self, Material::Torch | Material::Ladder | Material::Door)
    }
}

/// Horizontal facing for directional blocks (stairs, ladders, doors).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Facing {
    North,
    East,
    South,
    West,
}

impl Facing {
    /// Facing of a planar step. Diagonal steps resolve to the X axis.
    pub fn of_step(dx: i32, dz: i32) -> Self {
        if dx > 0 {
            Facing::East
        } else if dx < 0 {
            Facing::West
        } else if dz > 0 {
            Facing::South
        } else {
            Facing::North
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Facing::North => Facing::South,
            Facing::South => Facing::North,
            Facing::East => Facing::West,
            Facing::West => Facing::East,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlabHalf {
    Bottom,
    Top,
}

/// Extra state written alongside a material.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockExtra {
    Facing(Facing),
    Slab(SlabHalf),
    /// Opaque host-specific state, passed through untouched.
    Data(String),
}

/// One block write: where, what, and any extra state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockEntry {
    pub pos: VoxelCoord,
    pub material: Material,
    pub extra: Option<BlockExtra>,
}

impl BlockEntry {
    pub fn new(pos: VoxelCoord, material: Material) -> Self {
        Self {
            pos,
            material,
            extra: None,
        }
    }

    pub fn with_extra(pos: VoxelCoord, material: Material, extra: BlockExtra) -> Self {
        Self {
            pos,
            material,
            extra: Some(extra),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_are_solid_vegetation() {
        assert!(Material::Leaves.is_solid());
        assert!(Material::Leaves.is_vegetation());
    }

    #[test]
    fn ground_cover_is_neither_solid_nor_ground() {
        for m in [Material::TallGrass, Material::Fern, Material::Vine, Material::Flower] {
            assert!(!m.is_solid(), "{m:?} should not be solid");
            assert!(m.is_vegetation(), "{m:?} should be vegetation");
        }
    }

    #[test]
    fn liquids_are_not_solid() {
        assert!(!Material::Water.is_solid());
        assert!(Material::Water.is_liquid());
        assert!(Material::Stone.is_solid());
        assert!(!Material::Stone.is_liquid());
    }

    #[test]
    fn facing_of_step_prefers_x_axis() {
        assert_eq!(Facing::of_step(1, 1), Facing::East);
        assert_eq!(Facing::of_step(-1, 0), Facing::West);
        assert_eq!(Facing::of_step(0, 1), Facing::South);
        assert_eq!(Facing::of_step(0, -1), Facing::North);
        assert_eq!(Facing::East.opposite(), Facing::West);
    }
}
