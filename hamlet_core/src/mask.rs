// Volume masks: the space a structure occupies.
//
// A `VolumeMask` is an inclusive axis-aligned box owned by one structure,
// optionally refined by a per-cell occupancy bitmap. Without a bitmap the
// whole box counts as occupied. Masks are immutable once built; replacing
// a structure means building a new mask and superseding the old one in the
// `MaskIndex` (see `mask_index.rs`).
//
// The bitmap is flattened x-major, then y, then z:
//   index = ((x - min.x) * height + (y - min.y)) * depth + (z - min.z)
// `with_cells` and `contains` both go through `cell_index`, so the order
// cannot drift between the writer and the reader.
//
// Persistence is the host's concern. A mask reduces to a `MaskReceipt`
// (identifiers, per-axis min/max, creation tick) and is rebuilt from one
// with `from_receipt`. Receipts do not carry the bitmap; a reloaded mask is
// a full box.
//
// See also: `surface.rs` and `walkable.rs`, which read masks through the
// index, `placement.rs` which builds footprint masks for new structures.

use crate::error::{HamletError, Result};
use crate::types::{Bounds, StructureId, VillageId, VoxelCoord};
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type OccupancyBits = BitVec<u64, Lsb0>;

/// Occupied space for one structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeMask {
    structure_id: StructureId,
    village_id: VillageId,
    bounds: Bounds,
    /// `None` means the whole box is solid.
    occupancy: Option<OccupancyBits>,
    created_tick: u64,
}

impl VolumeMask {
    /// A full-box mask over validated bounds.
    pub fn new(
        structure_id: StructureId,
        village_id: VillageId,
        bounds: Bounds,
        created_tick: u64,
    ) -> Self {
        Self {
            structure_id,
            village_id,
            bounds,
            occupancy: None,
            created_tick,
        }
    }

    /// A full-box mask from raw corners. Fails with `InvalidArgument` if
    /// `max < min` on any axis.
    pub fn from_corners(
        structure_id: StructureId,
        village_id: VillageId,
        min: VoxelCoord,
        max: VoxelCoord,
        created_tick: u64,
    ) -> Result<Self> {
        Ok(Self::new(structure_id, village_id, Bounds::new(min, max)?, created_tick))
    }

    /// A mask whose bitmap marks exactly `cells`, bounded by their
    /// enclosing box.
    pub fn with_cells(
        structure_id: StructureId,
        village_id: VillageId,
        cells: &[VoxelCoord],
        created_tick: u64,
    ) -> Result<Self> {
        let bounds = Bounds::enclosing(cells)?;
        let mut mask = Self::new(structure_id, village_id, bounds, created_tick);
        let mut bits = bitvec![u64, Lsb0; 0; bounds.volume()];
        for &cell in cells {
            if let Some(i) = mask.cell_index(cell) {
                bits.set(i, true);
            }
        }
        mask.occupancy = Some(bits);
        Ok(mask)
    }

    /// A mask with a caller-built bitmap. The bitmap length must equal the
    /// box volume.
    pub fn with_occupancy(
        structure_id: StructureId,
        village_id: VillageId,
        bounds: Bounds,
        occupancy: OccupancyBits,
        created_tick: u64,
    ) -> Result<Self> {
        if occupancy.len() != bounds.volume() {
            return Err(HamletError::InvalidArgument(format!(
                "occupancy bitmap has {} bits, bounds {bounds} need {}",
                occupancy.len(),
                bounds.volume()
            )));
        }
        Ok(Self {
            structure_id,
            village_id,
            bounds,
            occupancy: Some(occupancy),
            created_tick,
        })
    }

    /// Rebuild a mask from a persisted receipt.
    pub fn from_receipt(receipt: &MaskReceipt) -> Result<Self> {
        let bounds = Bounds::from_extents(
            receipt.min_x,
            receipt.max_x,
            receipt.min_y,
            receipt.max_y,
            receipt.min_z,
            receipt.max_z,
        )?;
        Ok(Self::new(
            receipt.structure_id,
            receipt.village_id,
            bounds,
            receipt.created_tick,
        ))
    }

    pub fn to_receipt(&self) -> MaskReceipt {
        let (min, max) = (self.bounds.min(), self.bounds.max());
        MaskReceipt {
            structure_id: self.structure_id,
            village_id: self.village_id,
            min_x: min.x,
            max_x: max.x,
            min_y: min.y,
            max_y: max.y,
            min_z: min.z,
            max_z: max.z,
            created_tick: self.created_tick,
        }
    }

    pub fn structure_id(&self) -> StructureId {
        self.structure_id
    }

    pub fn village_id(&self) -> VillageId {
        self.village_id
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn created_tick(&self) -> u64 {
        self.created_tick
    }

    pub fn width(&self) -> i32 {
        self.bounds.width()
    }

    pub fn height(&self) -> i32 {
        self.bounds.height()
    }

    pub fn depth(&self) -> i32 {
        self.bounds.depth()
    }

    pub fn is_full_box(&self) -> bool {
        self.occupancy.is_none()
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        match &self.occupancy {
            Some(bits) => bits.count_ones(),
            None => self.bounds.volume(),
        }
    }

    /// Flattened bitmap index, or `None` outside the box.
    fn cell_index(&self, pos: VoxelCoord) -> Option<usize> {
        if !self.bounds.contains(pos) {
            return None;
        }
        let min = self.bounds.min();
        let dx = (pos.x - min.x) as usize;
        let dy = (pos.y - min.y) as usize;
        let dz = (pos.z - min.z) as usize;
        Some((dx * self.height() as usize + dy) * self.depth() as usize + dz)
    }

    /// True iff `pos` is inside the box and (no bitmap, or its bit is set).
    pub fn contains(&self, pos: VoxelCoord) -> bool {
        match (self.cell_index(pos), &self.occupancy) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(i), Some(bits)) => bits[i],
        }
    }

    /// Coarse column test: (x, z) inside the X/Z footprint and
    /// `[y_min, y_max]` overlapping the Y range, both inclusive. Ignores
    /// the bitmap.
    pub fn contains_2d(&self, x: i32, z: i32, y_min: i32, y_max: i32) -> bool {
        let (min, max) = (self.bounds.min(), self.bounds.max());
        x >= min.x
            && x <= max.x
            && z >= min.z
            && z <= max.z
            && y_min <= max.y
            && y_max >= min.y
    }

    /// Grow every face by `buffer`. Zero returns the same `Arc`; negative
    /// fails with `InvalidArgument`. The grown mask is a full box.
    pub fn expand(self: &Arc<Self>, buffer: i32) -> Result<Arc<VolumeMask>> {
        if buffer < 0 {
            return Err(HamletError::InvalidArgument(format!(
                "expand buffer must be non-negative, got {buffer}"
            )));
        }
        if buffer == 0 {
            return Ok(Arc::clone(self));
        }
        Ok(Arc::new(Self {
            structure_id: self.structure_id,
            village_id: self.village_id,
            bounds: self.bounds.grown(buffer)?,
            occupancy: None,
            created_tick: self.created_tick,
        }))
    }
}

/// Persisted record of a committed structure's footprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskReceipt {
    pub structure_id: StructureId,
    pub village_id: VillageId,
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
    pub min_z: i32,
    pub max_z: i32,
    pub created_tick: u64,
}
