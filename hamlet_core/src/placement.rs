// Structure siting: rotated footprints, collision, leveling.
//
// A structure's footprint is `width` along its local X, `depth` along its
// local Z and `height` up. Rotation happens around the origin voxel in
// right angles only; the rotated box is always axis-aligned.
//
//   0°    x: origin .. origin + width - 1,  z: origin .. origin + depth - 1
//   90°   x: origin - depth .. origin - 1,  z: origin .. origin + width - 1
//   180°  x: origin - width .. origin - 1,  z: origin - depth .. origin - 1
//   270°  x: origin .. origin + depth - 1,  z: origin - width .. origin - 1
//
// Y always spans origin .. origin + height - 1.
//
// Collision is a plain AABB overlap test with the spacing buffer added to
// the separation on every face. It uses bounds only, never per-cell
// occupancy: spacing is about keeping structures apart, not about whether
// two bitmaps share a voxel.
//
// `PlacementHelper::find_site` walks candidate origins in caller order and
// tries the four rotations in a seed-shuffled order at each. A candidate is
// accepted when its footprint's ground can be leveled to the median
// surface height within `max_level_delta` and the leveled box clears every
// registered mask by `spacing_buffer`.
//
// See also: `mask_index.rs` for overlap queries, `surface.rs` for the
// ground heights leveling is computed from, `pipeline.rs` which commits
// the leveling entries and publishes the footprint mask.

use crate::block::{BlockEntry, Material};
use crate::config::PlacementConfig;
use crate::error::{HamletError, Result};
use crate::mask::VolumeMask;
use crate::prng::SiteRng;
use crate::surface::SurfaceSolver;
use crate::types::{Bounds, StructureId, VillageId, VoxelCoord};
use crate::world::WorldQuery;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    /// Exact right angles only (any multiple of 360 added is fine).
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::R0),
            90 => Ok(Rotation::R90),
            180 => Ok(Rotation::R180),
            270 => Ok(Rotation::R270),
            _ => Err(HamletError::InvalidArgument(format!(
                "rotation must be a right angle, got {degrees} degrees"
            ))),
        }
    }

    /// Snap an arbitrary angle to the closest right angle. Halfway values
    /// round up.
    pub fn nearest(degrees: i32) -> Self {
        match ((degrees.rem_euclid(360) + 45) / 90) % 4 {
            0 => Rotation::R0,
            1 => Rotation::R90,
            2 => Rotation::R180,
            _ => Rotation::R270,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }
}

/// Local size of a structure before rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub width: i32,
    pub depth: i32,
    pub height: i32,
}

impl Footprint {
    pub fn new(width: i32, depth: i32, height: i32) -> Result<Self> {
        if width <= 0 || depth <= 0 || height <= 0 {
            return Err(HamletError::InvalidArgument(format!(
                "footprint dimensions must be positive, got {width}x{depth}x{height}"
            )));
        }
        Ok(Self { width, depth, height })
    }
}

/// World-space bounds of a footprint rotated around `origin`.
pub fn compute_rotated_aabb(
    origin: VoxelCoord,
    width: i32,
    depth: i32,
    height: i32,
    rotation: Rotation,
) -> Result<Bounds> {
    let Footprint { width, depth, height } = Footprint::new(width, depth, height)?;
    let (x, y, z) = (i64::from(origin.x), i64::from(origin.y), i64::from(origin.z));
    let (width, depth, height) = (i64::from(width), i64::from(depth), i64::from(height));
    let (min_x, max_x, min_z, max_z) = match rotation {
        Rotation::R0 => (x, x + width - 1, z, z + depth - 1),
        Rotation::R90 => (x - depth, x - 1, z, z + width - 1),
        Rotation::R180 => (x - width, x - 1, z - depth, z - 1),
        Rotation::R270 => (x, x + depth - 1, z - width, z - 1),
    };
    let narrow = |v: i64| {
        i32::try_from(v).map_err(|_| {
            HamletError::InvalidArgument(format!("footprint at {origin} rotated {rotation:?} leaves the i32 range"))
        })
    };
    Bounds::from_extents(
        narrow(min_x)?,
        narrow(max_x)?,
        origin.y,
        narrow(y + height - 1)?,
        narrow(min_z)?,
        narrow(max_z)?,
    )
}

/// True when `candidate`, grown by `spacing_buffer` on every face,
/// overlaps any of the given masks' bounds.
pub fn check_rotated_aabb_collision<'a>(
    candidate: &Bounds,
    existing: impl IntoIterator<Item = &'a VolumeMask>,
    spacing_buffer: i32,
) -> bool {
    // Widened so a buffer near the coordinate limits cannot wrap.
    let wide = |c: VoxelCoord| (i64::from(c.x), i64::from(c.y), i64::from(c.z));
    let (lo, hi) = (wide(candidate.min()), wide(candidate.max()));
    let buffer = i64::from(spacing_buffer);
    existing.into_iter().any(|mask| {
        let (other_lo, other_hi) = (wide(mask.bounds().min()), wide(mask.bounds().max()));
        lo.0 - buffer <= other_hi.0
            && other_lo.0 <= hi.0 + buffer
            && lo.1 - buffer <= other_hi.1
            && other_lo.1 <= hi.1 + buffer
            && lo.2 - buffer <= other_hi.2
            && other_lo.2 <= hi.2 + buffer
    })
}

/// An accepted site: where the structure goes and how the ground under it
/// is leveled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitePlan {
    /// Rotation pivot, one above the leveled ground.
    pub origin: VoxelCoord,
    pub rotation: Rotation,
    pub bounds: Bounds,
    /// Ground height every footprint column is leveled to.
    pub ground_y: i32,
    /// Largest fill or cut any column needs.
    pub max_level_delta: i32,
}

pub struct PlacementHelper<'s, 'w, W: WorldQuery + ?Sized> {
    surface: &'s SurfaceSolver<'w, W>,
    config: PlacementConfig,
}

impl<'s, 'w, W: WorldQuery + ?Sized> PlacementHelper<'s, 'w, W> {
    pub fn new(surface: &'s SurfaceSolver<'w, W>, config: &PlacementConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            surface,
            config: config.clone(),
        })
    }

    /// Whether `bounds` comes within the spacing buffer of a registered
    /// mask.
    pub fn collides(&self, bounds: &Bounds) -> bool {
        let buffer = self.config.spacing_buffer;
        let Ok(reach) = bounds.grown(buffer) else {
            return true;
        };
        let nearby = self.surface.masks().overlapping(&reach);
        check_rotated_aabb_collision(bounds, nearby.iter().map(|m| m.as_ref()), buffer)
    }

    /// First acceptable site among `candidates` (X/Z columns, tried in
    /// order). Rotations at each candidate are tried in an order drawn
    /// from `seed`. `None` when nothing fits.
    pub fn find_site(&self, footprint: Footprint, candidates: &[(i32, i32)], seed: u64) -> Option<SitePlan> {
        let mut rng = SiteRng::new(seed);
        for &(x, z) in candidates {
            let mut rotations = Rotation::ALL;
            rng.shuffle(&mut rotations);
            for rotation in rotations {
                if let Some(plan) = self.try_site(footprint, x, z, rotation) {
                    log::debug!(
                        "site at ({x}, {z}) rotated {} accepted, ground {} (level delta {})",
                        rotation.degrees(),
                        plan.ground_y,
                        plan.max_level_delta
                    );
                    return Some(plan);
                }
            }
        }
        log::debug!("no site found among {} candidates", candidates.len());
        None
    }

    fn try_site(&self, footprint: Footprint, x: i32, z: i32, rotation: Rotation) -> Option<SitePlan> {
        // Columns are the same at any Y, so probe the footprint at y = 0.
        let probe = compute_rotated_aabb(
            VoxelCoord::new(x, 0, z),
            footprint.width,
            footprint.depth,
            footprint.height,
            rotation,
        )
        .ok()?;
        let mut heights: Vec<i32> = probe
            .columns()
            .map(|(cx, cz)| self.surface.surface_height(cx, cz))
            .collect();
        heights.sort_unstable();
        let ground_y = heights[(heights.len() - 1) / 2];
        let max_level_delta = heights
            .iter()
            .map(|h| (h - ground_y).abs())
            .max()
            .unwrap_or(0);
        if max_level_delta > self.config.max_level_delta {
            return None;
        }

        let origin = VoxelCoord::new(x, ground_y + 1, z);
        let bounds =
            compute_rotated_aabb(origin, footprint.width, footprint.depth, footprint.height, rotation).ok()?;
        if self.collides(&bounds) {
            return None;
        }
        Some(SitePlan {
            origin,
            rotation,
            bounds,
            ground_y,
            max_level_delta,
        })
    }

    /// Block writes that bring every footprint column to `plan.ground_y`:
    /// `fill` below it where the ground is low, air above it where the
    /// ground is high. Columns already level emit nothing.
    pub fn leveling_entries(&self, plan: &SitePlan, fill: Material) -> Vec<BlockEntry> {
        let mut entries = Vec::new();
        for (x, z) in plan.bounds.columns() {
            let ground = self.surface.surface_height(x, z);
            if ground < plan.ground_y {
                entries.extend((ground + 1..=plan.ground_y).map(|y| BlockEntry::new(VoxelCoord::new(x, y, z), fill)));
            } else if ground > plan.ground_y {
                entries.extend(
                    (plan.ground_y + 1..=ground).map(|y| BlockEntry::new(VoxelCoord::new(x, y, z), Material::Air)),
                );
            }
        }
        entries
    }

    /// Full-box mask over the plan's bounds.
    pub fn footprint_mask(
        &self,
        plan: &SitePlan,
        structure_id: StructureId,
        village_id: VillageId,
        tick: u64,
    ) -> VolumeMask {
        VolumeMask::new(structure_id, village_id, plan.bounds, tick)
    }
}
