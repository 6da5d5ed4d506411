// Core types shared across the engine.
//
// Defines block coordinates (`VoxelCoord`), inclusive axis-aligned boxes
// (`Bounds`), chunk keys used by the mask index, and the strongly-typed
// identifiers for structures, villages, and placement queues. Everything
// here derives `Serialize`/`Deserialize` so hosts can persist receipts and
// queue snapshots.
//
// **Critical constraint: determinism.** Structure and village IDs are
// UUID v4 values drawn from a seeded `SiteRng`, never from OS entropy.
// Queue IDs are sequential integers assigned by the pipeline.

use crate::error::{HamletError, Result};
use crate::prng::SiteRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A block position in world space.
///
/// - X: east  (positive) / west  (negative)
/// - Y: up    (positive) / down  (negative)
/// - Z: south (positive) / north (negative)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Manhattan distance between two coordinates.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        ((self.x - other.x).unsigned_abs())
            + ((self.y - other.y).unsigned_abs())
            + ((self.z - other.z).unsigned_abs())
    }

    /// Chebyshev distance on the X/Z plane (diagonal moves count as one).
    pub fn planar_chebyshev(self, other: Self) -> u32 {
        (self.x - other.x)
            .unsigned_abs()
            .max((self.z - other.z).unsigned_abs())
    }
}

impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Pack a column's X/Z into one key for per-column caches.
pub fn column_key(x: i32, z: i32) -> u64 {
    ((x as u32 as u64) << 32) | (z as u32 as u64)
}

/// Inclusive axis-aligned box. `min <= max` on every axis, and every
/// axis spans fewer than `i32::MAX` cells so `width`/`height`/`depth`
/// always fit an `i32`.
///
/// Construction goes through `Bounds::new`, which rejects inverted and
/// oversized axes; the fields are private so a `Bounds` value is always
/// well-formed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    min: VoxelCoord,
    max: VoxelCoord,
}

impl Bounds {
    pub fn new(min: VoxelCoord, max: VoxelCoord) -> Result<Self> {
        if max.x < min.x || max.y < min.y || max.z < min.z {
            return Err(HamletError::InvalidArgument(format!(
                "bounds max {max} is below min {min} on at least one axis"
            )));
        }
        let span = |lo: i32, hi: i32| i64::from(hi) - i64::from(lo) + 1;
        if [span(min.x, max.x), span(min.y, max.y), span(min.z, max.z)]
            .iter()
            .any(|&s| s > i64::from(i32::MAX))
        {
            return Err(HamletError::InvalidArgument(format!(
                "bounds {min} .. {max} are too large on at least one axis"
            )));
        }
        Ok(Self { min, max })
    }

    /// Build from per-axis `(min_x, max_x, min_y, max_y, min_z, max_z)`.
    pub fn from_extents(
        min_x: i32,
        max_x: i32,
        min_y: i32,
        max_y: i32,
        min_z: i32,
        max_z: i32,
    ) -> Result<Self> {
        Self::new(
            VoxelCoord::new(min_x, min_y, min_z),
            VoxelCoord::new(max_x, max_y, max_z),
        )
    }

    /// Smallest box covering every voxel. Fails for an empty list or a
    /// spread too wide for one box.
    pub fn enclosing(voxels: &[VoxelCoord]) -> Result<Self> {
        let Some(&first) = voxels.first() else {
            return Err(HamletError::InvalidArgument("no voxels to enclose".into()));
        };
        let (mut min, mut max) = (first, first);
        for v in &voxels[1..] {
            min = VoxelCoord::new(min.x.min(v.x), min.y.min(v.y), min.z.min(v.z));
            max = VoxelCoord::new(max.x.max(v.x), max.y.max(v.y), max.z.max(v.z));
        }
        Self::new(min, max)
    }

    pub fn min(&self) -> VoxelCoord {
        self.min
    }

    pub fn max(&self) -> VoxelCoord {
        self.max
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x + 1
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y + 1
    }

    pub fn depth(&self) -> i32 {
        self.max.z - self.min.z + 1
    }

    /// Number of cells in the box, saturating at `usize::MAX`.
    pub fn volume(&self) -> usize {
        (self.width() as usize)
            .saturating_mul(self.height() as usize)
            .saturating_mul(self.depth() as usize)
    }

    pub fn contains(&self, pos: VoxelCoord) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    /// Grow every face by `by`. Fails if a negative `by` would invert an
    /// axis or a face would leave the `i32` range.
    pub fn grown(&self, by: i32) -> Result<Self> {
        let overflow = || HamletError::InvalidArgument(format!("growing {self} by {by} overflows"));
        let down = |v: i32| v.checked_sub(by).ok_or_else(overflow);
        let up = |v: i32| v.checked_add(by).ok_or_else(overflow);
        Self::new(
            VoxelCoord::new(down(self.min.x)?, down(self.min.y)?, down(self.min.z)?),
            VoxelCoord::new(up(self.max.x)?, up(self.max.y)?, up(self.max.z)?),
        )
    }

    /// True when the boxes share at least one cell.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Iterate the X/Z columns covered by the box, X-major.
    pub fn columns(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (self.min.x..=self.max.x).flat_map(move |x| (self.min.z..=self.max.z).map(move |z| (x, z)))
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.min, self.max)
    }
}

/// Chunk column key: world X/Z floor-divided by the chunk size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn containing(x: i32, z: i32, chunk_size: i32) -> Self {
        Self {
            x: x.div_euclid(chunk_size),
            z: z.div_euclid(chunk_size),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity IDs (deterministic UUID v4)
// ---------------------------------------------------------------------------

/// A UUID v4 drawn from a `SiteRng`.
///
/// RFC 4122 layout: version nibble (byte 6 upper) `0100`, variant bits
/// (byte 8 upper two) `10`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityUuid([u8; 16]);

impl EntityUuid {
    pub fn new_v4(rng: &mut SiteRng) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&rng.next_u64().to_le_bytes());
        bytes[8..].copy_from_slice(&rng.next_u64().to_le_bytes());
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self(bytes)
    }

    /// Parse the 8-4-4-4-12 hex form.
    pub fn parse(s: &str) -> Option<Self> {
        let hex: String = s.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// Serialized as the hex string so IDs work as JSON map keys.
impl Serialize for EntityUuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityUuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EntityUuid::parse(&s).ok_or_else(|| serde::de::Error::custom("invalid UUID format"))
    }
}

impl fmt::Debug for EntityUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityUuid({})", self)
    }
}

impl fmt::Display for EntityUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub EntityUuid);

        impl $name {
            pub fn new(rng: &mut SiteRng) -> Self {
                Self(EntityUuid::new_v4(rng))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

entity_id!(/// Identifies a placed or pending structure (house, well, road).
StructureId);
entity_id!(/// Identifies the village a structure belongs to.
VillageId);

/// Compact identifier for a placement queue, assigned sequentially by the
/// pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueId(pub u64);

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}
