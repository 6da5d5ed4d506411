// Chunk-bucketed lookup over registered volume masks.
//
// Masks live in `slots`, a `Vec` in registration order; that vector is the
// authoritative store and the only thing ever iterated. `buckets` maps each
// chunk column (X/Z floor-divided by `chunk_size`) to the slot numbers of
// the masks whose bounds touch that chunk, and `by_structure` maps a
// structure to its slot. Both are lookup accelerators; bucket lists are
// kept in ascending slot order so every query returns masks in
// registration order.
//
// Removal clears the slot and strips it from every bucket it was in.
// Inserting a mask for a structure that already has one supersedes it:
// the old mask is removed first, the new one gets a fresh slot. Once
// cleared slots outnumber live ones the vector is compacted; slot numbers
// are remapped in order, so registration order survives.
//
// `MaskRegistry` is the shared, concurrently readable face of the index.
// Readers take an `Arc<MaskIndex>` snapshot and keep it for as long as
// they like. Writers copy-on-write (`Arc::make_mut`) under a short write
// lock and swap the new snapshot in, so a reader never observes a
// half-inserted mask.
//
// See also: `mask.rs` for `VolumeMask`, `surface.rs` and `walkable.rs`
// for the main readers.

use crate::error::{HamletError, Result};
use crate::mask::{MaskReceipt, VolumeMask};
use crate::types::{Bounds, ChunkCoord, StructureId, VoxelCoord};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

/// Cleared slots tolerated before `remove` considers compacting.
const COMPACT_MIN_DEAD: usize = 16;

/// Chunk keys touched by the X/Z extent of `bounds`.
fn chunks_of(bounds: &Bounds, chunk_size: i32) -> impl Iterator<Item = ChunkCoord> {
    let lo = ChunkCoord::containing(bounds.min().x, bounds.min().z, chunk_size);
    let hi = ChunkCoord::containing(bounds.max().x, bounds.max().z, chunk_size);
    (lo.x..=hi.x).flat_map(move |x| (lo.z..=hi.z).map(move |z| ChunkCoord { x, z }))
}

/// Chunk-bucketed set of masks.
#[derive(Clone, Debug)]
pub struct MaskIndex {
    chunk_size: i32,
    slots: Vec<Option<Arc<VolumeMask>>>,
    by_structure: BTreeMap<StructureId, usize>,
    buckets: FxHashMap<ChunkCoord, SmallVec<[usize; 4]>>,
}

impl MaskIndex {
    pub fn new(chunk_size: i32) -> Result<Self> {
        if chunk_size <= 0 {
            return Err(HamletError::InvalidArgument(format!(
                "chunk size must be positive, got {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            slots: Vec::new(),
            by_structure: BTreeMap::new(),
            buckets: FxHashMap::default(),
        })
    }

    /// Rebuild an index from persisted receipts, in receipt order.
    pub fn from_receipts(chunk_size: i32, receipts: &[MaskReceipt]) -> Result<Self> {
        let mut index = Self::new(chunk_size)?;
        for receipt in receipts {
            index.insert(Arc::new(VolumeMask::from_receipt(receipt)?));
        }
        Ok(index)
    }

    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    pub fn len(&self) -> usize {
        self.by_structure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_structure.is_empty()
    }

    /// Register a mask. Returns the mask it superseded, if the structure
    /// already had one.
    pub fn insert(&mut self, mask: Arc<VolumeMask>) -> Option<Arc<VolumeMask>> {
        let superseded = self.remove(mask.structure_id());
        let slot = self.slots.len();
        for chunk in chunks_of(mask.bounds(), self.chunk_size) {
            // New slots are always the largest, so pushing keeps buckets sorted.
            self.buckets.entry(chunk).or_default().push(slot);
        }
        self.by_structure.insert(mask.structure_id(), slot);
        log::debug!(
            "mask registered: {} bounds {} (superseded: {})",
            mask.structure_id(),
            mask.bounds(),
            superseded.is_some()
        );
        self.slots.push(Some(mask));
        superseded
    }

    /// Remove a structure's mask. The index never drops masks on its own.
    pub fn remove(&mut self, structure_id: StructureId) -> Option<Arc<VolumeMask>> {
        let slot = self.by_structure.remove(&structure_id)?;
        let mask = self.slots[slot].take()?;
        for chunk in chunks_of(mask.bounds(), self.chunk_size) {
            if let Some(bucket) = self.buckets.get_mut(&chunk) {
                bucket.retain(|s| *s != slot);
                if bucket.is_empty() {
                    self.buckets.remove(&chunk);
                }
            }
        }
        log::debug!("mask removed: {structure_id}");
        let dead = self.slots.len() - self.by_structure.len();
        if dead > COMPACT_MIN_DEAD && dead > self.by_structure.len() {
            self.compact();
        }
        Some(mask)
    }

    /// Drop cleared slots and renumber the survivors in order.
    fn compact(&mut self) {
        let mut remap = vec![usize::MAX; self.slots.len()];
        let mut live = Vec::with_capacity(self.by_structure.len());
        for (old, slot) in self.slots.drain(..).enumerate() {
            if let Some(mask) = slot {
                remap[old] = live.len();
                live.push(Some(mask));
            }
        }
        self.slots = live;
        for slot in self.by_structure.values_mut() {
            *slot = remap[*slot];
        }
        for bucket in self.buckets.values_mut() {
            for slot in bucket.iter_mut() {
                *slot = remap[*slot];
            }
        }
    }

    pub fn get(&self, structure_id: StructureId) -> Option<&Arc<VolumeMask>> {
        let slot = *self.by_structure.get(&structure_id)?;
        self.slots[slot].as_ref()
    }

    /// All masks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<VolumeMask>> {
        self.slots.iter().flatten()
    }

    /// Masks whose bounds touch `chunk`. Empty for an untouched chunk.
    pub fn masks_in_chunk(&self, chunk: ChunkCoord) -> impl Iterator<Item = &Arc<VolumeMask>> {
        self.buckets
            .get(&chunk)
            .into_iter()
            .flatten()
            .filter_map(|&slot| self.slots[slot].as_ref())
    }

    /// Masks that could matter for column (x, z) between `y_min` and
    /// `y_max`, by the coarse `contains_2d` test.
    pub fn column_candidates(
        &self,
        x: i32,
        z: i32,
        y_min: i32,
        y_max: i32,
    ) -> SmallVec<[&Arc<VolumeMask>; 4]> {
        self.masks_in_chunk(ChunkCoord::containing(x, z, self.chunk_size))
            .filter(|m| m.contains_2d(x, z, y_min, y_max))
            .collect()
    }

    /// The first registered mask containing `pos`, per-cell.
    pub fn mask_at(&self, pos: VoxelCoord) -> Option<&Arc<VolumeMask>> {
        self.masks_in_chunk(ChunkCoord::containing(pos.x, pos.z, self.chunk_size))
            .find(|m| m.contains(pos))
    }

    pub fn contains_point(&self, pos: VoxelCoord) -> bool {
        self.mask_at(pos).is_some()
    }

    /// Masks whose bounds intersect `bounds`, in registration order.
    pub fn overlapping(&self, bounds: &Bounds) -> Vec<&Arc<VolumeMask>> {
        let mut slots = BTreeSet::new();
        for chunk in chunks_of(bounds, self.chunk_size) {
            if let Some(bucket) = self.buckets.get(&chunk) {
                slots.extend(bucket.iter().copied());
            }
        }
        slots
            .into_iter()
            .filter_map(|slot| self.slots[slot].as_ref())
            .filter(|m| m.bounds().intersects(bounds))
            .collect()
    }

    /// A new index holding every mask grown by `buffer`.
    pub fn expanded(&self, buffer: i32) -> Result<MaskIndex> {
        let mut out = MaskIndex::new(self.chunk_size)?;
        for mask in self.iter() {
            out.insert(mask.expand(buffer)?);
        }
        Ok(out)
    }

    /// Receipts for every mask, in registration order.
    pub fn receipts(&self) -> Vec<MaskReceipt> {
        self.iter().map(|m| m.to_receipt()).collect()
    }
}

/// Shared, atomically published mask index.
#[derive(Debug)]
pub struct MaskRegistry {
    current: RwLock<Arc<MaskIndex>>,
}

impl MaskRegistry {
    pub fn new(index: MaskIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// The latest published index. Stays valid and unchanged after later
    /// writes.
    pub fn snapshot(&self) -> Arc<MaskIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Publish a fully built mask. Returns the superseded mask, if any.
    pub fn register(&self, mask: VolumeMask) -> Option<Arc<VolumeMask>> {
        let mask = Arc::new(mask);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut *guard).insert(mask)
    }

    pub fn remove(&self, structure_id: StructureId) -> Option<Arc<VolumeMask>> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if guard.get(structure_id).is_none() {
            return None;
        }
        Arc::make_mut(&mut *guard).remove(structure_id)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
