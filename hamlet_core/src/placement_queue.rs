// Placement queues: ordered, resumable block-write jobs.
//
// A queue holds every block write for one structure (or one road) in the
// order they will be committed, a cursor of how many are already written,
// and a status:
//
//   Preparing -> Ready -> InProgress -> Complete
//        \          \          \
//         +----------+----------+--> Cancelled
//
// Complete and Cancelled are terminal. Transitions never go backwards, and
// every transition method returns a new queue value instead of mutating
// in place (`with_advanced_index`, `in_progress`, `cancelled`). Entries sit
// behind an `Arc<[BlockEntry]>`, so advancing a queue copies a handful of
// scalars, never the entry list.
//
// ## Commit order
//
// `prepare` sorts entries by:
// 1. ascending Y, so each layer rests on the one below,
// 2. self-supporting blocks before blocks that hang on a neighbor (torches,
//    ladders, doors), so an attachment never lands before its support,
// 3. a sweep across the layer from one of four corners, chosen by the
//    seed: X first, then Z, each ascending or descending.
// The sort is stable, so duplicate positions keep their input order and
// the last write to a position wins. The same entries and seed always
// produce the same order.
//
// Queues are only built through `PlacementPipeline`, which issues their
// ids. See also: `pipeline.rs`, which owns active queues and drives commits.
//
// **Critical constraint: determinism.** Ordering depends only on entry
// contents and the seed.

use crate::block::BlockEntry;
use crate::error::{HamletError, Result};
use crate::prng::SiteRng;
use crate::types::{QueueId, StructureId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueStatus {
    Preparing,
    Ready,
    InProgress,
    Complete,
    Cancelled,
}

impl QueueStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Complete | QueueStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacementQueue {
    id: QueueId,
    structure_id: StructureId,
    entries: Arc<[BlockEntry]>,
    cursor: usize,
    batch_size: usize,
    status: QueueStatus,
    seed: u64,
    updated_tick: u64,
    cancel_reason: Option<String>,
}

/// Sort `entries` into commit order for `seed`.
pub fn order_entries(entries: &mut [BlockEntry], seed: u64) {
    let corner = SiteRng::new(seed).range_usize(0, 4);
    let (flip_x, flip_z) = (corner & 1 == 1, corner & 2 == 2);
    let sweep = |v: i32, flip: bool| if flip { -i64::from(v) } else { i64::from(v) };
    entries.sort_by_key(|e| {
        (
            e.pos.y,
            e.material.needs_support(),
            sweep(e.pos.x, flip_x),
            sweep(e.pos.z, flip_z),
        )
    });
}

impl PlacementQueue {
    /// An empty queue whose entries are still being ordered. It cannot be
    /// submitted.
    pub(crate) fn preparing(id: QueueId, structure_id: StructureId, seed: u64, batch_size: usize) -> Result<Self> {
        check_batch_size(batch_size)?;
        Ok(Self {
            id,
            structure_id,
            entries: Arc::from(Vec::new()),
            cursor: 0,
            batch_size,
            status: QueueStatus::Preparing,
            seed,
            updated_tick: 0,
            cancel_reason: None,
        })
    }

    /// Order `entries` for `seed` and return a READY queue. Never touches
    /// the world.
    pub(crate) fn prepare(
        id: QueueId,
        structure_id: StructureId,
        mut entries: Vec<BlockEntry>,
        seed: u64,
        batch_size: usize,
    ) -> Result<Self> {
        check_batch_size(batch_size)?;
        order_entries(&mut entries, seed);
        Ok(Self::ready(id, structure_id, entries, seed, batch_size))
    }

    /// A READY queue that commits `entries` exactly in the given order.
    pub(crate) fn prepare_simple_queue(
        id: QueueId,
        structure_id: StructureId,
        entries: Vec<BlockEntry>,
        batch_size: usize,
    ) -> Result<Self> {
        check_batch_size(batch_size)?;
        Ok(Self::ready(id, structure_id, entries, 0, batch_size))
    }

    fn ready(id: QueueId, structure_id: StructureId, entries: Vec<BlockEntry>, seed: u64, batch_size: usize) -> Self {
        Self {
            id,
            structure_id,
            entries: Arc::from(entries),
            cursor: 0,
            batch_size,
            status: QueueStatus::Ready,
            seed,
            updated_tick: 0,
            cancel_reason: None,
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn structure_id(&self) -> StructureId {
        self.structure_id
    }

    pub fn status(&self) -> QueueStatus {
        self.status
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn updated_tick(&self) -> u64 {
        self.updated_tick
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    pub fn total_blocks(&self) -> usize {
        self.entries.len()
    }

    pub fn blocks_placed(&self) -> usize {
        self.cursor
    }

    /// Fraction committed, in [0, 1]. An empty queue counts as done.
    pub fn percent_complete(&self) -> f32 {
        if self.entries.is_empty() {
            1.0
        } else {
            self.cursor as f32 / self.entries.len() as f32
        }
    }

    /// The next unwritten entries, at most `batch_size`. Empty once the
    /// queue is terminal or fully written.
    pub fn next_batch(&self) -> &[BlockEntry] {
        if self.status.is_terminal() {
            return &[];
        }
        let end = (self.cursor + self.batch_size).min(self.entries.len());
        &self.entries[self.cursor..end]
    }

    /// Copy of this queue with the cursor moved to `index` (absolute, not a
    /// delta). Reaching the last entry makes it COMPLETE.
    pub fn with_advanced_index(&self, index: usize, tick: u64) -> Result<Self> {
        if !matches!(self.status, QueueStatus::Ready | QueueStatus::InProgress) {
            return Err(HamletError::InvalidState(format!(
                "{} cannot advance while {:?}",
                self.id, self.status
            )));
        }
        if index < self.cursor || index > self.entries.len() {
            return Err(HamletError::InvalidArgument(format!(
                "{} cursor {} cannot move to {} of {}",
                self.id,
                self.cursor,
                index,
                self.entries.len()
            )));
        }
        let mut next = self.clone();
        next.cursor = index;
        next.updated_tick = tick;
        if index == self.entries.len() {
            next.status = QueueStatus::Complete;
        }
        Ok(next)
    }

    /// Copy of a READY queue flipped to IN_PROGRESS.
    pub fn in_progress(&self, tick: u64) -> Result<Self> {
        if self.status != QueueStatus::Ready {
            return Err(HamletError::InvalidState(format!(
                "{} must be Ready to submit, is {:?}",
                self.id, self.status
            )));
        }
        let mut next = self.clone();
        next.status = QueueStatus::InProgress;
        next.updated_tick = tick;
        Ok(next)
    }

    /// Copy of a non-terminal queue marked CANCELLED. Written blocks stay.
    pub fn cancelled(&self, reason: &str, tick: u64) -> Result<Self> {
        if self.status.is_terminal() {
            return Err(HamletError::InvalidState(format!(
                "{} is already {:?}",
                self.id, self.status
            )));
        }
        let mut next = self.clone();
        next.status = QueueStatus::Cancelled;
        next.updated_tick = tick;
        next.cancel_reason = Some(reason.to_owned());
        Ok(next)
    }
}

fn check_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(HamletError::InvalidArgument("batch_size must be positive".into()));
    }
    Ok(())
}
