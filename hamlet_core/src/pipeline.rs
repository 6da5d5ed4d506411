// Placement pipeline: async prepare, bounded synchronous commit.
//
// Architecture: prepare on the rayon pool, commit on the world thread.
//
// - **Prepare** (`prepare_queue`, `prepare_simple_queue`, `prepare_async`):
//   orders block entries into a READY `PlacementQueue`. `prepare_async`
//   runs the ordering on a rayon worker and sends the result back over an
//   `mpsc` channel; the queue reports `Preparing` until `collect_prepared`
//   (or `wait_prepared`) drains it. Prepare never touches the world.
// - **Submit** (`submit`, `submit_with_mask`): a READY queue becomes
//   IN_PROGRESS and joins the active set. Anything else is `InvalidState`.
// - **Commit** (`commit_step`): once per tick, every active queue writes at
//   most `batch_size` entries, in queue-id order. The world is borrowed
//   `&mut`, so only the holder of the world can commit. A failed write
//   logs a warning and cancels that queue; the other queues keep going.
//
// The pipeline is the only issuer of queue ids, and it tracks every queue
// it issued in exactly one of four maps: `preparing`, `ready`, `active`,
// `finished`. A queue only moves forward through them, so `queue_status`
// for one id never goes backwards. `submit` accepts an id only while it
// sits in `ready` and commits the pipeline's own copy of that queue.
// `finished` keeps the last `finished_history` terminal queues, with their
// cancel reasons; older ones are forgotten by lowest id.
//
// Each tick replaces an active queue with the value `with_advanced_index`
// returns, never mutating one in place. Status queries between ticks
// always see a whole queue.
//
// A queue submitted with a mask publishes that mask to the `MaskRegistry`
// when it completes. A cancelled queue's mask is dropped. Published bounds
// are reported in `CommitReport::published` so the host can refresh its
// surface solvers over the changed footprint.
//
// See also: `placement_queue.rs` for queue ordering and transitions,
// `mask_index.rs` for `MaskRegistry`, `world.rs` for `WorldMutate`.

use crate::block::BlockEntry;
use crate::config::PlacementConfig;
use crate::error::{HamletError, Result};
use crate::mask::VolumeMask;
use crate::mask_index::MaskRegistry;
use crate::placement_queue::{PlacementQueue, QueueStatus};
use crate::types::{Bounds, QueueId, StructureId};
use crate::world::WorldMutate;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

/// Result of one prepare job, sent from a rayon worker.
type Prepared = (QueueId, Result<PlacementQueue>);

struct ActiveQueue {
    queue: PlacementQueue,
    mask: Option<VolumeMask>,
}

/// What one `commit_step` did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub tick: u64,
    pub blocks_written: usize,
    pub completed: Vec<QueueId>,
    pub cancelled: Vec<QueueId>,
    /// Masks published this tick.
    pub published: Vec<(StructureId, Bounds)>,
}

pub struct PlacementPipeline {
    config: PlacementConfig,
    registry: Arc<MaskRegistry>,
    /// Placeholders for jobs still on the rayon pool.
    preparing: BTreeMap<QueueId, PlacementQueue>,
    ready: BTreeMap<QueueId, PlacementQueue>,
    active: BTreeMap<QueueId, ActiveQueue>,
    finished: BTreeMap<QueueId, PlacementQueue>,
    next_queue_id: u64,
    tick: u64,
    prepared_tx: Sender<Prepared>,
    prepared_rx: Receiver<Prepared>,
}

impl PlacementPipeline {
    pub fn new(config: &PlacementConfig, registry: Arc<MaskRegistry>) -> Result<Self> {
        config.validate()?;
        let (prepared_tx, prepared_rx) = mpsc::channel();
        Ok(Self {
            config: config.clone(),
            registry,
            preparing: BTreeMap::new(),
            ready: BTreeMap::new(),
            active: BTreeMap::new(),
            finished: BTreeMap::new(),
            next_queue_id: 1,
            tick: 0,
            prepared_tx,
            prepared_rx,
        })
    }

    pub fn registry(&self) -> &Arc<MaskRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Ticks committed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn allocate_id(&mut self) -> QueueId {
        let id = QueueId(self.next_queue_id);
        self.next_queue_id += 1;
        id
    }

    fn issued(&self, id: QueueId) -> bool {
        id.0 >= 1 && id.0 < self.next_queue_id
    }

    /// Order `entries` on the calling thread and return a READY queue.
    pub fn prepare_queue(
        &mut self,
        structure_id: StructureId,
        entries: Vec<BlockEntry>,
        seed: u64,
    ) -> Result<PlacementQueue> {
        let id = self.allocate_id();
        let queue = PlacementQueue::prepare(id, structure_id, entries, seed, self.config.batch_size)?;
        self.ready.insert(id, queue.clone());
        Ok(queue)
    }

    /// A READY queue that commits `entries` exactly in the given order.
    pub fn prepare_simple_queue(
        &mut self,
        structure_id: StructureId,
        entries: Vec<BlockEntry>,
    ) -> Result<PlacementQueue> {
        let id = self.allocate_id();
        let queue = PlacementQueue::prepare_simple_queue(id, structure_id, entries, self.config.batch_size)?;
        self.ready.insert(id, queue.clone());
        Ok(queue)
    }

    /// Order `entries` on the rayon pool. The queue is `Preparing` until
    /// collected.
    pub fn prepare_async(
        &mut self,
        structure_id: StructureId,
        entries: Vec<BlockEntry>,
        seed: u64,
    ) -> Result<QueueId> {
        let batch_size = self.config.batch_size;
        let id = self.allocate_id();
        let placeholder = PlacementQueue::preparing(id, structure_id, seed, batch_size)?;
        self.preparing.insert(id, placeholder);
        let tx = self.prepared_tx.clone();
        rayon::spawn(move || {
            let result = PlacementQueue::prepare(id, structure_id, entries, seed, batch_size);
            // The pipeline owns the receiver; a send error means it is gone.
            let _ = tx.send((id, result));
        });
        Ok(id)
    }

    /// READY queues whose preparation finished, in queue-id order. Does
    /// not block.
    pub fn collect_prepared(&mut self) -> Vec<PlacementQueue> {
        let mut received = Vec::new();
        while let Ok(prepared) = self.prepared_rx.try_recv() {
            received.push(prepared);
        }
        self.accept_prepared(received)
    }

    /// Block until every outstanding prepare job has reported back.
    pub fn wait_prepared(&mut self) -> Vec<PlacementQueue> {
        let mut received = Vec::new();
        let mut outstanding = self.preparing.len();
        while outstanding > 0 {
            match self.prepared_rx.recv() {
                Ok(prepared) => {
                    if self.preparing.contains_key(&prepared.0) {
                        outstanding -= 1;
                    }
                    received.push(prepared);
                }
                Err(_) => break,
            }
        }
        self.accept_prepared(received)
    }

    fn accept_prepared(&mut self, mut received: Vec<Prepared>) -> Vec<PlacementQueue> {
        // Arrival order depends on worker scheduling.
        received.sort_by_key(|(id, _)| *id);
        let mut ready = Vec::with_capacity(received.len());
        for (id, result) in received {
            let Some(placeholder) = self.preparing.remove(&id) else {
                log::debug!("{id} was cancelled while preparing, dropping it");
                continue;
            };
            match result {
                Ok(queue) => {
                    self.ready.insert(id, queue.clone());
                    ready.push(queue);
                }
                Err(err) => {
                    log::warn!("{id} failed to prepare: {err}");
                    self.finish_cancelled(placeholder, &format!("prepare failed: {err}"));
                }
            }
        }
        ready
    }

    /// Start committing a READY queue.
    pub fn submit(&mut self, queue: PlacementQueue) -> Result<QueueId> {
        self.activate(queue, None)
    }

    /// Start committing a READY queue and publish `mask` once it completes.
    pub fn submit_with_mask(&mut self, queue: PlacementQueue, mask: VolumeMask) -> Result<QueueId> {
        if mask.structure_id() != queue.structure_id() {
            return Err(HamletError::InvalidArgument(format!(
                "mask for {} attached to {} of {}",
                mask.structure_id(),
                queue.id(),
                queue.structure_id()
            )));
        }
        self.activate(queue, Some(mask))
    }

    fn activate(&mut self, queue: PlacementQueue, mask: Option<VolumeMask>) -> Result<QueueId> {
        let id = queue.id();
        let Some(issued) = self.ready.get(&id) else {
            return Err(self.not_ready(id));
        };
        if issued.structure_id() != queue.structure_id() {
            return Err(HamletError::InvalidArgument(format!(
                "{id} belongs to {}, not {}",
                issued.structure_id(),
                queue.structure_id()
            )));
        }
        let queue = issued.in_progress(self.tick)?;
        self.ready.remove(&id);
        log::debug!(
            "{id} submitted: {} blocks for {}, batch {}",
            queue.total_blocks(),
            queue.structure_id(),
            queue.batch_size()
        );
        self.active.insert(id, ActiveQueue { queue, mask });
        Ok(id)
    }

    fn not_ready(&self, id: QueueId) -> HamletError {
        match self.queue_status(id) {
            Some(status) => HamletError::InvalidState(format!("{id} is {status:?}, not Ready")),
            None if self.issued(id) => HamletError::InvalidState(format!("{id} already finished")),
            None => HamletError::InvalidArgument(format!("{id} was not issued by this pipeline")),
        }
    }

    /// Advance every active queue by one batch. Call once per tick from
    /// the thread that owns the world.
    pub fn commit_step<W: WorldMutate + ?Sized>(&mut self, world: &mut W) -> CommitReport {
        self.tick += 1;
        let mut report = CommitReport {
            tick: self.tick,
            ..CommitReport::default()
        };
        let ids: Vec<QueueId> = self.active.keys().copied().collect();
        for id in ids {
            let Some(entry) = self.active.get(&id) else {
                continue;
            };
            let queue = &entry.queue;
            let start = queue.blocks_placed();
            let mut written = 0;
            let mut failure = None;
            for block in queue.next_batch() {
                if let Err(err) = world.set_block(block.pos, block.material, block.extra.as_ref()) {
                    failure = Some(format!("write at {} failed: {err}", block.pos));
                    break;
                }
                written += 1;
            }
            report.blocks_written += written;

            // Record what was written even when the batch stopped early.
            let advanced = queue.with_advanced_index(start + written, self.tick);
            let Some(ActiveQueue { queue, mask }) = self.active.remove(&id) else {
                continue;
            };
            let (next, failure) = match (advanced, failure) {
                (Ok(next), failure) => (next, failure),
                (Err(err), failure) => (queue, failure.or_else(|| Some(err.to_string()))),
            };

            if let Some(reason) = failure {
                log::warn!("{id} cancelled after {} blocks: {reason}", next.blocks_placed());
                self.finish_cancelled(next, &reason);
                report.cancelled.push(id);
            } else if next.status() == QueueStatus::Complete {
                if let Some(mask) = mask {
                    let published = (mask.structure_id(), *mask.bounds());
                    if self.registry.register(mask).is_some() {
                        log::debug!("mask for {} superseded", published.0);
                    }
                    report.published.push(published);
                }
                log::info!(
                    "{id} complete: {} blocks for {} at tick {}",
                    next.total_blocks(),
                    next.structure_id(),
                    self.tick
                );
                self.record_finished(next);
                report.completed.push(id);
            } else {
                self.active.insert(id, ActiveQueue { queue: next, mask });
            }
        }
        report
    }

    fn finish_cancelled(&mut self, queue: PlacementQueue, reason: &str) {
        match queue.cancelled(reason, self.tick) {
            Ok(cancelled) => self.record_finished(cancelled),
            Err(err) => {
                log::debug!("{}: {err}", queue.id());
                self.record_finished(queue);
            }
        }
    }

    fn record_finished(&mut self, queue: PlacementQueue) {
        self.finished.insert(queue.id(), queue);
        while self.finished.len() > self.config.finished_history {
            self.finished.pop_first();
        }
    }

    /// Stop a queue now, recording `reason`. Blocks already written stay
    /// written; an attached mask is never published.
    pub fn cancel(&mut self, id: QueueId, reason: &str) -> Result<()> {
        let queue = if let Some(active) = self.active.remove(&id) {
            active.queue
        } else if let Some(queue) = self.ready.remove(&id) {
            queue
        } else if let Some(placeholder) = self.preparing.remove(&id) {
            placeholder
        } else {
            return Err(match self.finished.get(&id) {
                Some(done) => HamletError::InvalidState(format!("{id} is already {:?}", done.status())),
                None if self.issued(id) => HamletError::InvalidState(format!("{id} already finished")),
                None => HamletError::InvalidArgument(format!("{id} is not known to this pipeline")),
            });
        };
        log::info!("{id} cancelled while {:?}: {reason}", queue.status());
        self.finish_cancelled(queue, reason);
        Ok(())
    }

    pub fn active_queue_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_queue_ids(&self) -> Vec<QueueId> {
        self.active.keys().copied().collect()
    }

    /// Current state of any queue this pipeline still tracks: preparing
    /// placeholders, READY and active queues, and recent finished ones
    /// (with their cancel reason, if any).
    pub fn queue(&self, id: QueueId) -> Option<&PlacementQueue> {
        self.active
            .get(&id)
            .map(|a| &a.queue)
            .or_else(|| self.ready.get(&id))
            .or_else(|| self.preparing.get(&id))
            .or_else(|| self.finished.get(&id))
    }

    pub fn queue_status(&self, id: QueueId) -> Option<QueueStatus> {
        self.queue(id).map(PlacementQueue::status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Material;
    use crate::mask_index::MaskIndex;
    use crate::prng::SiteRng;
    use crate::types::{VillageId, VoxelCoord};
    use crate::world::{VoxelWorld, WorldQuery};

    fn pipeline(batch_size: usize) -> PlacementPipeline {
        let config = PlacementConfig {
            batch_size,
            ..PlacementConfig::default()
        };
        PlacementPipeline::new(&config, Arc::new(MaskRegistry::new(MaskIndex::new(16).unwrap()))).unwrap()
    }

    fn slab(y: i32, n: i32, material: Material) -> Vec<BlockEntry> {
        (0..n)
            .map(|i| BlockEntry::new(VoxelCoord::new(i % 8, y, i / 8), material))
            .collect()
    }

    fn ids(seed: u64) -> (StructureId, VillageId) {
        let mut rng = SiteRng::new(seed);
        (StructureId::new(&mut rng), VillageId::new(&mut rng))
    }

    #[test]
    fn preparing_queue_cannot_be_submitted() {
        let mut p = pipeline(10);
        let (structure, _) = ids(1);
        let id = p.prepare_async(structure, slab(1, 4, Material::Planks), 0).unwrap();
        let placeholder = p.queue(id).unwrap().clone();
        assert_eq!(placeholder.status(), QueueStatus::Preparing);
        assert!(matches!(p.submit(placeholder), Err(HamletError::InvalidState(_))));
        assert_eq!(p.active_queue_count(), 0);
        p.wait_prepared();
    }

    #[test]
    fn commit_writes_one_batch_per_queue_per_tick() {
        let mut world = VoxelWorld::new(16, 16, 16, 0);
        let mut p = pipeline(10);
        let (a, _) = ids(1);
        let (b, _) = ids(2);
        let qa = p.prepare_queue(a, slab(1, 25, Material::Planks), 3).unwrap();
        let qb = p.prepare_queue(b, slab(5, 12, Material::Stone), 3).unwrap();
        let ida = p.submit(qa).unwrap();
        let idb = p.submit(qb).unwrap();
        assert_eq!(p.active_queue_ids(), vec![ida, idb]);
        assert_eq!(p.queue_status(ida), Some(QueueStatus::InProgress));

        let r1 = p.commit_step(&mut world);
        assert_eq!(r1.tick, 1);
        assert_eq!(r1.blocks_written, 20);
        assert_eq!(p.queue(ida).unwrap().blocks_placed(), 10);

        let r2 = p.commit_step(&mut world);
        assert_eq!(r2.blocks_written, 12);
        assert_eq!(r2.completed, vec![idb]);
        assert_eq!(p.queue_status(idb), Some(QueueStatus::Complete));
        assert_eq!(p.active_queue_count(), 1);

        let r3 = p.commit_step(&mut world);
        assert_eq!(r3.blocks_written, 5);
        assert_eq!(r3.completed, vec![ida]);
        assert_eq!(p.active_queue_count(), 0);
        assert_eq!(world.material_at(VoxelCoord::new(0, 1, 0)), Material::Planks);
        assert_eq!(world.material_at(VoxelCoord::new(3, 5, 1)), Material::Stone);

        let idle = p.commit_step(&mut world);
        assert_eq!(idle.blocks_written, 0);
    }

    #[test]
    fn cancel_stops_progress_without_rollback() {
        let mut world = VoxelWorld::new(16, 16, 16, 0);
        let mut p = pipeline(4);
        let (s, _) = ids(3);
        let q = p.prepare_queue(s, slab(2, 12, Material::Cobblestone), 1).unwrap();
        let id = p.submit(q).unwrap();
        p.commit_step(&mut world);
        p.cancel(id, "village abandoned").unwrap();
        assert_eq!(p.queue_status(id), Some(QueueStatus::Cancelled));
        assert_eq!(p.active_queue_count(), 0);
        let cancelled = p.queue(id).unwrap();
        assert_eq!(cancelled.cancel_reason(), Some("village abandoned"));
        assert_eq!(cancelled.blocks_placed(), 4);
        let placed = (0..8)
            .flat_map(|x| (0..2).map(move |z| VoxelCoord::new(x, 2, z)))
            .filter(|&pos| world.material_at(pos) == Material::Cobblestone)
            .count();
        assert_eq!(placed, 4);
        assert_eq!(p.commit_step(&mut world).blocks_written, 0);
        assert!(matches!(p.cancel(id, "again"), Err(HamletError::InvalidState(_))));
        assert!(matches!(p.cancel(QueueId(999), "?"), Err(HamletError::InvalidArgument(_))));
    }

    #[test]
    fn mask_is_published_only_on_completion() {
        let mut world = VoxelWorld::new(16, 16, 16, 0);
        let mut p = pipeline(8);
        let (s, v) = ids(4);
        let bounds = Bounds::from_extents(0, 7, 1, 1, 0, 1).unwrap();
        let q = p.prepare_queue(s, slab(1, 16, Material::Planks), 2).unwrap();
        p.submit_with_mask(q, VolumeMask::new(s, v, bounds, 0)).unwrap();

        let first = p.commit_step(&mut world);
        assert!(first.published.is_empty());
        assert!(p.registry().is_empty());

        let second = p.commit_step(&mut world);
        assert_eq!(second.published, vec![(s, bounds)]);
        assert!(p.registry().snapshot().get(s).is_some());
    }

    #[test]
    fn cancelled_queue_drops_its_mask() {
        let mut world = VoxelWorld::new(16, 16, 16, 0);
        let mut p = pipeline(8);
        let (s, v) = ids(5);
        let bounds = Bounds::from_extents(0, 7, 1, 1, 0, 1).unwrap();
        let q = p.prepare_queue(s, slab(1, 16, Material::Planks), 2).unwrap();
        let id = p.submit_with_mask(q, VolumeMask::new(s, v, bounds, 0)).unwrap();
        p.commit_step(&mut world);
        p.cancel(id, "replaced").unwrap();
        p.commit_step(&mut world);
        assert!(p.registry().is_empty());
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let mut p = pipeline(8);
        let (s, v) = ids(6);
        let (other, _) = ids(7);
        let q = p.prepare_queue(s, slab(1, 4, Material::Planks), 2).unwrap();
        let mask = VolumeMask::new(other, v, Bounds::from_extents(0, 3, 1, 1, 0, 0).unwrap(), 0);
        assert!(matches!(p.submit_with_mask(q, mask), Err(HamletError::InvalidArgument(_))));
    }

    #[test]
    fn failed_write_cancels_only_that_queue() {
        let mut world = VoxelWorld::new(8, 8, 8, 0);
        let mut p = pipeline(10);
        let (bad, _) = ids(8);
        let (good, _) = ids(9);
        let mut entries = slab(1, 3, Material::Stone);
        entries.push(BlockEntry::new(VoxelCoord::new(0, 40, 0), Material::Stone));
        let bad_queue = p.prepare_simple_queue(bad, entries).unwrap();
        let bad_id = p.submit(bad_queue).unwrap();
        let good_queue = p.prepare_queue(good, slab(3, 5, Material::Dirt), 0).unwrap();
        let good_id = p.submit(good_queue).unwrap();

        let report = p.commit_step(&mut world);
        assert_eq!(report.cancelled, vec![bad_id]);
        assert_eq!(report.completed, vec![good_id]);
        assert_eq!(report.blocks_written, 8);
        assert_eq!(p.queue_status(bad_id), Some(QueueStatus::Cancelled));
        assert_eq!(world.material_at(VoxelCoord::new(2, 1, 0)), Material::Stone);
        let failed = p.queue(bad_id).unwrap();
        assert_eq!(failed.blocks_placed(), 3);
        assert!(failed.cancel_reason().is_some_and(|r| r.contains("write at (0, 40, 0) failed")));
    }

    #[test]
    fn resubmitting_a_finished_queue_fails() {
        let mut world = VoxelWorld::new(8, 8, 8, 0);
        let mut p = pipeline(10);
        let (s, _) = ids(10);
        let q = p.prepare_queue(s, slab(1, 2, Material::Stone), 0).unwrap();
        p.submit(q.clone()).unwrap();
        assert!(matches!(p.submit(q.clone()), Err(HamletError::InvalidState(_))));
        p.commit_step(&mut world);
        assert!(matches!(p.submit(q), Err(HamletError::InvalidState(_))));
    }

    #[test]
    fn empty_queue_completes_on_first_tick() {
        let mut world = VoxelWorld::new(4, 4, 4, 0);
        let mut p = pipeline(10);
        let (s, _) = ids(11);
        let q = p.prepare_queue(s, Vec::new(), 0).unwrap();
        let id = p.submit(q).unwrap();
        assert_eq!(p.commit_step(&mut world).completed, vec![id]);
    }

    #[test]
    fn async_prepare_reports_preparing_until_collected() {
        let mut p = pipeline(10);
        let (a, _) = ids(12);
        let (b, _) = ids(13);
        let ida = p.prepare_async(a, slab(1, 30, Material::Planks), 5).unwrap();
        let idb = p.prepare_async(b, slab(2, 30, Material::Planks), 5).unwrap();
        assert_eq!(p.queue_status(ida), Some(QueueStatus::Preparing));
        assert_eq!(p.queue_status(idb), Some(QueueStatus::Preparing));

        let ready = p.wait_prepared();
        assert_eq!(ready.iter().map(|q| q.id()).collect::<Vec<_>>(), vec![ida, idb]);
        assert!(ready.iter().all(|q| q.status() == QueueStatus::Ready));
        assert_eq!(p.queue_status(ida), Some(QueueStatus::Ready));
        assert_eq!(p.queue_status(idb), Some(QueueStatus::Ready));

        // Same input and seed as a synchronous prepare.
        let sync = p.prepare_queue(a, slab(1, 30, Material::Planks), 5).unwrap();
        assert_eq!(ready[0].entries(), sync.entries());
    }

    #[test]
    fn cancelled_while_preparing_is_dropped_on_collect() {
        let mut p = pipeline(10);
        let (a, _) = ids(14);
        let id = p.prepare_async(a, slab(1, 10, Material::Planks), 0).unwrap();
        p.cancel(id, "never mind").unwrap();
        assert_eq!(p.queue_status(id), Some(QueueStatus::Cancelled));
        assert_eq!(p.queue(id).unwrap().cancel_reason(), Some("never mind"));
        // Wait for the worker so the result is in the channel.
        let drained: Vec<Prepared> = p.prepared_rx.recv().into_iter().collect();
        assert_eq!(drained.len(), 1);
        assert!(p.accept_prepared(drained).is_empty());
        assert_eq!(p.queue_status(id), Some(QueueStatus::Cancelled));
    }

    #[test]
    fn status_only_moves_forward() {
        let mut world = VoxelWorld::new(16, 16, 16, 0);
        let mut p = pipeline(4);
        let (s, _) = ids(15);
        let id = p.prepare_async(s, slab(1, 6, Material::Planks), 2).unwrap();
        let mut seen = vec![p.queue_status(id)];
        let queue = p.wait_prepared().remove(0);
        seen.push(p.queue_status(id));
        p.submit(queue).unwrap();
        seen.push(p.queue_status(id));
        while p.active_queue_count() > 0 {
            p.commit_step(&mut world);
            seen.push(p.queue_status(id));
        }
        seen.dedup();
        assert_eq!(
            seen,
            vec![
                Some(QueueStatus::Preparing),
                Some(QueueStatus::Ready),
                Some(QueueStatus::InProgress),
                Some(QueueStatus::Complete),
            ]
        );
    }

    #[test]
    fn ready_queue_can_be_cancelled_before_submit() {
        let mut p = pipeline(10);
        let (s, _) = ids(16);
        let q = p.prepare_queue(s, slab(1, 3, Material::Planks), 0).unwrap();
        assert_eq!(p.queue_status(q.id()), Some(QueueStatus::Ready));
        p.cancel(q.id(), "plans changed").unwrap();
        assert_eq!(p.queue(q.id()).unwrap().cancel_reason(), Some("plans changed"));
        assert!(matches!(p.submit(q), Err(HamletError::InvalidState(_))));
    }

    #[test]
    fn only_issued_queue_ids_are_accepted() {
        let mut world = VoxelWorld::new(16, 16, 16, 0);
        let mut p = pipeline(10);
        let (s, _) = ids(17);
        // Built outside the pipeline with the id it would hand out next.
        let forged = PlacementQueue::prepare_simple_queue(QueueId(1), s, slab(1, 2, Material::Glass), 10).unwrap();
        assert!(matches!(p.submit(forged.clone()), Err(HamletError::InvalidArgument(_))));

        let issued = p.prepare_queue(s, slab(2, 2, Material::Stone), 0).unwrap();
        assert_eq!(issued.id(), QueueId(1));
        // A look-alike of an issued id commits the pipeline's own entries.
        let id = p.submit(forged).unwrap();
        p.commit_step(&mut world);
        assert_eq!(p.queue_status(id), Some(QueueStatus::Complete));
        assert_eq!(world.material_at(VoxelCoord::new(0, 2, 0)), Material::Stone);
        assert_eq!(world.material_at(VoxelCoord::new(0, 1, 0)), Material::Air);
        assert!(matches!(p.submit(issued), Err(HamletError::InvalidState(_))));
    }

    #[test]
    fn finished_history_is_bounded() {
        let config = PlacementConfig {
            batch_size: 10,
            finished_history: 2,
            ..PlacementConfig::default()
        };
        let registry = Arc::new(MaskRegistry::new(MaskIndex::new(16).unwrap()));
        let mut p = PlacementPipeline::new(&config, registry).unwrap();
        let mut world = VoxelWorld::new(8, 8, 8, 0);
        let mut done = Vec::new();
        for seed in 20..24 {
            let (s, _) = ids(seed);
            let q = p.prepare_queue(s, slab(1, 2, Material::Stone), 0).unwrap();
            done.push(p.submit(q).unwrap());
            p.commit_step(&mut world);
        }
        assert_eq!(p.queue_status(done[0]), None);
        assert_eq!(p.queue_status(done[1]), None);
        assert_eq!(p.queue_status(done[2]), Some(QueueStatus::Complete));
        assert_eq!(p.queue_status(done[3]), Some(QueueStatus::Complete));
        // Forgotten ids are still known to have been issued.
        assert!(matches!(p.cancel(done[0], "late"), Err(HamletError::InvalidState(_))));
    }
}
