//! Slot heap with per-thread allocation storages.
//!
//! Objects live in a slot table addressed by [`GcRef`]. Every allocation is
//! recorded in the [`ThreadStorage`] of the allocating OS thread; a storage
//! also carries the thread's pinned roots and its allocation threshold.
//! Immortal objects live in a separate table and are never swept.
//!
//! Allocation never collects. The owner of the heap (normally the VM) asks
//! [`Heap::should_collect`] at a safepoint and then calls [`Heap::collect`]
//! with its roots.

use crate::gc::{registry_lock, GcRef, MarkBits, RootSource, Trace, Tracer, IMMORTAL_GENERATION};
use std::thread::{self, ThreadId};
use tracing::debug;

/// Default allocation threshold of a fresh storage.
pub const DEFAULT_ALLOCATION_LIMIT: usize = 1024;

/// Constant added to twice the survivor count when recomputing a limit.
pub const LIMIT_FLOOR: usize = 256;

struct Slot<T> {
    value: Option<T>,
    generation: u32,
}

/// Allocation list, pinned roots and threshold of one OS thread.
#[derive(Debug, Clone)]
pub struct ThreadStorage {
    /// Owning thread
    pub thread: ThreadId,
    /// Objects allocated by (or adopted into) this storage
    pub objects: Vec<GcRef>,
    /// Live-count threshold at which a collection is due
    pub allocation_limit: usize,
    /// Objects pinned by host code running on this thread
    pub roots: Vec<GcRef>,
}

impl ThreadStorage {
    fn new(thread: ThreadId, allocation_limit: usize) -> Self {
        ThreadStorage {
            thread,
            objects: Vec::new(),
            allocation_limit,
            roots: Vec::new(),
        }
    }
}

/// Heap-wide statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Live collectable objects
    pub live: usize,
    /// Registered immortal objects
    pub immortals: usize,
    /// Completed collections
    pub collections: usize,
    /// Objects freed since the heap was created
    pub total_freed: usize,
    /// Threshold of the calling thread's storage
    pub allocation_limit: usize,
    /// Registered thread storages
    pub storages: usize,
}

/// Result of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    /// Collectable objects before the sweep
    pub before: usize,
    /// Collectable objects after the sweep
    pub after: usize,
    /// Objects freed
    pub freed: usize,
}

/// Result of retiring a thread storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    /// Objects of the retiring storage that were freed
    pub freed: usize,
    /// Objects that survived and changed owner
    pub adopted: usize,
    /// Storage that took the survivors, if another storage exists
    pub adopted_by: Option<ThreadId>,
}

/// The garbage-collected heap.
///
/// # Examples
///
/// ```
/// use memory_manager::{GcRef, Heap, Trace, Tracer};
///
/// struct Cell(Option<GcRef>);
///
/// impl Trace for Cell {
///     fn trace(&self, tracer: &mut Tracer<'_>) {
///         self.0.trace(tracer);
///     }
/// }
///
/// let mut heap = Heap::new();
/// let leaf = heap.alloc(Cell(None));
/// let root = heap.alloc(Cell(Some(leaf)));
/// let garbage = heap.alloc(Cell(None));
///
/// let roots = vec![root];
/// let stats = heap.collect(&[&roots]).unwrap();
/// assert_eq!(stats.freed, 1);
/// assert!(heap.get(leaf).is_some());
/// assert!(heap.get(garbage).is_none());
/// ```
pub struct Heap<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    immortals: Vec<T>,
    marks: MarkBits,
    storages: Vec<ThreadStorage>,
    pause_depth: usize,
    default_limit: usize,
    collections: usize,
    total_freed: usize,
}

impl<T: Trace> Heap<T> {
    /// Create an empty heap with [`DEFAULT_ALLOCATION_LIMIT`].
    pub fn new() -> Self {
        Self::with_allocation_limit(DEFAULT_ALLOCATION_LIMIT)
    }

    /// Create an empty heap whose storages start at `limit`.
    pub fn with_allocation_limit(limit: usize) -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            immortals: Vec::new(),
            marks: MarkBits::new(),
            storages: Vec::new(),
            pause_depth: 0,
            default_limit: limit.max(1),
            collections: 0,
            total_freed: 0,
        }
    }

    fn storage_index(&mut self, thread: ThreadId) -> usize {
        match self.storages.iter().position(|s| s.thread == thread) {
            Some(index) => index,
            None => {
                let _guard = registry_lock().lock();
                self.storages
                    .push(ThreadStorage::new(thread, self.default_limit));
                debug!(?thread, "registered thread storage");
                self.storages.len() - 1
            }
        }
    }

    fn current_storage(&mut self) -> &mut ThreadStorage {
        let index = self.storage_index(thread::current().id());
        &mut self.storages[index]
    }

    /// Register a storage for `thread` (no-op if it already has one).
    pub fn register_thread(&mut self, thread: ThreadId) {
        self.storage_index(thread);
    }

    /// Allocate a collectable object owned by the calling thread's storage.
    ///
    /// Never triggers a collection.
    pub fn alloc(&mut self, value: T) -> GcRef {
        let object = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                GcRef::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    value: Some(value),
                    generation: 0,
                });
                GcRef::new(index, 0)
            }
        };
        self.current_storage().objects.push(object);
        object
    }

    /// Register an object that is never collected.
    ///
    /// Immortal objects are not traced, so they must only reference other
    /// immortal objects.
    pub fn alloc_immortal(&mut self, value: T) -> GcRef {
        let _guard = registry_lock().lock();
        let index = self.immortals.len() as u32;
        self.immortals.push(value);
        GcRef::immortal(index)
    }

    /// Resolve a handle; `None` for freed slots and stale handles.
    pub fn get(&self, object: GcRef) -> Option<&T> {
        if object.is_immortal() {
            return self.immortals.get(object.index() as usize);
        }
        let slot = self.slots.get(object.index() as usize)?;
        if slot.generation != object.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Resolve a handle mutably.
    pub fn get_mut(&mut self, object: GcRef) -> Option<&mut T> {
        if object.is_immortal() {
            return self.immortals.get_mut(object.index() as usize);
        }
        let slot = self.slots.get_mut(object.index() as usize)?;
        if slot.generation != object.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// True if `object` resolves to a live object.
    pub fn contains(&self, object: GcRef) -> bool {
        self.get(object).is_some()
    }

    /// Pin `object` as a root of the calling thread's storage.
    pub fn add_root(&mut self, object: GcRef) {
        self.current_storage().roots.push(object);
    }

    /// Remove one pin of `object`; returns false if it was not pinned.
    pub fn remove_root(&mut self, object: GcRef) -> bool {
        let storage = self.current_storage();
        match storage.roots.iter().rposition(|r| *r == object) {
            Some(pos) => {
                storage.roots.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Suspend collection. Nests: every `pause` needs a matching `resume`.
    pub fn pause(&mut self) {
        self.pause_depth += 1;
    }

    /// Undo one [`Heap::pause`].
    pub fn resume(&mut self) {
        self.pause_depth = self.pause_depth.saturating_sub(1);
    }

    /// True while at least one pause is active.
    pub fn is_paused(&self) -> bool {
        self.pause_depth > 0
    }

    /// Run `f` with collection paused.
    pub fn paused<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.pause();
        let result = f(self);
        self.resume();
        result
    }

    /// Objects currently owned by the calling thread's storage.
    pub fn allocation_count(&mut self) -> usize {
        self.current_storage().objects.len()
    }

    /// Threshold of the calling thread's storage.
    pub fn allocation_limit(&mut self) -> usize {
        self.current_storage().allocation_limit
    }

    /// Set the threshold of the calling thread's storage.
    pub fn set_allocation_limit(&mut self, limit: usize) {
        self.current_storage().allocation_limit = limit.max(1);
    }

    /// Number of immortal objects.
    pub fn immortal_count(&self) -> usize {
        self.immortals.len()
    }

    /// Number of live collectable objects across all storages.
    pub fn live_count(&self) -> usize {
        self.storages.iter().map(|s| s.objects.len()).sum()
    }

    /// True when a collection is due: not paused and the calling thread's
    /// storage has reached its threshold.
    pub fn should_collect(&mut self) -> bool {
        if self.is_paused() {
            return false;
        }
        let storage = self.current_storage();
        storage.objects.len() >= storage.allocation_limit
    }

    /// Registered storages.
    pub fn storages(&self) -> &[ThreadStorage] {
        &self.storages
    }

    /// Heap statistics.
    pub fn stats(&mut self) -> GcStats {
        let allocation_limit = self.allocation_limit();
        GcStats {
            live: self.live_count(),
            immortals: self.immortals.len(),
            collections: self.collections,
            total_freed: self.total_freed,
            allocation_limit,
            storages: self.storages.len(),
        }
    }

    fn mark_from(&mut self, roots: &[&dyn RootSource], skip: Option<usize>) {
        let slots = &self.slots;
        let is_live = |object: GcRef| {
            matches!(
                slots.get(object.index() as usize),
                Some(slot) if slot.generation == object.generation()
            )
        };
        let mut tracer = Tracer::new(&mut self.marks, &is_live);
        for source in roots {
            source.trace_roots(&mut tracer);
        }
        for (i, storage) in self.storages.iter().enumerate() {
            if Some(i) != skip {
                tracer.mark_all(storage.roots.iter().copied());
            }
        }
        while let Some(object) = tracer.pop() {
            let slot = match slots.get(object.index() as usize) {
                Some(slot) if slot.generation == object.generation() => slot,
                _ => continue,
            };
            if let Some(value) = &slot.value {
                value.trace(&mut tracer);
            }
        }
    }

    fn free_slot(&mut self, object: GcRef) {
        let slot = &mut self.slots[object.index() as usize];
        slot.value = None;
        slot.generation = if slot.generation + 1 == IMMORTAL_GENERATION {
            0
        } else {
            slot.generation + 1
        };
        self.free.push(object.index());
    }

    fn sweep_storage(&mut self, index: usize) -> usize {
        let objects = std::mem::take(&mut self.storages[index].objects);
        let mut survivors = Vec::with_capacity(objects.len());
        let mut freed = 0;
        for object in objects {
            if self.marks.get(object.index() as usize) {
                survivors.push(object);
            } else {
                self.free_slot(object);
                freed += 1;
            }
        }
        self.storages[index].objects = survivors;
        freed
    }

    /// Run a full mark-sweep collection.
    ///
    /// Marks from `roots`, every storage's pinned roots and (implicitly) the
    /// immortals, sweeps every storage, clears the marks and recomputes each
    /// storage's threshold as `2 × survivors + LIMIT_FLOOR`. Returns `None`
    /// without doing anything while collection is paused.
    pub fn collect(&mut self, roots: &[&dyn RootSource]) -> Option<CollectStats> {
        if self.is_paused() {
            return None;
        }
        let _guard = registry_lock().lock();
        let before = self.live_count();

        self.mark_from(roots, None);
        let mut freed = 0;
        for index in 0..self.storages.len() {
            freed += self.sweep_storage(index);
            let storage = &mut self.storages[index];
            storage.allocation_limit = storage.objects.len() * 2 + LIMIT_FLOOR;
        }
        self.marks.clear_all();

        self.collections += 1;
        self.total_freed += freed;
        let after = self.live_count();
        debug!(before, after, freed, "garbage collection finished");
        Some(CollectStats {
            before,
            after,
            freed,
        })
    }

    /// Retire the storage of `thread`.
    ///
    /// Marks from every other storage's pinned roots plus `roots`, sweeps
    /// only the retiring storage, hands its survivors to the first remaining
    /// storage and clears the marks. The retiring thread's own pins are
    /// dropped. When no other storage exists the retiring storage stays
    /// registered with its survivors and no pins. Returns `None` if `thread`
    /// has no storage.
    pub fn teardown_thread(
        &mut self,
        thread: ThreadId,
        roots: &[&dyn RootSource],
    ) -> Option<TeardownReport> {
        let _guard = registry_lock().lock();
        let index = self.storages.iter().position(|s| s.thread == thread)?;

        self.mark_from(roots, Some(index));
        let freed = self.sweep_storage(index);
        self.marks.clear_all();
        self.total_freed += freed;

        let mut retiring = self.storages.remove(index);
        retiring.roots.clear();
        let adopted = retiring.objects.len();
        let adopted_by = match self.storages.first_mut() {
            Some(heir) => {
                heir.objects.append(&mut retiring.objects);
                Some(heir.thread)
            }
            None => {
                self.storages.push(retiring);
                None
            }
        };
        debug!(?thread, freed, adopted, "retired thread storage");
        Some(TeardownReport {
            freed,
            adopted,
            adopted_by,
        })
    }
}

impl<T: Trace> Default for Heap<T> {
    fn default() -> Self {
        Self::new()
    }
}
