//! Mark-phase primitives shared by every collection.
//!
//! - [`GcRef`]: non-owning handle to a heap slot or an immortal object
//! - [`Trace`]: implemented by managed objects to report their children
//! - [`RootSource`]: implemented by anything that holds roots (VMs, contexts)
//! - [`Tracer`]: mark bitset plus a gray worklist
//! - [`registry_lock`]: the single process-wide lock guarding storage
//!   registration, teardown and collection

use parking_lot::{const_reentrant_mutex, ReentrantMutex};
use std::fmt;

/// Generation reserved for immortal handles.
pub(crate) const IMMORTAL_GENERATION: u32 = u32::MAX;

static REGISTRY: ReentrantMutex<()> = const_reentrant_mutex(());

/// The process-wide lock taken around every registry mutation.
///
/// Reentrant so a collection triggered from inside a teardown (or a native
/// function that already holds it) does not deadlock.
pub fn registry_lock() -> &'static ReentrantMutex<()> {
    &REGISTRY
}

/// Handle to a managed object.
///
/// Copying a `GcRef` never keeps the object alive; liveness comes only from
/// roots and from the [`Trace`] edges of live objects. A handle to a freed
/// slot is detected through its generation and resolves to `None`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GcRef {
    index: u32,
    generation: u32,
}

impl GcRef {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        GcRef { index, generation }
    }

    pub(crate) fn immortal(index: u32) -> Self {
        GcRef {
            index,
            generation: IMMORTAL_GENERATION,
        }
    }

    /// Slot index (or immortal table index).
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation the handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// True for handles to objects that are never collected.
    pub fn is_immortal(&self) -> bool {
        self.generation == IMMORTAL_GENERATION
    }
}

impl fmt::Debug for GcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_immortal() {
            write!(f, "GcRef(immortal #{})", self.index)
        } else {
            write!(f, "GcRef(#{}@{})", self.index, self.generation)
        }
    }
}

/// Bitset with one mark bit per heap slot.
#[derive(Debug, Default, Clone)]
pub struct MarkBits {
    words: Vec<u64>,
}

impl MarkBits {
    /// Create an empty bitset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure room for `bits` bits.
    pub fn grow(&mut self, bits: usize) {
        let words = bits.div_ceil(64);
        if words > self.words.len() {
            self.words.resize(words, 0);
        }
    }

    /// Set bit `index`, returning its previous value.
    pub fn set(&mut self, index: usize) -> bool {
        self.grow(index + 1);
        let word = &mut self.words[index / 64];
        let mask = 1u64 << (index % 64);
        let was = *word & mask != 0;
        *word |= mask;
        was
    }

    /// Read bit `index`.
    pub fn get(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .map(|w| w & (1u64 << (index % 64)) != 0)
            .unwrap_or(false)
    }

    /// Clear every bit.
    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// Marking state handed to [`Trace`] and [`RootSource`] implementations.
pub struct Tracer<'a> {
    marks: &'a mut MarkBits,
    is_live: &'a dyn Fn(GcRef) -> bool,
    worklist: Vec<GcRef>,
}

impl<'a> Tracer<'a> {
    /// `is_live` reports whether a handle still names its slot's occupant.
    pub(crate) fn new(marks: &'a mut MarkBits, is_live: &'a dyn Fn(GcRef) -> bool) -> Self {
        Tracer {
            marks,
            is_live,
            worklist: Vec::new(),
        }
    }

    /// Mark `object` reachable.
    ///
    /// Immortal and stale handles are ignored; already-marked objects are
    /// not queued again, so cycles terminate.
    pub fn mark(&mut self, object: GcRef) {
        if object.is_immortal() || !(self.is_live)(object) {
            return;
        }
        if !self.marks.set(object.index as usize) {
            self.worklist.push(object);
        }
    }

    /// Mark every handle yielded by `objects`.
    pub fn mark_all<I: IntoIterator<Item = GcRef>>(&mut self, objects: I) {
        for object in objects {
            self.mark(object);
        }
    }

    pub(crate) fn pop(&mut self) -> Option<GcRef> {
        self.worklist.pop()
    }
}

/// Implemented by managed objects: report every owned child handle.
pub trait Trace {
    /// Call [`Tracer::mark`] on each child.
    fn trace(&self, tracer: &mut Tracer<'_>);
}

/// Implemented by holders of roots that live outside the heap.
pub trait RootSource {
    /// Call [`Tracer::mark`] on each root.
    fn trace_roots(&self, tracer: &mut Tracer<'_>);
}

impl Trace for GcRef {
    fn trace(&self, tracer: &mut Tracer<'_>) {
        tracer.mark(*self);
    }
}

impl<T: Trace> Trace for Vec<T> {
    fn trace(&self, tracer: &mut Tracer<'_>) {
        for item in self {
            item.trace(tracer);
        }
    }
}

impl<T: Trace> Trace for Option<T> {
    fn trace(&self, tracer: &mut Tracer<'_>) {
        if let Some(item) = self {
            item.trace(tracer);
        }
    }
}

impl RootSource for [GcRef] {
    fn trace_roots(&self, tracer: &mut Tracer<'_>) {
        tracer.mark_all(self.iter().copied());
    }
}

impl RootSource for Vec<GcRef> {
    fn trace_roots(&self, tracer: &mut Tracer<'_>) {
        tracer.mark_all(self.iter().copied());
    }
}
