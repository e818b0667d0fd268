//! Contract tests verifying the memory_manager public API.
//! These tests ensure all exported types and functions exist with correct signatures.

use memory_manager::{GcRef, Heap, RootSource, Trace, Tracer, LIMIT_FLOOR};

struct Pair {
    left: Option<GcRef>,
    right: Option<GcRef>,
}

impl Trace for Pair {
    fn trace(&self, tracer: &mut Tracer<'_>) {
        self.left.trace(tracer);
        self.right.trace(tracer);
    }
}

fn pair(left: Option<GcRef>, right: Option<GcRef>) -> Pair {
    Pair { left, right }
}

/// A root holder outside the heap, like a VM stack
struct Stack(Vec<GcRef>);

impl RootSource for Stack {
    fn trace_roots(&self, tracer: &mut Tracer<'_>) {
        tracer.mark_all(self.0.iter().copied());
    }
}

// ============================================================================
// Allocation
// ============================================================================

/// Test Heap contract: new() -> Self
#[test]
fn contract_heap_new() {
    let mut heap: Heap<Pair> = Heap::new();
    assert_eq!(heap.live_count(), 0);
    assert_eq!(heap.stats().collections, 0);
}

/// Test Heap contract: alloc never collects
#[test]
fn contract_alloc_never_collects() {
    let mut heap = Heap::with_allocation_limit(2);
    let refs: Vec<GcRef> = (0..10).map(|_| heap.alloc(pair(None, None))).collect();
    assert!(refs.iter().all(|r| heap.contains(*r)));
    assert_eq!(heap.stats().collections, 0);
    assert!(heap.should_collect());
}

// ============================================================================
// Collection
// ============================================================================

/// Test Heap contract: collect marks transitively from every root source
#[test]
fn contract_collect_from_multiple_sources() {
    let mut heap = Heap::new();
    let a = heap.alloc(pair(None, None));
    let b = heap.alloc(pair(Some(a), None));
    let c = heap.alloc(pair(None, None));
    let d = heap.alloc(pair(None, None));
    let stack = Stack(vec![b]);
    let globals = vec![c];

    let stats = heap.collect(&[&stack, &globals]).unwrap();
    assert_eq!(stats.freed, 1);
    assert!(heap.contains(a));
    assert!(heap.contains(b));
    assert!(heap.contains(c));
    assert!(!heap.contains(d));
}

/// Test Heap contract: a second collection with the same roots frees nothing
#[test]
fn contract_collect_is_idempotent() {
    let mut heap = Heap::new();
    let a = heap.alloc(pair(None, None));
    heap.alloc(pair(None, None));
    let roots = vec![a];
    assert_eq!(heap.collect(&[&roots]).unwrap().freed, 1);
    assert_eq!(heap.collect(&[&roots]).unwrap().freed, 0);
    assert_eq!(heap.stats().collections, 2);
    assert_eq!(heap.stats().total_freed, 1);
}

/// Test Heap contract: the threshold becomes 2 x survivors + floor
#[test]
fn contract_threshold_after_collection() {
    let mut heap = Heap::with_allocation_limit(8);
    let keep: Vec<GcRef> = (0..5).map(|_| heap.alloc(pair(None, None))).collect();
    for _ in 0..20 {
        heap.alloc(pair(None, None));
    }
    heap.collect(&[&keep]).unwrap();
    assert_eq!(heap.live_count(), 5);
    assert_eq!(heap.allocation_limit(), 5 * 2 + LIMIT_FLOOR);
    assert!(!heap.should_collect());
}

/// Test Heap contract: immortals may be referenced by collectable objects
#[test]
fn contract_immortal_children_are_ignored() {
    let mut heap = Heap::new();
    let immortal = heap.alloc_immortal(pair(None, None));
    let holder = heap.alloc(pair(Some(immortal), None));
    let roots = vec![holder];
    heap.collect(&[&roots]).unwrap();
    assert!(heap.contains(immortal));
    assert!(heap.contains(holder));
}

// ============================================================================
// Pause / resume
// ============================================================================

/// Test Heap contract: pauses nest
#[test]
fn contract_pause_nests() {
    let mut heap: Heap<Pair> = Heap::new();
    heap.pause();
    heap.pause();
    heap.resume();
    assert!(heap.is_paused());
    assert!(heap.collect(&[]).is_none());
    heap.resume();
    assert!(!heap.is_paused());
    assert!(heap.collect(&[]).is_some());
}

/// Test Heap contract: paused() restores the previous state
#[test]
fn contract_paused_closure() {
    let mut heap = Heap::new();
    let r = heap.paused(|h| {
        let r = h.alloc(pair(None, None));
        assert!(h.collect(&[]).is_none());
        r
    });
    assert!(!heap.is_paused());
    assert!(heap.contains(r));
}
