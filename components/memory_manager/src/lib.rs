//! Memory Manager - mark-sweep garbage collector for Bond objects
//!
//! This component provides:
//! - Handle-based heap ([`Heap`]) addressed by [`GcRef`]
//! - Precise mark-sweep collection driven by [`Trace`] and [`RootSource`]
//! - Per-thread allocation storages with adaptive thresholds
//! - Immortal objects that are never collected
//! - Pause/resume and a two-phase thread teardown protocol

pub mod gc;
pub mod heap;

// Re-export main types
pub use gc::{registry_lock, GcRef, MarkBits, RootSource, Trace, Tracer};
pub use heap::{
    CollectStats, GcStats, Heap, TeardownReport, ThreadStorage, DEFAULT_ALLOCATION_LIMIT,
    LIMIT_FLOOR,
};
