//! # Lab 61: Concurrent Priority Heap
//!
//! A fixed-capacity, array-backed max-priority heap that supports
//! parallel `insert` and `pop` from any number of threads at once,
//! correct equivalent to a sequential binary heap.
//!
//! Instead of serializing on a single lock, it uses fine-grained
//! lock-coupling: each array slot has its own mutex, a walk holds at
//! most two of them at a time, and a separate "structure" mutex guards
//! only the moment the logical size changes. The index a fresh insert
//! lands on is chosen by a bit-reversed counter so that concurrent
//! inserters scatter across disjoint leaves instead of piling onto the
//! rightmost path.
//!
//! Key concepts:
//! - Per-slot `Mutex<Node<T>>` instead of one lock for the whole tree
//! - A bit-reversed insertion order to spread contention away from the root
//! - A three-state node lifecycle (`Empty` -> `Transit` -> `Available`)
//!   that lets a percolating insert be visible-but-untrusted while in flight
//! - A fixed lock order (lower array index first) in place of a generic
//!   two-mutex primitive, to rule out deadlock
//!
//! See [`heap::Heap`] for the operations and their locking discipline.

pub mod counter;
pub mod error;
pub mod heap;
pub mod node;

pub use counter::BitReversedCounter;
pub use error::HeapError;
pub use heap::Heap;
pub use node::{Node, Status};
