//! The concurrent max-priority heap.
//!
//! Two kinds of locks guard the array:
//!
//! - `structure`: held only for the instant a count-changing counter
//!   operation happens, plus the leaf publication in `insert` / the
//!   root copy-out in `pop`. Never held while walking the tree.
//! - One `Mutex<Node<T>>` per array slot: held during traversal, at
//!   most two at a time (current node plus its parent, or current node
//!   plus the chosen child).
//!
//! # Locking discipline
//!
//! Every two-lock acquisition in this module locks the **lower array
//! index first**. A parent's index is always less than its child's, and
//! a left child's index is always less than its sibling's, so "lower
//! index first" already matches "parent before child" and "left before
//! right" — there's a single, static order and nothing dynamic to get
//! wrong. Combined with never holding a node lock while acquiring
//! `structure`, this rules out deadlock: there is no cycle of threads
//! each waiting on a lock the next one holds, because every thread that
//! holds two locks at once holds them in the same relative order.
//!
//! ```text
//!            1
//!          /   \
//!         2     3
//!        / \   / \
//!       4   5 6   7
//! ```
//! Locking `(2, 5)` during a pop's descent and `(1, 2)` during an
//! insert's ascent both lock the smaller index first; they can never
//! deadlock against each other because both respect the same order.

use std::sync::Mutex;

use log::debug;

use crate::counter::BitReversedCounter;
use crate::error::HeapError;
use crate::node::{Node, Status};

/// A concurrent, fixed-capacity, array-backed max-priority heap.
///
/// `capacity` is always a power of two; slots are indexed `1..=capacity`
/// with index `0` reserved as an unused sentinel, matching the
/// left-child/right-child arithmetic (`2i`, `2i + 1`) of a standard
/// binary heap.
pub struct Heap<T> {
    capacity: usize,
    node_locks: Vec<Mutex<Node<T>>>,
    structure: Mutex<BitReversedCounter>,
}

impl<T> Heap<T> {
    /// Creates a heap whose usable capacity is the smallest power of two
    /// greater than or equal to `requested_capacity` (and at least 1).
    pub fn new(requested_capacity: usize) -> Self {
        let capacity = requested_capacity.max(1).next_power_of_two();
        debug!("allocating heap with capacity {capacity} (requested {requested_capacity})");

        let mut node_locks = Vec::with_capacity(capacity + 1);
        for _ in 0..=capacity {
            node_locks.push(Mutex::new(Node::empty()));
        }

        Heap {
            capacity,
            node_locks,
            structure: Mutex::new(BitReversedCounter::new()),
        }
    }

    /// The heap's usable capacity (a power of two).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tests whether the heap currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.structure.lock().unwrap().count == 0
    }

    /// The number of entries currently held by the heap.
    pub fn len(&self) -> usize {
        self.structure.lock().unwrap().count as usize
    }

    /// Inserts `value` with the given `priority`, tagged with `tag` so
    /// that other threads percolating past this entry while it is still
    /// in flight can recognize it as belonging to this call.
    ///
    /// Returns [`HeapError::Full`] if the heap already holds `capacity`
    /// entries; the heap is left untouched in that case.
    pub fn insert(&self, value: T, priority: i64, tag: u64) -> Result<(), HeapError> {
        // Publish at the leaf under the structure lock: allocate the next
        // index, lock it, and write the transit entry before anyone else
        // can observe the index as taken.
        let published_at: usize = {
            let mut state = self.structure.lock().unwrap();
            if state.count as usize >= self.capacity {
                return Err(HeapError::Full {
                    capacity: self.capacity,
                });
            }
            let idx = state.increment() as usize;
            let mut node = self.node_locks[idx].lock().unwrap();
            node.set(value, priority, tag, Status::Transit);
            idx
        };

        let mut i = published_at;

        // Percolate up. Each iteration locks parent then child (the
        // lower index first, since parent < child always for i > 1).
        while i > 1 {
            let parent_idx = i / 2;
            let mut parent = self.node_locks[parent_idx].lock().unwrap();
            let mut node = self.node_locks[i].lock().unwrap();

            if parent.status == Status::Available
                && node.status == Status::Transit
                && node.tag == tag
            {
                if node.priority > parent.priority {
                    std::mem::swap(&mut *parent, &mut *node);
                    drop(parent);
                    drop(node);
                    i = parent_idx;
                } else {
                    node.status = Status::Available;
                    break;
                }
            } else if parent.status == Status::Empty {
                // A concurrent pop emptied the parent out from under us.
                // Stop here; a later operation settles this entry.
                break;
            } else if node.status == Status::Transit && node.tag != tag {
                // Another thread's entry met ours on the way up. Hand off:
                // keep climbing without swapping, letting the other
                // thread's transit continue to bubble past us.
                drop(parent);
                drop(node);
                i = parent_idx;
            } else {
                debug_assert!(
                    false,
                    "unreachable node state during insert percolation at index {i}"
                );
                break;
            }
        }

        if i == 1 {
            let mut node = self.node_locks[1].lock().unwrap();
            if node.status == Status::Transit && node.tag == tag {
                node.status = Status::Available;
            }
        }

        Ok(())
    }

    /// Removes and returns the entry with the largest priority, or
    /// `None` if the heap is empty.
    pub fn pop(&self) -> Option<T> {
        let bottom: usize = {
            let mut state = self.structure.lock().unwrap();
            if state.count == 0 {
                return None;
            }
            let b = state.reversed as usize;
            state.decrement();
            b
        };

        let mut current = self.node_locks[1].lock().unwrap();
        let value = current.value.take();

        if bottom != 1 {
            let mut last = self.node_locks[bottom].lock().unwrap();
            std::mem::swap(&mut *current, &mut *last);
            current.status = Status::Available;
            last.clear();
        } else {
            current.clear();
        }

        // Percolate down: keep exactly one lock ("current") held while
        // descending, briefly pairing it with both children to pick the
        // larger one. Because `capacity` is a power of two, the bottom
        // level is half-full: the node at `capacity / 2` has a left
        // child (`capacity`) but no right child (`capacity + 1` doesn't
        // exist), so the right slot has to be checked for that case on
        // every iteration rather than assumed present.
        let mut i = 1usize;
        loop {
            let left = 2 * i;
            if left > self.capacity {
                break;
            }
            let right = left + 1;

            let left_guard = self.node_locks[left].lock().unwrap();
            if left_guard.status == Status::Empty {
                break;
            }

            let (chosen_idx, mut chosen) = if right > self.capacity {
                (left, left_guard)
            } else {
                let right_guard = self.node_locks[right].lock().unwrap();
                if right_guard.status == Status::Empty || left_guard.priority > right_guard.priority
                {
                    drop(right_guard);
                    (left, left_guard)
                } else {
                    drop(left_guard);
                    (right, right_guard)
                }
            };

            if chosen.priority > current.priority {
                std::mem::swap(&mut *current, &mut *chosen);
                drop(current);
                current = chosen;
                i = chosen_idx;
            } else {
                break;
            }
        }

        value
    }

    /// Structural check for tests: every non-empty node must not exceed
    /// its parent's priority. Scans until the first empty slot, which is
    /// treated as the end of the heap. Not synchronized against
    /// concurrent mutators; call only at a quiescent point.
    pub fn is_heap_valid(&self) -> bool {
        for i in 2..=self.capacity {
            let (status, priority) = {
                let node = self.node_locks[i].lock().unwrap();
                (node.status, node.priority)
            };

            if status == Status::Empty {
                return true;
            }

            let parent_priority = self.node_locks[i / 2].lock().unwrap().priority;
            if priority > parent_priority {
                return false;
            }
        }
        true
    }
}
