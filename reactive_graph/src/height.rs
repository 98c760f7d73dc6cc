//! Height-indexed work queues used by the scheduler to drain dirty nodes in ascending height.
//!
//! Grounded in the same ordered-set idiom the teacher uses for `node_subscribers`/`node_sources`
//! (`indexmap::IndexSet` keyed with the `FxHasher`), applied here per height bucket instead of per
//! node, so ties within a bucket resolve in insertion order.

use crate::node::{FxIndexSet, NodeId};

/// Two height-indexed heaps: `dirty` for ordinary recompute work, `zombie` for nodes disposed
/// mid-transition but still observed for completion. Each bucket is a small ordered set rather
/// than a linked ring — node counts per height are small in practice and `IndexSet` gives us
/// O(1) dedup membership plus insertion-order iteration for free.
pub(crate) struct HeightHeap {
    buckets: Vec<FxIndexSet<NodeId>>,
    min: usize,
    max: usize,
    len: usize,
}

impl HeightHeap {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            min: usize::MAX,
            max: 0,
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn ensure_bucket(&mut self, height: usize) {
        if self.buckets.len() <= height {
            self.buckets.resize_with(height + 1, FxIndexSet::default);
        }
    }

    /// Inserts `node` at `height`. Returns `false` if it was already present (caller's flag check
    /// should normally prevent this, but insertion stays idempotent either way).
    pub fn insert(&mut self, node: NodeId, height: u32) -> bool {
        let height = height as usize;
        self.ensure_bucket(height);
        if self.buckets[height].insert(node) {
            self.min = self.min.min(height);
            self.max = self.max.max(height);
            self.len += 1;
            true
        } else {
            false
        }
    }

    /// Removes `node` from `height`, if present.
    pub fn remove(&mut self, node: NodeId, height: u32) -> bool {
        let height = height as usize;
        if height >= self.buckets.len() {
            return false;
        }
        if self.buckets[height].shift_remove(&node) {
            self.len -= 1;
            true
        } else {
            false
        }
    }

    /// Removes and returns the lowest-height node currently in the heap, in insertion order
    /// within that height's bucket.
    ///
    /// Callers drive the drain loop themselves (`while let Some(node) = heap.pop_min() { ... }`)
    /// rather than handing `HeightHeap` a visitor closure, because visiting a node typically needs
    /// to re-borrow the very `RefCell` this heap lives behind (to recompute the node, which may
    /// insert its own subscribers back into this heap at a lower height). Driving the loop
    /// outside-in means each step only holds the borrow for the duration of one `pop_min` call.
    pub fn pop_min(&mut self) -> Option<NodeId> {
        if self.is_empty() {
            return None;
        }
        while self.min <= self.max {
            if self.min >= self.buckets.len() || self.buckets[self.min].is_empty() {
                self.min += 1;
                continue;
            }
            let node = *self.buckets[self.min].first().expect("bucket non-empty");
            self.buckets[self.min].shift_remove_index(0);
            self.len -= 1;
            return Some(node);
        }
        self.min = usize::MAX;
        self.max = 0;
        None
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, node: NodeId, height: u32) -> bool {
        let height = height as usize;
        height < self.buckets.len() && self.buckets[height].contains(&node)
    }
}
