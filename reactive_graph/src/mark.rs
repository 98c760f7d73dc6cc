//! The mark phase: push-driven, idempotent invalidation that walks from a changed node down
//! through its subscribers, raising `clean -> check -> dirty` but never lowering it.
//!
//! The per-node state walk is grounded in `leptos_reactive::runtime::Runtime::mark_dirty`'s
//! depth-first subscriber traversal; this version trades that function's self-referential
//! `self_cell` iterator stack for a plain `Vec` worklist that clones each node's (small) subscriber
//! list before recursing, the same allocation tradeoff `update_if_necessary` already makes for
//! `node_sources` in the teacher.

use crate::{
    node::{NodeId, NodeKind, NodeState},
    runtime::Runtime,
};
use tracing::trace;

/// A receipt for a manual [`Runtime::refresh`] request, carrying the clock tick it was issued at
/// — the same monotonically assigned sequence number every node stamps on update, so a caller can
/// tell whether a later read reflects this refresh or an even newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshToken(u64);

impl RefreshToken {
    pub fn requested_at(&self) -> u64 {
        self.0
    }
}

impl Runtime {
    /// Marks `node` at least `target` (never downgrades) and transitively marks every reachable
    /// subscriber at least `Check`. Nodes already at or past the target state are pruned — this is
    /// what keeps the walk terminating and idempotent on a DAG.
    pub(crate) fn mark(&self, node: NodeId, target: NodeState) {
        let mut worklist = vec![(node, target)];
        while let Some((id, target)) = worklist.pop() {
            let advanced = {
                let mut nodes = self.nodes.borrow_mut();
                match nodes.get_mut(id) {
                    Some(n) if n.state != NodeState::Disposed && n.state < target => {
                        n.state = target;
                        true
                    }
                    _ => false,
                }
            };
            if !advanced {
                continue;
            }
            trace!(?id, ?target, "marked");

            let (height, is_effect) = self
                .nodes
                .borrow()
                .get(id)
                .map(|n| (n.height, matches!(n.kind, NodeKind::Effect(_))))
                .unwrap_or((0, false));

            // Effects are push-scheduled through their render/user bucket, not the height heap:
            // the heap only orders the pull path (computeds recomputing other computeds), while
            // phase ordering (render before user) is the buckets' job. Inserting an effect into
            // both would let height order win the race and silently collapse the phase split.
            //
            // Effects are enqueued on *any* state advance, not just `Dirty`: a direct write only
            // marks its immediate subscribers `Check` (see the module doc), and an effect is
            // never read by anything the way a computed is, so if it only queued on `Dirty` a
            // plain "effect reads a signal" dependency would never get scheduled at all.
            // `update_if_necessary`'s `Check` branch still short-circuits correctly once it's
            // popped, so queuing early costs a no-op recompute check, not a spurious rerun.
            if is_effect {
                self.enqueue_effect(id);
            } else if target == NodeState::Dirty {
                self.enqueue_dirty(id, height);
            }

            let subs: Vec<NodeId> = self
                .nodes
                .borrow()
                .get(id)
                .map(|n| n.subscribers.iter().copied().collect())
                .unwrap_or_default();
            for sub in subs {
                worklist.push((sub, NodeState::Check));
            }
        }
    }

    /// Inserts `id` into the dirty heap at `height`, re-homing it if it's already sitting there at
    /// a different (necessarily lower — see [`Runtime::relocate_dirty`]) height instead of leaving
    /// the stale bucket entry behind. A node's `dirty_heap_height` is the single source of truth
    /// for "is this node currently enqueued", replacing a separate in-heap flag that couldn't have
    /// carried the bucket height needed to remove the old entry.
    pub(crate) fn enqueue_dirty(&self, id: NodeId, height: u32) {
        let current = self.nodes.borrow().get(id).map(|n| n.dirty_heap_height).unwrap_or(None);
        if let Some(old_height) = current {
            if old_height == height {
                return;
            }
            self.heaps.borrow_mut().dirty.remove(id, old_height);
        }
        self.heaps.borrow_mut().dirty.insert(id, height);
        if let Some(n) = self.nodes.borrow_mut().get_mut(id) {
            n.dirty_heap_height = Some(height);
        }
    }

    /// Re-homes `id` in the dirty heap to `new_height` if it's currently enqueued there at a lower
    /// height. Called after [`Runtime::raise_height`] actually raises a node's height, since that
    /// can happen after the node was already pushed onto the heap at its old (now stale) height —
    /// left alone, the node would sit in two buckets at once and risk being popped and recomputed
    /// twice in the same drain.
    pub(crate) fn relocate_dirty(&self, id: NodeId, new_height: u32) {
        let current = self.nodes.borrow().get(id).map(|n| n.dirty_heap_height).unwrap_or(None);
        if let Some(old_height) = current {
            if old_height != new_height {
                self.enqueue_dirty(id, new_height);
            }
        }
    }

    pub(crate) fn mark_dirty(&self, node: NodeId) {
        self.mark(node, NodeState::Dirty);
    }

    pub(crate) fn mark_check(&self, node: NodeId) {
        self.mark(node, NodeState::Check);
    }

    /// Marks a leaf node (a signal, whose own `recompute` is a no-op) dirty, and propagates that
    /// same certainty one hop further: every direct subscriber is marked `dirty` too, not just
    /// `check`, since a signal write is unconditionally a change. `recompute`'s `Changed` outcome
    /// does the same one-hop-dirty step for computed nodes (see recompute.rs); a signal has no
    /// recompute pass to do it there, so the write path does it here instead. Subscribers beyond
    /// that first hop still only get `check`, same as any other dirty propagation.
    pub(crate) fn mark_changed(&self, node: NodeId) {
        self.mark_dirty(node);
        let subs: Vec<NodeId> = self
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.subscribers.iter().copied().collect())
            .unwrap_or_default();
        for sub in subs {
            self.mark_dirty(sub);
        }
    }

    /// Manual, out-of-band invalidation: re-run `node` the next time it's pulled, without anyone
    /// having written a new value.
    ///
    /// A signal has no recompute step of its own to force, so for a signal this forces its direct
    /// subscribers dirty too, the same way [`Runtime::mark_changed`] treats a real write (plain
    /// `mark_dirty` alone would only `check` them, and `check` on a node whose only touched
    /// dependency is a signal never escalates to a recompute — see the `mark_changed` doc comment
    /// above). A computed has its own recompute step, so marking just the node dirty is enough:
    /// its existing equality filter still decides whether *its* subscribers see a change.
    pub(crate) fn refresh(&self, node: NodeId) -> RefreshToken {
        let is_signal = self
            .nodes
            .borrow()
            .get(node)
            .map(|n| matches!(n.kind, NodeKind::Signal))
            .unwrap_or(false);
        if is_signal {
            self.mark_changed(node);
        } else {
            self.mark_dirty(node);
        }
        self.schedule_flush();
        RefreshToken(self.clock())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        node::{EqualsFn, Node, NodeKind, NodeState},
        runtime::with_runtime,
    };
    use std::{cell::RefCell, rc::Rc};

    fn bare_signal(rt: &crate::runtime::Runtime) -> crate::node::NodeId {
        rt.insert_node(Node {
            kind: NodeKind::Signal,
            value: Rc::new(RefCell::new(Some(Rc::new(0i32)))),
            equals: None::<EqualsFn>,
            state: NodeState::Clean,
            status: Default::default(),
            flags: Default::default(),
            height: 0,
            sources: Vec::new(),
            subscribers: Default::default(),
            owner: None,
            children: Vec::new(),
            compute: None,
            pending_ops: None,
            cleanups: Vec::new(),
            queue: rt.queues.borrow().root(),
            transition: None,
            lane: None,
            time: 0,
            unobserved: None,
            name: None,
            dirty_heap_height: None,
            error_payload: None,
            async_generation: 0,
        })
    }

    #[test]
    fn mark_never_downgrades() {
        with_runtime(|rt| {
            let n = bare_signal(rt);
            rt.mark(n, NodeState::Dirty);
            rt.mark(n, NodeState::Check);
            assert_eq!(rt.nodes.borrow().get(n).unwrap().state, NodeState::Dirty);
        });
    }

    #[test]
    fn mark_is_idempotent() {
        with_runtime(|rt| {
            let n = bare_signal(rt);
            rt.mark(n, NodeState::Check);
            rt.mark(n, NodeState::Check);
            assert_eq!(rt.nodes.borrow().get(n).unwrap().state, NodeState::Check);
        });
    }

    /// Simulates the race a prior review flagged: a node enqueued in the dirty heap at one
    /// height, then height-raised (as `track()`'s `raise_height` would do, mid-flush, via a new
    /// dependency edge) before it's drained. `relocate_dirty` must remove the stale bucket entry
    /// rather than leaving the node enqueued twice, which would otherwise let one flush recompute
    /// it a second time.
    #[test]
    fn relocate_dirty_removes_the_stale_bucket_entry_instead_of_duplicating() {
        with_runtime(|rt| {
            let n = bare_signal(rt);
            rt.enqueue_dirty(n, 0);
            assert_eq!(rt.nodes.borrow().get(n).unwrap().dirty_heap_height, Some(0));

            rt.relocate_dirty(n, 2);
            assert_eq!(rt.nodes.borrow().get(n).unwrap().dirty_heap_height, Some(2));

            let mut popped = Vec::new();
            while let Some(id) = rt.heaps.borrow_mut().dirty.pop_min() {
                popped.push(id);
            }
            assert_eq!(popped, vec![n], "the node must be popped exactly once, not once per bucket");
        });
    }
}
