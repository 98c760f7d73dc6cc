//! The recomputer: pull-driven re-evaluation with dependency reuse and equality filtering.
//!
//! `update_if_necessary`/`recompute` are grounded in `leptos_reactive::runtime::Runtime`'s methods
//! of the same name, generalized to report [`ComputeOutcome`] (so async-pending and error states
//! propagate distinctly from "value changed") and to drive the [`crate::height::HeightHeap`]
//! instead of recursing unconditionally.

use crate::{
    error::{panic_message, AnyPayload, ReactiveError},
    node::{ComputeOutcome, NodeId, NodeState, ReactiveFlags, StatusFlags},
    runtime::Runtime,
};
use tracing::{instrument, warn};

impl Runtime {
    /// Drains the dirty heap one node at a time, re-borrowing `self.heaps` for each `pop_min` so
    /// that `update_if_necessary` (which itself touches the heap when marking newly-dirty
    /// dependents) never observes it already borrowed.
    pub(crate) fn drain_dirty_heap(&self) {
        while let Some(node) = self.heaps.borrow_mut().dirty.pop_min() {
            if let Some(n) = self.nodes.borrow_mut().get_mut(node) {
                n.dirty_heap_height = None;
            }
            self.update_if_necessary(node);
        }
    }

    pub(crate) fn drain_zombie_heap(&self) {
        while let Some(node) = self.heaps.borrow_mut().zombie.pop_min() {
            self.update_if_necessary(node);
        }
    }

    /// Brings `node` up to date: if it's `check`, walk its sources (recursively updating any that
    /// are themselves computed-like) and stop early the moment this node becomes `dirty`; if it's
    /// `dirty`, recompute it. Always leaves the node `clean`.
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn update_if_necessary(&self, node: NodeId) {
        let state = self
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.state)
            .unwrap_or(NodeState::Clean);

        if state == NodeState::Check {
            let sources: Vec<NodeId> = self
                .nodes
                .borrow()
                .get(node)
                .map(|n| n.sources.clone())
                .unwrap_or_default();
            for source in sources {
                self.update_if_necessary(source);
                let now = self
                    .nodes
                    .borrow()
                    .get(node)
                    .map(|n| n.state)
                    .unwrap_or(NodeState::Clean);
                if now >= NodeState::Dirty {
                    break;
                }
            }
        }

        let state = self
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.state)
            .unwrap_or(NodeState::Clean);
        if state == NodeState::Dirty {
            self.recompute(node);
        }

        if let Some(n) = self.nodes.borrow_mut().get_mut(node) {
            if n.state != NodeState::Disposed {
                n.state = NodeState::Clean;
            }
        }
    }

    /// Runs `node`'s compute function, applying the dependency-reuse and equality-filter rules,
    /// then propagates the outcome.
    #[instrument(level = "debug", skip(self))]
    fn recompute(&self, node: NodeId) {
        // Children created on a previous run are disposed before rerunning, since they were
        // scoped to the previous invocation's lifetime.
        let children: Vec<NodeId> = self
            .nodes
            .borrow_mut()
            .get_mut(node)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();
        for child in children {
            self.dispose_node(child);
        }

        // `on_cleanup` calls made directly inside this node's own body (it's its own owner while
        // running, via `with_owner` below) land in its `cleanups` list. Those must run before each
        // rerun, not just accumulate until the node is finally disposed.
        let cleanups: Vec<Box<dyn FnOnce()>> = self
            .nodes
            .borrow_mut()
            .get_mut(node)
            .map(|n| std::mem::take(&mut n.cleanups))
            .unwrap_or_default();
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }

        if let Some(n) = self.nodes.borrow_mut().get_mut(node) {
            n.flags.insert(ReactiveFlags::RECOMPUTING_DEPS);
        }

        let compute = self.nodes.borrow().get(node).and_then(|n| n.compute.clone());
        let Some(compute) = compute else {
            if let Some(n) = self.nodes.borrow_mut().get_mut(node) {
                n.flags.remove(ReactiveFlags::RECOMPUTING_DEPS);
            }
            return;
        };

        let value_cell = self
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.value.clone())
            .unwrap_or_default();

        let prev_status = self.nodes.borrow().get(node).map(|n| n.status).unwrap_or_default();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.with_owner(node, || self.with_observer(Some(node), || compute.run(node, &value_cell)))
        }))
        .unwrap_or_else(|payload| ComputeOutcome::Error(AnyPayload::new(panic_message(payload))));

        if let Some(n) = self.nodes.borrow_mut().get_mut(node) {
            n.flags.remove(ReactiveFlags::RECOMPUTING_DEPS);
            n.time = self.clock();
        }

        let new_status = match &outcome {
            ComputeOutcome::Pending => StatusFlags::PENDING,
            ComputeOutcome::Error(_) => StatusFlags::ERROR,
            ComputeOutcome::Changed | ComputeOutcome::Unchanged => StatusFlags::empty(),
        };
        if let Some(n) = self.nodes.borrow_mut().get_mut(node) {
            n.status = new_status;
            if let ComputeOutcome::Error(payload) = &outcome {
                n.error_payload = Some(payload.clone());
            }
        }

        if matches!(outcome, ComputeOutcome::Changed) {
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

        if new_status != prev_status {
            self.notify_status_change(node, new_status);
        }
    }

    /// Notifies subscribers when a node's status bits (pending/error) change, independent of
    /// whether its value changed, so boundaries can re-evaluate their fallback condition.
    fn notify_status_change(&self, node: NodeId, status: StatusFlags) {
        if status.contains(StatusFlags::ERROR) {
            warn!(?node, "node entered error state");
        }
        let subs: Vec<NodeId> = self
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.subscribers.iter().copied().collect())
            .unwrap_or_default();
        for sub in subs {
            self.mark_check(sub);
        }
    }

    /// Reads a node's committed error, if its status carries `error`. Used by typed accessors to
    /// surface [`ReactiveError::Compute`] at the call site instead of silently returning stale data.
    pub(crate) fn error_payload(&self, node: NodeId) -> Option<ReactiveError> {
        let status = self.status_of(node);
        if !status.contains(StatusFlags::ERROR) {
            return None;
        }
        let payload = self
            .nodes
            .borrow()
            .get(node)
            .and_then(|n| n.error_payload.clone())
            .unwrap_or_else(|| AnyPayload::new("compute failed"));
        Some(ReactiveError::Compute { node, payload })
    }
}
