//! Transitions: scopes that hold writes as pending values until an async workload they cover
//! settles, then commit (or, for optimistic writes, revert) atomically.

use crate::node::NodeId;
use rustc_hash::FxHashSet;
use slotmap::{new_key_type, SlotMap};
use std::rc::Rc;

new_key_type! {
    /// Identifies one transition. A transition that gets superseded by a later one (two
    /// overlapping transitions touching the same signal) stays addressable through its old id —
    /// [`Transitions::find`] resolves it to whichever transition actually owns the work now.
    pub struct TransitionId;
}

/// Whether a transition is still collecting work, or has finished one way or another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Done {
    Open,
    Closed,
    /// Merged into another, still-open transition (union-find link).
    SupersededBy(TransitionId),
}

/// A pending externally-initiated action (a "generator-based action" in the terminology this was
/// modeled from): any spawned future whose completion the transition must wait on before it can
/// close.
pub(crate) struct ActionHandle {
    pub done: Rc<std::cell::Cell<bool>>,
}

pub(crate) struct Transition {
    pub time: u64,
    pub pending_nodes: FxHashSet<NodeId>,
    pub async_nodes: FxHashSet<NodeId>,
    pub optimistic_nodes: FxHashSet<NodeId>,
    /// Revert callbacks for external stores with an optimistic overlay (the proxy-store
    /// collaborator this crate treats as an opaque contract).
    pub optimistic_store_reverts: Vec<Rc<dyn Fn()>>,
    pub actions: Vec<ActionHandle>,
    pub done: Done,
}

impl Transition {
    fn new(time: u64) -> Self {
        Self {
            time,
            pending_nodes: FxHashSet::default(),
            async_nodes: FxHashSet::default(),
            optimistic_nodes: FxHashSet::default(),
            optimistic_store_reverts: Vec::new(),
            actions: Vec::new(),
            done: Done::Open,
        }
    }

    /// A transition is ready to close once every async node it's tracking has settled and every
    /// action it's waiting on has completed.
    pub fn is_complete(&self) -> bool {
        self.async_nodes.is_empty() && self.actions.iter().all(|a| a.done.get())
    }
}

#[derive(Default)]
pub(crate) struct Transitions {
    slots: SlotMap<TransitionId, Transition>,
}

impl Transitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, time: u64) -> TransitionId {
        self.slots.insert(Transition::new(time))
    }

    pub fn get(&self, id: TransitionId) -> Option<&Transition> {
        self.slots.get(id)
    }

    pub fn get_mut(&mut self, id: TransitionId) -> Option<&mut Transition> {
        self.slots.get_mut(id)
    }

    /// Resolves `id` through any `SupersededBy` chain to the transition currently responsible for
    /// its work.
    pub fn find(&self, id: TransitionId) -> TransitionId {
        let mut cur = id;
        while let Some(Done::SupersededBy(next)) = self.slots.get(cur).map(|t| t.done) {
            cur = next;
        }
        cur
    }

    /// Merges `from` into `to`: moves its tracked node sets across and marks it superseded.
    pub fn merge(&mut self, from: TransitionId, to: TransitionId) {
        if from == to {
            return;
        }
        let Some(mut merged) = self.slots.get_mut(from).map(std::mem::take) else {
            return;
        };
        if let Some(target) = self.slots.get_mut(to) {
            target.pending_nodes.extend(merged.pending_nodes.drain());
            target.async_nodes.extend(merged.async_nodes.drain());
            target.optimistic_nodes.extend(merged.optimistic_nodes.drain());
            target
                .optimistic_store_reverts
                .append(&mut merged.optimistic_store_reverts);
            target.actions.append(&mut merged.actions);
        }
        if let Some(from_slot) = self.slots.get_mut(from) {
            from_slot.done = Done::SupersededBy(to);
        }
    }

    pub fn close(&mut self, id: TransitionId) -> Option<Transition> {
        let id = self.find(id);
        let transition = self.slots.remove(id)?;
        Some(transition)
    }
}

impl Default for Transition {
    fn default() -> Self {
        Self::new(0)
    }
}

use crate::{node::ReactiveFlags, runtime::Runtime};
use tracing::instrument;

impl Runtime {
    /// Starts a new transition (or returns the already-active one — nested `start_transition`
    /// calls join the outer transition rather than stacking).
    pub(crate) fn start_transition(&self) -> TransitionId {
        if let Some(active) = self.active_transition() {
            return active;
        }
        let id = self.transitions.borrow_mut().create(self.clock());
        self.set_active_transition(Some(id));
        id
    }

    /// Records that `node` has a pending write held by `transition`, so [`Runtime::close_transition`]
    /// knows to commit it once the transition settles.
    pub(crate) fn track_pending_write(&self, transition: TransitionId, node: NodeId) {
        if let Some(t) = self.transitions.borrow_mut().get_mut(transition) {
            t.pending_nodes.insert(node);
        }
        if let Some(n) = self.nodes.borrow_mut().get_mut(node) {
            n.transition = Some(transition);
        }
    }

    /// Records that `node` has an optimistic overlay held by `transition`: visible to reads like
    /// any other pending write, but [`Runtime::close_transition`] reverts it instead of committing
    /// it, since nothing ever promoted it to a real pending write of the settled result.
    pub(crate) fn track_optimistic_write(&self, transition: TransitionId, node: NodeId) {
        if let Some(t) = self.transitions.borrow_mut().get_mut(transition) {
            t.optimistic_nodes.insert(node);
        }
        if let Some(n) = self.nodes.borrow_mut().get_mut(node) {
            n.transition = Some(transition);
        }
    }

    pub(crate) fn transition_ready_to_close(&self, id: TransitionId) -> bool {
        self.transitions
            .borrow()
            .get(id)
            .map(|t| t.is_complete())
            .unwrap_or(true)
    }

    /// Registers an in-flight action future with `transition`; the transition can't close until
    /// its `done` flag is set (see [`ActionHandle`]).
    pub(crate) fn register_action(&self, transition: TransitionId, handle: ActionHandle) {
        if let Some(t) = self.transitions.borrow_mut().get_mut(transition) {
            t.actions.push(handle);
        }
    }

    /// Records that `node`, an async computed resolving under `transition`, hasn't settled yet.
    pub(crate) fn track_async_node(&self, transition: TransitionId, node: NodeId) {
        if let Some(t) = self.transitions.borrow_mut().get_mut(transition) {
            t.async_nodes.insert(node);
        }
    }

    /// Marks `node` settled under `transition`. A no-op if the transition already closed (the
    /// node resolved after the window it was tracked in had already ended).
    pub(crate) fn untrack_async_node(&self, transition: TransitionId, node: NodeId) {
        if let Some(t) = self.transitions.borrow_mut().get_mut(transition) {
            t.async_nodes.remove(&node);
        }
    }

    /// Commits a completed transition: pending values become committed, optimistic overrides
    /// revert, and the transition's lanes are dropped.
    #[instrument(level = "debug", skip(self))]
    pub(crate) fn close_transition(&self, id: TransitionId) {
        let Some(transition) = self.transitions.borrow_mut().close(id) else {
            return;
        };
        self.set_active_transition(None);

        for node in &transition.pending_nodes {
            self.commit_pending_cell(*node);
            self.mark_changed(*node);
        }
        for node in &transition.optimistic_nodes {
            self.revert_pending_cell(*node);
            self.mark_changed(*node);
        }
        for revert in &transition.optimistic_store_reverts {
            revert();
        }

        let lane_roots: Vec<_> = {
            let mut lanes = self.lanes.borrow_mut();
            self.active_lanes_owned_by(&mut lanes, id)
        };
        self.lanes.borrow_mut().retain_not_rooted_at(&lane_roots);
        self.active_lanes
            .borrow_mut()
            .retain(|l| !lane_roots.contains(l));

        // Any node marked zombie for this transition's benefit can finally be disposed.
        let zombies: Vec<NodeId> = self
            .nodes
            .borrow()
            .iter()
            .filter(|(_, n)| n.flags.contains(ReactiveFlags::ZOMBIE))
            .map(|(id, _)| id)
            .collect();
        for zombie in zombies {
            self.dispose_node_now(zombie);
        }
    }

    fn active_lanes_owned_by(
        &self,
        lanes: &mut crate::optimistic::Lanes,
        transition: TransitionId,
    ) -> Vec<crate::optimistic::LaneId> {
        self.active_lanes()
            .into_iter()
            .filter(|lane| lanes.transition_of(*lane) == transition)
            .collect()
    }
}
