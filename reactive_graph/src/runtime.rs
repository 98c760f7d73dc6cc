//! The thread-local runtime: node arena, observer/owner stack, global clock, and the glue between
//! the mark/recompute/scheduler pieces that live in their own modules.
//!
//! Grounded in `leptos_reactive::runtime::Runtime` and its `thread_local! { static RUNTIME: ... }`
//! singleton — this crate is scoped to a single execution context per thread (no SSR, no
//! multi-runtime slotmap), so it keeps the teacher's simpler `csr`/`hydrate` branch rather than its
//! `RUNTIMES: SlotMap<RuntimeId, Runtime>` branch.

use crate::{
    error::ReactiveError,
    node::{FxIndexSet, Heaps, Node, NodeId, NodeKind, NodeState, ReactiveFlags, StatusFlags},
    optimistic::{LaneId, Lanes},
    scheduler::Queues,
    transition::{TransitionId, Transitions},
};
use rustc_hash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap};
use std::{
    any::{Any, TypeId},
    cell::{Cell, RefCell},
    rc::Rc,
};
use tracing::{instrument, warn};

/// Crate-level configuration knobs, supplied once via [`Runtime::configure`] (defaults are used
/// otherwise). Mirrors the options surface described for per-node configuration, scaled to
/// runtime-wide tuning.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Initial capacity hint for the node arena, avoiding early reallocation for graphs whose
    /// rough size is known up front.
    pub node_capacity_hint: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            node_capacity_hint: 64,
        }
    }
}

pub(crate) struct Runtime {
    pub(crate) nodes: RefCell<SlotMap<NodeId, Node>>,
    pub(crate) heaps: RefCell<Heaps>,
    pub(crate) queues: RefCell<Queues>,
    pub(crate) transitions: RefCell<Transitions>,
    pub(crate) lanes: RefCell<Lanes>,
    pub(crate) contexts: RefCell<SecondaryMap<NodeId, FxHashMap<TypeId, Rc<dyn Any>>>>,
    observer: Cell<Option<NodeId>>,
    owner: Cell<Option<NodeId>>,
    clock: Cell<u64>,
    active_transition: Cell<Option<TransitionId>>,
    active_lanes: RefCell<Vec<LaneId>>,
    scheduler_running: Cell<bool>,
    scheduled: Cell<bool>,
}

thread_local! {
    static PENDING_OPTIONS: Cell<Option<RuntimeOptions>> = const { Cell::new(None) };
    static RUNTIME_INITIALIZED: Cell<bool> = const { Cell::new(false) };
    static RUNTIME: Runtime = {
        RUNTIME_INITIALIZED.with(|flag| flag.set(true));
        Runtime::new(PENDING_OPTIONS.with(|cell| cell.take()).unwrap_or_default())
    };
}

/// Runs `f` with the thread's runtime. Every public entry point in this crate funnels through
/// this, the same way every `leptos_reactive` free function funnels through `with_runtime`.
pub(crate) fn with_runtime<T>(f: impl FnOnce(&Runtime) -> T) -> T {
    RUNTIME.with(f)
}

/// Sets the [`RuntimeOptions`] the thread's runtime singleton will be built with. Must be called
/// before any reactive primitive is created on this thread; once the runtime has materialized
/// (lazily, on first use), this has no effect.
pub fn configure(options: RuntimeOptions) {
    if RUNTIME_INITIALIZED.with(|flag| flag.get()) {
        warn!("configure() called after the runtime was already initialized; ignoring");
    } else {
        PENDING_OPTIONS.with(|cell| cell.set(Some(options)));
    }
}

/// Synchronously drains every pending recompute and effect on this thread's runtime — the same
/// work a scheduled microtask flush does, run eagerly instead of waiting for the executor's next
/// tick. Useful for tests and any host that wants a deterministic settle point.
pub fn flush() {
    with_runtime(|rt| rt.flush());
}

impl Runtime {
    fn new(options: RuntimeOptions) -> Self {
        Self {
            nodes: RefCell::new(SlotMap::with_capacity_and_key(options.node_capacity_hint)),
            heaps: RefCell::new(Heaps::new()),
            queues: RefCell::new(Queues::new()),
            transitions: RefCell::new(Transitions::new()),
            lanes: RefCell::new(Lanes::new()),
            contexts: RefCell::new(SecondaryMap::new()),
            observer: Cell::new(None),
            owner: Cell::new(None),
            clock: Cell::new(0),
            active_transition: Cell::new(None),
            active_lanes: RefCell::new(Vec::new()),
            scheduler_running: Cell::new(false),
            scheduled: Cell::new(false),
        }
    }

    pub fn clock(&self) -> u64 {
        self.clock.get()
    }

    fn tick_clock(&self) -> u64 {
        let next = self.clock.get() + 1;
        self.clock.set(next);
        next
    }

    pub(crate) fn tick_clock_pub(&self) -> u64 {
        self.tick_clock()
    }

    pub(crate) fn scheduler_running_flag(&self) -> bool {
        self.scheduler_running.get()
    }

    pub(crate) fn set_scheduler_running(&self, value: bool) {
        self.scheduler_running.set(value);
    }

    pub(crate) fn scheduled_flag(&self) -> bool {
        self.scheduled.get()
    }

    pub(crate) fn set_scheduled(&self, value: bool) {
        self.scheduled.set(value);
    }

    // ---- owner / observer stack -------------------------------------------------------------

    pub fn current_owner(&self) -> Option<NodeId> {
        self.owner.get()
    }

    pub fn current_observer(&self) -> Option<NodeId> {
        self.observer.get()
    }

    /// Runs `f` with `owner` as both the active owner (so children it creates attach to it) and
    /// the active observer (so reads during `f` subscribe to it). Restores the prior owner and
    /// observer afterward even if `f` panics.
    pub fn with_owner<T>(&self, owner: NodeId, f: impl FnOnce() -> T) -> T {
        let prev_owner = self.owner.replace(Some(owner));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
        self.owner.set(prev_owner);
        match result {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    /// Runs `f` with `observer` as the active observer, without changing the active owner. Used
    /// by recompute to track dependencies without reparenting the owner tree.
    pub fn with_observer<T>(&self, observer: Option<NodeId>, f: impl FnOnce() -> T) -> T {
        let prev = self.observer.replace(observer);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
        self.observer.set(prev);
        match result {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    /// Runs `f` with no active observer: reads performed during `f` do not create dependency
    /// edges.
    pub fn untrack<T>(&self, f: impl FnOnce() -> T) -> T {
        self.with_observer(None, f)
    }

    pub fn create_root_node(&self) -> NodeId {
        self.insert_node(Node {
            kind: NodeKind::Root,
            value: Rc::new(RefCell::new(None)),
            equals: None,
            state: NodeState::Clean,
            status: StatusFlags::empty(),
            flags: ReactiveFlags::empty(),
            height: 0,
            sources: Vec::new(),
            subscribers: FxIndexSet::default(),
            owner: self.owner.get(),
            children: Vec::new(),
            compute: None,
            pending_ops: None,
            cleanups: Vec::new(),
            queue: self.queues.borrow().root(),
            transition: None,
            lane: None,
            time: self.clock.get(),
            unobserved: None,
            name: None,
            dirty_heap_height: None,
            error_payload: None,
            async_generation: 0,
        })
    }

    pub(crate) fn insert_node(&self, node: Node) -> NodeId {
        let owner = node.owner;
        let id = self.nodes.borrow_mut().insert(node);
        if let Some(owner) = owner {
            if let Some(owner_node) = self.nodes.borrow_mut().get_mut(owner) {
                owner_node.children.push(id);
            }
        }
        id
    }

    pub(crate) fn push_cleanup(&self, owner: NodeId, cleanup: Box<dyn FnOnce()>) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(owner) {
            node.cleanups.push(cleanup);
        }
    }

    pub(crate) fn insert_context(&self, owner: NodeId, ty: TypeId, value: Rc<dyn Any>) {
        self.contexts
            .borrow_mut()
            .entry(owner)
            .unwrap()
            .or_default()
            .insert(ty, value);
    }

    /// Walks from `owner` up through ancestor owners looking for a context of type `ty`. Returns
    /// a clone of the stored `Rc`; the caller downcasts it to the concrete `T`.
    pub(crate) fn find_context(&self, owner: NodeId, ty: TypeId) -> Option<Rc<dyn Any>> {
        let mut cur = Some(owner);
        while let Some(node) = cur {
            if let Some(value) = self
                .contexts
                .borrow()
                .get(node)
                .and_then(|map| map.get(&ty))
            {
                return Some(value.clone());
            }
            cur = self.nodes.borrow().get(node).and_then(|n| n.owner);
        }
        None
    }

    // ---- read / write --------------------------------------------------------------------

    #[instrument(level = "trace", skip(self))]
    pub(crate) fn track(&self, source: NodeId) {
        let Some(observer) = self.observer.get() else {
            return;
        };
        if observer == source {
            return;
        }
        let (added, source_height) = {
            let mut nodes = self.nodes.borrow_mut();
            let source_height = nodes.get(source).map(|n| n.height).unwrap_or(0);
            let added = nodes
                .get_mut(source)
                .map(|n| n.add_subscriber(observer))
                .unwrap_or(false);
            if added {
                if let Some(obs) = nodes.get_mut(observer) {
                    if !obs.sources.contains(&source) {
                        obs.sources.push(source);
                    }
                }
            }
            (added, source_height)
        };
        if added {
            self.raise_height(observer, source_height + 1);
        }
    }

    /// Raises `node`'s height to at least `minimum` and, if that actually changed anything,
    /// propagates the same bump to its subscribers — the height-monotonicity invariant (every
    /// computed's height exceeds every one of its current dependencies') holds after every new
    /// edge, not just at steady state.
    fn raise_height(&self, node: NodeId, minimum: u32) {
        let mut worklist = vec![(node, minimum)];
        while let Some((id, minimum)) = worklist.pop() {
            let (raised, subs) = {
                let mut nodes = self.nodes.borrow_mut();
                match nodes.get_mut(id) {
                    Some(n) if n.height < minimum => {
                        n.height = minimum;
                        (true, n.subscribers.iter().copied().collect::<Vec<_>>())
                    }
                    _ => (false, Vec::new()),
                }
            };
            if raised {
                self.relocate_dirty(id, minimum);
                for sub in subs {
                    worklist.push((sub, minimum + 1));
                }
            }
        }
    }

    pub(crate) fn status_of(&self, node: NodeId) -> StatusFlags {
        self.nodes
            .borrow()
            .get(node)
            .map(|n| n.status)
            .unwrap_or_default()
    }

    /// Registers `callback` to run the moment `node`'s subscriber set drops to zero (see
    /// `dispose_node_now`'s source-unlinking loop, the only place that transition happens outside
    /// of disposal itself). Overwrites any previously registered callback.
    pub(crate) fn set_unobserved(&self, node: NodeId, callback: Rc<dyn Fn()>) {
        if let Some(n) = self.nodes.borrow_mut().get_mut(node) {
            n.unobserved = Some(callback);
        }
    }

    /// Brings `node` up to date (if it's a computed/effect in `check`/`dirty`) and returns
    /// whether its status currently carries `error`/`pending`, so the typed accessor layer can
    /// translate that into a `Result`.
    pub(crate) fn ensure_updated(&self, node: NodeId) {
        if self
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.is_computed_like())
            .unwrap_or(false)
        {
            self.update_if_necessary(node);
        }
    }

    pub(crate) fn read_error(&self, node: NodeId) -> Option<ReactiveError> {
        let status = self.status_of(node);
        if status.contains(StatusFlags::PENDING) {
            Some(ReactiveError::NotReady { source: node })
        } else {
            None
        }
    }

    pub(crate) fn schedule_flush(&self) {
        self.scheduled.set(true);
        crate::executor::spawn_microtask(|| {
            with_runtime(|rt| rt.flush());
        });
    }

    pub(crate) fn active_transition(&self) -> Option<TransitionId> {
        self.active_transition
            .get()
            .map(|id| self.transitions.borrow().find(id))
    }

    pub(crate) fn set_active_transition(&self, id: Option<TransitionId>) {
        self.active_transition.set(id);
    }

    /// Whether a read of `node` right now should see its pending value rather than its committed
    /// one: only true while the transition that holds `node`'s pending write is still the active
    /// one. Code running after that transition closes (or under some unrelated transition) reads
    /// the last committed value instead, even if the cell itself hasn't been committed yet.
    pub(crate) fn reading_inside_transition(&self, node: NodeId) -> bool {
        let Some(active) = self.active_transition() else {
            return false;
        };
        let owner = self.nodes.borrow().get(node).and_then(|n| n.transition);
        match owner {
            Some(t) => self.transitions.borrow().find(t) == active,
            None => false,
        }
    }

    pub(crate) fn active_lanes(&self) -> Vec<LaneId> {
        self.active_lanes.borrow().clone()
    }

    pub(crate) fn push_active_lane(&self, lane: LaneId) {
        self.active_lanes.borrow_mut().push(lane);
    }

    // ---- disposal --------------------------------------------------------------------------

    #[instrument(level = "debug", skip(self))]
    pub(crate) fn dispose_node(&self, id: NodeId) {
        let in_transition = self.active_transition().is_some();
        if in_transition {
            self.mark_zombie(id);
            return;
        }
        self.dispose_node_now(id);
    }

    /// Commits `node`'s pending cell value (the write becomes the committed value), via its
    /// type-erased [`crate::node::PendingOps`]. A no-op for nodes without transition-aware writes.
    pub(crate) fn commit_pending_cell(&self, node: NodeId) {
        let parts = self
            .nodes
            .borrow()
            .get(node)
            .map(|n| (n.pending_ops.clone(), n.value.clone()));
        if let Some((Some(ops), value)) = parts {
            ops.commit(&value);
        }
    }

    /// Discards `node`'s pending cell value (reverts to the last committed value), via its
    /// type-erased [`crate::node::PendingOps`]. A no-op for nodes without transition-aware writes.
    pub(crate) fn revert_pending_cell(&self, node: NodeId) {
        let parts = self
            .nodes
            .borrow()
            .get(node)
            .map(|n| (n.pending_ops.clone(), n.value.clone()));
        if let Some((Some(ops), value)) = parts {
            ops.revert(&value);
        }
    }

    fn mark_zombie(&self, id: NodeId) {
        let height = {
            let mut nodes = self.nodes.borrow_mut();
            let Some(node) = nodes.get_mut(id) else {
                return;
            };
            node.flags.insert(ReactiveFlags::ZOMBIE);
            node.height
        };
        self.heaps.borrow_mut().zombie.insert(id, height);
    }

    pub(crate) fn dispose_node_now(&self, id: NodeId) {
        let (children, cleanups, sources, height) = {
            let mut nodes = self.nodes.borrow_mut();
            let Some(node) = nodes.get_mut(id) else {
                return;
            };
            node.state = NodeState::Disposed;
            let children = std::mem::take(&mut node.children);
            let cleanups = std::mem::take(&mut node.cleanups);
            let sources = std::mem::take(&mut node.sources);
            let height = node.height;
            (children, cleanups, sources, height)
        };
        for child in children {
            self.dispose_node_now(child);
        }
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
        for source in &sources {
            let callback = {
                let mut nodes = self.nodes.borrow_mut();
                let Some(source_node) = nodes.get_mut(*source) else {
                    continue;
                };
                source_node.remove_subscriber(id);
                if source_node.subscribers.is_empty() {
                    source_node.unobserved.clone()
                } else {
                    None
                }
            };
            if let Some(callback) = callback {
                callback();
            }
        }
        let subscribers = self
            .nodes
            .borrow()
            .get(id)
            .map(|n| n.subscribers.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        for sub in subscribers {
            if let Some(sub_node) = self.nodes.borrow_mut().get_mut(sub) {
                sub_node.sources.retain(|s| *s != id);
            }
        }
        self.heaps.borrow_mut().dirty.remove(id, height);
        self.heaps.borrow_mut().zombie.remove(id, height);
        self.contexts.borrow_mut().remove(id);
        self.nodes.borrow_mut().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_monotonically() {
        with_runtime(|rt| {
            let a = rt.tick_clock();
            let b = rt.tick_clock();
            assert!(b > a);
        });
    }

    #[test]
    fn height_rises_strictly_along_a_dependency_chain() {
        use crate::{computed::Memo, owner::Owner, signal::RwSignal, traits::Get};

        let (_owner, _) = Owner::new(|| {
            let root = RwSignal::new(1);
            let a = Memo::new(move |_| root.get() + 1);
            let b = Memo::new(move |_| a.get() + 1);
            assert_eq!(b.get(), 3);

            with_runtime(|rt| {
                let height_of = |node: NodeId| rt.nodes.borrow().get(node).map(|n| n.height).unwrap_or(0);
                let root_h = height_of(root.node_id());
                let a_h = height_of(a.node_id());
                let b_h = height_of(b.node_id());
                assert!(a_h > root_h);
                assert!(b_h > a_h);
            });
        });
    }
}
