//! The node record and the small value types that hang off it.
//!
//! Storage layout is deliberately the simplest thing that satisfies the graph's invariants: a
//! single `slotmap`-keyed arena of [`Node`] records, each holding a type-erased value cell, an
//! ordered dependency list, an insertion-ordered subscriber set, and the ownership-tree links.
//! Hot paths (mark, recompute) branch on [`NodeKind`]; cold paths (disposal bookkeeping,
//! diagnostics) read the rest.

use crate::{
    height::HeightHeap,
    optimistic::LaneId,
    scheduler::QueueId,
    transition::TransitionId,
};
use indexmap::IndexSet;
use rustc_hash::FxHasher;
use std::{any::Any, cell::RefCell, fmt, hash::BuildHasherDefault, rc::Rc};

/// Insertion-ordered subscriber/dependency set, matching the teacher's `FxIndexSet` (see
/// `leptos_reactive::runtime::Runtime::node_subscribers`). Order matters: mark propagation and
/// height-heap traversal both rely on insertion order for deterministic tie-breaking.
pub(crate) type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

slotmap::new_key_type! {
    /// Stable identity for a reactive node in the arena. Generation-tagged by `slotmap`, so a
    /// disposed and recycled slot never aliases a live handle.
    pub struct NodeId;
}

/// A type-erased equality comparator. `None` on a node means "always write"; `Some(f)` dedupes
/// writes whose old/new values compare equal.
pub(crate) type EqualsFn = Rc<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// The three node kinds. `Effect` subsumes both "render" and "user" effects, distinguished by
/// [`EffectKind`].
pub(crate) enum NodeKind {
    Signal,
    Computed,
    Effect(EffectKind),
    /// A detached ownership scope with no reactive value of its own (`Owner::new`'s root). Storage
    /// layout is otherwise the implementer's choice; reusing the node arena for bare owner scopes
    /// avoids a second disposal tree.
    Root,
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Signal => write!(f, "Signal"),
            NodeKind::Computed => write!(f, "Computed"),
            NodeKind::Effect(k) => write!(f, "Effect({k:?})"),
            NodeKind::Root => write!(f, "Root"),
        }
    }
}

/// Which effect phase a node's side effect belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EffectKind {
    /// Runs in the `render` bucket, before `user`.
    Render,
    /// Runs in the `user` bucket, after `render`.
    User,
}

/// `clean < check < dirty < disposed`; `mark_*` only ever raises this, never lowers it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeState {
    Clean,
    Check,
    Dirty,
    Disposed,
}

bitflags::bitflags! {
    /// Bits describing the *meaning* of the current value, orthogonal to recompute state.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct StatusFlags: u8 {
        const PENDING = 0b001;
        const ERROR = 0b010;
        const UNINITIALIZED = 0b100;
    }
}

bitflags::bitflags! {
    /// Internal bookkeeping bits that gate re-entrant recomputation.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct ReactiveFlags: u8 {
        const RECOMPUTING_DEPS = 0b0001;
        const ZOMBIE = 0b0010;
    }
}

/// Outcome of a single compute-function invocation, reported back to the recomputer.
pub(crate) enum ComputeOutcome {
    /// The committed value changed; subscribers must be pushed to the dirty heap.
    Changed,
    /// The compute ran but produced an `equals`-equivalent value.
    Unchanged,
    /// The compute function is still waiting on an async result.
    Pending,
    /// The compute function raised a non-`NotReady` error — either a caught panic or (in the
    /// future) an explicit fallible compute. Carries the payload so `error_payload` can surface
    /// the real message instead of a placeholder.
    Error(crate::error::AnyPayload),
}

/// Type-erased compute function, implemented generically per node type by [`crate::signal`],
/// [`crate::computed`], and [`crate::effect`]. Mirrors the teacher's `AnyComputation` trait
/// (`leptos_reactive::effect::AnyComputation`), generalized to report [`ComputeOutcome`] instead
/// of a bare `bool` so the recomputer can distinguish "unchanged" from "pending"/"error".
pub(crate) trait AnyComputation {
    fn run(&self, node: NodeId, value: &RefCell<Option<Rc<dyn Any>>>) -> ComputeOutcome;
}

/// A node's type-erased value slot. Wrapped in its own `Rc` (matching
/// `leptos_reactive::node::ReactiveNode::value: Rc<RefCell<dyn Any>>`) so the recomputer can clone
/// it out of the node arena's borrow and hand it to [`AnyComputation::run`] without holding that
/// borrow across a call that may itself need to re-borrow the arena (to track reads).
pub(crate) type ValueCell = Rc<RefCell<Option<Rc<dyn Any>>>>;

/// Type-erased commit/revert for a node's [`crate::cell::CellValue`], used by transition close to
/// apply or discard a pending write without knowing the node's concrete value type. Implemented
/// generically by the typed wrapper in [`crate::signal`] that created the node.
pub(crate) trait PendingOps {
    fn commit(&self, value: &ValueCell);
    fn revert(&self, value: &ValueCell);
}

/// The reactive node record. Lives in `Runtime::nodes`; referenced everywhere else by
/// [`NodeId`].
pub(crate) struct Node {
    pub kind: NodeKind,
    /// Type-erased committed value. The `Rc<dyn Any>` this cell holds, once downcast by the typed
    /// wrapper that created this node, is itself an `Rc<RefCell<CellValue<T>>>` (see
    /// `crate::signal`/`crate::computed`) — one erasure layer for storage, one real `RefCell` for
    /// the transition-aware commit/pending/revert machinery in [`crate::cell`].
    pub value: ValueCell,
    pub equals: Option<EqualsFn>,
    pub state: NodeState,
    pub status: StatusFlags,
    pub flags: ReactiveFlags,
    pub height: u32,
    /// Ordered dependency list, reused across recomputes rather than rebuilt from scratch.
    pub sources: Vec<NodeId>,
    /// Insertion-ordered, deduplicated subscriber set. Order matters: mark propagation and
    /// height-heap traversal break ties by insertion order.
    pub subscribers: FxIndexSet<NodeId>,
    pub owner: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub compute: Option<Rc<dyn AnyComputation>>,
    /// Type-erased commit/revert for this node's pending cell, if it has transition-aware writes
    /// (signals do; plain effects and computeds don't).
    pub pending_ops: Option<Rc<dyn PendingOps>>,
    pub cleanups: Vec<Box<dyn FnOnce()>>,
    pub queue: QueueId,
    pub transition: Option<TransitionId>,
    pub lane: Option<LaneId>,
    pub time: u64,
    pub unobserved: Option<Rc<dyn Fn()>>,
    pub name: Option<&'static str>,
    /// The height bucket this node currently sits in within `Runtime`'s dirty heap, or `None` if
    /// it isn't enqueued. `track()`'s height-raising (`Runtime::raise_height`) can change a
    /// node's `height` after it was already enqueued at the old one; keeping the actual bucket
    /// recorded here lets the raise relocate it instead of leaving a second, stale entry behind
    /// (which would otherwise let the node get popped, and recomputed, twice in one drain).
    pub dirty_heap_height: Option<u32>,
    /// The payload of the last compute-time failure, if this node's status carries `error`.
    pub error_payload: Option<crate::error::AnyPayload>,
    /// Bumped every time an async-derived's source future is (re)spawned, so a superseded
    /// evaluation's late completion can tell it isn't the current one and drop its result instead
    /// of clobbering a fresher value.
    pub async_generation: u64,
}

impl Node {
    pub fn add_subscriber(&mut self, sub: NodeId) -> bool {
        self.subscribers.insert(sub)
    }

    pub fn remove_subscriber(&mut self, sub: NodeId) {
        // `shift_remove` keeps the remaining entries in insertion order; subscriber sets are
        // small enough that the O(n) shift is cheaper than the reordering `swap_remove` causes.
        self.subscribers.shift_remove(&sub);
    }

    pub fn is_computed_like(&self) -> bool {
        matches!(self.kind, NodeKind::Computed | NodeKind::Effect(_))
    }
}

/// The two height-indexed heaps a runtime keeps: `dirty` for ordinary recompute work and
/// `zombie` for nodes disposed mid-transition but still needed to observe completion.
pub(crate) struct Heaps {
    pub dirty: HeightHeap,
    pub zombie: HeightHeap,
}

impl Heaps {
    pub fn new() -> Self {
        Self {
            dirty: HeightHeap::new(),
            zombie: HeightHeap::new(),
        }
    }
}
