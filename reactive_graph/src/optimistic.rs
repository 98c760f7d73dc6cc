//! Optimistic lanes: per-write tags that let a provisional value propagate through the graph and
//! revert cleanly when the owning transition closes without committing it.

use crate::transition::TransitionId;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Identifies one optimistic-write lane.
    pub struct LaneId;
}

/// A lane's record. Lanes form a union-find forest via `merged_into`, so two lanes discovered to
/// be propagating through the same convergent node can be treated as one without rewriting every
/// node's lane tag.
pub(crate) struct Lane {
    pub transition: TransitionId,
    /// Root of the union-find chain this lane has been merged into, if any.
    merged_into: Option<LaneId>,
}

impl Lane {
    fn new(transition: TransitionId) -> Self {
        Self {
            transition,
            merged_into: None,
        }
    }
}

/// Owns every lane created so far. Lives on [`crate::runtime::Runtime`].
#[derive(Default)]
pub(crate) struct Lanes {
    lanes: SlotMap<LaneId, Lane>,
}

impl Lanes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, transition: TransitionId) -> LaneId {
        self.lanes.insert(Lane::new(transition))
    }

    /// Path-compressing find: walks `merged_into` to the root and rewrites every visited lane to
    /// point straight at it.
    pub fn find(&mut self, lane: LaneId) -> LaneId {
        let mut root = lane;
        while let Some(next) = self.lanes.get(root).and_then(|l| l.merged_into) {
            root = next;
        }
        let mut cur = lane;
        while cur != root {
            let next = self.lanes[cur].merged_into.expect("path to root exists");
            self.lanes[cur].merged_into = Some(root);
            cur = next;
        }
        root
    }

    /// Merges `from` into `to` (both resolved to their current roots first). No-op if already the
    /// same lane.
    pub fn merge(&mut self, from: LaneId, to: LaneId) {
        let from_root = self.find(from);
        let to_root = self.find(to);
        if from_root != to_root {
            self.lanes[from_root].merged_into = Some(to_root);
        }
    }

    pub fn transition_of(&mut self, lane: LaneId) -> TransitionId {
        let root = self.find(lane);
        self.lanes[root].transition
    }

    pub fn is_live(&self, lane: LaneId) -> bool {
        self.lanes.contains_key(lane)
    }

    /// Drops every lane whose root is `root` (called when that root's owning transition closes).
    pub fn retain_not_rooted_at(&mut self, dead_roots: &[LaneId]) {
        self.lanes.retain(|id, lane| {
            let mut cur = id;
            loop {
                if dead_roots.contains(&cur) {
                    break false;
                }
                match lane.merged_into {
                    Some(next) => cur = next,
                    None => break true,
                }
            }
        });
    }
}

/// Resolves a node's existing lane tag against an incoming optimistic write's lane.
///
/// `node_has_own_override` distinguishes a node that merely inherited its lane tag from upstream
/// propagation (no override of its own — safe to fold into the incoming lane) from one that
/// received its own optimistic write (keep its lane independent so its `isPending` resolves on
/// its own schedule).
pub(crate) fn resolve_incoming(
    lanes: &mut Lanes,
    active: &[LaneId],
    existing: Option<LaneId>,
    incoming: LaneId,
    node_has_own_override: bool,
) -> Option<LaneId> {
    match existing {
        None => Some(incoming),
        Some(existing) => {
            let existing_root = lanes.find(existing);
            if !active.contains(&existing_root) {
                Some(incoming)
            } else if node_has_own_override {
                Some(existing)
            } else {
                lanes.merge(existing_root, incoming);
                Some(incoming)
            }
        }
    }
}
