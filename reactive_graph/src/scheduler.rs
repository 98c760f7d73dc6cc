//! The queue tree: nested per-boundary buckets of pending pure/render/user work, drained by
//! [`crate::runtime::Runtime::flush`].

use crate::node::NodeId;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Identifies one queue. The root queue (returned by [`Queues::root`]) is the global queue;
    /// every boundary introduces a nested child queue for its subtree's effects.
    pub struct QueueId;
}

/// One effect phase's FIFO backlog. A plain `Vec` is enough here — phase buckets are drained
/// front-to-back and may grow mid-drain as effects re-enqueue themselves or their children.
#[derive(Default)]
pub(crate) struct Bucket(Vec<NodeId>);

impl Bucket {
    pub fn push(&mut self, node: NodeId) {
        if !self.0.contains(&node) {
            self.0.push(node);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn take(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.0)
    }
}

/// One node in the queue tree. `pure` runs between recompute and effects; `render` and `user` are
/// the two effect phases, drained in that order.
#[derive(Default)]
pub(crate) struct Queue {
    pub parent: Option<QueueId>,
    pub pure: Bucket,
    pub render: Bucket,
    pub user: Bucket,
}

pub(crate) struct Queues {
    slots: SlotMap<QueueId, Queue>,
    root: QueueId,
}

impl Queues {
    pub fn new() -> Self {
        let mut slots = SlotMap::with_key();
        let root = slots.insert(Queue::default());
        Self { slots, root }
    }

    pub fn root(&self) -> QueueId {
        self.root
    }

    pub fn create_child(&mut self, parent: QueueId) -> QueueId {
        self.slots.insert(Queue {
            parent: Some(parent),
            ..Queue::default()
        })
    }

    pub fn get(&self, id: QueueId) -> Option<&Queue> {
        self.slots.get(id)
    }

    pub fn get_mut(&mut self, id: QueueId) -> Option<&mut Queue> {
        self.slots.get_mut(id)
    }

    pub fn remove(&mut self, id: QueueId) {
        if id != self.root {
            self.slots.remove(id);
        }
    }
}

use crate::{
    node::{EffectKind, NodeKind},
    runtime::Runtime,
};
use tracing::{instrument, trace};

impl Runtime {
    /// Pushes an effect node into its queue's `render` or `user` bucket, per its [`EffectKind`],
    /// and makes sure a flush is scheduled to drain it.
    pub(crate) fn enqueue_effect(&self, node: NodeId) {
        let (queue, kind) = {
            let nodes = self.nodes.borrow();
            match nodes.get(node) {
                Some(n) => match n.kind {
                    NodeKind::Effect(kind) => (n.queue, kind),
                    _ => return,
                },
                None => return,
            }
        };
        if let Some(q) = self.queues.borrow_mut().get_mut(queue) {
            match kind {
                EffectKind::Render => q.render.push(node),
                EffectKind::User => q.user.push(node),
            }
        }
        self.schedule_flush();
    }

    /// Synchronous drain: empties the dirty heap, runs pending transition bookkeeping, then
    /// drains the pure bucket followed by render and user effect buckets (both may repopulate
    /// mid-drain; each is drained to exhaustion before moving to the next).
    ///
    /// Re-entrant calls (a `flush()` triggered from inside an effect) are no-ops; the outer call
    /// already owns the drain and will pick up the new work on its next loop iteration.
    #[instrument(level = "debug", skip(self))]
    pub fn flush(&self) {
        if self.scheduler_running_flag() {
            trace!("flush re-entered; deferring to the outer drain");
            return;
        }
        self.set_scheduler_running(true);
        loop {
            self.set_scheduled(false);
            self.drain_dirty_heap();

            if let Some(transition) = self.active_transition() {
                if !self.transition_ready_to_close(transition) {
                    self.drain_zombie_heap();
                    self.tick_clock_pub();
                    self.schedule_flush();
                    self.set_scheduler_running(false);
                    return;
                }
                self.close_transition(transition);
            }

            self.drain_pure_bucket(self.queues.borrow().root());
            self.tick_clock_pub();
            self.drain_effect_buckets(self.queues.borrow().root());

            if !self.scheduled_flag() {
                break;
            }
        }
        self.set_scheduler_running(false);
    }

    fn drain_pure_bucket(&self, queue: QueueId) {
        let nodes = self
            .queues
            .borrow_mut()
            .get_mut(queue)
            .map(|q| q.pure.take())
            .unwrap_or_default();
        for node in nodes {
            self.update_if_necessary(node);
        }
    }

    fn drain_effect_buckets(&self, queue: QueueId) {
        loop {
            let render = self
                .queues
                .borrow_mut()
                .get_mut(queue)
                .map(|q| q.render.take())
                .unwrap_or_default();
            for node in &render {
                self.update_if_necessary(*node);
            }
            let user = self
                .queues
                .borrow_mut()
                .get_mut(queue)
                .map(|q| q.user.take())
                .unwrap_or_default();
            for node in &user {
                self.update_if_necessary(*node);
            }
            let empty = self
                .queues
                .borrow()
                .get(queue)
                .map(|q| q.render.is_empty() && q.user.is_empty())
                .unwrap_or(true);
            if empty {
                break;
            }
        }
    }
}
