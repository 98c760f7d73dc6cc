//! Effects: side-effectful sinks that run eagerly on creation and again whenever a tracked
//! dependency changes, driven by the render/user queue buckets rather than the height heap (see
//! the note in [`crate::mark`]).

use crate::{
    cell::CellValue,
    node::{AnyComputation, ComputeOutcome, EqualsFn, FxIndexSet, Node, NodeId, NodeKind, NodeState, ReactiveFlags, StatusFlags, ValueCell, EffectKind},
    runtime::with_runtime,
    traits::Dispose,
};
use std::{any::Any, cell::RefCell, marker::PhantomData, rc::Rc};

fn erase<T: 'static>(cell: Rc<RefCell<CellValue<T>>>) -> ValueCell {
    Rc::new(RefCell::new(Some(cell as Rc<dyn Any>)))
}

struct EffectComputation<F> {
    f: RefCell<F>,
}

impl<F: FnMut() + 'static> AnyComputation for EffectComputation<F> {
    fn run(&self, _node: NodeId, _value: &RefCell<Option<Rc<dyn Any>>>) -> ComputeOutcome {
        (*self.f.borrow_mut())();
        ComputeOutcome::Changed
    }
}

struct RenderEffectComputation<T, F> {
    f: RefCell<F>,
    _marker: PhantomData<T>,
}

impl<T, F> AnyComputation for RenderEffectComputation<T, F>
where
    T: 'static,
    F: FnMut(Option<T>) -> T + 'static,
{
    fn run(&self, _node: NodeId, value: &RefCell<Option<Rc<dyn Any>>>) -> ComputeOutcome {
        let erased = value.borrow().clone();
        let cell: Rc<RefCell<CellValue<T>>> = match erased {
            Some(e) => e.downcast().unwrap_or_else(|_| panic!("render effect value type mismatch")),
            None => {
                let fresh = Rc::new(RefCell::new(CellValue::NotSet));
                *value.borrow_mut() = Some(fresh.clone() as Rc<dyn Any>);
                fresh
            }
        };
        let prev = std::mem::replace(&mut *cell.borrow_mut(), CellValue::NotSet).into_committed();
        let mut f = self.f.borrow_mut();
        let new_value = (*f)(prev);
        cell.borrow_mut().set(new_value);
        ComputeOutcome::Changed
    }
}

/// A user-phase effect: runs once on creation, then again after each flush in which one of its
/// tracked dependencies changed. Dropped effects are not auto-disposed (matching the teacher's
/// `mem::forget` idiom in tests) — call [`Dispose::dispose`] to stop one early.
pub struct Effect(NodeId);

impl Effect {
    pub fn new(f: impl FnMut() + 'static) -> Self {
        let owner = with_runtime(|rt| rt.current_owner());
        let node = with_runtime(|rt| {
            rt.insert_node(Node {
                kind: NodeKind::Effect(EffectKind::User),
                value: Rc::new(RefCell::new(None)),
                equals: None::<EqualsFn>,
                state: NodeState::Dirty,
                status: StatusFlags::empty(),
                flags: ReactiveFlags::empty(),
                height: 0,
                sources: Vec::new(),
                subscribers: FxIndexSet::default(),
                owner,
                children: Vec::new(),
                compute: Some(Rc::new(EffectComputation { f: RefCell::new(f) })),
                pending_ops: None,
                cleanups: Vec::new(),
                queue: rt.queues.borrow().root(),
                transition: None,
                lane: None,
                time: rt.clock(),
                unobserved: None,
                name: None,
                dirty_heap_height: None,
                error_payload: None,
                async_generation: 0,
            })
        });
        with_runtime(|rt| rt.ensure_updated(node));
        Self(node)
    }
}

impl Dispose for Effect {
    fn dispose(self) {
        with_runtime(|rt| rt.dispose_node(self.0));
    }
}

/// A render-phase effect, threading its own previously-returned value through each run (for
/// effects that need to diff against what they last produced, e.g. DOM patching). Runs in the
/// `render` bucket, strictly before any `user`-phase effect in the same flush.
pub struct RenderEffect<T>(NodeId, PhantomData<T>);

impl<T: 'static> RenderEffect<T> {
    pub fn new(f: impl FnMut(Option<T>) -> T + 'static) -> Self {
        let owner = with_runtime(|rt| rt.current_owner());
        let node = with_runtime(|rt| {
            rt.insert_node(Node {
                kind: NodeKind::Effect(EffectKind::Render),
                value: erase(Rc::new(RefCell::new(CellValue::<T>::NotSet))),
                equals: None::<EqualsFn>,
                state: NodeState::Dirty,
                status: StatusFlags::empty(),
                flags: ReactiveFlags::empty(),
                height: 0,
                sources: Vec::new(),
                subscribers: FxIndexSet::default(),
                owner,
                children: Vec::new(),
                compute: Some(Rc::new(RenderEffectComputation {
                    f: RefCell::new(f),
                    _marker: PhantomData,
                })),
                pending_ops: None,
                cleanups: Vec::new(),
                queue: rt.queues.borrow().root(),
                transition: None,
                lane: None,
                time: rt.clock(),
                unobserved: None,
                name: None,
                dirty_heap_height: None,
                error_payload: None,
                async_generation: 0,
            })
        });
        with_runtime(|rt| rt.ensure_updated(node));
        Self(node, PhantomData)
    }
}

impl<T> Dispose for RenderEffect<T> {
    fn dispose(self) {
        with_runtime(|rt| rt.dispose_node(self.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{owner::Owner, signal::RwSignal, traits::{Get, Set}};
    use any_spawner::Executor;
    use std::{cell::RefCell as StdRefCell, rc::Rc as StdRc};
    use tokio::task::LocalSet;

    // A dirtied effect re-enqueues itself through `schedule_flush`, which spawns a microtask
    // on the global executor — so every effect test needs one initialized and, for tokio's
    // `spawn_local`, an active `LocalSet` to spawn into, same as the teacher's own effect tests.
    #[tokio::test]
    async fn effect_runs_immediately_and_on_change() {
        _ = Executor::init_tokio();
        LocalSet::new()
            .run_until(async {
                let (_owner, _) = Owner::new(|| {
                    let a = RwSignal::new(1);
                    let seen = StdRc::new(StdRefCell::new(Vec::new()));
                    let seen2 = seen.clone();
                    let effect = Effect::new(move || {
                        seen2.borrow_mut().push(a.get());
                    });
                    assert_eq!(*seen.borrow(), vec![1]);
                    a.set(2);
                    with_runtime(|rt| rt.flush());
                    assert_eq!(*seen.borrow(), vec![1, 2]);
                    effect.dispose();
                });
            })
            .await;
    }
}
