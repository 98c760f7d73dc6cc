//! Computeds: lazy, pull-based derived values. [`Memo`] recomputes synchronously and filters by
//! equality; [`AsyncDerived`] recomputes by polling a spawned future and reports `pending` in the
//! interim, the way `leptos_reactive::resource`'s `AsyncDerived` does.

use crate::{
    cell::CellValue,
    error::ReactiveError,
    executor,
    node::{AnyComputation, ComputeOutcome, EqualsFn, FxIndexSet, Node, NodeId, NodeKind, NodeState, ReactiveFlags, StatusFlags, ValueCell},
    runtime::with_runtime,
    traits::{Dispose, Get, GetUntracked, IsPending, OnUnobserved, Read, Refresh, Track, With, WithUntracked},
};
use std::{any::Any, cell::RefCell, fmt, future::Future, marker::PhantomData, rc::Rc};

fn typed<T: 'static>(value: &RefCell<Option<Rc<dyn Any>>>) -> Rc<RefCell<CellValue<T>>> {
    let erased = value.borrow().clone().expect("computed value cell is always populated");
    erased
        .downcast::<RefCell<CellValue<T>>>()
        .unwrap_or_else(|_| panic!("computed value type mismatch"))
}

fn erase<T: 'static>(cell: Rc<RefCell<CellValue<T>>>) -> ValueCell {
    Rc::new(RefCell::new(Some(cell as Rc<dyn Any>)))
}

struct MemoComputation<T, F> {
    f: RefCell<F>,
    _marker: PhantomData<T>,
}

impl<T, F> AnyComputation for MemoComputation<T, F>
where
    T: PartialEq + 'static,
    F: FnMut(Option<&T>) -> T + 'static,
{
    fn run(&self, _node: NodeId, value: &RefCell<Option<Rc<dyn Any>>>) -> ComputeOutcome {
        let erased = value.borrow().clone();
        let cell: Rc<RefCell<CellValue<T>>> = match erased {
            Some(e) => e.downcast().unwrap_or_else(|_| panic!("memo value type mismatch")),
            None => {
                let fresh = Rc::new(RefCell::new(CellValue::NotSet));
                *value.borrow_mut() = Some(fresh.clone() as Rc<dyn Any>);
                fresh
            }
        };

        let mut f = self.f.borrow_mut();
        let new_value = {
            let guard = cell.borrow();
            let prev = guard.committed();
            (*f)(prev)
        };

        let mut guard = cell.borrow_mut();
        match guard.committed() {
            Some(prev) if *prev == new_value => ComputeOutcome::Unchanged,
            _ => {
                guard.set(new_value);
                ComputeOutcome::Changed
            }
        }
    }
}

fn new_memo_node<T, F>(owner: Option<NodeId>, f: F) -> NodeId
where
    T: PartialEq + 'static,
    F: FnMut(Option<&T>) -> T + 'static,
{
    with_runtime(|rt| {
        rt.insert_node(Node {
            kind: NodeKind::Computed,
            value: erase(Rc::new(RefCell::new(CellValue::<T>::NotSet))),
            equals: None::<EqualsFn>,
            state: NodeState::Dirty,
            status: StatusFlags::UNINITIALIZED,
            flags: ReactiveFlags::empty(),
            height: 0,
            sources: Vec::new(),
            subscribers: FxIndexSet::default(),
            owner,
            children: Vec::new(),
            compute: Some(Rc::new(MemoComputation {
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
    })
}

fn read_memo<T: Clone + 'static>(node: NodeId) -> Result<T, ReactiveError> {
    with_runtime(|rt| {
        rt.track(node);
        rt.ensure_updated(node);
        if let Some(err) = rt.read_error(node) {
            return Err(err);
        }
        if let Some(err) = rt.error_payload(node) {
            return Err(err);
        }
        let value = rt
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.value.clone())
            .ok_or(ReactiveError::NoOwner)?;
        typed::<T>(&value)
            .borrow()
            .committed()
            .cloned()
            .ok_or(ReactiveError::NotReady { source: node })
    })
}

/// An owner-scoped, lazily-recomputed derived value.
pub struct Memo<T>(NodeId, PhantomData<T>);
impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Memo<T> {}
impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Memo").field(&self.0).finish()
    }
}

impl<T: PartialEq + 'static> Memo<T> {
    pub fn new(f: impl FnMut(Option<&T>) -> T + 'static) -> Self {
        let owner = with_runtime(|rt| rt.current_owner());
        Self(new_memo_node(owner, f), PhantomData)
    }
}

impl<T> Memo<T> {
    pub(crate) fn node_id(&self) -> NodeId {
        self.0
    }
}

impl<T: Clone + 'static> Get for Memo<T> {
    type Value = T;
    fn get(&self) -> T {
        self.try_get().expect("memo has been disposed or errored")
    }
    fn try_get(&self) -> Result<T, ReactiveError> {
        read_memo(self.0)
    }
}

impl<T: Clone + 'static> GetUntracked for Memo<T> {
    type Value = T;
    fn get_untracked(&self) -> T {
        with_runtime(|rt| rt.untrack(|| self.get()))
    }
}

impl<T: Clone + 'static> With for Memo<T> {
    type Value = T;
    fn try_with<U>(&self, f: impl FnOnce(&T) -> U) -> Option<U> {
        self.try_get().ok().map(|v| f(&v))
    }
}

impl<T: Clone + 'static> WithUntracked for Memo<T> {
    type Value = T;
    fn try_with_untracked<U>(&self, f: impl FnOnce(&T) -> U) -> Option<U> {
        with_runtime(|rt| rt.untrack(|| self.try_with(f)))
    }
}

impl<T: Clone + 'static> Read for Memo<T> {
    type Value = T;
    type Guard<'a> = crate::signal::CloneGuard<T>;
    fn try_read(&self) -> Option<Self::Guard<'_>> {
        self.try_get().ok().map(crate::signal::CloneGuard)
    }
}

impl<T: 'static> Track for Memo<T> {
    fn track(&self) {
        with_runtime(|rt| rt.track(self.0));
    }
}

impl<T: 'static> Dispose for Memo<T> {
    fn dispose(self) {
        with_runtime(|rt| rt.dispose_node(self.0));
    }
}

impl<T: 'static> IsPending for Memo<T> {
    fn is_pending(&self) -> bool {
        with_runtime(|rt| rt.status_of(self.0).contains(StatusFlags::PENDING))
    }
}

impl<T: 'static> Refresh for Memo<T> {
    fn refresh(&self) -> crate::RefreshToken {
        with_runtime(|rt| rt.refresh(self.0))
    }
}

impl<T: 'static> OnUnobserved for Memo<T> {
    fn on_unobserved(&self, callback: impl Fn() + 'static) {
        with_runtime(|rt| rt.set_unobserved(self.0, Rc::new(callback)));
    }
}

/// A reference-counted counterpart to [`Memo`], disposed when its last clone drops.
pub struct ArcMemo<T> {
    node: Rc<ArcMemoInner>,
    _marker: PhantomData<T>,
}

impl<T> Clone for ArcMemo<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            _marker: PhantomData,
        }
    }
}

struct ArcMemoInner(NodeId);

impl Drop for ArcMemoInner {
    fn drop(&mut self) {
        with_runtime(|rt| rt.dispose_node(self.0));
    }
}

impl<T: PartialEq + 'static> ArcMemo<T> {
    pub fn new(f: impl FnMut(Option<&T>) -> T + 'static) -> Self {
        let node = new_memo_node(None, f);
        Self {
            node: Rc::new(ArcMemoInner(node)),
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + 'static> Get for ArcMemo<T> {
    type Value = T;
    fn get(&self) -> T {
        self.try_get().expect("memo has been disposed or errored")
    }
    fn try_get(&self) -> Result<T, ReactiveError> {
        read_memo(self.node.0)
    }
}

impl<T: Clone + 'static> Read for ArcMemo<T> {
    type Value = T;
    type Guard<'a> = crate::signal::CloneGuard<T>;
    fn try_read(&self) -> Option<Self::Guard<'_>> {
        self.try_get().ok().map(crate::signal::CloneGuard)
    }
}

impl<T: 'static> IsPending for ArcMemo<T> {
    fn is_pending(&self) -> bool {
        with_runtime(|rt| rt.status_of(self.node.0).contains(StatusFlags::PENDING))
    }
}

impl<T: 'static> Refresh for ArcMemo<T> {
    fn refresh(&self) -> crate::RefreshToken {
        with_runtime(|rt| rt.refresh(self.node.0))
    }
}

impl<T: 'static> OnUnobserved for ArcMemo<T> {
    fn on_unobserved(&self, callback: impl Fn() + 'static) {
        with_runtime(|rt| rt.set_unobserved(self.node.0, Rc::new(callback)));
    }
}

// ---- async derived ---------------------------------------------------------------------------

/// A spawned future's eventual result written back into a node's value cell, outside of any
/// recompute call, the way `leptos_reactive::resource::AsyncDerived` updates after its source
/// future resolves on a background task.
struct AsyncComputation<T, F> {
    source: RefCell<F>,
    _marker: PhantomData<T>,
}

impl<T, F, Fut> AnyComputation for AsyncComputation<T, F>
where
    T: 'static,
    Fut: Future<Output = T> + 'static,
    F: FnMut() -> Fut + 'static,
{
    fn run(&self, node: NodeId, value: &RefCell<Option<Rc<dyn Any>>>) -> ComputeOutcome {
        // Called inside `Runtime::recompute`'s `with_observer(Some(node))`, so any signal read
        // while building the future here is tracked normally.
        let fut = (*self.source.borrow_mut())();
        let value_cell = typed::<T>(value);
        // Bumping the generation here, before the future is even polled once, means a stale
        // in-flight evaluation that resolves after a newer one was spawned can tell it no longer
        // owns this node and drop its result instead of clobbering the fresher value.
        let generation = with_runtime(|rt| {
            if let Some(n) = rt.nodes.borrow_mut().get_mut(node) {
                n.async_generation += 1;
                n.async_generation
            } else {
                0
            }
        });
        // If a transition is active, it waits on this node the way it waits on any other
        // in-flight async work (`Transition::async_nodes`) before it's allowed to close.
        let transition = with_runtime(|rt| {
            let transition = rt.active_transition();
            if let Some(t) = transition {
                rt.track_async_node(t, node);
            }
            transition
        });
        executor::spawn_local(async move {
            let resolved = fut.await;
            with_runtime(|rt| {
                let current = rt.nodes.borrow().get(node).map(|n| n.async_generation);
                if current != Some(generation) {
                    // Superseded by a newer evaluation (or the node was disposed); the newer one
                    // (or disposal) owns this node's completion now.
                    return;
                }
                value_cell.borrow_mut().set(resolved);
                if let Some(n) = rt.nodes.borrow_mut().get_mut(node) {
                    n.status.remove(StatusFlags::PENDING | StatusFlags::UNINITIALIZED);
                }
                if let Some(t) = transition {
                    rt.untrack_async_node(t, node);
                }
                // Notify subscribers directly rather than `mark_dirty(node)`: the value just
                // landed out-of-band (not via a fresh `run()`), so re-dirtying this node would
                // make the next flush call `run()` again and respawn the future it just resolved.
                let subs: Vec<NodeId> = rt
                    .nodes
                    .borrow()
                    .get(node)
                    .map(|n| n.subscribers.iter().copied().collect())
                    .unwrap_or_default();
                for sub in subs {
                    rt.mark_dirty(sub);
                }
                rt.schedule_flush();
            });
        });
        ComputeOutcome::Pending
    }
}

/// A derived value computed by polling a spawned, possibly-`!Send` future. Reads see `pending`
/// (surfaced as [`ReactiveError::NotReady`]) until the future resolves for the first time, and
/// again every time a tracked dependency changes and the future is re-spawned.
pub struct AsyncDerived<T>(NodeId, PhantomData<T>);
impl<T> Clone for AsyncDerived<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for AsyncDerived<T> {}

impl<T: 'static> AsyncDerived<T> {
    /// `source` is re-run (via the executor configured by [`crate::executor::Executor`]) every time
    /// one of its tracked dependencies changes; its resolved value becomes the derived's committed
    /// value once the future completes.
    pub fn new<Fut>(source: impl FnMut() -> Fut + 'static) -> Self
    where
        Fut: Future<Output = T> + 'static,
    {
        let owner = with_runtime(|rt| rt.current_owner());
        let node = with_runtime(|rt| {
            rt.insert_node(Node {
                kind: NodeKind::Computed,
                value: erase(Rc::new(RefCell::new(CellValue::<T>::NotSet))),
                equals: None::<EqualsFn>,
                state: NodeState::Dirty,
                status: StatusFlags::PENDING | StatusFlags::UNINITIALIZED,
                flags: ReactiveFlags::empty(),
                height: 0,
                sources: Vec::new(),
                subscribers: FxIndexSet::default(),
                owner,
                children: Vec::new(),
                compute: Some(Rc::new(AsyncComputation {
                    source: RefCell::new(source),
                    _marker: PhantomData::<T>,
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

impl<T: Clone + 'static> Get for AsyncDerived<T> {
    type Value = T;
    fn get(&self) -> T {
        self.try_get().expect("async derived is pending or has been disposed")
    }
    fn try_get(&self) -> Result<T, ReactiveError> {
        read_memo(self.0)
    }
}

impl<T: 'static> Dispose for AsyncDerived<T> {
    fn dispose(self) {
        with_runtime(|rt| rt.dispose_node(self.0));
    }
}

impl<T: 'static> IsPending for AsyncDerived<T> {
    fn is_pending(&self) -> bool {
        with_runtime(|rt| rt.status_of(self.0).contains(StatusFlags::PENDING))
    }
}

impl<T: 'static> Refresh for AsyncDerived<T> {
    fn refresh(&self) -> crate::RefreshToken {
        with_runtime(|rt| rt.refresh(self.0))
    }
}

impl<T: 'static> OnUnobserved for AsyncDerived<T> {
    fn on_unobserved(&self, callback: impl Fn() + 'static) {
        with_runtime(|rt| rt.set_unobserved(self.0, Rc::new(callback)));
    }
}

/// A reference-counted counterpart to [`AsyncDerived`].
pub struct ArcAsyncDerived<T> {
    node: Rc<ArcMemoInner>,
    _marker: PhantomData<T>,
}

impl<T> Clone for ArcAsyncDerived<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + 'static> Get for ArcAsyncDerived<T> {
    type Value = T;
    fn get(&self) -> T {
        self.try_get().expect("async derived is pending or has been disposed")
    }
    fn try_get(&self) -> Result<T, ReactiveError> {
        read_memo(self.node.0)
    }
}

impl<T: 'static> IsPending for ArcAsyncDerived<T> {
    fn is_pending(&self) -> bool {
        with_runtime(|rt| rt.status_of(self.node.0).contains(StatusFlags::PENDING))
    }
}

impl<T: 'static> Refresh for ArcAsyncDerived<T> {
    fn refresh(&self) -> crate::RefreshToken {
        with_runtime(|rt| rt.refresh(self.node.0))
    }
}

impl<T: 'static> OnUnobserved for ArcAsyncDerived<T> {
    fn on_unobserved(&self, callback: impl Fn() + 'static) {
        with_runtime(|rt| rt.set_unobserved(self.node.0, Rc::new(callback)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{owner::Owner, signal::RwSignal, traits::Set};

    #[test]
    fn memo_recomputes_only_on_change() {
        let (_owner, _) = Owner::new(|| {
            let a = RwSignal::new(1);
            let calls = Rc::new(RefCell::new(0));
            let calls2 = calls.clone();
            let memo = Memo::new(move |_| {
                *calls2.borrow_mut() += 1;
                a.get() * 2
            });
            assert_eq!(memo.get(), 2);
            assert_eq!(memo.get(), 2);
            assert_eq!(*calls.borrow(), 1);
            a.set(5);
            assert_eq!(memo.get(), 10);
            assert_eq!(*calls.borrow(), 2);
        });
    }

    #[test]
    fn memo_panic_surfaces_as_a_compute_error_instead_of_unwinding() {
        let (_owner, memo) = Owner::new(|| Memo::new(|_: Option<&i32>| panic!("boom")));

        match memo.try_get() {
            Err(ReactiveError::Compute { payload, .. }) => {
                assert_eq!(payload.to_string(), "boom");
            }
            other => panic!("expected a compute error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn async_derived_is_pending_until_its_future_resolves() {
        use any_spawner::Executor;
        use tokio::task::LocalSet;

        _ = Executor::init_tokio();
        LocalSet::new()
            .run_until(async {
                let (_owner, derived) = Owner::new(|| AsyncDerived::new(|| async { 9 }));

                assert!(derived.is_pending(), "the spawned future hasn't resolved yet");

                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                with_runtime(|rt| rt.flush());

                assert!(!derived.is_pending());
                assert_eq!(derived.get(), 9);
            })
            .await;
    }

    #[tokio::test]
    async fn refresh_respawns_an_async_derived_that_has_already_settled() {
        use any_spawner::Executor;
        use tokio::task::LocalSet;

        _ = Executor::init_tokio();
        LocalSet::new()
            .run_until(async {
                let calls = Rc::new(RefCell::new(0));
                let calls2 = calls.clone();
                let (_owner, derived) = Owner::new(|| {
                    AsyncDerived::new(move || {
                        let calls = calls2.clone();
                        async move {
                            *calls.borrow_mut() += 1;
                            *calls.borrow()
                        }
                    })
                });

                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                with_runtime(|rt| rt.flush());
                assert_eq!(derived.get(), 1);

                derived.refresh();
                with_runtime(|rt| rt.flush());
                assert!(derived.is_pending(), "a refresh re-enters the pending state until it resolves");

                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                with_runtime(|rt| rt.flush());

                assert!(!derived.is_pending());
                assert_eq!(derived.get(), 2, "refresh re-ran the source rather than replaying the cached value");
            })
            .await;
    }

    #[tokio::test]
    async fn async_supersession_drops_a_stale_future_that_resolves_after_a_newer_one() {
        use any_spawner::Executor;
        use futures::channel::oneshot;
        use tokio::task::LocalSet;

        _ = Executor::init_tokio();
        LocalSet::new()
            .run_until(async {
                let trigger = RwSignal::new(0);
                let senders: Rc<RefCell<Vec<oneshot::Sender<i32>>>> = Rc::new(RefCell::new(Vec::new()));
                let senders2 = senders.clone();

                let (_owner, derived) = Owner::new(|| {
                    AsyncDerived::new(move || {
                        let gen = trigger.get();
                        let senders = senders2.clone();
                        async move {
                            let (tx, rx) = oneshot::channel();
                            senders.borrow_mut().push(tx);
                            rx.await.unwrap_or(gen)
                        }
                    })
                });

                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                assert_eq!(senders.borrow().len(), 1, "the first evaluation spawned its future");

                // Re-trigger before the first future resolves; this spawns a second evaluation
                // while the first is still in flight.
                trigger.set(1);
                with_runtime(|rt| rt.flush());
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                assert_eq!(senders.borrow().len(), 2, "the second evaluation spawned its own future");

                // Resolve the newer evaluation first, then the stale one — the opposite of
                // completion order, which is exactly the ordering the generation check guards.
                let newer = senders.borrow_mut().remove(1);
                newer.send(100).expect("receiver still alive");
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                with_runtime(|rt| rt.flush());
                assert_eq!(derived.get(), 100);

                let stale = senders.borrow_mut().remove(0);
                stale.send(1).expect("receiver still alive");
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                with_runtime(|rt| rt.flush());
                assert_eq!(derived.get(), 100, "a stale completion must not clobber the newer value");
            })
            .await;
    }
}
