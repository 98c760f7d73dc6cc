//! Signals: the graph's leaf state. A signal has no compute function — writing to it marks its
//! subscribers dirty directly; reading it tracks but never triggers a recompute of the signal
//! itself.
//!
//! `RwSignal`/`ReadSignal`/`WriteSignal` are `Copy` handles into the arena, disposed with their
//! owning [`crate::owner::Owner`]. The `Arc*` counterparts own their node via reference counting
//! instead: the last clone's drop disposes the node, independent of any owner scope, matching the
//! teacher's split between owner-scoped and reference-counted reactive handles.

use crate::{
    cell::CellValue,
    error::ReactiveError,
    node::{AnyComputation, EqualsFn, FxIndexSet, Node, NodeId, NodeKind, NodeState, PendingOps, ReactiveFlags, StatusFlags, ValueCell},
    runtime::with_runtime,
    traits::{Dispose, Get, GetUntracked, IntoInner, IsPending, OnUnobserved, Read, Refresh, Set, Track, Update, UpdateUntracked, With, WithUntracked, Write},
};
use std::{any::Any, cell::RefCell, fmt, marker::PhantomData, rc::Rc};

fn erase<T: 'static>(cell: Rc<RefCell<CellValue<T>>>) -> ValueCell {
    Rc::new(RefCell::new(Some(cell as Rc<dyn Any>)))
}

fn typed<T: 'static>(value: &RefCell<Option<Rc<dyn Any>>>) -> Rc<RefCell<CellValue<T>>> {
    let erased = value.borrow().clone().expect("signal value cell is always populated");
    erased
        .downcast::<RefCell<CellValue<T>>>()
        .unwrap_or_else(|_| panic!("signal value type mismatch"))
}

/// Builds the `equals` comparator a `*_eq` signal constructor installs on its node: `PartialEq`
/// on the erased value, the default comparator `create_signal`'s optional `equals` parameter
/// describes.
fn make_equals_fn<T: PartialEq + 'static>() -> EqualsFn {
    Rc::new(|a: &dyn Any, b: &dyn Any| match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    })
}

/// The value a read of `node` sees right now: the pending write if one is outstanding and this
/// read is happening inside the transition that owns it, the committed value otherwise. Every
/// signal read goes through this rather than `CellValue::transactional()` directly, so that code
/// running outside the owning transition — including after it's moved on but before the pending
/// write has committed — doesn't observe a write that isn't visible to it yet.
fn visible<'a, T>(rt: &crate::runtime::Runtime, node: NodeId, guard: &'a CellValue<T>) -> Option<&'a T> {
    if rt.reading_inside_transition(node) {
        guard.transactional()
    } else {
        guard.committed()
    }
}

struct SignalPendingOps<T>(PhantomData<T>);

impl<T: 'static> PendingOps for SignalPendingOps<T> {
    fn commit(&self, value: &ValueCell) {
        typed::<T>(value).borrow_mut().commit();
    }

    fn revert(&self, value: &ValueCell) {
        typed::<T>(value).borrow_mut().revert();
    }
}

fn new_signal_node<T: 'static>(owner: Option<NodeId>, initial: T, equals: Option<EqualsFn>) -> NodeId {
    with_runtime(|rt| {
        rt.insert_node(Node {
            kind: NodeKind::Signal,
            value: erase(Rc::new(RefCell::new(CellValue::Committed(initial)))),
            equals,
            state: NodeState::Clean,
            status: StatusFlags::empty(),
            flags: ReactiveFlags::empty(),
            height: 0,
            sources: Vec::new(),
            subscribers: FxIndexSet::default(),
            owner,
            children: Vec::new(),
            compute: None::<Rc<dyn AnyComputation>>,
            pending_ops: Some(Rc::new(SignalPendingOps::<T>(PhantomData))),
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

fn read_signal<T: Clone + 'static>(node: NodeId) -> Result<T, ReactiveError> {
    with_runtime(|rt| {
        rt.track(node);
        let value = rt
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.value.clone())
            .ok_or(ReactiveError::NoOwner)?;
        let cell = typed::<T>(&value);
        let guard = cell.borrow();
        visible(rt, node, &guard).cloned().ok_or(ReactiveError::NoOwner)
    })
}

fn write_signal<T: Clone + 'static>(node: NodeId, new_value: T) {
    with_runtime(|rt| {
        let (value, equals) = {
            let nodes = rt.nodes.borrow();
            let Some(n) = nodes.get(node) else { return };
            (n.value.clone(), n.equals.clone())
        };
        let cell = typed::<T>(&value);
        if let Some(equals) = equals {
            let guard = cell.borrow();
            let unchanged = visible(rt, node, &guard)
                .map(|old| equals(old as &dyn Any, &new_value as &dyn Any))
                .unwrap_or(false);
            drop(guard);
            if unchanged {
                return;
            }
        }
        if let Some(transition) = rt.active_transition() {
            cell.borrow_mut().set_pending(new_value);
            rt.track_pending_write(transition, node);
        } else {
            cell.borrow_mut().set(new_value);
        }
        rt.mark_changed(node);
    });
}

/// Writes `new_value` as an optimistic overlay under the active transition: visible to reads the
/// same way a normal transactional write is, but reverted rather than committed when the
/// transition closes, unless something else has taken over the node's pending write by then.
/// Outside any transition this degenerates to an ordinary immediate write, since there's nothing
/// to revert against.
fn write_signal_optimistic<T: Clone + 'static>(node: NodeId, new_value: T) {
    with_runtime(|rt| {
        let value = {
            let nodes = rt.nodes.borrow();
            nodes.get(node).map(|n| n.value.clone())
        };
        let Some(value) = value else { return };
        let cell = typed::<T>(&value);
        if let Some(transition) = rt.active_transition() {
            cell.borrow_mut().set_pending(new_value);
            rt.track_optimistic_write(transition, node);
        } else {
            cell.borrow_mut().set(new_value);
        }
        rt.mark_changed(node);
    });
}

/// Whether `node` currently carries the `pending` status bit — an async computed awaiting its
/// first or next resolution (see [`crate::node::StatusFlags::PENDING`]). Plain signals never
/// carry this bit; it only ever becomes true for an [`crate::computed::AsyncDerived`] (or a
/// [`crate::computed::Memo`] built over one) between its creation/re-spawn and the moment its
/// future resolves.
fn read_is_pending(node: NodeId) -> bool {
    with_runtime(|rt| rt.status_of(node).contains(StatusFlags::PENDING))
}

/// A read-only handle into a signal's value, tracking every read.
pub struct ReadSignal<T>(NodeId, PhantomData<T>);
impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ReadSignal<T> {}
impl<T> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.0).finish()
    }
}

/// A write-only handle into a signal's value.
pub struct WriteSignal<T>(NodeId, PhantomData<T>);
impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for WriteSignal<T> {}

/// A combined read/write handle, owner-scoped.
pub struct RwSignal<T>(NodeId, PhantomData<T>);
impl<T> Clone for RwSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for RwSignal<T> {}

impl<T: 'static> RwSignal<T> {
    pub fn new(value: T) -> Self {
        let owner = with_runtime(|rt| rt.current_owner());
        Self(new_signal_node(owner, value, None), PhantomData)
    }

    pub fn read_only(self) -> ReadSignal<T> {
        ReadSignal(self.0, PhantomData)
    }

    pub fn write_only(self) -> WriteSignal<T> {
        WriteSignal(self.0, PhantomData)
    }

    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (self.read_only(), self.write_only())
    }

    pub(crate) fn node_id(&self) -> NodeId {
        self.0
    }
}

impl<T: PartialEq + 'static> RwSignal<T> {
    /// Like [`RwSignal::new`], but a write that's `==` the signal's current value is a no-op:
    /// no dirtying, no propagation to subscribers. `RwSignal::new` leaves `equals` unset (every
    /// write always propagates), since it places no `PartialEq` bound on `T`; this is the opt-in
    /// for types that can use the default comparator instead.
    pub fn new_eq(value: T) -> Self {
        let owner = with_runtime(|rt| rt.current_owner());
        Self(new_signal_node(owner, value, Some(make_equals_fn::<T>())), PhantomData)
    }
}

/// Creates an owner-scoped signal, returning separate read/write handles.
pub fn signal<T: 'static>(value: T) -> (ReadSignal<T>, WriteSignal<T>) {
    let rw = RwSignal::new(value);
    rw.split()
}

/// Like [`signal`], but filters writes through `PartialEq` (see [`RwSignal::new_eq`]).
pub fn signal_eq<T: PartialEq + 'static>(value: T) -> (ReadSignal<T>, WriteSignal<T>) {
    let rw = RwSignal::new_eq(value);
    rw.split()
}

macro_rules! impl_signal_traits {
    ($ty:ident) => {
        impl<T: Clone + 'static> Get for $ty<T> {
            type Value = T;
            fn get(&self) -> T {
                self.try_get().expect("signal has been disposed")
            }
            fn try_get(&self) -> Result<T, ReactiveError> {
                read_signal(self.0)
            }
        }

        impl<T: Clone + 'static> GetUntracked for $ty<T> {
            type Value = T;
            fn get_untracked(&self) -> T {
                with_runtime(|rt| rt.untrack(|| self.get()))
            }
        }

        impl<T: Clone + 'static> With for $ty<T> {
            type Value = T;
            fn try_with<U>(&self, f: impl FnOnce(&T) -> U) -> Option<U> {
                with_runtime(|rt| {
                    rt.track(self.0);
                    let value = rt.nodes.borrow().get(self.0)?.value.clone();
                    let cell = typed::<T>(&value);
                    let guard = cell.borrow();
                    visible(rt, self.0, &guard).map(f)
                })
            }
        }

        impl<T: Clone + 'static> WithUntracked for $ty<T> {
            type Value = T;
            fn try_with_untracked<U>(&self, f: impl FnOnce(&T) -> U) -> Option<U> {
                with_runtime(|rt| rt.untrack(|| self.try_with(f)))
            }
        }

        impl<T: 'static> Track for $ty<T> {
            fn track(&self) {
                with_runtime(|rt| rt.track(self.0));
            }
        }

        impl<T: 'static> Dispose for $ty<T> {
            fn dispose(self) {
                with_runtime(|rt| rt.dispose_node(self.0));
            }
        }
    };
}

impl_signal_traits!(ReadSignal);
impl_signal_traits!(RwSignal);

macro_rules! impl_is_pending {
    ($ty:ident) => {
        impl<T: 'static> IsPending for $ty<T> {
            fn is_pending(&self) -> bool {
                read_is_pending(self.0)
            }
        }
    };
}

impl_is_pending!(ReadSignal);
impl_is_pending!(WriteSignal);
impl_is_pending!(RwSignal);

macro_rules! impl_refresh {
    ($ty:ident) => {
        impl<T: 'static> Refresh for $ty<T> {
            fn refresh(&self) -> crate::RefreshToken {
                with_runtime(|rt| rt.refresh(self.0))
            }
        }
    };
}

impl_refresh!(ReadSignal);
impl_refresh!(WriteSignal);
impl_refresh!(RwSignal);

macro_rules! impl_on_unobserved {
    ($ty:ident) => {
        impl<T: 'static> OnUnobserved for $ty<T> {
            fn on_unobserved(&self, callback: impl Fn() + 'static) {
                with_runtime(|rt| rt.set_unobserved(self.0, Rc::new(callback)));
            }
        }
    };
}

impl_on_unobserved!(ReadSignal);
impl_on_unobserved!(WriteSignal);
impl_on_unobserved!(RwSignal);

macro_rules! impl_writable_traits {
    ($ty:ident) => {
        impl<T: Clone + 'static> Set for $ty<T> {
            type Value = T;
            fn set(&self, value: T) {
                write_signal(self.0, value);
            }
        }

        impl<T: Clone + 'static> Update for $ty<T> {
            type Value = T;
            fn try_update<U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U> {
                with_runtime(|rt| {
                    let value = rt.nodes.borrow().get(self.0)?.value.clone();
                    let cell = typed::<T>(&value);
                    let current = visible(rt, self.0, &cell.borrow()).cloned()?;
                    let mut scratch = current;
                    let out = f(&mut scratch);
                    drop(cell);
                    write_signal(self.0, scratch);
                    Some(out)
                })
            }
        }

        impl<T: Clone + 'static> UpdateUntracked for $ty<T> {
            type Value = T;
            fn try_update_untracked<U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U> {
                with_runtime(|rt| {
                    let value = rt.nodes.borrow().get(self.0)?.value.clone();
                    let cell = typed::<T>(&value);
                    let mut guard = cell.borrow_mut();
                    match &mut *guard {
                        CellValue::Committed(v) => Some(f(v)),
                        CellValue::Pending { pending, .. } => Some(f(pending)),
                        CellValue::NotSet => None,
                    }
                })
            }
        }
    };
}

impl_writable_traits!(WriteSignal);
impl_writable_traits!(RwSignal);

macro_rules! impl_optimistic_write {
    ($ty:ident) => {
        impl<T: Clone + 'static> $ty<T> {
            /// See [`write_signal_optimistic`].
            pub fn set_optimistic(&self, value: T) {
                write_signal_optimistic(self.0, value);
            }
        }
    };
}

impl_optimistic_write!(WriteSignal);
impl_optimistic_write!(RwSignal);

impl<T: Clone + 'static> IntoInner for RwSignal<T> {
    type Value = T;
    fn into_inner(self) -> Option<T> {
        let value = self.get_untracked();
        self.dispose();
        Some(value)
    }
}

impl<T: 'static> Dispose for WriteSignal<T> {
    fn dispose(self) {
        with_runtime(|rt| rt.dispose_node(self.0));
    }
}

// ---- reference-counted variants ------------------------------------------------------------

struct ArcSignalInner {
    node: NodeId,
}

impl Drop for ArcSignalInner {
    fn drop(&mut self) {
        with_runtime(|rt| rt.dispose_node(self.node));
    }
}

/// A reference-counted read handle: the node is disposed when the last clone drops, independent
/// of any owner scope.
#[derive(Clone)]
pub struct ArcReadSignal<T>(Rc<ArcSignalInner>, PhantomData<T>);

/// A reference-counted write handle.
#[derive(Clone)]
pub struct ArcWriteSignal<T>(Rc<ArcSignalInner>, PhantomData<T>);

/// A reference-counted read/write handle.
#[derive(Clone)]
pub struct ArcRwSignal<T>(Rc<ArcSignalInner>, PhantomData<T>);

impl<T: 'static> ArcRwSignal<T> {
    pub fn new(value: T) -> Self {
        let node = new_signal_node(None, value, None);
        Self(Rc::new(ArcSignalInner { node }), PhantomData)
    }

    pub fn read_only(&self) -> ArcReadSignal<T> {
        ArcReadSignal(self.0.clone(), PhantomData)
    }

    pub fn write_only(&self) -> ArcWriteSignal<T> {
        ArcWriteSignal(self.0.clone(), PhantomData)
    }
}

impl<T: PartialEq + 'static> ArcRwSignal<T> {
    /// Like [`ArcRwSignal::new`], filtering writes through `PartialEq` (see [`RwSignal::new_eq`]).
    pub fn new_eq(value: T) -> Self {
        let node = new_signal_node(None, value, Some(make_equals_fn::<T>()));
        Self(Rc::new(ArcSignalInner { node }), PhantomData)
    }
}

/// Creates a reference-counted signal, returning separate read/write handles that share the
/// underlying node's lifetime.
pub fn arc_signal<T: 'static>(value: T) -> (ArcReadSignal<T>, ArcWriteSignal<T>) {
    let rw = ArcRwSignal::new(value);
    (rw.read_only(), rw.write_only())
}

/// Like [`arc_signal`], filtering writes through `PartialEq` (see [`RwSignal::new_eq`]).
pub fn arc_signal_eq<T: PartialEq + 'static>(value: T) -> (ArcReadSignal<T>, ArcWriteSignal<T>) {
    let rw = ArcRwSignal::new_eq(value);
    (rw.read_only(), rw.write_only())
}

macro_rules! impl_arc_signal_traits {
    ($ty:ident) => {
        impl<T: Clone + 'static> Get for $ty<T> {
            type Value = T;
            fn get(&self) -> T {
                self.try_get().expect("signal has been disposed")
            }
            fn try_get(&self) -> Result<T, ReactiveError> {
                read_signal(self.0.node)
            }
        }

        impl<T: Clone + 'static> GetUntracked for $ty<T> {
            type Value = T;
            fn get_untracked(&self) -> T {
                with_runtime(|rt| rt.untrack(|| self.get()))
            }
        }

        impl<T: Clone + 'static> With for $ty<T> {
            type Value = T;
            fn try_with<U>(&self, f: impl FnOnce(&T) -> U) -> Option<U> {
                with_runtime(|rt| {
                    rt.track(self.0.node);
                    let value = rt.nodes.borrow().get(self.0.node)?.value.clone();
                    let cell = typed::<T>(&value);
                    let guard = cell.borrow();
                    visible(rt, self.0.node, &guard).map(f)
                })
            }
        }

        impl<T: Clone + 'static> WithUntracked for $ty<T> {
            type Value = T;
            fn try_with_untracked<U>(&self, f: impl FnOnce(&T) -> U) -> Option<U> {
                with_runtime(|rt| rt.untrack(|| self.try_with(f)))
            }
        }

        impl<T: 'static> Track for $ty<T> {
            fn track(&self) {
                with_runtime(|rt| rt.track(self.0.node));
            }
        }
    };
}

impl_arc_signal_traits!(ArcReadSignal);
impl_arc_signal_traits!(ArcRwSignal);

macro_rules! impl_arc_is_pending {
    ($ty:ident) => {
        impl<T: 'static> IsPending for $ty<T> {
            fn is_pending(&self) -> bool {
                read_is_pending(self.0.node)
            }
        }
    };
}

impl_arc_is_pending!(ArcReadSignal);
impl_arc_is_pending!(ArcWriteSignal);
impl_arc_is_pending!(ArcRwSignal);

macro_rules! impl_arc_refresh {
    ($ty:ident) => {
        impl<T: 'static> Refresh for $ty<T> {
            fn refresh(&self) -> crate::RefreshToken {
                with_runtime(|rt| rt.refresh(self.0.node))
            }
        }
    };
}

impl_arc_refresh!(ArcReadSignal);
impl_arc_refresh!(ArcWriteSignal);
impl_arc_refresh!(ArcRwSignal);

macro_rules! impl_arc_on_unobserved {
    ($ty:ident) => {
        impl<T: 'static> OnUnobserved for $ty<T> {
            fn on_unobserved(&self, callback: impl Fn() + 'static) {
                with_runtime(|rt| rt.set_unobserved(self.0.node, Rc::new(callback)));
            }
        }
    };
}

impl_arc_on_unobserved!(ArcReadSignal);
impl_arc_on_unobserved!(ArcWriteSignal);
impl_arc_on_unobserved!(ArcRwSignal);

macro_rules! impl_arc_writable_traits {
    ($ty:ident) => {
        impl<T: Clone + 'static> Set for $ty<T> {
            type Value = T;
            fn set(&self, value: T) {
                write_signal(self.0.node, value);
            }
        }

        impl<T: Clone + 'static> Update for $ty<T> {
            type Value = T;
            fn try_update<U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U> {
                with_runtime(|rt| {
                    let value = rt.nodes.borrow().get(self.0.node)?.value.clone();
                    let cell = typed::<T>(&value);
                    let current = visible(rt, self.0.node, &cell.borrow()).cloned()?;
                    let mut scratch = current;
                    let out = f(&mut scratch);
                    drop(cell);
                    write_signal(self.0.node, scratch);
                    Some(out)
                })
            }
        }

        impl<T: Clone + 'static> UpdateUntracked for $ty<T> {
            type Value = T;
            fn try_update_untracked<U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U> {
                with_runtime(|rt| {
                    let value = rt.nodes.borrow().get(self.0.node)?.value.clone();
                    let cell = typed::<T>(&value);
                    let mut guard = cell.borrow_mut();
                    match &mut *guard {
                        CellValue::Committed(v) => Some(f(v)),
                        CellValue::Pending { pending, .. } => Some(f(pending)),
                        CellValue::NotSet => None,
                    }
                })
            }
        }
    };
}

impl_arc_writable_traits!(ArcWriteSignal);
impl_arc_writable_traits!(ArcRwSignal);

macro_rules! impl_arc_optimistic_write {
    ($ty:ident) => {
        impl<T: Clone + 'static> $ty<T> {
            /// See [`write_signal_optimistic`].
            pub fn set_optimistic(&self, value: T) {
                write_signal_optimistic(self.0.node, value);
            }
        }
    };
}

impl_arc_optimistic_write!(ArcWriteSignal);
impl_arc_optimistic_write!(ArcRwSignal);

impl<T: Clone + 'static> IntoInner for ArcRwSignal<T> {
    type Value = T;
    fn into_inner(self) -> Option<T> {
        if Rc::strong_count(&self.0) > 1 {
            return None;
        }
        Some(self.get_untracked())
    }
}

impl<T: Clone + 'static> Read for RwSignal<T> {
    type Value = T;
    type Guard<'a> = CloneGuard<T>;
    fn try_read(&self) -> Option<Self::Guard<'_>> {
        self.try_get().ok().map(CloneGuard)
    }
}

impl<T: Clone + 'static> Read for ReadSignal<T> {
    type Value = T;
    type Guard<'a> = CloneGuard<T>;
    fn try_read(&self) -> Option<Self::Guard<'_>> {
        self.try_get().ok().map(CloneGuard)
    }
}

impl<T: Clone + 'static> Read for ArcRwSignal<T> {
    type Value = T;
    type Guard<'a> = CloneGuard<T>;
    fn try_read(&self) -> Option<Self::Guard<'_>> {
        self.try_get().ok().map(CloneGuard)
    }
}

impl<T: Clone + 'static> Read for ArcReadSignal<T> {
    type Value = T;
    type Guard<'a> = CloneGuard<T>;
    fn try_read(&self) -> Option<Self::Guard<'_>> {
        self.try_get().ok().map(CloneGuard)
    }
}

/// `read()` on a signal returns an owned clone behind a transparent `Deref`, rather than a real
/// `Ref` borrow: the cell may be re-entered synchronously by a nested `with`/`get` elsewhere in
/// the same expression, which a live `Ref` would deadlock against.
pub struct CloneGuard<T>(pub(crate) T);
impl<T> std::ops::Deref for CloneGuard<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

/// A write guard that buffers mutations and commits them (via a single `set`) on drop.
pub struct WriteGuard<'a, T> {
    node: NodeId,
    current: T,
    _marker: PhantomData<&'a ()>,
}

impl<T> std::ops::Deref for WriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.current
    }
}

impl<T> std::ops::DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.current
    }
}

impl<T: Clone + 'static> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        write_signal(self.node, self.current.clone());
    }
}

fn try_write_guard<T: Clone + 'static>(node: NodeId) -> Option<WriteGuard<'static, T>> {
    with_runtime(|rt| {
        let value = rt.nodes.borrow().get(node)?.value.clone();
        let cell = typed::<T>(&value);
        let initial = visible(rt, node, &cell.borrow()).cloned()?;
        Some(WriteGuard {
            node,
            current: initial,
            _marker: PhantomData,
        })
    })
}

impl<T: Clone + 'static> Write for RwSignal<T> {
    type Value = T;
    type Guard<'a> = WriteGuard<'static, T>;
    fn try_write(&self) -> Option<Self::Guard<'_>> {
        try_write_guard(self.0)
    }
}

impl<T: Clone + 'static> Write for WriteSignal<T> {
    type Value = T;
    type Guard<'a> = WriteGuard<'static, T>;
    fn try_write(&self) -> Option<Self::Guard<'_>> {
        try_write_guard(self.0)
    }
}

impl<T: Clone + 'static> Write for ArcRwSignal<T> {
    type Value = T;
    type Guard<'a> = WriteGuard<'static, T>;
    fn try_write(&self) -> Option<Self::Guard<'_>> {
        try_write_guard(self.0.node)
    }
}

impl<T: Clone + 'static> Write for ArcWriteSignal<T> {
    type Value = T;
    type Guard<'a> = WriteGuard<'static, T>;
    fn try_write(&self) -> Option<Self::Guard<'_>> {
        try_write_guard(self.0.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::Owner;

    #[test]
    fn get_and_set_roundtrip() {
        let (_owner, _) = Owner::new(|| {
            let (a, set_a) = signal(1);
            assert_eq!(a.get(), 1);
            set_a.set(2);
            assert_eq!(a.get(), 2);
        });
    }

    #[test]
    fn update_mutates_in_place() {
        let (_owner, _) = Owner::new(|| {
            let (a, set_a) = signal(1);
            set_a.update(|n| *n += 1);
            assert_eq!(a.get(), 2);
        });
    }

    #[test]
    fn arc_signal_disposes_on_last_drop() {
        let (a, b) = arc_signal(5);
        assert_eq!(a.get(), 5);
        drop(b);
        assert_eq!(a.get(), 5);
    }

    #[test]
    fn eq_signal_filters_writes_that_equal_the_current_value() {
        let (_owner, _) = Owner::new(|| {
            let (a, set_a) = signal_eq(1);
            let runs = Rc::new(RefCell::new(0));
            let runs2 = runs.clone();
            let effect = crate::effect::Effect::new(move || {
                a.track();
                *runs2.borrow_mut() += 1;
            });
            assert_eq!(*runs.borrow(), 1, "effect runs once eagerly on creation");

            set_a.set(1);
            crate::runtime::with_runtime(|rt| rt.flush());
            assert_eq!(*runs.borrow(), 1, "writing an equal value must not dirty subscribers");

            set_a.set(2);
            crate::runtime::with_runtime(|rt| rt.flush());
            assert_eq!(*runs.borrow(), 2, "writing a different value still propagates");

            effect.dispose();
        });
    }

    #[test]
    fn plain_signal_is_never_pending() {
        let (_owner, _) = Owner::new(|| {
            let (a, set_a) = signal(1);
            assert!(!a.is_pending(), "a signal has no async resolution to wait on");

            let transition = with_runtime(|rt| rt.start_transition());
            set_a.set(2);
            assert!(
                !a.is_pending(),
                "an open transition holds a pending *write*, which is a different thing from the \
                 async `pending` status bit `is_pending` reports"
            );
            with_runtime(|rt| rt.close_transition(transition));
        });
    }

    #[test]
    fn plain_signal_always_propagates_even_on_equal_writes() {
        let (_owner, _) = Owner::new(|| {
            let (a, set_a) = signal(1);
            let runs = Rc::new(RefCell::new(0));
            let runs2 = runs.clone();
            let effect = crate::effect::Effect::new(move || {
                a.track();
                *runs2.borrow_mut() += 1;
            });
            assert_eq!(*runs.borrow(), 1);

            set_a.set(1);
            crate::runtime::with_runtime(|rt| rt.flush());
            assert_eq!(*runs.borrow(), 2, "a plain signal has no equals filter, so every write propagates");

            effect.dispose();
        });
    }

    #[test]
    fn refresh_reruns_dependents_of_an_eq_filtered_signal_with_no_value_change() {
        let (_owner, _) = Owner::new(|| {
            let (a, _set_a) = signal_eq(1);
            let runs = Rc::new(RefCell::new(0));
            let runs2 = runs.clone();
            let effect = crate::effect::Effect::new(move || {
                a.track();
                *runs2.borrow_mut() += 1;
            });
            assert_eq!(*runs.borrow(), 1);

            let clock_before = with_runtime(|rt| rt.clock());
            let token = a.refresh();
            assert!(token.requested_at() >= clock_before);

            with_runtime(|rt| rt.flush());
            assert_eq!(
                *runs.borrow(),
                2,
                "refresh forces dependents to rerun even though nothing was ever written"
            );

            effect.dispose();
        });
    }

    #[test]
    fn on_unobserved_fires_when_the_last_subscriber_is_disposed() {
        let (_owner, _) = Owner::new(|| {
            let (a, _set_a) = signal(1);
            let fired = Rc::new(RefCell::new(false));
            let fired2 = fired.clone();
            a.on_unobserved(move || *fired2.borrow_mut() = true);

            let effect = crate::effect::Effect::new(move || {
                a.track();
            });
            assert!(
                !*fired.borrow(),
                "still has a live subscriber, nothing to report"
            );

            effect.dispose();
            assert!(
                *fired.borrow(),
                "disposing its only subscriber should fire the callback"
            );
        });
    }
}
