//! The ownership tree: disposal, `on_cleanup`, and typed context lookup.
//!
//! Every node doubles as an owner — its `children` field (on [`crate::node::Node`]) holds the
//! nodes created while it was the active owner. Disposing a node recursively disposes its
//! children before unlinking its own edges, matching `leptos_reactive::runtime::Runtime::dispose`.

use crate::{error::ReactiveError, node::NodeId, runtime::with_runtime};
use std::{any::TypeId, rc::Rc};
use tracing::trace;

/// A handle to a node acting as an ownership scope. Dropping the handle does **not** dispose the
/// node — call [`Owner::dispose`] explicitly, the way `create_root`'s returned `DisposeFn` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub(crate) NodeId);

impl Owner {
    /// Creates a detached root owner and runs `f` with it active, returning `f`'s result. The
    /// returned [`Owner`] is *not* auto-disposed; callers that need `create_root` semantics
    /// should call [`Owner::dispose`] themselves once the root's work is done.
    pub fn new<T>(f: impl FnOnce() -> T) -> (Owner, T) {
        with_runtime(|rt| {
            let id = rt.create_root_node();
            let owner = Owner(id);
            let value = rt.with_owner(id, f);
            (owner, value)
        })
    }

    /// Disposes this owner's node and, recursively, every node it owns.
    pub fn dispose(self) {
        with_runtime(|rt| rt.dispose_node(self.0));
    }
}

/// Runs `f` with `owner` set as the current owner for the duration of the call, restoring the
/// previous owner afterward even if `f` panics.
pub fn run_with_owner<T>(owner: Owner, f: impl FnOnce() -> T) -> T {
    with_runtime(|rt| rt.with_owner(owner.0, f))
}

/// Registers `f` to run when the current owner is disposed. Cleanups run in reverse-registration
/// order, after the owner's children have already been disposed.
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    with_runtime(|rt| {
        let Some(owner) = rt.current_owner() else {
            trace!("on_cleanup called with no active owner; dropping immediately");
            return;
        };
        rt.push_cleanup(owner, Box::new(f));
    });
}

/// Provides a context value, visible to the current owner and every owner created beneath it
/// until shadowed by a nearer `provide_context::<T>`.
pub fn provide_context<T: Clone + 'static>(value: T) {
    with_runtime(|rt| {
        let Some(owner) = rt.current_owner() else {
            trace!("provide_context called with no active owner; value dropped");
            return;
        };
        rt.insert_context(owner, TypeId::of::<T>(), Rc::new(value));
    });
}

/// Looks up a context value of type `T`, walking from the current owner up through its ancestors.
pub fn use_context<T: Clone + 'static>() -> Option<T> {
    with_runtime(|rt| {
        let owner = rt.current_owner()?;
        rt.find_context(owner, TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>().cloned())
    })
}

/// Like [`use_context`] but returns [`ReactiveError::ContextNotFound`] instead of `None`, for
/// call sites that want `?` rather than an `unwrap`.
pub fn expect_context<T: Clone + 'static>() -> Result<T, ReactiveError> {
    use_context::<T>().ok_or(ReactiveError::ContextNotFound)
}
