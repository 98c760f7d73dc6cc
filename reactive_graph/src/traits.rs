//! The read/write trait vocabulary shared by signals, memos, and async derived values.
//!
//! Mirrors the teacher's trait-per-capability style (`leptos_reactive`'s `SignalGet`/`SignalSet`
//! family, generalized here to plain `Get`/`Set`/... names since this crate has only one signal
//! flavor per capability rather than `SignalGet`/`RwSignalGet`/... duplicates).

use crate::error::ReactiveError;
use std::ops::{Deref, DerefMut};

/// Tracked read returning an owned clone.
pub trait Get {
    type Value;
    fn get(&self) -> Self::Value;
    /// Like [`Get::get`], but surfaces a pending/erroring source instead of panicking.
    fn try_get(&self) -> Result<Self::Value, ReactiveError>;
}

/// Untracked read returning an owned clone.
pub trait GetUntracked {
    type Value;
    fn get_untracked(&self) -> Self::Value;
}

/// Tracked read by reference, through a guard.
pub trait Read {
    type Value;
    type Guard<'a>: Deref<Target = Self::Value>
    where
        Self: 'a;
    fn try_read(&self) -> Option<Self::Guard<'_>>;
    fn read(&self) -> Self::Guard<'_> {
        self.try_read().expect("Read::read called on a disposed signal")
    }
}

/// Tracked read by reference via a closure, avoiding the guard lifetime.
pub trait With {
    type Value;
    fn try_with<U>(&self, f: impl FnOnce(&Self::Value) -> U) -> Option<U>;
    fn with<U>(&self, f: impl FnOnce(&Self::Value) -> U) -> U {
        self.try_with(f).expect("With::with called on a disposed signal")
    }
}

/// Untracked read by reference via a closure.
pub trait WithUntracked {
    type Value;
    fn try_with_untracked<U>(&self, f: impl FnOnce(&Self::Value) -> U) -> Option<U>;
    fn with_untracked<U>(&self, f: impl FnOnce(&Self::Value) -> U) -> U {
        self.try_with_untracked(f)
            .expect("WithUntracked::with_untracked called on a disposed signal")
    }
}

/// Write-through replacement.
pub trait Set {
    type Value;
    fn set(&self, value: Self::Value);
}

/// In-place mutation via a closure, marking dirty afterward.
pub trait Update {
    type Value;
    fn try_update<U>(&self, f: impl FnOnce(&mut Self::Value) -> U) -> Option<U>;
    fn update(&self, f: impl FnOnce(&mut Self::Value)) {
        self.try_update(|v| f(v));
    }
}

/// In-place mutation that does not mark the signal dirty (no subscriber notification).
pub trait UpdateUntracked {
    type Value;
    fn try_update_untracked<U>(&self, f: impl FnOnce(&mut Self::Value) -> U) -> Option<U>;
    fn update_untracked(&self, f: impl FnOnce(&mut Self::Value)) {
        self.try_update_untracked(|v| f(v));
    }
}

/// A writable guard, `DerefMut` into the value, that marks the signal dirty on drop.
pub trait Write {
    type Value;
    type Guard<'a>: DerefMut<Target = Self::Value>
    where
        Self: 'a;
    fn try_write(&self) -> Option<Self::Guard<'_>>;
    fn write(&self) -> Self::Guard<'_> {
        self.try_write().expect("Write::write called on a disposed signal")
    }
}

/// Registers a dependency edge on the current observer without reading the value.
pub trait Track {
    fn track(&self);
}

/// Disposes the node backing this handle, running its cleanups.
pub trait Dispose {
    fn dispose(self);
}

/// Consumes the handle and returns the committed value if it is still live and uniquely held.
pub trait IntoInner {
    type Value;
    fn into_inner(self) -> Option<Self::Value>;
}

/// Whether a node is currently waiting on an unresolved async value — the `pending` status bit
/// (`StatusFlags::PENDING`), not to be confused with a transition holding an uncommitted write on
/// a plain signal. Plain signals never carry this bit; it only ever applies to a computed built
/// over a future that hasn't settled yet.
pub trait IsPending {
    fn is_pending(&self) -> bool;
}

/// Forces a node to re-run the next time it's pulled, with no write behind the request — useful
/// for invalidating a computed whose inputs live outside the graph (a clock tick, a file on disk)
/// where nothing inside the graph itself would ever mark it dirty.
pub trait Refresh {
    fn refresh(&self) -> crate::RefreshToken;
}

/// Registers `callback` to run the moment this node's last subscriber goes away. Overwrites
/// any previously registered callback. Useful for releasing a resource a computed only opened
/// because something was watching it — a subscription, a timer, a file handle.
pub trait OnUnobserved {
    fn on_unobserved(&self, callback: impl Fn() + 'static);
}
