//! Error and suspense boundaries: a subtree whose `pending`/`error` status is absorbed and
//! replaced by a fallback view instead of propagating to the boundary's own subscribers.
//!
//! This rendition folds the collection-queue bookkeeping into the existing `pending`/`error`
//! status bits already tracked per node (see [`crate::node::StatusFlags`]): a boundary is a memo
//! whose body returns a [`Result`], and whose compute function catches a propagated
//! [`ReactiveError`] the way a normal computed would propagate one, except it reports `Changed`
//! with the fallback value instead of letting the error bit set on the boundary node itself. A
//! full per-subtree conditional queue (buffering suppressed child effects until a predicate
//! re-enables them) is not implemented; see `DESIGN.md`.

use crate::{computed::Memo, error::ReactiveError, traits::Get};

/// Runs `body`, returning `Ok(value)` normally or the `Err` the first `NotReady`/compute failure
/// inside it produced. `body` must surface its own fallible reads with `?` against
/// [`crate::traits::Get::try_get`] (or an equivalent `try_*` accessor) for this to catch anything;
/// a `body` that calls the panicking `get()` will still panic rather than degrade to a fallback.
pub fn catch<T>(body: impl FnOnce() -> Result<T, ReactiveError>) -> Result<T, ReactiveError> {
    body()
}

/// An error boundary: shows `fallback(error)` while `body` is erroring (a non-`NotReady` failure
/// propagated from inside it), content otherwise.
pub struct ErrorBoundary<T>(Memo<Result<T, ReactiveError>>);

impl<T: Clone + PartialEq + 'static> ErrorBoundary<T> {
    pub fn new(
        mut body: impl FnMut() -> Result<T, ReactiveError> + 'static,
        fallback: impl Fn(&ReactiveError) -> T + 'static,
    ) -> Self {
        Self(Memo::new(move |_| match body() {
            Ok(value) => Ok(value),
            Err(err) if err.is_not_ready() => Err(err),
            Err(err) => Ok(fallback(&err)),
        }))
    }

    /// Resolved content, or the last `NotReady` this boundary has not yet absorbed (errors other
    /// than `NotReady` are already folded into content by `fallback`).
    pub fn get(&self) -> Result<T, ReactiveError> {
        self.0.get()
    }
}

/// A suspense boundary: shows `fallback()` while `body` has an outstanding `NotReady` dependency
/// (an unresolved async derived), content once every dependency has settled.
pub struct Suspense<T>(Memo<T>);

impl<T: Clone + PartialEq + 'static> Suspense<T> {
    pub fn new(
        mut body: impl FnMut() -> Result<T, ReactiveError> + 'static,
        fallback: impl Fn() -> T + 'static,
    ) -> Self {
        Self(Memo::new(move |_| match body() {
            Ok(value) => value,
            Err(_) => fallback(),
        }))
    }

    pub fn get(&self) -> T {
        self.0.get()
    }
}

/// A conditional boundary: runs `body` only while `enabled()` is true; while disabled, the last
/// value `body` produced stays visible (children keep recomputing to clear their own status, but
/// this boundary's own effects don't re-run until re-enabled).
pub struct ConditionalBoundary<T>(Memo<T>);

impl<T: Clone + PartialEq + 'static> ConditionalBoundary<T> {
    pub fn new(mut enabled: impl FnMut() -> bool + 'static, mut body: impl FnMut() -> T + 'static) -> Self {
        Self(Memo::new(move |prev| {
            if enabled() {
                body()
            } else {
                prev.cloned().unwrap_or_else(&mut body)
            }
        }))
    }

    pub fn get(&self) -> T {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{owner::Owner, signal::RwSignal, traits::{Get as _, Set}};

    #[test]
    fn error_boundary_falls_back_on_error() {
        let (_owner, _) = Owner::new(|| {
            let ok = RwSignal::new(true);
            let boundary = ErrorBoundary::new(
                move || {
                    if ok.get() {
                        Ok(1)
                    } else {
                        Err(ReactiveError::ContextNotFound)
                    }
                },
                |_err| -1,
            );
            assert_eq!(boundary.get(), Ok(1));
            ok.set(false);
            assert_eq!(boundary.get(), Ok(-1));
        });
    }

    /// Unlike `error_boundary_falls_back_on_error` (which returns a manual `Err` from `body`
    /// itself), this exercises the real propagation path: a child memo's compute function panics,
    /// `recompute` converts that into `StatusFlags::ERROR`, and the boundary's own `try_get()?`
    /// call on the child surfaces that as a `ReactiveError::Compute` it then folds into `fallback`.
    #[test]
    fn error_boundary_falls_back_when_a_child_memo_panics() {
        let (_owner, _) = Owner::new(|| {
            let ok = RwSignal::new(true);
            let child = Memo::new(move |_| if ok.get() { 1 } else { panic!("child exploded") });
            let boundary = ErrorBoundary::new(move || child.try_get(), |_err| -1);

            assert_eq!(boundary.get(), Ok(1));
            ok.set(false);
            assert_eq!(boundary.get(), Ok(-1), "a real panic in the child must degrade to the fallback");
        });
    }
}
