//! Actions: externally-initiated async control flow, reified as a transition.
//!
//! `leptos_reactive`'s own actions are built on `futures::channel::oneshot` plus its executor
//! abstraction the same way (`leptos_reactive::action::ArcAction`); this version narrows that to
//! the generator-shaped contract the spec describes — "yielding a promise" is just an `.await`
//! point inside the future the action returns.

use crate::{
    error::ReactiveError,
    executor,
    runtime::with_runtime,
    transition::ActionHandle,
};
use futures::channel::oneshot;
use std::{
    cell::Cell,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

/// Wraps an async closure as an action: calling the returned handle starts (or joins) the active
/// transition, tracks the spawned future as one of its in-flight actions, and hands back a future
/// that resolves with the action's own result once it completes, independent of any other action
/// or async node the transition is also waiting on.
///
/// Any write a signal does inside `f` while its future is polled under the transition — because
/// the transition was started here, before `f` was ever called — is automatically held pending
/// until the whole transition closes, the same as a write made directly inside `start_transition`.
pub fn action<Args, T, Fut>(mut f: impl FnMut(Args) -> Fut + 'static) -> impl FnMut(Args) -> ActionFuture<T>
where
    Args: 'static,
    T: 'static,
    Fut: Future<Output = T> + 'static,
{
    move |args: Args| dispatch(f(args))
}

fn dispatch<T: 'static>(fut: impl Future<Output = T> + 'static) -> ActionFuture<T> {
    let (tx, rx) = oneshot::channel();
    with_runtime(|rt| {
        let transition = rt.start_transition();
        let done = Rc::new(Cell::new(false));
        rt.register_action(transition, ActionHandle { done: done.clone() });
        executor::spawn_local(async move {
            let result = fut.await;
            done.set(true);
            with_runtime(|rt| {
                // A settled action can be the last thing the transition was waiting on; give the
                // scheduler a chance to notice and close it.
                rt.schedule_flush();
            });
            let _ = tx.send(result);
        });
    });
    ActionFuture(rx)
}

/// The future returned by calling a dispatched [`action`]. Resolves once the action's own future
/// completes; does not wait for the rest of the transition (other actions, other async nodes) to
/// settle — mirrors the spec's "errors in one action reject its promise without aborting the
/// transition" independence between actions.
pub struct ActionFuture<T>(oneshot::Receiver<T>);

impl<T> Future for ActionFuture<T> {
    type Output = Result<T, ReactiveError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().0)
            .poll(cx)
            .map(|r| r.map_err(|_| ReactiveError::ActionCancelled))
    }
}
