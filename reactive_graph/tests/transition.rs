//! Transition integration tests, built around the public [`reactive_graph::action::action`]
//! entry point. Every test initializes a `tokio` executor and runs inside a `LocalSet`, since
//! dispatching an action spawns a future on the configured global executor the same way a
//! dirtied effect does (see `tests/effect.rs`).
//!
//! A write made inside an action's future is visible to a direct signal read as soon as it
//! happens (this crate has exactly one ambient active transition at a time, so there's no
//! separate "reader outside the transition" execution context to hide it from) — but the
//! *scheduler* still holds the transition's queued effects back: `Runtime::flush`'s drain loop
//! returns before touching the effect buckets for as long as the transition it's holding isn't
//! complete (`transition.rs`'s `Transition::is_complete`), so a dependent effect only reruns
//! once every action and async node the transition is waiting on has settled.

use any_spawner::Executor;
use futures::channel::oneshot;
use reactive_graph::{action::action, effect::Effect, owner::Owner, prelude::*, signal::RwSignal};
use std::{cell::RefCell, rc::Rc};
use tokio::task::LocalSet;

#[tokio::test]
async fn effect_stays_held_until_the_dispatching_action_settles() {
    _ = Executor::init_tokio();
    LocalSet::new()
        .run_until(async {
            let (gate_tx, gate_rx) = oneshot::channel::<()>();
            let gate_rx = Rc::new(RefCell::new(Some(gate_rx)));

            let (_owner, (a, runs, mut dispatch, effect)) = Owner::new(|| {
                let a = RwSignal::new(0);
                let runs = Rc::new(RefCell::new(Vec::new()));
                let runs2 = runs.clone();
                let effect = Effect::new(move || {
                    runs2.borrow_mut().push(a.get());
                });

                let gate_rx_for_action = gate_rx.clone();
                let dispatch = action(move |value: i32| {
                    let gate_rx = gate_rx_for_action.clone();
                    async move {
                        a.set(value);
                        let rx = gate_rx.borrow_mut().take().expect("gate used once");
                        let _ = rx.await;
                        value
                    }
                });
                (a, runs, dispatch, effect)
            });

            assert_eq!(*runs.borrow(), vec![0], "effect runs once eagerly on creation");

            let result = dispatch(7);
            // Let the spawned action run its synchronous prefix (the write) and suspend on the
            // gate before we inspect anything.
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;

            // The write already landed — a direct read sees it immediately, pending or not.
            assert_eq!(a.get(), 7);

            reactive_graph::flush();
            assert_eq!(
                *runs.borrow(),
                vec![0],
                "the effect must not rerun while the transition holding this write is still open"
            );

            gate_tx.send(()).expect("action still waiting on the gate");
            assert_eq!(result.await.unwrap(), 7);
            reactive_graph::flush();

            assert_eq!(
                *runs.borrow(),
                vec![0, 7],
                "closing the transition must let the held effect run exactly once, with the final value"
            );

            effect.dispose();
        })
        .await;
}

#[tokio::test]
async fn two_actions_dispatched_back_to_back_join_one_transition() {
    _ = Executor::init_tokio();
    LocalSet::new()
        .run_until(async {
            let (gate_tx, gate_rx) = oneshot::channel::<()>();
            let gate_rx = Rc::new(RefCell::new(Some(gate_rx)));

            let (_owner, (a, b, runs, mut dispatch_a, mut dispatch_b, effect)) = Owner::new(|| {
                let a = RwSignal::new(0);
                let b = RwSignal::new(0);
                let runs = Rc::new(RefCell::new(Vec::new()));
                let runs2 = runs.clone();
                let effect = Effect::new(move || {
                    runs2.borrow_mut().push((a.get(), b.get()));
                });

                let dispatch_a = action(move |value: i32| async move {
                    a.set(value);
                    value
                });

                let gate_rx_for_b = gate_rx.clone();
                let dispatch_b = action(move |value: i32| {
                    let gate_rx = gate_rx_for_b.clone();
                    async move {
                        b.set(value);
                        let rx = gate_rx.borrow_mut().take().expect("gate used once");
                        let _ = rx.await;
                        value
                    }
                });
                (a, b, runs, dispatch_a, dispatch_b, effect)
            });

            assert_eq!(*runs.borrow(), vec![(0, 0)]);

            // `a`'s action resolves quickly; `b`'s stays open on the gate, so the transition
            // they both joined can't close (and the held effect can't rerun) until the gate
            // opens, even though `a`'s own write finished long ago.
            let fut_a = dispatch_a(1);
            let fut_b = dispatch_b(2);
            assert_eq!(fut_a.await.unwrap(), 1);

            reactive_graph::flush();
            assert_eq!(
                *runs.borrow(),
                vec![(0, 0)],
                "a's action settling alone must not close a transition b's action still holds open"
            );

            gate_tx.send(()).expect("b's action still waiting on the gate");
            assert_eq!(fut_b.await.unwrap(), 2);
            reactive_graph::flush();

            assert_eq!(
                *runs.borrow(),
                vec![(0, 0), (1, 2)],
                "both writes must become visible to the held effect in the same settle"
            );

            effect.dispose();
        })
        .await;
}

#[tokio::test]
async fn optimistic_write_reverts_when_the_transition_closes_without_committing() {
    _ = Executor::init_tokio();
    LocalSet::new()
        .run_until(async {
            let (gate_tx, gate_rx) = oneshot::channel::<()>();
            let gate_rx = Rc::new(RefCell::new(Some(gate_rx)));

            let (_owner, (count, mut dispatch)) = Owner::new(|| {
                let count = RwSignal::new(0);

                let gate_rx_for_action = gate_rx.clone();
                // The action optimistically bumps the counter right away, the way a "like button"
                // shows its new count before the server confirms it, then finds out the request
                // never actually lands on a real value and must revert.
                let dispatch = action(move |()| {
                    let gate_rx = gate_rx_for_action.clone();
                    async move {
                        count.set_optimistic(count.get() + 1);
                        let rx = gate_rx.borrow_mut().take().expect("gate used once");
                        let _ = rx.await;
                        // Never calls `count.set(..)` — nothing promotes the optimistic value to
                        // a real pending write, so it has nothing to commit when the transition
                        // that's tracking it closes.
                    }
                });
                (count, dispatch)
            });

            assert_eq!(count.get(), 0);

            let result = dispatch(());
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;

            // The optimistic overlay is visible immediately, same as a real pending write.
            assert_eq!(count.get(), 1);

            gate_tx.send(()).expect("action still waiting on the gate");
            result.await.unwrap();
            reactive_graph::flush();

            assert_eq!(
                count.get(),
                0,
                "an optimistic write with nothing committed over it reverts to the base value on close"
            );
        })
        .await;
}
