//! Effect integration tests. Every test here initializes a `tokio` executor and runs inside a
//! `LocalSet`, since a dirtied effect re-enqueues itself through `Runtime::schedule_flush`, which
//! spawns a microtask on the configured global executor — same pattern the teacher's own
//! `reactive_graph/tests/effect.rs` uses (`Executor::init_tokio()` + `LocalSet::run_until`).

use any_spawner::Executor;
use reactive_graph::{
    computed::Memo,
    effect::{Effect, RenderEffect},
    owner::Owner,
    prelude::*,
    signal::RwSignal,
};
use std::{cell::RefCell, rc::Rc, sync::{Arc, Mutex}};
use tokio::task::LocalSet;

#[tokio::test]
async fn effect_runs_immediately_and_on_every_dependency_write() {
    _ = Executor::init_tokio();
    LocalSet::new()
        .run_until(async {
            let (_owner, effect) = Owner::new(|| {
                let a = RwSignal::new(-1);
                let seen = Arc::new(Mutex::new(Vec::new()));
                let seen2 = seen.clone();
                let effect = Effect::new(move || {
                    seen2.lock().unwrap().push(a.get());
                });
                assert_eq!(*seen.lock().unwrap(), vec![-1]);

                a.set(1);
                reactive_graph::flush();
                assert_eq!(*seen.lock().unwrap(), vec![-1, 1]);
                effect
            });
            effect.dispose();
        })
        .await;
}

#[tokio::test]
async fn diamond_dependency_runs_effect_exactly_once_per_settle() {
    _ = Executor::init_tokio();
    LocalSet::new()
        .run_until(async {
            let (_owner, _) = Owner::new(|| {
                let name = RwSignal::new("Ada".to_string());
                let upper = Memo::new(move |_| name.get().to_uppercase());
                let lower = Memo::new(move |_| name.get().to_lowercase());

                let runs = Rc::new(RefCell::new(0));
                let runs2 = runs.clone();
                let effect = Effect::new(move || {
                    upper.get();
                    lower.get();
                    *runs2.borrow_mut() += 1;
                });
                assert_eq!(*runs.borrow(), 1);

                name.set("Grace".to_string());
                reactive_graph::flush();
                // Both `upper` and `lower` changed from the same write; the effect must settle
                // once, not twice, once per flush.
                assert_eq!(*runs.borrow(), 2);
                effect.dispose();
            });
        })
        .await;
}

#[tokio::test]
async fn render_effect_threads_previous_value() {
    _ = Executor::init_tokio();
    LocalSet::new()
        .run_until(async {
            let (_owner, _) = Owner::new(|| {
                let a = RwSignal::new(1);
                let history = Rc::new(RefCell::new(Vec::new()));
                let history2 = history.clone();
                let effect = RenderEffect::new(move |prev: Option<i32>| {
                    history2.borrow_mut().push((prev, a.get()));
                    a.get()
                });
                assert_eq!(*history.borrow(), vec![(None, 1)]);

                a.set(2);
                reactive_graph::flush();
                assert_eq!(*history.borrow(), vec![(None, 1), (Some(1), 2)]);
                effect.dispose();
            });
        })
        .await;
}

#[tokio::test]
async fn disposing_an_effect_stops_it_from_rerunning() {
    _ = Executor::init_tokio();
    LocalSet::new()
        .run_until(async {
            let (_owner, _) = Owner::new(|| {
                let a = RwSignal::new(0);
                let runs = Rc::new(RefCell::new(0));
                let runs2 = runs.clone();
                let effect = Effect::new(move || {
                    a.get();
                    *runs2.borrow_mut() += 1;
                });
                assert_eq!(*runs.borrow(), 1);
                effect.dispose();

                a.set(1);
                reactive_graph::flush();
                assert_eq!(*runs.borrow(), 1, "a disposed effect must not rerun");
            });
        })
        .await;
}
