use any_spawner::Executor;
use reactive_graph::{
    boundary::{ConditionalBoundary, ErrorBoundary, Suspense},
    computed::AsyncDerived,
    error::ReactiveError,
    owner::Owner,
    prelude::*,
    signal::RwSignal,
};
use tokio::task::LocalSet;

#[tokio::test]
async fn error_boundary_passes_not_ready_through_instead_of_falling_back() {
    _ = Executor::init_tokio();
    LocalSet::new()
        .run_until(async {
            let (_owner, boundary) = Owner::new(|| {
                let derived = AsyncDerived::new(|| async { 1 });
                ErrorBoundary::new(move || derived.try_get(), |_err| -1)
            });

            // Still unresolved: a boundary whose fallback only covers hard errors must surface
            // `NotReady` rather than silently showing the fallback value.
            assert!(matches!(boundary.get(), Err(ReactiveError::NotReady { .. })));

            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            reactive_graph::flush();

            assert_eq!(boundary.get(), Ok(1));
        })
        .await;
}

#[test]
fn error_boundary_recovers_once_the_body_stops_erroring() {
    let (_owner, _) = Owner::new(|| {
        let ok = RwSignal::new(false);
        let boundary = ErrorBoundary::new(
            move || {
                if ok.get() {
                    Ok(10)
                } else {
                    Err(ReactiveError::ContextNotFound)
                }
            },
            |_err| 0,
        );
        assert_eq!(boundary.get(), Ok(0));
        ok.set(true);
        assert_eq!(boundary.get(), Ok(10));
    });
}

#[tokio::test]
async fn suspense_shows_fallback_until_the_async_value_resolves() {
    _ = Executor::init_tokio();
    LocalSet::new()
        .run_until(async {
            let (_owner, suspense) = Owner::new(|| {
                let derived = AsyncDerived::new(|| async { 42 });
                Suspense::new(move || derived.try_get(), || -1)
            });

            // The future hasn't had a chance to run yet: still on the fallback.
            assert_eq!(suspense.get(), -1);

            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            reactive_graph::flush();

            assert_eq!(suspense.get(), 42);
        })
        .await;
}

#[test]
fn conditional_boundary_holds_its_last_value_while_disabled() {
    let (_owner, _) = Owner::new(|| {
        let enabled = RwSignal::new(true);
        let source = RwSignal::new(1);
        let boundary = ConditionalBoundary::new(move || enabled.get(), move || source.get());

        assert_eq!(boundary.get(), 1);
        enabled.set(false);
        source.set(2);
        // `body` isn't supposed to run while disabled, so the boundary keeps showing `1`.
        assert_eq!(boundary.get(), 1);

        enabled.set(true);
        assert_eq!(boundary.get(), 2);
    });
}
