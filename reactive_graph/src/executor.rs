//! Thin wrapper over `any_spawner::Executor` for the two things this crate needs: scheduling a
//! flush on the microtask queue, and spawning the futures backing async derived values and
//! actions. Kept as its own module so call sites never have to think about which executor feature
//! is compiled in.

use std::future::Future;

/// Re-exported so host applications only need one crate to initialize an executor
/// (`reactive_graph::executor::Executor::init_tokio()`, etc.) without a direct `any_spawner`
/// dependency.
pub use any_spawner::{Executor, ExecutorError};

/// Schedules `f` to run on the next microtask tick. Used by [`crate::runtime::Runtime::schedule_flush`]
/// to coalesce a burst of writes into a single flush rather than flushing synchronously inside
/// every `set`.
pub(crate) fn spawn_microtask(f: impl FnOnce() + 'static) {
    Executor::spawn_local(async move { f() });
}

/// Spawns a `!Send` future on the configured executor, for async derived values and actions whose
/// output feeds back into the (thread-local, `!Send`) reactive graph.
pub(crate) fn spawn_local(fut: impl Future<Output = ()> + 'static) {
    Executor::spawn_local(fut);
}
