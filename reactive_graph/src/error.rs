//! The error taxonomy used throughout the graph engine.
//!
//! Compute-time failures are split into two buckets: [`NotReady`](ReactiveError::NotReady), which
//! is a normal, expected state for an async-resolving node and is represented by the `pending`
//! status bit rather than bubbling as a hard failure, and everything else, which sets the `error`
//! status bit and is carried upstream until a boundary absorbs it.

use crate::node::NodeId;
use std::{fmt, rc::Rc};

/// Errors produced by the reactive graph itself, as opposed to errors returned by user compute
/// functions (those are wrapped in [`ReactiveError::Compute`]).
#[derive(Debug, thiserror::Error, Clone)]
pub enum ReactiveError {
    /// A read encountered a node whose async value has not resolved yet.
    #[error("value not ready: node {source:?} is still pending")]
    NotReady {
        /// The node whose pending async value caused this.
        source: NodeId,
    },

    /// A compute function raised something other than [`ReactiveError::NotReady`].
    #[error("compute failed on node {node:?}: {payload}")]
    Compute {
        /// The node whose compute function failed.
        node: NodeId,
        /// The user-supplied payload, type-erased but `Display`-able.
        payload: AnyPayload,
    },

    /// A context/owner operation ran with no active [`Owner`](crate::owner::Owner).
    #[error("no owner is active on this thread")]
    NoOwner,

    /// [`use_context`](crate::owner::use_context) found no value and no default.
    #[error("no context of this type was found")]
    ContextNotFound,

    /// Recomputing `node` would re-enter a node already mid-recompute: a dependency cycle.
    #[error("dependency cycle detected at node {node:?}")]
    CycleFault {
        /// The node that was about to be re-entered.
        node: NodeId,
    },

    /// An [`action`](crate::action::action) future's result channel was dropped before it could
    /// deliver a value — the spawned task was lost (executor shut down mid-flight).
    #[error("action was cancelled before it resolved")]
    ActionCancelled,
}

/// A type-erased, `Display`-able error payload raised by a user compute function.
#[derive(Clone)]
pub struct AnyPayload(pub Rc<dyn fmt::Display>);

impl fmt::Debug for AnyPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AnyPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AnyPayload {
    /// Wraps any `Display`-able value as an opaque compute-error payload.
    pub fn new(value: impl fmt::Display + 'static) -> Self {
        Self(Rc::new(value))
    }
}

/// Convenience alias for fallible engine operations.
pub type ReactiveResult<T> = Result<T, ReactiveError>;

/// Extracts a human-readable message from a caught panic payload, the way `std`'s default panic
/// hook does: `&'static str` and `String` payloads (the two `panic!`/`assert!` ever produce) are
/// used directly, anything else (a custom payload from `panic_any`) falls back to a generic label.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "compute function panicked".to_string()
    }
}

impl ReactiveError {
    /// Whether this is the expected "still loading" state rather than a hard failure.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, ReactiveError::NotReady { .. })
    }
}

/// Compares by variant and node identity; `Compute`'s `Display`-erased payload is not compared
/// (two failures on the same node are treated as equal regardless of message). Needed so types
/// like `Memo<Result<T, ReactiveError>>` (error boundaries) can use the equality-based recompute
/// filter without requiring every payload type to be `PartialEq`.
impl PartialEq for ReactiveError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ReactiveError::NotReady { source: a }, ReactiveError::NotReady { source: b }) => a == b,
            (ReactiveError::Compute { node: a, .. }, ReactiveError::Compute { node: b, .. }) => a == b,
            (ReactiveError::NoOwner, ReactiveError::NoOwner) => true,
            (ReactiveError::ContextNotFound, ReactiveError::ContextNotFound) => true,
            (ReactiveError::CycleFault { node: a }, ReactiveError::CycleFault { node: b }) => a == b,
            (ReactiveError::ActionCancelled, ReactiveError::ActionCancelled) => true,
            _ => false,
        }
    }
}
