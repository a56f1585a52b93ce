//! Caller-supplied cancellation of a monitoring session.

use std::sync::Arc;

use crate::StackEvent;

/// Predicate evaluated on every accepted event.
///
/// Returning `true` ends the session as cancelled, ahead of any terminal-state
/// check for the same event. Any `Fn(&StackEvent) -> bool` closure is a hook.
pub trait CancelHook: Send + Sync {
    fn should_cancel(&self, event: &StackEvent) -> bool;
}

impl<F> CancelHook for F
where
    F: Fn(&StackEvent) -> bool + Send + Sync,
{
    fn should_cancel(&self, event: &StackEvent) -> bool {
        self(event)
    }
}

/// Shared handle to a cancellation hook, as stored on a monitor request.
pub type SharedCancelHook = Arc<dyn CancelHook>;
