//! Observation of accepted events.
//!
//! Every accepted event is emitted as it is observed; failures are emitted a
//! second time through [`EventObserver::on_failure`] together with their reason,
//! before any terminal check runs.

use tracing::{info, warn};

use crate::StackEvent;

pub trait EventObserver: Send + Sync {
    /// Called once for every accepted event, in chronological order.
    fn on_event(&self, event: &StackEvent);

    /// Called for every accepted event whose status ends in `_FAILED`.
    fn on_failure(&self, event: &StackEvent);
}

/// Emits accepted events as structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EventObserver for TracingObserver {
    fn on_event(&self, event: &StackEvent) {
        info!(
            timestamp = %event.timestamp,
            status = %event.status,
            resource = %event.resource_id,
            "stack event"
        );
    }

    fn on_failure(&self, event: &StackEvent) {
        warn!(
            resource = %event.resource_id,
            status = %event.status,
            reason = event.status_reason.as_deref().unwrap_or_default(),
            "resource failed"
        );
    }
}
