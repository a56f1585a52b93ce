//! Per-call monitoring state.
//!
//! A [`MonitorSession`] is created when a monitoring call starts and dropped
//! when it returns. It is never shared, so the failure flag can only poison
//! completions observed within the same call.

use std::time::Duration;

use crate::cancel::CancelHook;
use crate::observer::EventObserver;
use crate::terminal::{self, Verdict};
use crate::watermark::Watermark;
use crate::{ResourceStatus, SessionId, StackAction, StackEvent, StackName, Timestamp};

/// Result of ingesting one page of events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// No terminal event yet; keep polling.
    Continue,
    Cancelled,
    Succeeded,
    /// Carries the stack status that ended the session.
    Failed(ResourceStatus),
}

#[derive(Debug)]
pub(crate) struct MonitorSession {
    pub(crate) id: SessionId,
    pub(crate) stack: StackName,
    action: Option<StackAction>,
    watermark: Watermark,
    observed_failure: bool,
    last_failure_reason: Option<String>,
    collected: Vec<StackEvent>,
}

impl MonitorSession {
    pub(crate) fn new(
        id: SessionId,
        stack: StackName,
        action: Option<StackAction>,
        start: Timestamp,
    ) -> Self {
        Self {
            id,
            stack,
            action,
            watermark: Watermark::starting_at(start),
            observed_failure: false,
            last_failure_reason: None,
            collected: Vec::new(),
        }
    }

    pub(crate) fn idle_for(&self, now: Timestamp) -> Duration {
        self.watermark.idle_for(now)
    }

    /// Processes a newest-first page in chronological order.
    ///
    /// Stops at the first event that cancels or ends the session; the rest of
    /// the page is left unprocessed.
    pub(crate) fn ingest(
        &mut self,
        page: Vec<StackEvent>,
        observer: &dyn EventObserver,
        cancel: Option<&dyn CancelHook>,
    ) -> Step {
        for event in page.into_iter().rev() {
            let Some(next) = self.watermark.accept(event.timestamp) else {
                continue;
            };
            self.watermark = next;
            self.collected.push(event);
            let event = &self.collected[self.collected.len() - 1];

            observer.on_event(event);

            if event.status.is_failed() {
                self.observed_failure = true;
                if let Some(reason) = &event.status_reason {
                    self.last_failure_reason = Some(reason.clone());
                }
                observer.on_failure(event);
            }

            if cancel.is_some_and(|hook| hook.should_cancel(event)) {
                return Step::Cancelled;
            }

            match terminal::evaluate(event, &self.stack, self.action, self.observed_failure) {
                Verdict::Ignore => {}
                Verdict::Succeeded => return Step::Succeeded,
                Verdict::Failed => return Step::Failed(event.status.clone()),
            }
        }
        Step::Continue
    }

    pub(crate) fn observed_failure(&self) -> bool {
        self.observed_failure
    }

    pub(crate) fn last_failure_reason(&self) -> Option<&str> {
        self.last_failure_reason.as_deref()
    }

    pub(crate) fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub(crate) fn collected(&self) -> &[StackEvent] {
        &self.collected
    }

    pub(crate) fn into_events(self) -> Vec<StackEvent> {
        self.collected
    }
}
