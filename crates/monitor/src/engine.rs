//! The poll loop driving a monitoring session.
//!
//! ```text
//! POLLING ──► SUCCEEDED | FAILED | CANCELLED | TIMED_OUT
//! ```
//!
//! Each iteration checks the idle timeout, fetches the latest page of events,
//! ingests it in chronological order and, when nothing terminal happened,
//! sleeps for the fixed poll interval. There is no back-off and no overall
//! deadline; only staleness is bounded.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::cancel::{CancelHook, SharedCancelHook};
use crate::clock::{Clock, SystemClock};
use crate::errors::MonitorError;
use crate::observer::{EventObserver, TracingObserver};
use crate::ports::EventSource;
use crate::session::{MonitorSession, Step};
use crate::{SessionId, StackAction, StackEvent, StackName, Timestamp};

/// Delay between two polls of the event source.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Requests and reports
// ---------------------------------------------------------------------------

/// Parameters of one monitoring call.
#[derive(Clone)]
pub struct MonitorRequest {
    /// Stack whose event feed is watched.
    pub stack: StackName,

    /// Action whose completion ends the session. `None` observes passively
    /// until cancelled or timed out.
    pub action: Option<StackAction>,

    /// Events at or before this instant are ignored. Defaults to the
    /// monitor clock's current time when the session starts.
    pub start_time: Option<Timestamp>,

    /// Longest tolerated gap without a new event.
    pub idle_timeout: Option<Duration>,

    /// Evaluated on every accepted event; `true` cancels the session.
    pub cancel: Option<SharedCancelHook>,
}

impl MonitorRequest {
    /// Passive observation of `stack` starting now, with no timeout.
    pub fn new(stack: StackName) -> Self {
        Self {
            stack,
            action: None,
            start_time: None,
            idle_timeout: None,
            cancel: None,
        }
    }

    pub fn for_action(mut self, action: StackAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Sets the action from its command-line name.
    ///
    /// # Errors
    ///
    /// [`MonitorError::InvalidArgument`] when `name` is not `create`,
    /// `update` or `delete`.
    pub fn with_action_name(mut self, name: Option<&str>) -> Result<Self, MonitorError> {
        self.action = name.map(str::parse::<StackAction>).transpose()?;
        Ok(self)
    }

    pub fn with_start_time(mut self, start: impl Into<Timestamp>) -> Self {
        self.start_time = Some(start.into());
        self
    }

    /// Sets a start time expressed in the local time zone without offset.
    ///
    /// Ambiguous local times resolve to the earlier instant; nonexistent
    /// local times (inside a DST gap) are read as UTC.
    pub fn with_local_start_time(self, start: NaiveDateTime) -> Self {
        let utc = Local
            .from_local_datetime(&start)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&start));
        self.with_start_time(utc)
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn with_cancel_hook(mut self, hook: impl CancelHook + 'static) -> Self {
        self.cancel = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for MonitorRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorRequest")
            .field("stack", &self.stack)
            .field("action", &self.action)
            .field("start_time", &self.start_time)
            .field("idle_timeout", &self.idle_timeout)
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

/// How a successful session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The stack reached `<ACTION>_COMPLETE` with no failure observed.
    Succeeded,
    /// The cancellation hook fired.
    Cancelled,
}

/// Events accepted by a session that ended without error.
#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub session_id: SessionId,
    pub outcome: Completion,
    /// Accepted events in acceptance (chronological) order.
    pub events: Vec<StackEvent>,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Watches stack event feeds until an operation finishes.
///
/// A `Monitor` holds no per-session state and can run any number of sessions,
/// sequentially through [`Monitor::run`] or concurrently through
/// [`Monitor::spawn`].
pub struct Monitor {
    source: Arc<dyn EventSource>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn EventObserver>,
    poll_interval: Duration,
}

impl Monitor {
    /// Creates a monitor polling `source` on the system clock, reporting
    /// events through `tracing`.
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Runs one monitoring session to completion.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::OperationFailed`] when the stack fails, or completes
    ///   after any resource failed during the session.
    /// - [`MonitorError::TimedOut`] when no new event arrives within the
    ///   request's idle timeout.
    /// - [`MonitorError::EventSource`] when fetching events fails.
    pub async fn run(&self, request: MonitorRequest) -> Result<MonitorReport, MonitorError> {
        let session_id = SessionId::new_random();
        let span = info_span!(
            "monitor",
            session_id = %session_id,
            stack = %request.stack,
            action = request.action.map_or("observe", StackAction::as_str),
        );
        self.poll(session_id, request).instrument(span).await
    }

    /// Runs a session on its own task; the join handle delivers the result.
    pub fn spawn(
        self: &Arc<Self>,
        request: MonitorRequest,
    ) -> JoinHandle<Result<MonitorReport, MonitorError>> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move { monitor.run(request).await })
    }

    async fn poll(
        &self,
        session_id: SessionId,
        request: MonitorRequest,
    ) -> Result<MonitorReport, MonitorError> {
        let start = request.start_time.unwrap_or_else(|| self.clock.now());
        let mut session = MonitorSession::new(session_id, request.stack, request.action, start);
        debug!(start = %start, "monitoring started");

        loop {
            if let Some(limit) = request.idle_timeout {
                let idle = session.idle_for(self.clock.now());
                if idle >= limit {
                    warn!(
                        idle_secs = idle.as_secs(),
                        last_event = %session.watermark().timestamp(),
                        "monitoring timed out"
                    );
                    return Err(MonitorError::TimedOut { idle });
                }
            }

            let page = self
                .source
                .fetch_events(&session.stack)
                .await
                .map_err(|err| {
                    error!(error = %err, "event fetch failed");
                    MonitorError::EventSource(err)
                })?;

            let step = session.ingest(page, self.observer.as_ref(), request.cancel.as_deref());
            match step {
                Step::Continue => {}
                Step::Cancelled => {
                    info!(events = session.collected().len(), "monitoring cancelled");
                    return Ok(Self::report(session, Completion::Cancelled));
                }
                Step::Succeeded => {
                    info!(events = session.collected().len(), "operation succeeded");
                    return Ok(Self::report(session, Completion::Succeeded));
                }
                Step::Failed(status) => {
                    let reason = session.last_failure_reason().map(str::to_owned);
                    error!(
                        status = %status,
                        reason = reason.as_deref().unwrap_or_default(),
                        resource_failed = session.observed_failure(),
                        "operation failed"
                    );
                    return Err(MonitorError::OperationFailed {
                        stack: session.stack,
                        status,
                        reason,
                    });
                }
            }

            self.clock.sleep(self.poll_interval).await;
        }
    }

    fn report(session: MonitorSession, outcome: Completion) -> MonitorReport {
        MonitorReport {
            session_id: session.id,
            outcome,
            events: session.into_events(),
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
