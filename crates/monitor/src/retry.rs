//! Bounded retry around event fetches.
//!
//! The poll loop itself never retries: a failed fetch ends the session. Wrapping
//! the source in a [`RetryingEventSource`] absorbs transient failures (those
//! whose [`RetryPolicy`] is `Retryable`) with a fixed delay and a fixed number
//! of extra attempts. Non-retryable failures pass through untouched.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::clock::Clock;
use crate::errors::{RetryPolicy, ServiceError};
use crate::ports::EventSource;
use crate::{StackEvent, StackName};

pub const DEFAULT_FETCH_RETRIES: u32 = 3;
pub const DEFAULT_FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct RetryingEventSource {
    inner: Arc<dyn EventSource>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
    delay: Duration,
}

impl RetryingEventSource {
    pub fn new(inner: Arc<dyn EventSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            clock,
            max_retries: DEFAULT_FETCH_RETRIES,
            delay: DEFAULT_FETCH_RETRY_DELAY,
        }
    }

    /// Extra attempts after the first failure; `0` disables retrying.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay between attempts. A larger `after` hint on the error wins.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl EventSource for RetryingEventSource {
    async fn fetch_events(&self, stack: &StackName) -> Result<Vec<StackEvent>, ServiceError> {
        let mut retries = 0;
        loop {
            let err = match self.inner.fetch_events(stack).await {
                Ok(page) => return Ok(page),
                Err(err) => err,
            };

            let delay = match err.retry {
                RetryPolicy::Retryable { after } if retries < self.max_retries => {
                    after.map_or(self.delay, |hint| hint.max(self.delay))
                }
                _ => return Err(err),
            };

            retries += 1;
            warn!(
                error = %err,
                attempt = retries,
                max_retries = self.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying event fetch"
            );
            self.clock.sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::clock::manual::ManualClock;
    use crate::Timestamp;

    struct FlakySource {
        results: Mutex<VecDeque<Result<Vec<StackEvent>, ServiceError>>>,
    }

    impl FlakySource {
        fn new(results: Vec<Result<Vec<StackEvent>, ServiceError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
            })
        }

        fn remaining(&self) -> usize {
            self.results.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EventSource for FlakySource {
        async fn fetch_events(&self, _stack: &StackName) -> Result<Vec<StackEvent>, ServiceError> {
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::starting_at(Timestamp::from_utc(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )))
    }

    fn stack() -> StackName {
        StackName::new("HefokiUpdater").unwrap()
    }

    #[tokio::test]
    async fn transient_failures_are_retried_with_fixed_delay() {
        let inner = FlakySource::new(vec![
            Err(ServiceError::retryable("fetch_events", "503")),
            Err(ServiceError::retryable("fetch_events", "connection reset")),
            Ok(Vec::new()),
        ]);
        let clock = clock();
        let source = RetryingEventSource::new(inner.clone(), clock.clone())
            .with_delay(Duration::from_millis(250));

        assert!(source.fetch_events(&stack()).await.unwrap().is_empty());
        assert_eq!(inner.remaining(), 0);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(250); 2]);
    }

    #[tokio::test]
    async fn retry_after_hint_extends_the_delay() {
        let mut throttled = ServiceError::retryable("fetch_events", "429");
        throttled.retry = RetryPolicy::Retryable {
            after: Some(Duration::from_secs(4)),
        };
        let inner = FlakySource::new(vec![Err(throttled), Ok(Vec::new())]);
        let clock = clock();
        let source = RetryingEventSource::new(inner, clock.clone());

        source.fetch_events(&stack()).await.unwrap();
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn fatal_failures_are_not_retried() {
        let inner = FlakySource::new(vec![
            Err(ServiceError::fatal("fetch_events", "stack not found")),
            Ok(Vec::new()),
        ]);
        let clock = clock();
        let source = RetryingEventSource::new(inner.clone(), clock.clone());

        let err = source.fetch_events(&stack()).await.unwrap_err();
        assert_eq!(err.message, "stack not found");
        assert_eq!(inner.remaining(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn retries_stop_once_exhausted() {
        let inner = FlakySource::new(vec![
            Err(ServiceError::retryable("fetch_events", "503")),
            Err(ServiceError::retryable("fetch_events", "503")),
            Err(ServiceError::retryable("fetch_events", "still 503")),
            Ok(Vec::new()),
        ]);
        let source = RetryingEventSource::new(inner.clone(), clock()).with_max_retries(2);

        let err = source.fetch_events(&stack()).await.unwrap_err();
        assert_eq!(err.message, "still 503");
        assert_eq!(inner.remaining(), 1);
    }
}
