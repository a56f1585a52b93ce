//! Watermark tracking for event deduplication.
//!
//! The watermark is the timestamp of the most recently accepted event. An
//! event is new only if it is strictly later than the watermark; everything
//! else has been seen by an earlier poll (or predates the session) and is
//! dropped. This is the only deduplication performed across overlapping polls.

use std::time::Duration;

use crate::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark(Timestamp);

impl Watermark {
    /// Starts a watermark at `start`; events at or before it are ignored.
    pub fn starting_at(start: Timestamp) -> Self {
        Self(start)
    }

    /// Returns the advanced watermark if `event_time` is new, `None` otherwise.
    #[must_use]
    pub fn accept(self, event_time: Timestamp) -> Option<Self> {
        (event_time > self.0).then_some(Self(event_time))
    }

    /// Time since the last accepted event (or the session start).
    pub fn idle_for(self, now: Timestamp) -> Duration {
        now.duration_since(self.0)
    }

    pub fn timestamp(self) -> Timestamp {
        self.0
    }
}
