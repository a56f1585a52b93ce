//! Stack operation domain and the event-monitoring engine.
//!
//! This crate contains every domain concept used when driving a control plane:
//! newtype identifiers, stack events and requests, the port traits that
//! infrastructure crates implement, and the [`Monitor`] that follows a stack's
//! event feed until an operation finishes.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no network or
//! file-system I/O. It defines *what* is needed; infrastructure crates define
//! *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`StackName`, `ResourceId`, etc.) |
//! | [`types`] | Events, statuses, actions, requests, invocation results |
//! | [`errors`] | `MonitorError`, `ServiceError`, `RetryPolicy` |
//! | [`ports`] | Traits implemented by infrastructure crates |
//! | [`watermark`] | Timestamp watermark used for deduplication |
//! | [`terminal`] | Terminal condition evaluation |
//! | [`cancel`] | Caller-supplied cancellation hooks |
//! | [`observer`] | Emission of accepted events |
//! | [`engine`] | The poll loop |
//! | [`retry`] | Bounded retry around event fetches |
//! | [`clock`] | Time source abstraction |

pub mod cancel;
pub mod clock;
pub mod engine;
pub mod errors;
pub mod identifiers;
pub mod observer;
pub mod ports;
pub mod retry;
pub mod terminal;
pub mod types;
pub mod watermark;

mod session;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use cancel::{CancelHook, SharedCancelHook};
pub use clock::{Clock, SystemClock};
pub use engine::{Completion, Monitor, MonitorReport, MonitorRequest, DEFAULT_POLL_INTERVAL};
pub use errors::{MonitorError, RetryPolicy, ServiceError};
pub use identifiers::{FunctionName, ResourceId, SessionId, StackName};
pub use observer::{EventObserver, TracingObserver};
pub use ports::{ArtifactStore, DistributionLookup, EventSource, FunctionRegistry, StackOperations};
pub use retry::RetryingEventSource;
pub use types::{
    ArtifactLocation, Distribution, InvocationError, InvocationResult, Parameter,
    ResourceStatus, StackAction, StackEvent, StackParameters, StackRequest, Timestamp,
};
pub use watermark::Watermark;
