//! Control-plane infrastructure adapter.
//!
//! Implements the [`monitor`] crate's port traits over the control plane's
//! JSON/HTTP API:
//!
//! - [`ControlPlaneClient`]: [`monitor::EventSource`],
//!   [`monitor::StackOperations`], [`monitor::DistributionLookup`] and
//!   [`monitor::FunctionRegistry`].
//! - [`ObjectStoreClient`]: [`monitor::ArtifactStore`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport, authentication, wire formats and the mapping
//! of HTTP failures onto [`monitor::RetryPolicy`] live here. The [`monitor`]
//! crate sees only its own port traits and [`monitor::ServiceError`].

pub mod client;
pub mod config;
pub mod error;
pub mod storage;

mod wire;

pub use client::ControlPlaneClient;
pub use config::{ControlPlaneConfig, StorageConfig};
pub use error::{ControlPlaneError, ControlPlaneResult};
pub use storage::ObjectStoreClient;
