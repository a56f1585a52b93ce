//! Port traits implemented by infrastructure crates.
//!
//! The monitor and the CLI dispatcher only ever see these traits. Concrete
//! HTTP clients live in the `control-plane` crate; tests supply in-memory fakes.

use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::{
    ArtifactLocation, Distribution, FunctionName, InvocationResult, StackEvent, StackName,
    StackRequest,
};

/// Supplies the event feed of a stack.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Returns the latest events known for `stack`, newest first.
    ///
    /// There is no cursor: every call may return events already seen by a
    /// previous call, and history is truncated by the provider.
    async fn fetch_events(&self, stack: &StackName) -> Result<Vec<StackEvent>, ServiceError>;
}

/// Starts create/update/delete operations.
#[async_trait]
pub trait StackOperations: Send + Sync {
    /// Asks the control plane to begin `request`. Returns once the request has
    /// been accepted, not when the operation completes.
    async fn begin(&self, request: &StackRequest) -> Result<(), ServiceError>;
}

/// Resolves content distributions by alternative domain name.
#[async_trait]
pub trait DistributionLookup: Send + Sync {
    async fn find_by_alias(&self, domain: &str) -> Result<Option<Distribution>, ServiceError>;
}

/// Manages deployed function workloads.
#[async_trait]
pub trait FunctionRegistry: Send + Sync {
    /// Points `function` at the package stored at `location`.
    async fn update_code(
        &self,
        function: &FunctionName,
        location: &ArtifactLocation,
    ) -> Result<(), ServiceError>;

    /// Invokes `function` synchronously and returns its response payload.
    async fn invoke(&self, function: &FunctionName) -> Result<InvocationResult, ServiceError>;
}

/// Object storage for deployable packages.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, location: &ArtifactLocation, body: Vec<u8>) -> Result<(), ServiceError>;
}

#[async_trait]
impl<T: EventSource + ?Sized> EventSource for std::sync::Arc<T> {
    async fn fetch_events(&self, stack: &StackName) -> Result<Vec<StackEvent>, ServiceError> {
        (**self).fetch_events(stack).await
    }
}
