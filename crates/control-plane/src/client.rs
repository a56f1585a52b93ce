//! HTTP client for the control-plane API.

use std::time::Duration;

use async_trait::async_trait;
use monitor::{
    ArtifactLocation, Distribution, DistributionLookup, EventSource, FunctionName,
    FunctionRegistry, InvocationResult, Parameter, ServiceError, StackEvent, StackName,
    StackOperations, StackRequest,
};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, instrument};

use crate::config::ControlPlaneConfig;
use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::wire::{
    CodeLocationBody, DistributionsResponse, EventsResponse, StackBody, WireParameter,
    CAPABILITIES,
};

/// Longest response body kept in [`ControlPlaneError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP client for stacks, distributions and functions.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ControlPlaneClient {
    /// Create a new control-plane client from configuration.
    pub fn new(config: &ControlPlaneConfig) -> ControlPlaneResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ControlPlaneError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
        })
    }

    /// Create a new client with a custom base URL and default settings.
    pub fn with_url(url: impl Into<String>) -> ControlPlaneResult<Self> {
        Self::new(&ControlPlaneConfig {
            url: url.into(),
            ..ControlPlaneConfig::default()
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Latest events of `stack`, newest first.
    #[instrument(skip_all, fields(stack = %stack))]
    pub async fn describe_events(&self, stack: &StackName) -> ControlPlaneResult<Vec<StackEvent>> {
        let response = self
            .request(Method::GET, &format!("/stacks/{stack}/events"))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ControlPlaneError::StackNotFound(stack.to_string()));
        }

        let body: EventsResponse = check_status(response).await?.json().await?;
        debug!(count = body.events.len(), "fetched stack events");

        body.events.into_iter().map(StackEvent::try_from).collect()
    }

    /// Submits a create, update or delete request.
    #[instrument(skip_all, fields(stack = %request.stack(), action = %request.action()))]
    pub async fn submit(&self, request: &StackRequest) -> ControlPlaneResult<()> {
        let builder = match request {
            StackRequest::Create {
                stack,
                template_body,
                parameters,
            } => self
                .request(Method::POST, "/stacks")
                .json(&stack_body(stack, template_body, parameters)),
            StackRequest::Update {
                stack,
                template_body,
                parameters,
            } => self
                .request(Method::PUT, &format!("/stacks/{stack}"))
                .json(&stack_body(stack, template_body, parameters)),
            StackRequest::Delete { stack } => {
                self.request(Method::DELETE, &format!("/stacks/{stack}"))
            }
        };

        check_status(builder.send().await?).await?;
        debug!("stack request accepted");
        Ok(())
    }

    /// All distributions known to the control plane.
    #[instrument(skip(self))]
    pub async fn list_distributions(&self) -> ControlPlaneResult<Vec<Distribution>> {
        let response = self.request(Method::GET, "/distributions").send().await?;
        let body: DistributionsResponse = check_status(response).await?.json().await?;
        Ok(body.items)
    }

    /// Points `function` at a package in object storage.
    #[instrument(skip_all, fields(function = %function, location = %location))]
    pub async fn update_function_code(
        &self,
        function: &FunctionName,
        location: &ArtifactLocation,
    ) -> ControlPlaneResult<()> {
        let response = self
            .request(Method::PUT, &format!("/functions/{function}/code"))
            .json(&CodeLocationBody {
                bucket: &location.bucket,
                key: &location.key,
            })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Invokes `function` synchronously (request/response).
    #[instrument(skip_all, fields(function = %function))]
    pub async fn invoke_function(
        &self,
        function: &FunctionName,
    ) -> ControlPlaneResult<InvocationResult> {
        let response = self
            .request(Method::POST, &format!("/functions/{function}/invocations"))
            .send()
            .await?;
        let text = check_status(response).await?.text().await?;
        let payload = serde_json::from_str(&text)
            .map_err(|e| ControlPlaneError::Decode(format!("invocation payload: {e}")))?;
        Ok(InvocationResult { payload })
    }
}

fn stack_body<'a>(
    stack: &'a StackName,
    template_body: &'a str,
    parameters: &'a [Parameter],
) -> StackBody<'a> {
    StackBody {
        stack_name: stack.as_str(),
        template_body,
        parameters: parameters.iter().map(WireParameter::from).collect(),
        capabilities: CAPABILITIES,
    }
}

/// Passes successful responses through and turns the rest into
/// [`ControlPlaneError::Status`].
pub(crate) async fn check_status(response: Response) -> ControlPlaneResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();

    Err(ControlPlaneError::Status {
        status,
        body,
        retry_after,
    })
}

#[async_trait]
impl EventSource for ControlPlaneClient {
    async fn fetch_events(&self, stack: &StackName) -> Result<Vec<StackEvent>, ServiceError> {
        self.describe_events(stack)
            .await
            .map_err(|e| e.into_service_error("fetch_events"))
    }
}

#[async_trait]
impl StackOperations for ControlPlaneClient {
    async fn begin(&self, request: &StackRequest) -> Result<(), ServiceError> {
        self.submit(request)
            .await
            .map_err(|e| e.into_service_error("begin"))
    }
}

#[async_trait]
impl DistributionLookup for ControlPlaneClient {
    async fn find_by_alias(&self, domain: &str) -> Result<Option<Distribution>, ServiceError> {
        let distributions = self
            .list_distributions()
            .await
            .map_err(|e| e.into_service_error("find_by_alias"))?;
        Ok(distributions.into_iter().find(|d| d.has_alias(domain)))
    }
}

#[async_trait]
impl FunctionRegistry for ControlPlaneClient {
    async fn update_code(
        &self,
        function: &FunctionName,
        location: &ArtifactLocation,
    ) -> Result<(), ServiceError> {
        self.update_function_code(function, location)
            .await
            .map_err(|e| e.into_service_error("update_code"))
    }

    async fn invoke(&self, function: &FunctionName) -> Result<InvocationResult, ServiceError> {
        self.invoke_function(function)
            .await
            .map_err(|e| e.into_service_error("invoke"))
    }
}
