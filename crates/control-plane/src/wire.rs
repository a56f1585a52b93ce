//! JSON wire format of the control-plane API.

use chrono::{DateTime, Utc};
use monitor::{Distribution, Parameter, ResourceId, ResourceStatus, StackEvent, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::ControlPlaneError;

/// Capabilities acknowledged on every create/update so templates may
/// declare named IAM resources.
pub(crate) const CAPABILITIES: &[&str] = &["CAPABILITY_IAM", "CAPABILITY_NAMED_IAM"];

#[derive(Debug, Deserialize)]
pub(crate) struct EventsResponse {
    pub(crate) events: Vec<WireEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireEvent {
    timestamp: DateTime<Utc>,
    logical_resource_id: String,
    resource_status: String,
    #[serde(default)]
    resource_status_reason: Option<String>,
}

impl TryFrom<WireEvent> for StackEvent {
    type Error = ControlPlaneError;

    fn try_from(raw: WireEvent) -> Result<Self, Self::Error> {
        let resource_id = ResourceId::new(raw.logical_resource_id).ok_or_else(|| {
            ControlPlaneError::Decode("event without logicalResourceId".to_owned())
        })?;
        Ok(StackEvent {
            timestamp: Timestamp::from_utc(raw.timestamp),
            resource_id,
            status: ResourceStatus::new(raw.resource_status),
            status_reason: raw.resource_status_reason,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StackBody<'a> {
    pub(crate) stack_name: &'a str,
    pub(crate) template_body: &'a str,
    pub(crate) parameters: Vec<WireParameter<'a>>,
    pub(crate) capabilities: &'static [&'static str],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireParameter<'a> {
    parameter_key: &'a str,
    parameter_value: &'a str,
}

impl<'a> From<&'a Parameter> for WireParameter<'a> {
    fn from(p: &'a Parameter) -> Self {
        Self {
            parameter_key: &p.key,
            parameter_value: &p.value,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DistributionsResponse {
    #[serde(default)]
    pub(crate) items: Vec<Distribution>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CodeLocationBody<'a> {
    pub(crate) bucket: &'a str,
    pub(crate) key: &'a str,
}
