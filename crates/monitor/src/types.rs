//! Shared value types for stack operations.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! behaviour the monitor relies on: status suffix classification, action
//! prefixes, parameter normalisation and invocation error extraction.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::MonitorError;
use crate::{ResourceId, StackName};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, clamped at zero.
    pub fn duration_since(self, earlier: Timestamp) -> Duration {
        (self.0 - earlier.0).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns this timestamp shifted forward by `delta`.
    ///
    /// Saturates at the original value if `delta` is not representable.
    pub fn saturating_add(self, delta: Duration) -> Self {
        chrono::Duration::from_std(delta)
            .ok()
            .and_then(|d| self.0.checked_add_signed(d))
            .map(Self)
            .unwrap_or(self)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Actions and statuses
// ---------------------------------------------------------------------------

/// An operation that can be requested against a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackAction {
    /// Create a stack that does not exist yet.
    Create,
    /// Update an existing stack in place.
    Update,
    /// Delete a stack and all of its resources.
    Delete,
}

impl StackAction {
    /// Lower-case name accepted on the command line and in requests.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Upper-case prefix carried by every status reported for this action
    /// (`CREATE_IN_PROGRESS`, `CREATE_COMPLETE`, ...).
    pub fn status_prefix(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl FromStr for StackAction {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(MonitorError::InvalidArgument {
                message: format!(
                    "action must be one of \"create\", \"update\" or \"delete\", got \"{other}\""
                ),
            }),
        }
    }
}

impl std::fmt::Display for StackAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status reported on a stack event: an action prefix followed by a phase
/// suffix (`_IN_PROGRESS`, `_COMPLETE`, `_FAILED`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceStatus(String);

impl ResourceStatus {
    /// Suffix marking a successfully finished action.
    pub const COMPLETE_SUFFIX: &'static str = "_COMPLETE";
    /// Suffix marking a failed action.
    pub const FAILED_SUFFIX: &'static str = "_FAILED";
    /// Suffix marking an action that is still running.
    pub const IN_PROGRESS_SUFFIX: &'static str = "_IN_PROGRESS";

    /// Wraps a raw status string.
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    /// Returns the status as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_complete(&self) -> bool {
        self.0.ends_with(Self::COMPLETE_SUFFIX)
    }

    pub fn is_failed(&self) -> bool {
        self.0.ends_with(Self::FAILED_SUFFIX)
    }

    pub fn is_in_progress(&self) -> bool {
        self.0.ends_with(Self::IN_PROGRESS_SUFFIX)
    }

    /// Returns `true` if this status belongs to `action`.
    pub fn starts_with_action(&self, action: StackAction) -> bool {
        self.0.starts_with(action.status_prefix())
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One immutable status transition reported by the control plane.
///
/// Events for a single resource are strictly ordered by `timestamp`; across
/// resources within one page they are only weakly ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    /// When the transition happened.
    pub timestamp: Timestamp,

    /// The resource (or the stack itself) the transition applies to.
    pub resource_id: ResourceId,

    /// Action prefix plus phase suffix.
    pub status: ResourceStatus,

    /// Human-readable explanation, present primarily on failures.
    pub status_reason: Option<String>,
}

impl StackEvent {
    /// Creates an event without a status reason.
    pub fn new(timestamp: Timestamp, resource_id: ResourceId, status: ResourceStatus) -> Self {
        Self {
            timestamp,
            resource_id,
            status,
            status_reason: None,
        }
    }

    /// Attaches a status reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = Some(reason.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Stack requests
// ---------------------------------------------------------------------------

/// A single stack parameter with a concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

/// Stack parameters as configured, where a value may still be unset.
///
/// Unset values are dropped by [`StackParameters::normalize`] so the control
/// plane falls back to the template default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackParameters(BTreeMap<String, Option<String>>);

impl StackParameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), Some(value.into()));
    }

    /// Returns the value for `key`, or `None` when absent or unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_deref())
    }

    /// Returns concrete parameters in key order, dropping unset and empty values.
    pub fn normalize(&self) -> Vec<Parameter> {
        self.0
            .iter()
            .filter_map(|(key, value)| match value.as_deref() {
                Some(v) if !v.is_empty() => Some(Parameter {
                    key: key.clone(),
                    value: v.to_owned(),
                }),
                _ => None,
            })
            .collect()
    }
}

impl FromIterator<(String, Option<String>)> for StackParameters {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A request to begin an operation against a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackRequest {
    Create {
        stack: StackName,
        template_body: String,
        parameters: Vec<Parameter>,
    },
    Update {
        stack: StackName,
        template_body: String,
        parameters: Vec<Parameter>,
    },
    Delete {
        stack: StackName,
    },
}

impl StackRequest {
    /// The stack this request targets.
    pub fn stack(&self) -> &StackName {
        match self {
            Self::Create { stack, .. } | Self::Update { stack, .. } | Self::Delete { stack } => {
                stack
            }
        }
    }

    /// The action whose events signal this request's completion.
    pub fn action(&self) -> StackAction {
        match self {
            Self::Create { .. } => StackAction::Create,
            Self::Update { .. } => StackAction::Update,
            Self::Delete { .. } => StackAction::Delete,
        }
    }
}

// ---------------------------------------------------------------------------
// Distributions, artifacts and invocations
// ---------------------------------------------------------------------------

/// A content distribution known to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: String,
    pub arn: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Distribution {
    /// Returns `true` if `domain` is one of this distribution's aliases.
    pub fn has_alias(&self, domain: &str) -> bool {
        self.aliases.iter().any(|alias| alias == domain)
    }
}

/// Location of an uploaded artifact in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub key: String,
}

impl ArtifactLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Payload returned by a synchronous function invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub payload: serde_json::Value,
}

/// Error reported by the function itself inside an invocation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationError {
    pub error_type: String,
    pub message: String,
}

impl std::fmt::Display for InvocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl InvocationResult {
    /// Extracts the function-level error, if the payload carries an `errorType`.
    pub fn error(&self) -> Option<InvocationError> {
        let error_type = self.payload.get("errorType")?;
        let error_type = match error_type.as_str() {
            Some(s) => s.to_owned(),
            None => error_type.to_string(),
        };
        let message = self
            .payload
            .get("errorMessage")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_owned();
        Some(InvocationError {
            error_type,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn action_parses_only_lower_case_names() {
        assert_eq!("create".parse::<StackAction>().unwrap(), StackAction::Create);
        assert_eq!("update".parse::<StackAction>().unwrap(), StackAction::Update);
        assert_eq!("delete".parse::<StackAction>().unwrap(), StackAction::Delete);

        for bad in ["destroy", "CREATE", "", "monitor"] {
            let err = bad.parse::<StackAction>().unwrap_err();
            assert!(matches!(err, MonitorError::InvalidArgument { .. }), "{bad}");
        }
    }

    #[test]
    fn status_suffixes_are_classified() {
        let status = ResourceStatus::new("UPDATE_ROLLBACK_COMPLETE");
        assert!(status.is_complete());
        assert!(!status.is_failed());
        assert!(status.starts_with_action(StackAction::Update));
        assert!(!status.starts_with_action(StackAction::Create));

        assert!(ResourceStatus::new("DELETE_FAILED").is_failed());
        assert!(ResourceStatus::new("CREATE_IN_PROGRESS").is_in_progress());
    }

    #[test]
    fn duration_since_clamps_negative_spans() {
        let earlier = Timestamp::from_utc(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let later = earlier.saturating_add(Duration::from_secs(90));

        assert_eq!(later.duration_since(earlier), Duration::from_secs(90));
        assert_eq!(earlier.duration_since(later), Duration::ZERO);
    }

    #[test]
    fn normalize_drops_unset_and_empty_values() {
        let params: StackParameters = [
            ("UpdaterInterval".to_owned(), Some("rate(1 hour)".to_owned())),
            ("UpdaterLambdaS3Key".to_owned(), None),
            ("UpdaterLambdaS3Bucket".to_owned(), Some(String::new())),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            params.normalize(),
            vec![Parameter {
                key: "UpdaterInterval".to_owned(),
                value: "rate(1 hour)".to_owned(),
            }]
        );
        assert_eq!(params.get("UpdaterLambdaS3Key"), None);
    }

    #[test]
    fn invocation_error_is_extracted_from_payload() {
        let ok = InvocationResult {
            payload: serde_json::json!({ "headlines": 12 }),
        };
        assert!(ok.error().is_none());

        let failed = InvocationResult {
            payload: serde_json::json!({
                "errorType": "TypeError",
                "errorMessage": "cannot read properties of undefined",
            }),
        };
        let err = failed.error().unwrap();
        assert_eq!(err.error_type, "TypeError");
        assert_eq!(
            err.to_string(),
            "TypeError: cannot read properties of undefined"
        );
    }

    #[test]
    fn request_reports_its_action_and_stack() {
        let stack = StackName::new("HefokiUpdater").unwrap();
        let request = StackRequest::Delete {
            stack: stack.clone(),
        };
        assert_eq!(request.action(), StackAction::Delete);
        assert_eq!(request.stack(), &stack);
    }
}
