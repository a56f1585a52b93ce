//! Terminal condition evaluation.
//!
//! Only the stack's own status events can end a session. A stack-level
//! `_COMPLETE` is downgraded to a failure when any resource failed earlier in
//! the session, because the failure flag is consulted at the terminal moment
//! rather than when the failure was observed.

use crate::{StackAction, StackEvent, StackName};

/// Outcome of evaluating one accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The event does not end the session.
    Ignore,
    /// The requested action completed successfully.
    Succeeded,
    /// The requested action failed, or completed after a failure elsewhere.
    Failed,
}

/// Decides whether `event` ends the session watching `stack` for `action`.
///
/// Passive sessions (`action == None`) never reach a terminal verdict.
pub fn evaluate(
    event: &StackEvent,
    stack: &StackName,
    action: Option<StackAction>,
    observed_failure: bool,
) -> Verdict {
    let Some(action) = action else {
        return Verdict::Ignore;
    };
    if !event.resource_id.is_stack(stack) || !event.status.starts_with_action(action) {
        return Verdict::Ignore;
    }

    if event.status.is_complete() {
        if observed_failure {
            Verdict::Failed
        } else {
            Verdict::Succeeded
        }
    } else if event.status.is_failed() {
        Verdict::Failed
    } else {
        Verdict::Ignore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResourceId, ResourceStatus, Timestamp};

    fn stack() -> StackName {
        StackName::new("HefokiUpdater").unwrap()
    }

    fn event(resource: &str, status: &str) -> StackEvent {
        StackEvent::new(
            Timestamp::now(),
            ResourceId::new(resource).unwrap(),
            ResourceStatus::new(status),
        )
    }

    #[test]
    fn stack_completion_succeeds() {
        let e = event("HefokiUpdater", "CREATE_COMPLETE");
        assert_eq!(
            evaluate(&e, &stack(), Some(StackAction::Create), false),
            Verdict::Succeeded
        );
    }

    #[test]
    fn stack_completion_after_observed_failure_fails() {
        let e = event("HefokiUpdater", "CREATE_COMPLETE");
        assert_eq!(
            evaluate(&e, &stack(), Some(StackAction::Create), true),
            Verdict::Failed
        );
    }

    #[test]
    fn stack_failure_fails() {
        let e = event("HefokiUpdater", "UPDATE_FAILED");
        assert_eq!(
            evaluate(&e, &stack(), Some(StackAction::Update), false),
            Verdict::Failed
        );
    }

    #[test]
    fn other_resources_are_never_terminal() {
        let e = event("UpdaterFunction", "CREATE_FAILED");
        assert_eq!(
            evaluate(&e, &stack(), Some(StackAction::Create), true),
            Verdict::Ignore
        );
    }

    #[test]
    fn statuses_of_other_actions_are_ignored() {
        let e = event("HefokiUpdater", "DELETE_COMPLETE");
        assert_eq!(
            evaluate(&e, &stack(), Some(StackAction::Create), false),
            Verdict::Ignore
        );
    }

    #[test]
    fn in_progress_is_not_terminal() {
        let e = event("HefokiUpdater", "DELETE_IN_PROGRESS");
        assert_eq!(
            evaluate(&e, &stack(), Some(StackAction::Delete), false),
            Verdict::Ignore
        );
    }

    #[test]
    fn passive_observation_never_terminates() {
        let e = event("HefokiUpdater", "CREATE_COMPLETE");
        assert_eq!(evaluate(&e, &stack(), None, false), Verdict::Ignore);
    }
}
