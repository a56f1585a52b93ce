//! Operator-facing event output.

use monitor::{EventObserver, StackEvent};
use tracing::debug;

/// Prints each accepted event to stdout as a tab-separated line, followed by
/// an indented reason line for failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleObserver;

impl EventObserver for ConsoleObserver {
    fn on_event(&self, event: &StackEvent) {
        println!("{}", event_line(event));
        debug!(resource = %event.resource_id, status = %event.status, "stack event");
    }

    fn on_failure(&self, event: &StackEvent) {
        if let Some(line) = failure_line(event) {
            println!("{line}");
        }
    }
}

pub fn event_line(event: &StackEvent) -> String {
    format!(
        "{}\t{:<24}\t{}",
        event.timestamp, event.status, event.resource_id
    )
}

pub fn failure_line(event: &StackEvent) -> Option<String> {
    event
        .status_reason
        .as_deref()
        .map(|reason| format!("\t{reason}"))
}

#[cfg(test)]
mod tests {
    use monitor::{ResourceId, ResourceStatus, Timestamp};

    use super::*;

    fn event(status: &str) -> StackEvent {
        StackEvent::new(
            Timestamp::now(),
            ResourceId::new("UpdaterFunction").unwrap(),
            ResourceStatus::new(status),
        )
    }

    #[test]
    fn event_line_pads_status_column() {
        let line = event_line(&event("CREATE_IN_PROGRESS"));
        let columns: Vec<_> = line.split('\t').collect();

        assert_eq!(columns.len(), 3);
        assert_eq!(columns[1], "CREATE_IN_PROGRESS      ");
        assert_eq!(columns[2], "UpdaterFunction");
    }

    #[test]
    fn failure_line_carries_reason() {
        let failed = event("CREATE_FAILED").with_reason("Resource limit exceeded");
        assert_eq!(
            failure_line(&failed).as_deref(),
            Some("\tResource limit exceeded")
        );
        assert_eq!(failure_line(&event("CREATE_FAILED")), None);
    }
}
