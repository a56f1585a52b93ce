//! Newtype domain identifiers.
//!
//! Every named thing the control plane knows about is represented as a distinct
//! newtype wrapping a string. A [`StackName`] cannot be compared with a
//! [`FunctionName`] even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (control-plane names)
// ---------------------------------------------------------------------------

string_id! {
    /// Names a declarative resource stack (e.g. `"HefokiUpdater"`).
    ///
    /// The stack itself also appears as a resource in its own event feed; its
    /// logical resource id equals the stack name.
    StackName
}

string_id! {
    /// Logical identifier of a resource inside a stack, as reported on events.
    ResourceId
}

string_id! {
    /// Names a deployed function workload (e.g. `"hefoki-updater"`).
    FunctionName
}

impl ResourceId {
    /// Returns `true` if this resource id names the stack itself.
    pub fn is_stack(&self, stack: &StackName) -> bool {
        self.0 == stack.as_str()
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single monitoring session (one call of [`crate::Monitor::run`]).
///
/// Generated fresh for every session and attached to its tracing span so all
/// activity from a session can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
