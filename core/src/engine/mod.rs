//! The capability surface of the embedded engine.
//!
//! Everything engine-specific lives here: instance creation and sandboxing,
//! execution contexts, templates, natives, compile/run/call, exception
//! capture, and termination. The script layer above only sees these types,
//! which keeps it independent of the concrete engine binding (Lua 5.4 via
//! `mlua`).
//!
//! Value mapping used throughout the crate:
//!
//! | Concept  | Engine value |
//! |----------|--------------|
//! | object   | table        |
//! | function | function     |
//! | null     | nil          |
//! | string   | string       |

mod exception;
mod instance;
mod template;

pub use exception::describe_error;
pub use instance::{EngineInstance, InstanceWatch, TerminationHandle};
pub use mlua::{Function, MultiValue, Table, Value};
pub use template::Template;

/// A global scope bound to one engine instance.
///
/// Each compiled script owns exactly one context: a fresh environment table
/// holding the sandboxed standard library plus the bindings of the template
/// it was built from.
pub struct ExecutionContext {
    env: Table,
}

impl ExecutionContext {
    /// Look up a global binding visible to scripts running in this context.
    pub fn binding(&self, name: &str) -> Option<Value> {
        match self.env.raw_get::<Value>(name) {
            Ok(Value::Nil) | Err(_) => None,
            Ok(value) => Some(value),
        }
    }

    pub(crate) fn env(&self) -> &Table {
        &self.env
    }
}

/// Error raised into script code by a native.
pub type NativeError = String;

/// Convert a script string to an owned host string.
///
/// `None` for anything that is not a string, and for strings that are not
/// valid UTF-8.
pub fn host_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => s.to_str().ok().map(|s| s.to_string()),
        _ => None,
    }
}

/// Render a scalar the way `tostring` would, for log sinks.
pub fn display_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_string_lossy().into()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}
