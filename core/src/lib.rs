//! Supervisory layer for embedded, sandboxed scripts.
//!
//! A [`ScriptHost`](api::ScriptHost) owns every compiled script and hands out
//! opaque handles. Scripts come in three kinds that share one engine instance:
//!
//! - a **prelude**, whose run yields a template factory and which exposes the
//!   `log` and `loadModule` natives;
//! - **modules**, compiled against a template derived from the prelude and
//!   exporting a table;
//! - one **query** per prelude, which registers named event handlers through
//!   the `on` native and talks back to the host through `notify`.
//!
//! Every call into script code is bracketed by a cancellable region, so a
//! termination request issued from any thread is observed deterministically.

pub mod api;
pub mod cancel;
pub mod engine;
pub mod script;

pub use api::{
    CapturedError, CommandResult, EngineOptions, EngineOptionsOverride, Error, ErrorCode,
    ErrorKind, ErrorReport, Failure, PreludeHooks, QueryHooks, ResultHandle, ScriptHandle,
    ScriptHost, Status,
};
pub use engine::{InstanceWatch, TerminationHandle};
pub use script::{HandlerHandle, HandlerResult, ScriptKind, ScriptState};

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with DEBUG level
    /// Call this at the start of tests where you want to see logging output
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        // Try to initialize, ignore error if already initialized
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}
