//! Public error and status types.
//!
//! Script failures never unwind past the host boundary. Compile and runtime
//! errors are captured inside the script that produced them and surface only
//! through [`ScriptHost::report_errors`](super::ScriptHost::report_errors); every
//! compile, run, or call operation reports a tri-state [`Status`].
//!
//! [`Error`] is reserved for misuse of the host API itself (unknown handles,
//! wrong script kinds) and for failures to create an engine instance.

use std::fmt;

/// Error type for host API misuse and engine setup failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid API usage (e.g., unknown handle, handle of the wrong script kind).
    #[error("API error: {0}")]
    Api(String),

    /// The engine instance could not be created or configured.
    #[error("engine error: {0}")]
    Engine(String),
}

impl From<mlua::Error> for Error {
    fn from(err: mlua::Error) -> Self {
        Error::Engine(err.to_string())
    }
}

/// Outcome of a compile, run, or call operation as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// A compile or runtime error was captured; call `report_errors` for detail.
    Error,
    /// Termination was observed at a cancellable-region boundary. Any value
    /// produced by the call is indeterminate and has been discarded.
    Terminated,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl<T> From<&Result<T, Failure>> for Status {
    fn from(result: &Result<T, Failure>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(failure) => (*failure).into(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::Error => write!(f, "error"),
            Status::Terminated => write!(f, "terminated"),
        }
    }
}

/// The failing half of a compile, run, or call operation.
///
/// `Terminated` always takes priority: when both a captured exception and a
/// termination could explain a failure, the failure is `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Error,
    Terminated,
}

impl From<Failure> for Status {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Error => Status::Error,
            Failure::Terminated => Status::Terminated,
        }
    }
}

/// Which stage produced a captured error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Parse failure or template construction failure.
    Compile,
    /// Script-thrown error or a contract violation (wrong return type, arity).
    Runtime,
}

/// The most recent error captured by a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CapturedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Numeric code attached to every error report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A captured compile or runtime error; the report carries its message.
    ScriptException = 1,
    /// The engine instance was terminated and is unusable. No message.
    EngineTerminated = 2,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// One entry emitted by `report_errors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: Option<String>,
}

impl ErrorReport {
    pub(crate) fn exception(error: &CapturedError) -> Self {
        Self {
            code: ErrorCode::ScriptException,
            message: Some(error.message.clone()),
        }
    }

    pub(crate) fn terminated() -> Self {
        Self {
            code: ErrorCode::EngineTerminated,
            message: None,
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.code, &self.message) {
            (ErrorCode::EngineTerminated, _) => write!(f, "script execution was terminated"),
            (_, Some(message)) => f.write_str(message),
            (code, None) => write!(f, "script error (code {})", code.as_i32()),
        }
    }
}
