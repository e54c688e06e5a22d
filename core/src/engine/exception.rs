//! Exception capture.

/// Message carried by the error the termination hook raises inside the VM.
pub(crate) const TERMINATION_MESSAGE: &str = "script execution terminated";

const TRACEBACK_MARKER: &str = "\nstack traceback:";

/// Extract the human-readable message from an engine error.
///
/// Errors raised by natives reach the host wrapped in one callback-error
/// layer per native frame they crossed; the innermost cause is the message
/// the script author cares about. Tracebacks are dropped.
pub fn describe_error(error: &mlua::Error) -> String {
    match error {
        mlua::Error::CallbackError { cause, .. } => describe_error(cause),
        mlua::Error::RuntimeError(message) => strip_traceback(message).to_string(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::MemoryError(message) => format!("out of memory: {message}"),
        other => other.to_string(),
    }
}

fn strip_traceback(message: &str) -> &str {
    match message.find(TRACEBACK_MARKER) {
        Some(end) => &message[..end],
        None => message,
    }
}
