//! Error handling utilities for the CLI.

use std::process::ExitCode;

use scriptvisor::Status;

/// Errors that stop a command before any script outcome is known.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Host(#[from] scriptvisor::Error),

    #[error("query registered no handler for '{0}'")]
    UnknownCommand(String),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Process exit code for a script outcome: 0 success, 1 script error,
/// 2 terminated.
pub fn exit_code(status: Status) -> ExitCode {
    match status {
        Status::Ok => ExitCode::SUCCESS,
        Status::Error => ExitCode::from(1),
        Status::Terminated => ExitCode::from(2),
    }
}

/// Render an error to stderr and exit with code 1.
pub fn render_and_exit(error: CliError, no_color: bool) -> ! {
    let prefix = if no_color {
        "error".to_string()
    } else {
        nu_ansi_term::Color::Red.bold().paint("error").to_string()
    };
    eprintln!("{prefix}: {error}");
    std::process::exit(1);
}
