//! Command-line interface definitions.
//!
//! This module contains only clap struct definitions - no business logic.
//! All command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Scriptvisor - run sandboxed, event-driven scripts
#[derive(Parser, Debug)]
#[command(name = "scriptvisor", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a prelude and query, then invoke one event handler
    Run(RunArgs),

    /// Compile scripts without invoking any handler
    Check(CheckArgs),
}

/// Script files shared by every command.
#[derive(Args, Debug)]
pub struct ScriptArgs {
    /// Prelude script (use "-" for stdin)
    #[arg(long)]
    pub prelude: String,

    /// Directory that `loadModule(name)` resolves `name.lua` against
    #[arg(long, value_name = "DIR")]
    pub modules: Option<PathBuf>,

    /// Allocation ceiling for the engine instance, in bytes
    #[arg(long, value_name = "BYTES")]
    pub memory_limit: Option<usize>,
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub scripts: ScriptArgs,

    /// Query script (use "-" for stdin)
    #[arg(long)]
    pub query: String,

    /// Event name of the handler to invoke
    #[arg(long, value_name = "NAME")]
    pub command: String,

    /// Payloads passed to the handler; the first one is the primary payload
    pub payloads: Vec<String>,

    /// Terminate the scripts after this many milliseconds
    #[arg(long, value_name = "N")]
    pub timeout_ms: Option<u64>,
}

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub scripts: ScriptArgs,

    /// Query script (use "-" for stdin)
    #[arg(long)]
    pub query: Option<String>,

    /// Only report errors
    #[arg(long, short)]
    pub quiet: bool,
}
