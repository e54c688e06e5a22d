//! The `run` command - invoke one event handler of a query.

use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use scriptvisor::{HandlerHandle, ScriptHandle, Status, TerminationHandle};

use crate::cli::RunArgs;
use crate::common::error::exit_code;
use crate::common::host::Session;
use crate::common::{CliError, CliResult};

/// Run the run command.
pub fn run(args: RunArgs, no_color: bool) -> CliResult<ExitCode> {
    let session = Session::new(&args.scripts, no_color);

    // Armed as soon as the instance exists, so the prelude's bootstrap is
    // covered along with the query's run and the handler.
    let watchdog = Rc::new(RefCell::new(None));
    let timeout = args.timeout_ms.map(Duration::from_millis);
    let prelude = session.compile_prelude(&args.scripts.prelude, {
        let watchdog = Rc::clone(&watchdog);
        move |token| {
            if let Some(timeout) = timeout {
                *watchdog.borrow_mut() = Some(Watchdog::arm(token, timeout));
            }
        }
    });
    let outcome = match prelude {
        Ok(Some(prelude)) => execute(&session, prelude, &args),
        Ok(None) => Ok(Status::Terminated),
        Err(err) => Err(err),
    };

    if let Some(watchdog) = watchdog.take() {
        watchdog.disarm();
    }
    match outcome? {
        Status::Terminated => terminated(),
        status => Ok(exit_code(status)),
    }
}

/// Everything after a successful bootstrap: the query's run and the handler.
fn execute(session: &Session, prelude: ScriptHandle, args: &RunArgs) -> CliResult<Status> {
    if session.render_errors(prelude)? {
        return Ok(Status::Error);
    }

    let handlers = Rc::new(RefCell::new(Vec::new()));
    let Some(query) = session.compile_query(prelude, &args.query, Rc::clone(&handlers))? else {
        return Ok(Status::Terminated);
    };
    if session.render_errors(query)? {
        return Ok(Status::Error);
    }
    // Handlers may register more handlers while running.
    let registered = handlers.borrow().clone();
    invoke(session, query, &registered, args)
}

fn invoke(
    session: &Session,
    query: ScriptHandle,
    handlers: &[(String, HandlerHandle)],
    args: &RunArgs,
) -> CliResult<Status> {
    // The most recent registration for an event wins.
    let Some((_, handler)) = handlers.iter().rev().find(|(name, _)| *name == args.command) else {
        return Err(CliError::UnknownCommand(args.command.clone()));
    };

    let (primary, auxiliary) = match args.payloads.split_first() {
        Some((primary, rest)) => (primary.as_str(), rest),
        None => ("", &[][..]),
    };
    let auxiliary: Vec<&str> = auxiliary.iter().map(String::as_str).collect();

    tracing::debug!(command = %args.command, %handler, "invoking handler");
    let outcome = session
        .host
        .execute_command_handler(query, *handler, primary, &auxiliary)?;

    match (outcome.status, outcome.result) {
        (Status::Ok, Some(result)) => {
            if let Some(values) = session.host.result(result) {
                for value in [values.result_a, values.result_b].into_iter().flatten() {
                    println!("{value}");
                }
            }
            session.host.free_result(result)?;
        }
        (Status::Error, _) => {
            session.render_errors(query)?;
        }
        _ => {}
    }
    Ok(outcome.status)
}

fn terminated() -> CliResult<ExitCode> {
    eprintln!("error: script execution was terminated");
    Ok(exit_code(Status::Terminated))
}

/// Terminates the engine instance unless disarmed before the deadline.
struct Watchdog {
    disarm: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl Watchdog {
    fn arm(token: TerminationHandle, timeout: Duration) -> Self {
        let (disarm, disarmed) = mpsc::channel();
        let thread = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = disarmed.recv_timeout(timeout) {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "timeout elapsed, terminating scripts");
                token.terminate();
            }
        });
        Self { disarm, thread }
    }

    fn disarm(self) {
        self.disarm.send(()).ok();
        self.thread.join().ok();
    }
}
